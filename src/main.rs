use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use horarios::error::SchedulerError;
use horarios::parser::{normalize, validate_input};
use horarios::scheduler::{generate_schedule, Progress};
use horarios::server::{serve, AppState, JobTable};
use horarios::storage::{ScheduleStore, SupabaseStore};
use horarios::types::{load_config_or_default, RawPayload, SolveOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "horarios")]
#[command(about = "Constraint-based weekly timetable generator for schools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Port to bind; overrides PORT and config.toml
        #[arg(short, long)]
        port: Option<u16>,

        /// Solve without persisting anything to the schedule store
        #[arg(long)]
        no_store: bool,

        /// Path to the TOML configuration
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },

    /// Solve a single request payload from a JSON file
    Solve {
        /// Path to the payload file
        #[arg(short, long)]
        input: PathBuf,

        /// Write the full outcome as JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Wall-clock budget in seconds; overrides config.toml
        #[arg(long)]
        max_time: Option<u64>,

        /// Suppress progress output, print a JSON summary only
        #[arg(short, long)]
        quiet: bool,

        /// Path to the TOML configuration
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            port,
            no_store,
            config,
        } => run_serve(port, no_store, &config).await,
        Commands::Solve {
            input,
            output,
            max_time,
            quiet,
            config,
        } => run_solve(&input, output.as_deref(), max_time, quiet, &config),
    }
}

async fn run_serve(port: Option<u16>, no_store: bool, config_path: &PathBuf) -> Result<()> {
    let config = load_config_or_default(config_path);
    let port = port
        .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
        .unwrap_or(config.server.port);

    let store: Option<Arc<dyn ScheduleStore>> = if no_store {
        warn!("--no-store: los horarios generados no se persistirán");
        None
    } else {
        Some(Arc::new(SupabaseStore::from_env()?))
    };

    let state = AppState {
        jobs: Arc::new(JobTable::new()),
        store,
        config,
    };
    serve(state, port).await
}

fn run_solve(
    input_path: &PathBuf,
    output: Option<&std::path::Path>,
    max_time: Option<u64>,
    quiet: bool,
    config_path: &PathBuf,
) -> Result<()> {
    let mut config = load_config_or_default(config_path);
    if let Some(seconds) = max_time {
        config.solver.max_time_secs = seconds;
    }

    let content = std::fs::read_to_string(input_path).map_err(|e| SchedulerError::FileRead {
        path: input_path.display().to_string(),
        source: e,
    })?;
    let raw: RawPayload = serde_json::from_str(&content).map_err(|e| SchedulerError::JsonParse {
        file: input_path.display().to_string(),
        message: e.to_string(),
    })?;

    let input = normalize(&raw)?;
    if !quiet {
        for warning in validate_input(&input).warnings {
            println!("{} {}", "Aviso:".yellow(), warning);
        }
    }

    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb
    };
    let sink = bar.clone();
    let progress = Progress::new(move |pct, stage| {
        sink.set_position(pct as u64);
        sink.set_message(stage.to_string());
    });

    let outcome = generate_schedule(&input, &config.solver, &progress)?;
    bar.finish_and_clear();

    if quiet {
        println!("{}", serde_json::to_string(&outcome.stats)?);
    } else {
        print_summary(&outcome);
    }

    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&outcome)?)
            .with_context(|| format!("no se pudo escribir {}", path.display()))?;
        if !quiet {
            println!("Resultado escrito en: {}", path.display().to_string().green());
        }
    }

    Ok(())
}

fn print_summary(outcome: &SolveOutcome) {
    println!("\n{}", "Resumen de asignación de horas".bold().cyan());
    println!("{}", "─".repeat(40));

    for detail in &outcome.detalle {
        let estado = if detail.ok {
            "OK".green().bold()
        } else {
            "FALTAN".red().bold()
        };
        println!(
            " - Curso {}, Grado {}: {}/{} horas -> {}",
            detail.curso_id,
            detail.grado_id,
            detail.horas_asignadas,
            detail.horas_requeridas,
            estado
        );
    }

    for warning in &outcome.advertencias {
        println!("{} {}", "Aviso:".yellow(), warning);
    }

    let stats = &outcome.stats;
    println!(
        "\nTotal asignado: {}/{} bloques ({} exitosas, {} fallidas)",
        stats.total_bloques_asignados,
        stats.total_bloques_requeridos,
        stats.asignaciones_exitosas,
        stats.asignaciones_fallidas
    );
    println!(
        "Cobertura: {:.1}% (Z = {:.2}{})",
        stats.proporcion * 100.0,
        stats.z,
        if stats.significativo {
            ", significativo".red().to_string()
        } else {
            String::new()
        }
    );
    println!(
        "Estado: {} en {} ms",
        outcome.estado.label().bold(),
        outcome.solve_time_ms
    );
}

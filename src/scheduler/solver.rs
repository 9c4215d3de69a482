use crate::error::{Result, SchedulerError};
use crate::scheduler::model::TimetableModel;
use crate::scheduler::Progress;
use crate::types::{SolveStatus, SolverConfig};
use good_lp::solvers::highs::{highs, HighsSolution};
use good_lp::{ResolutionError, SolverModel};
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Component E: what the solver hands back. An infeasible model is a valid
/// outcome (empty schedule, everything slack), not an error.
pub struct Solved {
    pub status: SolveStatus,
    pub solution: Option<HighsSolution>,
    pub solve_time: Duration,
}

/// Configure HiGHS and run the search under the wall-clock budget
pub fn run_solver(
    model: TimetableModel,
    config: &SolverConfig,
    progress: &Progress,
) -> Result<Solved> {
    let started = Instant::now();
    let ticker = ProgressTicker::start(progress.clone(), config.max_time_secs);

    let mut problem = model
        .vars
        .minimise(model.objective)
        .using(highs)
        .set_option("time_limit", config.max_time_secs as f64)
        .set_option("threads", config.workers as i32)
        .set_option("parallel", "on");
    for c in model.constraints {
        problem.add_constraint(c);
    }

    info!(
        "resolviendo (tope {} s, {} hilos)",
        config.max_time_secs, config.workers
    );
    let outcome = problem.solve();
    ticker.finish();
    let solve_time = started.elapsed();

    match outcome {
        Ok(solution) => {
            let status = if solve_time >= Duration::from_secs(config.max_time_secs) {
                // budget exhausted; HiGHS returned its incumbent
                SolveStatus::TimeLimit
            } else {
                SolveStatus::Optimal
            };
            info!("solución {} en {:.2?}", status, solve_time);
            Ok(Solved {
                status,
                solution: Some(solution),
                solve_time,
            })
        }
        Err(ResolutionError::Infeasible) => {
            info!("modelo infactible; se devuelve horario vacío");
            Ok(Solved {
                status: SolveStatus::Infeasible,
                solution: None,
                solve_time,
            })
        }
        Err(e) => Err(SchedulerError::SolverFailed(e.to_string()).into()),
    }
}

/// Background timer that ticks solve progress once a second, capped at 95
/// until the solver actually returns. Dropping it stops the thread, so an
/// aborted caller never leaves a ticking timer behind.
struct ProgressTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    fn start(progress: Progress, max_time_secs: u64) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let started = Instant::now();
        let handle = thread::spawn(move || {
            let budget = max_time_secs.max(1) as f64;
            let mut slices = 0u64;
            // 100 ms slices keep the stop signal responsive; ticks land once a second
            while !flag.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(100));
                slices += 1;
                if slices % 10 != 0 || flag.load(Ordering::Relaxed) {
                    continue;
                }
                let pct = (100.0 * started.elapsed().as_secs_f64() / budget).min(95.0) as u8;
                progress.emit(pct, "resolviendo");
            }
        });
        ProgressTicker {
            stop,
            handle: Some(handle),
        }
    }

    fn finish(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_ticker_emits_monotonic_percentages() {
        let seen: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |pct, _stage| sink.lock().unwrap().push(pct));

        let ticker = ProgressTicker::start(progress, 10);
        thread::sleep(Duration::from_millis(2500));
        ticker.finish();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert!(seen.iter().all(|&p| p <= 95));
    }
}

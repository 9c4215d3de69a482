use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Solver tuning knobs
#[derive(Debug, Clone, Deserialize)]
pub struct SolverConfig {
    /// Wall-clock budget for one solve, in seconds
    #[serde(default = "default_max_time_secs")]
    pub max_time_secs: u64,
    /// Worker threads handed to HiGHS
    #[serde(default = "default_workers")]
    pub workers: u32,
}

fn default_max_time_secs() -> u64 {
    120
}

fn default_workers() -> u32 {
    8
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            max_time_secs: default_max_time_secs(),
            workers: default_workers(),
        }
    }
}

/// HTTP service knobs
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Finished jobs stay addressable this long before eviction
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,
}

fn default_port() -> u16 {
    8080
}

fn default_job_ttl_secs() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            job_ttl_secs: default_job_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Load config from TOML file, or use defaults
pub fn load_config_or_default(path: &Path) -> AppConfig {
    if path.exists() {
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => AppConfig::default(),
        }
    } else {
        AppConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.solver.max_time_secs, 120);
        assert_eq!(config.solver.workers, 8);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.job_ttl_secs, 300);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str("[solver]\nmax_time_secs = 45\n").unwrap();
        assert_eq!(config.solver.max_time_secs, 45);
        assert_eq!(config.solver.workers, 8);
        assert_eq!(config.server.port, 8080);
    }
}

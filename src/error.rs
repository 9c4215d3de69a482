use thiserror::Error;

/// Domain-specific errors for the timetable service
#[derive(Error, Debug)]
pub enum SchedulerError {
    // Structural input problems; data-quality issues never land here,
    // they are absorbed as slack instead
    #[error("Faltan datos requeridos para generar el horario: {0}")]
    InvalidInput(String),

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON in '{file}': {message}")]
    JsonParse { file: String, message: String },

    // Solver errors
    #[error("ILP solver failed: {0}")]
    SolverFailed(String),
}

/// Use anyhow::Result at application boundaries
pub type Result<T> = anyhow::Result<T>;

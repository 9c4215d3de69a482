//! Timetable generation service for schools.
//!
//! Given teachers, (course, grade) assignments with weekly hour demands and
//! per-teacher availability whitelists, the solver produces a weekly grid of
//! 5 days x N blocks (7 for schedule version 1, 8 otherwise) that respects
//! teacher and grade exclusivity, availability, contiguity and session-shape
//! rules, trading unplaceable hours for heavily penalized slack.
//!
//! # Pipeline
//!
//! 1. **Normalization**: coerce the raw payload into integer-keyed maps
//! 2. **Requirements**: flatten (course, grade, teacher, hours) demands
//! 3. **Availability**: compile whitelists into a dense blocked-slot set
//! 4. **Model & solve**: MILP over HiGHS with a weighted objective
//! 5. **Decode**: materialize the grid, deficits and the coverage statistic
//!
//! # Example
//!
//! ```no_run
//! use horarios::parser::normalize;
//! use horarios::scheduler::{generate_schedule, Progress};
//! use horarios::types::SolverConfig;
//!
//! let raw: horarios::types::RawPayload = serde_json::from_str(r#"{"docentes": [{"id": 1}],
//!     "asignaciones": {"1": {"6": {"docente_id": 1}}},
//!     "horas_curso_grado": {"1": {"6": 2}},
//!     "nivel": "Primaria"}"#).unwrap();
//! let input = normalize(&raw).unwrap();
//! let outcome = generate_schedule(&input, &SolverConfig::default(), &Progress::disabled()).unwrap();
//! println!("bloques asignados: {}", outcome.stats.total_bloques_asignados);
//! ```

pub mod error;
pub mod parser;
pub mod scheduler;
pub mod server;
pub mod storage;
pub mod types;

pub use error::{Result, SchedulerError};

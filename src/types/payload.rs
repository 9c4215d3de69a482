use super::{CourseId, GradeId, Level, TeacherId, TimeGrid};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Request body as sent by the frontend. Identifier-bearing fields come in
/// as numbers or numeric strings; the normalizer coerces them exactly once.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPayload {
    #[serde(default)]
    pub docentes: Vec<RawTeacher>,
    /// curso -> grado -> assignment
    #[serde(default)]
    pub asignaciones: BTreeMap<String, BTreeMap<String, RawAssignment>>,
    /// docente -> "dia-bloque" -> allowed flag (whitelist)
    #[serde(default)]
    pub restricciones: BTreeMap<String, BTreeMap<String, Value>>,
    /// curso -> grado -> weekly hours
    #[serde(default)]
    pub horas_curso_grado: BTreeMap<String, BTreeMap<String, Value>>,
    /// curso -> grado -> split pattern, e.g. [3, 2]
    #[serde(default)]
    pub patrones: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    #[serde(default)]
    pub reglas: RawRules,
    #[serde(default = "default_nivel")]
    pub nivel: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
}

fn default_nivel() -> String {
    "Secundaria".to_string()
}

fn default_version() -> u32 {
    2
}

fn default_overwrite() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTeacher {
    pub id: Value,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub jornada_total: Option<u32>,
    #[serde(default)]
    pub aula_id: Option<Value>,
}

/// The payload repeats curso_id/grado_id inside the value; the map keys win
#[derive(Debug, Clone, Deserialize)]
pub struct RawAssignment {
    pub docente_id: Value,
    #[serde(default)]
    pub curso_id: Option<Value>,
    #[serde(default)]
    pub grado_id: Option<Value>,
}

/// Optional `reglas` map of the payload
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRules {
    #[serde(default)]
    pub omitir_una_hora: Option<bool>,
    #[serde(default)]
    pub tope_diario: Option<bool>,
    /// curso -> allowed session lengths override
    #[serde(default)]
    pub duraciones_sesion: BTreeMap<String, Vec<u8>>,
}

/// Effective scheduling rules after defaults are applied
#[derive(Debug, Clone)]
pub struct Rules {
    /// Drop 1-hour requirements entirely (their hours become slack)
    pub omit_single_hour: bool,
    /// Cap a teacher at 3 hours per grade per day
    pub daily_cap: bool,
    /// Per-course allowed session lengths, honored for version 1 only
    pub session_lengths: BTreeMap<CourseId, Vec<u8>>,
}

impl Default for Rules {
    fn default() -> Self {
        Rules {
            omit_single_hour: true,
            daily_cap: true,
            session_lengths: BTreeMap::new(),
        }
    }
}

/// Teacher record; fields beyond the id are carried through untouched
#[derive(Debug, Clone, Serialize)]
pub struct Teacher {
    pub id: TeacherId,
    pub nombre: Option<String>,
    pub jornada_total: Option<u32>,
    pub aula_id: Option<u32>,
}

/// Fully normalized input: integer keys, folded day names, rebased blocks.
/// Everything downstream of the normalizer works off this struct only.
#[derive(Debug, Clone)]
pub struct NormalizedInput {
    pub teachers: Vec<Teacher>,
    pub assignments: BTreeMap<(CourseId, GradeId), TeacherId>,
    pub hours: BTreeMap<(CourseId, GradeId), u8>,
    /// Whitelisted (day, block) slots per teacher. A teacher present with an
    /// empty set is blocked everywhere; a teacher absent is unrestricted.
    pub availability: BTreeMap<TeacherId, BTreeSet<(usize, u8)>>,
    pub patterns: BTreeMap<(CourseId, GradeId), Vec<u8>>,
    pub level: Level,
    pub version: u32,
    pub grid: TimeGrid,
    pub rules: Rules,
    pub overwrite: bool,
}

use super::{CourseId, GradeId, Level, TeacherId, TimeGrid, NUM_DAYS};
use serde::Serialize;
use std::collections::BTreeMap;

/// Sparse weekly schedule: day -> block -> grade -> course.
/// Only scheduled cells are present.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduleGrid(pub BTreeMap<usize, BTreeMap<u8, BTreeMap<GradeId, CourseId>>>);

impl ScheduleGrid {
    pub fn set(&mut self, day: usize, block: u8, grade: GradeId, course: CourseId) {
        self.0
            .entry(day)
            .or_default()
            .entry(block)
            .or_default()
            .insert(grade, course);
    }

    pub fn get(&self, day: usize, block: u8, grade: GradeId) -> Option<CourseId> {
        self.0.get(&day)?.get(&block)?.get(&grade).copied()
    }

    /// Iterate all scheduled cells as (day, block, grade, course)
    pub fn cells(&self) -> impl Iterator<Item = (usize, u8, GradeId, CourseId)> + '_ {
        self.0.iter().flat_map(|(&day, blocks)| {
            blocks.iter().flat_map(move |(&block, grades)| {
                grades
                    .iter()
                    .map(move |(&grade, &course)| (day, block, grade, course))
            })
        })
    }

    pub fn total_cells(&self) -> usize {
        self.cells().count()
    }

    /// Blocks occupied by one grade on one day, ascending
    pub fn grade_blocks(&self, day: usize, grade: GradeId) -> Vec<u8> {
        let Some(blocks) = self.0.get(&day) else {
            return Vec::new();
        };
        blocks
            .iter()
            .filter(|(_, grades)| grades.contains_key(&grade))
            .map(|(&b, _)| b)
            .collect()
    }

    /// Dense `[day][block][grade_position]` matrix for the frontend, with 0
    /// marking an empty cell. Grade positions follow the level's id range.
    pub fn to_matrix(&self, level: Level, grid: TimeGrid) -> Vec<Vec<Vec<u32>>> {
        let grades: Vec<u32> = level.grades().collect();
        (0..NUM_DAYS)
            .map(|day| {
                grid.block_range()
                    .map(|block| {
                        grades
                            .iter()
                            .map(|&g| {
                                self.get(day, block, GradeId(g)).map(|c| c.0).unwrap_or(0)
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect()
    }
}

/// Terminal state of one solver invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveStatus {
    #[serde(rename = "optimo")]
    Optimal,
    #[serde(rename = "tiempo_agotado")]
    TimeLimit,
    #[serde(rename = "infactible")]
    Infeasible,
}

impl SolveStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "optimo",
            SolveStatus::TimeLimit => "tiempo_agotado",
            SolveStatus::Infeasible => "infactible",
        }
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Per-requirement scheduling result
#[derive(Debug, Clone, Serialize)]
pub struct RequirementOutcome {
    pub curso_id: CourseId,
    pub grado_id: GradeId,
    pub docente_id: TeacherId,
    pub horas_requeridas: u8,
    pub horas_asignadas: u8,
    pub deficit: u8,
    pub ok: bool,
}

/// Aggregate counters plus the one-sample Z statistic against full coverage
#[derive(Debug, Clone, Serialize)]
pub struct SolveStats {
    pub total_bloques_asignados: u32,
    pub total_bloques_requeridos: u32,
    pub asignaciones_exitosas: u32,
    pub asignaciones_fallidas: u32,
    pub proporcion: f64,
    pub z: f64,
    pub significativo: bool,
}

/// Everything the decoder produces for one solve
#[derive(Debug, Clone, Serialize)]
pub struct SolveOutcome {
    pub horario: ScheduleGrid,
    pub detalle: Vec<RequirementOutcome>,
    pub stats: SolveStats,
    pub estado: SolveStatus,
    pub advertencias: Vec<String>,
    pub generated_at: String,
    pub solve_time_ms: u64,
}

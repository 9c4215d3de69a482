use crate::types::{CourseId, GradeId, Level, ScheduleGrid, TeacherId, DAY_NAMES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of the external `horarios` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub docente_id: u32,
    pub curso_id: u32,
    pub grado_id: u32,
    /// Canonical accented day name ('lunes'..'viernes')
    pub dia: String,
    pub bloque: u8,
    pub nivel: String,
    pub version_num: u32,
}

/// Component G: flatten the sparse schedule into store rows. Cells with an
/// empty course id or without a matching assignment are skipped; the
/// teacher always comes from the assignment map, never from the solver.
pub fn schedule_rows(
    schedule: &ScheduleGrid,
    assignments: &BTreeMap<(CourseId, GradeId), TeacherId>,
    level: Level,
    version: u32,
) -> Vec<ScheduleRow> {
    let mut rows = Vec::new();
    for (day, block, grade, course) in schedule.cells() {
        if course.0 == 0 {
            continue;
        }
        let Some(&teacher) = assignments.get(&(course, grade)) else {
            continue;
        };
        rows.push(ScheduleRow {
            docente_id: teacher.0,
            curso_id: course.0,
            grado_id: grade.0,
            dia: DAY_NAMES[day].to_string(),
            bloque: block,
            nivel: level.to_string(),
            version_num: version,
        });
    }
    rows
}

use crate::types::{NormalizedInput, TeacherId};
use std::collections::HashSet;

/// Validation result with collected warnings. Nothing here is fatal: data
/// that cannot be scheduled simply ends up as slack.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

/// Cross-check the normalized maps against each other
pub fn validate_input(input: &NormalizedInput) -> ValidationResult {
    let mut result = ValidationResult::default();

    let teacher_ids: HashSet<TeacherId> = input.teachers.iter().map(|t| t.id).collect();

    for (&(course, grade), &teacher) in &input.assignments {
        if !teacher_ids.contains(&teacher) {
            result.add_warning(format!(
                "Curso {course}, grado {grade}: docente {teacher} no figura en la lista de docentes"
            ));
        }
        if !input.hours.contains_key(&(course, grade)) {
            result.add_warning(format!(
                "Curso {course}, grado {grade}: asignación sin horas requeridas"
            ));
        }
        if !input.level.contains_grade(grade) {
            result.add_warning(format!(
                "Curso {course}: grado {grade} fuera del rango de {}",
                input.level
            ));
        }
    }

    for &(course, grade) in input.hours.keys() {
        if !input.assignments.contains_key(&(course, grade)) {
            result.add_warning(format!(
                "Curso {course}, grado {grade}: horas requeridas sin docente asignado"
            ));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        CourseId, GradeId, Level, NormalizedInput, Rules, Teacher, TimeGrid,
    };
    use std::collections::BTreeMap;

    fn base_input() -> NormalizedInput {
        NormalizedInput {
            teachers: vec![Teacher {
                id: TeacherId(1),
                nombre: None,
                jornada_total: None,
                aula_id: None,
            }],
            assignments: BTreeMap::new(),
            hours: BTreeMap::new(),
            availability: BTreeMap::new(),
            patterns: BTreeMap::new(),
            level: Level::Secundaria,
            version: 2,
            grid: TimeGrid::for_version(2),
            rules: Rules::default(),
            overwrite: true,
        }
    }

    #[test]
    fn test_consistent_input_has_no_warnings() {
        let mut input = base_input();
        input
            .assignments
            .insert((CourseId(1), GradeId(1)), TeacherId(1));
        input.hours.insert((CourseId(1), GradeId(1)), 4);

        let result = validate_input(&input);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_orphan_hours_and_unknown_teacher_warn() {
        let mut input = base_input();
        input
            .assignments
            .insert((CourseId(1), GradeId(1)), TeacherId(99));
        input.hours.insert((CourseId(1), GradeId(1)), 4);
        input.hours.insert((CourseId(2), GradeId(1)), 3);

        let result = validate_input(&input);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[0].contains("docente 99"));
        assert!(result.warnings[1].contains("sin docente asignado"));
    }
}

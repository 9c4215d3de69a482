mod availability;
mod decoder;
mod model;
mod requirements;
mod solver;

pub use availability::*;
pub use decoder::*;
pub use model::*;
pub use requirements::*;
pub use solver::*;

use crate::error::Result;
use crate::types::{NormalizedInput, SolveOutcome, SolverConfig};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Progress sink shared by the CLI bar and the SSE job stream. Percentages
/// are strictly monotonic: late or repeated ticks are dropped.
#[derive(Clone)]
pub struct Progress {
    sink: Option<Arc<dyn Fn(u8, &str) + Send + Sync>>,
    last: Arc<AtomicU8>,
}

impl Progress {
    pub fn new(sink: impl Fn(u8, &str) + Send + Sync + 'static) -> Self {
        Progress {
            sink: Some(Arc::new(sink)),
            last: Arc::new(AtomicU8::new(0)),
        }
    }

    pub fn disabled() -> Self {
        Progress {
            sink: None,
            last: Arc::new(AtomicU8::new(0)),
        }
    }

    pub fn emit(&self, pct: u8, stage: &str) {
        let Some(sink) = &self.sink else {
            return;
        };
        let prev = self.last.fetch_max(pct, Ordering::Relaxed);
        if pct > prev {
            sink(pct, stage);
        }
    }
}

/// Main entry point: requirements -> availability -> model -> solve -> decode
pub fn generate_schedule(
    input: &NormalizedInput,
    config: &SolverConfig,
    progress: &Progress,
) -> Result<SolveOutcome> {
    progress.emit(2, "preparando");
    let reqs = build_requirements(input);
    let avail = compile_availability(input);

    let advertencias: Vec<String> = trivially_infeasible(&reqs, &avail)
        .iter()
        .map(|flag| {
            let req = &reqs.items[flag.index];
            format!(
                "Curso {}, grado {}: {} horas requeridas pero el docente {} solo dispone de {} bloques",
                req.course, req.grade, req.hours, req.teacher, flag.free_slots
            )
        })
        .collect();

    progress.emit(5, "modelo");
    let model = build_model(input, &reqs, &avail);
    let x = model.x.clone();

    progress.emit(8, "resolviendo");
    let solved = run_solver(model, config, progress)?;

    let outcome = decode(&solved, &x, &reqs, input, advertencias);
    progress.emit(100, "finalizado");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        CourseId, GradeId, Level, NormalizedInput, Rules, ScheduleGrid, SolveStatus, Teacher,
        TeacherId, TimeGrid, NUM_DAYS,
    };
    use std::collections::{BTreeMap, BTreeSet};

    fn empty_input(level: Level, version: u32) -> NormalizedInput {
        NormalizedInput {
            teachers: Vec::new(),
            assignments: BTreeMap::new(),
            hours: BTreeMap::new(),
            availability: BTreeMap::new(),
            patterns: BTreeMap::new(),
            level,
            version,
            grid: TimeGrid::for_version(version),
            rules: Rules::default(),
            overwrite: true,
        }
    }

    fn add_requirement(
        input: &mut NormalizedInput,
        course: u32,
        grade: u32,
        teacher: u32,
        hours: u8,
    ) {
        input.teachers.push(Teacher {
            id: TeacherId(teacher),
            nombre: None,
            jornada_total: None,
            aula_id: None,
        });
        input
            .assignments
            .insert((CourseId(course), GradeId(grade)), TeacherId(teacher));
        input.hours.insert((CourseId(course), GradeId(grade)), hours);
    }

    fn solve(input: &NormalizedInput) -> SolveOutcome {
        let config = SolverConfig {
            max_time_secs: 30,
            workers: 2,
        };
        generate_schedule(input, &config, &Progress::disabled()).unwrap()
    }

    /// Blocks occupied by one course on one day, ascending
    fn course_blocks(grid: &ScheduleGrid, day: usize, course: u32) -> Vec<u8> {
        grid.cells()
            .filter(|&(d, _, _, c)| d == day && c == CourseId(course))
            .map(|(_, b, _, _)| b)
            .collect()
    }

    fn assert_day_contiguity(grid: &ScheduleGrid, courses: &[u32]) {
        for day in 0..NUM_DAYS {
            for &course in courses {
                let blocks = course_blocks(grid, day, course);
                for pair in blocks.windows(2) {
                    assert_eq!(pair[1], pair[0] + 1, "curso {course} con hueco el día {day}");
                }
            }
        }
    }

    fn assert_grade_prefix(grid: &ScheduleGrid, grade: u32) {
        for day in 0..NUM_DAYS {
            let blocks = grid.grade_blocks(day, GradeId(grade));
            for (i, &b) in blocks.iter().enumerate() {
                assert_eq!(b as usize, i, "grado {grade} no empieza en el bloque 0 el día {day}");
            }
        }
    }

    #[test]
    fn test_minimal_two_hours_land_on_one_day() {
        let mut input = empty_input(Level::Primaria, 2);
        add_requirement(&mut input, 1, 6, 1, 2);

        let outcome = solve(&input);

        assert_eq!(outcome.stats.total_bloques_asignados, 2);
        assert_eq!(outcome.stats.asignaciones_exitosas, 1);
        assert_eq!(outcome.estado, SolveStatus::Optimal);

        let cells: Vec<_> = outcome.horario.cells().collect();
        assert_eq!(cells.len(), 2);
        let (d0, b0, ..) = cells[0];
        let (d1, b1, ..) = cells[1];
        assert_eq!(d0, d1, "las dos horas deben caer el mismo día");
        assert_eq!([b0, b1], [0, 1]);
    }

    #[test]
    fn test_two_courses_share_grade_without_overlap() {
        let mut input = empty_input(Level::Primaria, 2);
        add_requirement(&mut input, 1, 6, 1, 2);
        add_requirement(&mut input, 2, 6, 2, 2);

        let outcome = solve(&input);

        assert_eq!(outcome.stats.total_bloques_asignados, 4);
        assert!(outcome.detalle.iter().all(|r| r.ok));
        // an overlap would collapse two cells into one grid entry
        assert_eq!(outcome.horario.total_cells(), 4);
        assert_day_contiguity(&outcome.horario, &[1, 2]);
        assert_grade_prefix(&outcome.horario, 6);
    }

    #[test]
    fn test_shared_teacher_is_never_double_booked() {
        let mut input = empty_input(Level::Secundaria, 2);
        add_requirement(&mut input, 1, 1, 7, 3);
        add_requirement(&mut input, 2, 2, 7, 3);

        let outcome = solve(&input);

        assert_eq!(outcome.stats.total_bloques_asignados, 6);
        for day in 0..NUM_DAYS {
            for block in input.grid.block_range() {
                let g1 = outcome.horario.get(day, block, GradeId(1));
                let g2 = outcome.horario.get(day, block, GradeId(2));
                assert!(
                    g1.is_none() || g2.is_none(),
                    "docente 7 duplicado en día {day}, bloque {block}"
                );
            }
        }
    }

    #[test]
    fn test_fully_restricted_teacher_yields_empty_schedule() {
        let mut input = empty_input(Level::Secundaria, 2);
        add_requirement(&mut input, 5, 1, 50, 2);
        input.availability.insert(TeacherId(50), BTreeSet::new());

        let outcome = solve(&input);

        assert_eq!(outcome.stats.total_bloques_asignados, 0);
        assert_eq!(outcome.detalle[0].deficit, 2);
        assert_eq!(outcome.stats.asignaciones_fallidas, 1);
        assert!(outcome.stats.significativo);
        assert_eq!(outcome.advertencias.len(), 1);
        // the model itself stays feasible: the hours turn into slack
        assert_eq!(outcome.estado, SolveStatus::Optimal);
    }

    #[test]
    fn test_whitelisted_slots_are_the_only_ones_used() {
        let mut input = empty_input(Level::Secundaria, 2);
        add_requirement(&mut input, 1, 1, 3, 2);
        input.availability.insert(
            TeacherId(3),
            [(0usize, 0u8), (0, 1)].into_iter().collect(),
        );

        let outcome = solve(&input);

        assert_eq!(outcome.stats.total_bloques_asignados, 2);
        let cells: Vec<_> = outcome
            .horario
            .cells()
            .map(|(d, b, _, _)| (d, b))
            .collect();
        assert_eq!(cells, vec![(0, 0), (0, 1)]);
    }

    #[test]
    fn test_primaria_ignores_restrictions() {
        let mut input = empty_input(Level::Primaria, 2);
        add_requirement(&mut input, 1, 6, 50, 2);
        input.availability.insert(TeacherId(50), BTreeSet::new());

        let outcome = solve(&input);
        assert_eq!(outcome.stats.total_bloques_asignados, 2);
    }

    #[test]
    fn test_single_hour_requirement_is_omitted_by_default() {
        let mut input = empty_input(Level::Primaria, 2);
        add_requirement(&mut input, 1, 6, 1, 1);

        let outcome = solve(&input);

        assert_eq!(outcome.stats.total_bloques_asignados, 0);
        assert_eq!(outcome.detalle[0].deficit, 1);
        assert_eq!(outcome.stats.asignaciones_fallidas, 1);
    }

    #[test]
    fn test_single_hour_requirement_scheduled_when_omit_disabled() {
        let mut input = empty_input(Level::Primaria, 2);
        add_requirement(&mut input, 1, 6, 1, 1);
        input.rules.omit_single_hour = false;

        let outcome = solve(&input);

        assert_eq!(outcome.stats.total_bloques_asignados, 1);
        assert!(outcome.detalle[0].ok);
    }

    #[test]
    fn test_five_hours_split_into_three_plus_two() {
        let mut input = empty_input(Level::Secundaria, 2);
        add_requirement(&mut input, 1, 1, 1, 5);

        let outcome = solve(&input);

        assert_eq!(outcome.stats.total_bloques_asignados, 5);
        let mut day_lengths: Vec<usize> = (0..NUM_DAYS)
            .map(|d| course_blocks(&outcome.horario, d, 1).len())
            .filter(|&n| n > 0)
            .collect();
        day_lengths.sort_unstable();
        assert_eq!(day_lengths, vec![2, 3]);
        assert_day_contiguity(&outcome.horario, &[1]);
    }

    #[test]
    fn test_four_hours_avoid_single_blocks() {
        let mut input = empty_input(Level::Secundaria, 2);
        add_requirement(&mut input, 1, 1, 1, 4);

        let outcome = solve(&input);

        assert_eq!(outcome.stats.total_bloques_asignados, 4);
        let day_lengths: Vec<usize> = (0..NUM_DAYS)
            .map(|d| course_blocks(&outcome.horario, d, 1).len())
            .filter(|&n| n > 0)
            .collect();
        assert_eq!(day_lengths, vec![2, 2]);
    }

    #[test]
    fn test_split_pattern_is_honored() {
        let mut input = empty_input(Level::Primaria, 2);
        add_requirement(&mut input, 1, 6, 1, 4);
        input
            .patterns
            .insert((CourseId(1), GradeId(6)), vec![4]);

        let outcome = solve(&input);

        assert_eq!(outcome.stats.total_bloques_asignados, 4);
        let day_lengths: Vec<usize> = (0..NUM_DAYS)
            .map(|d| course_blocks(&outcome.horario, d, 1).len())
            .filter(|&n| n > 0)
            .collect();
        // one single day holding the whole 4-hour session
        assert_eq!(day_lengths, vec![4]);
        assert_day_contiguity(&outcome.horario, &[1]);
    }

    #[test]
    fn test_version_one_daily_distribution() {
        let mut input = empty_input(Level::Secundaria, 1);
        for course in 1..=5u32 {
            add_requirement(&mut input, course, 1, course, 5);
        }

        let outcome = solve(&input);

        assert_eq!(outcome.stats.total_bloques_asignados, 25);
        assert_eq!(outcome.stats.asignaciones_fallidas, 0);
        assert_grade_prefix(&outcome.horario, 1);
        assert_day_contiguity(&outcome.horario, &[1, 2, 3, 4, 5]);

        for day in 0..NUM_DAYS {
            let mut lengths: Vec<usize> = (1..=5u32)
                .map(|course| course_blocks(&outcome.horario, day, course).len())
                .filter(|&n| n > 0)
                .collect();
            lengths.sort_unstable();
            // exactly one 3-hour and one 2-hour session per weekday
            assert_eq!(lengths, vec![2, 3], "distribución rota el día {day}");
        }
    }

    #[test]
    fn test_progress_reaches_one_hundred() {
        use std::sync::Mutex;

        let seen: Arc<Mutex<Vec<(u8, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |pct, stage| {
            sink.lock().unwrap().push((pct, stage.to_string()));
        });

        let mut input = empty_input(Level::Primaria, 2);
        add_requirement(&mut input, 1, 6, 1, 2);
        let config = SolverConfig {
            max_time_secs: 30,
            workers: 2,
        };
        generate_schedule(&input, &config, &progress).unwrap();

        let seen = seen.lock().unwrap();
        let percents: Vec<u8> = seen.iter().map(|(p, _)| *p).collect();
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
        let (last_pct, last_stage) = seen.last().unwrap();
        assert_eq!(*last_pct, 100);
        assert_eq!(last_stage, "finalizado");
    }
}

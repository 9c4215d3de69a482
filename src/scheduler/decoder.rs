use crate::scheduler::solver::Solved;
use crate::types::{
    NormalizedInput, RequirementOutcome, RequirementSet, ScheduleGrid, SolveOutcome, SolveStats,
    NUM_DAYS,
};
use good_lp::{Solution, Variable};

/// Critical value for a two-sided test at the 5% level
const Z_CRITICAL: f64 = 1.96;

/// Component F: materialize the schedule grid from the solved variables and
/// compute the per-requirement and aggregate metrics.
pub fn decode(
    solved: &Solved,
    x: &[Vec<Vec<Variable>>],
    reqs: &RequirementSet,
    input: &NormalizedInput,
    advertencias: Vec<String>,
) -> SolveOutcome {
    let mut horario = ScheduleGrid::default();
    let mut detalle = Vec::with_capacity(reqs.len());
    let mut total_assigned = 0u32;

    for req in reqs.iter() {
        let mut assigned = 0u8;
        if let Some(solution) = &solved.solution {
            for d in 0..NUM_DAYS {
                for b in input.grid.block_range() {
                    if solution.value(x[req.index][d][b as usize]) > 0.5 {
                        horario.set(d, b, req.grade, req.course);
                        assigned += 1;
                    }
                }
            }
        }
        total_assigned += assigned as u32;
        detalle.push(RequirementOutcome {
            curso_id: req.course,
            grado_id: req.grade,
            docente_id: req.teacher,
            horas_requeridas: req.hours,
            horas_asignadas: assigned,
            deficit: req.hours - assigned,
            ok: assigned == req.hours,
        });
    }

    let stats = compute_stats(&detalle, reqs.total_hours, total_assigned);

    SolveOutcome {
        horario,
        detalle,
        stats,
        estado: solved.status,
        advertencias,
        generated_at: chrono::Utc::now().to_rfc3339(),
        solve_time_ms: solved.solve_time.as_millis() as u64,
    }
}

/// One-sample Z statistic of the assigned proportion against full coverage
/// (p0 = 1), with the continuity-rule variance 1/(4n)
pub(crate) fn compute_stats(
    detalle: &[RequirementOutcome],
    total_required: u32,
    total_assigned: u32,
) -> SolveStats {
    let fallidas = detalle.iter().filter(|r| r.deficit > 0).count() as u32;
    let exitosas = detalle.len() as u32 - fallidas;

    let (proporcion, z) = if total_required > 0 {
        let p = total_assigned as f64 / total_required as f64;
        let z = (p - 1.0) * 2.0 * (total_required as f64).sqrt();
        (p, z)
    } else {
        (1.0, 0.0)
    };

    SolveStats {
        total_bloques_asignados: total_assigned,
        total_bloques_requeridos: total_required,
        asignaciones_exitosas: exitosas,
        asignaciones_fallidas: fallidas,
        proporcion,
        z,
        significativo: z.abs() >= Z_CRITICAL,
    }
}

use crate::types::{Level, NormalizedInput, RequirementSet, TeacherId, TimeGrid, NUM_DAYS};
use log::warn;
use std::collections::{HashMap, HashSet};

/// Component C: dense blocked-slot set compiled from the whitelists.
/// Primaria ignores restrictions entirely; elsewhere, a teacher with any
/// rule map is blocked on every slot the map does not whitelist.
#[derive(Debug)]
pub struct CompiledAvailability {
    blocked: HashSet<(TeacherId, usize, u8)>,
    free_slots: HashMap<TeacherId, u32>,
    grid: TimeGrid,
}

impl CompiledAvailability {
    pub fn is_blocked(&self, teacher: TeacherId, day: usize, block: u8) -> bool {
        self.blocked.contains(&(teacher, day, block))
    }

    /// Slots the teacher could possibly teach in; unrestricted teachers get
    /// the whole grid
    pub fn free_slots(&self, teacher: TeacherId) -> u32 {
        self.free_slots
            .get(&teacher)
            .copied()
            .unwrap_or_else(|| self.grid.total_slots())
    }
}

pub fn compile_availability(input: &NormalizedInput) -> CompiledAvailability {
    let grid = input.grid;
    let mut blocked = HashSet::new();
    let mut free_slots = HashMap::new();

    if input.level != Level::Primaria {
        for (&teacher, allowed) in &input.availability {
            let mut free = 0u32;
            for day in 0..NUM_DAYS {
                for block in grid.block_range() {
                    if allowed.contains(&(day, block)) {
                        free += 1;
                    } else {
                        blocked.insert((teacher, day, block));
                    }
                }
            }
            free_slots.insert(teacher, free);
        }
    }

    CompiledAvailability {
        blocked,
        free_slots,
        grid,
    }
}

/// A requirement whose teacher cannot possibly cover the demanded hours
#[derive(Debug, Clone)]
pub struct InfeasibleRequirement {
    pub index: usize,
    pub free_slots: u32,
}

/// Flag requirements that are unsatisfiable before the solver even runs.
/// Reported, never fatal: the solver will leave them as slack.
pub fn trivially_infeasible(
    reqs: &RequirementSet,
    avail: &CompiledAvailability,
) -> Vec<InfeasibleRequirement> {
    let mut flagged = Vec::new();
    for req in reqs.iter() {
        let free = avail.free_slots(req.teacher);
        if req.hours as u32 > free {
            warn!(
                "Curso {}, grado {}: docente {} solo dispone de {} bloques para {} horas",
                req.course, req.grade, req.teacher, free, req.hours
            );
            flagged.push(InfeasibleRequirement {
                index: req.index,
                free_slots: free,
            });
        }
    }
    flagged
}

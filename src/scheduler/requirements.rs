use crate::types::{NormalizedInput, Requirement, RequirementSet};
use log::info;

/// Component B: flatten the hour demands into the requirement list.
/// A (course, grade) becomes a requirement only when it needs at least one
/// hour and has a teacher assigned.
pub fn build_requirements(input: &NormalizedInput) -> RequirementSet {
    let mut items = Vec::new();
    // BTreeMap keys keep the (course, grade) order deterministic
    for (&(course, grade), &hours) in &input.hours {
        if hours < 1 {
            continue;
        }
        let Some(&teacher) = input.assignments.get(&(course, grade)) else {
            continue;
        };
        items.push(Requirement {
            index: items.len(),
            course,
            grade,
            teacher,
            hours,
            pattern: input.patterns.get(&(course, grade)).cloned(),
        });
    }

    let total_hours = items.iter().map(|r| r.hours as u32).sum();
    info!(
        "{} requerimientos, {} horas semanales en total",
        items.len(),
        total_hours
    );
    RequirementSet { items, total_hours }
}

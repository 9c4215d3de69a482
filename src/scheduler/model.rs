use crate::scheduler::availability::CompiledAvailability;
use crate::types::{
    GradeId, NormalizedInput, Requirement, RequirementSet, Rules, TeacherId, NUM_DAYS,
};
use good_lp::{constraint, variable, variables, Constraint, Expression, ProblemVariables, Variable};
use itertools::Itertools;
use log::info;
use std::collections::BTreeMap;

/// Objective weights. Slack dominates everything else, so an hour is only
/// dropped when no layout can place it.
const SLACK_WEIGHT: f64 = 100_000.0;
const GAP_WEIGHT: f64 = 200.0;
const FRAGMENT_WEIGHT: f64 = 50.0;
const ADJACENT_DAY_WEIGHT: f64 = 80.0;

/// Hours a teacher may spend with one grade on one day
const DAILY_CAP: f64 = 3.0;

/// Session-length plan for one requirement: which day-session lengths it
/// may use and how often each must appear
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionPlan {
    /// Allowed day-session lengths; a day not listed here is an off day
    pub lengths: Vec<u8>,
    /// (k, n): exactly n days must hold a k-hour session
    pub exact_counts: Vec<(u8, u32)>,
    /// (k, n): at most n days may hold a k-hour session
    pub max_counts: Vec<(u8, u32)>,
    /// A 1-hour day is only admissible alongside a 2-hour day
    pub pair_single: bool,
}

/// Derive the session plan. An explicit split pattern wins; otherwise the
/// per-course length override (version 1 only), otherwise the standard
/// pedagogical table. One-hour days stay forbidden unless a plan says so.
pub(crate) fn session_plan(req: &Requirement, rules: &Rules, version: u32) -> SessionPlan {
    if let Some(pattern) = &req.pattern {
        let lengths: Vec<u8> = pattern.iter().copied().sorted().dedup().collect();
        let exact_counts = lengths
            .iter()
            .map(|&k| (k, pattern.iter().filter(|&&p| p == k).count() as u32))
            .collect();
        return SessionPlan {
            lengths,
            exact_counts,
            max_counts: Vec::new(),
            pair_single: false,
        };
    }

    if req.hours == 1 && rules.omit_single_hour {
        // The requirement is dropped whole; slack absorbs its single hour
        return SessionPlan {
            lengths: Vec::new(),
            exact_counts: Vec::new(),
            max_counts: Vec::new(),
            pair_single: false,
        };
    }

    if version == 1 {
        if let Some(lengths) = rules.session_lengths.get(&req.course) {
            return SessionPlan {
                lengths: lengths.clone(),
                exact_counts: Vec::new(),
                max_counts: Vec::new(),
                pair_single: lengths.contains(&1) && req.hours > 1,
            };
        }
    }

    match req.hours {
        1 => SessionPlan {
            lengths: vec![1],
            exact_counts: Vec::new(),
            max_counts: Vec::new(),
            pair_single: false,
        },
        // 2h: one day of 2h; 4h: two days of 2h
        2 | 4 => SessionPlan {
            lengths: vec![2],
            exact_counts: Vec::new(),
            max_counts: Vec::new(),
            pair_single: false,
        },
        // 3h: a single 3-hour session
        3 => SessionPlan {
            lengths: vec![3],
            exact_counts: Vec::new(),
            max_counts: Vec::new(),
            pair_single: false,
        },
        // 5h: one 3h day plus one 2h day
        5 => SessionPlan {
            lengths: vec![2, 3],
            exact_counts: Vec::new(),
            max_counts: vec![(2, 1), (3, 1)],
            pair_single: false,
        },
        // 6h and up decompose freely into 2h/3h days
        _ => SessionPlan {
            lengths: vec![2, 3],
            exact_counts: Vec::new(),
            max_counts: Vec::new(),
            pair_single: false,
        },
    }
}

/// The assembled decision model, ready for the solver driver
pub struct TimetableModel {
    pub vars: ProblemVariables,
    pub objective: Expression,
    pub constraints: Vec<Constraint>,
    /// x[i][d][b] - requirement i occupies block b of day d
    pub x: Vec<Vec<Vec<Variable>>>,
    /// s[i] - hours requirement i is allowed to leave unscheduled
    pub slack: Vec<Variable>,
}

/// Component D: declare all decision variables and post every hard
/// constraint and soft penalty of the timetable model.
pub fn build_model(
    input: &NormalizedInput,
    reqs: &RequirementSet,
    avail: &CompiledAvailability,
) -> TimetableModel {
    let grid = input.grid;
    let blocks = grid.blocks as usize;
    let mut vars = variables!();
    let mut constraints: Vec<Constraint> = Vec::new();
    let mut objective = Expression::default();

    // x[i][d][b]
    let x: Vec<Vec<Vec<Variable>>> = reqs
        .iter()
        .map(|_| {
            (0..NUM_DAYS)
                .map(|_| (0..blocks).map(|_| vars.add(variable().binary())).collect())
                .collect()
        })
        .collect();

    // s[i] in 0..hours_i
    let slack: Vec<Variable> = reqs
        .iter()
        .map(|req| vars.add(variable().integer().min(0.0).max(req.hours as f64)))
        .collect();

    // y[i][d][k] - day d of requirement i holds a k-hour session
    let plans: Vec<SessionPlan> = reqs
        .iter()
        .map(|req| session_plan(req, &input.rules, input.version))
        .collect();
    let day_len: Vec<Vec<BTreeMap<u8, Variable>>> = plans
        .iter()
        .map(|plan| {
            (0..NUM_DAYS)
                .map(|_| {
                    plan.lengths
                        .iter()
                        .map(|&k| (k, vars.add(variable().binary())))
                        .collect()
                })
                .collect()
        })
        .collect();

    // Availability pins: blocked slots can never be occupied
    for req in reqs.iter() {
        for d in 0..NUM_DAYS {
            for b in 0..blocks {
                if avail.is_blocked(req.teacher, d, b as u8) {
                    let pinned = Expression::from(x[req.index][d][b]);
                    constraints.push(constraint!(pinned == 0));
                }
            }
        }
    }

    // Constraint 1: exact hours with slack
    for req in reqs.iter() {
        let total: Expression = x[req.index]
            .iter()
            .flatten()
            .map(|&v| Expression::from(v))
            .sum();
        let with_slack = total + slack[req.index];
        let hours = req.hours as f64;
        constraints.push(constraint!(with_slack == hours));
    }

    // Constraint 7: channel daily hours through the session-length selectors.
    // A day picks at most one length; the block sum must match it, which
    // also bans 1-hour days wherever 1 is not an allowed length.
    for req in reqs.iter() {
        for d in 0..NUM_DAYS {
            let selectors = &day_len[req.index][d];
            let day_sum: Expression = x[req.index][d].iter().map(|&v| Expression::from(v)).sum();
            if selectors.is_empty() {
                constraints.push(constraint!(day_sum == 0));
                continue;
            }
            let chosen: Expression = selectors.values().map(|&v| Expression::from(v)).sum();
            constraints.push(constraint!(chosen <= 1));
            let length: Expression = selectors
                .iter()
                .map(|(&k, &v)| k as f64 * v)
                .sum();
            let channel = day_sum - length;
            constraints.push(constraint!(channel == 0));
        }
    }

    // Constraint 8: session-length decomposition counts
    for req in reqs.iter() {
        let plan = &plans[req.index];
        for &(k, n) in &plan.exact_counts {
            let count = length_count(&day_len[req.index], k);
            let n = n as f64;
            constraints.push(constraint!(count == n));
        }
        for &(k, n) in &plan.max_counts {
            let count = length_count(&day_len[req.index], k);
            let n = n as f64;
            constraints.push(constraint!(count <= n));
        }
        if plan.pair_single {
            // a lone 1-hour day must be escorted by a 2-hour day
            let singles = length_count(&day_len[req.index], 1);
            let doubles = length_count(&day_len[req.index], 2);
            let escorted = singles - doubles;
            constraints.push(constraint!(escorted <= 0));
        }
    }

    // Constraint 2: at most one course per grade per slot
    let by_grade: BTreeMap<GradeId, Vec<usize>> = reqs
        .iter()
        .map(|r| (r.grade, r.index))
        .into_group_map()
        .into_iter()
        .collect();
    for indices in by_grade.values() {
        for d in 0..NUM_DAYS {
            for b in 0..blocks {
                let occupied: Expression =
                    indices.iter().map(|&i| Expression::from(x[i][d][b])).sum();
                constraints.push(constraint!(occupied <= 1));
            }
        }
    }

    // Constraint 3: at most one course per teacher per slot
    let by_teacher: BTreeMap<TeacherId, Vec<usize>> = reqs
        .iter()
        .map(|r| (r.teacher, r.index))
        .into_group_map()
        .into_iter()
        .collect();
    for indices in by_teacher.values() {
        if indices.len() < 2 {
            continue;
        }
        for d in 0..NUM_DAYS {
            for b in 0..blocks {
                let busy: Expression =
                    indices.iter().map(|&i| Expression::from(x[i][d][b])).sum();
                constraints.push(constraint!(busy <= 1));
            }
        }
    }

    // Constraint 4: per-teacher-per-grade daily cap
    if input.rules.daily_cap {
        let by_pair: BTreeMap<(TeacherId, GradeId), Vec<usize>> = reqs
            .iter()
            .map(|r| ((r.teacher, r.grade), r.index))
            .into_group_map()
            .into_iter()
            .collect();
        for indices in by_pair.values() {
            for d in 0..NUM_DAYS {
                let daily: Expression = indices
                    .iter()
                    .flat_map(|&i| x[i][d].iter().map(|&v| Expression::from(v)))
                    .sum();
                constraints.push(constraint!(daily <= DAILY_CAP));
            }
        }
    }

    // Constraint 5: one contiguous run per requirement per day
    for req in reqs.iter() {
        for d in 0..NUM_DAYS {
            let mut starts = Expression::default();
            for b in 0..blocks {
                let start = vars.add(variable().binary());
                let rises = if b == 0 {
                    Expression::from(start) - x[req.index][d][b]
                } else {
                    Expression::from(start) - x[req.index][d][b] + x[req.index][d][b - 1]
                };
                constraints.push(constraint!(rises >= 0));
                starts += Expression::from(start);
            }
            constraints.push(constraint!(starts <= 1));
        }
    }

    // Constraint 6: a grade's day is a prefix - no holes before the last class
    for indices in by_grade.values() {
        for d in 0..NUM_DAYS {
            for b in 0..blocks - 1 {
                let here: Expression =
                    indices.iter().map(|&i| Expression::from(x[i][d][b])).sum();
                let next: Expression = indices
                    .iter()
                    .map(|&i| Expression::from(x[i][d][b + 1]))
                    .sum();
                let monotone = here - next;
                constraints.push(constraint!(monotone >= 0));
            }
        }
    }

    // Constraint 9 (version 1 only): each grade's day carries exactly one
    // 3-hour session and one or two 2-hour sessions
    if input.version == 1 {
        for (_, indices) in &by_grade {
            let unpatterned: Vec<usize> = indices
                .iter()
                .copied()
                .filter(|&i| reqs.items[i].pattern.is_none())
                .collect();
            if unpatterned.is_empty() {
                continue;
            }
            for d in 0..NUM_DAYS {
                let threes: Expression = unpatterned
                    .iter()
                    .filter_map(|&i| day_len[i][d].get(&3))
                    .map(|&v| Expression::from(v))
                    .sum();
                constraints.push(constraint!(threes == 1));
                let twos: Expression = unpatterned
                    .iter()
                    .filter_map(|&i| day_len[i][d].get(&2))
                    .map(|&v| Expression::from(v))
                    .sum();
                let at_least_one = twos.clone();
                constraints.push(constraint!(at_least_one >= 1));
                constraints.push(constraint!(twos <= 2));
            }
        }
    }

    // Penalty 10: slack
    for req in reqs.iter() {
        objective += SLACK_WEIGHT * slack[req.index];
    }

    // Penalty 11: a grade idle at b with a class later the same day
    for indices in by_grade.values() {
        for d in 0..NUM_DAYS {
            let occ: Vec<Expression> = (0..blocks)
                .map(|b| indices.iter().map(|&i| Expression::from(x[i][d][b])).sum())
                .collect();
            for b in 0..blocks {
                let gap = vars.add(variable().binary());
                for later in b + 1..blocks {
                    let active =
                        Expression::from(gap) - occ[later].clone() + occ[b].clone();
                    constraints.push(constraint!(active >= 0));
                }
                objective += GAP_WEIGHT * gap;
            }
        }
    }

    // Penalty 12: fragmentation between consecutive blocks of one requirement
    for req in reqs.iter() {
        for d in 0..NUM_DAYS {
            for b in 1..blocks {
                let brk = vars.add(variable().binary());
                let up = Expression::from(brk) - x[req.index][d][b] + x[req.index][d][b - 1];
                constraints.push(constraint!(up >= 0));
                let down = Expression::from(brk) - x[req.index][d][b - 1] + x[req.index][d][b];
                constraints.push(constraint!(down >= 0));
                objective += FRAGMENT_WEIGHT * brk;
            }
        }
    }

    // Penalty 13: consecutive teaching days for heavy requirements
    for req in reqs.iter() {
        if req.hours <= 4 {
            continue;
        }
        let teaches: Vec<Expression> = (0..NUM_DAYS)
            .map(|d| {
                day_len[req.index][d]
                    .values()
                    .map(|&v| Expression::from(v))
                    .sum()
            })
            .collect();
        let mut adjacent = Expression::default();
        for d in 0..NUM_DAYS - 1 {
            let adj = vars.add(variable().binary());
            let pair = Expression::from(adj) - teaches[d].clone() - teaches[d + 1].clone();
            constraints.push(constraint!(pair >= -1));
            objective += ADJACENT_DAY_WEIGHT * adj;
            adjacent += Expression::from(adj);
        }
        if req.hours >= 7 {
            constraints.push(constraint!(adjacent <= 1));
        }
        // never three teaching days in a row
        for d in 0..NUM_DAYS - 2 {
            let window = teaches[d].clone() + teaches[d + 1].clone() + teaches[d + 2].clone();
            constraints.push(constraint!(window <= 2));
        }
    }

    info!(
        "modelo armado: {} requerimientos, {} restricciones",
        reqs.len(),
        constraints.len()
    );

    TimetableModel {
        vars,
        objective,
        constraints,
        x,
        slack,
    }
}

fn length_count(days: &[BTreeMap<u8, Variable>], k: u8) -> Expression {
    days.iter()
        .filter_map(|selectors| selectors.get(&k))
        .map(|&v| Expression::from(v))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CourseId;

    fn req(hours: u8, pattern: Option<Vec<u8>>) -> Requirement {
        Requirement {
            index: 0,
            course: CourseId(9),
            grade: crate::types::GradeId(1),
            teacher: TeacherId(1),
            hours,
            pattern,
        }
    }

    #[test]
    fn test_plan_standard_table() {
        let rules = Rules::default();
        assert_eq!(session_plan(&req(2, None), &rules, 2).lengths, vec![2]);
        assert_eq!(session_plan(&req(3, None), &rules, 2).lengths, vec![3]);
        assert_eq!(session_plan(&req(4, None), &rules, 2).lengths, vec![2]);

        let five = session_plan(&req(5, None), &rules, 2);
        assert_eq!(five.lengths, vec![2, 3]);
        assert_eq!(five.max_counts, vec![(2, 1), (3, 1)]);

        let seven = session_plan(&req(7, None), &rules, 2);
        assert_eq!(seven.lengths, vec![2, 3]);
        assert!(seven.max_counts.is_empty());
    }

    #[test]
    fn test_plan_single_hour_follows_omit_rule() {
        let mut rules = Rules::default();
        assert!(session_plan(&req(1, None), &rules, 2).lengths.is_empty());

        rules.omit_single_hour = false;
        assert_eq!(session_plan(&req(1, None), &rules, 2).lengths, vec![1]);
    }

    #[test]
    fn test_plan_pattern_wins_with_exact_counts() {
        let rules = Rules::default();
        let plan = session_plan(&req(6, Some(vec![2, 2, 2])), &rules, 2);
        assert_eq!(plan.lengths, vec![2]);
        assert_eq!(plan.exact_counts, vec![(2, 3)]);

        let plan = session_plan(&req(5, Some(vec![3, 2])), &rules, 1);
        assert_eq!(plan.lengths, vec![2, 3]);
        assert_eq!(plan.exact_counts, vec![(2, 1), (3, 1)]);
    }

    #[test]
    fn test_plan_override_only_applies_to_version_one() {
        let mut rules = Rules::default();
        rules.session_lengths.insert(CourseId(9), vec![1, 2, 3]);

        let v1 = session_plan(&req(3, None), &rules, 1);
        assert_eq!(v1.lengths, vec![1, 2, 3]);
        assert!(v1.pair_single);

        let v2 = session_plan(&req(3, None), &rules, 2);
        assert_eq!(v2.lengths, vec![3]);
        assert!(!v2.pair_single);
    }
}

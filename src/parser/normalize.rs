use crate::error::{Result, SchedulerError};
use crate::types::{
    day_index, CourseId, GradeId, Level, NormalizedInput, RawPayload, Rules, Teacher, TeacherId,
    TimeGrid,
};
use log::warn;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Best-effort integer coercion: accepts numbers and numeric strings,
/// anything else becomes 0 (and the bearing record is dropped upstream)
pub fn coerce_id(value: &Value) -> u32 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn coerce_key(key: &str) -> u32 {
    key.trim().parse().unwrap_or(0)
}

fn coerce_hours(value: &Value) -> u8 {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u8::try_from(v).ok()).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        _ => false,
    }
}

/// Component A: turn the raw payload into integer-keyed maps, exactly once.
/// Fails only on structurally empty inputs; bad records are dropped with a
/// warning and bad availability keys are ignored.
pub fn normalize(raw: &RawPayload) -> Result<NormalizedInput> {
    if raw.docentes.is_empty() || raw.asignaciones.is_empty() || raw.horas_curso_grado.is_empty()
    {
        return Err(SchedulerError::InvalidInput(
            "docentes, asignaciones y horas_curso_grado no pueden estar vacíos".to_string(),
        )
        .into());
    }

    let level = Level::parse(&raw.nivel);
    let grid = TimeGrid::for_version(raw.version);

    let mut teachers = Vec::new();
    for doc in &raw.docentes {
        let id = coerce_id(&doc.id);
        if id == 0 {
            warn!("docente con id no numérico descartado: {:?}", doc.id);
            continue;
        }
        teachers.push(Teacher {
            id: TeacherId(id),
            nombre: doc.nombre.clone(),
            jornada_total: doc.jornada_total,
            aula_id: doc.aula_id.as_ref().map(coerce_id).filter(|&a| a != 0),
        });
    }

    let mut assignments = BTreeMap::new();
    for (course_key, grades) in &raw.asignaciones {
        let course = coerce_key(course_key);
        if course == 0 {
            warn!("asignación con curso no numérico descartada: {course_key:?}");
            continue;
        }
        for (grade_key, assignment) in grades {
            let grade = coerce_key(grade_key);
            let teacher = coerce_id(&assignment.docente_id);
            if grade == 0 || teacher == 0 {
                warn!("asignación inválida descartada: curso {course}, grado {grade_key:?}");
                continue;
            }
            if !level.contains_grade(GradeId(grade)) {
                warn!("grado {grade} fuera del rango de {level}; se programará igualmente");
            }
            assignments.insert((CourseId(course), GradeId(grade)), TeacherId(teacher));
        }
    }

    let mut hours = BTreeMap::new();
    for (course_key, grades) in &raw.horas_curso_grado {
        let course = coerce_key(course_key);
        if course == 0 {
            continue;
        }
        for (grade_key, value) in grades {
            let grade = coerce_key(grade_key);
            let h = coerce_hours(value);
            // zero or missing means "not required"
            if grade == 0 || h == 0 {
                continue;
            }
            hours.insert((CourseId(course), GradeId(grade)), h);
        }
    }

    let mut patterns = BTreeMap::new();
    for (course_key, grades) in &raw.patrones {
        let course = coerce_key(course_key);
        if course == 0 {
            continue;
        }
        for (grade_key, pattern) in grades {
            let grade = coerce_key(grade_key);
            if grade == 0 {
                continue;
            }
            let key = (CourseId(course), GradeId(grade));
            let Some(&required) = hours.get(&key) else {
                warn!("patrón para curso {course}, grado {grade} sin horas requeridas; ignorado");
                continue;
            };
            let sum: u32 = pattern.iter().map(|&p| p as u32).sum();
            if pattern.is_empty()
                || pattern.iter().any(|&p| p == 0 || p > grid.blocks)
                || sum != required as u32
            {
                warn!(
                    "patrón {pattern:?} inválido para las {required} horas de curso {course}, grado {grade}; ignorado"
                );
                continue;
            }
            patterns.insert(key, pattern.clone());
        }
    }

    let availability = normalize_restrictions(&raw.restricciones, grid);

    let mut session_lengths = BTreeMap::new();
    for (course_key, lengths) in &raw.reglas.duraciones_sesion {
        let course = coerce_key(course_key);
        if course == 0 || lengths.is_empty() {
            continue;
        }
        let mut lengths: Vec<u8> = lengths
            .iter()
            .copied()
            .filter(|&k| k >= 1 && k <= grid.blocks)
            .collect();
        lengths.sort_unstable();
        lengths.dedup();
        if !lengths.is_empty() {
            session_lengths.insert(CourseId(course), lengths);
        }
    }

    let rules = Rules {
        omit_single_hour: raw.reglas.omitir_una_hora.unwrap_or(true),
        daily_cap: raw.reglas.tope_diario.unwrap_or(true),
        session_lengths,
    };

    Ok(NormalizedInput {
        teachers,
        assignments,
        hours,
        availability,
        patterns,
        level,
        version: raw.version,
        grid,
        rules,
        overwrite: raw.overwrite,
    })
}

/// Parse availability whitelists. Block indices may come 0- or 1-based: the
/// rule set is treated as 1-based (and rebased) only when it contains a
/// block 1 and no block 0 anywhere.
fn normalize_restrictions(
    raw: &BTreeMap<String, BTreeMap<String, Value>>,
    grid: TimeGrid,
) -> BTreeMap<TeacherId, BTreeSet<(usize, u8)>> {
    let mut parsed: BTreeMap<TeacherId, Vec<(usize, u32)>> = BTreeMap::new();
    let mut saw_zero = false;
    let mut saw_one = false;

    for (teacher_key, slots) in raw {
        let teacher = coerce_key(teacher_key);
        if teacher == 0 {
            warn!("restricciones con docente no numérico descartadas: {teacher_key:?}");
            continue;
        }
        // An empty rule map still registers the teacher: it whitelists nothing
        let entry = parsed.entry(TeacherId(teacher)).or_default();
        for (slot_key, allowed) in slots {
            if !truthy(allowed) {
                continue;
            }
            let Some((day_part, block_part)) = slot_key.rsplit_once('-') else {
                warn!("clave de restricción ilegible ignorada: {slot_key:?}");
                continue;
            };
            let Some(day) = day_index(day_part) else {
                warn!("día desconocido en restricción ignorado: {day_part:?}");
                continue;
            };
            let Ok(block) = block_part.trim().parse::<u32>() else {
                warn!("bloque no numérico en restricción ignorado: {slot_key:?}");
                continue;
            };
            saw_zero |= block == 0;
            saw_one |= block == 1;
            entry.push((day, block));
        }
    }

    let rebase = !saw_zero && saw_one;
    parsed
        .into_iter()
        .map(|(teacher, slots)| {
            let set = slots
                .into_iter()
                .filter_map(|(day, block)| {
                    let block = if rebase { block - 1 } else { block };
                    (block < grid.blocks as u32).then_some((day, block as u8))
                })
                .collect();
            (teacher, set)
        })
        .collect()
}

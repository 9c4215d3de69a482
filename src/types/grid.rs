use super::GradeId;
use std::fmt;
use std::ops::RangeInclusive;

/// Canonical weekday names, in grid order. Stored output always uses the
/// accented spelling; comparisons go through [`fold_day`].
pub const DAY_NAMES: [&str; 5] = ["lunes", "martes", "miércoles", "jueves", "viernes"];

/// Days per week in the timetable grid
pub const NUM_DAYS: usize = 5;

/// School level; selects the grade id range and the availability policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Primaria,
    Secundaria,
}

impl Level {
    /// Anything that does not fold to "primaria" is treated as Secundaria,
    /// matching the upstream payloads
    pub fn parse(raw: &str) -> Self {
        if fold_day(raw) == "primaria" {
            Level::Primaria
        } else {
            Level::Secundaria
        }
    }

    /// Grade ids that belong to this level
    pub fn grades(&self) -> RangeInclusive<u32> {
        match self {
            Level::Primaria => 6..=11,
            Level::Secundaria => 1..=5,
        }
    }

    pub fn contains_grade(&self, grade: GradeId) -> bool {
        self.grades().contains(&grade.0)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Primaria => write!(f, "Primaria"),
            Level::Secundaria => write!(f, "Secundaria"),
        }
    }
}

/// ASCII-fold and lowercase a day name for comparison ("Miércoles" -> "miercoles")
pub fn fold_day(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

/// Resolve a day name (accented or not, any case) to its grid index
pub fn day_index(name: &str) -> Option<usize> {
    let folded = fold_day(name);
    DAY_NAMES.iter().position(|d| fold_day(d) == folded)
}

/// Grid dimensions for one schedule version: 5 weekdays x `blocks` slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeGrid {
    pub blocks: u8,
}

impl TimeGrid {
    /// Version 1 runs on a 7-block day; every other version uses 8
    pub fn for_version(version: u32) -> Self {
        let blocks = if version == 1 { 7 } else { 8 };
        TimeGrid { blocks }
    }

    pub fn total_slots(&self) -> u32 {
        NUM_DAYS as u32 * self.blocks as u32
    }

    pub fn block_range(&self) -> std::ops::Range<u8> {
        0..self.blocks
    }
}

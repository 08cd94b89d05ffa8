//! Time-slot labelling.
//!
//! This module produces the canonical ordered row index for every matrix.
//! A normal grid covers one calendar day. An extended grid covers two, so
//! the early-morning tail of a shift that started the previous evening
//! (`25:00`) is distinguishable from that morning's own `01:00` slot.

use crate::config::MINUTES_PER_DAY;
use crate::error::{EngineError, EngineResult};

/// Minutes covered by an extended grid.
pub const EXTENDED_SPAN_MINUTES: u32 = 2 * MINUTES_PER_DAY;

/// Produces the ordered slot labels for a grid.
///
/// Returns exactly `1440 / slot_minutes` labels starting at `00:00` when
/// `extended` is false, and twice as many (up to `47:30` for 30-minute
/// slots) when it is true.
///
/// # Errors
///
/// Returns [`EngineError::InvalidConfig`] if `slot_minutes` does not evenly
/// divide a day.
///
/// # Example
///
/// ```
/// use shortage_engine::calculation::generate_time_labels;
///
/// let labels = generate_time_labels(360, false).unwrap();
/// assert_eq!(labels, vec!["00:00", "06:00", "12:00", "18:00"]);
///
/// let extended = generate_time_labels(360, true).unwrap();
/// assert_eq!(extended.len(), 8);
/// assert_eq!(extended[4], "24:00");
/// ```
pub fn generate_time_labels(slot_minutes: u32, extended: bool) -> EngineResult<Vec<String>> {
    if slot_minutes == 0 || MINUTES_PER_DAY % slot_minutes != 0 {
        return Err(EngineError::invalid_config(
            "slots.slot_minutes",
            format!("{} does not evenly divide {}", slot_minutes, MINUTES_PER_DAY),
        ));
    }

    let span = if extended {
        EXTENDED_SPAN_MINUTES
    } else {
        MINUTES_PER_DAY
    };

    Ok((0..span)
        .step_by(slot_minutes as usize)
        .map(format_label)
        .collect())
}

/// Formats minutes since the start of the grid as `HH:MM`.
pub fn format_label(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Parses an `H:MM`, `HH:MM` or `HH:MM:SS` label into minutes since midnight.
///
/// Hours may exceed 23. Returns `None` for anything else.
pub fn parse_label(label: &str) -> Option<u32> {
    let mut parts = label.trim().split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    if let Some(seconds) = parts.next() {
        let seconds: u32 = seconds.parse().ok()?;
        if seconds >= 60 {
            return None;
        }
    }
    if parts.next().is_some() || minutes >= 60 {
        return None;
    }
    hours.checked_mul(60)?.checked_add(minutes)
}

/// Where a raw slot label lands on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPosition {
    /// Row in the label sequence.
    pub row: usize,
    /// Whole days to add to the record's date.
    pub day_offset: u32,
}

/// An ordered slot label sequence together with the grid it was built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeLabels {
    slot_minutes: u32,
    extended: bool,
    labels: Vec<String>,
}

impl TimeLabels {
    /// Builds the label sequence for a grid. See [`generate_time_labels`].
    pub fn new(slot_minutes: u32, extended: bool) -> EngineResult<Self> {
        let labels = generate_time_labels(slot_minutes, extended)?;
        Ok(Self {
            slot_minutes,
            extended,
            labels,
        })
    }

    /// The labels, in row order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false for a valid grid.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Slot width in minutes.
    pub fn slot_minutes(&self) -> u32 {
        self.slot_minutes
    }

    /// Whether the grid covers two days.
    pub fn extended(&self) -> bool {
        self.extended
    }

    /// Hour-equivalent of a single slot.
    pub fn slot_hours(&self) -> f64 {
        f64::from(self.slot_minutes) / 60.0
    }

    /// Minutes covered by the grid.
    pub fn span_minutes(&self) -> u32 {
        self.labels.len() as u32 * self.slot_minutes
    }

    /// Places a raw label on the grid.
    ///
    /// Off-boundary minutes floor to their containing slot. Labels past the
    /// end of the grid roll onto following days one day at a time, so on a
    /// normal grid `25:00` is row `01:00` with a one-day offset while on an
    /// extended grid it stays on its own row. Returns `None` for malformed
    /// labels.
    pub fn position(&self, label: &str) -> Option<SlotPosition> {
        let mut minutes = parse_label(label)?;
        let span = self.span_minutes();
        let mut day_offset = 0;
        while minutes >= span {
            minutes -= MINUTES_PER_DAY;
            day_offset += 1;
        }
        Some(SlotPosition {
            row: (minutes / self.slot_minutes) as usize,
            day_offset,
        })
    }
}

//! Self-monitored glucose log.

use serde::{Deserialize, Serialize};

use crate::classify::{GlucoseBand, GlucoseTarget};
use crate::metrics::compute_glucose_average;
use crate::validation::{ValidationResult, GLUCOSE};

/// Daily measurement slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GlucoseSlot {
    BeforeBreakfast,
    BeforeLunch,
    BeforeDinner,
    BeforeBed,
}

impl GlucoseSlot {
    pub const ALL: [GlucoseSlot; 4] = [
        GlucoseSlot::BeforeBreakfast,
        GlucoseSlot::BeforeLunch,
        GlucoseSlot::BeforeDinner,
        GlucoseSlot::BeforeBed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            GlucoseSlot::BeforeBreakfast => "Before Breakfast",
            GlucoseSlot::BeforeLunch => "Before Lunch",
            GlucoseSlot::BeforeDinner => "Before Dinner",
            GlucoseSlot::BeforeBed => "Before Bed",
        }
    }

    /// Target range (mg/dL) for this slot, inclusive.
    pub fn target_range(&self) -> (f64, f64) {
        match self {
            GlucoseSlot::BeforeBed => (100.0, 140.0),
            _ => (80.0, 130.0),
        }
    }
}

/// Four optional readings in mg/dL (0-600).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlucoseLog {
    pub before_breakfast: Option<f64>,
    pub before_lunch: Option<f64>,
    pub before_dinner: Option<f64>,
    pub before_bed: Option<f64>,
}

impl GlucoseLog {
    pub fn get(&self, slot: GlucoseSlot) -> Option<f64> {
        match slot {
            GlucoseSlot::BeforeBreakfast => self.before_breakfast,
            GlucoseSlot::BeforeLunch => self.before_lunch,
            GlucoseSlot::BeforeDinner => self.before_dinner,
            GlucoseSlot::BeforeBed => self.before_bed,
        }
    }

    pub fn set(&mut self, slot: GlucoseSlot, value: Option<f64>) {
        let target = match slot {
            GlucoseSlot::BeforeBreakfast => &mut self.before_breakfast,
            GlucoseSlot::BeforeLunch => &mut self.before_lunch,
            GlucoseSlot::BeforeDinner => &mut self.before_dinner,
            GlucoseSlot::BeforeBed => &mut self.before_bed,
        };
        *target = value;
    }

    /// Readings in slot order.
    pub fn readings(&self) -> [Option<f64>; 4] {
        [
            self.before_breakfast,
            self.before_lunch,
            self.before_dinner,
            self.before_bed,
        ]
    }

    /// Rounded mean of the present readings; 0 when none are logged.
    pub fn average(&self) -> u32 {
        compute_glucose_average(&self.readings())
    }

    /// Average against the 154 mg/dL target, or `None` without readings.
    pub fn average_target(&self) -> Option<GlucoseTarget> {
        match self.average() {
            0 => None,
            avg => Some(GlucoseTarget::from_average(avg as f64)),
        }
    }

    /// Any present reading below 70 mg/dL.
    pub fn has_hypoglycemia(&self) -> bool {
        self.readings()
            .iter()
            .flatten()
            .any(|v| GlucoseBand::from_value(*v) == GlucoseBand::Hypoglycemic)
    }

    /// Present readings outside their slot's target range.
    pub fn off_target_slots(&self) -> Vec<GlucoseSlot> {
        GlucoseSlot::ALL
            .into_iter()
            .filter(|slot| {
                self.get(*slot).map_or(false, |v| {
                    let (lo, hi) = slot.target_range();
                    v < lo || v > hi
                })
            })
            .collect()
    }

    pub fn validate(&self) -> ValidationResult<()> {
        for reading in self.readings() {
            GLUCOSE.check_optional(reading)?;
        }
        Ok(())
    }
}

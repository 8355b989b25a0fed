//! Heuristic confidence scoring for pattern matches.
//!
//! The score gates whether the pipeline trusts the pattern path or escalates
//! to the generative fallback. It starts from a fixed baseline, grows with
//! each well-formed numeric parameter and each category keyword present in
//! the text, and is capped to [0, 1]. Catalogued misspellings are pinned to
//! a high floor: those inputs have been verified to map unambiguously to an
//! intent, so the unusual spelling must not depress the score.

use crate::patterns::{ConstraintCategory, PatternMatch};

/// Minimum pattern confidence required to bypass the fallback parser.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.85;

const BASELINE: f64 = 0.55;
const NUMERIC_BONUS: f64 = 0.2;
const NUMERIC_BONUS_CAP: f64 = 0.25;
const KEYWORD_BONUS: f64 = 0.05;
const KEYWORD_BONUS_CAP: f64 = 0.2;
const MISSPELLING_FLOOR: f64 = 0.85;

/// Misspellings seen often enough in user prompts to be catalogued. Each maps
/// unambiguously to its intended keyword.
const KNOWN_MISSPELLINGS: &[&str] = &[
    "minimun",
    "miniumum",
    "minumum",
    "maxium",
    "maximun",
    "capasity",
    "vehical",
    "vehicel",
    "costumer",
];

#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    baseline: f64,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self { baseline: BASELINE }
    }
}

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score a pattern match against the normalized prompt text.
    pub fn score(&self, matched: &PatternMatch, text: &str) -> f64 {
        let mut score = self.baseline;

        let mut numeric_bonus = 0.0;
        for value in matched.params.values() {
            if is_well_formed_number(value) {
                numeric_bonus += NUMERIC_BONUS;
            }
        }
        score += numeric_bonus.min(NUMERIC_BONUS_CAP);

        let mut keyword_bonus = 0.0;
        for keyword in category_keywords(matched.category) {
            if text.contains(keyword) {
                keyword_bonus += KEYWORD_BONUS;
            }
        }
        score += keyword_bonus.min(KEYWORD_BONUS_CAP);

        if KNOWN_MISSPELLINGS.iter().any(|m| text.contains(m)) {
            score = score.max(MISSPELLING_FLOOR);
        }

        let score = score.clamp(0.0, 1.0);
        tracing::debug!(category = ?matched.category, score, "scored pattern match");
        score
    }
}

/// A parameter counts as numeric if it is a plain number or a clock time.
fn is_well_formed_number(value: &str) -> bool {
    if value.parse::<f64>().is_ok() {
        return true;
    }
    let bare = value
        .trim_end_matches("am")
        .trim_end_matches("pm")
        .trim();
    match bare.split_once(':') {
        Some((h, m)) => h.parse::<u32>().is_ok() && m.parse::<u32>().is_ok(),
        None => bare.parse::<u32>().is_ok(),
    }
}

/// High-signal keywords per category. Checked by containment so "max" also
/// covers "maximum".
fn category_keywords(category: ConstraintCategory) -> &'static [&'static str] {
    match category {
        ConstraintCategory::Capacity => &["capacity", "kg", "kilo", "ton", "carry", "hold", "load", "exceed", "max", "vehicle", "truck"],
        ConstraintCategory::Distance => &["distance", "km", "mile", "travel", "route", "max"],
        ConstraintCategory::TimeWindow => &["between", "window", "am", "pm", "served", "delivered", "open"],
        ConstraintCategory::WorkingHours => &["hour", "work", "shift", "duration", "driver", "route"],
        ConstraintCategory::MinVehicles => &["vehicle", "truck", "least", "minimum", "use", "require"],
        ConstraintCategory::MaxVehicles => &["vehicle", "truck", "most", "max", "use"],
        ConstraintCategory::VehicleForbidden => &["vehicle", "truck", "cannot", "not", "forbid", "visit", "serve"],
        ConstraintCategory::VehicleExclusive => &["only", "vehicle", "truck", "serve", "visit"],
        ConstraintCategory::SameVehicle => &["same", "together", "route", "vehicle", "group"],
        ConstraintCategory::SeparateVehicles => &["not", "never", "different", "separate", "together", "vehicle"],
        ConstraintCategory::Priority => &["priority", "important", "urgent", "first", "critical", "high"],
    }
}

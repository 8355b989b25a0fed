//! Structured pattern matching over normalized prompt text.
//!
//! Patterns are grouped by constraint category. Categories are checked in a
//! fixed precedence order: multi-entity and compound forms come first, so a
//! sentence like "use at least 2 vehicles and node 1 and node 2 must be on
//! the same route" is captured by the grouping pattern rather than the
//! simpler vehicle-count one. Within a category the first matching pattern
//! wins, and parameters come out of named captures only — no greedy
//! inference. Matching is a pure function of the text.

use std::collections::BTreeMap;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintCategory {
    SeparateVehicles,
    SameVehicle,
    VehicleExclusive,
    VehicleForbidden,
    TimeWindow,
    WorkingHours,
    Capacity,
    Distance,
    MinVehicles,
    MaxVehicles,
    Priority,
}

/// Named parameters extracted from a pattern's captures.
pub type MatchParams = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub category: ConstraintCategory,
    pub params: MatchParams,
    /// Byte span of the match within the normalized text.
    pub span: (usize, usize),
}

/// Lowercase and collapse whitespace. All matching runs on this form.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

const ENTITY: &str = r"(?:nodes?|customers?|stops?|locations?|points?)";
const VEHICLE: &str = r"(?:vehicles?|trucks?|vans?|drivers?)";
const MODAL: &str = r"(?:must|should|have\s+to|has\s+to|need\s+to|needs\s+to)";
// Catalogued misspellings are folded into the alternations rather than
// handled downstream; the scorer separately pins their confidence.
const AT_MOST: &str =
    r"(?:at\s+most|no\s+more\s+than|not\s+more\s+than|up\s+to|max(?:imum|imun|ium)?(?:\s+of)?)";
const AT_LEAST: &str =
    r"(?:at\s+least|no\s+fewer\s+than|min(?:imum|imun|iumum|umum)?(?:\s+of)?)";
const NUMBER: &str = r"(?P<value>\d+(?:\.\d+)?)";
const CLOCK: &str = r"\d{1,2}(?::\d{2})?\s*(?:am|pm)?";
const CAP_UNIT: &str =
    r"(?P<unit>kgs?|kilograms?|kilos?|t|tons?|tonnes?|units?|items?|boxes|packages?|pallets?)";
const DIST_UNIT: &str = r"(?P<unit>km|kilomet(?:er|re)s?|mi|miles?)";
const TIME_UNIT: &str = r"(?P<unit>hours?|hrs?|h|minutes?|mins?|m)";

pub struct PatternMatcher {
    tables: Vec<(ConstraintCategory, Vec<Regex>)>,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternMatcher {
    pub fn new() -> Self {
        let tables = vec![
            (ConstraintCategory::SeparateVehicles, separate_vehicle_patterns()),
            (ConstraintCategory::SameVehicle, same_vehicle_patterns()),
            (ConstraintCategory::VehicleExclusive, vehicle_exclusive_patterns()),
            (ConstraintCategory::VehicleForbidden, vehicle_forbidden_patterns()),
            (ConstraintCategory::TimeWindow, time_window_patterns()),
            (ConstraintCategory::WorkingHours, working_hours_patterns()),
            (ConstraintCategory::Capacity, capacity_patterns()),
            (ConstraintCategory::Distance, distance_patterns()),
            (ConstraintCategory::MinVehicles, min_vehicle_patterns()),
            (ConstraintCategory::MaxVehicles, max_vehicle_patterns()),
            (ConstraintCategory::Priority, priority_patterns()),
        ];
        Self { tables }
    }

    /// First match across the category precedence order, or `None`.
    pub fn match_text(&self, normalized: &str) -> Option<PatternMatch> {
        for (category, patterns) in &self.tables {
            for pattern in patterns {
                if let Some(captures) = pattern.captures(normalized) {
                    let whole = captures.get(0)?;
                    let mut params = MatchParams::new();
                    for name in pattern.capture_names().flatten() {
                        if let Some(value) = captures.name(name) {
                            params.insert(name.to_string(), value.as_str().trim().to_string());
                        }
                    }
                    tracing::debug!(
                        category = ?category,
                        matched = whole.as_str(),
                        "pattern matched"
                    );
                    return Some(PatternMatch {
                        category: *category,
                        params,
                        span: (whole.start(), whole.end()),
                    });
                }
            }
        }
        None
    }
}

fn compile(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("bad builtin pattern {p}: {e}")))
        .collect()
}

fn separate_vehicle_patterns() -> Vec<Regex> {
    compile(&[
        format!(
            r"{ENTITY}\s+(?P<first>\w+)\s+and\s+{ENTITY}\s+(?P<second>\w+)\s+{MODAL}\s+(?:not|never)\s+(?:be\s+)?(?:served\s+together|visited\s+together|on\s+the\s+same\s+(?:vehicle|route|truck)|share\s+a\s+(?:vehicle|route|truck)|go\s+together)"
        ),
        format!(
            r"{ENTITY}\s+(?P<first>\w+)\s+and\s+{ENTITY}\s+(?P<second>\w+)\s+{MODAL}\s+(?:be\s+)?(?:on|in|served\s+by|assigned\s+to)\s+different\s+(?:vehicles?|routes?|trucks?)"
        ),
        format!(
            r"(?:separate|keep\s+apart)\s+{ENTITY}\s+(?P<first>\w+)\s+(?:and|from)\s+{ENTITY}\s+(?P<second>\w+)"
        ),
    ])
}

fn same_vehicle_patterns() -> Vec<Regex> {
    compile(&[
        format!(
            r"{ENTITY}\s+(?P<first>\w+)\s+and\s+{ENTITY}\s+(?P<second>\w+)\s+{MODAL}\s+(?:be\s+)?(?:served\s+together|visited\s+together|on\s+the\s+same\s+(?:vehicle|route|truck)|served\s+by\s+the\s+same\s+(?:vehicle|truck|driver)|share\s+a\s+(?:vehicle|route|truck)|go\s+together)"
        ),
        format!(
            r"(?:serve|deliver|visit)\s+{ENTITY}\s+(?P<first>\w+)\s+and\s+{ENTITY}\s+(?P<second>\w+)\s+together"
        ),
        format!(
            r"(?:group|pair)\s+{ENTITY}\s+(?P<first>\w+)\s+(?:and|with)\s+{ENTITY}\s+(?P<second>\w+)"
        ),
    ])
}

fn vehicle_exclusive_patterns() -> Vec<Regex> {
    compile(&[
        format!(
            r"only\s+{VEHICLE}\s+(?P<vehicle>\w+)\s+(?:can|may|should|is\s+allowed\s+to)\s+(?:visit|serve|deliver\s+to|go\s+to|handle)\s+{ENTITY}\s+(?P<location>\w+)"
        ),
        format!(
            r"{ENTITY}\s+(?P<location>\w+)\s+(?:can|may|must)\s+only\s+be\s+(?:visited|served|delivered|handled)\s+by\s+{VEHICLE}\s+(?P<vehicle>\w+)"
        ),
        format!(
            r"{VEHICLE}\s+(?P<vehicle>\w+)\s+is\s+the\s+only\s+one\s+(?:that|who|allowed\s+to)\s+(?:can\s+)?(?:visit|serve)s?\s+{ENTITY}\s+(?P<location>\w+)"
        ),
    ])
}

fn vehicle_forbidden_patterns() -> Vec<Regex> {
    compile(&[
        format!(
            r"{VEHICLE}\s+(?P<vehicle>\w+)\s+(?:cannot|can\s*not|must\s+not|may\s+not|should\s+not|is\s+not\s+allowed\s+to|is\s+forbidden\s+(?:from|to))\s+(?:visit|serve|deliver\s+to|go\s+to|enter|handle)(?:ing)?\s+{ENTITY}\s+(?P<location>\w+)"
        ),
        format!(
            r"(?:forbid|ban|block|exclude)\s+{VEHICLE}\s+(?P<vehicle>\w+)\s+from\s+(?:visiting\s+|serving\s+|entering\s+)?{ENTITY}\s+(?P<location>\w+)"
        ),
        format!(
            r"{ENTITY}\s+(?P<location>\w+)\s+{MODAL}\s+not\s+be\s+(?:visited|served)\s+by\s+{VEHICLE}\s+(?P<vehicle>\w+)"
        ),
    ])
}

fn time_window_patterns() -> Vec<Regex> {
    compile(&[
        format!(
            r"{ENTITY}\s+(?P<customer>\w+)\s+(?:{MODAL}\s+)?(?:be\s+)?(?:served|visited|delivered)(?:\s+to)?\s+(?:only\s+)?between\s+(?P<start>{CLOCK})\s+and\s+(?P<end>{CLOCK})"
        ),
        format!(
            r"(?:deliver|serve|visit)\s+(?:to\s+)?{ENTITY}\s+(?P<customer>\w+)\s+(?:only\s+)?between\s+(?P<start>{CLOCK})\s+and\s+(?P<end>{CLOCK})"
        ),
        format!(
            r"(?:time\s+window|delivery\s+window)\s+(?:for|of)\s+{ENTITY}\s+(?P<customer>\w+)\s+(?:is|of)?\s*(?P<start>{CLOCK})\s*(?:-|–|to|until)\s*(?P<end>{CLOCK})"
        ),
        format!(
            r"{ENTITY}\s+(?P<customer>\w+)\s+is\s+(?:only\s+)?(?:open|available)\s+(?:from\s+)?(?P<start>{CLOCK})\s*(?:-|–|to|until)\s*(?P<end>{CLOCK})"
        ),
    ])
}

fn working_hours_patterns() -> Vec<Regex> {
    compile(&[
        format!(
            r"{VEHICLE}\s+(?:can|may|must|should)?\s*(?:work|drive|operate|be\s+on\s+the\s+road)\s+(?:for\s+)?{AT_MOST}\s+{NUMBER}\s*{TIME_UNIT}"
        ),
        format!(
            r"(?:shift|working\s+hours|work\s+day|route\s+duration|driving\s+time)\s+(?:is\s+|of\s+|{MODAL}\s+(?:be\s+|not\s+exceed\s+)?)?(?:limited\s+to\s+|{AT_MOST}\s+)?{NUMBER}\s*{TIME_UNIT}"
        ),
        format!(
            r"(?:no\s+)?routes?\s+(?:longer|may\s+not\s+last\s+more)\s+than\s+{NUMBER}\s*{TIME_UNIT}"
        ),
    ])
}

fn capacity_patterns() -> Vec<Regex> {
    compile(&[
        format!(
            r"(?:each\s+|every\s+|a\s+|the\s+|no\s+)?{VEHICLE}\s+(?:can|may|should|must)?\s*(?:carry|hold|load|take|transport)\s+{AT_MOST}\s+{NUMBER}\s*{CAP_UNIT}?"
        ),
        format!(
            r"(?:vehicle\s+|truck\s+)?capa[sc]ity\s+(?:{MODAL}\s+|can\s+|may\s+)?(?:not\s+exceed|be\s+at\s+most|be\s+limited\s+to|is\s+limited\s+to|of|is)\s+{NUMBER}\s*{CAP_UNIT}?"
        ),
        format!(
            r"max(?:imum|imun|ium)?\s+(?:vehicle\s+|truck\s+)?(?:capa[sc]ity|load|weight)\s+(?:of\s+|is\s+)?{NUMBER}\s*{CAP_UNIT}?"
        ),
        format!(r"max(?:imum|imun|ium)?\s+{NUMBER}\s*{CAP_UNIT}\b"),
        format!(r"{AT_MOST}\s+{NUMBER}\s*{CAP_UNIT}\s+per\s+{VEHICLE}"),
    ])
}

fn distance_patterns() -> Vec<Regex> {
    compile(&[
        format!(
            r"(?:no\s+)?(?:{VEHICLE}|routes?)\s+(?:can|may|should|must)?\s*(?:travel|drive|cover|go)\s+(?:{AT_MOST}|more\s+than|farther\s+than|further\s+than)\s+{NUMBER}\s*{DIST_UNIT}"
        ),
        format!(
            r"(?:max(?:imum|imun|ium)?|total)\s+(?:route\s+|travel\s+|driving\s+)?distance\s+(?:of\s+|is\s+|per\s+vehicle\s+(?:of\s+|is\s+)?)?{NUMBER}\s*{DIST_UNIT}?"
        ),
        format!(
            r"(?:route\s+|travel\s+|driving\s+)?distance\s+(?:{MODAL}\s+|can\s+|may\s+)?(?:not\s+exceed|be\s+at\s+most|be\s+limited\s+to|stay\s+under)\s+{NUMBER}\s*{DIST_UNIT}?"
        ),
        format!(r"routes?\s+{MODAL}\s+be\s+(?:shorter|less)\s+than\s+{NUMBER}\s*{DIST_UNIT}?"),
    ])
}

fn min_vehicle_patterns() -> Vec<Regex> {
    compile(&[
        format!(r"(?:use|need|require|deploy|dispatch|run)\s+{AT_LEAST}\s+(?P<count>\d+)\s+{VEHICLE}"),
        format!(r"{AT_LEAST}\s+(?P<count>\d+)\s+{VEHICLE}\s+(?:are|is)\s+(?:required|needed)"),
        format!(r"{AT_LEAST}\s+(?P<count>\d+)\s+{VEHICLE}\b"),
    ])
}

fn max_vehicle_patterns() -> Vec<Regex> {
    compile(&[
        format!(
            r"(?:use|need|deploy|dispatch|run)\s+{AT_MOST}\s+(?P<count>\d+)\s+{VEHICLE}"
        ),
        format!(r"(?:do\s+not|don't|never)\s+use\s+more\s+than\s+(?P<count>\d+)\s+{VEHICLE}"),
        format!(r"{AT_MOST}\s+(?P<count>\d+)\s+{VEHICLE}\b"),
    ])
}

fn priority_patterns() -> Vec<Regex> {
    compile(&[
        format!(
            r"{ENTITY}\s+(?P<customer>\w+)\s+(?:is|has)\s+(?:a\s+)?(?:(?P<level>high|top|medium|normal|low)\s+)?priority"
        ),
        format!(r"prioriti[sz]e\s+{ENTITY}\s+(?P<customer>\w+)"),
        format!(r"(?:serve|visit|deliver\s+to)\s+{ENTITY}\s+(?P<customer>\w+)\s+first"),
        format!(r"{ENTITY}\s+(?P<customer>\w+)\s+is\s+(?:urgent|critical|important)"),
    ])
}

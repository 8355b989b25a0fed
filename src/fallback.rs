//! Generative fallback parsing.
//!
//! When no pattern matches, or the pattern confidence is below threshold, the
//! prompt is sent to an external language-understanding service with a fixed,
//! schema-constrained instruction template. Any failure on that path — the
//! service unreachable, a timeout, a non-2xx status, a response that is not
//! the requested JSON — degrades to a small local heuristic pattern set that
//! tags its output with a low confidence and `requires_manual_review`.
//! Remote failures never propagate out of the pipeline.

use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::context::ProblemContext;
use crate::error::{BackendError, ParseError};
use crate::patterns::{ConstraintCategory, MatchParams};
use crate::types::ParsingMethod;

/// Configuration for the remote language-understanding service.
///
/// Constructed once by the caller and passed into the parser; there is no
/// ambient global client or credential state.
#[derive(Debug, Clone)]
pub struct GenerativeConfig {
    /// Base URL of an OpenAI-compatible chat completion endpoint.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            model: "default".to_string(),
            api_key: None,
            timeout_secs: 20,
        }
    }
}

/// A single request/response exchange with the language service.
pub trait GenerativeBackend {
    fn complete(&self, prompt: &str) -> Result<String, BackendError>;
}

#[derive(Debug, Clone)]
pub struct HttpGenerativeClient {
    config: GenerativeConfig,
    client: reqwest::blocking::Client,
}

impl HttpGenerativeClient {
    pub fn new(config: GenerativeConfig) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl GenerativeBackend for HttpGenerativeClient {
    fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let body = serde_json::json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [
                { "role": "user", "content": prompt },
            ],
        });

        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(BackendError::EmptyResponse)
    }
}

/// The schema the service is instructed to fill in.
#[derive(Debug, Deserialize)]
struct GenerativeParse {
    constraint_type: String,
    #[serde(default)]
    parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    entities: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    mathematical_description: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    #[allow(dead_code)]
    interpretation: Option<String>,
}

/// What the fallback path hands back to the pipeline: the same shape the
/// pattern matcher produces, plus provenance.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub category: ConstraintCategory,
    pub params: MatchParams,
    pub confidence: f64,
    pub method: ParsingMethod,
    pub requires_manual_review: bool,
    pub description: Option<String>,
}

const GENERATIVE_CONFIDENCE_DEFAULT: f64 = 0.7;
const HEURISTIC_CONFIDENCE: f64 = 0.4;

pub struct FallbackParser {
    backend: Option<Box<dyn GenerativeBackend>>,
    heuristics: Vec<(ConstraintCategory, Regex)>,
}

impl FallbackParser {
    pub fn new(backend: Option<Box<dyn GenerativeBackend>>) -> Self {
        Self {
            backend,
            heuristics: heuristic_patterns(),
        }
    }

    /// Parse a prompt the pattern matcher could not handle confidently.
    pub fn parse(
        &self,
        normalized: &str,
        ctx: &ProblemContext,
    ) -> Result<FallbackOutcome, ParseError> {
        if let Some(backend) = &self.backend {
            let prompt = build_instruction(normalized, ctx);
            match backend.complete(&prompt) {
                Ok(raw) => match interpret_response(&raw) {
                    Ok(outcome) => return Ok(outcome),
                    Err(reason) => {
                        tracing::warn!(%reason, "generative response unusable, using heuristics");
                    }
                },
                Err(err) => {
                    tracing::warn!(error = %err, "generative service unavailable, using heuristics");
                }
            }
        }

        self.heuristic_parse(normalized)
            .ok_or_else(|| ParseError::Unrecognized {
                prompt: normalized.to_string(),
            })
    }

    /// Degraded mode: a smaller, looser pattern set. Anything it produces is
    /// flagged for manual review and must not be applied silently.
    fn heuristic_parse(&self, normalized: &str) -> Option<FallbackOutcome> {
        for (category, pattern) in &self.heuristics {
            if let Some(captures) = pattern.captures(normalized) {
                let mut params = MatchParams::new();
                for name in pattern.capture_names().flatten() {
                    if let Some(value) = captures.name(name) {
                        params.insert(name.to_string(), value.as_str().trim().to_string());
                    }
                }
                tracing::warn!(category = ?category, "heuristic fallback match, flagged for review");
                return Some(FallbackOutcome {
                    category: *category,
                    params,
                    confidence: HEURISTIC_CONFIDENCE,
                    method: ParsingMethod::Fallback,
                    requires_manual_review: true,
                    description: None,
                });
            }
        }
        None
    }
}

/// Fixed instruction template. The schema is spelled out field by field so
/// the response can be parsed strictly.
fn build_instruction(text: &str, ctx: &ProblemContext) -> String {
    format!(
        "You translate vehicle-routing business rules into structured constraints.\n\
         Respond with a single JSON object and nothing else, using exactly these fields:\n\
         {{\n\
           \"constraint_type\": one of [\"capacity\", \"distance\", \"time_window\", \
             \"working_hours\", \"min_vehicles\", \"max_vehicles\", \"vehicle_forbidden\", \
             \"vehicle_exclusive\", \"same_vehicle\", \"separate_vehicles\", \"priority\"],\n\
           \"parameters\": object with the numeric/text parameters \
             (value, unit, count, customer, start, end, vehicle, location, first, second, level),\n\
           \"entities\": object mapping entity roles to labels,\n\
           \"mathematical_description\": short symbolic form,\n\
           \"confidence\": number between 0 and 1,\n\
           \"interpretation\": one-sentence restatement\n\
         }}\n\
         Times are minutes from midnight or clock strings like \"9am\" or \"14:30\".\n\
         \n\
         Problem context:\n{}\n\
         \n\
         Constraint text: \"{}\"",
        ctx.grounding_json(),
        text
    )
}

/// Strip a Markdown code fence, if the service wrapped its JSON in one.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line.
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn interpret_response(raw: &str) -> Result<FallbackOutcome, String> {
    let body = strip_code_fences(raw);
    let parsed: GenerativeParse =
        serde_json::from_str(body).map_err(|e| format!("invalid json: {e}"))?;

    let category = category_from_name(&parsed.constraint_type)
        .ok_or_else(|| format!("unknown constraint_type \"{}\"", parsed.constraint_type))?;

    let mut params = MatchParams::new();
    for (key, value) in parsed.parameters.iter().chain(parsed.entities.iter()) {
        params.insert(key.clone(), value_to_param(value));
    }

    let confidence = parsed
        .confidence
        .unwrap_or(GENERATIVE_CONFIDENCE_DEFAULT)
        .clamp(0.0, 1.0);

    Ok(FallbackOutcome {
        category,
        params,
        confidence,
        method: ParsingMethod::Generative,
        requires_manual_review: false,
        description: parsed.mathematical_description,
    })
}

fn value_to_param(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn category_from_name(name: &str) -> Option<ConstraintCategory> {
    match name.trim() {
        "capacity" => Some(ConstraintCategory::Capacity),
        "distance" => Some(ConstraintCategory::Distance),
        "time_window" => Some(ConstraintCategory::TimeWindow),
        "working_hours" => Some(ConstraintCategory::WorkingHours),
        "min_vehicles" => Some(ConstraintCategory::MinVehicles),
        "max_vehicles" => Some(ConstraintCategory::MaxVehicles),
        "vehicle_forbidden" => Some(ConstraintCategory::VehicleForbidden),
        "vehicle_exclusive" => Some(ConstraintCategory::VehicleExclusive),
        "same_vehicle" => Some(ConstraintCategory::SameVehicle),
        "separate_vehicles" => Some(ConstraintCategory::SeparateVehicles),
        "priority" => Some(ConstraintCategory::Priority),
        _ => None,
    }
}

/// The heuristic set is deliberately smaller and looser than the primary
/// matcher. It exists so a dead service still yields a reviewable draft.
fn heuristic_patterns() -> Vec<(ConstraintCategory, Regex)> {
    let compile = |p: &str| Regex::new(p).unwrap_or_else(|e| panic!("bad heuristic {p}: {e}"));
    vec![
        (
            ConstraintCategory::SeparateVehicles,
            compile(r"(?P<first>\d+)\D+?(?P<second>\d+).*\b(?:not|never)\s+(?:be\s+)?(?:served\s+|visited\s+)?(?:together|on\s+the\s+same)"),
        ),
        (
            ConstraintCategory::SeparateVehicles,
            compile(r"(?P<first>\d+)\D+?(?P<second>\d+).*\b(?:different\s+(?:vehicles?|routes?)|separate)"),
        ),
        (
            ConstraintCategory::SameVehicle,
            compile(r"(?P<first>\d+)\D+?(?P<second>\d+).*\b(?:together|same\s+(?:vehicle|route|truck))"),
        ),
        (
            ConstraintCategory::TimeWindow,
            compile(r"(?P<customer>\d+).*between\s+(?P<start>\d{1,2}(?::\d{2})?\s*(?:am|pm)?)\s+and\s+(?P<end>\d{1,2}(?::\d{2})?\s*(?:am|pm)?)"),
        ),
        (
            ConstraintCategory::Capacity,
            compile(r"(?:capacit\w*|carry|load|weight)\D{0,40}?(?P<value>\d+(?:\.\d+)?)\s*(?P<unit>kg|kilograms?|t|tons?|tonnes?)?"),
        ),
        (
            ConstraintCategory::Capacity,
            compile(r"(?P<value>\d+(?:\.\d+)?)\s*(?P<unit>kg|kilograms?|tons?|tonnes?)"),
        ),
        (
            ConstraintCategory::Distance,
            compile(r"(?P<value>\d+(?:\.\d+)?)\s*(?P<unit>km|kilomet\w+|miles?)"),
        ),
        (
            ConstraintCategory::MinVehicles,
            compile(r"(?:least|minim\w*)\D{0,20}?(?P<count>\d+)\s*(?:vehicles?|trucks?|vans?)"),
        ),
        (
            ConstraintCategory::MaxVehicles,
            compile(r"(?:most|maxim\w*|more\s+than)\D{0,20}?(?P<count>\d+)\s*(?:vehicles?|trucks?|vans?)"),
        ),
        (
            ConstraintCategory::Priority,
            compile(r"(?:prioriti[sz]e|priority|urgent|important)\D{0,30}?(?P<customer>\d+)"),
        ),
        (
            ConstraintCategory::Priority,
            compile(r"(?P<customer>\d+)\D{0,30}?(?:priority|urgent|important)"),
        ),
    ]
}

//! Pipeline orchestration: text in, parsed constraints and reports out.
//!
//! Flow per prompt: normalize, pattern-match, score; a confident match goes
//! straight to translation, otherwise the generative fallback takes over.
//! Translation, validation, and conflict detection then run the same way for
//! every path. Per-prompt failures in a batch never abort the siblings —
//! everything comes back as data.

use crate::confidence::{ConfidenceScorer, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::context::ProblemContext;
use crate::fallback::{
    FallbackOutcome, FallbackParser, GenerativeBackend, GenerativeConfig, HttpGenerativeClient,
};
use crate::patterns::{ConstraintCategory, MatchParams, PatternMatcher, normalize};
use crate::translate::{build_kind, complexity, entities, translate};
use crate::types::{ConstraintSet, ParsedConstraint, ParsingMethod};
use crate::validate::{Conflict, detect_conflicts, validate};

/// Pipeline configuration, constructed once by the caller.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum pattern confidence required to skip the fallback parser.
    pub confidence_threshold: f64,
    /// Remote service settings; `None` runs without a generative backend and
    /// low-confidence prompts go straight to the heuristic fallback.
    pub generative: Option<GenerativeConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            generative: None,
        }
    }
}

/// Result of parsing a single prompt.
#[derive(Debug)]
pub struct ParseResult {
    pub success: bool,
    pub constraint: Option<ParsedConstraint>,
    pub method: Option<ParsingMethod>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ParseResult {
    fn failure(errors: Vec<String>) -> Self {
        Self {
            success: false,
            constraint: None,
            method: None,
            errors,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct FailedPrompt {
    pub prompt: String,
    pub errors: Vec<String>,
}

/// Aggregate statistics over one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub parsed_by_pattern: usize,
    pub parsed_by_generative: usize,
    pub parsed_by_fallback: usize,
    pub mean_confidence: f64,
    pub conflict_count: usize,
}

#[derive(Debug)]
pub struct BatchResult {
    pub successful: ConstraintSet,
    pub failed: Vec<FailedPrompt>,
    pub conflicts: Vec<Conflict>,
    pub summary: BatchSummary,
}

pub struct ConstraintPipeline {
    matcher: PatternMatcher,
    scorer: ConfidenceScorer,
    fallback: FallbackParser,
    confidence_threshold: f64,
}

impl ConstraintPipeline {
    /// Build a pipeline; a configured remote service is wired up as the
    /// generative backend, behind its request timeout.
    pub fn new(config: PipelineConfig) -> Self {
        let backend: Option<Box<dyn GenerativeBackend>> = config
            .generative
            .and_then(|gen_config| match HttpGenerativeClient::new(gen_config) {
                Ok(client) => Some(Box::new(client) as Box<dyn GenerativeBackend>),
                Err(err) => {
                    tracing::warn!(error = %err, "generative client unavailable");
                    None
                }
            });
        Self::with_backend(config.confidence_threshold, backend)
    }

    /// Build with an explicit backend (or none). Used directly by tests.
    pub fn with_backend(
        confidence_threshold: f64,
        backend: Option<Box<dyn GenerativeBackend>>,
    ) -> Self {
        Self {
            matcher: PatternMatcher::new(),
            scorer: ConfidenceScorer::new(),
            fallback: FallbackParser::new(backend),
            confidence_threshold,
        }
    }

    /// Parse one prompt into a validated constraint.
    pub fn parse(&self, prompt: &str, ctx: &ProblemContext) -> ParseResult {
        let normalized = normalize(prompt);

        if let Some(matched) = self.matcher.match_text(&normalized) {
            let confidence = self.scorer.score(&matched, &normalized);
            if confidence >= self.confidence_threshold {
                return self.finish(
                    matched.category,
                    &matched.params,
                    confidence,
                    ParsingMethod::Pattern,
                    false,
                    ctx,
                );
            }
            tracing::debug!(
                confidence,
                threshold = self.confidence_threshold,
                "pattern confidence below threshold, escalating"
            );
        }

        match self.fallback.parse(&normalized, ctx) {
            Ok(outcome) => self.finish_fallback(outcome, ctx),
            Err(err) => ParseResult::failure(vec![err.to_string()]),
        }
    }

    /// Parse a batch of prompts, then run conflict detection over the
    /// accepted set. Failures and conflicts are reported independently.
    pub fn parse_batch(&self, prompts: &[&str], ctx: &ProblemContext) -> BatchResult {
        let mut successful = ConstraintSet::new();
        let mut failed = Vec::new();
        let mut summary = BatchSummary {
            total: prompts.len(),
            ..BatchSummary::default()
        };
        let mut confidence_sum = 0.0;

        for prompt in prompts {
            let result = self.parse(prompt, ctx);
            match result.constraint {
                Some(constraint) if result.success => {
                    match constraint.parsing_method {
                        ParsingMethod::Pattern => summary.parsed_by_pattern += 1,
                        ParsingMethod::Generative => summary.parsed_by_generative += 1,
                        ParsingMethod::Fallback => summary.parsed_by_fallback += 1,
                    }
                    confidence_sum += constraint.confidence;
                    successful.push(constraint);
                }
                _ => failed.push(FailedPrompt {
                    prompt: (*prompt).to_string(),
                    errors: result.errors,
                }),
            }
        }

        let conflicts = detect_conflicts(successful.as_slice());
        summary.conflict_count = conflicts.len();
        if !successful.is_empty() {
            summary.mean_confidence = confidence_sum / successful.len() as f64;
        }

        tracing::info!(
            total = summary.total,
            accepted = successful.len(),
            failed = failed.len(),
            conflicts = conflicts.len(),
            "batch parsed"
        );

        BatchResult {
            successful,
            failed,
            conflicts,
            summary,
        }
    }

    fn finish_fallback(&self, outcome: FallbackOutcome, ctx: &ProblemContext) -> ParseResult {
        let FallbackOutcome {
            category,
            params,
            confidence,
            method,
            requires_manual_review,
            description,
        } = outcome;
        let mut result = self.finish(
            category,
            &params,
            confidence,
            method,
            requires_manual_review,
            ctx,
        );
        // Prefer the service's own symbolic form when it provided one.
        if let (Some(constraint), Some(text)) = (result.constraint.as_mut(), description) {
            constraint.mathematical_form = text;
        }
        result
    }

    fn finish(
        &self,
        category: ConstraintCategory,
        params: &MatchParams,
        confidence: f64,
        method: ParsingMethod,
        requires_manual_review: bool,
        ctx: &ProblemContext,
    ) -> ParseResult {
        let kind = match build_kind(category, params, ctx) {
            Ok(kind) => kind,
            // Covers entity-resolution failures too: the offending label is
            // named in the error text surfaced to the caller.
            Err(err) => return ParseResult::failure(vec![err.to_string()]),
        };

        let (mathematical_form, solver_format) = translate(&kind);
        let validation = validate(&kind, ctx);
        let mut warnings = validation.warnings.clone();
        if requires_manual_review {
            warnings.push("parsed by degraded heuristics; manual review required".to_string());
        }

        if !validation.is_valid {
            return ParseResult {
                success: false,
                errors: validation.errors.clone(),
                warnings,
                method: Some(method),
                constraint: Some(ParsedConstraint {
                    entities: entities(&kind),
                    complexity: complexity(&kind),
                    mathematical_form,
                    solver_format,
                    confidence,
                    parsing_method: method,
                    requires_manual_review,
                    validation: Some(validation),
                    kind,
                }),
            };
        }

        ParseResult {
            success: true,
            errors: Vec::new(),
            warnings,
            method: Some(method),
            constraint: Some(ParsedConstraint {
                entities: entities(&kind),
                complexity: complexity(&kind),
                mathematical_form,
                solver_format,
                confidence,
                parsing_method: method,
                requires_manual_review,
                validation: Some(validation),
                kind,
            }),
        }
    }
}

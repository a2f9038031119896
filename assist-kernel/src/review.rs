//! Heuristic scoring of reasoning plans.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use assist_tools::ToolRegistry;
use regex::Regex;
use serde::Serialize;

/// Headings every plan is expected to contain, matched case-insensitively.
pub const REQUIRED_SECTIONS: [&str; 4] = [
    "Problem Analysis",
    "Information Needs",
    "Tool Selection Strategy",
    "Verification Strategy",
];

const MISSING_SECTION_PENALTY: f64 = 0.15;
const UNKNOWN_TOOL_PENALTY: f64 = 0.10;
const RATE_LIMIT_PENALTY: f64 = 0.15;
const MAX_RATE_LIMITED_CALLS: usize = 2;
const CALL_LIKE_KEYWORDS: [&str; 4] = ["if", "for", "while", "print"];

static CALL_REFERENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\(").ok());

/// Outcome of reviewing one plan.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlanReview {
    /// Score in `0.0..=1.0`.
    pub score: f64,
    /// Threshold the score was compared against.
    pub threshold: f64,
    /// Required headings that were not found.
    pub missing_sections: Vec<String>,
    /// Call-like references that name no registered tool.
    pub unknown_tools: Vec<String>,
    /// Rate-limited tools referenced too often.
    pub rate_limit_warnings: Vec<String>,
}

impl PlanReview {
    /// `true` when no section is missing and every referenced tool exists.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.missing_sections.is_empty() && self.unknown_tools.is_empty()
    }

    /// `true` when the score reaches the threshold.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.score >= self.threshold
    }
}

/// Scores reasoning plans against the registered tool set.
#[derive(Clone, Debug)]
pub struct ReasoningValidator {
    known_tools: BTreeSet<String>,
    rate_limited: BTreeSet<String>,
    threshold: f64,
}

impl ReasoningValidator {
    /// Creates a validator with explicit tool sets.
    #[must_use]
    pub fn new<I, J>(known_tools: I, rate_limited: J, threshold: f64) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
    {
        Self {
            known_tools: known_tools.into_iter().collect(),
            rate_limited: rate_limited.into_iter().collect(),
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// Takes tool names and rate-limit flags from `registry`.
    #[must_use]
    pub fn from_registry(registry: &ToolRegistry, threshold: f64) -> Self {
        Self::new(
            registry.list().iter().map(|spec| spec.name().to_owned()),
            registry
                .rate_limited_tools()
                .into_iter()
                .map(str::to_owned),
            threshold,
        )
    }

    /// Threshold below which a plan is flagged.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Scores `plan`.
    ///
    /// Each missing section costs 0.15, each distinct unknown tool 0.10 and
    /// each rate-limited tool referenced more than twice 0.15.
    #[must_use]
    pub fn review(&self, plan: &str) -> PlanReview {
        let lowered = plan.to_lowercase();
        let missing_sections: Vec<String> = REQUIRED_SECTIONS
            .iter()
            .filter(|section| !lowered.contains(&section.to_lowercase()))
            .map(|section| (*section).to_owned())
            .collect();

        let mut unknown_tools: Vec<String> = Vec::new();
        if let Some(pattern) = CALL_REFERENCE.as_ref() {
            for capture in pattern.captures_iter(plan) {
                let name = &capture[1];
                if self.known_tools.contains(name)
                    || CALL_LIKE_KEYWORDS.contains(&name)
                    || unknown_tools.iter().any(|seen| seen == name)
                {
                    continue;
                }
                unknown_tools.push(name.to_owned());
            }
        }

        let rate_limit_warnings: Vec<String> = self
            .rate_limited
            .iter()
            .filter_map(|tool| {
                let uses = plan.matches(&format!("{tool}(")).count();
                (uses > MAX_RATE_LIMITED_CALLS).then(|| {
                    format!(
                        "too many {tool} calls ({uses}); at most {MAX_RATE_LIMITED_CALLS} recommended"
                    )
                })
            })
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let penalty = missing_sections.len() as f64 * MISSING_SECTION_PENALTY
            + unknown_tools.len() as f64 * UNKNOWN_TOOL_PENALTY
            + rate_limit_warnings.len() as f64 * RATE_LIMIT_PENALTY;

        PlanReview {
            score: (1.0 - penalty).clamp(0.0, 1.0),
            threshold: self.threshold,
            missing_sections,
            unknown_tools,
            rate_limit_warnings,
        }
    }
}

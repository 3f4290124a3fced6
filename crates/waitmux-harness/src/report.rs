//! Report generation for scenario runs.

use serde::{Deserialize, Serialize};

use crate::scenario::ScenarioOutcome;

/// Aggregate pass/fail counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl ScenarioSummary {
    #[must_use]
    pub fn from_outcomes(outcomes: &[ScenarioOutcome]) -> Self {
        let passed = outcomes.iter().filter(|o| o.passed).count();
        Self {
            total: outcomes.len(),
            passed,
            failed: outcomes.len() - passed,
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// A conformance report over one harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Report title.
    pub title: String,
    /// Timestamp (UTC).
    pub timestamp: String,
    /// Aggregate counts.
    pub summary: ScenarioSummary,
    /// Individual scenario outcomes.
    pub outcomes: Vec<ScenarioOutcome>,
}

impl ScenarioReport {
    #[must_use]
    pub fn new(title: impl Into<String>, timestamp: impl Into<String>, outcomes: Vec<ScenarioOutcome>) -> Self {
        Self {
            title: title.into(),
            timestamp: timestamp.into(),
            summary: ScenarioSummary::from_outcomes(&outcomes),
            outcomes,
        }
    }

    /// Render the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("- Total: {}\n", self.summary.total));
        out.push_str(&format!("- Passed: {}\n", self.summary.passed));
        out.push_str(&format!("- Failed: {}\n\n", self.summary.failed));

        out.push_str("| Scenario | Status | Elapsed (ms) | Detail |\n");
        out.push_str("|----------|--------|--------------|--------|\n");
        for outcome in &self.outcomes {
            let status = if outcome.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!(
                "| `{}` | {} | {} | {} |\n",
                outcome.name, status, outcome.elapsed_ms, outcome.detail
            ));
        }
        out
    }

    /// Render the report as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

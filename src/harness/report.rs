use chrono::{DateTime, Utc};
use ethers::types::U256;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use super::claims::ClaimResult;
use super::route::RouteMethod;
use crate::core::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Success,
    SuccessDryRun,
    Failed,
    Skipped,
}

/// Outcome of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub label: String,
    pub from: String,
    pub to: String,
    pub token: String,
    pub amount: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<RouteMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(default)]
    pub requires_claim: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl TestResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, TestStatus::Success | TestStatus::SuccessDryRun)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub success: usize,
    pub success_dry_run: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Percentage of non-skipped scenarios that succeeded.
    pub success_rate: f64,
    pub claims_attempted: usize,
    pub claims_failed: usize,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult], claims: &[ClaimResult]) -> Self {
        let count = |status: TestStatus| results.iter().filter(|r| r.status == status).count();
        let success = count(TestStatus::Success);
        let success_dry_run = count(TestStatus::SuccessDryRun);
        let skipped = count(TestStatus::Skipped);
        let ran = results.len() - skipped;
        let success_rate =
            if ran == 0 { 0.0 } else { (success + success_dry_run) as f64 / ran as f64 * 100.0 };
        Self {
            total: results.len(),
            success,
            success_dry_run,
            failed: count(TestStatus::Failed),
            skipped,
            success_rate,
            claims_attempted: claims.len(),
            claims_failed: claims.iter().filter(|c| c.outcome.is_failure()).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub summary: RunSummary,
    pub results: Vec<TestResult>,
    pub claims: Vec<ClaimResult>,
}

impl RunReport {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        dry_run: bool,
        results: Vec<TestResult>,
        claims: Vec<ClaimResult>,
    ) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            dry_run,
            summary: RunSummary::from_results(&results, &claims),
            results,
            claims,
        }
    }

    pub fn file_name(&self) -> String {
        format!("bridge-test-{}.json", self.finished_at.format("%Y%m%dT%H%M%SZ"))
    }

    /// Writes the report as pretty JSON under `dir` and returns the path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Report written");
        Ok(path)
    }

    pub fn log_summary(&self) {
        let s = &self.summary;
        info!(
            total = s.total,
            success = s.success,
            success_dry_run = s.success_dry_run,
            failed = s.failed,
            skipped = s.skipped,
            success_rate = format!("{:.1}%", s.success_rate),
            "Run summary"
        );
        for result in &self.results {
            let detail = result
                .tx_hash
                .as_deref()
                .or(result.error.as_deref())
                .or(result.skip_reason.as_deref())
                .unwrap_or("");
            info!(scenario = %result.label, status = ?result.status, method = ?result.method, "{}", detail);
        }
        if s.claims_attempted > 0 {
            info!(attempted = s.claims_attempted, failed = s.claims_failed, "Claims");
        }
    }
}

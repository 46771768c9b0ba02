//! Narrow interfaces to the external collaborators.
//!
//! The kernel treats plan generation, subtask execution, PRD validation and
//! PRD hashing as opaque capabilities behind these traits, the same way the
//! runtime layer is pluggable elsewhere in the engine. Implementations live
//! with the embedding application (agent harness, CLI, test double); the
//! crate ships only the degenerate defaults needed to stand the engine up:
//! a SHA-256 hasher and a validator that accepts every PRD.
//!
//! # Failure contract
//!
//! All ports fail with [`AgentError`]. For the subtask executor the split
//! matters: an `Err` is an unrecoverable throw and maps to `Failed`, while a
//! returned [`SubtaskOutcome`] with `success == false` is a *reported*
//! failure — also `Failed`, but distinguished in the recorded message.

use std::path::Path;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::tasks::{Backlog, PrpDocument, Subtask};

/// Failure from any external agent call.
///
/// Clonable so that shared in-flight plan futures can hand the same failure
/// to every awaiter.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum AgentError {
    #[error("plan generation failed: {message}")]
    #[diagnostic(code(taskloom::ports::plan_generation))]
    PlanGeneration { message: String },

    #[error("subtask execution failed: {message}")]
    #[diagnostic(code(taskloom::ports::execution))]
    Execution { message: String },

    #[error("PRD validation failed: {message}")]
    #[diagnostic(code(taskloom::ports::validation))]
    Validation { message: String },

    #[error("PRD hashing failed: {message}")]
    #[diagnostic(code(taskloom::ports::hashing))]
    Hashing { message: String },
}

/// Result of one validation gate run by the executor agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    pub level: u8,
    pub passed: bool,
    #[serde(default)]
    pub output: Option<String>,
}

/// What the executor agent reports back for one subtask.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskOutcome {
    pub success: bool,
    #[serde(default)]
    pub validation_results: Vec<GateResult>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub fix_attempts: u32,
}

impl SubtaskOutcome {
    /// A clean success with no artifacts.
    #[must_use]
    pub fn success() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// A reported (non-thrown) failure.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Severity of a PRD validation finding. Critical findings block session
/// initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueSeverity {
    Critical,
    Warning,
    Info,
}

/// One finding from the PRD validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdIssue {
    pub severity: IssueSeverity,
    pub message: String,
    #[serde(default)]
    pub section: Option<String>,
}

/// Aggregate PRD validation verdict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdValidation {
    pub valid: bool,
    #[serde(default)]
    pub issues: Vec<PrdIssue>,
    pub summary: String,
}

impl PrdValidation {
    /// Whether any finding is critical.
    #[must_use]
    pub fn has_critical_issues(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Critical)
    }
}

/// Generates the plan artifact for one subtask.
///
/// Network-bound in production; the research queue overlaps this latency
/// with execution. Failures propagate to every awaiter and are never cached.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate(&self, subtask: &Subtask, backlog: &Backlog)
    -> Result<PrpDocument, AgentError>;
}

/// Executes one subtask against the full backlog.
#[async_trait]
pub trait SubtaskExecutor: Send + Sync {
    async fn execute(
        &self,
        subtask: &Subtask,
        backlog: &Backlog,
    ) -> Result<SubtaskOutcome, AgentError>;
}

/// Semantic validation of a PRD document before a session is created.
#[async_trait]
pub trait PrdValidator: Send + Sync {
    async fn validate(&self, path: &Path) -> Result<PrdValidation, AgentError>;
}

/// Deterministic content hash of a PRD file, as 64 lowercase hex chars.
#[async_trait]
pub trait PrdHasher: Send + Sync {
    async fn hash_prd(&self, path: &Path) -> Result<String, AgentError>;
}

/// Default hasher: SHA-256 over the file bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256PrdHasher;

#[async_trait]
impl PrdHasher for Sha256PrdHasher {
    async fn hash_prd(&self, path: &Path) -> Result<String, AgentError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| AgentError::Hashing {
            message: format!("read {}: {e}", path.display()),
        })?;
        let digest = Sha256::digest(&bytes);
        Ok(format!("{digest:x}"))
    }
}

/// Default validator: accepts every PRD that exists on disk.
///
/// Stands in when no semantic validator is wired up, the same way resource
/// backpressure degrades to an always-pass poll.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissivePrdValidator;

#[async_trait]
impl PrdValidator for PermissivePrdValidator {
    async fn validate(&self, path: &Path) -> Result<PrdValidation, AgentError> {
        Ok(PrdValidation {
            valid: true,
            issues: Vec::new(),
            summary: format!("no validation performed for {}", path.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sha256_hasher_is_deterministic_over_contents() {
        let dir = std::env::temp_dir().join(format!("taskloom-hash-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let a = dir.join("a.md");
        let b = dir.join("b.md");
        std::fs::write(&a, "same contents").unwrap();
        std::fs::write(&b, "same contents").unwrap();

        let hasher = Sha256PrdHasher;
        let ha = hasher.hash_prd(&a).await.unwrap();
        let hb = hasher.hash_prd(&b).await.unwrap();
        assert_eq!(ha, hb);
        assert_eq!(ha.len(), 64);
        assert!(ha.bytes().all(|c| c.is_ascii_hexdigit()));

        std::fs::write(&b, "different contents").unwrap();
        assert_ne!(hasher.hash_prd(&b).await.unwrap(), ha);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn critical_issue_detection() {
        let mut v = PrdValidation {
            valid: true,
            issues: vec![PrdIssue {
                severity: IssueSeverity::Warning,
                message: "vague".into(),
                section: None,
            }],
            summary: "s".into(),
        };
        assert!(!v.has_critical_issues());
        v.issues.push(PrdIssue {
            severity: IssueSeverity::Critical,
            message: "missing requirements".into(),
            section: Some("2".into()),
        });
        assert!(v.has_critical_issues());
    }
}

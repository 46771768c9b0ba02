//! Plan artifacts produced by the plan generator.
//!
//! A [`PrpDocument`] is opaque to the execution kernel: it is generated by
//! the external plan generator, cached by the research queue, and handed to
//! whoever executes the subtask. The kernel only guarantees its shape.

use serde::{Deserialize, Serialize};

use super::id::ItemId;

/// One validation gate in a plan. Level 1 is the cheapest check, level 4 the
/// most expensive. Manual gates carry no command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationGate {
    pub level: u8,
    pub description: String,
    pub command: Option<String>,
    pub manual: bool,
}

impl ValidationGate {
    /// A gate backed by a runnable command.
    #[must_use]
    pub fn automated(level: u8, description: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            level,
            description: description.into(),
            command: Some(command.into()),
            manual: false,
        }
    }

    /// A gate a human signs off on; never carries a command.
    #[must_use]
    pub fn manual(level: u8, description: impl Into<String>) -> Self {
        Self {
            level,
            description: description.into(),
            command: None,
            manual: true,
        }
    }
}

/// A checkable statement of done-ness.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessCriterion {
    pub description: String,
    pub satisfied: bool,
}

impl SuccessCriterion {
    #[must_use]
    pub fn pending(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            satisfied: false,
        }
    }
}

/// The plan for executing one subtask.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrpDocument {
    pub task_id: ItemId,
    pub objective: String,
    pub context: String,
    #[serde(default)]
    pub implementation_steps: Vec<String>,
    #[serde(default)]
    pub validation_gates: Vec<ValidationGate>,
    #[serde(default)]
    pub success_criteria: Vec<SuccessCriterion>,
    #[serde(default)]
    pub references: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_gates_carry_no_command() {
        let gate = ValidationGate::manual(4, "review the rollout plan");
        assert!(gate.manual);
        assert!(gate.command.is_none());

        let auto = ValidationGate::automated(1, "unit tests", "cargo test");
        assert!(!auto.manual);
        assert_eq!(auto.command.as_deref(), Some("cargo test"));
    }

    #[test]
    fn document_round_trips_in_camel_case() {
        let doc = PrpDocument {
            task_id: "P1.M1.T1.S1".parse().unwrap(),
            objective: "obj".into(),
            context: "ctx".into(),
            implementation_steps: vec!["step".into()],
            validation_gates: vec![ValidationGate::automated(2, "lint", "cargo clippy")],
            success_criteria: vec![SuccessCriterion::pending("done")],
            references: vec![],
        };
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"taskId\":\"P1.M1.T1.S1\""));
        assert!(json.contains("\"implementationSteps\""));
        let back: PrpDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}

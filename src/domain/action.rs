//! Edit plans produced by the action planner.

use serde::{Deserialize, Serialize};

use super::statement::Statement;

/// What to do about one desired property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// The record already says this
    DoNothing,

    /// Nothing exists for the property yet
    AddMissing { statement: Statement },

    /// Same mainsnak; the statement gains qualifiers it lacked
    AddQualifiers {
        statement_id: String,
        statement: Statement,
    },

    /// The existing mainsnak says something else
    ReplaceStatement {
        statement_id: String,
        statement: Statement,
    },

    /// Needs a human
    Unknown { reason: String },
}

impl Action {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Action::Unknown { .. })
    }

    /// Short label for logs and summaries
    pub fn label(&self) -> &'static str {
        match self {
            Action::DoNothing => "do_nothing",
            Action::AddMissing { .. } => "add_missing",
            Action::AddQualifiers { .. } => "add_qualifiers",
            Action::ReplaceStatement { .. } => "replace_statement",
            Action::Unknown { .. } => "unknown",
        }
    }
}

/// An action together with the property it was planned for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub property_id: String,

    #[serde(flatten)]
    pub action: Action,
}

/// One action per desired property, in desired order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditPlan {
    pub actions: Vec<PlannedAction>,
}

impl EditPlan {
    /// Action planned for a property, if it was in the desired set
    pub fn action_for(&self, property_id: &str) -> Option<&Action> {
        self.actions
            .iter()
            .find(|a| a.property_id == property_id)
            .map(|a| &a.action)
    }

    pub fn has_replacements(&self) -> bool {
        self.actions
            .iter()
            .any(|a| matches!(a.action, Action::ReplaceStatement { .. }))
    }

    /// Actions needing manual review
    pub fn unknowns(&self) -> impl Iterator<Item = &PlannedAction> {
        self.actions.iter().filter(|a| a.action.is_unknown())
    }

    /// Statements the writer should submit.
    ///
    /// `do_nothing` and `unknown` are dropped; statements for
    /// `add_qualifiers` and `replace_statement` are tagged with the id of
    /// the statement they overwrite.
    pub fn claims_to_submit(&self) -> Vec<Statement> {
        self.actions
            .iter()
            .filter_map(|planned| match &planned.action {
                Action::DoNothing | Action::Unknown { .. } => None,
                Action::AddMissing { statement } => Some(statement.clone()),
                Action::AddQualifiers {
                    statement_id,
                    statement,
                }
                | Action::ReplaceStatement {
                    statement_id,
                    statement,
                } => Some(statement.clone().with_id(statement_id.clone())),
            })
            .collect()
    }

    /// Downgrade every `replace_statement` to `unknown`, for writers that
    /// are not allowed to overwrite.
    pub fn withhold_replacements(&mut self, reason: &str) {
        for planned in &mut self.actions {
            if let Action::ReplaceStatement { statement_id, .. } = &planned.action {
                planned.action = Action::Unknown {
                    reason: format!("replacement of {} withheld: {}", statement_id, reason),
                };
            }
        }
    }

    /// One-line count of actions by kind, e.g. `add_missing=2 do_nothing=3`
    pub fn summary(&self) -> String {
        let labels = [
            "add_missing",
            "add_qualifiers",
            "replace_statement",
            "do_nothing",
            "unknown",
        ];

        labels
            .iter()
            .filter_map(|label| {
                let count = self
                    .actions
                    .iter()
                    .filter(|a| a.action.label() == *label)
                    .count();
                (count > 0).then(|| format!("{}={}", label, count))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::statement::{DataValue, Snak};

    fn statement(property: &str, value: &str) -> Statement {
        Statement::new(Snak::value(property, DataValue::String(value.to_string())))
    }

    fn sample_plan() -> EditPlan {
        EditPlan {
            actions: vec![
                PlannedAction {
                    property_id: "P12120".to_string(),
                    action: Action::AddMissing {
                        statement: statement("P12120", "42"),
                    },
                },
                PlannedAction {
                    property_id: "P170".to_string(),
                    action: Action::ReplaceStatement {
                        statement_id: "M1$abc".to_string(),
                        statement: statement("P170", "x"),
                    },
                },
                PlannedAction {
                    property_id: "P1433".to_string(),
                    action: Action::DoNothing,
                },
                PlannedAction {
                    property_id: "P571".to_string(),
                    action: Action::Unknown {
                        reason: "2 existing statements".to_string(),
                    },
                },
            ],
        }
    }

    #[test]
    fn test_claims_to_submit_filters_and_tags() {
        let claims = sample_plan().claims_to_submit();

        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0].id, None);
        assert_eq!(claims[1].id.as_deref(), Some("M1$abc"));
    }

    #[test]
    fn test_withhold_replacements() {
        let mut plan = sample_plan();
        assert!(plan.has_replacements());

        plan.withhold_replacements("not the original uploader");

        assert!(!plan.has_replacements());
        assert!(plan.action_for("P170").unwrap().is_unknown());
        assert_eq!(plan.claims_to_submit().len(), 1);
    }

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_value(&sample_plan().actions[1]).unwrap();

        assert_eq!(json["property_id"], "P170");
        assert_eq!(json["action"], "replace_statement");
        assert_eq!(json["statement_id"], "M1$abc");
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            sample_plan().summary(),
            "add_missing=1 replace_statement=1 do_nothing=1 unknown=1"
        );
    }
}

//! Diffs desired claims against existing claims.
//!
//! Exactly one action comes out per desired property. The planner never
//! guesses: anything it can't classify becomes `unknown` for a human to
//! look at. Whether a `replace_statement` may actually be applied is the
//! writer's decision, not ours.

use crate::domain::{
    Action, DesiredClaims, EditPlan, ExistingClaims, PlannedAction, Snak, Statement,
};

use super::comparator::{equivalent, equivalent_snaks};

/// How the desired qualifiers relate to the existing ones, given equal mainsnaks
enum QualifierFit {
    /// Every desired qualifier is already there
    Satisfied,

    /// Some desired qualifiers are missing and nothing contradicts them
    Missing(Vec<Snak>),

    /// A property has a different value on each side
    Conflict(String),
}

/// Compute the edit plan that brings `existing` in line with `desired`
pub fn plan(existing: &ExistingClaims, desired: &DesiredClaims) -> EditPlan {
    let mut properties: Vec<&str> = Vec::new();
    for statement in &desired.claims {
        if !properties.contains(&statement.property()) {
            properties.push(statement.property());
        }
    }

    let actions = properties
        .into_iter()
        .map(|property| {
            let wanted: Vec<&Statement> = desired
                .claims
                .iter()
                .filter(|s| s.property() == property)
                .collect();

            let action = match wanted.as_slice() {
                [single] => plan_property(existing.get(property), single),
                _ => Action::Unknown {
                    reason: format!("{} desired statements for {}", wanted.len(), property),
                },
            };

            PlannedAction {
                property_id: property.to_string(),
                action,
            }
        })
        .collect();

    EditPlan { actions }
}

fn plan_property(existing: &[Statement], desired: &Statement) -> Action {
    let current = match existing {
        [] => {
            return Action::AddMissing {
                statement: desired.clone(),
            }
        }
        [current] => current,
        _ => {
            return Action::Unknown {
                reason: format!(
                    "{} existing statements for {}",
                    existing.len(),
                    desired.property()
                ),
            }
        }
    };

    if equivalent(current, desired) {
        return Action::DoNothing;
    }

    let Some(statement_id) = current.id.clone() else {
        return Action::Unknown {
            reason: format!("existing {} statement has no id", desired.property()),
        };
    };

    if !equivalent_snaks(&current.mainsnak, &desired.mainsnak) {
        return Action::ReplaceStatement {
            statement_id,
            statement: desired.clone(),
        };
    }

    match qualifier_fit(current, desired) {
        QualifierFit::Satisfied => Action::DoNothing,
        QualifierFit::Missing(snaks) => {
            let mut statement = current.clone();
            for snak in snaks {
                statement.push_qualifier(snak);
            }
            Action::AddQualifiers {
                statement_id,
                statement,
            }
        }
        QualifierFit::Conflict(property) => Action::Unknown {
            reason: format!(
                "existing {} statement has a different {} qualifier",
                desired.property(),
                property
            ),
        },
    }
}

/// Existing qualifiers on properties we don't synthesize are left alone;
/// only a property present on both sides with differing values conflicts.
fn qualifier_fit(existing: &Statement, desired: &Statement) -> QualifierFit {
    let mut missing = Vec::new();

    for wanted in desired.qualifier_snaks() {
        let present = existing.qualifiers_for(&wanted.property);

        if present.iter().any(|snak| equivalent_snaks(snak, wanted)) {
            continue;
        }
        if !present.is_empty() {
            return QualifierFit::Conflict(wanted.property.clone());
        }
        missing.push(wanted.clone());
    }

    if missing.is_empty() {
        QualifierFit::Satisfied
    } else {
        QualifierFit::Missing(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::{entity_value, string_value};

    fn id_statement(value: &str) -> Statement {
        Statement::new(Snak::value("P12120", string_value(value)))
    }

    fn published_in() -> Statement {
        Statement::new(Snak::value("P1433", entity_value("Q103204")))
    }

    fn desired(claims: Vec<Statement>) -> DesiredClaims {
        DesiredClaims { claims }
    }

    #[test]
    fn test_add_missing() {
        let plan = plan(&ExistingClaims::new(), &desired(vec![id_statement("42")]));

        assert_eq!(
            plan.action_for("P12120"),
            Some(&Action::AddMissing {
                statement: id_statement("42")
            })
        );
    }

    #[test]
    fn test_do_nothing_for_identical() {
        let existing =
            ExistingClaims::from_statements([id_statement("42").with_id("M1$a")]);

        let plan = plan(&existing, &desired(vec![id_statement("42")]));

        assert_eq!(plan.action_for("P12120"), Some(&Action::DoNothing));
    }

    #[test]
    fn test_replace_when_mainsnak_differs() {
        let existing =
            ExistingClaims::from_statements([id_statement("41").with_id("M1$a")]);

        let plan = plan(&existing, &desired(vec![id_statement("42")]));

        assert_eq!(
            plan.action_for("P12120"),
            Some(&Action::ReplaceStatement {
                statement_id: "M1$a".to_string(),
                statement: id_statement("42"),
            })
        );
    }

    #[test]
    fn test_add_qualifiers_keeps_existing_ones() {
        let existing = ExistingClaims::from_statements([published_in()
            .with_qualifier(Snak::value("P1545", string_value("1")))
            .with_id("M1$b")]);
        let wanted = published_in().with_qualifier(Snak::value("P577", string_value("x")));

        let plan = plan(&existing, &desired(vec![wanted]));

        match plan.action_for("P1433") {
            Some(Action::AddQualifiers {
                statement_id,
                statement,
            }) => {
                assert_eq!(statement_id, "M1$b");
                assert_eq!(statement.qualifiers_order(), &["P1545", "P577"]);
            }
            other => panic!("expected add_qualifiers, got {:?}", other),
        }
    }

    #[test]
    fn test_matching_qualifiers_do_nothing() {
        let wanted = published_in().with_qualifier(Snak::value("P577", string_value("x")));
        let existing = ExistingClaims::from_statements([wanted.clone().with_id("M1$c")]);

        let plan = plan(&existing, &desired(vec![wanted]));

        assert_eq!(plan.action_for("P1433"), Some(&Action::DoNothing));
    }

    #[test]
    fn test_conflicting_qualifier_is_unknown() {
        let existing = ExistingClaims::from_statements([published_in()
            .with_qualifier(Snak::value("P577", string_value("x")))
            .with_id("M1$d")]);
        let wanted = published_in().with_qualifier(Snak::value("P577", string_value("y")));

        let plan = plan(&existing, &desired(vec![wanted]));

        assert!(plan.action_for("P1433").unwrap().is_unknown());
    }

    #[test]
    fn test_multiple_existing_is_unknown() {
        let existing = ExistingClaims::from_statements([
            id_statement("42").with_id("M1$a"),
            id_statement("43").with_id("M1$b"),
        ]);

        let plan = plan(&existing, &desired(vec![id_statement("42")]));

        assert_eq!(
            plan.action_for("P12120"),
            Some(&Action::Unknown {
                reason: "2 existing statements for P12120".to_string()
            })
        );
    }

    #[test]
    fn test_duplicate_desired_property_is_visited_once() {
        let plan = plan(
            &ExistingClaims::new(),
            &desired(vec![id_statement("42"), published_in(), id_statement("43")]),
        );

        assert_eq!(plan.actions.len(), 2);
        assert_eq!(plan.actions[0].property_id, "P12120");
        assert!(plan.actions[0].action.is_unknown());
        assert_eq!(plan.actions[1].property_id, "P1433");
    }

    #[test]
    fn test_existing_without_id_is_unknown() {
        let existing = ExistingClaims::from_statements([id_statement("41")]);

        let plan = plan(&existing, &desired(vec![id_statement("42")]));

        assert!(plan.action_for("P12120").unwrap().is_unknown());
    }
}

//! Offline under-constraint linter

use super::{
    gate::Gate,
    signal::{Signal, Source},
    Relation,
};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LintIssue {
    /// No gate restricts the signal with a non-zero coefficient.
    Unconstrained { signal: Signal, label: String },
    /// A public signal that no `PublicInput` gate binds.
    UnboundPublic { signal: Signal, label: String },
    /// A `PublicInput` gate binding a non-public signal, or a signal to the
    /// wrong instance row.
    MisboundPublic { signal: Signal, index: usize },
    /// An instance row bound more than once.
    DuplicatePublicBinding { index: usize },
    /// An instance row nothing is bound to.
    MissingPublicIndex { index: usize },
}

impl fmt::Display for LintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LintIssue::Unconstrained { signal, label } => {
                write!(f, "unconstrained signal {} ({})", signal, label)
            }
            LintIssue::UnboundPublic { signal, label } => {
                write!(f, "public signal {} ({}) is not bound to an instance row", signal, label)
            }
            LintIssue::MisboundPublic { signal, index } => {
                write!(f, "signal {} is bound to instance row {} it does not own", signal, index)
            }
            LintIssue::DuplicatePublicBinding { index } => {
                write!(f, "instance row {} is bound more than once", index)
            }
            LintIssue::MissingPublicIndex { index } => {
                write!(f, "instance row {} has no binding", index)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintReport {
    pub issues: Vec<LintIssue>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for LintReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "clean");
        }
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

pub(crate) fn lint(relation: &Relation) -> LintReport {
    let mut constrained = vec![false; relation.num_signals()];
    let mut bindings = vec![0usize; relation.num_public()];
    let mut bound_signals = vec![false; relation.num_signals()];
    let mut issues = Vec::new();

    for gate in relation.gates() {
        for signal in gate.constrained_signals() {
            constrained[signal.index()] = true;
        }
        if let Gate::PublicInput { signal, index } = gate {
            match relation.signal(*signal).source {
                Source::Public(owned) if owned == *index && *index < bindings.len() => {
                    bindings[*index] += 1;
                    bound_signals[signal.index()] = true;
                }
                _ => issues.push(LintIssue::MisboundPublic { signal: *signal, index: *index }),
            }
        }
    }

    for (i, info) in relation.signals().iter().enumerate() {
        let signal = Signal(i as u32);
        match info.source {
            Source::Public(_) if !bound_signals[i] => {
                issues.push(LintIssue::UnboundPublic { signal, label: info.label.clone() })
            }
            _ if !constrained[i] => {
                issues.push(LintIssue::Unconstrained { signal, label: info.label.clone() })
            }
            _ => {}
        }
    }

    for (index, count) in bindings.iter().enumerate() {
        match count {
            0 => issues.push(LintIssue::MissingPublicIndex { index }),
            1 => {}
            _ => issues.push(LintIssue::DuplicatePublicBinding { index }),
        }
    }

    LintReport { issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::RelationBuilder;
    use ff::Field;
    use halo2curves::pasta::Fp;

    #[test]
    fn test_helper_built_relation_is_clean() {
        let mut builder = RelationBuilder::new("clean");
        let out = builder.public_input("out");
        let a = builder.private_input("a");
        let b = builder.private_input("b");
        let product = builder.mul(a, b);
        builder.assert_equal(product, out);
        assert!(builder.finish().lint().is_clean());
    }

    #[test]
    fn test_detects_unconstrained_private_input() {
        let mut builder = RelationBuilder::new("loose");
        let out = builder.public_input("out");
        let a = builder.private_input("a");
        let dangling = builder.private_input("dangling");
        builder.assert_equal(a, out);
        let report = builder.finish().lint();
        assert_eq!(report.issues, vec![LintIssue::Unconstrained {
            signal: dangling,
            label: "dangling".to_string()
        }]);
    }

    #[test]
    fn test_zero_coefficient_does_not_count() {
        use crate::relation::gate::ArithCoeffs;

        let mut builder = RelationBuilder::new("zero-coeff");
        let a = builder.private_input("a");
        let b = builder.private_input("b");
        builder.arith([Some(a), Some(b), None, None], ArithCoeffs {
            qa: Fp::ONE,
            ..Default::default()
        });
        let report = builder.finish().lint();
        assert_eq!(report.issues.len(), 1);
        assert!(matches!(report.issues[0], LintIssue::Unconstrained { signal, .. } if signal == b));
    }

    #[test]
    fn test_detects_public_binding_defects() {
        use crate::relation::signal::Source;

        let mut builder = RelationBuilder::new("publics");
        let bound = builder.public_input("bound");
        let unbound = builder.alloc("unbound", Source::Public(1));
        let private = builder.private_input("p");
        builder.assert_equal(bound, private);
        builder.assert_equal(unbound, private);
        builder.push_gate(Gate::PublicInput { signal: bound, index: 0 });
        builder.push_gate(Gate::PublicInput { signal: private, index: 1 });
        let relation = builder.finish();
        // alloc bypassed the public counter
        assert_eq!(relation.num_public(), 1);

        let report = relation.lint();
        assert!(report.issues.contains(&LintIssue::DuplicatePublicBinding { index: 0 }));
        assert!(report.issues.contains(&LintIssue::MisboundPublic { signal: private, index: 1 }));
        assert!(report
            .issues
            .contains(&LintIssue::UnboundPublic { signal: unbound, label: "unbound".to_string() }));
        assert!(!report.is_clean());
    }
}

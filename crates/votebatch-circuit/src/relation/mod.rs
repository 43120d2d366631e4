//! Constraint Relation
//!
//! A [`Relation`] is an immutable description: a signal table plus a list of
//! typed gates. Values live separately in an [`Assignment`], produced by
//! [`Relation::solve`] from public and private inputs.

pub mod batch;
mod builder;
mod gadgets;
pub mod gate;
mod lint;
pub mod signal;

pub use batch::{BatchRelation, RelationParams, SlotSignals};
pub use builder::RelationBuilder;
pub use gate::{Gate, GateKind};
pub use lint::{LintIssue, LintReport};
pub use signal::{EcPoint, Hint, Signal, SignalInfo, Source};

use halo2curves::pasta::Fp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use votebatch_runtime::{Result, VoteBatchError};

/// Rows kept free at the bottom of the circuit for halo2's blinding factors.
pub const RESERVED_ROWS: usize = 16;

#[derive(Debug, Clone)]
pub struct Relation {
    pub(crate) name: String,
    pub(crate) signals: Vec<SignalInfo>,
    pub(crate) gates: Vec<Gate>,
    pub(crate) gate_tags: Vec<u32>,
    pub(crate) tags: Vec<String>,
    pub(crate) num_public: usize,
    pub(crate) num_private: usize,
}

/// Values for every signal of one relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    values: Vec<Fp>,
    public: Vec<Fp>,
}

impl Assignment {
    pub fn value(&self, signal: Signal) -> Fp {
        self.values[signal.index()]
    }

    pub fn values(&self) -> &[Fp] {
        &self.values
    }

    pub fn public(&self) -> &[Fp] {
        &self.public
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationStats {
    pub name: String,
    pub signals: usize,
    pub public_inputs: usize,
    pub private_inputs: usize,
    pub gates: usize,
    pub gates_by_kind: BTreeMap<String, usize>,
    pub min_k: u32,
}

impl Relation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signals(&self) -> &[SignalInfo] {
        &self.signals
    }

    pub fn signal(&self, signal: Signal) -> &SignalInfo {
        &self.signals[signal.index()]
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn gate_tag(&self, gate: usize) -> &str {
        &self.tags[self.gate_tags[gate] as usize]
    }

    pub fn num_signals(&self) -> usize {
        self.signals.len()
    }

    pub fn num_gates(&self) -> usize {
        self.gates.len()
    }

    pub fn num_public(&self) -> usize {
        self.num_public
    }

    pub fn num_private(&self) -> usize {
        self.num_private
    }

    /// Position of `signal` in the private input vector, if it is one.
    pub fn private_index(&self, signal: Signal) -> Option<usize> {
        match self.signal(signal).source {
            Source::Private(index) => Some(index),
            _ => None,
        }
    }

    /// Smallest circuit size `k` with room for every gate row.
    pub fn min_k(&self) -> u32 {
        let rows = self.gates.len() + RESERVED_ROWS;
        let mut k = 4;
        while (1usize << k) < rows {
            k += 1;
        }
        k
    }

    pub fn lint(&self) -> LintReport {
        lint::lint(self)
    }

    pub fn stats(&self) -> RelationStats {
        let mut gates_by_kind = BTreeMap::new();
        for gate in &self.gates {
            *gates_by_kind.entry(gate.kind().to_string()).or_insert(0) += 1;
        }
        RelationStats {
            name: self.name.clone(),
            signals: self.signals.len(),
            public_inputs: self.num_public,
            private_inputs: self.num_private,
            gates: self.gates.len(),
            gates_by_kind,
            min_k: self.min_k(),
        }
    }

    /// Solve every signal in allocation order. Hints only read earlier
    /// signals, so one pass suffices. Solving never fails on bad values;
    /// [`check`](Self::check) decides whether the result satisfies the gates.
    pub fn solve(&self, public: &[Fp], private: &[Fp]) -> Result<Assignment> {
        if public.len() != self.num_public || private.len() != self.num_private {
            return Err(VoteBatchError::invalid_shape(format!(
                "relation '{}' takes {} public and {} private inputs, got {} and {}",
                self.name,
                self.num_public,
                self.num_private,
                public.len(),
                private.len()
            )));
        }
        let mut values = Vec::with_capacity(self.signals.len());
        for info in &self.signals {
            let value = match &info.source {
                Source::Public(i) => public[*i],
                Source::Private(i) => private[*i],
                Source::Constant(c) => *c,
                Source::Derived(hint) => hint.evaluate(&values),
            };
            values.push(value);
        }
        Ok(Assignment { values, public: public.to_vec() })
    }

    /// Evaluate every gate. The error names the first violated gate by kind
    /// and namespace, never the values involved.
    pub fn check(&self, assignment: &Assignment) -> Result<()> {
        if assignment.values.len() != self.signals.len()
            || assignment.public.len() != self.num_public
        {
            return Err(VoteBatchError::invalid_shape(format!(
                "assignment does not fit relation '{}'",
                self.name
            )));
        }
        for (i, gate) in self.gates.iter().enumerate() {
            let holds = match gate {
                Gate::PublicInput { signal, index } => assignment
                    .public
                    .get(*index)
                    .map_or(false, |v| *v == assignment.values[signal.index()]),
                _ => gate.holds(&assignment.values),
            };
            if !holds {
                return Err(VoteBatchError::unsatisfied(format!(
                    "{} gate #{} in '{}' is violated",
                    gate.kind(),
                    i,
                    self.gate_tag(i)
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff::Field;

    fn square_relation() -> (Relation, Signal) {
        let mut builder = RelationBuilder::new("square");
        let out = builder.public_input("out");
        let x = builder.private_input("x");
        let sq = builder.namespace("square", |b| b.mul(x, x));
        builder.assert_equal(sq, out);
        (builder.finish(), sq)
    }

    #[test]
    fn test_solve_and_check() {
        let (relation, sq) = square_relation();
        let assignment = relation.solve(&[Fp::from(49)], &[Fp::from(7)]).unwrap();
        assert_eq!(assignment.value(sq), Fp::from(49));
        assert!(relation.check(&assignment).is_ok());
    }

    #[test]
    fn test_check_reports_gate_without_values() {
        let (relation, _) = square_relation();
        let assignment = relation.solve(&[Fp::from(50)], &[Fp::from(7)]).unwrap();
        let err = relation.check(&assignment).unwrap_err();
        assert_eq!(err.kind(), votebatch_runtime::ErrorKind::UnsatisfiedRelation);
        let msg = err.to_string();
        assert!(msg.contains("arith"));
        assert!(!msg.contains("49") && !msg.contains("50"));
    }

    #[test]
    fn test_public_binding_is_checked() {
        let mut builder = RelationBuilder::new("echo");
        let out = builder.public_input("out");
        let x = builder.private_input("x");
        builder.assert_equal(x, out);
        let relation = builder.finish();

        let mut assignment = relation.solve(&[Fp::ONE], &[Fp::ONE]).unwrap();
        assert!(relation.check(&assignment).is_ok());
        assignment.public[0] = Fp::from(2);
        assert!(relation.check(&assignment).is_err());
    }

    #[test]
    fn test_solve_rejects_wrong_arity() {
        let (relation, _) = square_relation();
        assert!(relation.solve(&[], &[Fp::ONE]).is_err());
        assert!(relation.solve(&[Fp::ONE], &[]).is_err());
    }

    #[test]
    fn test_min_k_and_stats() {
        let (relation, _) = square_relation();
        assert_eq!(relation.min_k(), 5);
        let stats = relation.stats();
        assert_eq!(stats.gates, 3);
        assert_eq!(stats.gates_by_kind.get("arith"), Some(&2));
        assert_eq!(stats.gates_by_kind.get("public-input"), Some(&1));
    }
}

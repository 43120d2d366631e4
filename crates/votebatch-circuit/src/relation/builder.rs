//! Constraint builder: allocates signals and emits gates
//!
//! The builder is the only way to grow a [`Relation`]. Every helper both
//! allocates the derived signals it needs (with a solver hint) and emits the
//! gates that constrain them, so a relation assembled from helpers alone
//! lints clean.

use super::{
    gate::{ArithCoeffs, Gate},
    signal::{Hint, Signal, SignalInfo, Source},
    Relation,
};
use ff::{Field, PrimeField};
use halo2curves::pasta::Fp;
use std::collections::HashMap;
use votebatch_runtime::FieldBytes;

pub struct RelationBuilder {
    name: String,
    signals: Vec<SignalInfo>,
    gates: Vec<Gate>,
    gate_tags: Vec<u32>,
    tags: Vec<String>,
    tag_ids: HashMap<String, u32>,
    namespace: Vec<String>,
    current_tag: u32,
    constants: HashMap<FieldBytes, Signal>,
    num_public: usize,
    num_private: usize,
}

impl RelationBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let mut builder = Self {
            name: name.into(),
            signals: Vec::new(),
            gates: Vec::new(),
            gate_tags: Vec::new(),
            tags: Vec::new(),
            tag_ids: HashMap::new(),
            namespace: Vec::new(),
            current_tag: 0,
            constants: HashMap::new(),
            num_public: 0,
            num_private: 0,
        };
        builder.current_tag = builder.intern_tag();
        builder
    }

    fn intern_tag(&mut self) -> u32 {
        let path = if self.namespace.is_empty() { "/".to_string() } else { self.namespace.join("/") };
        if let Some(id) = self.tag_ids.get(&path) {
            return *id;
        }
        let id = self.tags.len() as u32;
        self.tags.push(path.clone());
        self.tag_ids.insert(path, id);
        id
    }

    /// Run `f` with `name` pushed onto the namespace used to tag gates and
    /// label signals.
    pub fn namespace<T>(&mut self, name: impl Into<String>, f: impl FnOnce(&mut Self) -> T) -> T {
        self.namespace.push(name.into());
        self.current_tag = self.intern_tag();
        let out = f(self);
        self.namespace.pop();
        self.current_tag = self.intern_tag();
        out
    }

    pub fn num_gates(&self) -> usize {
        self.gates.len()
    }

    /// Low-level allocation. Prefer the typed helpers.
    pub fn alloc(&mut self, label: &str, source: Source) -> Signal {
        let signal = Signal(self.signals.len() as u32);
        let label = match self.namespace.last() {
            Some(_) => format!("{}/{}", self.namespace.join("/"), label),
            None => label.to_string(),
        };
        self.signals.push(SignalInfo { label, source });
        signal
    }

    /// Low-level gate emission. Prefer the typed helpers.
    pub fn push_gate(&mut self, gate: Gate) {
        self.gates.push(gate);
        self.gate_tags.push(self.current_tag);
    }

    pub fn public_input(&mut self, label: &str) -> Signal {
        let index = self.num_public;
        self.num_public += 1;
        let signal = self.alloc(label, Source::Public(index));
        self.push_gate(Gate::PublicInput { signal, index });
        signal
    }

    pub fn private_input(&mut self, label: &str) -> Signal {
        let index = self.num_private;
        self.num_private += 1;
        self.alloc(label, Source::Private(index))
    }

    /// A signal pinned to `value`, shared by every caller asking for it.
    pub fn constant(&mut self, value: Fp) -> Signal {
        let key = value.to_repr();
        if let Some(signal) = self.constants.get(&key) {
            return *signal;
        }
        let signal = self.alloc("const", Source::Constant(value));
        self.arith([Some(signal), None, None, None], ArithCoeffs {
            qa: Fp::ONE,
            qk: -value,
            ..Default::default()
        });
        self.constants.insert(key, signal);
        signal
    }

    pub fn derived(&mut self, label: &str, hint: Hint) -> Signal {
        self.alloc(label, Source::Derived(hint))
    }

    pub fn arith(&mut self, wires: [Option<Signal>; 4], coeffs: ArithCoeffs) {
        self.push_gate(Gate::Arith { wires, coeffs });
    }

    /// One row computing `out = Σ terms + constant` for at most three terms.
    fn linear_row(&mut self, terms: &[(Fp, Signal)], constant: Fp) -> Signal {
        debug_assert!(terms.len() <= 3);
        let out = self.derived("lc", Hint::Linear { terms: terms.to_vec(), constant });
        let mut wires = [None; 4];
        let mut q = [Fp::ZERO; 3];
        for (i, (coeff, signal)) in terms.iter().enumerate() {
            wires[i] = Some(*signal);
            q[i] = *coeff;
        }
        wires[3] = Some(out);
        self.arith(wires, ArithCoeffs {
            qa: q[0],
            qb: q[1],
            qc: q[2],
            qd: -Fp::ONE,
            qk: constant,
            ..Default::default()
        });
        out
    }

    /// `Σ coeff·signal + constant`, chained over several rows when needed.
    pub fn linear_combination(&mut self, terms: &[(Fp, Signal)], constant: Fp) -> Signal {
        if terms.is_empty() {
            return self.constant(constant);
        }
        let (head, mut rest) = terms.split_at(terms.len().min(3));
        if rest.is_empty() {
            return self.linear_row(head, constant);
        }
        let mut acc = self.linear_row(head, Fp::ZERO);
        while !rest.is_empty() {
            let (chunk, tail) = rest.split_at(rest.len().min(2));
            let mut row = vec![(Fp::ONE, acc)];
            row.extend_from_slice(chunk);
            let k = if tail.is_empty() { constant } else { Fp::ZERO };
            acc = self.linear_row(&row, k);
            rest = tail;
        }
        acc
    }

    pub fn sub(&mut self, a: Signal, b: Signal) -> Signal {
        self.linear_combination(&[(Fp::ONE, a), (-Fp::ONE, b)], Fp::ZERO)
    }

    pub fn mul(&mut self, a: Signal, b: Signal) -> Signal {
        let out = self.derived("mul", Hint::Product(a, b));
        self.arith([Some(a), Some(b), None, Some(out)], ArithCoeffs {
            qm: Fp::ONE,
            qd: -Fp::ONE,
            ..Default::default()
        });
        out
    }

    /// `Σ coeff·signal + constant = 0`.
    pub fn assert_linear(&mut self, terms: &[(Fp, Signal)], constant: Fp) {
        let (prefix, last) = if terms.len() <= 4 {
            (None, terms)
        } else {
            let split = terms.len() - 3;
            (Some(self.linear_combination(&terms[..split], Fp::ZERO)), &terms[split..])
        };
        let mut row: Vec<(Fp, Signal)> = prefix.map(|acc| (Fp::ONE, acc)).into_iter().collect();
        row.extend_from_slice(last);
        let mut wires = [None; 4];
        let mut q = [Fp::ZERO; 4];
        for (i, (coeff, signal)) in row.iter().enumerate() {
            wires[i] = Some(*signal);
            q[i] = *coeff;
        }
        self.arith(wires, ArithCoeffs {
            qa: q[0],
            qb: q[1],
            qc: q[2],
            qd: q[3],
            qk: constant,
            ..Default::default()
        });
    }

    pub fn assert_equal(&mut self, a: Signal, b: Signal) {
        self.assert_linear(&[(Fp::ONE, a), (-Fp::ONE, b)], Fp::ZERO);
    }

    /// `a·a - a = 0`
    pub fn assert_boolean(&mut self, a: Signal) {
        self.arith([Some(a), Some(a), None, None], ArithCoeffs {
            qa: -Fp::ONE,
            qm: Fp::ONE,
            ..Default::default()
        });
    }

    /// `a·b = 0`
    pub fn assert_zero_product(&mut self, a: Signal, b: Signal) {
        self.arith([Some(a), Some(b), None, None], ArithCoeffs {
            qm: Fp::ONE,
            ..Default::default()
        });
    }

    /// Little-endian bits of `value` with their recomposition constrained.
    ///
    /// Booleanity is enforced only when `check_boolean` is set; callers that
    /// feed the bits into gates which already force them to be boolean
    /// (`EcDoubleAdd`, `CondSwap`) skip it.
    pub fn bits_le(&mut self, value: Signal, count: usize, check_boolean: bool) -> Vec<Signal> {
        let bits: Vec<Signal> =
            (0..count).map(|index| self.derived("bit", Hint::Bit { value, index })).collect();
        if check_boolean {
            for bit in &bits {
                self.assert_boolean(*bit);
            }
        }
        let mut weight = Fp::ONE;
        let terms: Vec<(Fp, Signal)> = bits
            .iter()
            .map(|bit| {
                let term = (weight, *bit);
                weight = weight.double();
                term
            })
            .collect();
        let recomposed = self.linear_combination(&terms, Fp::ZERO);
        self.assert_equal(recomposed, value);
        bits
    }

    pub fn finish(self) -> Relation {
        Relation {
            name: self.name,
            signals: self.signals,
            gates: self.gates,
            gate_tags: self.gate_tags,
            tags: self.tags,
            num_public: self.num_public,
            num_private: self.num_private,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_deduplicated() {
        let mut builder = RelationBuilder::new("test");
        let a = builder.constant(Fp::from(7));
        let b = builder.constant(Fp::from(7));
        assert_eq!(a, b);
        assert_eq!(builder.num_gates(), 1);
    }

    #[test]
    fn test_linear_combination_chains_rows() {
        let mut builder = RelationBuilder::new("test");
        let inputs: Vec<Signal> = (0..7).map(|i| builder.private_input(&format!("x{}", i))).collect();
        let terms: Vec<(Fp, Signal)> = inputs.iter().map(|s| (Fp::from(2), *s)).collect();
        let sum = builder.linear_combination(&terms, Fp::from(1));
        // 3 + 2 + 2 terms
        assert_eq!(builder.num_gates(), 3);

        let relation = builder.finish();
        let private: Vec<Fp> = (1..=7).map(Fp::from).collect();
        let assignment = relation.solve(&[], &private).unwrap();
        assert_eq!(assignment.value(sum), Fp::from(2 * 28 + 1));
        assert!(relation.check(&assignment).is_ok());
    }

    #[test]
    fn test_assert_linear_with_many_terms() {
        let mut builder = RelationBuilder::new("test");
        let inputs: Vec<Signal> = (0..6).map(|i| builder.private_input(&format!("x{}", i))).collect();
        let mut terms: Vec<(Fp, Signal)> = inputs.iter().map(|s| (Fp::ONE, *s)).collect();
        terms[5].0 = -Fp::ONE;
        builder.assert_linear(&terms, Fp::ZERO);
        let relation = builder.finish();

        // 1 + 2 + 3 + 4 + 5 - 15 = 0
        let good: Vec<Fp> = [1, 2, 3, 4, 5, 15].into_iter().map(Fp::from).collect();
        assert!(relation.check(&relation.solve(&[], &good).unwrap()).is_ok());
        let bad: Vec<Fp> = [1, 2, 3, 4, 5, 16].into_iter().map(Fp::from).collect();
        assert!(relation.check(&relation.solve(&[], &bad).unwrap()).is_err());
    }

    #[test]
    fn test_bits_le() {
        let mut builder = RelationBuilder::new("test");
        let value = builder.private_input("value");
        let bits = builder.bits_le(value, 8, true);
        let relation = builder.finish();

        let assignment = relation.solve(&[], &[Fp::from(0b1010_0110)]).unwrap();
        let decoded: Vec<bool> = bits.iter().map(|b| assignment.value(*b) == Fp::ONE).collect();
        assert_eq!(decoded, vec![false, true, true, false, false, true, false, true]);
        assert!(relation.check(&assignment).is_ok());

        // 300 does not fit in 8 bits
        let overflow = relation.solve(&[], &[Fp::from(300)]).unwrap();
        assert!(relation.check(&overflow).is_err());
    }

    #[test]
    fn test_namespaces_label_signals() {
        let mut builder = RelationBuilder::new("test");
        let inner = builder.namespace("slot-0", |b| b.namespace("vote", |b| b.private_input("x")));
        let outer = builder.private_input("y");
        let relation = builder.finish();
        assert_eq!(relation.signal(inner).label, "slot-0/vote/x");
        assert_eq!(relation.signal(outer).label, "y");
    }
}

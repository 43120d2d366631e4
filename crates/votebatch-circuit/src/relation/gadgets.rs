//! Composite gadgets: Poseidon, Merkle paths and Pallas point arithmetic

use super::{
    builder::RelationBuilder,
    gate::Gate,
    signal::{AddOutput, DoubleAddOutput, EcPoint, Hint, Signal},
};
use crate::{poseidon, signature};
use halo2curves::pasta::Fp;

impl RelationBuilder {
    pub fn constant_point(&mut self, (x, y): (Fp, Fp)) -> EcPoint {
        EcPoint { x: self.constant(x), y: self.constant(y) }
    }

    /// The full permutation, one gate per round.
    pub fn poseidon_permute(&mut self, state: [Signal; 3]) -> [Signal; 3] {
        let params = poseidon::params();
        (0..params.num_rounds()).fold(state, |input, round| {
            let output = [0, 1, 2].map(|lane| {
                self.derived("poseidon", Hint::PoseidonRound { round, input, lane })
            });
            self.push_gate(Gate::PoseidonRound { round, input, output });
            output
        })
    }

    pub fn hash2(&mut self, a: Signal, b: Signal) -> Signal {
        let capacity = self.constant(poseidon::capacity_element());
        self.poseidon_permute([a, b, capacity])[0]
    }

    /// `(left, right)`: `(a, b)` when `bit = 0`, `(b, a)` when `bit = 1`.
    pub fn cond_swap(&mut self, a: Signal, b: Signal, bit: Signal) -> (Signal, Signal) {
        let left = self.derived("swap.left", Hint::Swap { a, b, bit, right: false });
        let right = self.derived("swap.right", Hint::Swap { a, b, bit, right: true });
        self.push_gate(Gate::CondSwap { a, b, bit, left, right });
        (left, right)
    }

    /// Root reached from `leaf` along `siblings`; `is_right[i]` is set when
    /// the running node is the right child at level `i`.
    pub fn merkle_root(&mut self, leaf: Signal, siblings: &[Signal], is_right: &[Signal]) -> Signal {
        siblings.iter().zip(is_right).fold(leaf, |node, (sibling, bit)| {
            let (left, right) = self.cond_swap(node, *sibling, *bit);
            self.hash2(left, right)
        })
    }

    /// 1 when `value == target` and `enable` is 1, else 0. Only the hint
    /// lives here; the caller constrains the indicator family.
    pub fn indicator(&mut self, value: Signal, target: u64, enable: Signal) -> Signal {
        self.derived("indicator", Hint::Indicator { value, target, enable })
    }

    pub fn assert_on_curve(&mut self, point: EcPoint) {
        self.push_gate(Gate::OnCurve { point });
    }

    /// Incomplete addition. `p` and `q` must have distinct x coordinates.
    pub fn ec_add(&mut self, p: EcPoint, q: EcPoint) -> EcPoint {
        let out = |b: &mut Self, output| b.derived("ec-add", Hint::Add { p, q, output });
        let lambda = out(self, AddOutput::Lambda);
        let inverse = out(self, AddOutput::Inverse);
        let sum = EcPoint { x: out(self, AddOutput::X), y: out(self, AddOutput::Y) };
        self.push_gate(Gate::EcAdd { p, q, lambda, inverse, out: sum });
        sum
    }

    /// `2^n·Q₀ + k·base` for the `n` bits of `k`, most significant first,
    /// where `Q₀` is the fixed offset point. Each bit is forced boolean by
    /// its `EcDoubleAdd` row.
    pub fn scalar_mul_offset(&mut self, bits_msb: &[Signal], base: EcPoint) -> EcPoint {
        let offset = self.constant_point(signature::offset_xy());
        bits_msb.iter().fold(offset, |acc, bit| {
            let bit = *bit;
            let out = |b: &mut Self, output| {
                b.derived("ec-double-add", Hint::DoubleAdd { acc, base, bit, output })
            };
            let lambda1 = out(self, DoubleAddOutput::Lambda1);
            let lambda2 = out(self, DoubleAddOutput::Lambda2);
            let inverse = out(self, DoubleAddOutput::Inverse);
            let next = EcPoint { x: out(self, DoubleAddOutput::X), y: out(self, DoubleAddOutput::Y) };
            self.push_gate(Gate::EcDoubleAdd { acc, base, bit, lambda1, lambda2, inverse, out: next });
            next
        })
    }

    pub fn assert_points_equal(&mut self, p: EcPoint, q: EcPoint) {
        self.assert_equal(p.x, q.x);
        self.assert_equal(p.y, q.y);
    }
}

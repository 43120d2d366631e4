//! Native Poseidon over the Pallas base field
//!
//! The permutation is `P128Pow5T3` (width 3, rate 2, x^5 S-box) with the
//! constants shipped by `halo2_gadgets`. The relation evaluates exactly the
//! same rounds one gate per round, so this module is also the reference for
//! the `PoseidonRound` gate.

use ff::{Field, PrimeField};
use halo2_gadgets::poseidon::primitives::{P128Pow5T3, Spec};
use halo2curves::pasta::Fp;
use std::sync::OnceLock;

pub const WIDTH: usize = 3;
pub const RATE: usize = 2;

pub type State = [Fp; WIDTH];

#[derive(Debug)]
pub struct PoseidonParams {
    round_constants: Vec<State>,
    mds: [State; WIDTH],
    half_full_rounds: usize,
    partial_rounds: usize,
}

pub fn params() -> &'static PoseidonParams {
    static PARAMS: OnceLock<PoseidonParams> = OnceLock::new();
    PARAMS.get_or_init(|| {
        let (round_constants, mds, _) = <P128Pow5T3 as Spec<Fp, WIDTH, RATE>>::constants();
        PoseidonParams {
            round_constants,
            mds,
            half_full_rounds: <P128Pow5T3 as Spec<Fp, WIDTH, RATE>>::full_rounds() / 2,
            partial_rounds: <P128Pow5T3 as Spec<Fp, WIDTH, RATE>>::partial_rounds(),
        }
    })
}

fn pow5(x: Fp) -> Fp {
    x.square().square() * x
}

impl PoseidonParams {
    pub fn num_rounds(&self) -> usize {
        self.round_constants.len()
    }

    pub fn is_full_round(&self, round: usize) -> bool {
        round < self.half_full_rounds || round >= self.half_full_rounds + self.partial_rounds
    }

    pub fn round_constants(&self, round: usize) -> &State {
        &self.round_constants[round]
    }

    pub fn mds(&self) -> &[State; WIDTH] {
        &self.mds
    }

    /// One round: add constants, S-box (all lanes or lane 0), MDS mix.
    pub fn round(&self, round: usize, state: &State) -> State {
        let rc = &self.round_constants[round];
        let mut sboxed = [Fp::ZERO; WIDTH];
        for i in 0..WIDTH {
            sboxed[i] = state[i] + rc[i];
        }
        if self.is_full_round(round) {
            for word in sboxed.iter_mut() {
                *word = pow5(*word);
            }
        } else {
            sboxed[0] = pow5(sboxed[0]);
        }

        let mut out = [Fp::ZERO; WIDTH];
        for (i, row) in self.mds.iter().enumerate() {
            for (m, s) in row.iter().zip(sboxed.iter()) {
                out[i] += *m * s;
            }
        }
        out
    }

    pub fn permute(&self, state: &State) -> State {
        (0..self.num_rounds()).fold(*state, |acc, round| self.round(round, &acc))
    }
}

/// Capacity element of the constant-length-2 sponge domain.
pub fn capacity_element() -> Fp {
    Fp::from_u128(2u128 << 64)
}

/// `H(a, b)`: constant-length sponge absorbing two elements.
pub fn hash2(a: Fp, b: Fp) -> Fp {
    params().permute(&[a, b, capacity_element()])[0]
}

/// Commitment to a tally vector, chained so the relation can recompute it
/// with one `hash2` per option.
pub fn counts_hash(counts: &[u64]) -> Fp {
    counts.iter().fold(Fp::from(counts.len() as u64), |acc, count| hash2(acc, Fp::from(*count)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use halo2_gadgets::poseidon::primitives::{ConstantLength, Hash};

    #[test]
    fn test_round_schedule() {
        let params = params();
        assert_eq!(params.num_rounds(), 64);
        assert!(params.is_full_round(0));
        assert!(params.is_full_round(3));
        assert!(!params.is_full_round(4));
        assert!(!params.is_full_round(59));
        assert!(params.is_full_round(60));
        assert!(params.is_full_round(63));
    }

    #[test]
    fn test_hash2_matches_halo2_gadgets() {
        for (a, b) in [(0u64, 0u64), (1, 2), (42, 7), (u64::MAX, 3)] {
            let expected =
                Hash::<_, P128Pow5T3, ConstantLength<2>, 3, 2>::init().hash([Fp::from(a), Fp::from(b)]);
            assert_eq!(hash2(Fp::from(a), Fp::from(b)), expected);
        }
    }

    #[test]
    fn test_hash2_is_order_sensitive() {
        assert_ne!(hash2(Fp::from(1), Fp::from(2)), hash2(Fp::from(2), Fp::from(1)));
    }

    #[test]
    fn test_counts_hash_binds_every_count() {
        let base = counts_hash(&[2, 1]);
        assert_eq!(base, counts_hash(&[2, 1]));
        assert_ne!(base, counts_hash(&[1, 2]));
        assert_ne!(base, counts_hash(&[2, 1, 0]));
    }
}

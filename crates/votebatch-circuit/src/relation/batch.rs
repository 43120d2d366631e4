//! The vote-batch relation
//!
//! Public inputs are `[merkle_root, counts_hash]`. Every one of the
//! `batch_capacity` slots proves, gated by its `active` bit where needed:
//!
//! - range: one-hot indicators over `[0, max_options)` summing to `active`
//! - inclusion: `active·(root(leaf, path) - merkle_root) = 0`
//! - uniqueness: `nullifier = H(secret, poll_id)`
//! - authenticity: `s·G == R + e·pk` for `e = H(H(R), H(pk_hash, msg))`
//!
//! and the tally `claimed_counts[i] = Σ_slot indicator[slot][i]` is hashed
//! into `counts_hash`.

use super::{signal::EcPoint, Relation, RelationBuilder, Signal};
use crate::{signature, signature::SCALAR_BITS};
use ff::Field;
use halo2curves::pasta::Fp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use votebatch_runtime::{PollConfig, Result, VoteBatchError};

/// Shape parameters fixed at key generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationParams {
    pub poll_id: u64,
    pub max_options: usize,
    pub batch_capacity: usize,
    pub tree_depth: usize,
}

impl RelationParams {
    pub fn from_config(config: &PollConfig) -> Self {
        Self {
            poll_id: config.poll_id,
            max_options: config.max_options,
            batch_capacity: config.batch_capacity,
            tree_depth: config.tree_depth,
        }
    }

    pub fn name(&self) -> String {
        format!(
            "votebatch-p{}-o{}-c{}-d{}",
            self.poll_id, self.max_options, self.batch_capacity, self.tree_depth
        )
    }
}

/// Private-input handles of one vote slot.
#[derive(Debug, Clone)]
pub struct SlotSignals {
    pub active: Signal,
    pub option: Signal,
    pub secret: Signal,
    pub public_key: EcPoint,
    pub leaf: Signal,
    pub nullifier: Signal,
    pub siblings: Vec<Signal>,
    pub path_bits: Vec<Signal>,
    pub nonce_point: EcPoint,
    pub s_bits: Vec<Signal>,
    /// Derived one-hot indicators, kept for inspection.
    pub indicators: Vec<Signal>,
}

#[derive(Debug)]
pub struct BatchRelation {
    params: RelationParams,
    relation: Relation,
    merkle_root: Signal,
    counts_hash: Signal,
    slots: Vec<SlotSignals>,
    claimed_counts: Vec<Signal>,
}

impl BatchRelation {
    /// Build the relation and refuse it unless it lints clean.
    pub fn build(params: RelationParams) -> Result<Arc<Self>> {
        PollConfig::new(params.poll_id, params.max_options)
            .with_batch_capacity(params.batch_capacity)
            .with_tree_depth(params.tree_depth)
            .validate()?;

        let mut b = RelationBuilder::new(params.name());
        let merkle_root = b.public_input("merkle_root");
        let counts_hash = b.public_input("counts_hash");

        let generator = b.constant_point(signature::generator_xy());
        let poll = b.constant(Fp::from(params.poll_id));

        let slots: Vec<SlotSignals> = (0..params.batch_capacity)
            .map(|i| {
                b.namespace(format!("slot-{}", i), |b| {
                    slot(b, &params, merkle_root, poll, generator)
                })
            })
            .collect();

        let claimed_counts = b.namespace("tally", |b| {
            (0..params.max_options)
                .map(|option| {
                    let count = b.private_input(&format!("claimed_count[{}]", option));
                    let mut terms: Vec<(Fp, Signal)> =
                        slots.iter().map(|s| (Fp::ONE, s.indicators[option])).collect();
                    terms.push((-Fp::ONE, count));
                    b.assert_linear(&terms, Fp::ZERO);
                    count
                })
                .collect::<Vec<_>>()
        });

        b.namespace("counts_hash", |b| {
            let mut acc = b.constant(Fp::from(params.max_options as u64));
            for count in &claimed_counts {
                acc = b.hash2(acc, *count);
            }
            b.assert_equal(acc, counts_hash);
        });

        let relation = b.finish();
        let report = relation.lint();
        if !report.is_clean() {
            return Err(VoteBatchError::invalid_config(format!(
                "relation '{}' failed lint:\n{}",
                relation.name(),
                report
            )));
        }
        debug!(
            relation = relation.name(),
            gates = relation.num_gates(),
            signals = relation.num_signals(),
            min_k = relation.min_k(),
            "built batch relation"
        );

        Ok(Arc::new(Self { params, relation, merkle_root, counts_hash, slots, claimed_counts }))
    }

    pub fn params(&self) -> &RelationParams {
        &self.params
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn merkle_root(&self) -> Signal {
        self.merkle_root
    }

    pub fn counts_hash(&self) -> Signal {
        self.counts_hash
    }

    pub fn slots(&self) -> &[SlotSignals] {
        &self.slots
    }

    pub fn claimed_counts(&self) -> &[Signal] {
        &self.claimed_counts
    }
}

fn point_input(b: &mut RelationBuilder, label: &str) -> EcPoint {
    EcPoint { x: b.private_input(&format!("{}.x", label)), y: b.private_input(&format!("{}.y", label)) }
}

fn slot(
    b: &mut RelationBuilder,
    params: &RelationParams,
    merkle_root: Signal,
    poll: Signal,
    generator: EcPoint,
) -> SlotSignals {
    let active = b.private_input("active");
    let option = b.private_input("option");
    let secret = b.private_input("secret");
    let public_key = point_input(b, "pk");
    let leaf = b.private_input("leaf");
    let nullifier = b.private_input("nullifier");
    let siblings: Vec<Signal> =
        (0..params.tree_depth).map(|i| b.private_input(&format!("sibling[{}]", i))).collect();
    let path_bits: Vec<Signal> =
        (0..params.tree_depth).map(|i| b.private_input(&format!("path_bit[{}]", i))).collect();
    let nonce_point = point_input(b, "R");
    let s_bits: Vec<Signal> =
        (0..SCALAR_BITS).map(|i| b.private_input(&format!("s_bit[{}]", i))).collect();

    let indicators = b.namespace("range", |b| {
        b.assert_boolean(active);
        let indicators: Vec<Signal> =
            (0..params.max_options).map(|i| b.indicator(option, i as u64, active)).collect();
        for ind in &indicators {
            b.assert_boolean(*ind);
        }
        let mut one_hot: Vec<(Fp, Signal)> = indicators.iter().map(|s| (Fp::ONE, *s)).collect();
        one_hot.push((-Fp::ONE, active));
        b.assert_linear(&one_hot, Fp::ZERO);

        let mut selected: Vec<(Fp, Signal)> = indicators
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, s)| (Fp::from(i as u64), *s))
            .collect();
        selected.push((-Fp::ONE, option));
        b.assert_linear(&selected, Fp::ZERO);
        indicators
    });

    let pk_hash = b.namespace("credential", |b| {
        b.assert_on_curve(public_key);
        let pk_hash = b.hash2(public_key.x, public_key.y);
        let commitment = b.hash2(pk_hash, secret);
        b.assert_equal(commitment, leaf);
        pk_hash
    });

    b.namespace("inclusion", |b| {
        let root = b.merkle_root(leaf, &siblings, &path_bits);
        let diff = b.sub(root, merkle_root);
        b.assert_zero_product(active, diff);
    });

    b.namespace("nullifier", |b| {
        let derived = b.hash2(secret, poll);
        b.assert_equal(derived, nullifier);
    });

    b.namespace("signature", |b| {
        b.assert_on_curve(nonce_point);
        let choice = b.hash2(poll, option);
        let msg = b.hash2(choice, nullifier);
        let r_hash = b.hash2(nonce_point.x, nonce_point.y);
        let key_msg = b.hash2(pk_hash, msg);
        let e = b.hash2(r_hash, key_msg);

        let mut e_bits = b.bits_le(e, SCALAR_BITS, false);
        e_bits.reverse();
        let lhs = b.scalar_mul_offset(&s_bits, generator);
        let e_pk = b.scalar_mul_offset(&e_bits, public_key);
        let rhs = b.ec_add(e_pk, nonce_point);
        b.assert_points_equal(lhs, rhs);
    });

    SlotSignals {
        active,
        option,
        secret,
        public_key,
        leaf,
        nullifier,
        siblings,
        path_bits,
        nonce_point,
        s_bits,
        indicators,
    }
}

//! halo2 circuit compiled from a [`Relation`](crate::relation::Relation)
//!
//! The column layout is the same for every relation: 10 advice columns, 6
//! fixed columns, one instance column and one selector per gate kind. Gate
//! `i` of the relation lands on row `i` of a single region. The first cell a
//! signal is placed in is its home; every later placement is tied to it by a
//! copy constraint.

use super::PublicSignals;
use crate::{
    relation::{
        gate::{ADVICE_COLUMNS, FIXED_COLUMNS},
        BatchRelation, Gate, GateKind,
    },
    witness::BatchWitness,
};
use ff::Field;
use halo2_proofs::{
    circuit::{Cell, Layouter, SimpleFloorPlanner, Value},
    plonk::{
        Advice, Circuit, Column, ConstraintSystem, Error as Halo2Error, Expression, Fixed,
        Instance, Selector,
    },
    poly::Rotation,
};
use halo2curves::pasta::Fp;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct RelationConfig {
    advice: [Column<Advice>; ADVICE_COLUMNS],
    fixed: [Column<Fixed>; FIXED_COLUMNS],
    instance: Column<Instance>,
    selectors: [Selector; GateKind::SELECTED.len()],
}

impl RelationConfig {
    fn selector(&self, kind: GateKind) -> Option<Selector> {
        GateKind::SELECTED.iter().position(|k| *k == kind).map(|i| self.selectors[i])
    }
}

#[derive(Clone)]
pub struct BatchCircuit {
    relation: Arc<BatchRelation>,
    values: Option<Arc<Vec<Fp>>>,
}

impl BatchCircuit {
    /// Circuit without values, for key generation.
    pub fn shape(relation: Arc<BatchRelation>) -> Self {
        Self { relation, values: None }
    }

    pub fn with_witness(relation: Arc<BatchRelation>, witness: &BatchWitness) -> Self {
        Self { relation, values: Some(Arc::new(witness.assignment().values().to_vec())) }
    }

    pub fn relation(&self) -> &Arc<BatchRelation> {
        &self.relation
    }

    pub fn k(&self) -> u32 {
        self.relation.relation().min_k()
    }

    /// Instance column contents for the given public signals.
    pub fn instances(public: &PublicSignals) -> Vec<Vec<Fp>> {
        vec![public.to_instance().to_vec()]
    }

    fn value(&self, index: usize) -> Value<Fp> {
        match &self.values {
            Some(values) => Value::known(values[index]),
            None => Value::unknown(),
        }
    }
}

impl Circuit<Fp> for BatchCircuit {
    type Config = RelationConfig;
    type FloorPlanner = SimpleFloorPlanner;

    fn without_witnesses(&self) -> Self {
        Self::shape(self.relation.clone())
    }

    fn configure(meta: &mut ConstraintSystem<Fp>) -> Self::Config {
        let advice = [(); ADVICE_COLUMNS].map(|_| meta.advice_column());
        let fixed = [(); FIXED_COLUMNS].map(|_| meta.fixed_column());
        let instance = meta.instance_column();

        for column in advice {
            meta.enable_equality(column);
        }
        meta.enable_equality(instance);

        let selectors = GateKind::SELECTED.map(|kind| {
            let selector = meta.selector();
            meta.create_gate(kind.name(), |meta| {
                let s = meta.query_selector(selector);
                let a: Vec<Expression<Fp>> = advice[..kind.advice_width()]
                    .iter()
                    .map(|column| meta.query_advice(*column, Rotation::cur()))
                    .collect();
                let q: Vec<Expression<Fp>> = fixed[..kind.fixed_width()]
                    .iter()
                    .map(|column| meta.query_fixed(*column))
                    .collect();
                kind.constraints(&a, &q).into_iter().map(|c| s.clone() * c).collect::<Vec<_>>()
            });
            selector
        });

        RelationConfig { advice, fixed, instance, selectors }
    }

    fn synthesize(
        &self,
        config: Self::Config,
        mut layouter: impl Layouter<Fp>,
    ) -> Result<(), Halo2Error> {
        let relation = self.relation.relation();

        let public_cells = layouter.assign_region(
            || "relation",
            |mut region| {
                let mut home: Vec<Option<Cell>> = vec![None; relation.num_signals()];
                let mut public_cells = Vec::new();

                for (row, gate) in relation.gates().iter().enumerate() {
                    let kind = gate.kind();
                    if let Some(selector) = config.selector(kind) {
                        selector.enable(&mut region, row)?;
                    }

                    let mut used = [false; ADVICE_COLUMNS];
                    for (column, signal) in gate.wires() {
                        let cell = region
                            .assign_advice(
                                || "signal",
                                config.advice[column],
                                row,
                                || self.value(signal.index()),
                            )?
                            .cell();
                        used[column] = true;
                        match home[signal.index()] {
                            Some(first) => region.constrain_equal(first, cell)?,
                            None => home[signal.index()] = Some(cell),
                        }
                        if let Gate::PublicInput { index, .. } = gate {
                            public_cells.push((cell, *index));
                        }
                    }
                    for column in (0..kind.advice_width()).filter(|c| !used[*c]) {
                        region.assign_advice(
                            || "unused",
                            config.advice[column],
                            row,
                            || Value::known(Fp::ZERO),
                        )?;
                    }

                    let fixed_row = gate.fixed_row();
                    for (column, value) in fixed_row.iter().enumerate().take(kind.fixed_width()) {
                        region.assign_fixed(
                            || "coefficient",
                            config.fixed[column],
                            row,
                            || Value::known(*value),
                        )?;
                    }
                }
                Ok(public_cells)
            },
        )?;

        for (cell, index) in public_cells {
            layouter.constrain_instance(cell, config.instance, index)?;
        }
        Ok(())
    }
}

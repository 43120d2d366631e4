//! Typed gates and their constraint polynomials
//!
//! Every gate occupies one row of the compiled circuit. The polynomials are
//! written once, generically over [`Term`], and evaluated both natively by
//! [`Relation::check`](super::Relation::check) and symbolically by the halo2
//! circuit, so the two can never drift apart.

use super::signal::{EcPoint, Signal};
use crate::poseidon;
use ff::Field;
use halo2_proofs::plonk::Expression;
use halo2curves::pasta::Fp;
use std::{
    fmt,
    ops::{Add, Mul, Sub},
};

pub const ADVICE_COLUMNS: usize = 10;
pub const FIXED_COLUMNS: usize = 6;

/// Something gate polynomials can be built from: field values or halo2
/// expressions.
pub trait Term:
    Clone + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Sized
{
    fn constant(value: Fp) -> Self;
}

impl Term for Fp {
    fn constant(value: Fp) -> Self {
        value
    }
}

impl Term for Expression<Fp> {
    fn constant(value: Fp) -> Self {
        Expression::Constant(value)
    }
}

fn pow5<T: Term>(x: T) -> T {
    let sq = x.clone() * x.clone();
    sq.clone() * sq * x
}

fn boolean<T: Term>(bit: &T) -> T {
    bit.clone() * (T::constant(Fp::ONE) - bit.clone())
}

/// Coefficients of `qa·a + qb·b + qc·c + qd·d + qm·a·b + qk = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArithCoeffs {
    pub qa: Fp,
    pub qb: Fp,
    pub qc: Fp,
    pub qd: Fp,
    pub qm: Fp,
    pub qk: Fp,
}

impl Default for ArithCoeffs {
    fn default() -> Self {
        Self { qa: Fp::ZERO, qb: Fp::ZERO, qc: Fp::ZERO, qd: Fp::ZERO, qm: Fp::ZERO, qk: Fp::ZERO }
    }
}

impl ArithCoeffs {
    fn as_row(&self) -> [Fp; FIXED_COLUMNS] {
        [self.qa, self.qb, self.qc, self.qd, self.qm, self.qk]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GateKind {
    Arith,
    PoseidonFull,
    PoseidonPartial,
    CondSwap,
    EcDoubleAdd,
    EcAdd,
    OnCurve,
    PublicInput,
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl GateKind {
    pub fn name(self) -> &'static str {
        match self {
            GateKind::Arith => "arith",
            GateKind::PoseidonFull => "poseidon-full",
            GateKind::PoseidonPartial => "poseidon-partial",
            GateKind::CondSwap => "cond-swap",
            GateKind::EcDoubleAdd => "ec-double-add",
            GateKind::EcAdd => "ec-add",
            GateKind::OnCurve => "on-curve",
            GateKind::PublicInput => "public-input",
        }
    }

    /// Advice columns read by this kind's polynomials.
    pub fn advice_width(self) -> usize {
        match self {
            GateKind::Arith => 4,
            GateKind::PoseidonFull | GateKind::PoseidonPartial => 2 * poseidon::WIDTH,
            GateKind::CondSwap => 5,
            GateKind::EcDoubleAdd => 10,
            GateKind::EcAdd => 8,
            GateKind::OnCurve => 2,
            GateKind::PublicInput => 1,
        }
    }

    /// Fixed columns read by this kind's polynomials.
    pub fn fixed_width(self) -> usize {
        match self {
            GateKind::Arith => FIXED_COLUMNS,
            GateKind::PoseidonFull | GateKind::PoseidonPartial => poseidon::WIDTH,
            _ => 0,
        }
    }

    pub const SELECTED: [GateKind; 7] = [
        GateKind::Arith,
        GateKind::PoseidonFull,
        GateKind::PoseidonPartial,
        GateKind::CondSwap,
        GateKind::EcDoubleAdd,
        GateKind::EcAdd,
        GateKind::OnCurve,
    ];

    /// Constraint polynomials over one row of advice and fixed cells.
    ///
    /// `PublicInput` rows have none: they are bound to the instance column
    /// by a copy constraint instead.
    pub fn constraints<T: Term>(self, a: &[T], q: &[T]) -> Vec<T> {
        match self {
            GateKind::Arith => vec![
                q[0].clone() * a[0].clone()
                    + q[1].clone() * a[1].clone()
                    + q[2].clone() * a[2].clone()
                    + q[3].clone() * a[3].clone()
                    + q[4].clone() * a[0].clone() * a[1].clone()
                    + q[5].clone(),
            ],
            GateKind::PoseidonFull | GateKind::PoseidonPartial => {
                let full = self == GateKind::PoseidonFull;
                let sboxed: Vec<T> = (0..poseidon::WIDTH)
                    .map(|i| {
                        let word = a[i].clone() + q[i].clone();
                        if full || i == 0 {
                            pow5(word)
                        } else {
                            word
                        }
                    })
                    .collect();
                poseidon::params()
                    .mds()
                    .iter()
                    .enumerate()
                    .map(|(i, row)| {
                        let mixed = row
                            .iter()
                            .zip(&sboxed)
                            .map(|(m, s)| T::constant(*m) * s.clone())
                            .reduce(|acc, t| acc + t)
                            .unwrap_or_else(|| T::constant(Fp::ZERO));
                        a[poseidon::WIDTH + i].clone() - mixed
                    })
                    .collect()
            }
            GateKind::CondSwap => {
                let (x, y, bit) = (a[0].clone(), a[1].clone(), a[2].clone());
                vec![
                    boolean(&bit),
                    a[3].clone() - (x.clone() + bit.clone() * (y.clone() - x.clone())),
                    a[4].clone() - (y.clone() + bit * (x - y)),
                ]
            }
            GateKind::EcDoubleAdd => {
                let (xa, ya, xp, yp) = (a[0].clone(), a[1].clone(), a[2].clone(), a[3].clone());
                let (bit, l1, l2, inv) = (a[4].clone(), a[5].clone(), a[6].clone(), a[7].clone());
                let (xo, yo) = (a[8].clone(), a[9].clone());
                let c = |v: u64| T::constant(Fp::from(v));

                let xd = l1.clone() * l1.clone() - c(2) * xa.clone();
                let yd = l1.clone() * (xa.clone() - xd.clone()) - ya.clone();
                let xs = l2.clone() * l2.clone() - xd.clone() - xp.clone();
                let ys = l2.clone() * (xd.clone() - xs.clone()) - yd.clone();
                vec![
                    l1 * c(2) * ya - c(3) * xa.clone() * xa,
                    l2 * (xp.clone() - xd.clone()) - (yp - yd.clone()),
                    inv * (xp - xd.clone()) - c(1),
                    boolean(&bit),
                    xo - (xd.clone() + bit.clone() * (xs - xd)),
                    yo - (yd.clone() + bit * (ys - yd)),
                ]
            }
            GateKind::EcAdd => {
                let (xp, yp, xq, yq) = (a[0].clone(), a[1].clone(), a[2].clone(), a[3].clone());
                let (lambda, inv, xo, yo) = (a[4].clone(), a[5].clone(), a[6].clone(), a[7].clone());
                vec![
                    lambda.clone() * (xq.clone() - xp.clone()) - (yq - yp.clone()),
                    inv * (xq.clone() - xp.clone()) - T::constant(Fp::ONE),
                    xo.clone() - (lambda.clone() * lambda.clone() - xp.clone() - xq),
                    yo - (lambda * (xp - xo) - yp),
                ]
            }
            GateKind::OnCurve => {
                let (x, y) = (a[0].clone(), a[1].clone());
                vec![y.clone() * y - x.clone() * x.clone() * x - T::constant(Fp::from(5))]
            }
            GateKind::PublicInput => Vec::new(),
        }
    }
}

/// One row of the relation.
#[derive(Debug, Clone)]
pub enum Gate {
    Arith { wires: [Option<Signal>; 4], coeffs: ArithCoeffs },
    PoseidonRound { round: usize, input: [Signal; 3], output: [Signal; 3] },
    CondSwap { a: Signal, b: Signal, bit: Signal, left: Signal, right: Signal },
    EcDoubleAdd {
        acc: EcPoint,
        base: EcPoint,
        bit: Signal,
        lambda1: Signal,
        lambda2: Signal,
        inverse: Signal,
        out: EcPoint,
    },
    EcAdd { p: EcPoint, q: EcPoint, lambda: Signal, inverse: Signal, out: EcPoint },
    OnCurve { point: EcPoint },
    PublicInput { signal: Signal, index: usize },
}

impl Gate {
    pub fn kind(&self) -> GateKind {
        match self {
            Gate::Arith { .. } => GateKind::Arith,
            Gate::PoseidonRound { round, .. } => {
                if poseidon::params().is_full_round(*round) {
                    GateKind::PoseidonFull
                } else {
                    GateKind::PoseidonPartial
                }
            }
            Gate::CondSwap { .. } => GateKind::CondSwap,
            Gate::EcDoubleAdd { .. } => GateKind::EcDoubleAdd,
            Gate::EcAdd { .. } => GateKind::EcAdd,
            Gate::OnCurve { .. } => GateKind::OnCurve,
            Gate::PublicInput { .. } => GateKind::PublicInput,
        }
    }

    /// Advice column of every signal this gate places.
    pub fn wires(&self) -> Vec<(usize, Signal)> {
        match self {
            Gate::Arith { wires, .. } => wires
                .iter()
                .enumerate()
                .filter_map(|(col, wire)| wire.map(|s| (col, s)))
                .collect(),
            Gate::PoseidonRound { input, output, .. } => {
                input.iter().chain(output).copied().enumerate().collect()
            }
            Gate::CondSwap { a, b, bit, left, right } => {
                vec![(0, *a), (1, *b), (2, *bit), (3, *left), (4, *right)]
            }
            Gate::EcDoubleAdd { acc, base, bit, lambda1, lambda2, inverse, out } => vec![
                (0, acc.x),
                (1, acc.y),
                (2, base.x),
                (3, base.y),
                (4, *bit),
                (5, *lambda1),
                (6, *lambda2),
                (7, *inverse),
                (8, out.x),
                (9, out.y),
            ],
            Gate::EcAdd { p, q, lambda, inverse, out } => vec![
                (0, p.x),
                (1, p.y),
                (2, q.x),
                (3, q.y),
                (4, *lambda),
                (5, *inverse),
                (6, out.x),
                (7, out.y),
            ],
            Gate::OnCurve { point } => vec![(0, point.x), (1, point.y)],
            Gate::PublicInput { signal, .. } => vec![(0, *signal)],
        }
    }

    /// Signals this gate actually restricts. An `Arith` wire with a zero
    /// coefficient is placed but not constrained.
    pub fn constrained_signals(&self) -> Vec<Signal> {
        match self {
            Gate::Arith { wires, coeffs } => {
                let product = coeffs.qm != Fp::ZERO;
                let active = [
                    coeffs.qa != Fp::ZERO || product,
                    coeffs.qb != Fp::ZERO || product,
                    coeffs.qc != Fp::ZERO,
                    coeffs.qd != Fp::ZERO,
                ];
                wires
                    .iter()
                    .zip(active)
                    .filter_map(|(wire, active)| if active { *wire } else { None })
                    .collect()
            }
            _ => self.wires().into_iter().map(|(_, s)| s).collect(),
        }
    }

    /// Values of the fixed columns on this gate's row.
    pub fn fixed_row(&self) -> [Fp; FIXED_COLUMNS] {
        let mut row = [Fp::ZERO; FIXED_COLUMNS];
        match self {
            Gate::Arith { coeffs, .. } => row = coeffs.as_row(),
            Gate::PoseidonRound { round, .. } => {
                row[..poseidon::WIDTH].copy_from_slice(poseidon::params().round_constants(*round))
            }
            _ => {}
        }
        row
    }

    pub fn advice_row(&self, values: &[Fp]) -> [Fp; ADVICE_COLUMNS] {
        let mut row = [Fp::ZERO; ADVICE_COLUMNS];
        for (col, signal) in self.wires() {
            row[col] = values[signal.index()];
        }
        row
    }

    /// Whether every polynomial of this gate vanishes on `values`.
    pub fn holds(&self, values: &[Fp]) -> bool {
        self.kind()
            .constraints(&self.advice_row(values), &self.fixed_row())
            .iter()
            .all(|c| c.is_zero_vartime())
    }
}

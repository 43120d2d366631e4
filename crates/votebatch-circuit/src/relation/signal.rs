//! Arena-indexed signal table

use crate::{field::fp_bit, poseidon};
use ff::Field;
use halo2curves::pasta::Fp;
use std::fmt;

/// Stable handle into a relation's signal table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signal(pub(crate) u32);

impl Signal {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// An affine point held in two signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcPoint {
    pub x: Signal,
    pub y: Signal,
}

/// Where a signal's value comes from when an assignment is solved.
#[derive(Debug, Clone)]
pub enum Source {
    Public(usize),
    Private(usize),
    Constant(Fp),
    Derived(Hint),
}

#[derive(Debug, Clone)]
pub struct SignalInfo {
    pub label: String,
    pub source: Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleAddOutput {
    Lambda1,
    Lambda2,
    Inverse,
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutput {
    Lambda,
    Inverse,
    X,
    Y,
}

/// Evaluation rule for a derived signal.
///
/// Hints only drive the witness solver. A hint constrains nothing; every
/// derived signal must also appear in a gate.
#[derive(Debug, Clone)]
pub enum Hint {
    Linear { terms: Vec<(Fp, Signal)>, constant: Fp },
    Product(Signal, Signal),
    Swap { a: Signal, b: Signal, bit: Signal, right: bool },
    PoseidonRound { round: usize, input: [Signal; 3], lane: usize },
    DoubleAdd { acc: EcPoint, base: EcPoint, bit: Signal, output: DoubleAddOutput },
    Add { p: EcPoint, q: EcPoint, output: AddOutput },
    Bit { value: Signal, index: usize },
    Indicator { value: Signal, target: u64, enable: Signal },
}

fn invert_or_zero(v: Fp) -> Fp {
    v.invert().unwrap_or(Fp::ZERO)
}

/// Intermediate values of one `2·A + bit·P` step.
pub(crate) struct DoubleAddValues {
    pub lambda1: Fp,
    pub lambda2: Fp,
    pub inverse: Fp,
    pub x: Fp,
    pub y: Fp,
}

pub(crate) fn double_add_values(xa: Fp, ya: Fp, xp: Fp, yp: Fp, bit: bool) -> DoubleAddValues {
    let lambda1 = xa.square() * Fp::from(3) * invert_or_zero(ya.double());
    let xd = lambda1.square() - xa.double();
    let yd = lambda1 * (xa - xd) - ya;
    let inverse = invert_or_zero(xp - xd);
    let lambda2 = (yp - yd) * inverse;
    let xs = lambda2.square() - xd - xp;
    let ys = lambda2 * (xd - xs) - yd;
    let (x, y) = if bit { (xs, ys) } else { (xd, yd) };
    DoubleAddValues { lambda1, lambda2, inverse, x, y }
}

pub(crate) struct AddValues {
    pub lambda: Fp,
    pub inverse: Fp,
    pub x: Fp,
    pub y: Fp,
}

pub(crate) fn add_values(xp: Fp, yp: Fp, xq: Fp, yq: Fp) -> AddValues {
    let inverse = invert_or_zero(xq - xp);
    let lambda = (yq - yp) * inverse;
    let x = lambda.square() - xp - xq;
    let y = lambda * (xp - x) - yp;
    AddValues { lambda, inverse, x, y }
}

impl Hint {
    /// Evaluate against the values of all earlier signals.
    pub(crate) fn evaluate(&self, values: &[Fp]) -> Fp {
        let v = |s: &Signal| values[s.index()];
        match self {
            Hint::Linear { terms, constant } => {
                terms.iter().fold(*constant, |acc, (coeff, s)| acc + *coeff * v(s))
            }
            Hint::Product(a, b) => v(a) * v(b),
            Hint::Swap { a, b, bit, right } => {
                let (a, b, bit) = (v(a), v(b), v(bit));
                if *right {
                    b + bit * (a - b)
                } else {
                    a + bit * (b - a)
                }
            }
            Hint::PoseidonRound { round, input, lane } => {
                let state = [v(&input[0]), v(&input[1]), v(&input[2])];
                poseidon::params().round(*round, &state)[*lane]
            }
            Hint::DoubleAdd { acc, base, bit, output } => {
                let step =
                    double_add_values(v(&acc.x), v(&acc.y), v(&base.x), v(&base.y), v(bit) == Fp::ONE);
                match output {
                    DoubleAddOutput::Lambda1 => step.lambda1,
                    DoubleAddOutput::Lambda2 => step.lambda2,
                    DoubleAddOutput::Inverse => step.inverse,
                    DoubleAddOutput::X => step.x,
                    DoubleAddOutput::Y => step.y,
                }
            }
            Hint::Add { p, q, output } => {
                let sum = add_values(v(&p.x), v(&p.y), v(&q.x), v(&q.y));
                match output {
                    AddOutput::Lambda => sum.lambda,
                    AddOutput::Inverse => sum.inverse,
                    AddOutput::X => sum.x,
                    AddOutput::Y => sum.y,
                }
            }
            Hint::Bit { value, index } => {
                if fp_bit(&v(value), *index) {
                    Fp::ONE
                } else {
                    Fp::ZERO
                }
            }
            Hint::Indicator { value, target, enable } => {
                if v(value) == Fp::from(*target) {
                    v(enable)
                } else {
                    Fp::ZERO
                }
            }
        }
    }
}

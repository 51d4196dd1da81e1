//! Polynomial shape factors of macro-particles.

use crate::Real;

/// Interpolation order of the particle shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeOrder {
    /// Nearest grid point.
    Ngp,
    Linear,
    Quadratic,
    Cubic,
}

impl ShapeOrder {
    pub fn from_order(order: usize) -> Option<Self> {
        match order {
            0 => Some(ShapeOrder::Ngp),
            1 => Some(ShapeOrder::Linear),
            2 => Some(ShapeOrder::Quadratic),
            3 => Some(ShapeOrder::Cubic),
            _ => None,
        }
    }

    pub fn order(self) -> usize {
        match self {
            ShapeOrder::Ngp => 0,
            ShapeOrder::Linear => 1,
            ShapeOrder::Quadratic => 2,
            ShapeOrder::Cubic => 3,
        }
    }

    /// Guard cells a deposit of this order may reach beyond the valid region.
    pub fn guard_cells(self) -> usize {
        self.order() / 2 + 1
    }
}

/// Weights of a shape of fixed order.
///
/// `compute(x)` takes a position in index units and returns the lowest mesh index touched
/// together with the `ORDER + 1` weights of the consecutive indices; unused trailing entries
/// are zero.
pub trait Shape: Send + Sync + 'static {
    const ORDER: usize;

    fn compute<F: Real>(x: F) -> (i64, [F; 4]);
}

pub struct Ngp;
pub struct Linear;
pub struct Quadratic;
pub struct Cubic;

// saturates at the bounds of `i64`; NaN maps to 0
#[inline(always)]
fn floor<F: Real>(x: F) -> (i64, F) {
    let j = x.floor();
    (j.to_f64() as i64, x - j)
}

impl Shape for Ngp {
    const ORDER: usize = 0;

    #[inline(always)]
    fn compute<F: Real>(x: F) -> (i64, [F; 4]) {
        let (j, _) = floor(x + F::HALF);
        (j, [F::ONE, F::ZERO, F::ZERO, F::ZERO])
    }
}

impl Shape for Linear {
    const ORDER: usize = 1;

    #[inline(always)]
    fn compute<F: Real>(x: F) -> (i64, [F; 4]) {
        let (j, xint) = floor(x);
        (j, [F::ONE - xint, xint, F::ZERO, F::ZERO])
    }
}

impl Shape for Quadratic {
    const ORDER: usize = 2;

    #[inline(always)]
    fn compute<F: Real>(x: F) -> (i64, [F; 4]) {
        let (j, _) = floor(x + F::HALF);
        let xint = x - F::from_f64(j as f64);
        let a = F::HALF - xint;
        let b = F::HALF + xint;
        (
            j.saturating_sub(1),
            [
                F::HALF * a * a,
                F::from_f64(0.75) - xint * xint,
                F::HALF * b * b,
                F::ZERO,
            ],
        )
    }
}

impl Shape for Cubic {
    const ORDER: usize = 3;

    #[inline(always)]
    fn compute<F: Real>(x: F) -> (i64, [F; 4]) {
        let (j, xint) = floor(x);
        let sixth = F::from_f64(1.0 / 6.0);
        let two_thirds = F::from_f64(2.0 / 3.0);
        let r = F::ONE - xint;
        (
            j.saturating_sub(1),
            [
                sixth * r * r * r,
                two_thirds - xint * xint * (F::ONE - F::HALF * xint),
                two_thirds - r * r * (F::ONE - F::HALF * r),
                sixth * xint * xint * xint,
            ],
        )
    }
}

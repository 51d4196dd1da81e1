use crate::{constants, field::FieldView, Real};

use super::{at, shifted, Stencil, StencilCoefficients};

/// Cole-Karkkainen-Cowan stencil: Yee difference along the axis, smoothed over the
/// transverse neighbours so the numerical dispersion vanishes along the cell diagonals.
///
/// Coefficients of axis `a` with transverse axes `b < c` are `[1/d, α, β_ab, β_ac, γ]`.
pub struct CartesianCkc;

// transverse axes of `axis`, in increasing order
#[inline(always)]
fn transverse(axis: usize) -> [usize; 2] {
    match axis {
        0 => [1, 2],
        1 => [0, 2],
        _ => [0, 1],
    }
}

impl CartesianCkc {
    #[inline(always)]
    fn difference<F: Real>(f: FieldView<'_, F>, hi: [i64; 3], lo: [i64; 3]) -> F {
        at(f, hi) - at(f, lo)
    }

    #[inline(always)]
    fn smoothed<F: Real>(
        f: FieldView<'_, F>,
        c: &StencilCoefficients<F>,
        axis: usize,
        hi: [i64; 3],
        lo: [i64; 3],
    ) -> F {
        let coefs = c.axis(axis);
        let [b, t] = transverse(axis);
        let (active_b, active_t) = (c.is_active(b), c.is_active(t));

        let mut out = coefs[1] * Self::difference(f, hi, lo);
        if active_b {
            for s in [-1, 1] {
                out += coefs[2] * Self::difference(f, shifted(hi, b, s), shifted(lo, b, s));
            }
        }
        if active_t {
            for s in [-1, 1] {
                out += coefs[3] * Self::difference(f, shifted(hi, t, s), shifted(lo, t, s));
            }
        }
        if active_b && active_t {
            for sb in [-1, 1] {
                for st in [-1, 1] {
                    let h = shifted(shifted(hi, b, sb), t, st);
                    let l = shifted(shifted(lo, b, sb), t, st);
                    out += coefs[4] * Self::difference(f, h, l);
                }
            }
        }
        out
    }
}

impl<F: Real> Stencil<F> for CartesianCkc {
    const NAME: &'static str = "Cartesian CKC";

    fn coefficients(cell_size: [F; 3], active: [bool; 3]) -> StencilCoefficients<F> {
        let inv = cell_size.map(|d| F::ONE / d);
        let delta = (0..3)
            .filter(|&axis| active[axis])
            .fold(F::ZERO, |acc, axis| acc.max(inv[axis]));
        let r = [0, 1, 2].map(|axis| {
            if active[axis] {
                let x = inv[axis] / delta;
                x * x
            } else {
                F::ZERO
            }
        });
        let beta = F::from_f64(0.125);
        let three_d = active.iter().all(|&a| a);

        let coefs = [0, 1, 2].map(|axis| {
            let [b, t] = transverse(axis);
            let beta_b = r[b] * beta;
            let beta_t = r[t] * beta;
            let gamma = if three_d {
                let sum = r[0] * r[1] + r[1] * r[2] + r[2] * r[0];
                r[b] * r[t] * (F::from_f64(1.0 / 16.0) - F::from_f64(0.125) * r[b] * r[t] / sum)
            } else {
                F::ZERO
            };
            let two = F::from_f64(2.0);
            let four = F::from_f64(4.0);
            let alpha = F::ONE - two * beta_b - two * beta_t - four * gamma;
            vec![
                inv[axis],
                alpha * inv[axis],
                beta_b * inv[axis],
                beta_t * inv[axis],
                gamma * inv[axis],
            ]
        });
        StencilCoefficients::new(coefs, active)
    }

    #[inline(always)]
    fn upward(f: FieldView<'_, F>, c: &StencilCoefficients<F>, axis: usize, p: [i64; 3]) -> F {
        if !c.is_active(axis) {
            return F::ZERO;
        }
        Self::smoothed(f, c, axis, shifted(p, axis, 1), p)
    }

    #[inline(always)]
    fn downward(f: FieldView<'_, F>, c: &StencilCoefficients<F>, axis: usize, p: [i64; 3]) -> F {
        if !c.is_active(axis) {
            return F::ZERO;
        }
        Self::smoothed(f, c, axis, p, shifted(p, axis, -1))
    }

    fn compute_max_dt(cell_size: [F; 3], active: [bool; 3]) -> F {
        let dmin = (0..3)
            .filter(|&axis| active[axis])
            .map(|axis| cell_size[axis])
            .fold(cell_size[2], |acc, d| acc.min(d));
        dmin / F::from_f64(constants::C)
    }
}

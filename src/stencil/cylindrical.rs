use crate::{constants, field::FieldView, Real};

use super::StencilCoefficients;

/// Yee stencil in (r, z) for fields expanded in azimuthal modes.
///
/// Radial operators take the radius `r` at which they are evaluated and the radial cell size.
pub struct CylindricalYee;

// CFL correction of the radial term for 1 to 6 azimuthal modes
const MULTIMODE_ALPHA: [f64; 6] = [0.2105, 1.0, 3.5234, 8.5104, 15.5059, 24.5037];

impl CylindricalYee {
    pub const NAME: &'static str = "cylindrical Yee";

    pub fn coefficients<F: Real>(cell_size: [F; 3]) -> StencilCoefficients<F> {
        StencilCoefficients::new(cell_size.map(|d| vec![F::ONE / d]), [true, false, true])
    }

    pub fn max_guard_cells() -> usize {
        1
    }

    pub fn compute_max_dt<F: Real>(cell_size: [F; 3], nmodes: usize) -> F {
        let alpha = match nmodes {
            1..=6 => MULTIMODE_ALPHA[nmodes - 1],
            _ => {
                let m = nmodes as f64 - 1.0;
                m * m - 0.4
            }
        };
        let (dr, dz) = (cell_size[0].to_f64(), cell_size[2].to_f64());
        let dt = 1.0 / (constants::C * ((1.0 + alpha) / (dr * dr) + 1.0 / (dz * dz)).sqrt());
        F::from_f64(dt)
    }

    #[inline(always)]
    pub fn upward_dr<F: Real>(f: FieldView<'_, F>, c: &StencilCoefficients<F>, i: i64, j: i64, k: i64) -> F {
        c.inv_d(0) * (f.at(i + 1, j, k) - f.at(i, j, k))
    }

    #[inline(always)]
    pub fn downward_dr<F: Real>(f: FieldView<'_, F>, c: &StencilCoefficients<F>, i: i64, j: i64, k: i64) -> F {
        c.inv_d(0) * (f.at(i, j, k) - f.at(i - 1, j, k))
    }

    #[inline(always)]
    pub fn upward_dz<F: Real>(f: FieldView<'_, F>, c: &StencilCoefficients<F>, i: i64, j: i64, k: i64) -> F {
        c.inv_d(2) * (f.at(i, j, k + 1) - f.at(i, j, k))
    }

    #[inline(always)]
    pub fn downward_dz<F: Real>(f: FieldView<'_, F>, c: &StencilCoefficients<F>, i: i64, j: i64, k: i64) -> F {
        c.inv_d(2) * (f.at(i, j, k) - f.at(i, j, k - 1))
    }

    /// `(1/r) d(rF)/dr` of a node-centered `F`, evaluated at the cell-centered radius `r`.
    #[inline(always)]
    pub fn upward_drr_over_r<F: Real>(
        f: FieldView<'_, F>,
        r: F,
        dr: F,
        c: &StencilCoefficients<F>,
        i: i64,
        j: i64,
        k: i64,
    ) -> F {
        let half = F::HALF * dr;
        c.inv_d(0) / r * ((r + half) * f.at(i + 1, j, k) - (r - half) * f.at(i, j, k))
    }

    /// `(1/r) d(rF)/dr` of a cell-centered `F`, evaluated at the nodal radius `r`.
    ///
    /// On the axis this is the flux of `F` through the first cell, `4 F(i) / dr`.
    #[inline(always)]
    pub fn downward_drr_over_r<F: Real>(
        f: FieldView<'_, F>,
        r: F,
        dr: F,
        c: &StencilCoefficients<F>,
        i: i64,
        j: i64,
        k: i64,
    ) -> F {
        if r == F::ZERO {
            return F::from_f64(4.0) * f.at(i, j, k) * c.inv_d(0);
        }
        let half = F::HALF * dr;
        c.inv_d(0) / r * ((r + half) * f.at(i, j, k) - (r - half) * f.at(i - 1, j, k))
    }

    /// `(1/r) d/dr(r dF/dr)` at the radius `r` of a point of `F`.
    #[inline(always)]
    pub fn dr_rdr_over_r<F: Real>(
        f: FieldView<'_, F>,
        r: F,
        dr: F,
        c: &StencilCoefficients<F>,
        i: i64,
        j: i64,
        k: i64,
    ) -> F {
        let half = F::HALF * dr;
        let inv_dr2 = c.inv_d(0) * c.inv_d(0);
        let center = f.at(i, j, k);
        inv_dr2 / r
            * ((r + half) * (f.at(i + 1, j, k) - center) - (r - half) * (center - f.at(i - 1, j, k)))
    }

    #[inline(always)]
    pub fn dzz<F: Real>(f: FieldView<'_, F>, c: &StencilCoefficients<F>, i: i64, j: i64, k: i64) -> F {
        let inv_dz2 = c.inv_d(2) * c.inv_d(2);
        inv_dz2 * (f.at(i, j, k + 1) - F::from_f64(2.0) * f.at(i, j, k) + f.at(i, j, k - 1))
    }
}

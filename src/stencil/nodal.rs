use crate::{field::FieldView, Real};

use super::{at, courant_dt, shifted, Stencil, StencilCoefficients};

/// Centered stencil for fields collocated on the nodes.
pub struct CartesianNodal;

impl<F: Real> Stencil<F> for CartesianNodal {
    const NAME: &'static str = "Cartesian nodal";

    fn coefficients(cell_size: [F; 3], active: [bool; 3]) -> StencilCoefficients<F> {
        StencilCoefficients::new(cell_size.map(|d| vec![F::ONE / d]), active)
    }

    #[inline(always)]
    fn upward(f: FieldView<'_, F>, c: &StencilCoefficients<F>, axis: usize, p: [i64; 3]) -> F {
        if !c.is_active(axis) {
            return F::ZERO;
        }
        F::HALF * c.inv_d(axis) * (at(f, shifted(p, axis, 1)) - at(f, shifted(p, axis, -1)))
    }

    // no parity on a collocated grid
    #[inline(always)]
    fn downward(f: FieldView<'_, F>, c: &StencilCoefficients<F>, axis: usize, p: [i64; 3]) -> F {
        Self::upward(f, c, axis, p)
    }

    fn compute_max_dt(cell_size: [F; 3], active: [bool; 3]) -> F {
        courant_dt(cell_size, active)
    }
}

use crate::{field::FieldView, Real};

use super::{at, courant_dt, shifted, Stencil, StencilCoefficients};

/// Second-order staggered stencil.
pub struct CartesianYee;

impl<F: Real> Stencil<F> for CartesianYee {
    const NAME: &'static str = "Cartesian Yee";

    fn coefficients(cell_size: [F; 3], active: [bool; 3]) -> StencilCoefficients<F> {
        StencilCoefficients::new(cell_size.map(|d| vec![F::ONE / d]), active)
    }

    #[inline(always)]
    fn upward(f: FieldView<'_, F>, c: &StencilCoefficients<F>, axis: usize, p: [i64; 3]) -> F {
        if !c.is_active(axis) {
            return F::ZERO;
        }
        c.inv_d(axis) * (at(f, shifted(p, axis, 1)) - at(f, p))
    }

    #[inline(always)]
    fn downward(f: FieldView<'_, F>, c: &StencilCoefficients<F>, axis: usize, p: [i64; 3]) -> F {
        if !c.is_active(axis) {
            return F::ZERO;
        }
        c.inv_d(axis) * (at(f, p) - at(f, shifted(p, axis, -1)))
    }

    fn compute_max_dt(cell_size: [F; 3], active: [bool; 3]) -> F {
        courant_dt(cell_size, active)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        constants::C,
        geometry::{CoordSystem, Geometry, IndexType},
        MeshField,
    };

    #[test]
    fn cfl_bound_in_three_dimensions() {
        let dt = <CartesianYee as Stencil<f64>>::compute_max_dt([1.0; 3], [true; 3]);
        assert_relative_eq!(dt, 1.0 / (C * 3f64.sqrt()), max_relative = 1e-14);
    }

    #[test]
    fn cfl_bound_ignores_inactive_axes() {
        let dt = <CartesianYee as Stencil<f64>>::compute_max_dt([2.0, 1.0, 2.0], [true, false, true]);
        assert_relative_eq!(dt, 2.0 / (C * 2f64.sqrt()), max_relative = 1e-14);
    }

    #[test]
    fn differences_of_a_linear_profile() {
        let geom = Geometry::from_steps(CoordSystem::Cartesian3D, [0.0; 3], [2.0, 4.0, 8.0], [4; 3]);
        let mut f = MeshField::new("f", &geom, [IndexType::Node; 3], 1, 1);
        for [i, j, k] in f.grown_box().iter().collect::<Vec<_>>() {
            let z = geom.position(2, k, IndexType::Node);
            f.write(i, j, k, 0, 3.0 * z);
        }
        let c = CartesianYee::coefficients(geom.cell_size, [true; 3]);
        assert_relative_eq!(CartesianYee::upward_dz(f.view(0), &c, 1, 1, 1), 3.0);
        assert_relative_eq!(CartesianYee::downward_dz(f.view(0), &c, 1, 1, 1), 3.0);
        assert_eq!(CartesianYee::upward_dx(f.view(0), &c, 1, 1, 1), 0.0);
    }
}

//! Finite-difference stencils of the curl equations.
//!
//! Every stencil is a zero-sized type with associated functions only: a stencil is chosen once
//! per call by [`StencilKind`] and the per-cell loop is monomorphic over it.

use crate::{
    constants,
    field::FieldView,
    geometry::{CoordSystem, Geometry},
    PicError, Real,
};

mod ckc;
mod cylindrical;
mod nodal;
mod yee;

pub use ckc::CartesianCkc;
pub use cylindrical::CylindricalYee;
pub use nodal::CartesianNodal;
pub use yee::CartesianYee;

/// Finite-difference algorithm requested by the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FdtdAlgo {
    Yee,
    Ckc,
}

/// Relative placement of the field components on the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridType {
    /// Yee staggering.
    Staggered,
    /// Every component on the nodes.
    Collocated,
}

/// Per-axis coefficients of a stencil, fixed for a refinement level.
#[derive(Clone, Debug, PartialEq)]
pub struct StencilCoefficients<F> {
    coefs: [Vec<F>; 3],
    active: [bool; 3],
}

impl<F: Real> StencilCoefficients<F> {
    pub fn new(coefs: [Vec<F>; 3], active: [bool; 3]) -> Self {
        Self { coefs, active }
    }

    #[inline(always)]
    pub fn axis(&self, axis: usize) -> &[F] {
        &self.coefs[axis]
    }

    #[inline(always)]
    pub fn is_active(&self, axis: usize) -> bool {
        self.active[axis]
    }

    /// `1/d` along `axis`.
    #[inline(always)]
    pub fn inv_d(&self, axis: usize) -> F {
        self.coefs[axis][0]
    }
}

#[inline(always)]
pub(crate) fn shifted(mut p: [i64; 3], axis: usize, by: i64) -> [i64; 3] {
    p[axis] += by;
    p
}

#[inline(always)]
pub(crate) fn at<F: Copy>(f: FieldView<'_, F>, p: [i64; 3]) -> F {
    f.at(p[0], p[1], p[2])
}

/// Directional derivatives of a Cartesian discretization.
///
/// `upward` goes from the lower to the upper parity along `axis` (forward difference),
/// `downward` the opposite way (backward difference). Derivatives along an inactive axis
/// vanish.
pub trait Stencil<F: Real> {
    const NAME: &'static str;

    fn coefficients(cell_size: [F; 3], active: [bool; 3]) -> StencilCoefficients<F>;

    fn upward(f: FieldView<'_, F>, c: &StencilCoefficients<F>, axis: usize, p: [i64; 3]) -> F;

    fn downward(f: FieldView<'_, F>, c: &StencilCoefficients<F>, axis: usize, p: [i64; 3]) -> F;

    /// Largest stable time step for the given cell sizes.
    fn compute_max_dt(cell_size: [F; 3], active: [bool; 3]) -> F;

    fn max_guard_cells() -> usize {
        1
    }

    #[inline(always)]
    fn upward_dx(f: FieldView<'_, F>, c: &StencilCoefficients<F>, i: i64, j: i64, k: i64) -> F {
        Self::upward(f, c, 0, [i, j, k])
    }

    #[inline(always)]
    fn upward_dy(f: FieldView<'_, F>, c: &StencilCoefficients<F>, i: i64, j: i64, k: i64) -> F {
        Self::upward(f, c, 1, [i, j, k])
    }

    #[inline(always)]
    fn upward_dz(f: FieldView<'_, F>, c: &StencilCoefficients<F>, i: i64, j: i64, k: i64) -> F {
        Self::upward(f, c, 2, [i, j, k])
    }

    #[inline(always)]
    fn downward_dx(f: FieldView<'_, F>, c: &StencilCoefficients<F>, i: i64, j: i64, k: i64) -> F {
        Self::downward(f, c, 0, [i, j, k])
    }

    #[inline(always)]
    fn downward_dy(f: FieldView<'_, F>, c: &StencilCoefficients<F>, i: i64, j: i64, k: i64) -> F {
        Self::downward(f, c, 1, [i, j, k])
    }

    #[inline(always)]
    fn downward_dz(f: FieldView<'_, F>, c: &StencilCoefficients<F>, i: i64, j: i64, k: i64) -> F {
        Self::downward(f, c, 2, [i, j, k])
    }
}

// 1 / (c sqrt(sum 1/d^2)) over the active axes
pub(crate) fn courant_dt<F: Real>(cell_size: [F; 3], active: [bool; 3]) -> F {
    let sum = (0..3)
        .filter(|&axis| active[axis])
        .fold(F::ZERO, |acc, axis| {
            acc + F::ONE / (cell_size[axis] * cell_size[axis])
        });
    F::ONE / (F::from_f64(constants::C) * sum.sqrt())
}

/// Stencil selected for a run, fixed at configuration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilKind {
    CartesianYee,
    CartesianCkc,
    CartesianNodal,
    CylindricalYee,
}

impl StencilKind {
    pub fn select(algo: FdtdAlgo, grid_type: GridType, coords: CoordSystem) -> Result<Self, PicError> {
        match (coords, grid_type, algo) {
            (CoordSystem::Cylindrical, GridType::Staggered, FdtdAlgo::Yee) => {
                Ok(StencilKind::CylindricalYee)
            }
            (CoordSystem::Cylindrical, _, _) => Err(PicError::UnsupportedAlgorithm {
                algo,
                grid_type,
                coords,
            }),
            (_, GridType::Staggered, FdtdAlgo::Yee) => Ok(StencilKind::CartesianYee),
            (_, GridType::Staggered, FdtdAlgo::Ckc) => Ok(StencilKind::CartesianCkc),
            (_, GridType::Collocated, FdtdAlgo::Yee) => Ok(StencilKind::CartesianNodal),
            (_, GridType::Collocated, FdtdAlgo::Ckc) => Err(PicError::UnsupportedAlgorithm {
                algo,
                grid_type,
                coords,
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StencilKind::CartesianYee => <CartesianYee as Stencil<f64>>::NAME,
            StencilKind::CartesianCkc => <CartesianCkc as Stencil<f64>>::NAME,
            StencilKind::CartesianNodal => <CartesianNodal as Stencil<f64>>::NAME,
            StencilKind::CylindricalYee => CylindricalYee::NAME,
        }
    }

    pub fn coefficients<F: Real>(self, geom: &Geometry<F>) -> StencilCoefficients<F> {
        let active = geom.active_axes();
        match self {
            StencilKind::CartesianYee => CartesianYee::coefficients(geom.cell_size, active),
            StencilKind::CartesianCkc => CartesianCkc::coefficients(geom.cell_size, active),
            StencilKind::CartesianNodal => CartesianNodal::coefficients(geom.cell_size, active),
            StencilKind::CylindricalYee => CylindricalYee::coefficients(geom.cell_size),
        }
    }

    /// CFL bound; `nmodes` only matters in cylindrical geometry.
    pub fn compute_max_dt<F: Real>(self, geom: &Geometry<F>, nmodes: usize) -> F {
        let active = geom.active_axes();
        match self {
            StencilKind::CartesianYee => CartesianYee::compute_max_dt(geom.cell_size, active),
            StencilKind::CartesianCkc => CartesianCkc::compute_max_dt(geom.cell_size, active),
            StencilKind::CartesianNodal => CartesianNodal::compute_max_dt(geom.cell_size, active),
            StencilKind::CylindricalYee => CylindricalYee::compute_max_dt(geom.cell_size, nmodes),
        }
    }

    pub fn max_guard_cells(self) -> usize {
        match self {
            StencilKind::CartesianYee => <CartesianYee as Stencil<f64>>::max_guard_cells(),
            StencilKind::CartesianCkc => <CartesianCkc as Stencil<f64>>::max_guard_cells(),
            StencilKind::CartesianNodal => <CartesianNodal as Stencil<f64>>::max_guard_cells(),
            StencilKind::CylindricalYee => CylindricalYee::max_guard_cells(),
        }
    }
}

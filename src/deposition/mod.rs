//! Charge and current deposition.
//!
//! Two strategies share the per-particle kernels of [`kernel`]: [`DirectDeposition`] adds every
//! contribution atomically into the mesh, [`SharedDeposition`] accumulates the particles of a
//! tile in a private buffer first and adds the buffer back once.

use crate::{
    field::{MeshField, VectorField},
    geometry::Geometry,
    particles::SpeciesView,
    shape::ShapeOrder,
    PicError, Real,
};

/// Expands `$body` once per shape order with `$S` bound to the matching shape type.
macro_rules! with_shape {
    ($order: expr, $S: ident => $body: expr) => {
        match $order {
            $crate::shape::ShapeOrder::Ngp => {
                type $S = $crate::shape::Ngp;
                $body
            }
            $crate::shape::ShapeOrder::Linear => {
                type $S = $crate::shape::Linear;
                $body
            }
            $crate::shape::ShapeOrder::Quadratic => {
                type $S = $crate::shape::Quadratic;
                $body
            }
            $crate::shape::ShapeOrder::Cubic => {
                type $S = $crate::shape::Cubic;
                $body
            }
        }
    };
}
pub(crate) use with_shape;

mod direct;
pub(crate) mod kernel;
mod shared;

pub use direct::DirectDeposition;
pub use shared::SharedDeposition;

use kernel::DepositCtx;

/// Deposition strategy, chosen at configuration time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DepositionAlgo {
    #[default]
    Direct,
    Shared,
}

impl DepositionAlgo {
    pub fn depositor<F: Real>(
        self,
        order: ShapeOrder,
        bin_size: [usize; 3],
        shared_mem_bytes: usize,
    ) -> Box<dyn Depositor<F>> {
        match self {
            DepositionAlgo::Direct => Box::new(DirectDeposition::new(order)),
            DepositionAlgo::Shared => {
                Box::new(SharedDeposition::new(order, bin_size, shared_mem_bytes))
            }
        }
    }
}

/// Scatters particle charge and current onto the mesh.
///
/// Every check happens before the first write. Contributions falling outside the storage of a
/// field are reported as [`PicError::ParticleOutsideMesh`] once the call has completed.
pub trait Depositor<F: Real>: Send + Sync {
    fn name(&self) -> &'static str;

    fn order(&self) -> ShapeOrder;

    /// Adds `q w / V` of every particle of `species` to `rho`.
    fn deposit_charge(
        &self,
        rho: &mut MeshField<F>,
        species: &SpeciesView<'_, F>,
        geom: &Geometry<F>,
    ) -> Result<(), PicError>;

    /// Adds `q w v / V` of every particle of `species` to `j`, at positions advanced by
    /// `relative_time`.
    fn deposit_current(
        &self,
        j: &mut VectorField<F>,
        species: &SpeciesView<'_, F>,
        geom: &Geometry<F>,
        relative_time: F,
    ) -> Result<(), PicError>;
}

// number of azimuthal modes stored in `field`
fn modes_of<F: Real>(field: &MeshField<F>, geom: &Geometry<F>) -> Result<usize, PicError> {
    let ncomp = field.ncomp();
    if !geom.coords.is_cylindrical() {
        field.check_ncomp(1)?;
        return Ok(1);
    }
    if ncomp % 2 == 0 {
        return Err(PicError::ComponentMismatch {
            field: field.name().to_string(),
            found: ncomp,
            expected: ncomp + 1,
        });
    }
    Ok((ncomp + 1) / 2)
}

fn check_field<F: Real>(field: &MeshField<F>, geom: &Geometry<F>, order: ShapeOrder) -> Result<usize, PicError> {
    if field.domain_box() != geom.domain_box() {
        return Err(PicError::MeshMismatch {
            a: field.name().to_string(),
            b: "deposition geometry".to_string(),
        });
    }
    field.check_guard_cells([order.guard_cells(); 3])?;
    modes_of(field, geom)
}

pub(crate) fn prepare_charge<F: Real>(
    rho: &MeshField<F>,
    species: &SpeciesView<'_, F>,
    geom: &Geometry<F>,
    order: ShapeOrder,
) -> Result<DepositCtx<F>, PicError> {
    let nmodes = check_field(rho, geom, order)?;
    Ok(DepositCtx {
        q_invvol: species.charge * geom.inv_cell_volume(),
        cylindrical: geom.coords.is_cylindrical(),
        nmodes,
        relative_time: F::ZERO,
    })
}

pub(crate) fn prepare_current<F: Real>(
    j: &VectorField<F>,
    species: &SpeciesView<'_, F>,
    geom: &Geometry<F>,
    order: ShapeOrder,
    relative_time: F,
) -> Result<DepositCtx<F>, PicError> {
    if !species.particles.has_momentum() {
        return Err(PicError::MissingMomentum);
    }
    let nmodes = check_field(&j[0], geom, order)?;
    for d in 1..3 {
        check_field(&j[d], geom, order)?;
        j[d].check_ncomp(j[0].ncomp())?;
    }
    Ok(DepositCtx {
        q_invvol: species.charge * geom.inv_cell_volume(),
        cylindrical: geom.coords.is_cylindrical(),
        nmodes,
        relative_time,
    })
}

pub(crate) fn report_outside(field: &str, count: usize) -> Result<(), PicError> {
    if count > 0 {
        tracing::event!(
            tracing::Level::WARN,
            "{} contribution(s) outside `{}`",
            count,
            field
        );
        return Err(PicError::ParticleOutsideMesh {
            field: field.to_string(),
            count,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::{CoordSystem, IndexType},
        particles::ParticleView,
    };

    #[test]
    fn configuration_errors_come_first() {
        let geom = Geometry::from_steps(CoordSystem::Cartesian3D, [0.0; 3], [1.0; 3], [4; 3]);
        let (x, w) = ([0.5f64], [1.0f64]);
        let particles = ParticleView::new(&x, &x, &x, &w).unwrap();
        let species = SpeciesView::new("e", -1.0, particles);

        let mut thin = MeshField::new("rho", &geom, [IndexType::Node; 3], 1, 1);
        let depositor = DepositionAlgo::Direct.depositor::<f64>(ShapeOrder::Cubic, [4; 3], 0);
        assert!(matches!(
            depositor.deposit_charge(&mut thin, &species, &geom),
            Err(PicError::InsufficientGuardCells { .. })
        ));
        assert_eq!(thin.max_abs(), 0.0);

        let mut j = VectorField::current("j", &geom, crate::GridType::Staggered, 2, 1);
        assert_eq!(
            depositor.deposit_current(&mut j, &species, &geom, 0.0),
            Err(PicError::MissingMomentum)
        );
    }
}

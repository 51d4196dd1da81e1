use std::sync::atomic::AtomicUsize;

use rayon::prelude::*;
use tracing::Level;

use crate::{
    field::{MeshField, VectorField},
    geometry::Geometry,
    particles::{ParticleView, SpeciesView},
    shape::{Shape, ShapeOrder},
    PicError, Real,
};

use super::{
    kernel::{self, AtomicSink, DepositCtx, MeshMap},
    prepare_charge, prepare_current, report_outside, with_shape, Depositor,
};

// particles handled by one rayon task
const MIN_PARTICLES_PER_TASK: usize = 256;

/// One task per particle, atomic adds into the mesh.
#[derive(Clone, Copy, Debug)]
pub struct DirectDeposition {
    order: ShapeOrder,
}

impl DirectDeposition {
    pub fn new(order: ShapeOrder) -> Self {
        Self { order }
    }
}

fn charge<F: Real, S: Shape>(
    rho: &mut MeshField<F>,
    map: MeshMap<F>,
    ctx: DepositCtx<F>,
    particles: &ParticleView<'_, F>,
) -> usize {
    let storage = rho.grown_box();
    let outside = AtomicUsize::new(0);
    let cols = rho.atomic_columns();
    let sink = AtomicSink::<F>::new(&cols, storage, &outside);

    (0..particles.len())
        .into_par_iter()
        .with_min_len(MIN_PARTICLES_PER_TASK)
        .for_each(|ip| {
            let mut sink = sink;
            kernel::deposit_charge_particle::<F, S, _>(&mut sink, &map, &ctx, particles, ip);
        });

    outside.into_inner()
}

fn current<F: Real, S: Shape>(
    j: &mut VectorField<F>,
    maps: [MeshMap<F>; 3],
    ctx: DepositCtx<F>,
    particles: &ParticleView<'_, F>,
) -> usize {
    let storage = [0, 1, 2].map(|d| j[d].grown_box());
    let outside = AtomicUsize::new(0);
    let [jx, jy, jz] = j.comps_mut();
    let cols = [jx.atomic_columns(), jy.atomic_columns(), jz.atomic_columns()];
    let sinks = [0, 1, 2].map(|d| AtomicSink::<F>::new(&cols[d], storage[d], &outside));

    (0..particles.len())
        .into_par_iter()
        .with_min_len(MIN_PARTICLES_PER_TASK)
        .for_each(|ip| {
            let mut sinks = sinks;
            kernel::deposit_current_particle::<F, S, _>(&mut sinks, &maps, &ctx, particles, ip);
        });

    outside.into_inner()
}

impl<F: Real> Depositor<F> for DirectDeposition {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn order(&self) -> ShapeOrder {
        self.order
    }

    fn deposit_charge(
        &self,
        rho: &mut MeshField<F>,
        species: &SpeciesView<'_, F>,
        geom: &Geometry<F>,
    ) -> Result<(), PicError> {
        let ctx = prepare_charge(rho, species, geom, self.order)?;
        let map = MeshMap::new(geom, rho.ix_type());
        tracing::event!(
            Level::DEBUG,
            "direct charge deposition of {} `{}` particle(s), order {}",
            species.particles.len(),
            species.name,
            self.order.order()
        );

        let outside = with_shape!(self.order, S => charge::<F, S>(rho, map, ctx, &species.particles));
        report_outside(rho.name(), outside)
    }

    fn deposit_current(
        &self,
        j: &mut VectorField<F>,
        species: &SpeciesView<'_, F>,
        geom: &Geometry<F>,
        relative_time: F,
    ) -> Result<(), PicError> {
        let ctx = prepare_current(j, species, geom, self.order, relative_time)?;
        let maps = [0, 1, 2].map(|d| MeshMap::new(geom, j[d].ix_type()));
        tracing::event!(
            Level::DEBUG,
            "direct current deposition of {} `{}` particle(s), order {}",
            species.particles.len(),
            species.name,
            self.order.order()
        );

        let outside = with_shape!(self.order, S => current::<F, S>(j, maps, ctx, &species.particles));
        report_outside(j[0].name(), outside)
    }
}

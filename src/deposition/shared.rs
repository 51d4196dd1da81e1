use std::sync::atomic::AtomicUsize;

use rayon::prelude::*;
use tracing::Level;

use crate::{
    field::{electric_types, MeshField, VectorField},
    geometry::{Geometry, IndexBox, IndexType},
    particles::{DenseBins, ParticleView, SpeciesView},
    shape::{Shape, ShapeOrder},
    stencil::GridType,
    PicError, Real,
};

use super::{
    kernel::{self, AtomicSink, DepositCtx, MeshMap, TileSink},
    prepare_charge, prepare_current, report_outside, with_shape, Depositor,
};

const NODAL: [IndexType; 3] = [IndexType::Node; 3];

/// One task per tile: particles of the tile accumulate in a private buffer covering the tile
/// and a halo as wide as the shape order, which is then added to the mesh.
#[derive(Clone, Copy, Debug)]
pub struct SharedDeposition {
    order: ShapeOrder,
    bin_size: [usize; 3],
    shared_mem_bytes: usize,
}

impl SharedDeposition {
    pub fn new(order: ShapeOrder, bin_size: [usize; 3], shared_mem_bytes: usize) -> Self {
        Self {
            order,
            bin_size,
            shared_mem_bytes,
        }
    }

    fn tile_box(&self, cells: IndexBox, ix_type: [IndexType; 3], active: [bool; 3]) -> IndexBox {
        let halo = active.map(|a| if a { self.order.order() as i64 } else { 0 });
        cells.convert(ix_type, active).grow(halo)
    }

    /// Private buffer, in bytes, one tile of `bin_size` cells needs for a field with the given
    /// centering and component count.
    pub fn buffer_bytes<F: Real>(
        &self,
        bin_size: [usize; 3],
        ix_type: [IndexType; 3],
        ncomp: usize,
        geom: &Geometry<F>,
    ) -> usize {
        let cells = IndexBox::new([0; 3], bin_size.map(|n| n.max(1) as i64 - 1));
        self.tile_box(cells, ix_type, geom.active_axes()).num_pts() * ncomp * std::mem::size_of::<F>()
    }

    /// Checks, ahead of any deposition, that the tiles of nodal ρ and of J laid out for
    /// `grid_type` fit the shared-memory budget.
    pub fn check_layout<F: Real>(&self, geom: &Geometry<F>, grid_type: GridType, ncomp: usize) -> Result<(), PicError> {
        // tiles never exceed the domain
        let bin_size = [0, 1, 2].map(|axis| self.bin_size[axis].clamp(1, geom.n_cell[axis]));
        self.check_budget(self.buffer_bytes(bin_size, NODAL, ncomp, geom))?;
        let current = electric_types(grid_type)
            .iter()
            .map(|&ix| self.buffer_bytes(bin_size, ix, ncomp, geom))
            .sum();
        self.check_budget(current)
    }

    fn check_budget(&self, requested: usize) -> Result<(), PicError> {
        if requested > self.shared_mem_bytes {
            return Err(PicError::SharedMemoryExceeded {
                requested,
                available: self.shared_mem_bytes,
            });
        }
        Ok(())
    }

    fn check_bins<F: Real>(bins: &DenseBins, particles: &ParticleView<'_, F>) -> Result<(), PicError> {
        if bins.permutation().len() != particles.len() {
            return Err(PicError::ParticleArrayLength {
                array: "bin permutation",
                found: bins.permutation().len(),
                expected: particles.len(),
            });
        }
        Ok(())
    }

    /// Charge deposition with particles already sorted into `bins`.
    pub fn deposit_charge_binned<F: Real>(
        &self,
        rho: &mut MeshField<F>,
        species: &SpeciesView<'_, F>,
        bins: &DenseBins,
        geom: &Geometry<F>,
    ) -> Result<(), PicError> {
        let ctx = prepare_charge(rho, species, geom, self.order)?;
        Self::check_bins(bins, &species.particles)?;
        let requested = self.buffer_bytes(bins.bin_size(), rho.ix_type(), rho.ncomp(), geom);
        self.check_budget(requested)?;

        let active = geom.active_axes();
        let map = MeshMap::new(geom, rho.ix_type());
        let tiles: Vec<IndexBox> = (0..bins.num_bins())
            .map(|b| self.tile_box(bins.bin_box(b), rho.ix_type(), active))
            .collect();
        tracing::event!(
            Level::DEBUG,
            "shared charge deposition of {} `{}` particle(s) over {} tile(s), {} byte buffers",
            species.particles.len(),
            species.name,
            tiles.len(),
            requested
        );

        let outside = with_shape!(self.order, S => charge::<F, S>(rho, bins, &tiles, map, ctx, &species.particles));
        report_outside(rho.name(), outside)
    }

    /// Current deposition with particles already sorted into `bins`.
    pub fn deposit_current_binned<F: Real>(
        &self,
        j: &mut VectorField<F>,
        species: &SpeciesView<'_, F>,
        bins: &DenseBins,
        geom: &Geometry<F>,
        relative_time: F,
    ) -> Result<(), PicError> {
        let ctx = prepare_current(j, species, geom, self.order, relative_time)?;
        Self::check_bins(bins, &species.particles)?;
        let requested = (0..3)
            .map(|d| self.buffer_bytes(bins.bin_size(), j[d].ix_type(), j[d].ncomp(), geom))
            .sum();
        self.check_budget(requested)?;

        let active = geom.active_axes();
        let maps = [0, 1, 2].map(|d| MeshMap::new(geom, j[d].ix_type()));
        let tiles: Vec<[IndexBox; 3]> = (0..bins.num_bins())
            .map(|b| [0, 1, 2].map(|d| self.tile_box(bins.bin_box(b), j[d].ix_type(), active)))
            .collect();
        tracing::event!(
            Level::DEBUG,
            "shared current deposition of {} `{}` particle(s) over {} tile(s), {} byte buffers",
            species.particles.len(),
            species.name,
            tiles.len(),
            requested
        );

        let outside = with_shape!(self.order, S => current::<F, S>(j, bins, &tiles, maps, ctx, &species.particles));
        report_outside(j[0].name(), outside)
    }
}

fn charge<F: Real, S: Shape>(
    rho: &mut MeshField<F>,
    bins: &DenseBins,
    tiles: &[IndexBox],
    map: MeshMap<F>,
    ctx: DepositCtx<F>,
    particles: &ParticleView<'_, F>,
) -> usize {
    let storage = rho.grown_box();
    let ncomp = rho.ncomp();
    let outside = AtomicUsize::new(0);
    let cols = rho.atomic_columns();
    let global = AtomicSink::<F>::new(&cols, storage, &outside);

    (0..bins.num_bins())
        .into_par_iter()
        .for_each_init(Vec::new, |buf, b| {
            let in_tile = bins.bin(b);
            if in_tile.is_empty() {
                return;
            }
            let mut sink = TileSink::new(buf, tiles[b], ncomp, global);
            for &ip in in_tile {
                kernel::deposit_charge_particle::<F, S, _>(&mut sink, &map, &ctx, particles, ip);
            }
            sink.flush();
        });

    outside.into_inner()
}

fn current<F: Real, S: Shape>(
    j: &mut VectorField<F>,
    bins: &DenseBins,
    tiles: &[[IndexBox; 3]],
    maps: [MeshMap<F>; 3],
    ctx: DepositCtx<F>,
    particles: &ParticleView<'_, F>,
) -> usize {
    let storage = [0, 1, 2].map(|d| j[d].grown_box());
    let ncomp = j[0].ncomp();
    let outside = AtomicUsize::new(0);
    let [jx, jy, jz] = j.comps_mut();
    let cols = [jx.atomic_columns(), jy.atomic_columns(), jz.atomic_columns()];
    let globals = [0, 1, 2].map(|d| AtomicSink::<F>::new(&cols[d], storage[d], &outside));

    (0..bins.num_bins())
        .into_par_iter()
        .for_each_init(
            || [Vec::new(), Vec::new(), Vec::new()],
            |bufs, b| {
                let in_tile = bins.bin(b);
                if in_tile.is_empty() {
                    return;
                }
                let [bx, by, bz] = bufs;
                let mut sinks = [
                    TileSink::new(bx, tiles[b][0], ncomp, globals[0]),
                    TileSink::new(by, tiles[b][1], ncomp, globals[1]),
                    TileSink::new(bz, tiles[b][2], ncomp, globals[2]),
                ];
                for &ip in in_tile {
                    kernel::deposit_current_particle::<F, S, _>(&mut sinks, &maps, &ctx, particles, ip);
                }
                for sink in sinks {
                    sink.flush();
                }
            },
        );

    outside.into_inner()
}

impl<F: Real> Depositor<F> for SharedDeposition {
    fn name(&self) -> &'static str {
        "shared"
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
        let bins = DenseBins::build(&species.particles, geom, self.bin_size);
        self.deposit_charge_binned(rho, species, &bins, geom)
    }

    fn deposit_current(
        &self,
        j: &mut VectorField<F>,
        species: &SpeciesView<'_, F>,
        geom: &Geometry<F>,
        relative_time: F,
    ) -> Result<(), PicError> {
        let bins = DenseBins::build(&species.particles, geom, self.bin_size);
        self.deposit_current_binned(j, species, &bins, geom, relative_time)
    }
}

use std::fmt;

use crate::{
    boundary::{BoundaryTable, BoundaryType, TableKind},
    deposition::{DepositionAlgo, SharedDeposition},
    geometry::Geometry,
    shape::ShapeOrder,
    stencil::{FdtdAlgo, GridType, StencilKind},
    PicError, Real,
};

/// Run-time choices of the field/deposition core, as supplied by the application.
#[derive(Clone, Debug, PartialEq)]
pub struct PicConfig<F> {
    pub algo: FdtdAlgo,
    pub grid_type: GridType,
    pub shape_order: ShapeOrder,
    pub deposition: DepositionAlgo,
    pub field_bc: BoundaryTable,
    pub particle_bc: BoundaryTable,
    pub nmodes: usize,
    pub cfl: F,
    pub guard_cells: usize,
    pub tile_planes: usize,
    pub bin_size: [usize; 3],
    pub shared_mem_bytes: usize,
    /// Advance the F field cleaning the divergence of E.
    pub clean_e_divergence: bool,
    /// Advance the G field cleaning the divergence of B.
    pub clean_b_divergence: bool,
}

impl<F: Real> Default for PicConfig<F> {
    fn default() -> Self {
        Self {
            algo: FdtdAlgo::Yee,
            grid_type: GridType::Staggered,
            shape_order: ShapeOrder::Linear,
            deposition: DepositionAlgo::Direct,
            field_bc: BoundaryTable::uniform(BoundaryType::Pec),
            particle_bc: BoundaryTable::uniform(BoundaryType::Absorbing),
            nmodes: 1,
            cfl: F::from_f64(0.999),
            guard_cells: 2,
            tile_planes: 8,
            bin_size: [4; 3],
            // 48 KiB, the usual per-block budget of a GPU
            shared_mem_bytes: 48 * 1024,
            clean_e_divergence: false,
            clean_b_divergence: false,
        }
    }
}

impl<F: Real> PicConfig<F> {
    pub fn with_solver(mut self, algo: FdtdAlgo, grid_type: GridType) -> Self {
        self.algo = algo;
        self.grid_type = grid_type;
        self
    }

    pub fn with_shape_order(mut self, order: ShapeOrder) -> Self {
        self.shape_order = order;
        self
    }

    pub fn with_deposition(mut self, deposition: DepositionAlgo) -> Self {
        self.deposition = deposition;
        self
    }

    pub fn with_boundaries(mut self, field_bc: BoundaryTable, particle_bc: BoundaryTable) -> Self {
        self.field_bc = field_bc;
        self.particle_bc = particle_bc;
        self
    }

    pub fn with_modes(mut self, nmodes: usize) -> Self {
        self.nmodes = nmodes;
        self
    }

    pub fn with_cfl(mut self, cfl: F) -> Self {
        self.cfl = cfl;
        self
    }

    pub fn with_guard_cells(mut self, guard_cells: usize) -> Self {
        self.guard_cells = guard_cells;
        self
    }

    pub fn with_tiling(mut self, tile_planes: usize, bin_size: [usize; 3]) -> Self {
        self.tile_planes = tile_planes;
        self.bin_size = bin_size;
        self
    }

    pub fn with_shared_mem_bytes(mut self, shared_mem_bytes: usize) -> Self {
        self.shared_mem_bytes = shared_mem_bytes;
        self
    }

    pub fn with_divergence_cleaning(mut self, e: bool, b: bool) -> Self {
        self.clean_e_divergence = e;
        self.clean_b_divergence = b;
        self
    }

    /// Components stored per mesh point: 1 in Cartesian geometry, `2 nmodes - 1` in RZ.
    pub fn ncomp(&self) -> usize {
        2 * self.nmodes.max(1) - 1
    }

    /// Guard cells the configured stencil and shape factor need.
    pub fn required_guard_cells(&self, stencil: StencilKind) -> usize {
        stencil.max_guard_cells().max(self.shape_order.guard_cells())
    }

    /// Runs every configuration check against `geom`, before any field exists.
    pub fn validate(&self, geom: &Geometry<F>) -> Result<StencilKind, PicError> {
        let stencil = StencilKind::select(self.algo, self.grid_type, geom.coords)?;

        let cylindrical = geom.coords.is_cylindrical();
        if (cylindrical && self.nmodes == 0) || (!cylindrical && self.nmodes != 1) {
            return Err(PicError::InvalidModeCount(self.nmodes));
        }
        if cylindrical && self.clean_b_divergence {
            return Err(PicError::UnsupportedOperation {
                operation: "divergence cleaning of B",
                coords: geom.coords,
            });
        }

        self.field_bc.validate(TableKind::Field, geom)?;
        self.particle_bc.validate(TableKind::Particle, geom)?;

        if !(self.cfl > F::ZERO && self.cfl <= F::ONE) {
            return Err(PicError::Config(format!(
                "CFL factor must lie in (0, 1], got {}",
                self.cfl
            )));
        }

        let needed = self.required_guard_cells(stencil);
        if self.guard_cells < needed {
            return Err(PicError::Config(format!(
                "{} guard cell(s) configured, `{}` stencil with order {} shape needs {}",
                self.guard_cells,
                stencil.name(),
                self.shape_order.order(),
                needed
            )));
        }

        if self.tile_planes == 0 || self.bin_size.contains(&0) {
            return Err(PicError::Config(format!(
                "tiles must not be empty (tile_planes = {}, bin_size = {:?})",
                self.tile_planes, self.bin_size
            )));
        }

        if self.deposition == DepositionAlgo::Shared {
            SharedDeposition::new(self.shape_order, self.bin_size, self.shared_mem_bytes).check_layout(
                geom,
                self.grid_type,
                self.ncomp(),
            )?;
        }

        Ok(stencil)
    }
}

impl<F: Real> fmt::Display for PicConfig<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} ({:?}) solver, order {} {:?} deposition, {} mode(s), CFL {}, {} guard cell(s)",
            self.algo,
            self.grid_type,
            self.shape_order.order(),
            self.deposition,
            self.nmodes,
            self.cfl,
            self.guard_cells
        )
    }
}

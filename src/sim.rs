use std::fmt;

use tracing::Level as LogLevel;

use crate::{
    config::PicConfig,
    deposition::Depositor,
    evolve::FiniteDifferenceSolver,
    field::{g_field_type, MeshField, VectorField},
    geometry::{Geometry, IndexType},
    stencil::StencilKind,
    PicError, Real,
};

/// Fields and solver of one refinement level.
#[derive(Clone, Debug)]
pub struct Level<F: Real> {
    pub geom: Geometry<F>,
    pub solver: FiniteDifferenceSolver<F>,
    pub e: VectorField<F>,
    pub b: VectorField<F>,
    pub j: VectorField<F>,
    pub rho: MeshField<F>,
    pub f: Option<MeshField<F>>,
    pub g: Option<MeshField<F>>,
}

impl<F: Real> Level<F> {
    pub fn new(geom: Geometry<F>, config: &PicConfig<F>) -> Result<Self, PicError> {
        let solver = FiniteDifferenceSolver::new(config.algo, config.grid_type, &geom, config.nmodes)?
            .with_tile_planes(config.tile_planes);
        let (ng, ncomp) = (config.guard_cells, config.ncomp());
        let nodal = |name: &str| MeshField::new(name, &geom, [IndexType::Node; 3], ng, ncomp);

        Ok(Self {
            e: VectorField::electric("E", &geom, config.grid_type, ng, ncomp),
            b: VectorField::magnetic("B", &geom, config.grid_type, ng, ncomp),
            j: VectorField::current("j", &geom, config.grid_type, ng, ncomp),
            rho: nodal("rho"),
            f: config.clean_e_divergence.then(|| nodal("F")),
            g: config
                .clean_b_divergence
                .then(|| MeshField::new("G", &geom, g_field_type(config.grid_type), ng, ncomp)),
            solver,
            geom,
        })
    }

    /// Electromagnetic energy density summed over the valid points, in units of ε0.
    pub fn field_energy(&self) -> F {
        let c2 = F::from_f64(crate::constants::C * crate::constants::C);
        let sum_sq = |v: &VectorField<F>| {
            v.comps().iter().fold(F::ZERO, |acc, f| {
                acc + (0..f.ncomp()).fold(F::ZERO, |acc, comp| {
                    acc + f.valid_box().iter().fold(F::ZERO, |acc, [i, j, k]| {
                        let x = f.read(i, j, k, comp);
                        acc + x * x
                    })
                })
            })
        };
        F::HALF * (sum_sq(&self.e) + c2 * sum_sq(&self.b)) * self.geom.cell_volume()
    }
}

/// Validated configuration, refinement hierarchy and time step of a run.
pub struct Simulation<F: Real> {
    pub(crate) name: String,
    pub(crate) config: PicConfig<F>,
    pub(crate) stencil: StencilKind,
    pub(crate) levels: Vec<Level<F>>,
    pub(crate) ref_ratios: Vec<[i64; 3]>,
    pub(crate) depositor: Box<dyn Depositor<F>>,
    pub(crate) dt: F,
}

impl<F: Real> Simulation<F> {
    pub fn new(name: impl AsRef<str>, config: PicConfig<F>, geom: Geometry<F>) -> Result<Self, PicError> {
        let stencil = config.validate(&geom)?;
        let depositor =
            config
                .deposition
                .depositor(config.shape_order, config.bin_size, config.shared_mem_bytes);
        let level = Level::new(geom, &config)?;
        let dt = config.cfl * level.solver.compute_max_dt();

        tracing::event!(
            LogLevel::DEBUG,
            "simulation `{}`: {}, dt = {:e}",
            name.as_ref(),
            config,
            dt
        );

        Ok(Self {
            name: name.as_ref().to_string(),
            config,
            stencil,
            levels: vec![level],
            ref_ratios: Vec::new(),
            depositor,
            dt,
        })
    }

    /// Adds a level refined by `ratio` over the finest one; the time step follows the new level.
    pub fn with_refinement(mut self, ratio: [i64; 3]) -> Result<Self, PicError> {
        if ratio.iter().any(|&r| r < 1) {
            return Err(PicError::Config(format!("invalid refinement ratio {ratio:?}")));
        }
        let fine = match self.levels.last() {
            Some(level) => level.geom.refine(ratio),
            None => return Err(PicError::MissingRefinementRatio { lev: 0 }),
        };
        self.config.validate(&fine)?;
        let level = Level::new(fine, &self.config)?;
        self.dt = self.config.cfl * level.solver.compute_max_dt();
        self.levels.push(level);
        self.ref_ratios.push(ratio);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &PicConfig<F> {
        &self.config
    }

    pub fn stencil(&self) -> StencilKind {
        self.stencil
    }

    pub fn dt(&self) -> F {
        self.dt
    }

    pub fn levels(&self) -> &[Level<F>] {
        &self.levels
    }

    pub fn levels_mut(&mut self) -> &mut [Level<F>] {
        &mut self.levels
    }

    pub fn level(&self, lev: usize) -> Option<&Level<F>> {
        self.levels.get(lev)
    }

    pub fn ref_ratios(&self) -> &[[i64; 3]] {
        &self.ref_ratios
    }

    pub fn depositor(&self) -> &dyn Depositor<F> {
        self.depositor.as_ref()
    }
}

impl<F: Real> fmt::Display for Simulation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "simulation `{}`:\n\t- `{}` stencil, `{}` deposition (order {})\n\t- {} level(s)",
            self.name,
            self.stencil.name(),
            self.depositor.name(),
            self.config.shape_order.order(),
            self.levels.len(),
        )?;
        if let Some(finest) = self.levels.last() {
            write!(f, ", finest d = {:?} ({:?} cells)", finest.geom.cell_size, finest.geom.n_cell)?;
        }
        write!(f, "\n\t- Δt = {:e}", self.dt)
    }
}

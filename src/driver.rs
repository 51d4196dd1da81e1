use thiserror::Error;

use crate::{
    boundary::{
        apply_pec_to_bfield, apply_pec_to_efield, apply_reflective_boundary_to_j,
        apply_reflective_boundary_to_rho, BoundaryType, PatchLevel,
    },
    config::PicConfig,
    deposition::Depositor,
    field::{MeshField, VectorField},
    geometry::{Geometry, PatchType},
    particles::SpeciesView,
    sim::{Level, Simulation},
    PicError, Real,
};

#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Pic(#[from] PicError),
}

#[derive(Debug, Clone, Copy)]
pub enum Resolution<F> {
    Delta(F),
    Steps(usize),
}

impl<F: Real> Resolution<F> {
    fn steps(self, dt: F) -> usize {
        match self {
            Resolution::Delta(delta) => (delta / dt).to_f64().ceil().max(1.0) as usize,
            Resolution::Steps(steps) => steps,
        }
    }
}

/// Particles advanced alongside the fields.
///
/// The cycle deposits the current at `relative_time = -dt/2`: positions are expected at the
/// current step and momenta half a step behind, as left by a leap-frog pusher.
pub trait ParticleSource<F: Real> {
    /// Species depositing onto level `lev`.
    fn species(&self, lev: usize) -> Vec<SpeciesView<'_, F>>;

    /// Advances the particles of level `lev` in its freshly updated fields.
    #[allow(unused_variables)]
    fn push(&mut self, lev: usize, level: &Level<F>, dt: F) -> Result<(), PicError> {
        Ok(())
    }
}

/// Field-only runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoParticles;

impl<F: Real> ParticleSource<F> for NoParticles {
    fn species(&self, _lev: usize) -> Vec<SpeciesView<'_, F>> {
        Vec::new()
    }
}

#[derive(Clone, Copy)]
pub struct ObsCtx<'ctx, F: Real> {
    sim: &'ctx Simulation<F>,
    time_sampling: usize,
    steps: usize,

    // Iteration info
    iter: usize,
    time: F,
}

impl<'ctx, F: Real> ObsCtx<'ctx, F> {
    pub fn sim(&self) -> &'ctx Simulation<F> {
        self.sim
    }

    pub fn level(&self, lev: usize) -> Option<&'ctx Level<F>> {
        self.sim.level(lev)
    }

    pub fn iter(&self) -> usize {
        self.iter
    }

    pub fn time(&self) -> F {
        self.time
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn sampling_period(&self) -> usize {
        self.time_sampling
    }
}

#[allow(unused_variables)]
pub trait Observer<F: Real> {
    fn at_startup(&mut self, ctx: ObsCtx<F>) -> Result<(), SimError> {
        Ok(())
    }

    fn at_each_iteration(&mut self, ctx: ObsCtx<F>) -> Result<(), SimError> {
        Ok(())
    }

    fn at_cleanup(&mut self, ctx: ObsCtx<F>) -> Result<(), SimError> {
        Ok(())
    }
}

pub struct Driver<'d, F: Real, P> {
    pub(crate) sim: Simulation<F>,
    pub(crate) source: P,
    pub(crate) observers: Vec<Box<dyn Observer<F> + 'd>>,
    pub(crate) steps: usize,
    pub(crate) time_sampling: usize,
    pub(crate) iter: usize,
    pub(crate) time: F,
}

impl<'d, F: Real, P: ParticleSource<F>> Driver<'d, F, P> {
    pub fn new(sim: Simulation<F>, source: P) -> Self {
        Self {
            sim,
            source,
            observers: Vec::new(),
            steps: 100,
            time_sampling: 1 + 100 / 10,
            iter: 0,
            time: F::ZERO,
        }
    }

    pub fn with_duration(mut self, duration: Resolution<F>) -> Self {
        self.steps = duration.steps(self.sim.dt);
        self.time_sampling = 1 + self.steps / 10;
        self
    }

    pub fn with_time_sampling(mut self, sampling_period: Resolution<F>) -> Self {
        self.time_sampling = sampling_period.steps(self.sim.dt).max(1);
        self
    }

    pub fn with_observer(mut self, observer: impl Observer<F> + 'd) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn sim(&self) -> &Simulation<F> {
        &self.sim
    }

    pub fn sim_mut(&mut self) -> &mut Simulation<F> {
        &mut self.sim
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn into_parts(self) -> (Simulation<F>, P) {
        (self.sim, self.source)
    }

    fn ctx(&self) -> ObsCtx<'_, F> {
        ObsCtx {
            sim: &self.sim,
            time_sampling: self.time_sampling,
            steps: self.steps,
            iter: self.iter,
            time: self.time,
        }
    }

    // observers are taken out so they can see the simulation while being mutated
    fn notify(
        &mut self,
        event: impl Fn(&mut dyn Observer<F>, ObsCtx<F>) -> Result<(), SimError>,
    ) -> Result<(), SimError> {
        let mut observers = std::mem::take(&mut self.observers);
        let result = observers
            .iter_mut()
            .try_for_each(|o| event(o.as_mut(), self.ctx()));
        self.observers = observers;
        result
    }

    pub fn run(&mut self) -> Result<(), SimError> {
        self.notify(|o, ctx| o.at_startup(ctx))?;

        for n in 1..=self.steps {
            self.step()?;
            self.iter = n;
            self.time += self.sim.dt;
            if n % self.time_sampling == 0 {
                self.notify(|o, ctx| o.at_each_iteration(ctx))?;
            }
        }

        self.notify(|o, ctx| o.at_cleanup(ctx))
    }

    /// One PIC field cycle on every level, followed by the particle push.
    pub fn step(&mut self) -> Result<(), PicError> {
        let Simulation {
            config,
            levels,
            ref_ratios,
            depositor,
            dt,
            ..
        } = &mut self.sim;
        let dt = *dt;
        let half_dt = F::HALF * dt;

        for (lev, level) in levels.iter_mut().enumerate() {
            let at = PatchLevel::new(lev, PatchType::Fine, ref_ratios.as_slice());

            deposit(level, depositor.as_ref(), &self.source.species(lev), config, at, dt)?;

            let Level {
                geom,
                solver,
                e,
                b,
                j,
                rho,
                f,
                g,
            } = &mut *level;

            enforce_conductors(e, true, config, geom, at)?;
            solver.evolve_b(b, e, g.as_ref(), half_dt)?;
            enforce_conductors(b, false, config, geom, at)?;

            solver.evolve_e(e, b, j, f.as_ref(), dt)?;
            enforce_conductors(e, true, config, geom, at)?;
            if let Some(f) = f.as_mut() {
                solver.evolve_f(f, e, Some(&*rho), dt)?;
                f.fill_periodic_guards();
            }
            if let Some(g) = g.as_mut() {
                solver.evolve_g(g, b, dt)?;
                g.fill_periodic_guards();
            }

            solver.evolve_b(b, e, g.as_ref(), half_dt)?;
            enforce_conductors(b, false, config, geom, at)?;

            self.source.push(lev, level, dt)?;
        }
        Ok(())
    }
}

fn deposit<F: Real>(
    level: &mut Level<F>,
    depositor: &dyn Depositor<F>,
    species: &[SpeciesView<'_, F>],
    config: &PicConfig<F>,
    at: PatchLevel<'_>,
    dt: F,
) -> Result<(), PicError> {
    level.j.fill(F::ZERO);
    level.rho.fill(F::ZERO);
    for s in species {
        depositor.deposit_charge(&mut level.rho, s, &level.geom)?;
        depositor.deposit_current(&mut level.j, s, &level.geom, -F::HALF * dt)?;
    }
    level.rho.sum_periodic_guards();
    level.j.sum_periodic_guards();
    let (field_bc, particle_bc) = (&config.field_bc, &config.particle_bc);
    apply_reflective_boundary_to_rho(&mut level.rho, field_bc, particle_bc, &level.geom, at)?;
    apply_reflective_boundary_to_j(&mut level.j, field_bc, particle_bc, &level.geom, at)
}

fn enforce_conductors<F: Real>(
    field: &mut VectorField<F>,
    electric: bool,
    config: &PicConfig<F>,
    geom: &Geometry<F>,
    at: PatchLevel<'_>,
) -> Result<(), PicError> {
    field.fill_periodic_guards();
    for bc_type in [BoundaryType::Pec, BoundaryType::Pmc] {
        if electric {
            apply_pec_to_efield(field, &config.field_bc, bc_type, config.guard_cells, geom, at)?;
        } else {
            apply_pec_to_bfield(field, &config.field_bc, bc_type, config.guard_cells, geom, at)?;
        }
    }
    Ok(())
}

pub struct Logger;

impl<F: Real> Observer<F> for Logger {
    fn at_startup(&mut self, ctx: ObsCtx<F>) -> Result<(), SimError> {
        let sim = ctx.sim();
        tracing::event!(
            tracing::Level::INFO,
            "start of simulation `{}` (`{}` stencil, `{}` deposition, {} level(s), Δt={:e} ({} steps))",
            sim.name(),
            sim.stencil().name(),
            sim.depositor().name(),
            sim.levels().len(),
            sim.dt(),
            ctx.steps(),
        );
        Ok(())
    }

    fn at_each_iteration(&mut self, ctx: ObsCtx<F>) -> Result<(), SimError> {
        tracing::event!(
            tracing::Level::TRACE,
            "simulation `{}`: step {}, t={:e}",
            ctx.sim().name(),
            ctx.iter(),
            ctx.time()
        );
        Ok(())
    }

    fn at_cleanup(&mut self, ctx: ObsCtx<F>) -> Result<(), SimError> {
        tracing::event!(
            tracing::Level::INFO,
            "finished simulation `{}` after {} steps",
            ctx.sim().name(),
            ctx.iter()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{geometry::CoordSystem, BoundaryTable};

    fn periodic_sim() -> Simulation<f64> {
        let geom = Geometry::from_steps(CoordSystem::Cartesian3D, [0.0; 3], [1.0; 3], [8; 3])
            .with_periodicity([true; 3]);
        let config = PicConfig::default().with_boundaries(
            BoundaryTable::uniform(BoundaryType::Periodic),
            BoundaryTable::uniform(BoundaryType::Periodic),
        );
        Simulation::new("vacuum", config, geom).unwrap()
    }

    #[derive(Default)]
    struct Counter {
        startup: usize,
        iterations: Vec<usize>,
        cleanup: usize,
    }

    impl Observer<f64> for &mut Counter {
        fn at_startup(&mut self, _ctx: ObsCtx<f64>) -> Result<(), SimError> {
            self.startup += 1;
            Ok(())
        }

        fn at_each_iteration(&mut self, ctx: ObsCtx<f64>) -> Result<(), SimError> {
            self.iterations.push(ctx.iter());
            Ok(())
        }

        fn at_cleanup(&mut self, _ctx: ObsCtx<f64>) -> Result<(), SimError> {
            self.cleanup += 1;
            Ok(())
        }
    }

    #[test]
    fn observers_follow_the_sampling_period() {
        let mut counter = Counter::default();
        let mut driver = Driver::new(periodic_sim(), NoParticles)
            .with_duration(Resolution::Steps(6))
            .with_time_sampling(Resolution::Steps(2))
            .with_observer(&mut counter);
        driver.run().unwrap();
        let time = driver.sim().dt() * 6.0;
        assert!((driver.time - time).abs() <= 1e-12 * time);
        drop(driver);

        assert_eq!(counter.startup, 1);
        assert_eq!(counter.iterations, vec![2, 4, 6]);
        assert_eq!(counter.cleanup, 1);
    }

    #[test]
    fn duration_in_time_rounds_up_to_whole_steps() {
        let sim = periodic_sim();
        let dt = sim.dt();
        let driver = Driver::new(sim, NoParticles).with_duration(Resolution::Delta(2.5 * dt));
        assert_eq!(driver.steps, 3);
    }

    struct Watch(usize);

    impl Observer<f64> for Watch {
        fn at_startup(&mut self, ctx: ObsCtx<f64>) -> Result<(), SimError> {
            ctx.level(self.0).ok_or(PicError::MissingLevel(self.0))?;
            Ok(())
        }
    }

    #[test]
    fn observers_see_only_existing_levels() {
        let mut driver = Driver::new(periodic_sim(), NoParticles)
            .with_duration(Resolution::Steps(1))
            .with_observer(Watch(0));
        assert!(driver.run().is_ok());

        let mut driver = Driver::new(periodic_sim(), NoParticles)
            .with_duration(Resolution::Steps(1))
            .with_observer(Watch(1));
        assert!(matches!(
            driver.run(),
            Err(SimError::Pic(PicError::MissingLevel(1)))
        ));
    }
}

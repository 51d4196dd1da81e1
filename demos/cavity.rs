use std::f64::consts::PI;

use tracing::info;

use picmesh::{
    BoundaryTable, BoundaryType, CoordSystem, Driver, Geometry, IndexType, Logger, NoParticles,
    ObsCtx, Observer, PicConfig, PicError, Resolution, SimError, Simulation,
};

/// Logs the field energy of one level at every sample.
struct Energy(usize);

impl Observer<f64> for Energy {
    fn at_each_iteration(&mut self, ctx: ObsCtx<f64>) -> Result<(), SimError> {
        let level = ctx.level(self.0).ok_or(PicError::MissingLevel(self.0))?;
        info!("t={:.3e} s: field energy {:.6e} J", ctx.time(), level.field_energy());
        Ok(())
    }
}

fn main() -> Result<(), SimError> {
    tracing_subscriber::fmt::init();

    info!("setting up cavity");

    // 2D square cavity with conducting walls, 1 cm wide
    let width = 1e-2;
    let geom = Geometry::from_steps(
        CoordSystem::Cartesian2D,
        [0.0; 3],
        [width, 1.0, width],
        [64, 1, 64],
    );
    let mut particle_bc = BoundaryTable::uniform(BoundaryType::Absorbing);
    particle_bc.lo[1] = BoundaryType::None;
    particle_bc.hi[1] = BoundaryType::None;
    let config = PicConfig::default()
        .with_boundaries(BoundaryTable::uniform(BoundaryType::Pec), particle_bc)
        .with_cfl(0.95);

    let mut sim = Simulation::new("TM11 cavity mode", config, geom)?;
    info!("{sim}");

    // Ey = sin(πx/a) sin(πz/a) vanishes on every wall
    let level = &mut sim.levels_mut()[0];
    let ey = &mut level.e[1];
    for [i, j, k] in ey.valid_box().iter() {
        let x = level.geom.position(0, i, IndexType::Node);
        let z = level.geom.position(2, k, IndexType::Node);
        ey.write(i, j, k, 0, (PI * x / width).sin() * (PI * z / width).sin());
    }

    // one oscillation period of the mode
    let period = 2.0 * width / (2f64.sqrt() * picmesh::constants::C);

    Driver::new(sim, NoParticles)
        .with_duration(Resolution::Delta(period))
        .with_time_sampling(Resolution::Delta(period / 20.0))
        .with_observer(Logger)
        .with_observer(Energy(0))
        .run()
}

use std::f64::consts::PI;

use approx::assert_relative_eq;

use picmesh::{
    boundary::{
        apply_pec_to_efield, apply_reflective_boundary_to_j, apply_reflective_boundary_to_rho,
        PatchLevel,
    },
    constants::C,
    BoundaryTable, BoundaryType, CoordSystem, Depositor, DirectDeposition, FdtdAlgo,
    FiniteDifferenceSolver, Geometry, GridType, IndexType, MeshField, ParticleView, ShapeOrder,
    SpeciesView, VectorField,
};

// reproducible values in [-1, 1)
fn noise(seed: u64) -> impl FnMut() -> f64 {
    let mut state = seed;
    move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        2.0 * ((state >> 11) as f64 / (1u64 << 53) as f64) - 1.0
    }
}

fn randomize(f: &mut MeshField<f64>, seed: u64) {
    let mut next = noise(seed);
    for comp in 0..f.ncomp() {
        for [i, j, k] in f.grown_box().iter() {
            f.write(i, j, k, comp, next());
        }
    }
}

// every stored value, skipping the points with index `i` below `i_min`
fn values_from(v: &VectorField<f64>, i_min: i64) -> Vec<f64> {
    v.comps()
        .iter()
        .flat_map(|f| {
            (0..f.ncomp()).flat_map(move |comp| {
                f.grown_box()
                    .iter()
                    .filter(move |p| p[0] >= i_min)
                    .map(move |[i, j, k]| f.read(i, j, k, comp))
            })
        })
        .collect()
}

fn snapshot(v: &VectorField<f64>) -> Vec<f64> {
    values_from(v, i64::MIN)
}

#[test]
fn yee_time_step_in_unit_cells() {
    let geom = Geometry::from_steps(CoordSystem::Cartesian3D, [0.0; 3], [8.0; 3], [8; 3]);
    let solver = FiniteDifferenceSolver::new(FdtdAlgo::Yee, GridType::Staggered, &geom, 1).unwrap();
    assert_relative_eq!(solver.compute_max_dt(), 1.0 / (C * 3f64.sqrt()), max_relative = 1e-12);
}

#[test]
fn fields_without_sources_stay_put() {
    let cartesian = Geometry::from_steps(CoordSystem::Cartesian3D, [0.0; 3], [1.0; 3], [6; 3]);
    let rz = Geometry::from_steps(CoordSystem::Cylindrical, [0.0; 3], [1.0, 0.0, 2.0], [6, 1, 12]);
    let setups = [
        (FdtdAlgo::Yee, GridType::Staggered, &cartesian, 1),
        (FdtdAlgo::Ckc, GridType::Staggered, &cartesian, 1),
        (FdtdAlgo::Yee, GridType::Collocated, &cartesian, 1),
        (FdtdAlgo::Yee, GridType::Staggered, &rz, 3),
    ];

    for (algo, grid_type, geom, nmodes) in setups {
        let solver = FiniteDifferenceSolver::new(algo, grid_type, geom, nmodes).unwrap();
        let ncomp = solver.ncomp();
        let dt = solver.compute_max_dt();
        // on the axis, the cylindrical update sets values instead of advancing them
        let i_min = if geom.coords.is_cylindrical() { 1 } else { i64::MIN };

        let zero_e = VectorField::electric("E", geom, grid_type, 2, ncomp);
        let mut b = VectorField::magnetic("B", geom, grid_type, 2, ncomp);
        for (d, f) in b.comps_mut().iter_mut().enumerate() {
            randomize(f, 10 + d as u64);
        }
        let before = values_from(&b, i_min);
        solver.evolve_b(&mut b, &zero_e, None, dt).unwrap();
        assert_eq!(values_from(&b, i_min), before, "{}", solver.kind().name());

        let zero_b = VectorField::magnetic("B", geom, grid_type, 2, ncomp);
        let zero_j = VectorField::current("j", geom, grid_type, 2, ncomp);
        let mut e = VectorField::electric("E", geom, grid_type, 2, ncomp);
        for (d, f) in e.comps_mut().iter_mut().enumerate() {
            randomize(f, 20 + d as u64);
        }
        let before = values_from(&e, i_min);
        solver.evolve_e(&mut e, &zero_b, &zero_j, None, dt).unwrap();
        assert_eq!(values_from(&e, i_min), before, "{}", solver.kind().name());
    }
}

#[test]
fn plane_wave_returns_after_one_period() {
    let n = 32;
    let length = 1.0;
    let geom = Geometry::from_steps(CoordSystem::Cartesian1D, [0.0; 3], [1.0, 1.0, length], [1, 1, n])
        .with_periodicity([true; 3]);
    let solver = FiniteDifferenceSolver::new(FdtdAlgo::Yee, GridType::Staggered, &geom, 1).unwrap();

    let mut e = VectorField::electric("E", &geom, GridType::Staggered, 2, 1);
    let mut b = VectorField::magnetic("B", &geom, GridType::Staggered, 2, 1);
    let j = VectorField::current("j", &geom, GridType::Staggered, 2, 1);
    let wave = |z: f64| (2.0 * PI * z / length).sin();
    for k in 0..=n as i64 {
        let z = geom.position(2, k, IndexType::Node);
        e[0].write(0, 0, k, 0, wave(z));
        let z = geom.position(2, k, IndexType::Cell);
        b[1].write(0, 0, k, 0, wave(z) / C);
    }
    e.fill_periodic_guards();
    b.fill_periodic_guards();
    let initial: Vec<f64> = (0..n as i64).map(|k| e[0].read(0, 0, k, 0)).collect();

    // two steps per cell crossing, one period overall
    let steps = 2 * n;
    let dt = length / C / steps as f64;
    for _ in 0..steps {
        solver.evolve_b(&mut b, &e, None, 0.5 * dt).unwrap();
        b.fill_periodic_guards();
        solver.evolve_e(&mut e, &b, &j, None, dt).unwrap();
        e.fill_periodic_guards();
        solver.evolve_b(&mut b, &e, None, 0.5 * dt).unwrap();
        b.fill_periodic_guards();
    }

    for (k, expected) in initial.iter().enumerate() {
        assert!((e[0].read(0, 0, k as i64, 0) - expected).abs() < 2e-2);
    }
}

#[test]
fn conductor_enforcement_is_idempotent() {
    let geom = Geometry::from_steps(CoordSystem::Cartesian3D, [0.0; 3], [1.0; 3], [8; 3]);
    let table = BoundaryTable::uniform(BoundaryType::Pec);
    let mut e = VectorField::electric("E", &geom, GridType::Staggered, 2, 1);
    for (d, f) in e.comps_mut().iter_mut().enumerate() {
        randomize(f, 30 + d as u64);
    }

    apply_pec_to_efield(&mut e, &table, BoundaryType::Pec, 2, &geom, PatchLevel::base()).unwrap();
    let once = snapshot(&e);
    apply_pec_to_efield(&mut e, &table, BoundaryType::Pec, 2, &geom, PatchLevel::base()).unwrap();
    assert_eq!(snapshot(&e), once);

    // tangential Ey vanishes on the x face and is odd across it, normal Ex is even
    assert_eq!(e[1].read(0, 3, 3, 0), 0.0);
    assert_eq!(e[1].read(-1, 3, 3, 0), -e[1].read(1, 3, 3, 0));
    assert_eq!(e[0].read(-1, 3, 3, 0), e[0].read(0, 3, 3, 0));
    assert_eq!(e[0].read(-2, 3, 3, 0), e[0].read(1, 3, 3, 0));
}

#[test]
fn reflective_fold_conserves_charge() {
    let geom = Geometry::from_steps(CoordSystem::Cartesian2D, [0.0; 3], [1.0; 3], [10, 1, 12]);
    let open = BoundaryTable::default();
    let table = BoundaryTable::uniform(BoundaryType::Reflecting);

    for ix in [IndexType::Node, IndexType::Cell] {
        let mut rho = MeshField::new("rho", &geom, [ix; 3], 2, 1);
        randomize(&mut rho, 40);
        let total = rho.sum(0);
        apply_reflective_boundary_to_rho(&mut rho, &open, &table, &geom, PatchLevel::base()).unwrap();
        assert_relative_eq!(rho.sum_valid(0), total, epsilon = 1e-12);
        assert_relative_eq!(rho.sum(0), total, epsilon = 1e-12);
    }

    // tangential current is conserved across the x walls, the normal one flips its guards
    let table = BoundaryTable::new(
        [BoundaryType::Reflecting, BoundaryType::None, BoundaryType::Absorbing],
        [BoundaryType::Reflecting, BoundaryType::None, BoundaryType::Absorbing],
    );
    let mut j = VectorField::current("j", &geom, GridType::Staggered, 2, 1);
    for (d, f) in j.comps_mut().iter_mut().enumerate() {
        randomize(f, 50 + d as u64);
    }
    let jz_total = j[2].sum(0);
    let jx_guard: f64 = j[0]
        .grown_box()
        .iter()
        .filter(|&[i, _, _]| i < 0 || i > 9)
        .map(|[i, jj, k]| j[0].read(i, jj, k, 0))
        .sum();
    let jx_total = j[0].sum(0);
    apply_reflective_boundary_to_j(&mut j, &open, &table, &geom, PatchLevel::base()).unwrap();
    assert_relative_eq!(j[2].sum(0), jz_total, epsilon = 1e-12);
    assert_relative_eq!(j[0].sum(0), jx_total - 2.0 * jx_guard, epsilon = 1e-12);
}

#[test]
fn charge_next_to_a_conductor_folds_into_its_image() {
    let geom = Geometry::from_steps(CoordSystem::Cartesian2D, [0.0; 3], [8.0, 1.0, 8.0], [8, 1, 8]);
    let pec_x = BoundaryTable::new(
        [BoundaryType::Pec, BoundaryType::None, BoundaryType::None],
        [BoundaryType::Pec, BoundaryType::None, BoundaryType::None],
    );
    let absorbing = BoundaryTable::uniform(BoundaryType::Absorbing);

    // particles near both x walls, one nearly touching the low wall
    let x = [0.3, 1.2, 7.7, 0.05];
    let z = [4.5, 3.2, 5.0, 2.0];
    let w = [1.0, 2.0, 0.5, 1.0];
    // the same particles with their images: mirrored across the nearest wall, opposite charge
    let x_pair: Vec<f64> = x.iter().chain(&[-0.3, -1.2, 8.3, -0.05]).copied().collect();
    let z_pair: Vec<f64> = z.iter().chain(&z).copied().collect();
    let w_pair: Vec<f64> = w.iter().chain(&w.map(|w| -w)).copied().collect();

    let particles = ParticleView::new(&x, &[], &z, &w).unwrap();
    let species = SpeciesView::new("e", -1.0, particles);
    let pairs = ParticleView::new(&x_pair, &[], &z_pair, &w_pair).unwrap();
    let with_images = SpeciesView::new("e", -1.0, pairs);

    for order in [ShapeOrder::Ngp, ShapeOrder::Linear, ShapeOrder::Quadratic, ShapeOrder::Cubic] {
        let depositor = DirectDeposition::new(order);
        for ix in [IndexType::Node, IndexType::Cell] {
            let mut folded = MeshField::new("rho", &geom, [ix; 3], 3, 1);
            depositor.deposit_charge(&mut folded, &species, &geom).unwrap();
            let at = PatchLevel::base();
            apply_reflective_boundary_to_rho(&mut folded, &pec_x, &absorbing, &geom, at).unwrap();

            let mut expected = MeshField::new("rho", &geom, [ix; 3], 3, 1);
            depositor.deposit_charge(&mut expected, &with_images, &geom).unwrap();

            for [i, j, k] in folded.valid_box().iter() {
                let (got, want) = (folded.read(i, j, k, 0), expected.read(i, j, k, 0));
                assert_relative_eq!(got, want, epsilon = 1e-12);
            }
            assert_relative_eq!(folded.sum(0), expected.sum_valid(0), epsilon = 1e-12);
        }
    }
}

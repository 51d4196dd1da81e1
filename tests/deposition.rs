use approx::assert_relative_eq;

use picmesh::{
    CoordSystem, DenseBins, DepositionAlgo, Depositor, DirectDeposition, Geometry, GridType, IndexType,
    MeshField, ParticleView, PicError, SharedDeposition, ShapeOrder, SpeciesView, VectorField,
};

const ORDERS: [ShapeOrder; 4] = [
    ShapeOrder::Ngp,
    ShapeOrder::Linear,
    ShapeOrder::Quadratic,
    ShapeOrder::Cubic,
];

// uniform positions in [lo, hi), reproducible across runs
fn scatter(n: usize, seed: u64, lo: f64, hi: f64) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            lo + (hi - lo) * ((state >> 11) as f64 / (1u64 << 53) as f64)
        })
        .collect()
}

struct Cloud {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    w: Vec<f64>,
    u: [Vec<f64>; 3],
}

impl Cloud {
    fn new(n: usize, lo: f64, hi: f64) -> Self {
        Self {
            x: scatter(n, 1, lo, hi),
            y: scatter(n, 2, lo, hi),
            z: scatter(n, 3, lo, hi),
            w: scatter(n, 4, 0.5, 2.0),
            u: [
                scatter(n, 5, -1e8, 1e8),
                scatter(n, 6, -1e8, 1e8),
                scatter(n, 7, -1e8, 1e8),
            ],
        }
    }

    fn view(&self) -> ParticleView<'_, f64> {
        ParticleView::new(&self.x, &self.y, &self.z, &self.w)
            .unwrap()
            .with_momentum(&self.u[0], &self.u[1], &self.u[2])
            .unwrap()
    }
}

fn cube(n: usize) -> Geometry<f64> {
    Geometry::from_steps(CoordSystem::Cartesian3D, [0.0; 3], [n as f64; 3], [n; 3])
}

#[test]
fn direct_and_tiled_strategies_agree() {
    let geom = cube(16);
    let cloud = Cloud::new(4000, 2.0, 14.0);
    let species = SpeciesView::new("electrons", -1.0, cloud.view());

    for order in ORDERS {
        let direct = DirectDeposition::new(order);
        let shared = SharedDeposition::new(order, [4; 3], usize::MAX);

        let mut rho_direct = MeshField::new("rho", &geom, [IndexType::Node; 3], 2, 1);
        let mut rho_shared = rho_direct.clone();
        direct.deposit_charge(&mut rho_direct, &species, &geom).unwrap();
        shared.deposit_charge(&mut rho_shared, &species, &geom).unwrap();

        assert_relative_eq!(rho_direct.sum(0), rho_shared.sum(0), max_relative = 1e-10);
        for [i, j, k] in rho_direct.grown_box().iter() {
            assert_relative_eq!(
                rho_direct.read(i, j, k, 0),
                rho_shared.read(i, j, k, 0),
                epsilon = 1e-9
            );
        }

        let mut j_direct = VectorField::current("j", &geom, GridType::Staggered, 2, 1);
        let mut j_shared = j_direct.clone();
        direct.deposit_current(&mut j_direct, &species, &geom, 1e-9).unwrap();
        shared.deposit_current(&mut j_shared, &species, &geom, 1e-9).unwrap();
        for d in 0..3 {
            let scale = j_direct[d].max_abs();
            assert_relative_eq!(j_direct[d].sum(0), j_shared[d].sum(0), epsilon = 1e-9 * scale);
        }
    }
}

#[test]
fn deposited_charge_is_conserved() {
    let geom = Geometry::from_steps(CoordSystem::Cartesian2D, [-1.0, 0.0, -2.0], [1.0, 1.0, 2.0], [20, 1, 40]);
    let x = scatter(500, 11, -0.7, 0.7);
    let z = scatter(500, 12, -1.6, 1.6);
    let w = scatter(500, 13, 1.0, 3.0);
    let particles = ParticleView::new(&x, &[], &z, &w).unwrap();
    let species = SpeciesView::new("ions", 2.0, particles);
    let expected: f64 = 2.0 * w.iter().sum::<f64>();

    for algo in [DepositionAlgo::Direct, DepositionAlgo::Shared] {
        for order in ORDERS {
            for ix in [IndexType::Node, IndexType::Cell] {
                let mut rho = MeshField::new("rho", &geom, [ix; 3], order.guard_cells(), 1);
                algo.depositor(order, [8, 1, 8], usize::MAX)
                    .deposit_charge(&mut rho, &species, &geom)
                    .unwrap();
                assert_relative_eq!(rho.sum(0) * geom.cell_volume(), expected, max_relative = 1e-12);
                assert_relative_eq!(rho.sum_valid(0) * geom.cell_volume(), expected, max_relative = 1e-12);
            }
        }
    }
}

#[test]
fn particle_at_a_cell_center() {
    let geom = cube(4);
    let (x, w) = ([1.5], [1.0]);
    let particles = ParticleView::new(&x, &x, &x, &w).unwrap();
    let species = SpeciesView::new("p", 1.0, particles);
    let linear = DirectDeposition::new(ShapeOrder::Linear);

    let mut cell = MeshField::new("rho", &geom, [IndexType::Cell; 3], 1, 1);
    linear.deposit_charge(&mut cell, &species, &geom).unwrap();
    assert_eq!(cell.read(1, 1, 1, 0), 1.0);
    assert_eq!(cell.sum(0), 1.0);

    let mut node = MeshField::new("rho", &geom, [IndexType::Node; 3], 1, 1);
    linear.deposit_charge(&mut node, &species, &geom).unwrap();
    for i in 1..=2 {
        for j in 1..=2 {
            for k in 1..=2 {
                assert_eq!(node.read(i, j, k, 0), 0.125);
            }
        }
    }
    assert_eq!(node.sum(0), 1.0);
}

#[test]
fn particle_on_the_axis_has_no_sine_parts() {
    let geom = Geometry::from_steps(CoordSystem::Cylindrical, [0.0; 3], [4.0, 0.0, 4.0], [4, 1, 4]);
    let (zero, z, w) = ([0.0], [1.0], [3.0]);
    let particles = ParticleView::new(&zero, &zero, &z, &w).unwrap();
    let species = SpeciesView::new("e", 1.0, particles);

    // two modes: mode 0, then the real and imaginary parts of mode 1
    let mut rho = MeshField::new("rho", &geom, [IndexType::Node; 3], 1, 3);
    DirectDeposition::new(ShapeOrder::Linear)
        .deposit_charge(&mut rho, &species, &geom)
        .unwrap();

    let q = 3.0 * geom.inv_cell_volume();
    assert_relative_eq!(rho.read(0, 0, 1, 0), q);
    assert_relative_eq!(rho.sum(0), q);
    // θ = 0 on the axis: cos 0 = 1, sin 0 = 0
    assert_relative_eq!(rho.read(0, 0, 1, 1), 2.0 * q);
    assert!(rho
        .grown_box()
        .iter()
        .all(|[i, j, k]| rho.read(i, j, k, 2) == 0.0));
}

#[test]
fn contributions_outside_storage_are_reported() {
    let geom = cube(8);
    let (x, y, w) = ([4.0, 40.0], [4.0, 4.0], [1.0, 1.0]);
    let particles = ParticleView::new(&x, &y, &y, &w).unwrap();
    let species = SpeciesView::new("stray", 1.0, particles);
    let mut rho = MeshField::new("rho", &geom, [IndexType::Node; 3], 1, 1);

    let result = DirectDeposition::new(ShapeOrder::Linear).deposit_charge(&mut rho, &species, &geom);
    assert!(matches!(
        result,
        Err(PicError::ParticleOutsideMesh { ref field, count }) if field == "rho" && count > 0
    ));
    // the particle inside still landed
    assert_relative_eq!(rho.read(4, 4, 4, 0), 1.0);
}

#[test]
fn presorted_bins_are_reused() {
    let geom = cube(16);
    let cloud = Cloud::new(1000, 1.0, 15.0);
    let species = SpeciesView::new("e", -1.0, cloud.view());
    let bins = DenseBins::build(&species.particles, &geom, [8; 3]);
    assert_eq!(bins.num_bins(), 8);
    assert_eq!(bins.offsets().last(), Some(&1000));

    let shared = SharedDeposition::new(ShapeOrder::Quadratic, [8; 3], usize::MAX);
    let mut rho = MeshField::new("rho", &geom, [IndexType::Node; 3], 2, 1);
    shared.deposit_charge_binned(&mut rho, &species, &bins, &geom).unwrap();
    assert_relative_eq!(rho.sum(0), -cloud.w.iter().sum::<f64>(), max_relative = 1e-12);

    let empty = ParticleView::<f64>::new(&[], &[], &[], &[]).unwrap();
    let other = DenseBins::build(&empty, &geom, [8; 3]);
    assert!(matches!(
        shared.deposit_charge_binned(&mut rho, &species, &other, &geom),
        Err(PicError::ParticleArrayLength { .. })
    ));
}

#[test]
fn unusable_positions_take_the_outside_path() {
    let geom = cube(8);
    let x = [4.0, 1e300, -1e300, f64::NAN];
    let y = [4.0; 4];
    let w = [1.0; 4];
    let u = [0.0; 4];
    let particles = ParticleView::new(&x, &y, &y, &w)
        .unwrap()
        .with_momentum(&u, &u, &u)
        .unwrap();
    let species = SpeciesView::new("stray", 1.0, particles);

    for algo in [DepositionAlgo::Direct, DepositionAlgo::Shared] {
        for order in ORDERS {
            let depositor = algo.depositor(order, [4; 3], usize::MAX);

            let mut rho = MeshField::new("rho", &geom, [IndexType::Node; 3], 2, 1);
            assert_eq!(
                depositor.deposit_charge(&mut rho, &species, &geom),
                Err(PicError::ParticleOutsideMesh {
                    field: "rho".to_string(),
                    count: 3
                })
            );
            assert_relative_eq!(rho.sum(0), 1.0, max_relative = 1e-12);

            let mut j = VectorField::current("j", &geom, GridType::Staggered, 2, 1);
            assert!(matches!(
                depositor.deposit_current(&mut j, &species, &geom, 0.0),
                Err(PicError::ParticleOutsideMesh { count: 9, .. })
            ));
            assert_eq!(j[0].max_abs(), 0.0);
        }
    }
}

#[test]
fn particles_on_tile_boundaries_are_counted_once() {
    let geom = cube(16);
    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut z = Vec::new();
    // every corner shared by tiles of 4 cells, then single faces between two tiles
    for a in [4.0, 8.0, 12.0] {
        for b in [4.0, 8.0, 12.0] {
            for c in [4.0, 8.0, 12.0] {
                x.push(a);
                y.push(b);
                z.push(c);
            }
        }
        x.extend([a, 5.3, 9.7]);
        y.extend([6.1, a, 10.4]);
        z.extend([7.9, 2.6, a]);
    }
    let n = x.len();
    let w = vec![1.0; n];
    let ux = vec![1e7; n];
    let zero = vec![0.0; n];
    let particles = ParticleView::new(&x, &y, &z, &w)
        .unwrap()
        .with_momentum(&ux, &zero, &zero)
        .unwrap();
    let species = SpeciesView::new("e", -1.0, particles);

    for order in ORDERS {
        let direct = DirectDeposition::new(order);
        let shared = SharedDeposition::new(order, [4; 3], usize::MAX);

        for ix in [IndexType::Node, IndexType::Cell] {
            let mut rho_direct = MeshField::new("rho", &geom, [ix; 3], 2, 1);
            let mut rho_shared = rho_direct.clone();
            direct.deposit_charge(&mut rho_direct, &species, &geom).unwrap();
            shared.deposit_charge(&mut rho_shared, &species, &geom).unwrap();

            assert_relative_eq!(rho_shared.sum(0), -(n as f64), max_relative = 1e-12);
            for [i, j, k] in rho_direct.grown_box().iter() {
                assert_relative_eq!(
                    rho_direct.read(i, j, k, 0),
                    rho_shared.read(i, j, k, 0),
                    epsilon = 1e-12
                );
            }
        }

        let mut j_direct = VectorField::current("j", &geom, GridType::Staggered, 2, 1);
        let mut j_shared = j_direct.clone();
        direct.deposit_current(&mut j_direct, &species, &geom, 0.0).unwrap();
        shared.deposit_current(&mut j_shared, &species, &geom, 0.0).unwrap();
        let scale = j_direct[0].max_abs();
        assert!(scale > 0.0);
        for [i, j, k] in j_direct[0].grown_box().iter() {
            assert_relative_eq!(
                j_direct[0].read(i, j, k, 0),
                j_shared[0].read(i, j, k, 0),
                epsilon = 1e-12 * scale
            );
        }
    }
}

use std::sync::OnceLock;

use picmesh::{
    CoordSystem, DepositionAlgo, FdtdAlgo, FiniteDifferenceSolver, Geometry, GridType, IndexType,
    MeshField, ParticleView, ShapeOrder, SpeciesView, VectorField,
};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const N_CELL: usize = 32;
const N_PARTICLES: usize = 200_000;

struct Particles {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    w: Vec<f64>,
    u: Vec<f64>,
}

static PARTICLES: OnceLock<Particles> = OnceLock::new();

fn particles() -> &'static Particles {
    PARTICLES.get_or_init(|| {
        let mut state = 0x2545f4914f6cdd1du64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        let mut coord = || (N_CELL as f64) * next();
        let x = (0..N_PARTICLES).map(|_| coord()).collect();
        let y = (0..N_PARTICLES).map(|_| coord()).collect();
        let z = (0..N_PARTICLES).map(|_| coord()).collect();
        Particles {
            x,
            y,
            z,
            w: vec![1.0; N_PARTICLES],
            u: vec![1e7; N_PARTICLES],
        }
    })
}

fn geometry() -> Geometry<f64> {
    Geometry::from_steps(
        CoordSystem::Cartesian3D,
        [0.0; 3],
        [N_CELL as f64; 3],
        [N_CELL; 3],
    )
}

fn benchmark_charge_deposition(c: &mut Criterion) {
    let geom = geometry();
    let p = particles();
    let view = ParticleView::new(&p.x, &p.y, &p.z, &p.w).unwrap();
    let species = SpeciesView::new("electrons", -1.0, view);
    let mut rho = MeshField::new("rho", &geom, [IndexType::Node; 3], 2, 1);

    let mut group = c.benchmark_group("deposit_charge");
    for algo in [DepositionAlgo::Direct, DepositionAlgo::Shared] {
        for order in [ShapeOrder::Linear, ShapeOrder::Cubic] {
            let depositor = algo.depositor::<f64>(order, [8; 3], usize::MAX);
            group.bench_with_input(
                BenchmarkId::new(depositor.name(), order.order()),
                &order,
                |b, _| {
                    b.iter(|| {
                        rho.fill(0.0);
                        depositor
                            .deposit_charge(&mut rho, black_box(&species), &geom)
                            .unwrap()
                    })
                },
            );
        }
    }
    group.finish();
}

fn benchmark_current_deposition(c: &mut Criterion) {
    let geom = geometry();
    let p = particles();
    let view = ParticleView::new(&p.x, &p.y, &p.z, &p.w)
        .and_then(|v| v.with_momentum(&p.u, &p.u, &p.u))
        .unwrap();
    let species = SpeciesView::new("electrons", -1.0, view);
    let mut j = VectorField::current("j", &geom, GridType::Staggered, 2, 1);

    let mut group = c.benchmark_group("deposit_current");
    for algo in [DepositionAlgo::Direct, DepositionAlgo::Shared] {
        let depositor = algo.depositor::<f64>(ShapeOrder::Quadratic, [8; 3], usize::MAX);
        group.bench_function(depositor.name(), |b| {
            b.iter(|| {
                j.fill(0.0);
                depositor
                    .deposit_current(&mut j, black_box(&species), &geom, -5e-10)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn benchmark_field_update(c: &mut Criterion) {
    let geom = geometry();
    let mut group = c.benchmark_group("evolve_e");
    for algo in [FdtdAlgo::Yee, FdtdAlgo::Ckc] {
        let solver = FiniteDifferenceSolver::new(algo, GridType::Staggered, &geom, 1).unwrap();
        let mut e = VectorField::electric("E", &geom, GridType::Staggered, 2, 1);
        let mut b = VectorField::magnetic("B", &geom, GridType::Staggered, 2, 1);
        b.fill(1e-3);
        let j = VectorField::current("j", &geom, GridType::Staggered, 2, 1);
        let dt = solver.compute_max_dt();
        group.bench_function(solver.kind().name(), |bench| {
            bench.iter(|| solver.evolve_e(&mut e, &b, &j, None, black_box(dt)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_charge_deposition,
    benchmark_current_deposition,
    benchmark_field_update
);
criterion_main!(benches);

//! Per-particle deposition, shared by every strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    atomic::AtomicFloat,
    constants,
    geometry::{Geometry, IndexBox, IndexType},
    particles::{cylindrical, ParticleView},
    shape::Shape,
    Real,
};

/// Row-major (`i` fastest) addressing of a box of points.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Layout {
    pub(crate) bx: IndexBox,
    nx: usize,
    nxy: usize,
    pub(crate) npts: usize,
}

impl Layout {
    pub(crate) fn new(bx: IndexBox) -> Self {
        let nx = bx.len(0);
        let nxy = nx * bx.len(1);
        Self {
            bx,
            nx,
            nxy,
            npts: bx.num_pts(),
        }
    }

    #[inline(always)]
    pub(crate) fn offset(&self, p: [i64; 3]) -> Option<usize> {
        if !self.bx.contains(p[0], p[1], p[2]) {
            return None;
        }
        let lo = self.bx.lo;
        Some(
            (p[0] - lo[0]) as usize
                + (p[1] - lo[1]) as usize * self.nx
                + (p[2] - lo[2]) as usize * self.nxy,
        )
    }
}

/// Destination of the weighted contributions of a particle.
pub(crate) trait Sink<F> {
    fn add(&mut self, p: [i64; 3], comp: usize, value: F);

    /// Records a particle whose position cannot be mapped to an index.
    fn reject(&mut self);
}

/// Atomic adds straight into the storage of a mesh field.
pub(crate) struct AtomicSink<'a, F: Real> {
    cols: &'a [&'a [F::Atomic]],
    layout: Layout,
    outside: &'a AtomicUsize,
}

impl<'a, F: Real> Clone for AtomicSink<'a, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, F: Real> Copy for AtomicSink<'a, F> {}

impl<'a, F: Real> AtomicSink<'a, F> {
    pub(crate) fn new(cols: &'a [&'a [F::Atomic]], storage: IndexBox, outside: &'a AtomicUsize) -> Self {
        Self {
            cols,
            layout: Layout::new(storage),
            outside,
        }
    }
}

impl<'a, F: Real> Sink<F> for AtomicSink<'a, F> {
    #[inline(always)]
    fn add(&mut self, p: [i64; 3], comp: usize, value: F) {
        match self.layout.offset(p) {
            Some(offset) => F::fetch_add(&self.cols[comp][offset], value),
            None => self.reject(),
        }
    }

    fn reject(&mut self) {
        self.outside.fetch_add(1, Ordering::Relaxed);
    }
}

/// Private accumulation buffer over a tile, falling back to the global field for points the
/// buffer does not cover.
pub(crate) struct TileSink<'b, 'a, F: Real> {
    buf: &'b mut [F],
    layout: Layout,
    global: AtomicSink<'a, F>,
}

impl<'b, 'a, F: Real> TileSink<'b, 'a, F> {
    /// `buf` is zeroed and resized to cover `ncomp` components of `tile`.
    pub(crate) fn new(buf: &'b mut Vec<F>, tile: IndexBox, ncomp: usize, global: AtomicSink<'a, F>) -> Self {
        let layout = Layout::new(tile);
        buf.clear();
        buf.resize(layout.npts * ncomp, F::ZERO);
        Self {
            buf: buf.as_mut_slice(),
            layout,
            global,
        }
    }

    /// Adds the buffer back into the global field.
    pub(crate) fn flush(mut self) {
        let npts = self.layout.npts;
        for (comp, values) in self.buf.chunks(npts.max(1)).enumerate() {
            for (p, &value) in self.layout.bx.iter().zip(values) {
                if value != F::ZERO {
                    self.global.add(p, comp, value);
                }
            }
        }
    }
}

impl<'b, 'a, F: Real> Sink<F> for TileSink<'b, 'a, F> {
    #[inline(always)]
    fn add(&mut self, p: [i64; 3], comp: usize, value: F) {
        match self.layout.offset(p) {
            Some(offset) => self.buf[comp * self.layout.npts + offset] += value,
            None => self.global.add(p, comp, value),
        }
    }

    fn reject(&mut self) {
        self.global.reject();
    }
}

// beyond this many cells from the origin a position no longer has an exact integer index
const MAX_INDEX: f64 = (1u64 << 52) as f64;

/// Maps physical positions to the index space of one field.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MeshMap<F> {
    lo: [F; 3],
    inv_d: [F; 3],
    shift: [F; 3],
    active: [bool; 3],
}

impl<F: Real> MeshMap<F> {
    pub(crate) fn new(geom: &Geometry<F>, ix_type: [IndexType; 3]) -> Self {
        Self {
            lo: geom.prob_lo,
            inv_d: geom.inv_cell_size(),
            shift: ix_type.map(|t| t.shift::<F>()),
            active: geom.active_axes(),
        }
    }

    // lowest index, weights and number of points touched along each axis; `None` for positions
    // that are not finite or lie too far away to be indexed
    #[inline(always)]
    fn shape<S: Shape>(&self, pos: [F; 3]) -> Option<([i64; 3], [[F; 4]; 3], [usize; 3])> {
        let max_index = F::from_f64(MAX_INDEX);
        let mut lowest = [0; 3];
        let mut weights = [[F::ONE, F::ZERO, F::ZERO, F::ZERO]; 3];
        let mut count = [1; 3];
        for axis in 0..3 {
            if self.active[axis] {
                let x = (pos[axis] - self.lo[axis]) * self.inv_d[axis] - self.shift[axis];
                if !x.is_finite() || x.abs() > max_index {
                    return None;
                }
                let (j, w) = S::compute(x);
                lowest[axis] = j;
                weights[axis] = w;
                count[axis] = S::ORDER + 1;
            }
        }
        Some((lowest, weights, count))
    }
}

/// Azimuthal expansion of a deposit: `e^{iθ}` and the number of modes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Azimuth<F> {
    nmodes: usize,
    cos: F,
    sin: F,
}

impl<F: Real> Azimuth<F> {
    pub(crate) fn cartesian() -> Self {
        Self {
            nmodes: 1,
            cos: F::ONE,
            sin: F::ZERO,
        }
    }
}

#[inline(always)]
fn scatter<F: Real, S: Shape, K: Sink<F>>(sink: &mut K, map: &MeshMap<F>, pos: [F; 3], value: F, azimuth: Azimuth<F>) {
    let Some((lowest, w, count)) = map.shape::<S>(pos) else {
        sink.reject();
        return;
    };
    let two = F::from_f64(2.0);
    for kk in 0..count[2] {
        for jj in 0..count[1] {
            let wjk = w[1][jj] * w[2][kk];
            for ii in 0..count[0] {
                let p = [
                    lowest[0].saturating_add(ii as i64),
                    lowest[1].saturating_add(jj as i64),
                    lowest[2].saturating_add(kk as i64),
                ];
                let weighted = value * w[0][ii] * wjk;
                sink.add(p, 0, weighted);

                // mode m carries 2 Re(e^{imθ}) and 2 Im(e^{imθ})
                let (mut re, mut im) = (azimuth.cos, azimuth.sin);
                for m in 1..azimuth.nmodes {
                    sink.add(p, 2 * m - 1, two * weighted * re);
                    sink.add(p, 2 * m, two * weighted * im);
                    (re, im) = (
                        re * azimuth.cos - im * azimuth.sin,
                        re * azimuth.sin + im * azimuth.cos,
                    );
                }
            }
        }
    }
}

/// Constants of one deposition call.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DepositCtx<F> {
    /// Species charge over the cell volume.
    pub(crate) q_invvol: F,
    pub(crate) cylindrical: bool,
    pub(crate) nmodes: usize,
    pub(crate) relative_time: F,
}

impl<F: Real> DepositCtx<F> {
    fn azimuth(&self, x: F, y: F) -> (F, Azimuth<F>) {
        let (r, cos, sin) = cylindrical(x, y);
        (
            r,
            Azimuth {
                nmodes: self.nmodes,
                cos,
                sin,
            },
        )
    }
}

#[inline(always)]
pub(crate) fn deposit_charge_particle<F: Real, S: Shape, K: Sink<F>>(
    sink: &mut K,
    map: &MeshMap<F>,
    ctx: &DepositCtx<F>,
    particles: &ParticleView<'_, F>,
    ip: usize,
) {
    let [x, y, z] = particles.position(ip);
    let wq = ctx.q_invvol * particles.weight(ip) * particles.charge_factor(ip);
    if ctx.cylindrical {
        let (r, azimuth) = ctx.azimuth(x, y);
        scatter::<F, S, K>(sink, map, [r, F::ZERO, z], wq, azimuth);
    } else {
        scatter::<F, S, K>(sink, map, [x, y, z], wq, Azimuth::cartesian());
    }
}

/// Deposits `q w v` of one particle at its position advanced by `relative_time`; in
/// cylindrical geometry the current is projected on `r` and `θ` there.
#[inline(always)]
pub(crate) fn deposit_current_particle<F: Real, S: Shape, K: Sink<F>>(
    sinks: &mut [K; 3],
    maps: &[MeshMap<F>; 3],
    ctx: &DepositCtx<F>,
    particles: &ParticleView<'_, F>,
    ip: usize,
) {
    let Some(u) = particles.momentum(ip) else {
        return;
    };
    let inv_c2 = F::from_f64(1.0 / (constants::C * constants::C));
    let gaminv = F::ONE / (F::ONE + (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]) * inv_c2).sqrt();
    let v = u.map(|u| u * gaminv);
    let wq = ctx.q_invvol * particles.weight(ip) * particles.charge_factor(ip);

    let [x, y, z] = particles.position(ip);
    let rt = ctx.relative_time;
    let xp = [x + rt * v[0], y + rt * v[1], z + rt * v[2]];

    let (pos, values, azimuth) = if ctx.cylindrical {
        let (r, azimuth) = ctx.azimuth(xp[0], xp[1]);
        let vr = v[0] * azimuth.cos + v[1] * azimuth.sin;
        let vt = -v[0] * azimuth.sin + v[1] * azimuth.cos;
        ([r, F::ZERO, xp[2]], [wq * vr, wq * vt, wq * v[2]], azimuth)
    } else {
        (xp, v.map(|v| wq * v), Azimuth::cartesian())
    };

    for (d, sink) in sinks.iter_mut().enumerate() {
        scatter::<F, S, K>(sink, &maps[d], pos, values[d], azimuth);
    }
}

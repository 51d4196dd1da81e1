//! Read-only access to the macro-particles of a species.

use tracing::Level;

use crate::{
    geometry::{Geometry, IndexBox},
    PicError, Real,
};

/// Particle arrays of one species, borrowed from the particle store.
///
/// Coordinates along axes the geometry does not use may be empty slices. In cylindrical
/// geometry `x` and `y` are the Cartesian transverse coordinates.
#[derive(Clone, Copy, Debug)]
pub struct ParticleView<'a, F> {
    x: &'a [F],
    y: &'a [F],
    z: &'a [F],
    w: &'a [F],
    u: Option<[&'a [F]; 3]>,
    ion_lev: Option<&'a [i32]>,
}

impl<'a, F: Real> ParticleView<'a, F> {
    pub fn new(x: &'a [F], y: &'a [F], z: &'a [F], w: &'a [F]) -> Result<Self, PicError> {
        for (array, data) in [("x", x), ("y", y), ("z", z)] {
            Self::check_len(array, data.len(), w.len(), true)?;
        }
        Ok(Self {
            x,
            y,
            z,
            w,
            u: None,
            ion_lev: None,
        })
    }

    fn check_len(array: &'static str, found: usize, expected: usize, may_be_empty: bool) -> Result<(), PicError> {
        if found != expected && !(may_be_empty && found == 0) {
            return Err(PicError::ParticleArrayLength {
                array,
                found,
                expected,
            });
        }
        Ok(())
    }

    /// Momenta per unit mass, `γv`.
    pub fn with_momentum(mut self, ux: &'a [F], uy: &'a [F], uz: &'a [F]) -> Result<Self, PicError> {
        for (array, data) in [("ux", ux), ("uy", uy), ("uz", uz)] {
            Self::check_len(array, data.len(), self.len(), false)?;
        }
        self.u = Some([ux, uy, uz]);
        Ok(self)
    }

    pub fn with_ionization_level(mut self, ion_lev: &'a [i32]) -> Result<Self, PicError> {
        Self::check_len("ion_lev", ion_lev.len(), self.len(), false)?;
        self.ion_lev = Some(ion_lev);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.w.len()
    }

    pub fn is_empty(&self) -> bool {
        self.w.is_empty()
    }

    #[inline(always)]
    pub fn position(&self, ip: usize) -> [F; 3] {
        let get = |data: &[F]| data.get(ip).copied().unwrap_or(F::ZERO);
        [get(self.x), get(self.y), get(self.z)]
    }

    #[inline(always)]
    pub fn weight(&self, ip: usize) -> F {
        self.w[ip]
    }

    #[inline(always)]
    pub fn momentum(&self, ip: usize) -> Option<[F; 3]> {
        self.u.map(|[ux, uy, uz]| [ux[ip], uy[ip], uz[ip]])
    }

    pub fn has_momentum(&self) -> bool {
        self.u.is_some()
    }

    /// Ionization level scaling the charge, 1 when the species carries none.
    #[inline(always)]
    pub fn charge_factor(&self, ip: usize) -> F {
        match self.ion_lev {
            Some(lev) => F::from_f64(lev[ip] as f64),
            None => F::ONE,
        }
    }
}

/// One species: its charge and its particles.
#[derive(Clone, Copy, Debug)]
pub struct SpeciesView<'a, F> {
    pub name: &'a str,
    pub charge: F,
    pub particles: ParticleView<'a, F>,
}

impl<'a, F: Real> SpeciesView<'a, F> {
    pub fn new(name: &'a str, charge: F, particles: ParticleView<'a, F>) -> Self {
        Self {
            name,
            charge,
            particles,
        }
    }
}

/// Radius and azimuth of a transverse position; the azimuth is 0 on the axis.
#[inline(always)]
pub fn cylindrical<F: Real>(x: F, y: F) -> (F, F, F) {
    let r = (x * x + y * y).sqrt();
    if r == F::ZERO {
        (F::ZERO, F::ONE, F::ZERO)
    } else {
        (r, x / r, y / r)
    }
}

/// Position of particle `ip` in the mesh coordinates `(i, j, k)` of `geom`: `(r, 0, z)` in
/// cylindrical geometry, the Cartesian position otherwise.
#[inline(always)]
pub fn mesh_position<F: Real>(geom: &Geometry<F>, particles: &ParticleView<'_, F>, ip: usize) -> [F; 3] {
    let [x, y, z] = particles.position(ip);
    if geom.coords.is_cylindrical() {
        let (r, _, _) = cylindrical(x, y);
        [r, F::ZERO, z]
    } else {
        [x, y, z]
    }
}

/// Counting sort of particles into tiles of `bin_size` cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DenseBins {
    bin_size: [usize; 3],
    nbins: [usize; 3],
    domain: IndexBox,
    permutation: Vec<usize>,
    offsets: Vec<usize>,
}

impl DenseBins {
    /// Sorts the particles by the tile of the cell that contains them. Particles outside the
    /// domain go to the nearest tile.
    pub fn build<F: Real>(particles: &ParticleView<'_, F>, geom: &Geometry<F>, bin_size: [usize; 3]) -> Self {
        let active = geom.active_axes();
        let domain = geom.domain_box();
        let bin_size = [0, 1, 2].map(|axis| {
            if active[axis] {
                bin_size[axis].clamp(1, geom.n_cell[axis])
            } else {
                1
            }
        });
        let nbins = [0, 1, 2].map(|axis| geom.n_cell[axis].div_ceil(bin_size[axis]));
        let inv_d = geom.inv_cell_size();

        let bin_of = |ip: usize| {
            let pos = mesh_position(geom, particles, ip);
            let mut b = [0usize; 3];
            for axis in (0..3).filter(|&a| active[a]) {
                let cell = ((pos[axis] - geom.prob_lo[axis]) * inv_d[axis]).floor().to_f64() as i64;
                let cell = cell.clamp(domain.lo[axis], domain.hi[axis]) - domain.lo[axis];
                b[axis] = cell as usize / bin_size[axis];
            }
            b[0] + nbins[0] * (b[1] + nbins[1] * b[2])
        };

        let total = nbins.iter().product::<usize>();
        let keys: Vec<usize> = (0..particles.len()).map(bin_of).collect();

        let mut offsets = vec![0usize; total + 1];
        for &key in &keys {
            offsets[key + 1] += 1;
        }
        for b in 0..total {
            offsets[b + 1] += offsets[b];
        }
        let mut cursor = offsets.clone();
        let mut permutation = vec![0usize; keys.len()];
        for (ip, &key) in keys.iter().enumerate() {
            permutation[cursor[key]] = ip;
            cursor[key] += 1;
        }

        tracing::event!(
            Level::DEBUG,
            "binned {} particle(s) into {} tile(s) of {:?} cells",
            keys.len(),
            total,
            bin_size
        );

        Self {
            bin_size,
            nbins,
            domain,
            permutation,
            offsets,
        }
    }

    pub fn num_bins(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn bin_size(&self) -> [usize; 3] {
        self.bin_size
    }

    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Particles of tile `b`, as indices into the particle arrays.
    pub fn bin(&self, b: usize) -> &[usize] {
        &self.permutation[self.offsets[b]..self.offsets[b + 1]]
    }

    /// Cells covered by tile `b`.
    pub fn bin_box(&self, b: usize) -> IndexBox {
        let coords = [
            b % self.nbins[0],
            (b / self.nbins[0]) % self.nbins[1],
            b / (self.nbins[0] * self.nbins[1]),
        ];
        let mut out = self.domain;
        for axis in 0..3 {
            let size = self.bin_size[axis] as i64;
            out.lo[axis] = self.domain.lo[axis] + coords[axis] as i64 * size;
            out.hi[axis] = out.lo[axis] + size - 1;
        }
        out.intersect(&self.domain)
    }
}

use std::ops::{Index, IndexMut};

use faer_core::{zipped, Mat};
use rayon::prelude::*;
use reborrow::*;

use crate::{
    geometry::{Geometry, IndexBox, IndexType},
    stencil::GridType,
    PicError, Real,
};

/// Read-only accessor over one component of a [`MeshField`], indexed in global (i, j, k).
#[derive(Clone, Copy)]
pub struct FieldView<'a, F> {
    data: &'a [F],
    lo: [i64; 3],
    nx: usize,
    nxy: usize,
}

impl<'a, F: Copy> FieldView<'a, F> {
    #[inline(always)]
    pub fn at(&self, i: i64, j: i64, k: i64) -> F {
        let offset = (i - self.lo[0]) as usize
            + (j - self.lo[1]) as usize * self.nx
            + (k - self.lo[2]) as usize * self.nxy;
        self.data[offset]
    }
}

/// Mesh array of one scalar quantity (or of one vector component) on a refinement level.
///
/// Points of the guard-grown box are stored `i` fastest; every component (azimuthal mode
/// in cylindrical geometry) is one contiguous column of the underlying matrix.
#[derive(Clone, Debug)]
pub struct MeshField<F: Real> {
    name: String,
    ix_type: [IndexType; 3],
    domain: IndexBox,
    active: [bool; 3],
    periodic: [bool; 3],
    valid: IndexBox,
    ngrow: [i64; 3],
    grown: IndexBox,
    data: Mat<F>,
}

impl<F: Real> MeshField<F> {
    pub fn new(
        name: impl AsRef<str>,
        geom: &Geometry<F>,
        ix_type: [IndexType; 3],
        ng: usize,
        ncomp: usize,
    ) -> Self {
        let active = geom.active_axes();
        let domain = geom.domain_box();
        let valid = domain.convert(ix_type, active);
        let ngrow = active.map(|a| if a { ng as i64 } else { 0 });
        let grown = valid.grow(ngrow);

        Self {
            name: name.as_ref().to_string(),
            ix_type,
            domain,
            active,
            periodic: geom.periodic,
            valid,
            ngrow,
            grown,
            data: Mat::from_fn(grown.num_pts(), ncomp.max(1), |_, _| F::ZERO),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ix_type(&self) -> [IndexType; 3] {
        self.ix_type
    }

    pub fn ncomp(&self) -> usize {
        self.data.ncols()
    }

    /// Points owned by this field, guard cells excluded.
    pub fn valid_box(&self) -> IndexBox {
        self.valid
    }

    /// Points in storage, guard cells included.
    pub fn grown_box(&self) -> IndexBox {
        self.grown
    }

    pub fn n_grow(&self) -> [i64; 3] {
        self.ngrow
    }

    /// Cell-centered box of the level domain this field was built on.
    pub fn domain_box(&self) -> IndexBox {
        self.domain
    }

    #[inline(always)]
    pub(crate) fn offset(&self, i: i64, j: i64, k: i64) -> usize {
        let g = &self.grown;
        (i - g.lo[0]) as usize
            + g.len(0) * ((j - g.lo[1]) as usize + g.len(1) * (k - g.lo[2]) as usize)
    }

    #[inline]
    pub fn read(&self, i: i64, j: i64, k: i64, comp: usize) -> F {
        self.data.read(self.offset(i, j, k), comp)
    }

    #[inline]
    pub fn write(&mut self, i: i64, j: i64, k: i64, comp: usize, value: F) {
        let row = self.offset(i, j, k);
        self.data.write(row, comp, value);
    }

    #[inline]
    pub fn add(&mut self, i: i64, j: i64, k: i64, comp: usize, value: F) {
        let row = self.offset(i, j, k);
        let old = self.data.read(row, comp);
        self.data.write(row, comp, old + value);
    }

    pub fn column(&self, comp: usize) -> &[F] {
        let nrows = self.data.nrows();
        let ptr = <F as faer_core::SimpleEntity>::from_group(self.data.as_ref().col(comp).as_ptr());
        // SAFETY: faer stores matrix contiguously in column major order, so a column is
        //         `nrows` consecutive elements
        unsafe { std::slice::from_raw_parts(ptr, nrows) }
    }

    pub fn column_mut(&mut self, comp: usize) -> &mut [F] {
        let nrows = self.data.nrows();
        let ptr = <F as faer_core::SimpleEntity>::from_group(self.data.as_mut().col(comp).as_ptr());
        // SAFETY: see `column`; the exclusive borrow of `self` covers the returned slice
        unsafe { std::slice::from_raw_parts_mut(ptr, nrows) }
    }

    pub(crate) fn columns_mut(&mut self) -> Vec<&mut [F]> {
        let nrows = self.data.nrows();
        let ncols = self.data.ncols();
        let mut data = self.data.as_mut();
        (0..ncols)
            .map(|comp| {
                let ptr = <F as faer_core::SimpleEntity>::from_group(data.rb_mut().col(comp).as_ptr());
                // SAFETY: distinct columns never overlap, and all of them are borrowed from
                //         the same exclusive borrow of `self`
                unsafe { std::slice::from_raw_parts_mut(ptr, nrows) }
            })
            .collect()
    }

    /// Every component as a slice of atomics, for concurrent scatter.
    pub fn atomic_columns(&mut self) -> Vec<&[F::Atomic]> {
        self.columns_mut()
            .into_iter()
            .map(|column| F::as_atomic(column))
            .collect()
    }

    /// One component as a slice of atomics.
    pub fn atomic_view(&mut self, comp: usize) -> &[F::Atomic] {
        F::as_atomic(self.column_mut(comp))
    }

    pub fn view(&self, comp: usize) -> FieldView<'_, F> {
        let nx = self.grown.len(0);
        FieldView {
            data: self.column(comp),
            lo: self.grown.lo,
            nx,
            nxy: nx * self.grown.len(1),
        }
    }

    pub fn fill(&mut self, value: F) {
        for comp in 0..self.ncomp() {
            self.column_mut(comp).fill(value);
        }
    }

    pub fn copy_from(&mut self, other: &MeshField<F>) -> Result<(), PicError> {
        self.check_same_layout(other)?;
        zipped!(self.data.as_mut(), other.data.as_ref())
            .for_each(|mut dst, src| dst.write(src.read()));
        Ok(())
    }

    pub fn check_same_layout(&self, other: &MeshField<F>) -> Result<(), PicError> {
        if self.grown != other.grown || self.ncomp() != other.ncomp() {
            return Err(PicError::MeshMismatch {
                a: self.name.clone(),
                b: other.name.clone(),
            });
        }
        Ok(())
    }

    pub fn check_ncomp(&self, expected: usize) -> Result<(), PicError> {
        if self.ncomp() != expected {
            return Err(PicError::ComponentMismatch {
                field: self.name.clone(),
                found: self.ncomp(),
                expected,
            });
        }
        Ok(())
    }

    pub fn check_guard_cells(&self, needed: [usize; 3]) -> Result<(), PicError> {
        let active = self.active;
        for axis in 0..3 {
            let have = self.ngrow[axis] as usize;
            if active[axis] && have < needed[axis] {
                return Err(PicError::InsufficientGuardCells {
                    field: self.name.clone(),
                    axis,
                    have,
                    needed: needed[axis],
                });
            }
        }
        Ok(())
    }

    pub fn active_axes(&self) -> [bool; 3] {
        self.active
    }

    /// Sum of a component over the whole storage, guard cells included.
    pub fn sum(&self, comp: usize) -> F {
        self.column(comp).iter().fold(F::ZERO, |acc, &v| acc + v)
    }

    /// Sum of a component over the valid points only.
    pub fn sum_valid(&self, comp: usize) -> F {
        let view = self.view(comp);
        self.valid
            .iter()
            .fold(F::ZERO, |acc, [i, j, k]| acc + view.at(i, j, k))
    }

    pub fn max_abs(&self) -> F {
        (0..self.ncomp()).fold(F::ZERO, |acc, comp| {
            self.column(comp)
                .iter()
                .fold(acc, |acc, &v| acc.max(v.abs()))
        })
    }

    /// Replaces every valid point `(i, j, k)` of `comp` by `kernel(i, j, k, old)`.
    ///
    /// The valid box is cut in slabs of `tile_planes` planes along `k`, one rayon task per
    /// slab. The kernel must only read fields other than `self`.
    pub fn par_update_valid<K>(&mut self, comp: usize, tile_planes: usize, kernel: K)
    where
        K: Fn(i64, i64, i64, F) -> F + Sync,
    {
        let grown = self.grown;
        let valid = self.valid;
        let planes = tile_planes.max(1);
        let (nx, ny) = (grown.len(0), grown.len(1));

        self.column_mut(comp)
            .par_chunks_mut(nx * ny * planes)
            .enumerate()
            .for_each(|(tile, slab)| {
                let k0 = grown.lo[2] + (tile * planes) as i64;
                let k1 = (k0 + planes as i64 - 1).min(grown.hi[2]);
                for k in k0.max(valid.lo[2])..=k1.min(valid.hi[2]) {
                    for j in valid.lo[1]..=valid.hi[1] {
                        let row = ((k - k0) as usize * ny + (j - grown.lo[1]) as usize) * nx;
                        for i in valid.lo[0]..=valid.hi[0] {
                            let idx = row + (i - grown.lo[0]) as usize;
                            slab[idx] = kernel(i, j, k, slab[idx]);
                        }
                    }
                }
            });
    }

    // number of distinct points along a periodic axis, and the first of them
    fn period(&self, axis: usize) -> (i64, i64) {
        (self.domain.len(axis) as i64, self.domain.lo[axis])
    }

    #[inline]
    fn periodic_image(&self, axis: usize, index: i64) -> i64 {
        let (n, lo) = self.period(axis);
        lo + (index - lo).rem_euclid(n)
    }

    /// Adds guard-cell values of periodic axes into their periodic images inside the domain,
    /// then refreshes the guard cells. Local stand-in for a parallel sum-boundary exchange.
    pub fn sum_periodic_guards(&mut self) {
        for axis in 0..3 {
            if !self.periodic[axis] {
                continue;
            }
            let (n, lo) = self.period(axis);
            let points: Vec<[i64; 3]> = self
                .grown
                .iter()
                .filter(|p| p[axis] < lo || p[axis] >= lo + n)
                .collect();
            for comp in 0..self.ncomp() {
                for p in &points {
                    let mut image = *p;
                    image[axis] = self.periodic_image(axis, p[axis]);
                    let value = self.read(p[0], p[1], p[2], comp);
                    self.add(image[0], image[1], image[2], comp, value);
                    self.write(p[0], p[1], p[2], comp, F::ZERO);
                }
            }
        }
        self.fill_periodic_guards();
    }

    /// Copies periodic images into the guard cells (and into the duplicated upper face of
    /// node-centered axes). Local stand-in for a parallel halo exchange.
    pub fn fill_periodic_guards(&mut self) {
        for axis in 0..3 {
            if !self.periodic[axis] {
                continue;
            }
            let (n, lo) = self.period(axis);
            let points: Vec<[i64; 3]> = self
                .grown
                .iter()
                .filter(|p| p[axis] < lo || p[axis] >= lo + n)
                .collect();
            for comp in 0..self.ncomp() {
                for p in &points {
                    let mut image = *p;
                    image[axis] = self.periodic_image(axis, p[axis]);
                    let value = self.read(image[0], image[1], image[2], comp);
                    self.write(p[0], p[1], p[2], comp, value);
                }
            }
        }
    }
}

/// Index types of the three components of E and J.
pub fn electric_types(grid_type: GridType) -> [[IndexType; 3]; 3] {
    staggered(grid_type, IndexType::Cell, IndexType::Node)
}

/// Index types of the three components of B.
pub fn magnetic_types(grid_type: GridType) -> [[IndexType; 3]; 3] {
    staggered(grid_type, IndexType::Node, IndexType::Cell)
}

/// Index type of G, which cleans the divergence of B: cell-centered between the faces of a
/// staggered B, on the nodes of a collocated one.
pub fn g_field_type(grid_type: GridType) -> [IndexType; 3] {
    match grid_type {
        GridType::Staggered => [IndexType::Cell; 3],
        GridType::Collocated => [IndexType::Node; 3],
    }
}

fn staggered(grid_type: GridType, along: IndexType, across: IndexType) -> [[IndexType; 3]; 3] {
    [0, 1, 2].map(|d| match grid_type {
        GridType::Collocated => [IndexType::Node; 3],
        GridType::Staggered => {
            let mut t = [across; 3];
            t[d] = along;
            t
        }
    })
}

/// Three components of a vector field, each with its own staggering.
#[derive(Clone, Debug)]
pub struct VectorField<F: Real> {
    comps: [MeshField<F>; 3],
}

impl<F: Real> VectorField<F> {
    pub fn new(comps: [MeshField<F>; 3]) -> Self {
        Self { comps }
    }

    /// E-like staggering: component `d` is cell-centered along `d` and nodal elsewhere.
    pub fn electric(name: &str, geom: &Geometry<F>, grid_type: GridType, ng: usize, ncomp: usize) -> Self {
        Self::from_types(name, geom, electric_types(grid_type), ng, ncomp)
    }

    /// B-like staggering: component `d` is nodal along `d` and cell-centered elsewhere.
    pub fn magnetic(name: &str, geom: &Geometry<F>, grid_type: GridType, ng: usize, ncomp: usize) -> Self {
        Self::from_types(name, geom, magnetic_types(grid_type), ng, ncomp)
    }

    /// Current density shares the staggering of E.
    pub fn current(name: &str, geom: &Geometry<F>, grid_type: GridType, ng: usize, ncomp: usize) -> Self {
        Self::electric(name, geom, grid_type, ng, ncomp)
    }

    fn from_types(
        name: &str,
        geom: &Geometry<F>,
        types: [[IndexType; 3]; 3],
        ng: usize,
        ncomp: usize,
    ) -> Self {
        let suffix = if geom.coords.is_cylindrical() {
            ["r", "t", "z"]
        } else {
            ["x", "y", "z"]
        };
        Self {
            comps: [0, 1, 2].map(|d| {
                MeshField::new(format!("{name}{}", suffix[d]), geom, types[d], ng, ncomp)
            }),
        }
    }

    pub fn comps(&self) -> &[MeshField<F>; 3] {
        &self.comps
    }

    pub fn comps_mut(&mut self) -> &mut [MeshField<F>; 3] {
        &mut self.comps
    }

    pub fn fill(&mut self, value: F) {
        for c in self.comps.iter_mut() {
            c.fill(value);
        }
    }

    pub fn max_abs(&self) -> F {
        self.comps
            .iter()
            .fold(F::ZERO, |acc, c| acc.max(c.max_abs()))
    }

    pub fn fill_periodic_guards(&mut self) {
        for c in self.comps.iter_mut() {
            c.fill_periodic_guards();
        }
    }

    pub fn sum_periodic_guards(&mut self) {
        for c in self.comps.iter_mut() {
            c.sum_periodic_guards();
        }
    }
}

impl<F: Real> Index<usize> for VectorField<F> {
    type Output = MeshField<F>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.comps[index]
    }
}

impl<F: Real> IndexMut<usize> for VectorField<F> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.comps[index]
    }
}

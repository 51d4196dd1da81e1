use crate::{PicError, Real};

/// Centering of a field along one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexType {
    Node,
    Cell,
}

impl IndexType {
    #[inline]
    pub fn is_node(self) -> bool {
        self == IndexType::Node
    }

    /// Offset, in cells, between the index and the physical position of a point.
    #[inline]
    pub fn shift<F: Real>(self) -> F {
        match self {
            IndexType::Node => F::ZERO,
            IndexType::Cell => F::HALF,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoordSystem {
    Cartesian1D,
    Cartesian2D,
    Cartesian3D,
    Cylindrical,
}

impl CoordSystem {
    /// Axes `i`, `j`, `k` that carry more than one index.
    pub fn active_axes(self) -> [bool; 3] {
        match self {
            CoordSystem::Cartesian1D => [false, false, true],
            CoordSystem::Cartesian2D | CoordSystem::Cylindrical => [true, false, true],
            CoordSystem::Cartesian3D => [true, true, true],
        }
    }

    pub fn is_cylindrical(self) -> bool {
        self == CoordSystem::Cylindrical
    }

    pub fn is_active(self, axis: usize) -> bool {
        self.active_axes()[axis]
    }
}

/// Fine and coarse patches of a refinement level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchType {
    Fine,
    Coarse,
}

// box[lo] ..= box[hi] along each axis, `i` running fastest in storage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IndexBox {
    pub lo: [i64; 3],
    pub hi: [i64; 3],
}

impl IndexBox {
    pub fn new(lo: [i64; 3], hi: [i64; 3]) -> Self {
        Self { lo, hi }
    }

    #[inline]
    pub fn len(&self, axis: usize) -> usize {
        (self.hi[axis] - self.lo[axis] + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.hi[axis] < self.lo[axis])
    }

    pub fn num_pts(&self) -> usize {
        self.len(0) * self.len(1) * self.len(2)
    }

    #[inline]
    pub fn contains(&self, i: i64, j: i64, k: i64) -> bool {
        i >= self.lo[0]
            && i <= self.hi[0]
            && j >= self.lo[1]
            && j <= self.hi[1]
            && k >= self.lo[2]
            && k <= self.hi[2]
    }

    pub fn grow(mut self, by: [i64; 3]) -> Self {
        for axis in 0..3 {
            self.lo[axis] -= by[axis];
            self.hi[axis] += by[axis];
        }
        self
    }

    pub fn intersect(&self, other: &IndexBox) -> IndexBox {
        let mut out = *self;
        for axis in 0..3 {
            out.lo[axis] = self.lo[axis].max(other.lo[axis]);
            out.hi[axis] = self.hi[axis].min(other.hi[axis]);
        }
        out
    }

    /// Coarsens a cell-centered box by `ratio`.
    pub fn coarsen(mut self, ratio: [i64; 3]) -> Self {
        for axis in 0..3 {
            self.lo[axis] = self.lo[axis].div_euclid(ratio[axis]);
            self.hi[axis] = (self.hi[axis] + 1).div_euclid(ratio[axis]) - 1;
        }
        self
    }

    /// Converts a cell-centered box to the points of a field with index type `ix_type`,
    /// skipping the axes that are not active.
    pub fn convert(mut self, ix_type: [IndexType; 3], active: [bool; 3]) -> Self {
        for axis in 0..3 {
            if active[axis] && ix_type[axis].is_node() {
                self.hi[axis] += 1;
            }
        }
        self
    }

    /// Iterates over the points of the box, `i` fastest.
    pub fn iter(&self) -> impl Iterator<Item = [i64; 3]> {
        let b = *self;
        (b.lo[2]..=b.hi[2]).flat_map(move |k| {
            (b.lo[1]..=b.hi[1]).flat_map(move |j| (b.lo[0]..=b.hi[0]).map(move |i| [i, j, k]))
        })
    }
}

/// Geometry of one refinement level: cells, cell sizes, physical lower corner and periodicity.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry<F> {
    pub coords: CoordSystem,
    pub n_cell: [usize; 3],
    pub cell_size: [F; 3],
    pub prob_lo: [F; 3],
    pub periodic: [bool; 3],
}

impl<F: Real> Geometry<F> {
    // inactive axes are collapsed to a single unit cell
    pub fn from_steps(coords: CoordSystem, lower: [F; 3], upper: [F; 3], steps: [usize; 3]) -> Self {
        let active = coords.active_axes();
        let mut n_cell = [1; 3];
        let mut cell_size = [F::ONE; 3];
        let mut prob_lo = [F::ZERO; 3];
        for axis in 0..3 {
            if active[axis] {
                n_cell[axis] = steps[axis];
                cell_size[axis] = (upper[axis] - lower[axis]) / F::from_f64(steps[axis] as f64);
                prob_lo[axis] = lower[axis];
            }
        }

        Self {
            coords,
            n_cell,
            cell_size,
            prob_lo,
            periodic: [false; 3],
        }
    }

    pub fn with_periodicity(mut self, periodic: [bool; 3]) -> Self {
        let active = self.coords.active_axes();
        for axis in 0..3 {
            self.periodic[axis] = periodic[axis] && active[axis];
        }
        self
    }

    /// Geometry of the next finer level covering the same physical domain.
    pub fn refine(&self, ratio: [i64; 3]) -> Self {
        let mut fine = self.clone();
        for axis in 0..3 {
            if self.coords.is_active(axis) {
                fine.n_cell[axis] *= ratio[axis] as usize;
                fine.cell_size[axis] = self.cell_size[axis] / F::from_f64(ratio[axis] as f64);
            }
        }
        fine
    }

    pub fn active_axes(&self) -> [bool; 3] {
        self.coords.active_axes()
    }

    pub fn inv_cell_size(&self) -> [F; 3] {
        self.cell_size.map(|d| F::ONE / d)
    }

    /// Inverse volume of a cell, counting active axes only.
    pub fn inv_cell_volume(&self) -> F {
        let inv = self.inv_cell_size();
        let active = self.active_axes();
        (0..3)
            .filter(|&axis| active[axis])
            .fold(F::ONE, |acc, axis| acc * inv[axis])
    }

    pub fn cell_volume(&self) -> F {
        F::ONE / self.inv_cell_volume()
    }

    /// Cell-centered box of the whole level domain.
    pub fn domain_box(&self) -> IndexBox {
        IndexBox::new(
            [0; 3],
            [
                self.n_cell[0] as i64 - 1,
                self.n_cell[1] as i64 - 1,
                self.n_cell[2] as i64 - 1,
            ],
        )
    }

    /// Domain box of `patch` at level `lev`, in the index space of that patch.
    ///
    /// The coarse patch of a refined level lives in the index space of the parent level.
    pub fn patch_domain(
        &self,
        lev: usize,
        patch: PatchType,
        ref_ratios: &[[i64; 3]],
    ) -> Result<IndexBox, PicError> {
        let domain = self.domain_box();
        match patch {
            PatchType::Coarse if lev > 0 => {
                let ratio = ref_ratios
                    .get(lev - 1)
                    .ok_or(PicError::MissingRefinementRatio { lev })?;
                Ok(domain.coarsen(*ratio))
            }
            _ => Ok(domain),
        }
    }

    /// Physical coordinate of index `index` along `axis` for the given centering.
    #[inline]
    pub fn position(&self, axis: usize, index: i64, ix_type: IndexType) -> F {
        self.prob_lo[axis]
            + (F::from_f64(index as f64) + ix_type.shift::<F>()) * self.cell_size[axis]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_axes_collapse() {
        let geom = Geometry::<f64>::from_steps(
            CoordSystem::Cylindrical,
            [0.0, 0.0, -1.0],
            [2.0, 5.0, 1.0],
            [4, 7, 8],
        );
        assert_eq!(geom.n_cell, [4, 1, 8]);
        assert_eq!(geom.cell_size, [0.5, 1.0, 0.25]);
        assert_eq!(geom.inv_cell_volume(), 8.0);
    }

    #[test]
    fn node_conversion_skips_inactive_axes() {
        let b = IndexBox::new([0; 3], [3, 0, 3]);
        let node = b.convert([IndexType::Node; 3], [true, false, true]);
        assert_eq!(node, IndexBox::new([0; 3], [4, 0, 4]));
        assert_eq!(node.num_pts(), 25);
    }

    #[test]
    fn coarse_patch_uses_parent_index_space() {
        let geom = Geometry::<f64>::from_steps(
            CoordSystem::Cartesian2D,
            [0.0; 3],
            [1.0; 3],
            [16, 1, 8],
        );
        let ratios = [[2, 1, 4]];
        let coarse = geom.patch_domain(1, PatchType::Coarse, &ratios).unwrap();
        assert_eq!(coarse, IndexBox::new([0; 3], [7, 0, 1]));
        let fine = geom.patch_domain(1, PatchType::Fine, &ratios).unwrap();
        assert_eq!(fine, geom.domain_box());
        assert!(matches!(
            geom.patch_domain(2, PatchType::Coarse, &ratios),
            Err(PicError::MissingRefinementRatio { lev: 2 })
        ));
    }

    #[test]
    fn iteration_runs_i_fastest() {
        let b = IndexBox::new([0, 0, 0], [1, 0, 1]);
        let pts: Vec<_> = b.iter().collect();
        assert_eq!(pts, vec![[0, 0, 0], [1, 0, 0], [0, 0, 1], [1, 0, 1]]);
    }
}

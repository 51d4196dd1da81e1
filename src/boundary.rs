//! Conducting and reflecting domain boundaries.
//!
//! Only the boundary types handled here touch field values: periodic boundaries are left to
//! the halo exchange, absorbing/open ones to an absorbing layer.

use tracing::Level;

use crate::{
    field::{MeshField, VectorField},
    geometry::{Geometry, IndexBox, PatchType},
    PicError, Real,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BoundaryType {
    Periodic,
    /// Perfect electric conductor.
    Pec,
    /// Perfect magnetic conductor.
    Pmc,
    Absorbing,
    /// Particles bounce back; deposits leaking through the wall are folded back inside.
    Reflecting,
    Open,
    #[default]
    None,
}

/// Whether a table describes field or particle boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableKind {
    Field,
    Particle,
}

impl TableKind {
    fn name(self) -> &'static str {
        match self {
            TableKind::Field => "field",
            TableKind::Particle => "particle",
        }
    }
}

/// Boundary type on each side of each axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundaryTable {
    pub lo: [BoundaryType; 3],
    pub hi: [BoundaryType; 3],
}

impl BoundaryTable {
    pub fn new(lo: [BoundaryType; 3], hi: [BoundaryType; 3]) -> Self {
        Self { lo, hi }
    }

    pub fn uniform(value: BoundaryType) -> Self {
        Self::new([value; 3], [value; 3])
    }

    /// Checks the table once at setup against the geometry it will be used with.
    pub fn validate<F: Real>(&self, kind: TableKind, geom: &Geometry<F>) -> Result<(), PicError> {
        let active = geom.active_axes();
        let invalid = |axis: usize, side: &'static str, value: BoundaryType, reason: &'static str| {
            PicError::InvalidBoundary {
                table: kind.name(),
                axis,
                side,
                value,
                reason,
            }
        };

        for axis in (0..3).filter(|&a| active[a]) {
            for (side, value) in [("lo", self.lo[axis]), ("hi", self.hi[axis])] {
                match (kind, value) {
                    (TableKind::Field, BoundaryType::Reflecting) => {
                        return Err(invalid(axis, side, value, "reflecting applies to particles only"))
                    }
                    (TableKind::Particle, BoundaryType::Pec | BoundaryType::Pmc) => {
                        return Err(invalid(axis, side, value, "conductors apply to fields only"))
                    }
                    _ => {}
                }
            }

            let lo_periodic = self.lo[axis] == BoundaryType::Periodic;
            let hi_periodic = self.hi[axis] == BoundaryType::Periodic;
            if lo_periodic != hi_periodic {
                let (side, value) = if lo_periodic {
                    ("hi", self.hi[axis])
                } else {
                    ("lo", self.lo[axis])
                };
                return Err(invalid(axis, side, value, "periodic on one side only"));
            }
            if lo_periodic != geom.periodic[axis] {
                return Err(invalid(
                    axis,
                    "lo",
                    self.lo[axis],
                    "periodicity disagrees with the geometry",
                ));
            }
        }

        if geom.coords.is_cylindrical() && self.lo[0] != BoundaryType::None {
            return Err(invalid(0, "lo", self.lo[0], "the cylindrical axis takes no boundary"));
        }
        Ok(())
    }
}

/// Refinement level and patch a field lives on, with the ratios between successive levels.
#[derive(Clone, Copy, Debug)]
pub struct PatchLevel<'a> {
    pub lev: usize,
    pub patch: PatchType,
    pub ref_ratios: &'a [[i64; 3]],
}

impl<'a> PatchLevel<'a> {
    pub fn base() -> Self {
        Self {
            lev: 0,
            patch: PatchType::Fine,
            ref_ratios: &[],
        }
    }

    pub fn new(lev: usize, patch: PatchType, ref_ratios: &'a [[i64; 3]]) -> Self {
        Self {
            lev,
            patch,
            ref_ratios,
        }
    }
}

// Position of index `index` along `axis` relative to one wall of the domain.
//
// Returns the distance into the guard region (0 on a nodal face, > 0 in the guard cells) and
// the index of the mirrored point, or `None` when the point lies inside the domain.
#[inline]
fn guard_offset(domain: &IndexBox, axis: usize, nodal: bool, hi: bool, index: i64) -> Option<(i64, i64)> {
    let nodal = nodal as i64;
    let ig = if hi {
        index - (domain.hi[axis] + nodal)
    } else {
        domain.lo[axis] - index
    };
    if ig < 0 {
        return None;
    }
    let mirror = if hi {
        domain.hi[axis] + 1 - ig
    } else {
        domain.lo[axis] + ig - (1 - nodal)
    };
    Some((ig, mirror))
}

/// Field the conductor acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Polarity {
    Electric,
    Magnetic,
}

// `true` when component `comp` of the field must vanish on a conductor wall normal to `axis`
fn is_odd(polarity: Polarity, bc_type: BoundaryType, comp: usize, axis: usize) -> bool {
    let tangential = comp != axis;
    match (polarity, bc_type) {
        (Polarity::Electric, BoundaryType::Pec) | (Polarity::Magnetic, BoundaryType::Pmc) => tangential,
        _ => !tangential,
    }
}

fn apply_conductor<F: Real>(
    field: &mut VectorField<F>,
    polarity: Polarity,
    table: &BoundaryTable,
    bc_type: BoundaryType,
    ng: usize,
    geom: &Geometry<F>,
    at: PatchLevel<'_>,
) -> Result<(), PicError> {
    if !matches!(bc_type, BoundaryType::Pec | BoundaryType::Pmc) {
        return Err(PicError::Config(format!(
            "conductor boundaries are PEC or PMC, got `{bc_type:?}`"
        )));
    }
    let domain = geom.patch_domain(at.lev, at.patch, at.ref_ratios)?;
    let active = geom.active_axes();
    let walls: Vec<(usize, bool)> = (0..3)
        .filter(|&axis| active[axis])
        .flat_map(|axis| [(axis, false), (axis, true)])
        .filter(|&(axis, hi)| {
            let side = if hi { table.hi[axis] } else { table.lo[axis] };
            side == bc_type
        })
        .collect();
    if walls.is_empty() {
        return Ok(());
    }
    tracing::event!(
        Level::TRACE,
        "{:?} on {:?} field, level {} ({:?} patch), {} wall(s)",
        bc_type,
        polarity,
        at.lev,
        at.patch,
        walls.len()
    );

    for (comp, f) in field.comps_mut().iter_mut().enumerate() {
        let nodal = f.ix_type().map(|t| t.is_node());
        let points: Vec<[i64; 3]> = f.grown_box().iter().collect();

        // faces first, so that guards mirrored from a face point read the enforced value
        for p in &points {
            let on_odd_face = walls.iter().any(|&(axis, hi)| {
                nodal[axis]
                    && is_odd(polarity, bc_type, comp, axis)
                    && matches!(guard_offset(&domain, axis, true, hi, p[axis]), Some((0, _)))
            });
            if on_odd_face {
                for c in 0..f.ncomp() {
                    f.write(p[0], p[1], p[2], c, F::ZERO);
                }
            }
        }

        for p in &points {
            let mut mirror = *p;
            let mut sign = F::ONE;
            let mut guard = false;
            for &(axis, hi) in &walls {
                if let Some((ig, m)) = guard_offset(&domain, axis, nodal[axis], hi, p[axis]) {
                    if ig > 0 && ig <= ng as i64 {
                        guard = true;
                        mirror[axis] = m;
                        if is_odd(polarity, bc_type, comp, axis) {
                            sign = -sign;
                        }
                    }
                }
            }
            if guard && f.grown_box().contains(mirror[0], mirror[1], mirror[2]) {
                for c in 0..f.ncomp() {
                    let value = f.read(mirror[0], mirror[1], mirror[2], c);
                    f.write(p[0], p[1], p[2], c, sign * value);
                }
            }
        }
    }
    Ok(())
}

/// Zeroes the tangential E (normal E for a PMC) on conductor walls and fills the guard cells
/// with the mirrored interior values, antisymmetric for those components.
pub fn apply_pec_to_efield<F: Real>(
    e: &mut VectorField<F>,
    table: &BoundaryTable,
    bc_type: BoundaryType,
    ng: usize,
    geom: &Geometry<F>,
    at: PatchLevel<'_>,
) -> Result<(), PicError> {
    apply_conductor(e, Polarity::Electric, table, bc_type, ng, geom, at)
}

/// Zeroes the normal B (tangential B for a PMC) on conductor walls and fills the guard cells
/// with the mirrored interior values, antisymmetric for those components.
pub fn apply_pec_to_bfield<F: Real>(
    b: &mut VectorField<F>,
    table: &BoundaryTable,
    bc_type: BoundaryType,
    ng: usize,
    geom: &Geometry<F>,
    at: PatchLevel<'_>,
) -> Result<(), PicError> {
    apply_conductor(b, Polarity::Magnetic, table, bc_type, ng, geom, at)
}

/// How deposits beyond one wall return into the domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Fold {
    /// Reflecting particles: the deposit is mirrored back as is.
    Reflect,
    /// Conductor: the deposit comes back as the image of opposite charge.
    Image,
}

// reflecting particles take precedence over a conductor on the same wall
fn fold_at(
    field_table: &BoundaryTable,
    particle_table: &BoundaryTable,
    axis: usize,
    hi: bool,
) -> Option<Fold> {
    let (field, particle) = if hi {
        (field_table.hi[axis], particle_table.hi[axis])
    } else {
        (field_table.lo[axis], particle_table.lo[axis])
    };
    match (particle, field) {
        (BoundaryType::Reflecting, _) => Some(Fold::Reflect),
        (_, BoundaryType::Pec) => Some(Fold::Image),
        _ => None,
    }
}

// Adds every guard value beyond a folding wall into its mirror point, then clears the guard.
// Where the sign is odd the nodal face itself is cleared, the image cancelling the deposit there.
fn fold_into_domain<F: Real>(
    f: &mut MeshField<F>,
    field_table: &BoundaryTable,
    particle_table: &BoundaryTable,
    domain: &IndexBox,
    active: [bool; 3],
    sign: impl Fn(usize, Fold) -> F,
) {
    let nodal = f.ix_type().map(|t| t.is_node());
    let grown = f.grown_box();

    // one axis at a time, so corner deposits travel through the edge guards
    for axis in (0..3).filter(|&a| active[a]) {
        for hi in [false, true] {
            let Some(fold) = fold_at(field_table, particle_table, axis, hi) else {
                continue;
            };
            let sign = sign(axis, fold);
            let clear_face = nodal[axis] && sign < F::ZERO;
            let points: Vec<([i64; 3], i64, i64)> = grown
                .iter()
                .filter_map(|p| {
                    guard_offset(domain, axis, nodal[axis], hi, p[axis]).map(|(ig, m)| (p, ig, m))
                })
                .collect();
            for (p, ig, m) in points {
                if ig == 0 {
                    if clear_face {
                        for c in 0..f.ncomp() {
                            f.write(p[0], p[1], p[2], c, F::ZERO);
                        }
                    }
                    continue;
                }
                let mut mirror = p;
                mirror[axis] = m;
                if !grown.contains(mirror[0], mirror[1], mirror[2]) {
                    continue;
                }
                for c in 0..f.ncomp() {
                    let value = f.read(p[0], p[1], p[2], c);
                    f.add(mirror[0], mirror[1], mirror[2], c, sign * value);
                    f.write(p[0], p[1], p[2], c, F::ZERO);
                }
            }
        }
    }
}

/// Folds charge deposited beyond reflecting particle walls back into the domain, and charge
/// deposited beyond PEC walls back as its image charge.
pub fn apply_reflective_boundary_to_rho<F: Real>(
    rho: &mut MeshField<F>,
    field_table: &BoundaryTable,
    particle_table: &BoundaryTable,
    geom: &Geometry<F>,
    at: PatchLevel<'_>,
) -> Result<(), PicError> {
    let domain = geom.patch_domain(at.lev, at.patch, at.ref_ratios)?;
    tracing::event!(Level::TRACE, "fold `{}` at level {} ({:?} patch)", rho.name(), at.lev, at.patch);
    fold_into_domain(rho, field_table, particle_table, &domain, geom.active_axes(), |_, fold| {
        match fold {
            Fold::Reflect => F::ONE,
            Fold::Image => -F::ONE,
        }
    });
    Ok(())
}

/// Folds current deposited beyond reflecting particle walls or PEC walls back into the domain.
///
/// Reflected particles reverse their normal velocity, so the normal component changes sign. The
/// image current of a conductor keeps its normal component and flips the tangential ones.
pub fn apply_reflective_boundary_to_j<F: Real>(
    j: &mut VectorField<F>,
    field_table: &BoundaryTable,
    particle_table: &BoundaryTable,
    geom: &Geometry<F>,
    at: PatchLevel<'_>,
) -> Result<(), PicError> {
    let domain = geom.patch_domain(at.lev, at.patch, at.ref_ratios)?;
    let active = geom.active_axes();
    for (comp, f) in j.comps_mut().iter_mut().enumerate() {
        fold_into_domain(f, field_table, particle_table, &domain, active, |axis, fold| {
            let normal = axis == comp;
            if normal == (fold == Fold::Reflect) {
                -F::ONE
            } else {
                F::ONE
            }
        });
    }
    Ok(())
}

use thiserror::Error;

use crate::{boundary::BoundaryType, geometry::CoordSystem, stencil::FdtdAlgo, GridType};

/// Fatal conditions of the field/deposition core.
///
/// None of them is retryable: they are detected before a kernel touches any field and the
/// caller is expected to stop the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PicError {
    #[error("`{algo:?}` ({grid_type:?}) field solver has no implementation for {coords:?} geometry")]
    UnsupportedAlgorithm {
        algo: FdtdAlgo,
        grid_type: GridType,
        coords: CoordSystem,
    },

    #[error("{operation} is not implemented for {coords:?} geometry")]
    UnsupportedOperation {
        operation: &'static str,
        coords: CoordSystem,
    },

    #[error("invalid {table} boundary `{value:?}` on axis {axis} ({side}): {reason}")]
    InvalidBoundary {
        table: &'static str,
        axis: usize,
        side: &'static str,
        value: BoundaryType,
        reason: &'static str,
    },

    #[error("tile size too big for shared-memory deposition ({requested} bytes requested, {available} available)")]
    SharedMemoryExceeded { requested: usize, available: usize },

    #[error("field `{field}` has {have} guard cell(s) along axis {axis}, {needed} required")]
    InsufficientGuardCells {
        field: String,
        axis: usize,
        have: usize,
        needed: usize,
    },

    #[error("invalid number of azimuthal modes ({0}) for this geometry")]
    InvalidModeCount(usize),

    #[error("field `{field}` has {found} component(s), expected {expected}")]
    ComponentMismatch {
        field: String,
        found: usize,
        expected: usize,
    },

    #[error("fields `{a}` and `{b}` do not live on the same mesh")]
    MeshMismatch { a: String, b: String },

    #[error("{count} particle contribution(s) fall outside the storage of `{field}`")]
    ParticleOutsideMesh { field: String, count: usize },

    #[error("particle array `{array}` has {found} entries, expected {expected}")]
    ParticleArrayLength {
        array: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("current deposition needs particle momenta")]
    MissingMomentum,

    #[error("refinement level {lev} has no refinement ratio to its parent")]
    MissingRefinementRatio { lev: usize },

    #[error("refinement level {0} does not exist")]
    MissingLevel(usize),

    #[error("invalid configuration: {0}")]
    Config(String),
}

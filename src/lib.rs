//! Field-update and particle-mesh deposition core of an electromagnetic particle-in-cell code.
//!
//! The crate advances Maxwell's equations with finite-difference stencils on a structured
//! mesh with guard cells, enforces conducting and reflecting boundaries, and scatters
//! macro-particle charge and current onto the mesh through polynomial shape factors.

use std::{
    fmt,
    ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign},
};

use faer_core::SimpleEntity;

pub mod atomic;
pub mod boundary;
pub mod config;
pub mod constants;
pub mod deposition;
pub mod driver;
pub mod error;
pub mod evolve;
pub mod field;
pub mod geometry;
pub mod particles;
pub mod shape;
pub mod sim;
pub mod stencil;

pub use boundary::{BoundaryTable, BoundaryType};
pub use config::PicConfig;
pub use deposition::{DepositionAlgo, Depositor, DirectDeposition, SharedDeposition};
pub use driver::{
    Driver, Logger, NoParticles, ObsCtx, Observer, ParticleSource, Resolution, SimError,
};
pub use error::PicError;
pub use evolve::FiniteDifferenceSolver;
pub use field::{MeshField, VectorField};
pub use geometry::{CoordSystem, Geometry, IndexBox, IndexType, PatchType};
pub use particles::{DenseBins, ParticleView, SpeciesView};
pub use shape::ShapeOrder;
pub use sim::{Level, Simulation};
pub use stencil::{FdtdAlgo, GridType, StencilKind};

/// Scalar type of every mesh value and every kernel computation.
pub trait Real:
    SimpleEntity
    + atomic::AtomicFloat
    + bytemuck::Pod
    + Copy
    + Default
    + PartialOrd
    + Send
    + Sync
    + fmt::Debug
    + fmt::Display
    + fmt::LowerExp
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + 'static
{
    const ZERO: Self;
    const ONE: Self;
    const HALF: Self;

    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
    fn sqrt(self) -> Self;
    fn floor(self) -> Self;
    fn is_finite(self) -> bool;
    fn abs(self) -> Self;
    fn max(self, other: Self) -> Self;
    fn min(self, other: Self) -> Self;
}

macro_rules! real {
    ($float: ty) => {
        impl Real for $float {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            const HALF: Self = 0.5;

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $float
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn sqrt(self) -> Self {
                <$float>::sqrt(self)
            }

            #[inline]
            fn floor(self) -> Self {
                <$float>::floor(self)
            }

            #[inline]
            fn is_finite(self) -> bool {
                <$float>::is_finite(self)
            }

            #[inline]
            fn abs(self) -> Self {
                <$float>::abs(self)
            }

            #[inline]
            fn max(self, other: Self) -> Self {
                <$float>::max(self, other)
            }

            #[inline]
            fn min(self, other: Self) -> Self {
                <$float>::min(self, other)
            }
        }
    };
}

real!(f32);
real!(f64);

//! Error types for configuring and populating a simulation.
//!
//! Only configuration and capacity checks can fail. Stepping is total: the
//! per-step phases always complete and never return an error.

use thiserror::Error;

/// A parameter set that cannot describe a valid simulation.
///
/// Fatal at construction time: a simulation is never created from it.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ConfigError {
    #[error("smoothing radius must be positive, got {0}")]
    NonPositiveSmoothingRadius(f32),

    #[error("world extent must be positive on both axes, got {width} x {height}")]
    NonPositiveWorldExtent { width: f32, height: f32 },

    #[error("grid of {cells} cells exceeds the limit of {max} cells")]
    GridTooLarge { cells: f64, max: usize },

    #[error("maximum particle count must be positive")]
    ZeroMaxParticles,

    #[error("maximum particle count {0} does not fit a particle index")]
    MaxParticlesTooLarge(usize),

    #[error("particle mass must be positive, got {0}")]
    NonPositiveMass(f32),

    #[error("rest density must be positive, got {0}")]
    NonPositiveRestDensity(f32),

    #[error("time step must be positive, got {0}")]
    NonPositiveTimeStep(f32),

    #[error("wall damping must lie in [0, 1], got {0}")]
    WallDampingOutOfRange(f32),

    #[error("parameter `{0}` is not finite")]
    NonFiniteParameter(&'static str),
}

/// Errors returned by operations on a running simulation.
///
/// A rejected operation leaves the simulation exactly as it was.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum SphError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(
        "particle capacity exceeded: {requested} requested, {available} of {capacity} slots free"
    )]
    CapacityExceeded {
        requested: usize,
        available: usize,
        capacity: usize,
    },

    #[error("seed spacing must be positive and finite, got {0}")]
    InvalidSpacing(f32),

    #[error("position ({x}, {y}) lies outside the world")]
    OutsideWorld { x: f32, y: f32 },
}

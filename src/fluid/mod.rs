//! Smoothed Particle Hydrodynamics core for 2D fluids.
//!
//! Each step rebuilds a uniform spatial hash grid, evaluates density and
//! pressure with the poly6 kernel, accumulates pressure and viscosity forces
//! with the spiky and viscosity kernels, then advances every particle with
//! semi-implicit Euler and clamps it against the world walls.
//!
//! # Architecture
//!
//! - [`error`]: Configuration and runtime errors
//! - [`params`]: Simulation parameters and presets
//! - [`kernels`]: Smoothing kernels
//! - [`particle`]: Particle state, fixed-capacity store and seeding
//! - [`spatial`]: Cell-head spatial hash grid
//! - [`solver`]: Density/pressure and force phases
//! - [`boundary`]: Integration and wall handling
//! - [`simulation`]: The per-step driver
//! - [`plugin`]: Bevy plugin
//!
//! # Example
//!
//! ```rust,no_run
//! use sph2d::fluid::prelude::*;
//!
//! let mut sim = SphSimulation::new(SphParams::default()).unwrap();
//! sim.seed_dam_break().unwrap();
//! for _ in 0..100 {
//!     sim.step();
//! }
//! let vertices = sim.particle_snapshot().to_gpu();
//! ```

pub mod boundary;
pub mod error;
pub mod kernels;
pub mod params;
pub mod particle;
pub mod plugin;
pub mod simulation;
pub mod solver;
pub mod spatial;

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::boundary::*;
    pub use super::error::*;
    pub use super::kernels::*;
    pub use super::params::*;
    pub use super::particle::*;
    pub use super::plugin::*;
    pub use super::simulation::*;
    pub use super::solver::*;
    pub use super::spatial::*;
}

//! sph2d - 2D Smoothed Particle Hydrodynamics for Bevy
//!
//! A weakly compressible SPH fluid solver on a rectangular world, with a
//! uniform-grid neighbor search and a fixed-capacity particle store.
//!
//! # Features
//!
//! - **Kernel library**: poly6, spiky gradient and viscosity Laplacian
//! - **Spatial hash grid**: cell heads with index-linked chains, no per-cell allocation
//! - **Deterministic stepping**: identical inputs give identical trajectories
//! - **Parallel phases**: enable the `parallel` feature to run solver phases on rayon
//! - **GPU-ready snapshots**: `Pod` vertex layout for point-sprite upload
//! - **Easy Integration**: Simple Bevy plugin interface
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use sph2d::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(MinimalPlugins)
//!         .add_plugins(SphPlugin::new(SphParams::water()).with_dam_break())
//!         .add_systems(Update, report)
//!         .run();
//! }
//!
//! fn report(simulation: Res<SphSimulation>) {
//!     info!("average density {}", simulation.average_density());
//! }
//! ```

pub mod fluid;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::fluid::prelude::*;
}

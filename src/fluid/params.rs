//! Simulation parameters.
//!
//! These parameters are fixed for the lifetime of a run. Changing them goes
//! through [`SphSimulation::reconfigure`](super::simulation::SphSimulation::reconfigure),
//! which revalidates and rebuilds the grid metadata.

use bevy::prelude::*;

use super::error::ConfigError;
use super::particle::NO_PARTICLE;
use super::spatial::{GridMetadata, MAX_GRID_CELLS};

/// Parameters controlling the SPH simulation.
///
/// The defaults describe a small water tank: a 3.84 x 3.84 world sampled with
/// a 0.04 smoothing radius, which gives a 96 x 96 cell grid.
#[derive(Resource, Clone, Debug, PartialEq, Reflect)]
#[reflect(Resource)]
pub struct SphParams {
    /// Smoothing kernel radius (h). Also the grid cell size.
    pub smoothing_radius: f32,

    /// Mass carried by every particle.
    pub particle_mass: f32,

    /// Rest density of the fluid.
    pub rest_density: f32,

    /// Gain of the equation of state.
    /// Higher values = stiffer, less compressible fluid, smaller stable time step.
    pub stiffness: f32,

    /// Viscosity coefficient applied to the smoothed velocity difference.
    pub viscosity: f32,

    /// Gravity acceleration vector.
    pub gravity: Vec2,

    /// Fixed time step. Also the fallback step when adaptive stepping finds
    /// no acceleration to scale against.
    pub time_step: f32,

    /// Derive the time step from the previous step's largest acceleration.
    pub adaptive_time_step: bool,

    /// Fraction of the normal velocity kept when a particle hits a wall.
    /// 0.0 = fully inelastic, 1.0 = fully elastic.
    pub wall_damping: f32,

    /// World extent. The world spans `[0, width) x [0, height)`.
    pub world_size: Vec2,

    /// Fixed capacity of the particle store.
    pub max_particles: usize,
}

impl Default for SphParams {
    fn default() -> Self {
        Self {
            smoothing_radius: 0.04,
            particle_mass: 0.02,
            rest_density: 1000.0,
            stiffness: 1000.0,
            viscosity: 8.0,
            gravity: Vec2::new(0.0, -1.8),
            time_step: 0.002,
            adaptive_time_step: false,
            wall_damping: 0.0,
            world_size: Vec2::new(3.84, 3.84),
            max_particles: 10_000,
        }
    }
}

impl SphParams {
    /// Water-like defaults.
    pub fn water() -> Self {
        Self::default()
    }

    /// Thick, slow-moving fluid.
    pub fn viscous() -> Self {
        Self {
            viscosity: 40.0,
            stiffness: 600.0,
            ..Self::default()
        }
    }

    /// Fluid that keeps its energy on wall contact.
    pub fn bouncy() -> Self {
        Self {
            wall_damping: 0.8,
            viscosity: 2.0,
            ..Self::default()
        }
    }

    pub fn with_smoothing_radius(mut self, smoothing_radius: f32) -> Self {
        self.smoothing_radius = smoothing_radius;
        self
    }

    pub fn with_particle_mass(mut self, particle_mass: f32) -> Self {
        self.particle_mass = particle_mass;
        self
    }

    pub fn with_rest_density(mut self, rest_density: f32) -> Self {
        self.rest_density = rest_density;
        self
    }

    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness;
        self
    }

    pub fn with_viscosity(mut self, viscosity: f32) -> Self {
        self.viscosity = viscosity;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_time_step(mut self, time_step: f32) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_adaptive_time_step(mut self, adaptive: bool) -> Self {
        self.adaptive_time_step = adaptive;
        self
    }

    pub fn with_wall_damping(mut self, wall_damping: f32) -> Self {
        self.wall_damping = wall_damping;
        self
    }

    pub fn with_world_size(mut self, world_size: Vec2) -> Self {
        self.world_size = world_size;
        self
    }

    pub fn with_max_particles(mut self, max_particles: usize) -> Self {
        self.max_particles = max_particles;
        self
    }

    /// Grid cell size. Always equal to the smoothing radius so that a 3x3
    /// cell scan covers the full kernel support.
    pub fn cell_size(&self) -> f32 {
        self.smoothing_radius
    }

    /// Grid layout derived from the world size and cell size.
    pub fn grid_metadata(&self) -> GridMetadata {
        GridMetadata::new(self.cell_size(), self.world_size)
    }

    /// Checks every parameter, reporting the first invalid one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scalars = [
            ("smoothing_radius", self.smoothing_radius),
            ("particle_mass", self.particle_mass),
            ("rest_density", self.rest_density),
            ("stiffness", self.stiffness),
            ("viscosity", self.viscosity),
            ("gravity.x", self.gravity.x),
            ("gravity.y", self.gravity.y),
            ("time_step", self.time_step),
            ("wall_damping", self.wall_damping),
            ("world_size.x", self.world_size.x),
            ("world_size.y", self.world_size.y),
        ];
        if let Some((name, _)) = scalars.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::NonFiniteParameter(name));
        }

        if self.smoothing_radius <= 0.0 {
            return Err(ConfigError::NonPositiveSmoothingRadius(self.smoothing_radius));
        }
        if self.world_size.x <= 0.0 || self.world_size.y <= 0.0 {
            return Err(ConfigError::NonPositiveWorldExtent {
                width: self.world_size.x,
                height: self.world_size.y,
            });
        }
        let cells = GridMetadata::required_cells(self.cell_size(), self.world_size);
        if !(cells <= MAX_GRID_CELLS as f64) {
            return Err(ConfigError::GridTooLarge {
                cells,
                max: MAX_GRID_CELLS,
            });
        }
        if self.max_particles == 0 {
            return Err(ConfigError::ZeroMaxParticles);
        }
        if self.max_particles >= NO_PARTICLE as usize {
            return Err(ConfigError::MaxParticlesTooLarge(self.max_particles));
        }
        if self.particle_mass <= 0.0 {
            return Err(ConfigError::NonPositiveMass(self.particle_mass));
        }
        if self.rest_density <= 0.0 {
            return Err(ConfigError::NonPositiveRestDensity(self.rest_density));
        }
        if self.time_step <= 0.0 {
            return Err(ConfigError::NonPositiveTimeStep(self.time_step));
        }
        if !(0.0..=1.0).contains(&self.wall_damping) {
            return Err(ConfigError::WallDampingOutOfRange(self.wall_damping));
        }

        Ok(())
    }
}

//! Time integration and world-boundary handling.
//!
//! The world is the rectangle `[0, width) x [0, height)`. Particles that leave
//! it are clamped back in and their normal velocity is reflected and scaled
//! by the wall damping.

use bevy::prelude::*;

use super::particle::Particle;
use super::solver::for_each_indexed;

/// Inset from the far walls. A particle clamped there stays strictly inside
/// the world and does not immediately re-trigger the opposite test.
pub const WALL_EPSILON: f32 = 1e-4;

/// Scale applied to `h / max_acceleration` for the adaptive time step.
pub const CFL_FACTOR: f32 = 0.4;

/// Rectangular world boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldBounds {
    /// Extent of the world; the minimum corner is the origin.
    pub size: Vec2,
    /// Fraction of the normal velocity kept on impact (0 = stop, 1 = elastic).
    pub wall_damping: f32,
}

impl WorldBounds {
    pub fn new(size: Vec2, wall_damping: f32) -> Self {
        Self { size, wall_damping }
    }

    /// Whether a point lies inside the world.
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= 0.0 && point.y >= 0.0 && point.x < self.size.x && point.y < self.size.y
    }

    /// Largest in-world position, the clamp target of the far walls.
    pub fn far_corner(&self) -> Vec2 {
        Vec2::new(far_wall_limit(self.size.x), far_wall_limit(self.size.y))
    }

    /// Clamps a particle back into the world, reflecting and damping the
    /// velocity component of each axis it crossed.
    #[inline]
    pub fn apply_collision(&self, position: &mut Vec2, velocity: &mut Vec2) {
        for axis in 0..2 {
            let extent = self.size[axis];
            if position[axis] < 0.0 {
                position[axis] = 0.0;
                velocity[axis] = -velocity[axis] * self.wall_damping;
            } else if position[axis] >= extent {
                position[axis] = far_wall_limit(extent);
                velocity[axis] = -velocity[axis] * self.wall_damping;
            }
        }
    }
}

/// Position a particle is clamped to at the far wall of an axis.
///
/// `extent - WALL_EPSILON`, or the largest float below `extent` once the
/// inset is lost to rounding (extents of 2048 and above), so the result
/// always lies strictly inside the world.
#[inline]
pub fn far_wall_limit(extent: f32) -> f32 {
    if extent <= 0.0 {
        return 0.0;
    }
    let below = f32::from_bits(extent.to_bits() - 1);
    (extent - WALL_EPSILON).min(below)
}

/// Advances one particle by `dt` with semi-implicit Euler, then applies the
/// walls and updates the smoothed velocity.
#[inline]
pub fn integrate_particle(particle: &mut Particle, bounds: &WorldBounds, dt: f32) {
    // Velocity first, then position with the new velocity.
    particle.velocity += particle.acceleration * dt;
    particle.position += particle.velocity * dt;

    bounds.apply_collision(&mut particle.position, &mut particle.velocity);

    particle.smoothed_velocity = (particle.smoothed_velocity + particle.velocity) * 0.5;
}

/// Advances every particle by `dt`.
pub fn integrate(particles: &mut [Particle], bounds: &WorldBounds, dt: f32) {
    for_each_indexed(particles, |_, particle| integrate_particle(particle, bounds, dt));
}

/// Largest acceleration magnitude in the store, 0 when empty.
pub fn max_acceleration(particles: &[Particle]) -> f32 {
    particles
        .iter()
        .map(|p| p.acceleration.length())
        .fold(0.0, f32::max)
}

/// CFL-style time step: `h / max_acceleration * 0.4`, or `fallback` when no
/// particle accelerates.
pub fn cfl_time_step(smoothing_radius: f32, max_acceleration: f32, fallback: f32) -> f32 {
    if max_acceleration > 0.0 && max_acceleration.is_finite() {
        smoothing_radius / max_acceleration * CFL_FACTOR
    } else {
        fallback
    }
}

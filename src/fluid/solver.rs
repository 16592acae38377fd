//! Density/pressure and force solvers.
//!
//! Both phases read the whole particle store and grid and write one output
//! per particle into a scratch buffer, which is copied back once the phase has
//! finished for every particle. No particle ever sees a neighbour's output of
//! the phase that is still running, which keeps the result independent of
//! evaluation order and lets the `parallel` feature split the work freely.

use bevy::prelude::*;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::kernels::SphKernels;
use super::params::SphParams;
use super::particle::Particle;
use super::spatial::SpatialHashGrid;

/// Squared distances below this are treated as the particle itself (or an
/// exactly coincident one) and skipped during neighbour sums.
pub const INF_EPSILON: f32 = 1e-12;

/// Densities below this floor are not divided by; the particle only feels
/// gravity for that step.
pub const MIN_DENSITY: f32 = 1e-6;

/// Everything a solver phase reads.
#[derive(Clone, Copy)]
pub struct SolverContext<'a> {
    pub particles: &'a [Particle],
    pub grid: &'a SpatialHashGrid,
    pub kernels: &'a SphKernels,
    pub params: &'a SphParams,
}

/// Runs `f` on every element of `items` with its index, across threads when
/// the `parallel` feature is enabled.
pub(crate) fn for_each_indexed<T, F>(items: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync + Send,
{
    #[cfg(feature = "parallel")]
    items.par_iter_mut().enumerate().for_each(|(i, item)| f(i, item));

    #[cfg(not(feature = "parallel"))]
    items.iter_mut().enumerate().for_each(|(i, item)| f(i, item));
}

/// Weakly compressible equation of state.
///
/// Negative pressure below rest density is kept; it pulls particles together.
#[inline]
pub fn equation_of_state(density: f32, rest_density: f32, stiffness: f32) -> f32 {
    stiffness * ((density / rest_density).powi(7) - 1.0)
}

/// Density and pressure of particle `i`.
pub fn density_pressure_at(ctx: &SolverContext, i: usize) -> (f32, f32) {
    let particle = &ctx.particles[i];
    let mass = ctx.params.particle_mass;
    let h_sq = ctx.kernels.radius_sq();

    let mut density = 0.0;
    ctx.grid
        .for_each_neighbor(ctx.particles, particle.position, |j| {
            let dist_sq = (ctx.particles[j].position - particle.position).length_squared();
            if dist_sq < INF_EPSILON || dist_sq >= h_sq {
                return;
            }
            density += mass * ctx.kernels.poly6(dist_sq);
        });

    // Self contribution, once.
    density += mass * ctx.kernels.poly6(0.0);

    let pressure = equation_of_state(density, ctx.params.rest_density, ctx.params.stiffness);
    (density, pressure)
}

/// Updates density and pressure of every particle.
pub fn compute_density_pressure(
    particles: &mut [Particle],
    scratch: &mut Vec<(f32, f32)>,
    grid: &SpatialHashGrid,
    kernels: &SphKernels,
    params: &SphParams,
) {
    scratch.clear();
    scratch.resize(particles.len(), (0.0, 0.0));

    let ctx = SolverContext {
        particles: &*particles,
        grid,
        kernels,
        params,
    };
    for_each_indexed(scratch, |i, out| *out = density_pressure_at(&ctx, i));

    for (particle, &(density, pressure)) in particles.iter_mut().zip(scratch.iter()) {
        particle.density = density;
        particle.pressure = pressure;
    }
}

/// Pressure term that particle `q` contributes to the acceleration sum of
/// particle `p`, before the final division by `p`'s density.
///
/// Uses the symmetric `(pressure_p + pressure_q)` form so the pair of
/// contributions is equal and opposite when the two densities match.
#[inline]
pub fn pressure_contribution(
    p: &Particle,
    q: &Particle,
    kernels: &SphKernels,
    mass: f32,
) -> Vec2 {
    let offset = p.position - q.position;
    let dist_sq = offset.length_squared();
    if dist_sq <= INF_EPSILON || dist_sq >= kernels.radius_sq() || p.density < MIN_DENSITY {
        return Vec2::ZERO;
    }
    let dist = dist_sq.sqrt();
    let volume = mass / p.density;
    let magnitude = volume * (p.pressure + q.pressure) * kernels.spiky_gradient_magnitude(dist);
    -offset / dist * magnitude
}

/// Viscosity term that particle `q` contributes to the acceleration sum of
/// particle `p`, driven by the smoothed velocity difference.
#[inline]
pub fn viscosity_contribution(
    p: &Particle,
    q: &Particle,
    kernels: &SphKernels,
    mass: f32,
    viscosity: f32,
) -> Vec2 {
    let dist_sq = (p.position - q.position).length_squared();
    if dist_sq <= INF_EPSILON || dist_sq >= kernels.radius_sq() || p.density < MIN_DENSITY {
        return Vec2::ZERO;
    }
    let dist = dist_sq.sqrt();
    let volume = mass / p.density;
    (q.smoothed_velocity - p.smoothed_velocity)
        * volume
        * viscosity
        * kernels.viscosity_laplacian(dist)
}

/// Acceleration of particle `i`: pressure, viscosity and gravity.
///
/// Falls back to gravity alone when the particle's density is below
/// [`MIN_DENSITY`].
pub fn acceleration_at(ctx: &SolverContext, i: usize) -> Vec2 {
    let particle = &ctx.particles[i];
    let gravity = ctx.params.gravity;

    if !(particle.density >= MIN_DENSITY) {
        return gravity;
    }

    let mass = ctx.params.particle_mass;
    let viscosity = ctx.params.viscosity;

    let mut accel = Vec2::ZERO;
    ctx.grid
        .for_each_neighbor(ctx.particles, particle.position, |j| {
            let neighbor = &ctx.particles[j];
            accel += pressure_contribution(particle, neighbor, ctx.kernels, mass);
            accel += viscosity_contribution(particle, neighbor, ctx.kernels, mass, viscosity);
        });

    accel / particle.density + gravity
}

/// Recomputes the acceleration of every particle from scratch.
pub fn compute_forces(
    particles: &mut [Particle],
    scratch: &mut Vec<Vec2>,
    grid: &SpatialHashGrid,
    kernels: &SphKernels,
    params: &SphParams,
) {
    scratch.clear();
    scratch.resize(particles.len(), Vec2::ZERO);

    let ctx = SolverContext {
        particles: &*particles,
        grid,
        kernels,
        params,
    };
    for_each_indexed(scratch, |i, out| *out = acceleration_at(&ctx, i));

    for (particle, &accel) in particles.iter_mut().zip(scratch.iter()) {
        particle.acceleration = accel;
    }
}

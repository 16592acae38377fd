//! Particle state, the fixed-capacity particle store and seeding helpers.

use bevy::prelude::*;

use super::error::SphError;

/// Sentinel index meaning "no particle": the end of a cell chain, or an
/// empty cell.
pub const NO_PARTICLE: u32 = u32::MAX;

/// State of one fluid particle.
///
/// Particles are created once and live for the whole run. Their cell-chain
/// link is an index into the particle store and is rewritten on every grid
/// rebuild.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    /// Running average of velocity, used only by the viscosity term.
    pub smoothed_velocity: Vec2,
    pub density: f32,
    pub pressure: f32,
    pub(crate) next: u32,
}

impl Particle {
    /// Creates a particle at the given state with density at rest.
    pub fn new(position: Vec2, velocity: Vec2, rest_density: f32) -> Self {
        Self {
            position,
            velocity,
            acceleration: Vec2::ZERO,
            smoothed_velocity: velocity,
            density: rest_density,
            pressure: 0.0,
            next: NO_PARTICLE,
        }
    }

    /// Next particle in the same grid cell, as of the last rebuild.
    pub fn next_in_cell(&self) -> Option<usize> {
        (self.next != NO_PARTICLE).then_some(self.next as usize)
    }
}

/// Fixed-capacity particle array.
///
/// Storage is allocated once at the configured capacity and never grows past
/// it, so indices stay valid for the whole run.
#[derive(Clone, Debug, Default)]
pub struct ParticleStore {
    particles: Vec<Particle>,
    capacity: usize,
}

impl ParticleStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots left before the store is full.
    pub fn available(&self) -> usize {
        self.capacity - self.particles.len()
    }

    /// Fails without modifying the store unless `count` more particles fit.
    pub fn reserve_check(&self, count: usize) -> Result<(), SphError> {
        if count > self.available() {
            return Err(SphError::CapacityExceeded {
                requested: count,
                available: self.available(),
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Appends a particle, returning its index.
    pub fn push(&mut self, particle: Particle) -> Result<usize, SphError> {
        self.reserve_check(1)?;
        self.particles.push(particle);
        Ok(self.particles.len() - 1)
    }

    /// Appends every particle or none of them.
    pub fn extend(&mut self, particles: &[Particle]) -> Result<(), SphError> {
        self.reserve_check(particles.len())?;
        self.particles.extend_from_slice(particles);
        Ok(())
    }

    /// Changes the capacity. Fails if the live particles would not fit.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), SphError> {
        if capacity < self.particles.len() {
            return Err(SphError::CapacityExceeded {
                requested: self.particles.len(),
                available: capacity,
                capacity,
            });
        }
        self.particles
            .reserve_exact(capacity.saturating_sub(self.particles.len()));
        self.capacity = capacity;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }

    pub fn as_mut_slice(&mut self) -> &mut [Particle] {
        &mut self.particles
    }
}

/// Axis-aligned rectangle to fill with particles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeedRegion {
    pub min: Vec2,
    pub max: Vec2,
}

impl SeedRegion {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Tall block of fluid in the middle of the world: `x` in `[0.3, 0.7]`
    /// and `y` in `[0.3, 0.9]` of the world extent.
    pub fn dam_break(world_size: Vec2) -> Self {
        Self {
            min: world_size * Vec2::new(0.3, 0.3),
            max: world_size * Vec2::new(0.7, 0.9),
        }
    }

    /// Number of lattice points [`lattice`](Self::lattice) yields, or `None`
    /// when the count does not fit in `usize`. Allocates nothing.
    pub fn lattice_len(&self, spacing: f32) -> Option<usize> {
        let (columns, rows) = self.lattice_dims(spacing)?;
        columns.checked_mul(rows)
    }

    /// Lattice positions covering the region, column by column.
    ///
    /// Positions are `min + (i, j) * spacing` so the pattern is independent of
    /// floating-point accumulation and identical across runs. Both edges are
    /// included when the extent is a whole number of spacings. Yields nothing
    /// when [`lattice_len`](Self::lattice_len) overflows.
    pub fn lattice(&self, spacing: f32) -> impl Iterator<Item = Vec2> {
        let (columns, rows) = self
            .lattice_dims(spacing)
            .filter(|&(columns, rows)| columns.checked_mul(rows).is_some())
            .unwrap_or((0, 0));
        let min = self.min;
        (0..columns).flat_map(move |i| {
            (0..rows).map(move |j| min + Vec2::new(i as f32, j as f32) * spacing)
        })
    }

    fn lattice_dims(&self, spacing: f32) -> Option<(usize, usize)> {
        let columns = lattice_count(self.min.x, self.max.x, spacing)?;
        let rows = lattice_count(self.min.y, self.max.y, spacing)?;
        Some((columns, rows))
    }
}

fn lattice_count(min: f32, max: f32, spacing: f32) -> Option<usize> {
    if max < min {
        return Some(0);
    }
    // Small slack so an exact multiple is not lost to rounding. The cast
    // saturates, so an oversized or infinite count fails the add.
    let steps = ((max - min) / spacing + 1e-4).floor() as usize;
    steps.checked_add(1)
}

/// GPU vertex layout of one particle.
///
/// Attribute order matches the point-sprite vertex stream: position,
/// velocity, acceleration, smoothed velocity, density, pressure.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuParticle {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub acceleration: [f32; 2],
    pub smoothed_velocity: [f32; 2],
    pub density: f32,
    pub pressure: f32,
}

impl From<&Particle> for GpuParticle {
    fn from(p: &Particle) -> Self {
        Self {
            position: p.position.to_array(),
            velocity: p.velocity.to_array(),
            acceleration: p.acceleration.to_array(),
            smoothed_velocity: p.smoothed_velocity.to_array(),
            density: p.density,
            pressure: p.pressure,
        }
    }
}

/// Read-only view of the particle store between two steps.
///
/// The borrow ends before the next `step`, so a renderer can never observe a
/// half-updated array.
#[derive(Clone, Copy, Debug)]
pub struct ParticleSnapshot<'a> {
    particles: &'a [Particle],
}

impl<'a> ParticleSnapshot<'a> {
    pub(crate) fn new(particles: &'a [Particle]) -> Self {
        Self { particles }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a Particle> {
        self.particles.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'a, Particle> {
        self.particles.iter()
    }

    pub fn as_slice(&self) -> &'a [Particle] {
        self.particles
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec2> + 'a {
        self.particles.iter().map(|p| p.position)
    }

    /// Copies the snapshot into the GPU vertex layout.
    /// Use `bytemuck::cast_slice` on the result for a raw upload buffer.
    pub fn to_gpu(&self) -> Vec<GpuParticle> {
        self.particles.iter().map(GpuParticle::from).collect()
    }
}

impl<'a> IntoIterator for ParticleSnapshot<'a> {
    type Item = &'a Particle;
    type IntoIter = std::slice::Iter<'a, Particle>;

    fn into_iter(self) -> Self::IntoIter {
        self.particles.iter()
    }
}

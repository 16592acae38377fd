//! Simulation driver.
//!
//! [`SphSimulation`] owns the particle store and the grid and runs the fixed
//! per-step sequence: grid rebuild, density/pressure, forces, integration.
//! Hosts only read it between steps through [`SphSimulation::particle_snapshot`].

use bevy::log::{debug, info, trace, warn};
use bevy::prelude::*;

use super::boundary::{cfl_time_step, integrate, max_acceleration, WorldBounds};
use super::error::{ConfigError, SphError};
use super::kernels::SphKernels;
use super::params::SphParams;
use super::particle::{Particle, ParticleSnapshot, ParticleStore, SeedRegion};
use super::solver::{compute_density_pressure, compute_forces};
use super::spatial::{GridMetadata, SpatialHashGrid};

/// Lifecycle of a simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SimulationPhase {
    /// Configured, but holds no particles yet.
    #[default]
    Uninitialized,
    /// Particles are populated; no step has run.
    Seeded,
    /// At least one step has run.
    Stepping,
}

/// Counters and diagnostics updated by every step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimulationStats {
    /// Number of completed steps.
    pub steps: u64,
    /// Simulated time advanced so far.
    pub elapsed: f64,
    /// Time step used by the last step.
    pub last_time_step: f32,
    /// CFL time step suggested by the accelerations the last step started from.
    /// Only applied when adaptive stepping is enabled.
    pub cfl_time_step: f32,
    /// Particles that fell outside the grid during the last rebuild.
    pub particles_outside_grid: usize,
}

/// A 2D SPH simulation instance.
///
/// Instances share no state; any number can run side by side.
#[derive(Resource, Clone, Debug)]
pub struct SphSimulation {
    params: SphParams,
    kernels: SphKernels,
    bounds: WorldBounds,
    grid: SpatialHashGrid,
    particles: ParticleStore,
    phase: SimulationPhase,
    stats: SimulationStats,
    density_scratch: Vec<(f32, f32)>,
    accel_scratch: Vec<Vec2>,
}

impl SphSimulation {
    /// Validates the parameters and allocates an empty simulation.
    pub fn new(params: SphParams) -> Result<Self, ConfigError> {
        params.validate()?;

        let metadata = params.grid_metadata();
        info!(
            "SPH simulation initialized: {} x {} cells ({} total, cell size {}), capacity {} particles",
            metadata.grid_width,
            metadata.grid_height,
            metadata.total_cells,
            metadata.cell_size,
            params.max_particles,
        );

        Ok(Self {
            kernels: SphKernels::new(params.smoothing_radius),
            bounds: WorldBounds::new(params.world_size, params.wall_damping),
            grid: SpatialHashGrid::new(metadata),
            particles: ParticleStore::with_capacity(params.max_particles),
            phase: SimulationPhase::Uninitialized,
            stats: SimulationStats::default(),
            density_scratch: Vec::with_capacity(params.max_particles),
            accel_scratch: Vec::with_capacity(params.max_particles),
            params,
        })
    }

    /// Fills `region` with particles at rest on a square lattice.
    ///
    /// The lattice size is checked against free capacity before any position
    /// is generated, and every position is checked against the world before
    /// anything is written. A rejected seed adds nothing. Returns the number
    /// of particles added.
    pub fn seed(&mut self, region: SeedRegion, spacing: f32) -> Result<usize, SphError> {
        if !(spacing > 0.0 && spacing.is_finite()) {
            return Err(SphError::InvalidSpacing(spacing));
        }

        let admitted = match region.lattice_len(spacing) {
            Some(count) => self.particles.reserve_check(count).map(|()| count),
            None => Err(SphError::CapacityExceeded {
                requested: usize::MAX,
                available: self.particles.available(),
                capacity: self.particles.capacity(),
            }),
        };
        let count = admitted.inspect_err(|err| warn!("rejected seeding: {err}"))?;

        let rest_density = self.params.rest_density;
        let mut seeded = Vec::with_capacity(count);
        for position in region.lattice(spacing) {
            if !self.bounds.contains(position) {
                return Err(SphError::OutsideWorld {
                    x: position.x,
                    y: position.y,
                });
            }
            seeded.push(Particle::new(position, Vec2::ZERO, rest_density));
        }

        self.particles.extend(&seeded)?;

        if !seeded.is_empty() && self.phase == SimulationPhase::Uninitialized {
            self.phase = SimulationPhase::Seeded;
        }

        info!(
            "seeded {} particles ({} total)",
            seeded.len(),
            self.particles.len()
        );
        Ok(seeded.len())
    }

    /// Seeds the default dam-break block with a spacing of `0.6 h`.
    pub fn seed_dam_break(&mut self) -> Result<usize, SphError> {
        let region = SeedRegion::dam_break(self.params.world_size);
        self.seed(region, self.params.smoothing_radius * 0.6)
    }

    /// Injects a single particle, returning its index.
    pub fn add_particle(&mut self, position: Vec2, velocity: Vec2) -> Result<usize, SphError> {
        if !self.bounds.contains(position) {
            return Err(SphError::OutsideWorld {
                x: position.x,
                y: position.y,
            });
        }

        let particle = Particle::new(position, velocity, self.params.rest_density);
        let index = self.particles.push(particle).inspect_err(|err| {
            warn!("rejected particle injection: {err}");
        })?;

        if self.phase == SimulationPhase::Uninitialized {
            self.phase = SimulationPhase::Seeded;
        }
        Ok(index)
    }

    /// Advances the simulation by exactly one time step.
    ///
    /// Does nothing while no particles exist.
    pub fn step(&mut self) {
        if self.particles.is_empty() {
            trace!("step skipped: no particles");
            return;
        }

        // From the accelerations of the previous step.
        let cfl = cfl_time_step(
            self.params.smoothing_radius,
            max_acceleration(self.particles.as_slice()),
            self.params.time_step,
        );
        let dt = if self.params.adaptive_time_step {
            cfl
        } else {
            self.params.time_step
        };

        let outside = self.grid.rebuild(self.particles.as_mut_slice());
        if outside > 0 && outside != self.stats.particles_outside_grid {
            warn!("{outside} particles lie outside the grid and are skipped by neighbor search");
        }

        compute_density_pressure(
            self.particles.as_mut_slice(),
            &mut self.density_scratch,
            &self.grid,
            &self.kernels,
            &self.params,
        );
        compute_forces(
            self.particles.as_mut_slice(),
            &mut self.accel_scratch,
            &self.grid,
            &self.kernels,
            &self.params,
        );
        integrate(self.particles.as_mut_slice(), &self.bounds, dt);

        self.stats.steps += 1;
        self.stats.elapsed += dt as f64;
        self.stats.last_time_step = dt;
        self.stats.cfl_time_step = cfl;
        self.stats.particles_outside_grid = outside;
        self.phase = SimulationPhase::Stepping;

        trace!(step = self.stats.steps, dt, cfl, "SPH step");
    }

    /// Runs `count` steps.
    pub fn step_n(&mut self, count: usize) {
        for _ in 0..count {
            self.step();
        }
    }

    /// Replaces the parameters, keeping the particles.
    ///
    /// Grid metadata, kernels and bounds are recomputed. Particles outside a
    /// shrunken world are moved onto its edge. Fails without change when the
    /// parameters are invalid or the new capacity is below the particle count.
    pub fn reconfigure(&mut self, params: SphParams) -> Result<(), SphError> {
        params.validate()?;
        self.particles.set_capacity(params.max_particles)?;

        let metadata = params.grid_metadata();
        self.kernels = SphKernels::new(params.smoothing_radius);
        self.bounds = WorldBounds::new(params.world_size, params.wall_damping);
        self.grid.reconfigure(metadata);

        let far_corner = self.bounds.far_corner();
        for particle in self.particles.as_mut_slice() {
            particle.position = particle.position.clamp(Vec2::ZERO, far_corner);
        }

        debug!(
            "SPH simulation reconfigured: {} x {} cells, cell size {}",
            metadata.grid_width, metadata.grid_height, metadata.cell_size,
        );
        self.params = params;
        Ok(())
    }

    /// Removes every particle and resets the counters.
    pub fn clear(&mut self) {
        self.particles.clear();
        self.grid.reconfigure(self.grid.metadata());
        self.stats = SimulationStats::default();
        self.phase = SimulationPhase::Uninitialized;
    }

    /// Read-only view of every particle, valid until the next mutation.
    pub fn particle_snapshot(&self) -> ParticleSnapshot<'_> {
        ParticleSnapshot::new(self.particles.as_slice())
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn capacity(&self) -> usize {
        self.particles.capacity()
    }

    pub fn grid_metadata(&self) -> GridMetadata {
        self.grid.metadata()
    }

    /// Head particle index of every cell as of the last step.
    pub fn cell_heads(&self) -> &[u32] {
        self.grid.heads()
    }

    pub fn params(&self) -> &SphParams {
        &self.params
    }

    pub fn kernels(&self) -> &SphKernels {
        &self.kernels
    }

    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    pub fn stats(&self) -> SimulationStats {
        self.stats
    }

    /// Time step the next call to [`step`](Self::step) will use.
    pub fn next_time_step(&self) -> f32 {
        if self.params.adaptive_time_step {
            cfl_time_step(
                self.params.smoothing_radius,
                max_acceleration(self.particles.as_slice()),
                self.params.time_step,
            )
        } else {
            self.params.time_step
        }
    }

    /// Fastest particle speed.
    pub fn max_speed(&self) -> f32 {
        self.particles
            .as_slice()
            .iter()
            .map(|p| p.velocity.length())
            .fold(0.0, f32::max)
    }

    /// Mean particle density, 0 when empty.
    pub fn average_density(&self) -> f32 {
        let particles = self.particles.as_slice();
        if particles.is_empty() {
            return 0.0;
        }
        particles.iter().map(|p| p.density).sum::<f32>() / particles.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> SphParams {
        SphParams::default()
            .with_world_size(Vec2::splat(1.0))
            .with_max_particles(500)
    }

    #[test]
    fn test_new_rejects_invalid_params() {
        let err = SphSimulation::new(SphParams::default().with_smoothing_radius(-1.0)).unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveSmoothingRadius(-1.0));
    }

    #[test]
    fn test_new_rejects_oversized_grid_without_allocating() {
        let err = SphSimulation::new(SphParams::default().with_smoothing_radius(1e-6)).unwrap_err();
        assert!(matches!(err, ConfigError::GridTooLarge { .. }));
    }

    #[test]
    fn test_new_simulation_is_empty() {
        let sim = SphSimulation::new(SphParams::default()).unwrap();
        assert_eq!(sim.particle_count(), 0);
        assert_eq!(sim.capacity(), 10_000);
        assert_eq!(sim.phase(), SimulationPhase::Uninitialized);
        assert_eq!(sim.cell_heads().len(), sim.grid_metadata().total_cells);
    }

    #[test]
    fn test_seed_transitions_to_seeded() {
        let mut sim = SphSimulation::new(small_params()).unwrap();
        let added = sim
            .seed(SeedRegion::new(Vec2::splat(0.2), Vec2::splat(0.4)), 0.05)
            .unwrap();

        assert_eq!(added, 25);
        assert_eq!(sim.particle_count(), 25);
        assert_eq!(sim.phase(), SimulationPhase::Seeded);

        for p in sim.particle_snapshot() {
            assert_eq!(p.velocity, Vec2::ZERO);
            assert_eq!(p.density, sim.params().rest_density);
        }
    }

    #[test]
    fn test_seed_over_capacity_is_rejected_unchanged() {
        let mut sim = SphSimulation::new(small_params().with_max_particles(10)).unwrap();
        sim.add_particle(Vec2::splat(0.5), Vec2::ZERO).unwrap();

        let err = sim
            .seed(SeedRegion::new(Vec2::splat(0.1), Vec2::splat(0.3)), 0.05)
            .unwrap_err();

        assert_eq!(
            err,
            SphError::CapacityExceeded {
                requested: 25,
                available: 9,
                capacity: 10,
            }
        );
        assert_eq!(sim.particle_count(), 1);
    }

    #[test]
    fn test_dense_seed_is_rejected_before_generating_positions() {
        let mut sim = SphSimulation::new(SphParams::default()).unwrap();

        let err = sim
            .seed(SeedRegion::new(Vec2::splat(1.0), Vec2::splat(2.0)), 1e-6)
            .unwrap_err();
        assert!(matches!(
            err,
            SphError::CapacityExceeded {
                available: 10_000,
                capacity: 10_000,
                ..
            }
        ));

        let err = sim
            .seed(SeedRegion::new(Vec2::splat(1.0), Vec2::splat(2.0)), f32::MIN_POSITIVE)
            .unwrap_err();
        assert!(matches!(
            err,
            SphError::CapacityExceeded {
                requested: usize::MAX,
                ..
            }
        ));

        assert_eq!(sim.particle_count(), 0);
        assert_eq!(sim.phase(), SimulationPhase::Uninitialized);
    }

    #[test]
    fn test_seed_outside_world_is_rejected() {
        let mut sim = SphSimulation::new(small_params()).unwrap();
        let err = sim
            .seed(SeedRegion::new(Vec2::splat(0.9), Vec2::splat(1.2)), 0.1)
            .unwrap_err();
        assert!(matches!(err, SphError::OutsideWorld { .. }));
        assert_eq!(sim.particle_count(), 0);
        assert_eq!(sim.phase(), SimulationPhase::Uninitialized);
    }

    #[test]
    fn test_seed_rejects_bad_spacing() {
        let mut sim = SphSimulation::new(small_params()).unwrap();
        let region = SeedRegion::new(Vec2::splat(0.1), Vec2::splat(0.3));
        assert_eq!(sim.seed(region, 0.0), Err(SphError::InvalidSpacing(0.0)));
        assert!(sim.seed(region, f32::NAN).is_err());
    }

    #[test]
    fn test_dam_break_fits_default_capacity() {
        let mut sim = SphSimulation::new(SphParams::default()).unwrap();
        let added = sim.seed_dam_break().unwrap();
        assert!(added > 5_000);
        assert!(added <= sim.capacity());
    }

    #[test]
    fn test_add_particle_checks_world_and_capacity() {
        let mut sim = SphSimulation::new(small_params().with_max_particles(1)).unwrap();

        assert!(matches!(
            sim.add_particle(Vec2::new(1.5, 0.5), Vec2::ZERO),
            Err(SphError::OutsideWorld { .. })
        ));
        assert_eq!(sim.add_particle(Vec2::splat(0.5), Vec2::X), Ok(0));
        assert!(matches!(
            sim.add_particle(Vec2::splat(0.6), Vec2::ZERO),
            Err(SphError::CapacityExceeded { .. })
        ));

        let p = sim.particle_snapshot().get(0).copied().unwrap();
        assert_eq!(p.smoothed_velocity, Vec2::X);
    }

    #[test]
    fn test_step_without_particles_is_a_no_op() {
        let mut sim = SphSimulation::new(small_params()).unwrap();
        sim.step();
        assert_eq!(sim.stats().steps, 0);
        assert_eq!(sim.phase(), SimulationPhase::Uninitialized);
    }

    #[test]
    fn test_step_advances_exactly_one_time_step() {
        let mut sim = SphSimulation::new(small_params()).unwrap();
        sim.add_particle(Vec2::splat(0.5), Vec2::ZERO).unwrap();

        sim.step();
        assert_eq!(sim.phase(), SimulationPhase::Stepping);
        assert_eq!(sim.stats().steps, 1);
        assert_eq!(sim.stats().last_time_step, 0.002);

        sim.step_n(4);
        assert_eq!(sim.stats().steps, 5);
        assert!((sim.stats().elapsed - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_lone_particle_falls_under_gravity() {
        let mut sim = SphSimulation::new(small_params()).unwrap();
        sim.add_particle(Vec2::splat(0.5), Vec2::ZERO).unwrap();
        sim.step();

        let p = sim.particle_snapshot().get(0).copied().unwrap();
        let dt = sim.params().time_step;
        let gravity = sim.params().gravity;
        assert_eq!(p.acceleration, gravity);
        assert!((p.velocity - gravity * dt).length() < 1e-7);
        assert!(p.position.y < 0.5);
    }

    #[test]
    fn test_adaptive_step_uses_previous_accelerations() {
        let params = small_params().with_adaptive_time_step(true);
        let mut sim = SphSimulation::new(params.clone()).unwrap();
        sim.add_particle(Vec2::splat(0.5), Vec2::ZERO).unwrap();

        // No accelerations yet: fallback step.
        assert_eq!(sim.next_time_step(), params.time_step);
        sim.step();
        assert_eq!(sim.stats().last_time_step, params.time_step);

        // Lone particle accelerates at |g|.
        let expected = params.smoothing_radius / params.gravity.length() * 0.4;
        assert!((sim.next_time_step() - expected).abs() < 1e-7);
        sim.step();
        assert!((sim.stats().last_time_step - expected).abs() < 1e-7);
    }

    #[test]
    fn test_cfl_is_informational_when_fixed() {
        let mut sim = SphSimulation::new(small_params()).unwrap();
        sim.add_particle(Vec2::splat(0.5), Vec2::ZERO).unwrap();
        sim.step();
        sim.step();
        assert_eq!(sim.stats().last_time_step, 0.002);
        assert!(sim.stats().cfl_time_step > 0.002);
    }

    #[test]
    fn test_reconfigure_recomputes_grid() {
        let mut sim = SphSimulation::new(small_params()).unwrap();
        sim.add_particle(Vec2::splat(0.9), Vec2::ZERO).unwrap();

        sim.reconfigure(small_params().with_smoothing_radius(0.1).with_world_size(Vec2::splat(0.5)))
            .unwrap();

        let meta = sim.grid_metadata();
        assert_eq!(meta.cell_size, 0.1);
        assert_eq!(meta.grid_width, 5);
        assert_eq!(sim.cell_heads().len(), 25);

        let p = sim.particle_snapshot().get(0).copied().unwrap();
        assert!(p.position.x < 0.5 && p.position.y < 0.5);
    }

    #[test]
    fn test_reconfigure_rejects_shrinking_below_count() {
        let mut sim = SphSimulation::new(small_params()).unwrap();
        sim.seed(SeedRegion::new(Vec2::splat(0.2), Vec2::splat(0.4)), 0.05)
            .unwrap();

        let before = sim.params().clone();
        assert!(sim.reconfigure(small_params().with_max_particles(5)).is_err());
        assert!(sim.reconfigure(small_params().with_smoothing_radius(0.0)).is_err());
        assert_eq!(sim.params(), &before);
        assert_eq!(sim.capacity(), 500);
    }

    #[test]
    fn test_clear_returns_to_uninitialized() {
        let mut sim = SphSimulation::new(small_params()).unwrap();
        sim.add_particle(Vec2::splat(0.5), Vec2::ZERO).unwrap();
        sim.step();
        sim.clear();

        assert_eq!(sim.particle_count(), 0);
        assert_eq!(sim.phase(), SimulationPhase::Uninitialized);
        assert_eq!(sim.stats(), SimulationStats::default());
        assert_eq!(sim.average_density(), 0.0);
    }

    #[test]
    fn test_independent_instances() {
        let mut a = SphSimulation::new(small_params()).unwrap();
        let b = SphSimulation::new(small_params()).unwrap();
        a.add_particle(Vec2::splat(0.5), Vec2::ZERO).unwrap();
        a.step();

        assert_eq!(a.particle_count(), 1);
        assert_eq!(b.particle_count(), 0);
        assert_eq!(b.stats().steps, 0);
    }
}

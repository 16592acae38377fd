//! Bevy plugin for the SPH simulation.

use bevy::log::error;
use bevy::prelude::*;

use super::params::SphParams;
use super::particle::SeedRegion;
use super::simulation::SphSimulation;

/// Plugin that inserts an [`SphSimulation`] resource and steps it once per
/// `FixedUpdate` tick.
///
/// # Example
///
/// ```rust,ignore
/// use bevy::prelude::*;
/// use sph2d::prelude::*;
///
/// fn main() {
///     App::new()
///         .add_plugins(MinimalPlugins)
///         .add_plugins(SphPlugin::new(SphParams::water()).with_dam_break())
///         .run();
/// }
/// ```
#[derive(Clone, Debug, Default)]
pub struct SphPlugin {
    pub params: SphParams,
    /// Region filled at startup with a lattice of spacing `0.6 h`.
    pub seed: Option<SeedRegion>,
}

impl SphPlugin {
    pub fn new(params: SphParams) -> Self {
        Self { params, seed: None }
    }

    pub fn with_seed(mut self, region: SeedRegion) -> Self {
        self.seed = Some(region);
        self
    }

    /// Seeds the dam-break block of the configured world.
    pub fn with_dam_break(self) -> Self {
        let region = SeedRegion::dam_break(self.params.world_size);
        self.with_seed(region)
    }
}

impl Plugin for SphPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<SphParams>();

        let mut simulation = match SphSimulation::new(self.params.clone()) {
            Ok(simulation) => simulation,
            Err(err) => {
                error!("SPH plugin disabled: {err}");
                return;
            }
        };

        if let Some(region) = self.seed {
            let spacing = self.params.smoothing_radius * 0.6;
            if let Err(err) = simulation.seed(region, spacing) {
                error!("SPH startup seeding failed: {err}");
            }
        }

        app.insert_resource(simulation)
            .add_systems(FixedUpdate, step_simulation);
    }
}

/// Advances the simulation by one step.
fn step_simulation(mut simulation: ResMut<SphSimulation>) {
    simulation.step();
}

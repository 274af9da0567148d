// ============================================================================
// config.rs - physarum
// Simulation configuration contract: field/agent sizing, per-species
// behavior, per-tick step parameters, validation, JSON loading.
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Species count is encoded as a 3-channel mask on each agent, so at most
/// three species can coexist.
pub const MAX_SPECIES: usize = 3;

/// How the agent population is laid out at initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpawnMode {
    /// Uniformly random positions and headings over the whole field.
    #[default]
    Random,
    /// Every agent at the field center, random heading.
    Point,
    /// Random positions in a disc around the center, heading inward.
    InwardCircle,
    /// Random positions in a disc around the center, random heading.
    RandomCircle,
}

/// Per-species movement, sensing, deposit and color behavior.
///
/// The list of these is re-uploaded on every tick so a host can hot-edit
/// them while the simulation runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeciesSettings {
    /// Cells per second along the current heading.
    pub move_speed: f32,
    /// Steering rate in revolutions per second.
    pub turn_speed: f32,
    /// Angle between the forward sensor and each side sensor, degrees.
    pub sensor_angle_degrees: f32,
    /// Distance from the agent to its sensor centers, in cells.
    pub sensor_offset: f32,
    /// Sensor window half-extent; each sensor sums a (2n+1)^2 cell window.
    pub sensor_size: u32,
    /// Multiplier on the global trail weight for this species' deposits.
    pub deposit_strength: f32,
    /// Display color, RGBA in [0,1].
    pub color: [f32; 4],
}

impl Default for SpeciesSettings {
    fn default() -> Self {
        Self {
            move_speed: 30.0,
            turn_speed: 2.0,
            sensor_angle_degrees: 30.0,
            sensor_offset: 9.0,
            sensor_size: 1,
            deposit_strength: 1.0,
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

/// Scalar parameters consumed by every tick. Split out from
/// `SimulationConfig` so hosts inject them explicitly per tick instead of
/// mutating shared state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepParams {
    /// Simulated seconds advanced per tick.
    pub delta_time: f32,
    /// Trail intensity deposited per agent per simulated second.
    pub trail_weight: f32,
    /// Fraction of a cell's intensity lost per simulated second.
    pub decay_rate: f32,
    /// Blend factor per simulated second toward the 3x3 neighborhood mean.
    pub diffuse_rate: f32,
}

impl Default for StepParams {
    fn default() -> Self {
        Self {
            delta_time: 0.02,
            trail_weight: 60.0,
            decay_rate: 0.25,
            diffuse_rate: 20.0,
        }
    }
}

/// Everything needed to initialize a simulation instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub width: u32,
    pub height: u32,
    pub num_agents: u32,
    /// Parameter maps and the color map are allocated at
    /// `width / subsampling x height / subsampling`.
    pub parameter_map_subsampling: u32,
    /// Ticks advanced per rendered frame.
    pub steps_per_frame: u32,
    pub spawn_mode: SpawnMode,
    /// RNG seed for agent spawning; `None` seeds from the OS.
    pub seed: Option<u64>,
    pub step: StepParams,
    pub species: Vec<SpeciesSettings>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            num_agents: 100_000,
            parameter_map_subsampling: 4,
            steps_per_frame: 1,
            spawn_mode: SpawnMode::Random,
            seed: None,
            step: StepParams::default(),
            species: vec![SpeciesSettings::default()],
        }
    }
}

impl SimulationConfig {
    /// Rejects configurations the simulation cannot represent. Called before
    /// any GPU allocation so bad configs never leave partial state behind.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.width == 0 {
            return Err(invalid("width must be positive"));
        }
        if self.height == 0 {
            return Err(invalid("height must be positive"));
        }
        if self.num_agents == 0 {
            return Err(invalid("num_agents must be positive"));
        }
        if self.parameter_map_subsampling == 0 {
            return Err(invalid("parameter_map_subsampling must be positive"));
        }
        if self.steps_per_frame == 0 {
            return Err(invalid("steps_per_frame must be positive"));
        }
        if self.species.is_empty() || self.species.len() > MAX_SPECIES {
            return Err(invalid(&format!(
                "species count must be 1..={}, got {}",
                MAX_SPECIES,
                self.species.len()
            )));
        }
        validate_step(&self.step)?;
        Ok(())
    }

    /// Sub-sampled dimensions of the parameter and color maps.
    pub fn parameter_map_size(&self) -> (u32, u32) {
        (
            (self.width / self.parameter_map_subsampling).max(1),
            (self.height / self.parameter_map_subsampling).max(1),
        )
    }

    pub fn load(path: &str) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| invalid(&format!("cannot read config {path}: {e}")))?;
        let config: SimulationConfig = serde_json::from_str(&text)
            .map_err(|e| invalid(&format!("cannot parse config {path}: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

/// Per-tick species/scalar inputs are validated on every tick since hosts
/// may hot-edit them between ticks.
pub fn validate_step(step: &StepParams) -> Result<(), SimError> {
    if !(step.delta_time > 0.0) {
        return Err(invalid("delta_time must be positive"));
    }
    for (name, value) in [
        ("trail_weight", step.trail_weight),
        ("decay_rate", step.decay_rate),
        ("diffuse_rate", step.diffuse_rate),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(&format!("{name} must be finite and non-negative")));
        }
    }
    Ok(())
}

fn invalid(msg: &str) -> SimError {
    SimError::InvalidConfiguration(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_dimensions() {
        let mut config = SimulationConfig::default();
        config.width = 0;
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidConfiguration(_))
        ));

        let mut config = SimulationConfig::default();
        config.height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_agents_and_subsampling() {
        let mut config = SimulationConfig::default();
        config.num_agents = 0;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.parameter_map_subsampling = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_species_counts() {
        let mut config = SimulationConfig::default();
        config.species.clear();
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.species = vec![SpeciesSettings::default(); 4];
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.species = vec![SpeciesSettings::default(); 3];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_delta_time() {
        let mut config = SimulationConfig::default();
        config.step.delta_time = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parameter_map_size_never_hits_zero() {
        let mut config = SimulationConfig::default();
        config.width = 3;
        config.height = 3;
        config.parameter_map_subsampling = 8;
        assert_eq!(config.parameter_map_size(), (1, 1));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = SimulationConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        let back: SimulationConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.species, config.species);
        assert_eq!(back.step, config.step);
        assert_eq!(back.width, config.width);
    }
}

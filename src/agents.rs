// ============================================================================
// agents.rs - physarum
// Agent records in shader-friendly form and CPU-side population spawning.
// ============================================================================

use bytemuck::{Pod, Zeroable};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{SimulationConfig, SpawnMode};

pub const AGENT_WORKGROUP_SIZE: u32 = 64;

/// One simulated agent, laid out to match the WGSL `Agent` struct
/// (48 bytes, vec4-aligned).
///
/// `species_mask` selects which trail channels this agent deposits into and
/// is attracted by. With a single configured species the mask is broadcast
/// (1,1,1,0); with two or three species exactly one of the first three
/// entries is 1 and it matches `species_index`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Agent {
    pub position: [f32; 2],
    /// Heading in radians.
    pub angle: f32,
    /// Simulated seconds since spawn.
    pub age: f32,
    pub species_mask: [f32; 4],
    pub species_index: u32,
    pub _pad: [u32; 3],
}

impl Agent {
    fn new(position: [f32; 2], angle: f32, species_index: u32, num_species: usize) -> Self {
        let mut mask = [0.0f32; 4];
        if num_species == 1 {
            mask[0] = 1.0;
            mask[1] = 1.0;
            mask[2] = 1.0;
        } else {
            mask[species_index as usize] = 1.0;
        }
        Self {
            position,
            angle,
            age: 0.0,
            species_mask: mask,
            species_index,
            _pad: [0; 3],
        }
    }
}

/// Builds the initial agent population for `config`. Positions always land
/// inside `[0, width) x [0, height)`, headings in `[0, 2pi)`, and species are
/// assigned uniformly at random among the configured species.
pub fn spawn_agents(config: &SimulationConfig) -> Vec<Agent> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let width = config.width as f32;
    let height = config.height as f32;
    let center = [width * 0.5, height * 0.5];
    let radius = width.min(height) * 0.45;
    let num_species = config.species.len();

    (0..config.num_agents)
        .map(|_| {
            let random_angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let (position, angle) = match config.spawn_mode {
                SpawnMode::Random => (
                    [rng.gen_range(0.0..width), rng.gen_range(0.0..height)],
                    random_angle,
                ),
                SpawnMode::Point => (center, random_angle),
                SpawnMode::InwardCircle => {
                    let position = random_in_disc(&mut rng, center, radius);
                    let inward = (center[1] - position[1])
                        .atan2(center[0] - position[0])
                        .rem_euclid(std::f32::consts::TAU);
                    (position, inward)
                }
                SpawnMode::RandomCircle => {
                    (random_in_disc(&mut rng, center, radius), random_angle)
                }
            };

            let species_index = rng.gen_range(0..num_species) as u32;
            Agent::new(position, angle, species_index, num_species)
        })
        .collect()
}

/// Uniform sample inside a disc; sqrt on the radius keeps the density flat.
fn random_in_disc(rng: &mut StdRng, center: [f32; 2], radius: f32) -> [f32; 2] {
    let theta = rng.gen_range(0.0..std::f32::consts::TAU);
    let r = radius * rng.gen_range(0.0f32..1.0).sqrt();
    [center[0] + r * theta.cos(), center[1] + r * theta.sin()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeciesSettings;

    fn test_config(num_species: usize, spawn_mode: SpawnMode) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.width = 256;
        config.height = 128;
        config.num_agents = 500;
        config.seed = Some(7);
        config.spawn_mode = spawn_mode;
        config.species = vec![SpeciesSettings::default(); num_species];
        config
    }

    #[test]
    fn single_species_broadcasts_mask() {
        let agents = spawn_agents(&test_config(1, SpawnMode::Random));
        for agent in &agents {
            assert_eq!(agent.species_mask, [1.0, 1.0, 1.0, 0.0]);
            assert_eq!(agent.species_index, 0);
        }
    }

    #[test]
    fn multi_species_masks_are_one_hot_and_match_index() {
        for num_species in [2usize, 3] {
            let agents = spawn_agents(&test_config(num_species, SpawnMode::Random));
            for agent in &agents {
                let set: Vec<usize> = (0..3)
                    .filter(|&i| agent.species_mask[i] == 1.0)
                    .collect();
                assert_eq!(set.len(), 1, "mask must have exactly one channel set");
                assert_eq!(set[0], agent.species_index as usize);
                assert!((agent.species_index as usize) < num_species);
                assert_eq!(agent.species_mask[3], 0.0);
            }
        }
    }

    #[test]
    fn all_species_get_populated() {
        let agents = spawn_agents(&test_config(3, SpawnMode::Random));
        let mut counts = [0usize; 3];
        for agent in &agents {
            counts[agent.species_index as usize] += 1;
        }
        for count in counts {
            assert!(count > 0, "uniform assignment left a species empty");
        }
    }

    #[test]
    fn spawned_positions_stay_in_bounds() {
        for mode in [
            SpawnMode::Random,
            SpawnMode::Point,
            SpawnMode::InwardCircle,
            SpawnMode::RandomCircle,
        ] {
            let config = test_config(2, mode);
            for agent in spawn_agents(&config) {
                assert!(agent.position[0] >= 0.0 && agent.position[0] < 256.0);
                assert!(agent.position[1] >= 0.0 && agent.position[1] < 128.0);
                assert!(agent.angle >= 0.0 && agent.angle < std::f32::consts::TAU + 1e-3);
                assert_eq!(agent.age, 0.0);
            }
        }
    }

    #[test]
    fn point_spawn_stacks_everyone_at_center() {
        let agents = spawn_agents(&test_config(1, SpawnMode::Point));
        for agent in &agents {
            assert_eq!(agent.position, [128.0, 64.0]);
        }
    }

    #[test]
    fn seeded_spawns_are_reproducible() {
        let config = test_config(3, SpawnMode::Random);
        assert_eq!(spawn_agents(&config), spawn_agents(&config));
    }

    #[test]
    fn agent_layout_matches_shader_stride() {
        assert_eq!(std::mem::size_of::<Agent>(), 48);
    }
}

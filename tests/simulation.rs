// GPU integration tests for the simulation core. Each test acquires a real
// adapter; machines without one skip with a message instead of failing.

use physarum::config::{SimulationConfig, SpeciesSettings, SpawnMode, StepParams};
use physarum::error::SimError;
use physarum::stepper::{RenderMode, Simulation};
use physarum::world::TRAIL_CHANNELS;

fn gpu() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;
    pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("physarum_test_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
        },
        None,
    ))
    .ok()
}

macro_rules! require_gpu {
    () => {
        match gpu() {
            Some(pair) => pair,
            None => {
                eprintln!("skipping: no GPU adapter available");
                return;
            }
        }
    };
}

/// One stationary agent at the field center, no diffusion, no decay,
/// deposits of exactly `trail_weight` per tick.
fn stationary_config() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.width = 128;
    config.height = 128;
    config.num_agents = 1;
    config.spawn_mode = SpawnMode::Point;
    config.seed = Some(42);
    config.steps_per_frame = 1;
    config.step = StepParams {
        delta_time: 1.0,
        trail_weight: 5.0,
        decay_rate: 0.0,
        diffuse_rate: 0.0,
    };
    config.species = vec![SpeciesSettings {
        move_speed: 0.0,
        ..SpeciesSettings::default()
    }];
    config
}

fn cell_base(config: &SimulationConfig, x: u32, y: u32) -> usize {
    ((y * config.width + x) * TRAIL_CHANNELS) as usize
}

#[test]
fn single_agent_deposits_exactly_trail_weight() {
    let (device, queue) = require_gpu!();
    let config = stationary_config();
    let mut sim = Simulation::new(&device, &queue, config.clone()).unwrap();

    sim.tick(&device, &queue, &config.step, &config.species)
        .unwrap();

    let trail = sim.world().readback_trail(&device, &queue).unwrap();
    let base = cell_base(&config, 64, 64);

    // Single-species broadcast mask deposits into all three channels.
    assert_eq!(trail[base], 5.0);
    assert_eq!(trail[base + 1], 5.0);
    assert_eq!(trail[base + 2], 5.0);
    assert_eq!(trail[base + 3], 0.0);

    let stray: f32 = trail
        .iter()
        .enumerate()
        .filter(|(i, _)| !(base..base + 4).contains(i))
        .map(|(_, v)| v)
        .sum();
    assert_eq!(stray, 0.0, "only the agent's cell may hold intensity");

    sim.shutdown();
}

#[test]
fn coincident_deposits_accumulate() {
    let (device, queue) = require_gpu!();
    let mut config = stationary_config();
    config.num_agents = 2;
    let mut sim = Simulation::new(&device, &queue, config.clone()).unwrap();

    sim.tick(&device, &queue, &config.step, &config.species)
        .unwrap();

    let trail = sim.world().readback_trail(&device, &queue).unwrap();
    let base = cell_base(&config, 64, 64);
    assert_eq!(
        trail[base], 10.0,
        "two agents on one cell must add, not overwrite"
    );

    sim.shutdown();
}

#[test]
fn decay_strictly_decreases_and_stays_non_negative() {
    let (device, queue) = require_gpu!();
    let config = stationary_config();
    let mut sim = Simulation::new(&device, &queue, config.clone()).unwrap();

    sim.tick(&device, &queue, &config.step, &config.species)
        .unwrap();

    let decay_step = StepParams {
        delta_time: 1.0,
        trail_weight: 0.0,
        decay_rate: 0.05,
        diffuse_rate: 0.0,
    };

    let base = cell_base(&config, 64, 64);
    let mut previous = sim.world().readback_trail(&device, &queue).unwrap()[base];
    assert_eq!(previous, 5.0);

    for _ in 0..10 {
        sim.tick(&device, &queue, &decay_step, &config.species)
            .unwrap();
        let value = sim.world().readback_trail(&device, &queue).unwrap()[base];
        assert!(value < previous, "decay must strictly decrease the deposit");
        assert!(value >= 0.0, "decay must never go negative");
        previous = value;
    }

    sim.shutdown();
}

#[test]
fn decay_only_dynamics_never_increase_any_cell() {
    let (device, queue) = require_gpu!();
    let mut config = stationary_config();
    // A few moving agents to scatter intensity around first.
    config.num_agents = 50;
    config.spawn_mode = SpawnMode::Random;
    config.species[0].move_speed = 20.0;
    let mut sim = Simulation::new(&device, &queue, config.clone()).unwrap();

    for _ in 0..5 {
        sim.tick(&device, &queue, &config.step, &config.species)
            .unwrap();
    }

    let decay_step = StepParams {
        delta_time: 1.0,
        trail_weight: 0.0,
        decay_rate: 0.1,
        diffuse_rate: 0.0,
    };

    let mut previous = sim.world().readback_trail(&device, &queue).unwrap();
    for _ in 0..8 {
        sim.tick(&device, &queue, &decay_step, &config.species)
            .unwrap();
        let current = sim.world().readback_trail(&device, &queue).unwrap();
        for (next, prev) in current.iter().zip(previous.iter()) {
            assert!(next <= prev, "decay-only tick increased a cell");
            assert!(*next >= 0.0);
        }
        previous = current;
    }

    sim.shutdown();
}

#[test]
fn diffusion_spreads_intensity_to_neighbors() {
    let (device, queue) = require_gpu!();
    let config = stationary_config();
    let mut sim = Simulation::new(&device, &queue, config.clone()).unwrap();

    sim.tick(&device, &queue, &config.step, &config.species)
        .unwrap();

    let diffuse_step = StepParams {
        delta_time: 1.0,
        trail_weight: 0.0,
        decay_rate: 0.0,
        diffuse_rate: 0.5,
    };
    sim.tick(&device, &queue, &diffuse_step, &config.species)
        .unwrap();

    let trail = sim.world().readback_trail(&device, &queue).unwrap();
    let centre = cell_base(&config, 64, 64);
    let neighbor = cell_base(&config, 65, 64);

    assert!(trail[centre] < 5.0, "diffusion must bleed off the peak");
    assert!(trail[centre] > 0.0);
    assert!(trail[neighbor] > 0.0, "diffusion must reach the neighbor");

    sim.shutdown();
}

#[test]
fn identical_seeds_give_bit_identical_trails() {
    let (device, queue) = require_gpu!();
    let mut config = SimulationConfig::default();
    config.width = 128;
    config.height = 128;
    config.num_agents = 500;
    config.seed = Some(7);
    config.step = StepParams {
        delta_time: 0.5,
        trail_weight: 4.0,
        decay_rate: 0.2,
        diffuse_rate: 1.0,
    };
    config.species = vec![
        SpeciesSettings::default(),
        SpeciesSettings {
            move_speed: 45.0,
            ..SpeciesSettings::default()
        },
    ];

    let run = |config: &SimulationConfig| -> Vec<f32> {
        let mut sim = Simulation::new(&device, &queue, config.clone()).unwrap();
        for _ in 0..20 {
            sim.tick(&device, &queue, &config.step, &config.species)
                .unwrap();
        }
        let trail = sim.world().readback_trail(&device, &queue).unwrap();
        sim.shutdown();
        trail
    };

    assert_eq!(run(&config), run(&config), "seeded runs must be reproducible");
}

#[test]
fn agents_never_leave_the_field() {
    let (device, queue) = require_gpu!();
    let mut config = SimulationConfig::default();
    config.width = 64;
    config.height = 64;
    config.num_agents = 200;
    config.seed = Some(3);
    config.step = StepParams {
        delta_time: 1.0,
        trail_weight: 1.0,
        decay_rate: 0.1,
        diffuse_rate: 0.5,
    };
    // Fast enough to overshoot the field every tick.
    config.species = vec![SpeciesSettings {
        move_speed: 500.0,
        ..SpeciesSettings::default()
    }];
    let mut sim = Simulation::new(&device, &queue, config.clone()).unwrap();

    for _ in 0..10 {
        sim.tick(&device, &queue, &config.step, &config.species)
            .unwrap();
    }

    let agents = sim.world().readback_agents(&device, &queue).unwrap();
    assert_eq!(agents.len(), 200);
    for agent in &agents {
        assert!(agent.position[0] >= 0.0 && agent.position[0] < 64.0);
        assert!(agent.position[1] >= 0.0 && agent.position[1] < 64.0);
        assert_eq!(agent.age, 10.0);
    }

    sim.shutdown();
}

#[test]
fn render_modes_write_the_display_texture() {
    let (device, queue) = require_gpu!();
    let config = stationary_config();
    let mut sim = Simulation::new(&device, &queue, config.clone()).unwrap();
    sim.tick(&device, &queue, &config.step, &config.species)
        .unwrap();

    // Field colorization: the deposit cell saturates to the species color.
    sim.render(&device, &queue, RenderMode::FieldColorization)
        .unwrap();
    let display = sim.world().readback_display(&device, &queue).unwrap();
    let pixel = ((64 * config.width + 64) * 4) as usize;
    assert_eq!(&display[pixel..pixel + 4], &[255, 255, 255, 255]);
    assert_eq!(&display[0..4], &[0, 0, 0, 255], "empty cells stay background");

    // Agents-only: clear plus one splat at the agent's cell.
    sim.render(&device, &queue, RenderMode::AgentsOnly).unwrap();
    let display = sim.world().readback_display(&device, &queue).unwrap();
    assert_eq!(&display[pixel..pixel + 4], &[255, 255, 255, 255]);
    assert_eq!(&display[0..4], &[0, 0, 0, 255]);

    sim.shutdown();
}

#[test]
fn initialize_then_shutdown_releases_cleanly() {
    let (device, queue) = require_gpu!();
    let sim = Simulation::new(&device, &queue, stationary_config()).unwrap();
    sim.shutdown();
    // Flush destruction so nothing is left queued on the device.
    device.poll(wgpu::Maintain::Wait);
}

#[test]
fn lifecycle_reinitializes_and_shuts_down_cleanly() {
    let (device, queue) = require_gpu!();
    let config = stationary_config();
    let mut sim = Simulation::new(&device, &queue, config.clone()).unwrap();
    sim.tick(&device, &queue, &config.step, &config.species)
        .unwrap();

    // Ticking with an impossible species count is rejected up front.
    let too_many = vec![SpeciesSettings::default(); 4];
    assert!(matches!(
        sim.tick(&device, &queue, &config.step, &too_many),
        Err(SimError::InvalidConfiguration(_))
    ));

    // Re-initialization with new dimensions replaces all storage.
    let mut bigger = config.clone();
    bigger.width = 256;
    bigger.height = 192;
    bigger.num_agents = 64;
    sim.reinitialize(&device, &queue, bigger.clone()).unwrap();
    assert_eq!(sim.frame(), 0);
    sim.tick(&device, &queue, &bigger.step, &bigger.species)
        .unwrap();
    let trail = sim.world().readback_trail(&device, &queue).unwrap();
    assert_eq!(trail.len(), (256 * 192 * TRAIL_CHANNELS) as usize);

    // Re-initialization with a bad config fails without touching the
    // running instance.
    let mut bad = bigger.clone();
    bad.num_agents = 0;
    assert!(matches!(
        sim.reinitialize(&device, &queue, bad),
        Err(SimError::InvalidConfiguration(_))
    ));
    sim.tick(&device, &queue, &bigger.step, &bigger.species)
        .unwrap();

    sim.shutdown();
    device.poll(wgpu::Maintain::Wait);
}

#[test]
fn parameter_map_upload_validates_size() {
    let (device, queue) = require_gpu!();
    let config = stationary_config();
    let sim = Simulation::new(&device, &queue, config.clone()).unwrap();
    let (pw, ph) = config.parameter_map_size();

    let ok = vec![[1.0f32; 4]; (pw * ph) as usize];
    assert!(sim.world().upload_parameter_map_1(&queue, &ok).is_ok());
    assert!(sim.world().upload_parameter_map_2(&queue, &ok).is_ok());
    assert!(sim.world().upload_color_map(&queue, &ok).is_ok());

    let short = vec![[1.0f32; 4]; 3];
    assert!(matches!(
        sim.world().upload_color_map(&queue, &short),
        Err(SimError::InvalidConfiguration(_))
    ));

    sim.shutdown();
}

#[test]
fn deposit_zeroing_via_parameter_map() {
    let (device, queue) = require_gpu!();
    let config = stationary_config();
    let mut sim = Simulation::new(&device, &queue, config.clone()).unwrap();

    // Zero the deposit multiplier everywhere; the agent then deposits
    // nothing even with a positive trail weight.
    let (pw, ph) = config.parameter_map_size();
    let zeros = vec![[0.0f32; 4]; (pw * ph) as usize];
    sim.world().upload_parameter_map_2(&queue, &zeros).unwrap();

    sim.tick(&device, &queue, &config.step, &config.species)
        .unwrap();
    let trail = sim.world().readback_trail(&device, &queue).unwrap();
    assert!(trail.iter().all(|&v| v == 0.0));

    sim.shutdown();
}

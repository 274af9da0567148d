// ============================================================================
// headless.rs - physarum
// Headless simulation runner for long batches without a window, with an
// optional PNG export of the final display texture.
// ============================================================================

use std::time::Instant;

use crate::config::SimulationConfig;
use crate::metrics::TrailStats;
use crate::stepper::{RenderMode, Simulation};

#[derive(Clone, Debug)]
pub struct HeadlessConfig {
    pub frames: u32,
    pub mode: RenderMode,
    pub output_path: Option<String>,
    pub progress_interval: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            frames: 1000,
            mode: RenderMode::FieldColorization,
            output_path: None,
            progress_interval: 200,
        }
    }
}

pub fn run_headless(config: &SimulationConfig, headless: &HeadlessConfig) -> Result<(), String> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok_or_else(|| String::from("Failed to get GPU adapter for headless mode"))?;

    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("physarum_headless_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
        },
        None,
    ))
    .map_err(|e| format!("Failed to create headless device: {e}"))?;

    let mut sim =
        Simulation::new(&device, &queue, config.clone()).map_err(|e| e.to_string())?;

    log::info!(
        "Headless run started: {} frames on {}x{}, {} steps/frame",
        headless.frames,
        config.width,
        config.height,
        config.steps_per_frame,
    );

    let started = Instant::now();
    let mut last_report = Instant::now();
    let mut last_report_frame = 0u32;

    for frame in 0..headless.frames {
        for _ in 0..config.steps_per_frame {
            sim.tick(&device, &queue, &config.step, &config.species)
                .map_err(|e| e.to_string())?;
        }
        sim.render(&device, &queue, headless.mode)
            .map_err(|e| e.to_string())?;

        if headless.progress_interval > 0 && (frame + 1) % headless.progress_interval == 0 {
            let done = frame + 1;
            let total_elapsed = started.elapsed().as_secs_f64().max(1e-6);
            let total_fps = done as f64 / total_elapsed;

            let window_elapsed = last_report.elapsed().as_secs_f64().max(1e-6);
            let window_fps = (done - last_report_frame) as f64 / window_elapsed;

            log::info!(
                "Headless progress: {}/{} | fps={:.0} (window {:.0})",
                done,
                headless.frames,
                total_fps,
                window_fps,
            );
            if let Some(trail) = sim.world().readback_trail(&device, &queue) {
                TrailStats::from_trail(&trail).log(sim.frame());
            }

            last_report = Instant::now();
            last_report_frame = done;
        }
    }

    if let Some(path) = output_path(headless) {
        let rgba = sim
            .world()
            .readback_display(&device, &queue)
            .ok_or_else(|| String::from("GPU display readback failed at end of headless run"))?;
        let image =
            image::RgbaImage::from_raw(config.width, config.height, rgba)
                .ok_or_else(|| String::from("display readback has unexpected size"))?;
        image
            .save(&path)
            .map_err(|e| format!("Failed to save image {path}: {e}"))?;
        log::info!("Saved display texture to {}", path);
    }

    sim.shutdown();
    Ok(())
}

fn output_path(headless: &HeadlessConfig) -> Option<String> {
    match &headless.output_path {
        Some(path) => Some(path.clone()),
        None if headless.frames > 0 => Some(format!(
            "physarum_{}.png",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        )),
        None => None,
    }
}

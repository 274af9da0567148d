// ============================================================================
// main.rs - physarum
// Entry point. Initializes logging, parses arguments and starts either the
// windowed event loop or the headless runner.
// ============================================================================

use physarum::app::App;
use physarum::config::SimulationConfig;
use physarum::headless::{run_headless, HeadlessConfig};
use physarum::stepper::RenderMode;
use winit::event_loop::EventLoop;

fn main() {
    env_logger::init();

    let mut config_path: Option<String> = None;
    let mut headless_frames: Option<u32> = None;
    let mut output_path: Option<String> = None;
    let mut mode = RenderMode::FieldColorization;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = args.next(),
            "--headless" => {
                let frames = args.next().and_then(|v| v.parse().ok());
                match frames {
                    Some(frames) => headless_frames = Some(frames),
                    None => {
                        eprintln!("--headless requires a frame count");
                        std::process::exit(2);
                    }
                }
            }
            "--output" => output_path = args.next(),
            "--agents-only" => mode = RenderMode::AgentsOnly,
            "--help" | "-h" => {
                println!(
                    "Usage: physarum [--config FILE] [--headless FRAMES] \
                     [--output FILE.png] [--agents-only]"
                );
                return;
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }

    let config = match config_path {
        Some(path) => match SimulationConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(2);
            }
        },
        None => SimulationConfig::default(),
    };

    if let Some(frames) = headless_frames {
        let headless = HeadlessConfig {
            frames,
            mode,
            output_path,
            ..HeadlessConfig::default()
        };
        if let Err(err) = run_headless(&config, &headless) {
            eprintln!("headless run failed: {err}");
            std::process::exit(1);
        }
        return;
    }

    let event_loop = EventLoop::new().unwrap();
    event_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);

    let mut app = App::new(config, mode);
    event_loop.run_app(&mut app).unwrap();
}

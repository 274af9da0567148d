// ============================================================================
// app.rs - physarum
// Windowed host: winit event loop, per-frame tick cadence, display blit and
// egui parameter panel.
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    keyboard::{Key, NamedKey},
    window::{Window, WindowAttributes},
};

use crate::config::SimulationConfig;
use crate::renderer::DisplayRenderer;
use crate::stepper::{RenderMode, Simulation};
use crate::ui::{self, UiState};

// ======================== Application ========================

pub struct App {
    state: Option<AppState>,
    config: SimulationConfig,
    initial_mode: RenderMode,
}

struct AppState {
    // GPU
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,

    // Simulation
    sim: Simulation,
    display_renderer: DisplayRenderer,

    // Window
    window: Arc<Window>,

    // egui
    egui_ctx: egui::Context,
    egui_winit_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    ui: UiState,

    // Timing
    last_redraw: Instant,
    fps: f32,
}

impl App {
    pub fn new(config: SimulationConfig, initial_mode: RenderMode) -> Self {
        Self {
            state: None,
            config,
            initial_mode,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &winit::event_loop::ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title("Physarum")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.width.max(640),
                self.config.height.max(360),
            ));

        let window = Arc::new(event_loop.create_window(window_attrs).unwrap());

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone()).unwrap();

        let (device, queue, surface_config) =
            pollster::block_on(init_gpu(&instance, &surface, &window));

        surface.configure(&device, &surface_config);

        let sim = match Simulation::new(&device, &queue, self.config.clone()) {
            Ok(sim) => sim,
            Err(err) => {
                log::error!("simulation initialization failed: {err}");
                event_loop.exit();
                return;
            }
        };
        let display_renderer = DisplayRenderer::new(&device, sim.world(), surface_config.format);

        // ---- Initialize egui ----
        let egui_ctx = egui::Context::default();
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_rgba_premultiplied(27, 27, 35, 235);
        egui_ctx.set_visuals(visuals);

        let egui_winit_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            event_loop,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_config.format, None, 1, false);

        let ui = UiState::from_config(&self.config, self.initial_mode);

        self.state = Some(AppState {
            device,
            queue,
            surface,
            surface_config,
            sim,
            display_renderer,
            window: window.clone(),
            egui_ctx,
            egui_winit_state,
            egui_renderer,
            ui,
            last_redraw: Instant::now(),
            fps: 0.0,
        });

        // Initial redraw, required on macOS with winit 0.30.
        window.request_redraw();
    }

    fn about_to_wait(&mut self, _event_loop: &winit::event_loop::ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &winit::event_loop::ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        // Pass events to egui first
        let egui_response = state.egui_winit_state.on_window_event(&state.window, &event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::KeyboardInput { event, .. } => {
                handle_keyboard(state, event_loop, &event, egui_response.consumed);
            }

            WindowEvent::Resized(new_size) => {
                if new_size.width > 0 && new_size.height > 0 {
                    state.surface_config.width = new_size.width;
                    state.surface_config.height = new_size.height;
                    state.surface.configure(&state.device, &state.surface_config);
                }
            }

            WindowEvent::RedrawRequested => {
                redraw(state, event_loop);
            }

            _ => {}
        }
    }
}

// ======================== GPU Initialization ========================

async fn init_gpu(
    instance: &wgpu::Instance,
    surface: &wgpu::Surface<'_>,
    window: &Window,
) -> (wgpu::Device, wgpu::Queue, wgpu::SurfaceConfiguration) {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        })
        .await
        .expect(
            "Failed to find a suitable GPU adapter.\n\
             Physarum requires a GPU with Vulkan, Metal, or DX12 support.",
        );

    log::info!("GPU: {}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("physarum_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
        .expect("Failed to create device");

    let size = window.inner_size();
    let surface_caps = surface.get_capabilities(&adapter);
    let surface_format = surface_caps
        .formats
        .iter()
        .find(|f| f.is_srgb())
        .copied()
        .unwrap_or(surface_caps.formats[0]);

    let surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: surface_format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: surface_caps.alpha_modes[0],
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };

    (device, queue, surface_config)
}

// ======================== Keyboard Handling ========================

fn handle_keyboard(
    state: &mut AppState,
    event_loop: &winit::event_loop::ActiveEventLoop,
    event: &winit::event::KeyEvent,
    egui_consumed: bool,
) {
    let pressed = event.state.is_pressed();

    // Global hotkeys, handled even when egui has focus
    match &event.logical_key {
        Key::Named(NamedKey::Escape) if pressed => event_loop.exit(),
        Key::Named(NamedKey::F1) if pressed => {
            state.ui.show_panel = !state.ui.show_panel;
        }
        _ => {}
    }

    if egui_consumed {
        return;
    }

    match &event.logical_key {
        Key::Named(NamedKey::Space) if pressed => {
            state.ui.paused = !state.ui.paused;
        }
        Key::Named(NamedKey::Tab) if pressed => {
            state.ui.mode = match state.ui.mode {
                RenderMode::FieldColorization => RenderMode::AgentsOnly,
                RenderMode::AgentsOnly => RenderMode::FieldColorization,
            };
        }
        Key::Character(c) => match c.as_str() {
            "r" | "R" if pressed => {
                state.ui.restart_requested = true;
            }
            _ => {}
        },
        _ => {}
    }
}

// ======================== Frame Rendering ========================

fn redraw(state: &mut AppState, event_loop: &winit::event_loop::ActiveEventLoop) {
    // FPS (exponential moving average)
    let now = Instant::now();
    let dt = now.duration_since(state.last_redraw).as_secs_f32().max(0.0001);
    state.last_redraw = now;
    state.fps = state.fps * 0.95 + (1.0 / dt) * 0.05;

    // ---- egui frame ----
    let raw_input = state.egui_winit_state.take_egui_input(&state.window);
    let frame = state.sim.frame();
    let fps = state.fps;
    let full_output = state.egui_ctx.run(raw_input, |ctx| {
        ui::draw_panel(ctx, &mut state.ui, frame, fps);
    });
    state
        .egui_winit_state
        .handle_platform_output(&state.window, full_output.platform_output);

    // ---- Restart ----
    if state.ui.restart_requested {
        state.ui.restart_requested = false;
        let mut config = state.sim.config().clone();
        config.step = state.ui.step;
        config.species = state.ui.species.clone();
        config.steps_per_frame = state.ui.steps_per_frame;
        match state.sim.reinitialize(&state.device, &state.queue, config) {
            Ok(()) => {
                state.display_renderer = DisplayRenderer::new(
                    &state.device,
                    state.sim.world(),
                    state.surface_config.format,
                );
                log::info!("simulation restarted");
            }
            Err(err) => {
                log::error!("restart failed: {err}");
                state.ui.paused = true;
            }
        }
    }

    // ---- Simulation steps ----
    if !state.ui.paused {
        for _ in 0..state.ui.steps_per_frame {
            if let Err(err) =
                state
                    .sim
                    .tick(&state.device, &state.queue, &state.ui.step, &state.ui.species)
            {
                log::error!("tick failed, pausing: {err}");
                state.ui.paused = true;
                break;
            }
        }
    }

    if let Err(err) = state.sim.render(&state.device, &state.queue, state.ui.mode) {
        log::error!("render failed, pausing: {err}");
        state.ui.paused = true;
    }

    // ---- Surface pass: blit + egui ----
    let output = match state.surface.get_current_texture() {
        Ok(t) => t,
        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
            state.surface.configure(&state.device, &state.surface_config);
            return;
        }
        Err(e) => {
            log::error!("Surface error: {:?}", e);
            if matches!(e, wgpu::SurfaceError::OutOfMemory) {
                event_loop.exit();
            }
            return;
        }
    };

    let view = output
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());

    let paint_jobs = state
        .egui_ctx
        .tessellate(full_output.shapes, full_output.pixels_per_point);

    for (id, image_delta) in &full_output.textures_delta.set {
        state
            .egui_renderer
            .update_texture(&state.device, &state.queue, *id, image_delta);
    }

    let screen_descriptor = egui_wgpu::ScreenDescriptor {
        size_in_pixels: [state.surface_config.width, state.surface_config.height],
        pixels_per_point: full_output.pixels_per_point,
    };

    let mut encoder = state
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });

    state.egui_renderer.update_buffers(
        &state.device,
        &state.queue,
        &mut encoder,
        &paint_jobs,
        &screen_descriptor,
    );

    {
        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("surface_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.02,
                        g: 0.02,
                        b: 0.05,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        // forget_lifetime converts RenderPass<'encoder> to RenderPass<'static>,
        // required by egui_wgpu::Renderer::render.
        let mut pass = pass.forget_lifetime();
        state.display_renderer.render(&mut pass);
        state
            .egui_renderer
            .render(&mut pass, &paint_jobs, &screen_descriptor);
    }

    state.queue.submit(std::iter::once(encoder.finish()));
    output.present();

    for id in &full_output.textures_delta.free {
        state.egui_renderer.free_texture(id);
    }

    state.window.request_redraw();
}

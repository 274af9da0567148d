// ============================================================================
// stepper.rs - physarum
// Simulation: lifecycle (initialize/reinitialize/shutdown), tick encoding
// (agent update, diffuse/decay, trail rotation) and display rendering.
// ============================================================================

use crate::agents::{spawn_agents, AGENT_WORKGROUP_SIZE};
use crate::config::{validate_step, SimulationConfig, SpeciesSettings, StepParams, MAX_SPECIES};
use crate::error::SimError;
use crate::pipeline::{create_pipelines, Pipelines};
use crate::world::{WorldState, WORKGROUP_X, WORKGROUP_Y};

/// How the display texture is produced each frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Clear, then splat each agent's species color at its cell.
    AgentsOnly,
    /// Colorize the whole trail field through the species colors and the
    /// sub-sampled color map.
    FieldColorization,
}

/// One running simulation instance.
///
/// A tick is synchronous from the caller's view: the two compute passes are
/// encoded back to back in one submission, so all deposits are visible to
/// the diffuse pass and the rotated trail map is complete before the next
/// tick starts. A dispatch-level failure poisons the instance; every later
/// `tick`/`render` fails until the host reinitializes.
pub struct Simulation {
    config: SimulationConfig,
    world: WorldState,
    pipelines: Pipelines,
    sim_time: f32,
    poisoned: bool,
}

impl Simulation {
    /// Validates `config`, allocates all device storage and uploads the
    /// initial agent population. Nothing is allocated for invalid configs.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: SimulationConfig,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let agents = spawn_agents(&config);

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let world = WorldState::new(device, queue, &config, &agents);
        let pipelines = create_pipelines(device, &world);
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            world.destroy();
            return Err(SimError::ResourceAllocationFailure(err.to_string()));
        }

        let sim = Self {
            config,
            world,
            pipelines,
            sim_time: 0.0,
            poisoned: false,
        };
        // Seed the species buffer so a render before the first tick works.
        sim.world
            .upload_step(queue, &sim.config.step, &sim.config.species, 0.0);

        log::info!(
            "simulation initialized: {}x{} field, {} agents, {} species",
            sim.world.width,
            sim.world.height,
            sim.world.num_agents,
            sim.config.species.len(),
        );
        Ok(sim)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Device-resident fields, readable by the host between ticks.
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn frame(&self) -> u32 {
        self.world.frame
    }

    pub fn sim_time(&self) -> f32 {
        self.sim_time
    }

    /// Advances the simulation by exactly one tick. `step` and `species` are
    /// injected per call so hosts can hot-edit them between ticks.
    pub fn tick(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        step: &StepParams,
        species: &[SpeciesSettings],
    ) -> Result<(), SimError> {
        self.ensure_healthy()?;
        validate_step(step)?;
        if species.is_empty() || species.len() > MAX_SPECIES {
            return Err(SimError::InvalidConfiguration(format!(
                "species count must be 1..={MAX_SPECIES}, got {}",
                species.len()
            )));
        }

        self.world.upload_step(queue, step, species, self.sim_time);

        let dispatch_agents =
            (self.world.num_agents + AGENT_WORKGROUP_SIZE - 1) / AGENT_WORKGROUP_SIZE;
        let dispatch_x = (self.world.width + WORKGROUP_X - 1) / WORKGROUP_X;
        let dispatch_y = (self.world.height + WORKGROUP_Y - 1) / WORKGROUP_Y;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tick_encoder"),
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("agent_update_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.update_pipeline);
            pass.set_bind_group(0, &self.pipelines.update_bind_group, &[]);
            pass.dispatch_workgroups(dispatch_agents, 1, 1);
        }

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("diffuse_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.diffuse_pipeline);
            pass.set_bind_group(0, &self.pipelines.diffuse_bind_group, &[]);
            pass.dispatch_workgroups(dispatch_x, dispatch_y, 1);
        }

        self.world.rotate_trail(&mut encoder);
        queue.submit(std::iter::once(encoder.finish()));

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            self.poisoned = true;
            return Err(SimError::TickExecutionFailure(err.to_string()));
        }

        self.sim_time += step.delta_time;
        self.world.frame += 1;
        Ok(())
    }

    /// Produces the display texture from the current field or agent state.
    /// Pure with respect to the simulation fields; only the display texture
    /// is written.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mode: RenderMode,
    ) -> Result<(), SimError> {
        self.ensure_healthy()?;

        let dispatch_x = (self.world.width + WORKGROUP_X - 1) / WORKGROUP_X;
        let dispatch_y = (self.world.height + WORKGROUP_Y - 1) / WORKGROUP_Y;
        let dispatch_agents =
            (self.world.num_agents + AGENT_WORKGROUP_SIZE - 1) / AGENT_WORKGROUP_SIZE;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });

        match mode {
            RenderMode::AgentsOnly => {
                // Clear to background, then splat. The empty render pass is
                // just the clear.
                {
                    let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("display_clear_pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &self.world.display_view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                }

                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("draw_agents_pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipelines.draw_agents_pipeline);
                pass.set_bind_group(0, &self.pipelines.draw_agents_bind_group, &[]);
                pass.dispatch_workgroups(dispatch_agents, 1, 1);
            }
            RenderMode::FieldColorization => {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("colorize_pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipelines.colorize_pipeline);
                pass.set_bind_group(0, &self.pipelines.colorize_bind_group, &[]);
                pass.dispatch_workgroups(dispatch_x, dispatch_y, 1);
            }
        }

        queue.submit(std::iter::once(encoder.finish()));

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            self.poisoned = true;
            return Err(SimError::TickExecutionFailure(err.to_string()));
        }
        Ok(())
    }

    /// Full reset: validates the new config first, then replaces all device
    /// storage. The old storage is released before this returns.
    pub fn reinitialize(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: SimulationConfig,
    ) -> Result<(), SimError> {
        config.validate()?;
        // Previous storage goes first so peak usage never doubles. Should
        // re-allocation then fail, the instance is left uninitialized and
        // refuses further ticks, exactly like a failed initial `new`.
        self.world.destroy();
        self.poisoned = true;
        let next = Simulation::new(device, queue, config)?;
        *self = next;
        Ok(())
    }

    /// Releases all device storage owned by this instance.
    pub fn shutdown(self) {
        self.world.destroy();
        log::info!("simulation shut down");
    }

    fn ensure_healthy(&self) -> Result<(), SimError> {
        if self.poisoned {
            return Err(SimError::TickExecutionFailure(
                "instance poisoned by an earlier tick failure; reinitialize to continue".into(),
            ));
        }
        Ok(())
    }
}

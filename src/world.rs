// ============================================================================
// world.rs - physarum
// WorldState: all device-resident simulation storage (trail fields, display
// texture, parameter maps, agent and species buffers, uniforms), plus
// upload, readback and release helpers.
// ============================================================================

use bytemuck::{Pod, Zeroable};

use crate::agents::Agent;
use crate::config::{SimulationConfig, SpeciesSettings, StepParams, MAX_SPECIES};
use crate::error::SimError;

pub const WORKGROUP_X: u32 = 16;
pub const WORKGROUP_Y: u32 = 16;

/// Channels per trail cell: one per species slot plus one unused.
pub const TRAIL_CHANNELS: u32 = 4;
/// Trail intensity is stored as 16.16 fixed point so the agent pass can
/// accumulate deposits with atomicAdd.
pub const TRAIL_SCALE: f32 = 65536.0;

// ======================== Shader-side structs ========================

/// Uniform block shared by all kernels. Layout mirrors `SimParams` in the
/// WGSL sources.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SimParams {
    pub width: u32,
    pub height: u32,
    pub num_agents: u32,
    pub num_species: u32,
    pub param_width: u32,
    pub param_height: u32,
    pub subsampling: u32,
    pub frame: u32,
    pub delta_time: f32,
    pub time: f32,
    pub trail_weight: f32,
    pub decay_rate: f32,
    pub diffuse_rate: f32,
    pub _pad: [f32; 3],
}

/// Species record as consumed by the kernels (`Species` in WGSL).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GpuSpecies {
    pub move_speed: f32,
    pub turn_speed: f32,
    pub sensor_angle_rad: f32,
    pub sensor_offset: f32,
    pub sensor_size: u32,
    pub deposit_strength: f32,
    pub _pad: [f32; 2],
    pub color: [f32; 4],
}

impl From<&SpeciesSettings> for GpuSpecies {
    fn from(s: &SpeciesSettings) -> Self {
        Self {
            move_speed: s.move_speed,
            turn_speed: s.turn_speed,
            sensor_angle_rad: s.sensor_angle_degrees.to_radians(),
            sensor_offset: s.sensor_offset,
            sensor_size: s.sensor_size,
            deposit_strength: s.deposit_strength,
            _pad: [0.0; 2],
            color: s.color,
        }
    }
}

// ======================== WorldState ========================

/// Owns every GPU resource of one simulation instance.
///
/// The trail map and the diffused trail map are stable objects: the diffuse
/// pass reads the former and writes the latter, and the stepper copies the
/// result back at the end of the tick. External readers therefore always see
/// consistent, fully-written fields.
pub struct WorldState {
    pub width: u32,
    pub height: u32,
    pub param_width: u32,
    pub param_height: u32,
    pub subsampling: u32,
    pub num_agents: u32,

    pub trail_map: wgpu::Buffer,
    pub diffused_trail_map: wgpu::Buffer,
    pub agent_buffer: wgpu::Buffer,
    pub species_buffer: wgpu::Buffer,
    pub sim_params_buffer: wgpu::Buffer,

    pub display_texture: wgpu::Texture,
    pub display_view: wgpu::TextureView,
    pub parameter_map_1: wgpu::Texture,
    pub parameter_map_1_view: wgpu::TextureView,
    pub parameter_map_2: wgpu::Texture,
    pub parameter_map_2_view: wgpu::TextureView,
    pub color_map: wgpu::Texture,
    pub color_map_view: wgpu::TextureView,

    pub frame: u32,
}

impl WorldState {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &SimulationConfig,
        agents: &[Agent],
    ) -> Self {
        use wgpu::util::DeviceExt;

        let (param_width, param_height) = config.parameter_map_size();
        let field_bytes =
            (config.width * config.height * TRAIL_CHANNELS) as u64 * std::mem::size_of::<u32>() as u64;

        let field_usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST;

        // wgpu zero-initializes buffers, which is exactly the empty field.
        let trail_map = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("trail_map"),
            size: field_bytes,
            usage: field_usage,
            mapped_at_creation: false,
        });
        let diffused_trail_map = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("diffused_trail_map"),
            size: field_bytes,
            usage: field_usage,
            mapped_at_creation: false,
        });

        let agent_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("agents"),
            contents: bytemuck::cast_slice(agents),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
        });

        // Fixed capacity for the maximum species count; the live count is in
        // the uniform block.
        let species_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("species_settings"),
            size: (MAX_SPECIES * std::mem::size_of::<GpuSpecies>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sim_params = SimParams {
            width: config.width,
            height: config.height,
            num_agents: config.num_agents,
            num_species: config.species.len() as u32,
            param_width,
            param_height,
            subsampling: config.parameter_map_subsampling,
            frame: 0,
            delta_time: config.step.delta_time,
            time: 0.0,
            trail_weight: config.step.trail_weight,
            decay_rate: config.step.decay_rate,
            diffuse_rate: config.step.diffuse_rate,
            _pad: [0.0; 3],
        };
        let sim_params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sim_params"),
            contents: bytemuck::bytes_of(&sim_params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let display_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("display_texture"),
            size: wgpu::Extent3d {
                width: config.width,
                height: config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let display_view = display_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let make_param_map = |label: &str| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: param_width,
                    height: param_height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba32Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        };

        let parameter_map_1 = make_param_map("parameter_map_1");
        let parameter_map_2 = make_param_map("parameter_map_2");
        let color_map = make_param_map("color_map");
        let parameter_map_1_view =
            parameter_map_1.create_view(&wgpu::TextureViewDescriptor::default());
        let parameter_map_2_view =
            parameter_map_2.create_view(&wgpu::TextureViewDescriptor::default());
        let color_map_view = color_map.create_view(&wgpu::TextureViewDescriptor::default());

        let world = Self {
            width: config.width,
            height: config.height,
            param_width,
            param_height,
            subsampling: config.parameter_map_subsampling,
            num_agents: config.num_agents,
            trail_map,
            diffused_trail_map,
            agent_buffer,
            species_buffer,
            sim_params_buffer,
            display_texture,
            display_view,
            parameter_map_1,
            parameter_map_1_view,
            parameter_map_2,
            parameter_map_2_view,
            color_map,
            color_map_view,
            frame: 0,
        };

        // Neutral multipliers until the host uploads real maps.
        let neutral = vec![[1.0f32; 4]; (param_width * param_height) as usize];
        world.write_param_texture(queue, &world.parameter_map_1, &neutral);
        world.write_param_texture(queue, &world.parameter_map_2, &neutral);
        world.write_param_texture(queue, &world.color_map, &neutral);

        world
    }

    // ======================== Uploads ========================

    /// Uploads the per-tick scalar parameters and species settings. Called
    /// once per tick since both may be hot-edited by the host.
    pub fn upload_step(
        &self,
        queue: &wgpu::Queue,
        step: &StepParams,
        species: &[SpeciesSettings],
        time: f32,
    ) {
        let sim_params = SimParams {
            width: self.width,
            height: self.height,
            num_agents: self.num_agents,
            num_species: species.len() as u32,
            param_width: self.param_width,
            param_height: self.param_height,
            subsampling: self.subsampling,
            frame: self.frame,
            delta_time: step.delta_time,
            time,
            trail_weight: step.trail_weight,
            decay_rate: step.decay_rate,
            diffuse_rate: step.diffuse_rate,
            _pad: [0.0; 3],
        };
        queue.write_buffer(&self.sim_params_buffer, 0, bytemuck::bytes_of(&sim_params));

        let gpu_species: Vec<GpuSpecies> = species.iter().map(GpuSpecies::from).collect();
        queue.write_buffer(&self.species_buffer, 0, bytemuck::cast_slice(&gpu_species));
    }

    pub fn upload_parameter_map_1(
        &self,
        queue: &wgpu::Queue,
        texels: &[[f32; 4]],
    ) -> Result<(), SimError> {
        self.checked_param_upload(queue, &self.parameter_map_1, texels)
    }

    pub fn upload_parameter_map_2(
        &self,
        queue: &wgpu::Queue,
        texels: &[[f32; 4]],
    ) -> Result<(), SimError> {
        self.checked_param_upload(queue, &self.parameter_map_2, texels)
    }

    pub fn upload_color_map(
        &self,
        queue: &wgpu::Queue,
        texels: &[[f32; 4]],
    ) -> Result<(), SimError> {
        self.checked_param_upload(queue, &self.color_map, texels)
    }

    fn checked_param_upload(
        &self,
        queue: &wgpu::Queue,
        texture: &wgpu::Texture,
        texels: &[[f32; 4]],
    ) -> Result<(), SimError> {
        let expected = (self.param_width * self.param_height) as usize;
        if texels.len() != expected {
            return Err(SimError::InvalidConfiguration(format!(
                "parameter map upload needs {expected} texels, got {}",
                texels.len()
            )));
        }
        self.write_param_texture(queue, texture, texels);
        Ok(())
    }

    fn write_param_texture(
        &self,
        queue: &wgpu::Queue,
        texture: &wgpu::Texture,
        texels: &[[f32; 4]],
    ) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.param_width * 16),
                rows_per_image: Some(self.param_height),
            },
            wgpu::Extent3d {
                width: self.param_width,
                height: self.param_height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Buffer rotation: the diffused result becomes the next tick's trail
    /// input. A copy (not a handle swap) keeps both field objects stable for
    /// external readers.
    pub fn rotate_trail(&self, encoder: &mut wgpu::CommandEncoder) {
        let field_bytes =
            (self.width * self.height * TRAIL_CHANNELS) as u64 * std::mem::size_of::<u32>() as u64;
        encoder.copy_buffer_to_buffer(&self.diffused_trail_map, 0, &self.trail_map, 0, field_bytes);
    }

    // ======================== Readback ========================

    /// Trail map as intensities (fixed point converted back to f32), laid
    /// out row-major with `TRAIL_CHANNELS` values per cell.
    pub fn readback_trail(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Option<Vec<f32>> {
        let raw = self.readback_buffer(device, queue, &self.trail_map)?;
        let fixed: &[u32] = bytemuck::cast_slice(&raw);
        Some(fixed.iter().map(|&v| v as f32 / TRAIL_SCALE).collect())
    }

    /// Same as `readback_trail` for the diffused trail map.
    pub fn readback_diffused_trail(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Option<Vec<f32>> {
        let raw = self.readback_buffer(device, queue, &self.diffused_trail_map)?;
        let fixed: &[u32] = bytemuck::cast_slice(&raw);
        Some(fixed.iter().map(|&v| v as f32 / TRAIL_SCALE).collect())
    }

    pub fn readback_agents(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Option<Vec<Agent>> {
        let raw = self.readback_buffer(device, queue, &self.agent_buffer)?;
        Some(bytemuck::cast_slice(&raw).to_vec())
    }

    fn readback_buffer(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        buffer: &wgpu::Buffer,
    ) -> Option<Vec<u8>> {
        let size = buffer.size();
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {
                let data = slice.get_mapped_range().to_vec();
                staging.unmap();
                Some(data)
            }
            _ => {
                log::error!("GPU buffer readback failed");
                None
            }
        }
    }

    /// Display texture as tightly packed RGBA8 rows.
    pub fn readback_display(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Option<Vec<u8>> {
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let unpadded_bpr = self.width * 4;
        let padded_bpr = (unpadded_bpr + align - 1) / align * align;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("display_staging"),
            size: (padded_bpr * self.height) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("display_readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.display_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {
                let data = slice.get_mapped_range();
                let mut rgba = Vec::with_capacity((self.width * self.height * 4) as usize);
                for row in 0..self.height {
                    let start = (row * padded_bpr) as usize;
                    rgba.extend_from_slice(&data[start..start + unpadded_bpr as usize]);
                }
                drop(data);
                staging.unmap();
                Some(rgba)
            }
            _ => {
                log::error!("GPU display readback failed");
                None
            }
        }
    }

    // ======================== Release ========================

    /// Explicitly releases all device storage. Safe to call on an instance
    /// in any state; dropped resources are also released by wgpu on Drop, so
    /// this only accelerates reclamation.
    pub fn destroy(&self) {
        self.trail_map.destroy();
        self.diffused_trail_map.destroy();
        self.agent_buffer.destroy();
        self.species_buffer.destroy();
        self.sim_params_buffer.destroy();
        self.display_texture.destroy();
        self.parameter_map_1.destroy();
        self.parameter_map_2.destroy();
        self.color_map.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<SimParams>(), 64);
    }

    #[test]
    fn species_record_matches_shader_stride() {
        assert_eq!(std::mem::size_of::<GpuSpecies>(), 48);
    }

    #[test]
    fn species_conversion_turns_degrees_into_radians() {
        let settings = SpeciesSettings {
            sensor_angle_degrees: 90.0,
            ..SpeciesSettings::default()
        };
        let gpu = GpuSpecies::from(&settings);
        assert!((gpu.sensor_angle_rad - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }
}

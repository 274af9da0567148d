// ============================================================================
// pipeline.rs - physarum
// Compute pipeline creation and bind-group-layout helpers for the four
// simulation kernels.
// ============================================================================

use crate::world::WorldState;

// ======================== Pipelines ========================

/// All compute pipelines and their bind groups. The trail fields are stable
/// objects (rotation is a copy), so a single bind group per pipeline is
/// enough; there is no ping-pong pair to juggle.
pub struct Pipelines {
    pub update_pipeline: wgpu::ComputePipeline,
    pub update_bind_group: wgpu::BindGroup,

    pub diffuse_pipeline: wgpu::ComputePipeline,
    pub diffuse_bind_group: wgpu::BindGroup,

    pub colorize_pipeline: wgpu::ComputePipeline,
    pub colorize_bind_group: wgpu::BindGroup,

    pub draw_agents_pipeline: wgpu::ComputePipeline,
    pub draw_agents_bind_group: wgpu::BindGroup,
}

// ======================== Pipeline Creation ========================

pub fn create_pipelines(device: &wgpu::Device, world: &WorldState) -> Pipelines {
    let update_shader = load_shader(device, "agent_update", include_str!("shaders/agent_update.wgsl"));
    let diffuse_shader = load_shader(device, "diffuse", include_str!("shaders/diffuse.wgsl"));
    let colorize_shader = load_shader(device, "colorize", include_str!("shaders/colorize.wgsl"));
    let draw_agents_shader =
        load_shader(device, "draw_agents", include_str!("shaders/draw_agents.wgsl"));

    // ================================================================
    // AGENT UPDATE PIPELINE
    // ================================================================
    let update_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("agent_update_bgl"),
        entries: &[
            bgl_uniform(0),
            bgl_storage_ro(1),
            bgl_storage_rw(2),
            bgl_storage_rw(3),
            bgl_texture(4),
            bgl_texture(5),
        ],
    });

    let update_pipeline = create_compute_pipeline(device, "agent_update", &update_bgl, &update_shader);

    let update_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("agent_update_bg"),
        layout: &update_bgl,
        entries: &[
            bg_buffer(0, &world.sim_params_buffer),
            bg_buffer(1, &world.species_buffer),
            bg_buffer(2, &world.agent_buffer),
            bg_buffer(3, &world.trail_map),
            bg_texture(4, &world.parameter_map_1_view),
            bg_texture(5, &world.parameter_map_2_view),
        ],
    });

    // ================================================================
    // DIFFUSE/DECAY PIPELINE
    // ================================================================
    let diffuse_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("diffuse_bgl"),
        entries: &[bgl_uniform(0), bgl_storage_ro(1), bgl_storage_rw(2)],
    });

    let diffuse_pipeline = create_compute_pipeline(device, "diffuse", &diffuse_bgl, &diffuse_shader);

    let diffuse_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("diffuse_bg"),
        layout: &diffuse_bgl,
        entries: &[
            bg_buffer(0, &world.sim_params_buffer),
            bg_buffer(1, &world.trail_map),
            bg_buffer(2, &world.diffused_trail_map),
        ],
    });

    // ================================================================
    // COLORIZE PIPELINE
    // ================================================================
    let colorize_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("colorize_bgl"),
        entries: &[
            bgl_uniform(0),
            bgl_storage_ro(1),
            bgl_storage_ro(2),
            bgl_texture(3),
            bgl_storage_texture(4, wgpu::TextureFormat::Rgba8Unorm),
        ],
    });

    let colorize_pipeline = create_compute_pipeline(device, "colorize", &colorize_bgl, &colorize_shader);

    let colorize_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("colorize_bg"),
        layout: &colorize_bgl,
        entries: &[
            bg_buffer(0, &world.sim_params_buffer),
            bg_buffer(1, &world.species_buffer),
            bg_buffer(2, &world.trail_map),
            bg_texture(3, &world.color_map_view),
            bg_texture(4, &world.display_view),
        ],
    });

    // ================================================================
    // DRAW AGENTS PIPELINE (agents-only debug view)
    // ================================================================
    let draw_agents_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("draw_agents_bgl"),
        entries: &[
            bgl_uniform(0),
            bgl_storage_ro(1),
            bgl_storage_ro(2),
            bgl_storage_texture(3, wgpu::TextureFormat::Rgba8Unorm),
        ],
    });

    let draw_agents_pipeline =
        create_compute_pipeline(device, "draw_agents", &draw_agents_bgl, &draw_agents_shader);

    let draw_agents_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("draw_agents_bg"),
        layout: &draw_agents_bgl,
        entries: &[
            bg_buffer(0, &world.sim_params_buffer),
            bg_buffer(1, &world.species_buffer),
            bg_buffer(2, &world.agent_buffer),
            bg_texture(3, &world.display_view),
        ],
    });

    Pipelines {
        update_pipeline,
        update_bind_group,
        diffuse_pipeline,
        diffuse_bind_group,
        colorize_pipeline,
        colorize_bind_group,
        draw_agents_pipeline,
        draw_agents_bind_group,
    }
}

// ======================== Helpers ========================

fn load_shader(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

fn create_compute_pipeline(
    device: &wgpu::Device,
    name: &str,
    bgl: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
) -> wgpu::ComputePipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{name}_pipeline_layout")),
        bind_group_layouts: &[bgl],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&format!("{name}_pipeline")),
        layout: Some(&layout),
        module,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}

fn bgl_uniform(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bgl_storage_ro(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bgl_storage_rw(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bgl_texture(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn bgl_storage_texture(binding: u32, format: wgpu::TextureFormat) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

fn bg_buffer(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

fn bg_texture<'a>(binding: u32, view: &'a wgpu::TextureView) -> wgpu::BindGroupEntry<'a> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::TextureView(view),
    }
}

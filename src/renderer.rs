// renderer.rs — wgpu 渲染器（全屏三角形 + 逐像素投影换算）

use crate::error::ViewerError;
use crate::images::{self, PreparedImage};
use crate::projection::table::LookupTable;
use crate::projection::{Projection, TableRole};
use crate::rotation::RotationMatrix;
use crate::session::Backend;
use crate::shaders;
use crate::viewer::Viewport;
use std::collections::HashMap;
use wgpu::util::DeviceExt;
use winit::window::Window;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ViewUniform {
    rotation: [[f32; 4]; 3], // mat3x3 每列按 vec4 对齐
    tex_scale: [f32; 2],
    zoom: f32,
    pad: f32,
}

/// 已上传的贴图和绑定它的 group 0
pub struct MapTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// 一个 (源, 输出) 组合：pipeline 加两侧的查找表
pub struct Composition {
    pipeline: wgpu::RenderPipeline,
    input_tables: wgpu::BindGroup,
    output_tables: wgpu::BindGroup,
}

pub struct Renderer {
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,

    view_bind_group_layout: wgpu::BindGroupLayout,
    table_bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,

    // 查找表纹理按名字缓存，进程内只上传一次
    tables: HashMap<&'static str, wgpu::TextureView>,
    // 空槽位用的 1 像素表
    dummy_table: wgpu::TextureView,

    view_uniform: ViewUniform,
    view_buffer: wgpu::Buffer,

    // UI
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

fn present_mode(vsync: bool) -> wgpu::PresentMode {
    if vsync {
        wgpu::PresentMode::AutoVsync
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}

fn table_layout_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D1,
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
        },
        count: None,
    }
}

impl Renderer {
    pub async fn new(window: &Window, vsync: bool) -> Result<Self, ViewerError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = unsafe { instance.create_surface(window) }
            .map_err(|e| ViewerError::Gpu(format!("create surface: {e}")))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| ViewerError::Gpu("no suitable adapter".into()))?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    label: None,
                },
                None,
            )
            .await
            .map_err(|e| ViewerError::Gpu(format!("request device: {e}")))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| ViewerError::Gpu("surface has no formats".into()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: present_mode(vsync),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            // 纹理右侧和底部是补边，不能环绕
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let view_uniform = ViewUniform {
            rotation: RotationMatrix::identity().to_gpu_columns(),
            tex_scale: [1.0, 1.0],
            zoom: 1.0,
            pad: 0.0,
        };
        let view_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("View Buffer"),
            contents: bytemuck::cast_slice(&[view_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let view_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry { // View Uniform
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry { // Map Texture
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry { // Sampler
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
            label: Some("view_bind_group_layout"),
        });

        let table_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[table_layout_entry(0), table_layout_entry(1), table_layout_entry(2)],
            label: Some("table_bind_group_layout"),
        });

        // group 0: 视图 + 贴图，group 1: 源投影表，group 2: 输出投影表
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[
                &view_bind_group_layout,
                &table_bind_group_layout,
                &table_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });

        let dummy_table = Self::upload_table(&device, &queue, "dummy_table", &[0.0]);

        // --- Egui Setup ---
        let egui_ctx = egui::Context::default();
        let mut egui_state = egui_winit::State::new(window);
        // 显式设置 pixels_per_point 以处理高 DPI 显示器
        egui_state.set_pixels_per_point(window.scale_factor() as f32);
        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        Ok(Self {
            surface, device, queue, config, size,
            view_bind_group_layout, table_bind_group_layout, pipeline_layout,
            sampler,
            tables: HashMap::new(),
            dummy_table,
            view_uniform, view_buffer,
            egui_ctx, egui_state, egui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    pub fn set_vsync(&mut self, vsync: bool) {
        self.config.present_mode = present_mode(vsync);
        self.surface.configure(&self.device, &self.config);
    }

    pub fn update_view(&mut self, rotation: &RotationMatrix, zoom: f64, sx: f32, sy: f32) {
        self.view_uniform.rotation = rotation.to_gpu_columns();
        self.view_uniform.tex_scale = [sx, sy];
        self.view_uniform.zoom = zoom as f32;
        self.queue
            .write_buffer(&self.view_buffer, 0, bytemuck::cast_slice(&[self.view_uniform]));
    }

    fn upload_table(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        name: &str,
        data: &[f32],
    ) -> wgpu::TextureView {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(name),
                size: wgpu::Extent3d {
                    width: data.len() as u32,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D1,
                format: wgpu::TextureFormat::R32Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            bytemuck::cast_slice(data),
        );
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// 把一侧的查找表放进固定槽位，多余槽位绑空表
    fn table_bind_group(&mut self, label: &str, tables: &[LookupTable]) -> Result<wgpu::BindGroup, ViewerError> {
        if tables.len() > shaders::MAX_TABLES {
            return Err(ViewerError::Gpu(format!("{label}: {} tables exceed the {} slots", tables.len(), shaders::MAX_TABLES)));
        }
        let max_width = self.device.limits().max_texture_dimension_1d as usize;
        for table in tables {
            if table.data.len() > max_width {
                return Err(ViewerError::Gpu(format!("{} has {} samples, GPU allows {max_width}", table.name, table.data.len())));
            }
            if !self.tables.contains_key(table.name) {
                let view = Self::upload_table(&self.device, &self.queue, table.name, table.data);
                log::debug!("uploaded lookup table {} ({} samples)", table.name, table.data.len());
                self.tables.insert(table.name, view);
            }
        }

        let views: Vec<&wgpu::TextureView> = (0..shaders::MAX_TABLES)
            .map(|slot| {
                tables
                    .get(slot)
                    .and_then(|t| self.tables.get(t.name))
                    .unwrap_or(&self.dummy_table)
            })
            .collect();
        let entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(slot, view)| wgpu::BindGroupEntry {
                binding: slot as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();

        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.table_bind_group_layout,
            entries: &entries,
            label: Some(label),
        }))
    }

    pub fn render_with_ui(
        &mut self,
        window: &Window,
        scene: Option<(&MapTexture, &Composition)>,
        viewport: Viewport,
        run_ui: impl FnOnce(&egui::Context),
    ) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        // 1. Render Map (Fullscreen Triangle, letterboxed)
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            if let Some((map, composition)) = scene {
                if viewport.width >= 1.0 && viewport.height >= 1.0 {
                    render_pass.set_viewport(viewport.x, viewport.y, viewport.width, viewport.height, 0.0, 1.0);
                    render_pass.set_pipeline(&composition.pipeline);
                    render_pass.set_bind_group(0, &map.bind_group, &[]);
                    render_pass.set_bind_group(1, &composition.input_tables, &[]);
                    render_pass.set_bind_group(2, &composition.output_tables, &[]);
                    render_pass.draw(0..3, 0..1); // Draw 3 vertices for fullscreen coverage
                }
            }
        }

        // 2. Render UI
        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, run_ui);

        self.egui_state.handle_platform_output(window, &self.egui_ctx, full_output.platform_output);
        let clipped_primitives = self.egui_ctx.tessellate(full_output.shapes);

        let screen_descriptor = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, delta);
        }

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &clipped_primitives,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: true },
                })],
                depth_stencil_attachment: None,
            });
            self.egui_renderer.render(&mut render_pass, &clipped_primitives, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

impl Backend for Renderer {
    type Texture = MapTexture;
    type Composition = Composition;

    fn upload_texture(&mut self, image: PreparedImage) -> Result<MapTexture, ViewerError> {
        // 获取 GPU 纹理尺寸限制
        let max_texture_dimension = self.device.limits().max_texture_dimension_2d;
        let image = images::fit_texture_limit(image, max_texture_dimension);

        let (width, height) = image.pixels.dimensions();
        let texture_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            size: texture_size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            label: Some("map_texture"),
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            texture_size,
        );

        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.view_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.view_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
            label: Some("map_bind_group"),
        });
        log::debug!("uploaded {width}x{height} map texture");

        Ok(MapTexture {
            _texture: texture,
            bind_group,
        })
    }

    fn build_composition(&mut self, source: Projection, output: Projection) -> Result<Composition, ViewerError> {
        let name = shaders::composition_name(source, output);
        let input_tables = self.table_bind_group("input_tables", &source.lookup_tables(TableRole::Input)?)?;
        let output_tables = self.table_bind_group("output_tables", &output.lookup_tables(TableRole::Output)?)?;

        // 校验错误默认会 panic，这里收集起来变成可回退的错误
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&name),
            source: wgpu::ShaderSource::Wgsl(shaders::composition_source(source, output).into()),
        });
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&name),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[], // 无顶点缓冲，Shader 自生成
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None, // 不要剔除，因为我们要画一个覆盖全屏的三角形
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            log::error!("failed to build {name}");
            return Err(ViewerError::Shader {
                name,
                log: error.to_string(),
            });
        }

        Ok(Composition {
            pipeline,
            input_tables,
            output_tables,
        })
    }
}

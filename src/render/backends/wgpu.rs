use crate::render::backend::{
    BackendCaps, ErasedSurface, ExternalHandle, Origin, PixelFormat, RenderBackend, RgbaImage, SurfaceSize,
};
use crate::render::upload::{FrameUpload, TextureLayout};
use anyhow::{anyhow, Context, Result};
use hashbrown::HashMap;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// This trait abstracts over the wgpu context (device, queue, texture management) so a host
/// application can share its own device with the bridge and composite the textures it produces.
pub trait WgpuContextProvider: Send + Sync {
    fn device(&self) -> &wgpu::Device;
    fn queue(&self) -> &wgpu::Queue;
    fn create_texture(&self, width: u32, height: u32, format: wgpu::TextureFormat) -> u64;
    fn get_texture(&self, id: u64) -> Option<(wgpu::Texture, wgpu::TextureView)>;
    fn remove_texture(&self, id: u64);
}

/// A device without a window, for offscreen rendering and tests.
pub struct HeadlessContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: Mutex<HashMap<u64, (wgpu::Texture, wgpu::TextureView)>>,
    next_id: AtomicU64,
}

impl HeadlessContext {
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::request())
    }

    async fn request() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow!("no wgpu adapter available"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("drawbridge headless device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )
            .await?;

        Ok(Self { device, queue, textures: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1) })
    }
}

impl WgpuContextProvider for HeadlessContext {
    fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn create_texture(&self, width: u32, height: u32, format: wgpu::TextureFormat) -> u64 {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("drawbridge backbuffer"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut map) = self.textures.lock() {
            map.insert(id, (texture, view));
        }
        id
    }

    fn get_texture(&self, id: u64) -> Option<(wgpu::Texture, wgpu::TextureView)> {
        self.textures.lock().ok()?.get(&id).cloned()
    }

    fn remove_texture(&self, id: u64) {
        if let Ok(mut map) = self.textures.lock() {
            if let Some((texture, _)) = map.remove(&id) {
                texture.destroy();
            }
        }
    }
}

/// Draws a backbuffer texture over a whole target as one textured quad.
const QUAD_SHADER: &str = r#"
struct Quad {
    extent: vec2<f32>,
    flip: f32,
    _pad: f32,
};

@group(0) @binding(0) var<uniform> quad: Quad;
@group(0) @binding(1) var frame: texture_2d<f32>;
@group(0) @binding(2) var frame_sampler: sampler;

struct VertexOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOut {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0), vec2<f32>(1.0, 0.0), vec2<f32>(0.0, 1.0),
        vec2<f32>(0.0, 1.0), vec2<f32>(1.0, 0.0), vec2<f32>(1.0, 1.0),
    );
    let c = corners[index];
    var out: VertexOut;
    out.position = vec4<f32>(c.x * 2.0 - 1.0, 1.0 - c.y * 2.0, 0.0, 1.0);
    // Bottom-left textures hold the top row last.
    let v = select(c.y, 1.0 - c.y, quad.flip > 0.5);
    out.uv = vec2<f32>(c.x, v) * quad.extent;
    return out;
}

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    return textureSample(frame, frame_sampler, in.uv);
}
"#;

/// Size of the `Quad` uniform block.
const QUAD_UNIFORM_SIZE: u64 = 16;

/// Where presented frames are drawn. The view belongs to the host, which
/// swaps it out whenever its swapchain image changes.
pub struct PresentTarget {
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

/// Shared state for drawing the quad; pipelines are built per target format.
struct QuadPipeline {
    shader: wgpu::ShaderModule,
    bind_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl QuadPipeline {
    fn new(device: &wgpu::Device) -> Result<Self> {
        scoped(device, "building the present pipeline", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("drawbridge quad shader"),
                source: wgpu::ShaderSource::Wgsl(QUAD_SHADER.into()),
            });
            let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("drawbridge quad bind layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: std::num::NonZeroU64::new(QUAD_UNIFORM_SIZE),
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("drawbridge quad pipeline layout"),
                bind_group_layouts: &[&bind_layout],
                push_constant_ranges: &[],
            });
            // Pixels map one to one, so no filtering.
            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("drawbridge quad sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Nearest,
                min_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            });
            Self { shader, bind_layout, pipeline_layout, sampler, pipelines: HashMap::new() }
        })
    }

    fn pipeline(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) -> Result<&wgpu::RenderPipeline> {
        if !self.pipelines.contains_key(&format) {
            let pipeline = scoped(device, "building the present pipeline", || {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("drawbridge quad pipeline"),
                    layout: Some(&self.pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &self.shader,
                        entry_point: Some("vs_main"),
                        buffers: &[],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &self.shader,
                        entry_point: Some("fs_main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    primitive: wgpu::PrimitiveState::default(),
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                })
            })?;
            self.pipelines.insert(format, pipeline);
        }
        self.pipelines.get(&format).ok_or_else(|| anyhow!("no present pipeline for {format:?}"))
    }
}

/// Runs `f` inside validation and out-of-memory error scopes, turning
/// device errors into ordinary failures instead of uncaptured panics.
fn scoped<T>(device: &wgpu::Device, what: &str, f: impl FnOnce() -> T) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());
    match validation.or(oom) {
        Some(e) => Err(anyhow!("{what}: {e}")),
        None => Ok(value),
    }
}

/// A render backend that uploads the backbuffer into wgpu textures and,
/// when the host sets a [`PresentTarget`], draws it there on present.
pub struct WgpuBackend<C: WgpuContextProvider> {
    /// The wgpu context provider that we can use for device, queue, and texture management.
    context: Arc<C>,
    quad: Option<QuadPipeline>,
    target: Option<PresentTarget>,
}

impl<C: WgpuContextProvider> WgpuBackend<C> {
    pub fn new(context: Arc<C>) -> Self {
        Self { context, quad: None, target: None }
    }

    pub fn with_target(context: Arc<C>, target: PresentTarget) -> Self {
        Self { context, quad: None, target: Some(target) }
    }

    /// Sets the view presents draw into. Without one the host composites the
    /// texture itself through [`ExternalHandle::WgpuTextureId`].
    pub fn set_target(&mut self, target: Option<PresentTarget>) {
        self.target = target;
    }

    fn texture(&self, s: &WgpuSurface) -> Result<wgpu::Texture> {
        self.context
            .get_texture(s.texture_store_id)
            .map(|(t, _)| t)
            .ok_or_else(|| anyhow!("invalid texture id {} in WgpuSurface", s.texture_store_id))
    }

    fn quad(&mut self) -> Result<&mut QuadPipeline> {
        if self.quad.is_none() {
            self.quad = Some(QuadPipeline::new(self.context.device())?);
        }
        self.quad.as_mut().ok_or_else(|| anyhow!("present pipeline unavailable"))
    }

    /// Uniforms and bindings for drawing a surface with `layout` as a quad.
    fn bind(&mut self, layout: &TextureLayout, view: &wgpu::TextureView) -> Result<wgpu::BindGroup> {
        let context = Arc::clone(&self.context);
        let device = context.device();
        let (ex, ey) = layout.content_extent();
        let flip = if layout.origin == Origin::BottomLeft { 1.0f32 } else { 0.0 };
        let mut uniform = [0u8; QUAD_UNIFORM_SIZE as usize];
        for (chunk, v) in uniform.chunks_exact_mut(4).zip([ex, ey, flip, 0.0]) {
            chunk.copy_from_slice(&v.to_ne_bytes());
        }

        let quad = self.quad()?;
        scoped(device, "binding the backbuffer texture", || {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("drawbridge quad uniforms"),
                size: QUAD_UNIFORM_SIZE,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            context.queue().write_buffer(&buffer, 0, &uniform);
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("drawbridge quad bind group"),
                layout: &quad.bind_layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(view) },
                    wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&quad.sampler) },
                ],
            })
        })
    }

    /// Copies `texture` into a mappable buffer and returns its tightly packed rows.
    fn read_back(&self, texture: &wgpu::Texture, w: u32, h: u32) -> Result<Vec<u8>> {
        let padded = (w * 4).div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let device = self.context.device();
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("drawbridge snapshot"),
            size: padded as u64 * h as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(h),
                },
            },
            wgpu::Extent3d { width: w, height: h, depth_or_array_layers: 1 },
        );
        self.context.queue().submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()??;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((w * h * 4) as usize);
        for row in mapped.chunks_exact(padded as usize) {
            pixels.extend_from_slice(&row[..(w * 4) as usize]);
        }
        drop(mapped);
        buffer.unmap();
        Ok(pixels)
    }
}

fn downcast(surface: &mut dyn ErasedSurface) -> Result<&mut WgpuSurface> {
    surface
        .as_any_mut()
        .downcast_mut::<WgpuSurface>()
        .ok_or_else(|| anyhow!("WgpuBackend used with non-wgpu surface"))
}

impl<C: WgpuContextProvider + 'static> RenderBackend for WgpuBackend<C> {
    fn name(&self) -> &str {
        "WgpuBackend"
    }

    fn caps(&self) -> BackendCaps {
        BackendCaps {
            npot_textures: true,
            format: PixelFormat::Rgba8,
            origin: Origin::TopLeft,
            max_texture_size: self.context.device().limits().max_texture_dimension_2d,
        }
    }

    fn create_surface(&mut self, layout: &TextureLayout) -> Result<Box<dyn ErasedSurface>> {
        let context = Arc::clone(&self.context);
        let device = context.device();
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let id = context.create_texture(layout.texture.width, layout.texture.height, wgpu::TextureFormat::Rgba8Unorm);
        let validation = pollster::block_on(device.pop_error_scope());
        let oom = pollster::block_on(device.pop_error_scope());
        if let Some(e) = validation.or(oom) {
            // The failed texture is invalid; dropping it must not raise a second error.
            let _ = scoped(device, "releasing a failed texture", || context.remove_texture(id));
            return Err(anyhow!(
                "allocating a {}x{} texture: {e}",
                layout.texture.width,
                layout.texture.height
            ));
        }

        let (_, view) = context
            .get_texture(id)
            .ok_or_else(|| anyhow!("texture {id} vanished from the context store"))?;
        let bind_group = match self.bind(layout, &view) {
            Ok(bound) => bound,
            Err(e) => {
                context.remove_texture(id);
                return Err(e);
            }
        };
        Ok(Box::new(WgpuSurface { layout: *layout, texture_store_id: id, frame_id: 0, bind_group }))
    }

    fn upload(&mut self, surface: &mut dyn ErasedSurface, upload: &FrameUpload) -> Result<()> {
        let s = downcast(surface)?;
        let texture = self.texture(s)?;
        let r = upload.region;

        self.context.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: r.x as u32, y: r.y as u32, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            &upload.bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(upload.stride),
                rows_per_image: Some(r.height),
            },
            wgpu::Extent3d { width: r.width, height: r.height, depth_or_array_layers: 1 },
        );
        Ok(())
    }

    /// Draws the surface over the present target, if the host set one, and
    /// flushes the uploads either way.
    fn present(&mut self, surface: &mut dyn ErasedSurface) -> Result<()> {
        let s = downcast(surface)?;
        let context = Arc::clone(&self.context);
        let device = context.device();

        let Some(format) = self.target.as_ref().map(|t| t.format) else {
            context.queue().submit(std::iter::empty());
            s.frame_id = s.frame_id.wrapping_add(1);
            return Ok(());
        };
        let pipeline = self.quad()?.pipeline(device, format)?.clone();
        let target = self.target.as_ref().ok_or_else(|| anyhow!("present target was cleared"))?;

        let commands = scoped(device, "drawing the frame", || {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("drawbridge present"),
            });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("drawbridge present pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target.view,
                        resolve_target: None,
                        ops: wgpu::Operations { load: wgpu::LoadOp::Clear(wgpu::Color::BLACK), store: wgpu::StoreOp::Store },
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                pass.set_pipeline(&pipeline);
                pass.set_bind_group(0, &s.bind_group, &[]);
                pass.draw(0..6, 0..1);
            }
            encoder.finish()
        })?;
        context.queue().submit(Some(commands));
        s.frame_id = s.frame_id.wrapping_add(1);
        Ok(())
    }

    fn snapshot(&mut self, surface: &mut dyn ErasedSurface) -> Result<RgbaImage> {
        let s = downcast(surface)?;
        let texture = self.texture(s)?;
        let (w, h) = (s.layout.content.width, s.layout.content.height);
        let pixels = self.read_back(&texture, w, h).context("reading back the backbuffer texture")?;
        RgbaImage::from_raw(pixels, w, h, w * 4, PixelFormat::Rgba8)
    }

    fn external_handle(&mut self, surface: &mut dyn ErasedSurface) -> Option<ExternalHandle> {
        let s = surface.as_any_mut().downcast_mut::<WgpuSurface>()?;
        Some(ExternalHandle::WgpuTextureId {
            id: s.texture_store_id,
            width: s.layout.texture.width,
            height: s.layout.texture.height,
            frame_id: s.frame_id,
        })
    }

    fn finish(&mut self) -> Result<()> {
        self.context.device().poll(wgpu::Maintain::Wait);
        Ok(())
    }

    fn destroy_surface(&mut self, surface: Box<dyn ErasedSurface>) {
        if let Some(s) = surface.as_any().downcast_ref::<WgpuSurface>() {
            self.context.remove_texture(s.texture_store_id);
        }
    }
}

pub struct WgpuSurface {
    layout: TextureLayout,
    /// Id of the texture in the context provider's store.
    texture_store_id: u64,
    frame_id: u64,
    bind_group: wgpu::BindGroup,
}

impl ErasedSurface for WgpuSurface {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn size(&self) -> SurfaceSize {
        self.layout.texture
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use image::RgbaImage;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};
use winit::dpi::PhysicalSize;

use crate::scene::FrameSnapshot;
use crate::types::Antialiasing;

use super::context::GpuContext;
use super::mesh::{PlaneMesh, PLANE_VERTEX_COUNT};
use super::pipeline::{build_slide_entries, PipelineLayouts, WaterProgram};
use super::textures::{create_slide_sampler, ImageTexture};
use super::uniforms::WaterUniforms;

/// Acquiring a frame slower than this is logged.
const FRAME_ACQUIRE_BUDGET: Duration = Duration::from_millis(50);

struct MultisampleTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl MultisampleTarget {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: PhysicalSize<u32>,
        sample_count: u32,
    ) -> Self {
        let extent = wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("msaa color target"),
            size: extent,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Bind group for a (current, next) texture pair, keyed by upload ids.
struct SlideBinding {
    key: (u64, u64),
    bind_group: wgpu::BindGroup,
}

struct RenderStats {
    last_update: Instant,
    frames: u32,
}

impl RenderStats {
    fn record<T>(&mut self, frame: &FrameSnapshot<T>) {
        let now = Instant::now();
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.last_update);
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames as f32 / elapsed.as_secs_f32();
            self.frames = 0;
            self.last_update = now;
            debug!(
                fps = fps.round(),
                time = frame.time,
                ripples = frame.ripple_count,
                mix = frame.mix,
                phase = ?frame.phase,
                "render stats"
            );
        }
    }
}

/// Every object that keeps the device alive. Dropped as a unit on release,
/// which also drops the device and surface.
struct GpuResources {
    layouts: PipelineLayouts,
    program: WaterProgram,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    slides: Option<SlideBinding>,
    mesh: Option<PlaneMesh>,
    multisample_target: Option<MultisampleTarget>,
    context: GpuContext,
}

impl GpuResources {
    fn rebuild_multisample_target(&mut self) {
        if let Some(target) = self.multisample_target.take() {
            target.texture.destroy();
        }
        self.multisample_target = build_multisample_target(&self.context);
    }

    /// Brings the mesh and slide bind group up to date with `frame`.
    /// Returns false when there is nothing to draw yet.
    fn prepare_draw(&mut self, frame: &FrameSnapshot<Arc<ImageTexture>>) -> bool {
        let (Some(current), Some(plane)) = (frame.current.as_ref(), frame.plane) else {
            return false;
        };
        let next = frame.next.as_ref().unwrap_or(current);

        if self
            .mesh
            .as_ref()
            .is_none_or(|mesh| mesh.revision() != frame.geometry_revision)
        {
            if let Some(old) = self.mesh.take() {
                old.destroy();
            }
            self.mesh = Some(PlaneMesh::new(
                &self.context.device,
                plane,
                frame.geometry_revision,
            ));
        }

        let key = (current.id, next.id);
        if self.slides.as_ref().is_none_or(|slides| slides.key != key) {
            let bind_group = self
                .context
                .device
                .create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("slide bind group"),
                    layout: &self.layouts.texture_layout,
                    entries: &build_slide_entries(&current.view, &next.view, &self.sampler),
                });
            self.slides = Some(SlideBinding { key, bind_group });
        }
        true
    }

    fn destroy(self) {
        if let Some(mesh) = self.mesh {
            mesh.destroy();
        }
        if let Some(target) = self.multisample_target {
            target.texture.destroy();
        }
        self.uniform_buffer.destroy();
    }
}

pub(crate) struct GpuState {
    resources: Option<GpuResources>,
    size: PhysicalSize<u32>,
    sample_count: u32,
    uniforms: WaterUniforms,
    next_texture_id: u64,
    stats: RenderStats,
}

impl GpuState {
    /// Creates the device, surface and water program. Fails when any of
    /// them is unavailable; there is no partially built state.
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        antialiasing: Antialiasing,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size, antialiasing)?;
        let layouts = PipelineLayouts::new(&context.device);

        let started = Instant::now();
        let program = WaterProgram::new(
            &context.device,
            &layouts,
            context.surface_format,
            context.sample_count,
        )
        .context("failed to build water program")?;
        debug!(
            duration_ms = started.elapsed().as_millis(),
            "built water pipeline"
        );

        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("water uniform buffer"),
            size: std::mem::size_of::<WaterUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniform bind group"),
                layout: &layouts.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        let uniforms = WaterUniforms::new(context.size.width, context.size.height);
        write_uniforms(&context.queue, &uniform_buffer, &uniforms);

        let sampler = create_slide_sampler(&context.device);
        let multisample_target = build_multisample_target(&context);
        let size = context.size;
        let sample_count = context.sample_count;

        Ok(Self {
            resources: Some(GpuResources {
                layouts,
                program,
                uniform_buffer,
                uniform_bind_group,
                sampler,
                slides: None,
                mesh: None,
                multisample_target,
                context,
            }),
            size,
            sample_count,
            uniforms,
            next_texture_id: 0,
            stats: RenderStats {
                last_update: Instant::now(),
                frames: 0,
            },
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub(crate) fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Uploads a decoded slide. Returns `None` once the GPU was released.
    pub(crate) fn upload_image(&mut self, image: &RgbaImage) -> Option<Arc<ImageTexture>> {
        let resources = self.resources.as_ref()?;
        let id = self.next_texture_id;
        self.next_texture_id += 1;
        Some(Arc::new(ImageTexture::upload(
            &resources.context.device,
            &resources.context.queue,
            image,
            id,
            resources.context.max_texture_dimension,
        )))
    }

    /// Drops any cached binding that references `texture` and frees its
    /// GPU memory.
    pub(crate) fn release_image(&mut self, texture: &ImageTexture) {
        if let Some(resources) = self.resources.as_mut() {
            if resources
                .slides
                .as_ref()
                .is_some_and(|slides| slides.key.0 == texture.id || slides.key.1 == texture.id)
            {
                resources.slides = None;
            }
        }
        texture.destroy();
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        let Some(resources) = self.resources.as_mut() else {
            return;
        };
        resources.context.resize(new_size);
        resources.rebuild_multisample_target();
        self.size = resources.context.size;
    }

    pub(crate) fn reconfigure(&mut self) {
        if let Some(resources) = self.resources.as_ref() {
            resources.context.reconfigure();
        }
    }

    pub(crate) fn render(
        &mut self,
        frame: &FrameSnapshot<Arc<ImageTexture>>,
    ) -> Result<(), wgpu::SurfaceError> {
        let Some(resources) = self.resources.as_mut() else {
            return Ok(());
        };

        let acquire_start = Instant::now();
        let output = resources.context.surface.get_current_texture()?;
        let acquire_duration = acquire_start.elapsed();
        if acquire_duration > FRAME_ACQUIRE_BUDGET {
            warn!(
                duration_ms = acquire_duration.as_millis(),
                "acquiring frame took longer than expected"
            );
        }
        self.stats.record(frame);

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            resources
                .context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("water encoder"),
                });

        let drawable = resources.prepare_draw(frame);
        self.uniforms.apply(frame);
        write_uniforms(
            &resources.context.queue,
            &resources.uniform_buffer,
            &self.uniforms,
        );

        {
            let (attachment_view, resolve_target) =
                if let Some(msaa) = resources.multisample_target.as_ref() {
                    (&msaa.view, Some(&view))
                } else {
                    (&view, None)
                };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("water pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attachment_view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if drawable {
                if let (Some(slides), Some(mesh)) = (&resources.slides, &resources.mesh) {
                    render_pass.set_pipeline(&resources.program.pipeline);
                    render_pass.set_bind_group(0, &resources.uniform_bind_group, &[]);
                    render_pass.set_bind_group(1, &slides.bind_group, &[]);
                    render_pass.set_vertex_buffer(0, mesh.buffer().slice(..));
                    render_pass.draw(0..PLANE_VERTEX_COUNT, 0..1);
                }
            }
        }

        resources
            .context
            .queue
            .submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Frees every GPU object and drops the device and surface. Later calls
    /// to [`GpuState::render`] do nothing.
    pub(crate) fn release(&mut self) {
        if let Some(resources) = self.resources.take() {
            resources.destroy();
            debug!("released GPU resources");
        }
    }
}

fn build_multisample_target(context: &GpuContext) -> Option<MultisampleTarget> {
    (context.sample_count > 1).then(|| {
        MultisampleTarget::new(
            &context.device,
            context.surface_format,
            context.size,
            context.sample_count,
        )
    })
}

fn write_uniforms(queue: &wgpu::Queue, buffer: &wgpu::Buffer, uniforms: &WaterUniforms) {
    queue.write_buffer(buffer, 0, bytemuck::bytes_of(uniforms));
}

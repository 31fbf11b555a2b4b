use wgpu::util::DeviceExt;

use crate::geometry::{plane_vertices, PlaneSize, PlaneVertex};

pub(crate) const PLANE_VERTEX_COUNT: u32 = 6;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

pub(crate) fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<PlaneVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

/// Vertex buffer for the image plane. Rebuilt whenever the plane size
/// changes; the previous buffer is destroyed first.
pub(crate) struct PlaneMesh {
    buffer: wgpu::Buffer,
    revision: u64,
}

impl PlaneMesh {
    pub fn new(device: &wgpu::Device, size: PlaneSize, revision: u64) -> Self {
        let vertices = plane_vertices(size);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("image plane vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self { buffer, revision }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn destroy(&self) {
        self.buffer.destroy();
    }
}

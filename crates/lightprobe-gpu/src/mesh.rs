//! Sphere mesh vertex and index buffers.

use lightprobe_core::mesh::{SphereMesh, SphereVertex};
use tracing::debug;
use wgpu::util::DeviceExt;

/// An index buffer and its element count.
#[derive(Debug)]
pub struct IndexBuffer {
    pub buffer: wgpu::Buffer,
    pub count: u32,
}

impl IndexBuffer {
    fn new(device: &wgpu::Device, label: &str, indices: &[u32]) -> Self {
        Self {
            buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
            count: indices.len() as u32,
        }
    }
}

/// GPU copy of a [`SphereMesh`]: one shared vertex buffer and three index
/// sets (filled triangles, wireframe edges, overlay grid).
#[derive(Debug)]
pub struct MeshBuffers {
    pub vertices: wgpu::Buffer,
    pub triangles: IndexBuffer,
    pub wire: IndexBuffer,
    pub grid: IndexBuffer,
}

impl MeshBuffers {
    pub fn new(device: &wgpu::Device, mesh: &SphereMesh) -> Self {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lightprobe_sphere_vertices"),
            contents: bytemuck::cast_slice(mesh.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let buffers = Self {
            vertices,
            triangles: IndexBuffer::new(
                device,
                "lightprobe_sphere_triangles",
                &mesh.triangle_indices(),
            ),
            wire: IndexBuffer::new(device, "lightprobe_sphere_wire", &mesh.wire_indices()),
            grid: IndexBuffer::new(device, "lightprobe_sphere_grid", &mesh.grid_indices()),
        };
        debug!(
            rows = mesh.rows(),
            columns = mesh.columns(),
            triangles = buffers.triangles.count / 3,
            "sphere mesh uploaded"
        );
        buffers
    }

    /// Vertex layout of [`SphereVertex`]: globe position, chart and polar
    /// coordinates at locations 0, 1 and 2.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SphereVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

//! Tessellated UV sphere with three alternative 2D layouts per vertex.
//!
//! Vertex `(i, j)` sits at elevation `π·i/R − π/2` and azimuth `2π·j/C − π`.
//! Besides its 3D position on the unit sphere, every vertex carries its
//! equirectangular ("chart") coordinate in `[0, 1]²` and its azimuthal
//! ("polar") coordinate inside the radius-2 disc, with the north pole at
//! the disc centre and the south pole on its rim.

use std::f64::consts::{FRAC_PI_2, PI};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Tessellation of the sphere mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshConfig {
    pub rows: u32,
    pub columns: u32,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            rows: 32,
            columns: 64,
        }
    }
}

/// One mesh vertex, laid out for direct upload as a vertex buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SphereVertex {
    /// Unit-sphere position.
    pub globe: [f32; 3],
    /// Equirectangular coordinate.
    pub chart: [f32; 2],
    /// Azimuthal disc coordinate.
    pub polar: [f32; 2],
}

/// Immutable sphere geometry: vertices, quad faces and the overlay grid.
#[derive(Debug, Clone)]
pub struct SphereMesh {
    rows: u32,
    columns: u32,
    vertices: Vec<SphereVertex>,
    quads: Vec<[u32; 4]>,
    grid_lines: Vec<[u32; 2]>,
}

impl SphereMesh {
    /// Build a mesh with `rows × columns` quads. Rows are raised to at least
    /// 2 and columns to at least 4 so the grid has an equator and meridians.
    pub fn new(config: MeshConfig) -> Self {
        let rows = config.rows.max(2);
        let columns = config.columns.max(4);

        Self {
            rows,
            columns,
            vertices: build_vertices(rows, columns),
            quads: build_quads(rows, columns),
            grid_lines: build_grid_lines(rows, columns),
        }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    /// `(rows + 1) × (columns + 1)` vertices, row-major from the south pole.
    pub fn vertices(&self) -> &[SphereVertex] {
        &self.vertices
    }

    /// `rows × columns` quads in row-major order. Each quad lists its
    /// corners `(i, j)`, `(i+1, j)`, `(i+1, j+1)`, `(i, j+1)`, which winds
    /// clockwise when seen from outside the sphere.
    pub fn quads(&self) -> &[[u32; 4]] {
        &self.quads
    }

    /// Overlay grid: the equator ring, then four meridian segments per row
    /// at columns `0`, `C/4`, `C/2` and `3C/4`.
    pub fn grid_lines(&self) -> &[[u32; 2]] {
        &self.grid_lines
    }

    /// Two triangles per quad, keeping the quad's winding.
    pub fn triangle_indices(&self) -> Vec<u32> {
        self.quads
            .iter()
            .flat_map(|&[a, b, c, d]| [a, b, c, a, c, d])
            .collect()
    }

    /// Every quad edge exactly once, as a line list, for wireframe drawing.
    pub fn wire_indices(&self) -> Vec<u32> {
        let (r, c) = (self.rows, self.columns);
        let at = |i: u32, j: u32| i * (c + 1) + j;
        let mut lines = Vec::with_capacity((((r + 1) * c + r * (c + 1)) * 2) as usize);
        for i in 0..=r {
            for j in 0..c {
                lines.extend([at(i, j), at(i, j + 1)]);
            }
        }
        for i in 0..r {
            for j in 0..=c {
                lines.extend([at(i, j), at(i + 1, j)]);
            }
        }
        lines
    }

    /// Grid lines flattened into a line-list index buffer.
    pub fn grid_indices(&self) -> Vec<u32> {
        self.grid_lines.iter().flatten().copied().collect()
    }
}

fn build_vertices(r: u32, c: u32) -> Vec<SphereVertex> {
    let mut vertices = Vec::with_capacity(((r + 1) * (c + 1)) as usize);
    for i in 0..=r {
        for j in 0..=c {
            let x = j as f64 / c as f64;
            let y = i as f64 / r as f64;

            let elevation = PI * y - FRAC_PI_2;
            let azimuth = 2.0 * PI * x - PI;
            let polar_radius = 2.0 - 2.0 * y;

            vertices.push(SphereVertex {
                globe: [
                    (azimuth.sin() * elevation.cos()) as f32,
                    elevation.sin() as f32,
                    (azimuth.cos() * elevation.cos()) as f32,
                ],
                chart: [x as f32, y as f32],
                polar: [
                    (azimuth.cos() * polar_radius) as f32,
                    (azimuth.sin() * polar_radius) as f32,
                ],
            });
        }
    }
    vertices
}

fn build_quads(r: u32, c: u32) -> Vec<[u32; 4]> {
    let at = |i: u32, j: u32| i * (c + 1) + j;
    let mut quads = Vec::with_capacity((r * c) as usize);
    for i in 0..r {
        for j in 0..c {
            quads.push([at(i, j), at(i + 1, j), at(i + 1, j + 1), at(i, j + 1)]);
        }
    }
    quads
}

fn build_grid_lines(r: u32, c: u32) -> Vec<[u32; 2]> {
    let at = |i: u32, j: u32| i * (c + 1) + j;
    let equator = r / 2;
    let meridians = [0, c / 4, c / 2, c / 2 + c / 4];

    let mut lines = Vec::with_capacity((c + 4 * r) as usize);
    for j in 0..c {
        lines.push([at(equator, j), at(equator, j + 1)]);
    }
    for i in 0..r {
        for j in meridians {
            lines.push([at(i, j), at(i + 1, j)]);
        }
    }
    lines
}

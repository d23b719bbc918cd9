//! File export: render CHART, POLAR or all six CUBE faces into a dedicated
//! off-screen target and read each render back to the CPU.

use lightprobe_core::image::FloatImage;
use lightprobe_core::request::{CubeFace, RenderFlags, RenderMode, RenderRequest};
use lightprobe_core::store::ImageStore;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::GpuError;
use crate::compositor::Compositor;
use crate::readback;
use crate::target::RenderTarget;
use crate::texture::GpuTexture;

/// Layout of an exported file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    /// Equirectangular, `2·size × size`.
    Chart,
    /// Dome, `size × size`.
    Polar,
    /// Six `size × size` faces, +X −X +Y −Y +Z −Z.
    Cube,
}

impl ExportKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Chart => "chart",
            Self::Polar => "polar",
            Self::Cube => "cube",
        }
    }

    /// The render requests of one export, in page order.
    pub fn requests(self, size: u32, flags: RenderFlags) -> Vec<RenderRequest> {
        let size = size.max(1);
        match self {
            Self::Chart => vec![RenderRequest::new(RenderMode::Chart, 2 * size, size)],
            Self::Polar => vec![RenderRequest::new(RenderMode::Polar, size, size)],
            Self::Cube => CubeFace::ALL
                .iter()
                .map(|&face| RenderRequest::new(RenderMode::CubeFace(face), size, size))
                .collect(),
        }
        .into_iter()
        .map(|request| request.with_flags(flags))
        .collect()
    }
}

/// Owns the export target and the readback staging buffer, both reused
/// across exports.
pub struct ExportDriver {
    target: RenderTarget,
    staging: Option<wgpu::Buffer>,
}

impl ExportDriver {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            target: RenderTarget::new(device, "lightprobe_export_target", 1, 1),
            staging: None,
        }
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Render and read back every page of `kind`. Blocks until the last
    /// page is on the CPU.
    pub fn export(
        &mut self,
        compositor: &mut Compositor,
        store: &ImageStore<GpuTexture>,
        kind: ExportKind,
        size: u32,
        flags: RenderFlags,
    ) -> Result<Vec<FloatImage>, GpuError> {
        let requests = kind.requests(size, flags);
        info!(kind = kind.label(), size, pages = requests.len(), "exporting");

        let mut pages = Vec::with_capacity(requests.len());
        for request in &requests {
            compositor.composite(store, request, &mut self.target);
            let page = readback::read_target(
                compositor.device(),
                compositor.queue(),
                &self.target,
                request.channels(),
                &mut self.staging,
            )?;
            pages.push(page);
        }
        Ok(pages)
    }
}

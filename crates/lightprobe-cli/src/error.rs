#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("GPU error: {0}")]
    Gpu(#[from] lightprobe_gpu::GpuError),
    #[error("project error: {0}")]
    Project(#[from] lightprobe_core::ProjectError),
    #[error("image store error: {0}")]
    Store(#[from] lightprobe_core::StoreError),
    #[error("failed to write output: {0}")]
    Encode(#[from] lightprobe_io::EncodeError),
    #[error("no images to work with: pass --project or at least one photograph")]
    NoImages,
    #[error("cube face {0} is out of range (0..6)")]
    CubeFace(usize),
}

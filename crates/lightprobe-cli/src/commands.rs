//! Subcommand implementations.

use std::path::{Path, PathBuf};

use lightprobe_core::image::ProbeImage;
use lightprobe_core::project::Project;
use lightprobe_core::request::{RenderFlags, RenderRequest};
use lightprobe_core::store::{CpuUpload, ImageStore, StoreError};
use lightprobe_gpu::readback::read_target;
use lightprobe_gpu::{
    Compositor, ExportDriver, ExportKind, GpuContext, GpuTexture, GpuUploader, OverlayStyle,
    RenderTarget,
};
use lightprobe_io::{ProbeDecoder, write_float_tiff};
use tracing::info;

use crate::cli::{Assignment, Source};
use crate::config::CliConfig;
use crate::error::CliError;

/// Decode `images` with default calibration and save them as a project.
pub fn init(output: &Path, images: &[PathBuf]) -> Result<(), CliError> {
    let mut store: ImageStore<ProbeImage> = ImageStore::new();
    for path in images {
        store.add(path, &ProbeDecoder, &mut CpuUpload)?;
    }
    Project::capture(&store).save(output)?;
    info!(images = store.len(), path = %output.display(), "project created");
    Ok(())
}

/// Edit one project entry in place. The image is not decoded.
pub fn calibrate(
    project_path: &Path,
    slot: usize,
    assignments: &[Assignment],
    hidden: Option<bool>,
) -> Result<(), CliError> {
    let mut project = Project::open(project_path)?;
    let entry = project
        .images
        .get_mut(slot)
        .ok_or(StoreError::NotLoaded(slot))?;
    for assignment in assignments {
        entry.calibration.set(assignment.key, assignment.value);
        info!(slot, key = assignment.key.label(), value = assignment.value, "calibration set");
    }
    if let Some(hidden) = hidden {
        entry.hidden = hidden;
    }
    project.selected = Some(slot);
    project.save(project_path)?;
    Ok(())
}

/// Open a device and load the images named by `source` onto it.
fn open_gpu(
    source: &Source,
    config: &CliConfig,
) -> Result<(GpuContext, ImageStore<GpuTexture>, Compositor), CliError> {
    let context = GpuContext::new()?;
    let mut uploader = GpuUploader::new(&context.device, &context.queue);

    let mut store = match &source.project {
        Some(path) => Project::open(path)?.restore(&ProbeDecoder, &mut uploader)?,
        None => {
            let mut store = ImageStore::new();
            for path in &source.images {
                store.add(path, &ProbeDecoder, &mut uploader)?;
            }
            store
        }
    };
    if store.is_empty() {
        return Err(CliError::NoImages);
    }
    if let Some(slot) = source.select {
        store.select(slot)?;
    }

    let compositor = Compositor::new(&context, config.mesh, OverlayStyle::default());
    Ok((context, store, compositor))
}

pub fn export(
    source: &Source,
    config: &CliConfig,
    kind: ExportKind,
    flags: RenderFlags,
    output: &Path,
) -> Result<(), CliError> {
    let (context, store, mut compositor) = open_gpu(source, config)?;
    let mut driver = ExportDriver::new(&context.device);
    let pages = driver.export(&mut compositor, &store, kind, config.export_size, flags)?;
    write_float_tiff(output, &pages)?;
    Ok(())
}

pub fn render(
    source: &Source,
    config: &CliConfig,
    request: RenderRequest,
    output: &Path,
) -> Result<(), CliError> {
    let (context, store, mut compositor) = open_gpu(source, config)?;
    let mut target = RenderTarget::new(&context.device, "lightprobe_render_target", 1, 1);
    compositor.composite(&store, &request, &mut target);
    let page = read_target(
        &context.device,
        &context.queue,
        &target,
        request.channels(),
        &mut None,
    )?;
    write_float_tiff(output, &[page])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightprobe_core::calibration::CalibrationKey;

    #[test]
    fn test_calibrate_edits_project_entry() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("probe.json");
        let mut store: ImageStore<ProbeImage> = ImageStore::new();
        let image = ProbeImage::filled(40, 30, [0.5; 4]);
        store.insert("a.tif", &image, &mut CpuUpload).unwrap();
        store.insert("b.tif", &image, &mut CpuUpload).unwrap();
        Project::capture(&store).save(&file).unwrap();

        let set = [Assignment {
            key: CalibrationKey::SphereAzimuth,
            value: 90.0,
        }];
        calibrate(&file, 1, &set, Some(true)).unwrap();

        let project = Project::open(&file).unwrap();
        assert_eq!(project.selected, Some(1));
        assert_eq!(project.images[1].calibration.sphere_azimuth, 90.0);
        assert!(project.images[1].hidden);
        assert_eq!(project.images[0].calibration.sphere_azimuth, 0.0);

        assert!(matches!(
            calibrate(&file, 5, &set, None),
            Err(CliError::Store(_))
        ));
    }
}

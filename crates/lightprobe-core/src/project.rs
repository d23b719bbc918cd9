//! Project files: the set of loaded images with their calibrations, saved
//! as pretty JSON so a session can be reopened and exported later.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::calibration::Calibration;
use crate::store::{ImageDecoder, ImageStore, StoreError, TextureUpload};

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One image of a project, in slot order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub path: PathBuf,
    pub calibration: Calibration,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub images: Vec<ProjectEntry>,
    /// Index into `images` of the selected image.
    #[serde(default)]
    pub selected: Option<usize>,
}

impl Project {
    /// Snapshot the images of a store.
    pub fn capture<T>(store: &ImageStore<T>) -> Self {
        let mut selected = None;
        let images = store
            .loaded()
            .enumerate()
            .map(|(i, (slot, img))| {
                if store.selected() == Some(slot) {
                    selected = Some(i);
                }
                ProjectEntry {
                    path: img.path.clone(),
                    calibration: img.calibration,
                    hidden: img.hidden,
                }
            })
            .collect();
        Self { images, selected }
    }

    /// Load a project. Relative image paths resolve against the project
    /// file's directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let mut project: Self = serde_json::from_str(&raw)?;
        if let Some(base) = path.parent() {
            for entry in &mut project.images {
                if entry.path.is_relative() {
                    entry.path = base.join(&entry.path);
                }
            }
        }
        info!(path = %path.display(), images = project.images.len(), "project opened");
        Ok(project)
    }

    /// Write the project as pretty JSON.
    ///
    /// Relative image paths are taken against the working directory, not the
    /// project file, so they are made absolute first. Paths inside the
    /// project file's directory are then stored relative to it.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProjectError> {
        let path = path.as_ref();
        let file = std::path::absolute(path)?;
        let mut project = self.clone();
        for entry in &mut project.images {
            let absolute = std::path::absolute(&entry.path)?;
            entry.path = match file.parent().map(|base| absolute.strip_prefix(base)) {
                Some(Ok(relative)) => relative.to_path_buf(),
                _ => absolute,
            };
        }
        let json = serde_json::to_string_pretty(&project)?;
        fs::write(path, json)?;
        info!(path = %path.display(), "project saved");
        Ok(())
    }

    /// Decode and upload every image into a fresh store.
    ///
    /// Images that fail to load are logged and skipped; only a full store
    /// is an error.
    pub fn restore<D, U>(
        &self,
        decoder: &D,
        uploader: &mut U,
    ) -> Result<ImageStore<U::Texture>, ProjectError>
    where
        D: ImageDecoder,
        U: TextureUpload,
    {
        let mut store = ImageStore::new();
        let mut selected = None;
        for (i, entry) in self.images.iter().enumerate() {
            let slot = match store.add(&entry.path, decoder, uploader) {
                Ok(slot) => slot,
                Err(StoreError::Full) => return Err(StoreError::Full.into()),
                Err(e) => {
                    warn!(error = %e, "skipping project image");
                    continue;
                }
            };
            store.set_calibration(slot, entry.calibration)?;
            store.set_hidden(slot, entry.hidden)?;
            if self.selected == Some(i) {
                selected = Some(slot);
            }
        }
        if let Some(slot) = selected {
            store.select(slot)?;
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationKey;
    use crate::image::ProbeImage;
    use crate::store::CpuUpload;

    #[derive(Debug, thiserror::Error)]
    #[error("missing")]
    struct Missing;

    /// Decodes any path except ones containing "missing".
    struct StubDecoder;

    impl ImageDecoder for StubDecoder {
        type Error = Missing;

        fn decode(&self, path: &Path) -> Result<ProbeImage, Missing> {
            if path.to_string_lossy().contains("missing") {
                Err(Missing)
            } else {
                Ok(ProbeImage::filled(64, 48, [0.5; 4]))
            }
        }
    }

    fn sample_store(base: &Path) -> ImageStore<ProbeImage> {
        let mut store = ImageStore::new();
        for name in ["a.tif", "b.tif", "c.tif"] {
            store.add(base.join(name), &StubDecoder, &mut CpuUpload).unwrap();
        }
        store.select(2).unwrap();
        store.set(CalibrationKey::SphereRoll, 12.5).unwrap();
        store.set_hidden(1, true).unwrap();
        store
    }

    #[test]
    fn test_capture_records_selection_and_calibration() {
        let project = Project::capture(&sample_store(Path::new("")));
        assert_eq!(project.images.len(), 3);
        assert_eq!(project.selected, Some(2));
        assert_eq!(project.images[2].calibration.sphere_roll, 12.5);
        assert!(project.images[1].hidden);
    }

    #[test]
    fn test_save_open_restore() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("probe.json");
        Project::capture(&sample_store(dir.path())).save(&file).unwrap();
        let raw = fs::read_to_string(&file).unwrap();
        assert!(raw.contains("\"a.tif\""));

        let project = Project::open(&file).unwrap();
        assert_eq!(project.images[0].path, dir.path().join("a.tif"));

        let store = project.restore(&StubDecoder, &mut CpuUpload).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.selected(), Some(2));
        assert_eq!(store.get(CalibrationKey::SphereRoll), Some(12.5));
        assert!(store.image(1).unwrap().hidden);
    }

    #[test]
    fn test_working_directory_paths_survive_save_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let project_dir = dir.path().join("proj");
        fs::create_dir(&project_dir).unwrap();
        let file = project_dir.join("probe.json");

        let mut store: ImageStore<ProbeImage> = ImageStore::new();
        let image = ProbeImage::filled(8, 8, [0.5; 4]);
        store.insert("photo.jpg", &image, &mut CpuUpload).unwrap();
        Project::capture(&store).save(&file).unwrap();

        let project = Project::open(&file).unwrap();
        let expected = std::path::absolute("photo.jpg").unwrap();
        assert_eq!(project.images[0].path, expected);
    }

    #[test]
    fn test_reopened_project_saves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("probe.json");
        Project::capture(&sample_store(dir.path())).save(&file).unwrap();

        let first = Project::open(&file).unwrap();
        first.save(&file).unwrap();
        let raw = fs::read_to_string(&file).unwrap();
        assert!(raw.contains("\"a.tif\""));
        assert_eq!(Project::open(&file).unwrap(), first);
    }

    #[test]
    fn test_restore_skips_unreadable_images() {
        let mut project = Project::capture(&sample_store(Path::new("")));
        project.images[0].path = PathBuf::from("missing.tif");
        let store = project.restore(&StubDecoder, &mut CpuUpload).unwrap();
        assert_eq!(store.len(), 2);
        // "c.tif" now sits in slot 1 and stays selected.
        assert_eq!(store.selected(), Some(1));
        assert_eq!(store.get(CalibrationKey::SphereRoll), Some(12.5));
    }

    #[test]
    fn test_open_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.json");
        fs::write(&file, "{ not json").unwrap();
        assert!(matches!(Project::open(&file), Err(ProjectError::Json(_))));
        assert!(matches!(
            Project::open(dir.path().join("absent.json")),
            Err(ProjectError::Io(_))
        ));
    }
}

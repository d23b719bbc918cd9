//! Fixed-capacity store of calibrated probe images with a single selection.
//!
//! The store is generic over the texture handle so the GPU crate can keep
//! uploaded textures here while tests and the CPU reference keep plain
//! [`ProbeImage`]s. Dropping a [`CalibratedImage`] releases its texture.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::calibration::{Calibration, CalibrationKey};
use crate::image::ProbeImage;

/// Number of image slots.
pub const CAPACITY: usize = 8;

/// Decode collaborator: turns a file path into pixels.
pub trait ImageDecoder {
    type Error: std::error::Error + Send + Sync + 'static;

    fn decode(&self, path: &Path) -> Result<ProbeImage, Self::Error>;
}

/// Texture upload collaborator: turns decoded pixels into a texture handle.
pub trait TextureUpload {
    type Texture;

    fn upload(&mut self, image: &ProbeImage) -> Self::Texture;
}

/// Uploader that keeps the decoded pixels on the CPU.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuUpload;

impl TextureUpload for CpuUpload {
    type Texture = ProbeImage;

    fn upload(&mut self, image: &ProbeImage) -> ProbeImage {
        image.clone()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("all {} image slots are occupied", CAPACITY)]
    Full,
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("slot {0} is not loaded")]
    NotLoaded(usize),
    #[error("no image is selected")]
    NoSelection,
}

/// One loaded image and its calibration.
#[derive(Debug)]
pub struct CalibratedImage<T> {
    pub texture: T,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub calibration: Calibration,
    /// Hidden images are skipped when blending all loaded images.
    pub hidden: bool,
}

/// Fixed array of [`CAPACITY`] slots plus the selected index.
#[derive(Debug)]
pub struct ImageStore<T> {
    slots: [Option<CalibratedImage<T>>; CAPACITY],
    selected: Option<usize>,
}

impl<T> Default for ImageStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ImageStore<T> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            selected: None,
        }
    }

    /// Decode `path`, upload it and place it in the first free slot.
    ///
    /// Fails without touching the store when every slot is occupied or the
    /// decoder rejects the file.
    pub fn add<D, U>(
        &mut self,
        path: impl AsRef<Path>,
        decoder: &D,
        uploader: &mut U,
    ) -> Result<usize, StoreError>
    where
        D: ImageDecoder,
        U: TextureUpload<Texture = T>,
    {
        let path = path.as_ref();
        if self.free_slot().is_none() {
            warn!(path = %path.display(), "image store is full");
            return Err(StoreError::Full);
        }
        let image = decoder.decode(path).map_err(|e| StoreError::Decode {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        self.insert(path, &image, uploader)
    }

    /// Place an already decoded image in the first free slot.
    ///
    /// The new image becomes selected when nothing else is.
    pub fn insert<U>(
        &mut self,
        path: impl AsRef<Path>,
        image: &ProbeImage,
        uploader: &mut U,
    ) -> Result<usize, StoreError>
    where
        U: TextureUpload<Texture = T>,
    {
        let slot = self.free_slot().ok_or(StoreError::Full)?;
        let texture = uploader.upload(image);
        self.slots[slot] = Some(CalibratedImage {
            texture,
            path: path.as_ref().to_path_buf(),
            width: image.width,
            height: image.height,
            calibration: Calibration::initial(image.width, image.height),
            hidden: false,
        });
        if self.selected.is_none() {
            self.selected = Some(slot);
        }
        info!(
            slot,
            width = image.width,
            height = image.height,
            path = %path.as_ref().display(),
            "image added"
        );
        Ok(slot)
    }

    /// Remove the image in `slot`, returning it. Dropping the returned value
    /// releases its texture.
    ///
    /// If the removed image was selected, selection falls back to the lowest
    /// loaded slot, or to none.
    pub fn remove(&mut self, slot: usize) -> Result<CalibratedImage<T>, StoreError> {
        let image = self
            .slots
            .get_mut(slot)
            .and_then(Option::take)
            .ok_or_else(|| {
                warn!(slot, "remove of unloaded slot ignored");
                StoreError::NotLoaded(slot)
            })?;
        if self.selected == Some(slot) {
            self.selected = self.slots.iter().position(Option::is_some);
            debug!(selected = ?self.selected, "selection fell back");
        }
        info!(slot, "image removed");
        Ok(image)
    }

    pub fn select(&mut self, slot: usize) -> Result<(), StoreError> {
        if self.image(slot).is_none() {
            warn!(slot, "select of unloaded slot ignored");
            return Err(StoreError::NotLoaded(slot));
        }
        self.selected = Some(slot);
        Ok(())
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_image(&self) -> Option<&CalibratedImage<T>> {
        self.selected.and_then(|i| self.image(i))
    }

    /// Read one calibration value of the selected image.
    pub fn get(&self, key: CalibrationKey) -> Option<f32> {
        self.selected_image().map(|img| img.calibration.get(key))
    }

    /// Write one calibration value of the selected image.
    pub fn set(&mut self, key: CalibrationKey, value: f32) -> Result<(), StoreError> {
        let image = self.selected_image_mut()?;
        image.calibration.set(key, value);
        Ok(())
    }

    /// Set the disc center and radius of the selected image at once.
    pub fn move_circle(&mut self, x: f32, y: f32, radius: f32) -> Result<(), StoreError> {
        let image = self.selected_image_mut()?;
        image.calibration.circle_x = x;
        image.calibration.circle_y = y;
        image.calibration.circle_radius = radius;
        Ok(())
    }

    /// Set the sphere orientation (degrees) of the selected image at once.
    pub fn move_sphere(
        &mut self,
        elevation: f32,
        azimuth: f32,
        roll: f32,
    ) -> Result<(), StoreError> {
        let image = self.selected_image_mut()?;
        image.calibration.sphere_elevation = elevation;
        image.calibration.sphere_azimuth = azimuth;
        image.calibration.sphere_roll = roll;
        Ok(())
    }

    /// Replace the whole calibration of a loaded slot.
    pub fn set_calibration(
        &mut self,
        slot: usize,
        calibration: Calibration,
    ) -> Result<(), StoreError> {
        self.loaded_mut(slot, "set_calibration")?.calibration = calibration;
        Ok(())
    }

    pub fn set_hidden(&mut self, slot: usize, hidden: bool) -> Result<(), StoreError> {
        self.loaded_mut(slot, "set_hidden")?.hidden = hidden;
        Ok(())
    }

    pub fn image(&self, slot: usize) -> Option<&CalibratedImage<T>> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn width(&self, slot: usize) -> Option<u32> {
        self.image(slot).map(|img| img.width)
    }

    pub fn height(&self, slot: usize) -> Option<u32> {
        self.image(slot).map(|img| img.height)
    }

    /// Locate a loaded image by its source path.
    pub fn find(&self, path: impl AsRef<Path>) -> Option<usize> {
        let path = path.as_ref();
        self.loaded().find(|(_, img)| img.path == path).map(|(i, _)| i)
    }

    /// Loaded slots in ascending index order.
    pub fn loaded(&self) -> impl Iterator<Item = (usize, &CalibratedImage<T>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|img| (i, img)))
    }

    /// Images that take part in a composite: every visible loaded image when
    /// `blend_all` is set, otherwise just the selected one.
    pub fn contributing(&self, blend_all: bool) -> Vec<&CalibratedImage<T>> {
        if blend_all {
            self.loaded()
                .map(|(_, img)| img)
                .filter(|img| !img.hidden)
                .collect()
        } else {
            self.selected_image().into_iter().collect()
        }
    }

    pub fn len(&self) -> usize {
        self.loaded().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    fn loaded_mut(
        &mut self,
        slot: usize,
        operation: &'static str,
    ) -> Result<&mut CalibratedImage<T>, StoreError> {
        self.slots
            .get_mut(slot)
            .and_then(Option::as_mut)
            .ok_or_else(|| {
                warn!(slot, operation, "edit of unloaded slot ignored");
                StoreError::NotLoaded(slot)
            })
    }

    fn selected_image_mut(&mut self) -> Result<&mut CalibratedImage<T>, StoreError> {
        let slot = self.selected.ok_or(StoreError::NoSelection)?;
        self.slots[slot].as_mut().ok_or(StoreError::NoSelection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("unreadable")]
    struct Unreadable;

    struct FixedDecoder(Option<(u32, u32)>);

    impl ImageDecoder for FixedDecoder {
        type Error = Unreadable;

        fn decode(&self, _path: &Path) -> Result<ProbeImage, Unreadable> {
            self.0
                .map(|(w, h)| ProbeImage::filled(w, h, [1.0; 4]))
                .ok_or(Unreadable)
        }
    }

    fn store_with(n: usize) -> ImageStore<ProbeImage> {
        let mut store = ImageStore::new();
        let decoder = FixedDecoder(Some((400, 300)));
        for i in 0..n {
            store
                .add(format!("probe-{i}.tif"), &decoder, &mut CpuUpload)
                .unwrap();
        }
        store
    }

    #[test]
    fn test_add_fills_lowest_slot_and_selects_first() {
        let store = store_with(3);
        assert_eq!(store.len(), 3);
        assert_eq!(store.selected(), Some(0));
        assert_eq!(store.find("probe-2.tif"), Some(2));
        assert_eq!(store.width(1), Some(400));
        assert_eq!(store.height(1), Some(300));
    }

    #[test]
    fn test_add_fails_when_full() {
        let mut store = store_with(CAPACITY);
        let decoder = FixedDecoder(Some((4, 4)));
        let err = store.add("extra.tif", &decoder, &mut CpuUpload);
        assert!(matches!(err, Err(StoreError::Full)));
        assert_eq!(store.len(), CAPACITY);
    }

    #[test]
    fn test_add_decode_failure_leaves_store_unchanged() {
        let mut store = store_with(1);
        let err = store.add("broken.tif", &FixedDecoder(None), &mut CpuUpload);
        assert!(matches!(err, Err(StoreError::Decode { .. })));
        assert_eq!(store.len(), 1);
        assert_eq!(store.selected(), Some(0));
    }

    #[test]
    fn test_add_then_remove_restores_occupancy() {
        let mut store = store_with(2);
        let slot = store
            .add("new.tif", &FixedDecoder(Some((8, 8))), &mut CpuUpload)
            .unwrap();
        assert_eq!(store.len(), 3);
        store.remove(slot).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.image(slot).is_none());
    }

    #[test]
    fn test_remove_selected_falls_back_to_lowest_loaded() {
        let mut store = store_with(4);
        store.remove(1).unwrap();
        store.select(2).unwrap();
        store.remove(2).unwrap();
        assert_eq!(store.selected(), Some(0));
        store.remove(0).unwrap();
        assert_eq!(store.selected(), Some(3));
        store.remove(3).unwrap();
        assert_eq!(store.selected(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_unselected_keeps_selection() {
        let mut store = store_with(3);
        store.select(2).unwrap();
        store.remove(0).unwrap();
        assert_eq!(store.selected(), Some(2));
    }

    #[test]
    fn test_remove_and_select_unloaded_are_rejected() {
        let mut store = store_with(1);
        assert!(matches!(store.remove(5), Err(StoreError::NotLoaded(5))));
        assert!(matches!(store.remove(99), Err(StoreError::NotLoaded(99))));
        assert!(matches!(store.select(3), Err(StoreError::NotLoaded(3))));
        assert_eq!(store.selected(), Some(0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_slot_edits_on_unloaded_slot_are_rejected() {
        let mut store = store_with(2);
        store.remove(1).unwrap();
        let calibration = Calibration::initial(10, 10);
        assert!(matches!(
            store.set_calibration(1, calibration),
            Err(StoreError::NotLoaded(1))
        ));
        assert!(matches!(
            store.set_hidden(CAPACITY, true),
            Err(StoreError::NotLoaded(CAPACITY))
        ));
        store.set_calibration(0, calibration).unwrap();
        assert_eq!(store.image(0).unwrap().calibration, calibration);
    }

    #[test]
    fn test_get_set_act_on_selected_image() {
        let mut store = store_with(2);
        store.select(1).unwrap();
        store.set(CalibrationKey::SphereAzimuth, 90.0).unwrap();
        assert_eq!(store.get(CalibrationKey::SphereAzimuth), Some(90.0));
        assert_eq!(store.image(0).unwrap().calibration.sphere_azimuth, 0.0);
    }

    #[test]
    fn test_get_set_without_selection() {
        let mut store: ImageStore<ProbeImage> = ImageStore::new();
        assert_eq!(store.get(CalibrationKey::CircleX), None);
        assert!(matches!(
            store.set(CalibrationKey::CircleX, 1.0),
            Err(StoreError::NoSelection)
        ));
    }

    #[test]
    fn test_add_uses_heuristic_circle() {
        let store = store_with(1);
        assert_eq!(store.get(CalibrationKey::CircleX), Some(200.0));
        assert_eq!(store.get(CalibrationKey::CircleY), Some(150.0));
        assert_eq!(store.get(CalibrationKey::CircleRadius), Some(100.0));
    }

    #[test]
    fn test_move_circle_and_sphere() {
        let mut store = store_with(1);
        store.move_circle(10.0, 20.0, 30.0).unwrap();
        store.move_sphere(5.0, 6.0, 7.0).unwrap();
        let c = store.selected_image().unwrap().calibration;
        assert_eq!(
            [c.circle_x, c.circle_y, c.circle_radius],
            [10.0, 20.0, 30.0]
        );
        assert_eq!(
            [c.sphere_elevation, c.sphere_azimuth, c.sphere_roll],
            [5.0, 6.0, 7.0]
        );
    }

    #[test]
    fn test_contributing_respects_mode_and_hidden() {
        let mut store = store_with(3);
        store.select(1).unwrap();
        store.set_hidden(2, true).unwrap();
        assert_eq!(store.contributing(true).len(), 2);
        let single = store.contributing(false);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].path, Path::new("probe-1.tif"));
    }
}

use crate::{backend::VolumeLoaderFn, enums::SortBy, volume::Volume};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3, s};
use std::{
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error("Pixel data error: {0}")]
    PixelData(#[from] dicom::pixeldata::Error),
}

/// One decoded image of a series together with the attributes needed to place
/// it in a volume.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    /// Modality values (e.g. Hounsfield units), `(rows, columns)`.
    pub pixels: Array2<f32>,
    /// Z component of Image Position (Patient)
    pub position_z: Option<f32>,
    pub table_position: Option<f32>,
    pub instance_number: Option<i32>,
    /// `(row spacing, column spacing, slice thickness)`
    pub spacing: Option<(f32, f32, f32)>,
}

impl ImageFrame {
    /// Key the frame is sorted by. `None` if the frame lacks the attribute and
    /// must be skipped.
    fn sort_key(&self, sort_by: &SortBy) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => self.position_z.map(Some),
            SortBy::TablePosition => Some(self.table_position),
            SortBy::InstanceNumber => Some(self.instance_number.map(|n| n as f32)),
            SortBy::None => Some(Some(0.0)),
        }
    }
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Volume loader stacking the frames of a series, sorted by `sort_by`
    pub fn streaming(sort_by: SortBy) -> VolumeLoaderFn {
        Rc::new(move |frames: Vec<ImageFrame>| Self::load_from_frames(frames, sort_by))
    }

    /// Paths of all ".dcm" files directly inside `path`, sorted by name
    pub fn dicom_paths_in_directory(
        path: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>, VolumeLoaderError> {
        let mut paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }
        paths.sort();
        Ok(paths)
    }

    /// Decode a single DICOM file into a frame
    pub fn frame_from_file(path: impl AsRef<Path>) -> Result<ImageFrame, VolumeLoaderError> {
        let dicom_object = open_file(path.as_ref())?;
        Self::frame_from_dicom_object(&dicom_object)
    }

    pub fn frame_from_dicom_object(
        dicom_object: &FileDicomObject<InMemDicomObject>,
    ) -> Result<ImageFrame, VolumeLoaderError> {
        Ok(ImageFrame {
            pixels: Self::decode_image(dicom_object)?,
            position_z: Self::get_position_z(dicom_object),
            table_position: dicom_object
                .element(tags::TABLE_POSITION)
                .ok()
                .and_then(|element| element.to_float32().ok()),
            instance_number: dicom_object
                .element(tags::INSTANCE_NUMBER)
                .ok()
                .and_then(|element| element.to_int::<i32>().ok()),
            spacing: Self::get_spacing(dicom_object),
        })
    }

    /// Sort frames, validate them and stack them into a volume
    pub fn load_from_frames(
        frames: Vec<ImageFrame>,
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let spacing = frames
            .iter()
            .find_map(|frame| frame.spacing)
            .ok_or(VolumeLoaderError::MissingSpacing);

        let mut images_with_order: Vec<_> = frames
            .into_iter()
            .filter_map(|frame| frame.sort_key(&sort_by).map(|order| (order, frame.pixels)))
            .collect();

        if images_with_order.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::sort_images(&mut images_with_order, sort_by);

        let images: Vec<_> = images_with_order
            .into_iter()
            .map(|(_, image)| image)
            .collect();

        Self::validate_dimensions(&images)?;

        let volume_array = Self::build_volume_array(&images);

        Ok(Volume::new(volume_array, spacing?))
    }

    fn get_position_z(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<f32> {
        let pos = dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()?
            .to_multi_float32()
            .ok()?;
        pos.get(2).copied()
    }

    fn decode_image(
        dicom_object: &FileDicomObject<InMemDicomObject>,
    ) -> Result<Array2<f32>, VolumeLoaderError> {
        let pixel_data = dicom_object.decode_pixel_data()?;
        // Keep modality values, windowing happens at render time
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::Identity);
        let array = pixel_data.to_ndarray_with_options::<f32>(&options)?;
        Ok(array.slice_move(s![0, .., .., 0]))
    }

    fn sort_images(images_with_order: &mut [(Option<f32>, Array2<f32>)], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            images_with_order
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }

        if matches!(sort_by, SortBy::ImagePositionPatient) {
            images_with_order.reverse();
        }
    }

    fn validate_dimensions(images: &[Array2<f32>]) -> Result<(), VolumeLoaderError> {
        let first_dim = images[0].dim();
        if images.iter().any(|img| img.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(images: &[Array2<f32>]) -> Array3<f32> {
        let (height, width) = images[0].dim();
        let depth = images.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, image) in images.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(image);
        }

        volume
    }

    fn get_spacing(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<(f32, f32, f32)> {
        let pixel_spacing = dicom_object
            .element(tags::PIXEL_SPACING)
            .ok()?
            .to_multi_float32()
            .ok()?;

        let slice_thickness = dicom_object
            .element(tags::SLICE_THICKNESS)
            .ok()?
            .to_float32()
            .ok()?;

        Some((*pixel_spacing.first()?, *pixel_spacing.get(1)?, slice_thickness))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: f32, z: f32) -> ImageFrame {
        ImageFrame {
            pixels: Array2::from_elem((2, 3), value),
            position_z: Some(z),
            table_position: None,
            instance_number: Some(value as i32),
            spacing: Some((0.5, 0.5, 2.0)),
        }
    }

    #[test]
    fn image_position_sorts_head_first() {
        let frames = vec![frame(1.0, -10.0), frame(3.0, 10.0), frame(2.0, 0.0)];

        let volume = VolumeLoader::load_from_frames(frames, SortBy::ImagePositionPatient)
            .expect("should build volume");

        assert_eq!(volume.dim(), (3, 2, 3));
        let firsts: Vec<f32> = (0..3).map(|i| volume.data()[[i, 0, 0]]).collect();
        assert_eq!(firsts, vec![3.0, 2.0, 1.0]);
        assert_eq!(volume.spacing, (0.5, 0.5, 2.0));
    }

    #[test]
    fn instance_number_sorts_ascending() {
        let frames = vec![frame(2.0, 0.0), frame(1.0, 0.0)];

        let volume =
            VolumeLoader::load_from_frames(frames, SortBy::InstanceNumber).expect("should build");

        assert_eq!(volume.data()[[0, 0, 0]], 1.0);
        assert_eq!(volume.data()[[1, 0, 0]], 2.0);
    }

    #[test]
    fn frames_without_position_are_skipped() {
        let mut missing = frame(9.0, 0.0);
        missing.position_z = None;

        let volume = VolumeLoader::load_from_frames(
            vec![missing, frame(1.0, 0.0)],
            SortBy::ImagePositionPatient,
        )
        .expect("should build from remaining frame");

        assert_eq!(volume.dim().0, 1);
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let mut wide = frame(1.0, 1.0);
        wide.pixels = Array2::zeros((2, 4));

        let result = VolumeLoader::load_from_frames(vec![frame(1.0, 0.0), wide], SortBy::None);

        assert!(matches!(result, Err(VolumeLoaderError::InconsistentDimensions)));
    }

    #[test]
    fn empty_and_spacing_less_inputs_fail() {
        assert!(matches!(
            VolumeLoader::load_from_frames(Vec::new(), SortBy::None),
            Err(VolumeLoaderError::NoValidImages)
        ));

        let mut bare = frame(1.0, 0.0);
        bare.spacing = None;
        assert!(matches!(
            VolumeLoader::load_from_frames(vec![bare], SortBy::None),
            Err(VolumeLoaderError::MissingSpacing)
        ));
    }

    #[test]
    fn directory_without_dicom_files_has_no_images() {
        let dir = std::env::temp_dir();
        let empty = dir.join(format!("mpr-viewer-empty-{}", std::process::id()));
        fs::create_dir_all(&empty).expect("should create temp dir");

        let result = VolumeLoader::dicom_paths_in_directory(&empty);

        assert!(matches!(result, Err(VolumeLoaderError::NoValidImages)));
        let _ = fs::remove_dir(&empty);
    }
}

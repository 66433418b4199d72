use crate::config::VoiRange;
use crate::enums::{BlendMode, Interpolation, Orientation};
use crate::interpolator::Interpolator;

use image::GrayImage;
use ndarray::{Array2, Array3, ArrayView2, Zip, s};
use rayon::prelude::*;

#[derive(Debug, Default)]
pub struct Volume {
    /// Modality values, `(depth, height, width)`
    pub data: Array3<f32>,
    pub spacing: (f32, f32, f32),
    pub interpolated_dim: (u32, u32, u32),
    value_range: (f32, f32),
}

/// What to render from a volume: the slab centred on `index` along
/// `orientation`, `thickness` millimetres deep.
#[derive(Debug, Clone, Copy)]
pub struct SlabRequest {
    pub index: usize,
    pub orientation: Orientation,
    pub thickness: f32,
    pub blend: BlendMode,
    pub voi: Option<VoiRange>,
    pub interpolation: Interpolation,
}

impl Volume {
    pub fn new(data: Array3<f32>, spacing: (f32, f32, f32)) -> Self {
        let original_dim = data.dim();
        let value_range = data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        Self {
            data,
            spacing,
            interpolated_dim: Interpolator::get_isotropic_dimensions(spacing, original_dim),
            value_range,
        }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Number of slices along the axis `orientation` looks down
    pub fn slice_count(&self, orientation: Orientation) -> usize {
        let dim = self.data.dim();
        match orientation.plane() {
            Orientation::Coronal => dim.1,
            Orientation::Sagittal => dim.2,
            _ => dim.0,
        }
    }

    /// Distance between two slices along the axis `orientation` looks down
    pub fn slice_spacing(&self, orientation: Orientation) -> f32 {
        match orientation.plane() {
            Orientation::Coronal => self.spacing.0,
            Orientation::Sagittal => self.spacing.1,
            _ => self.spacing.2,
        }
    }

    /// Smallest voxel edge, the thinnest slab the volume can show
    pub fn min_spacing(&self) -> f32 {
        self.spacing.0.min(self.spacing.1).min(self.spacing.2)
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> Option<ArrayView2<'_, f32>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice_result = match orientation.plane() {
            Orientation::Coronal => self.data().slice(s![.., index, ..]),
            Orientation::Sagittal => self.data().slice(s![.., .., index]),
            _ => self.data().slice(s![index, .., ..]),
        };
        Some(slice_result)
    }

    /// Render a slab to an 8 bit image, windowed with the request's VOI range
    /// or the full value range of the volume.
    pub fn render_slab(&self, request: &SlabRequest) -> Option<GrayImage> {
        let slab = self.combine_slab(request)?;
        let (lower, upper) = match request.voi {
            Some(voi) => (voi.lower, voi.upper),
            None => self.value_range,
        };
        let window = (lower, (upper - lower).max(f32::EPSILON));

        let plane = request.orientation.plane();
        // Axial doesn't need interpolation (already isotropic in-plane)
        if matches!(request.interpolation, Interpolation::Linear) && plane != Orientation::Axial {
            let (width, height) = self.get_output_dimensions(plane);
            return Self::interpolate_slice(&slab.view(), width, height, window);
        }
        Self::slice_to_image(&slab, window)
    }

    fn combine_slab(&self, request: &SlabRequest) -> Option<Array2<f32>> {
        let center = self
            .get_slice_from_axis(request.index, request.orientation)?
            .as_standard_layout()
            .into_owned();
        if matches!(request.blend, BlendMode::Composite) {
            return Some(center);
        }

        let count = self.slice_count(request.orientation);
        let spacing = self.slice_spacing(request.orientation);
        // broken spacing tags count one slice per millimetre
        let spacing = if spacing > 0.0 { spacing } else { 1.0 };
        let half = (request.thickness / spacing / 2.0)
            .floor()
            .max(0.0)
            .min(count as f32) as usize;
        let last = count - 1;
        let start = request.index.saturating_sub(half);
        let end = request.index.saturating_add(half).min(last);

        let mut acc = center;
        for i in (start..=end).filter(|&i| i != request.index) {
            let slice = self.get_slice_from_axis(i, request.orientation)?;
            let zip = Zip::from(&mut acc).and(&slice);
            match request.blend {
                BlendMode::MaximumIntensity => zip.for_each(|a, &v| *a = a.max(v)),
                BlendMode::MinimumIntensity => zip.for_each(|a, &v| *a = a.min(v)),
                _ => zip.for_each(|a, &v| *a += v),
            }
        }
        if matches!(request.blend, BlendMode::Average) {
            let count = (end - start + 1) as f32;
            acc.mapv_inplace(|v| v / count);
        }
        Some(acc)
    }

    #[inline]
    fn window_to_u8(value: f32, (lower, width): (f32, f32)) -> u8 {
        (((value - lower) / width) * 255.0).clamp(0.0, 255.0) as u8
    }

    fn get_output_dimensions(&self, orientation: Orientation) -> (u32, u32) {
        // Always return (width, height) - standard image convention
        match orientation.plane() {
            Orientation::Coronal => {
                // Looking down Y-axis: X is width, Z is height
                (self.interpolated_dim.2, self.interpolated_dim.0)
            }
            Orientation::Sagittal => {
                // Looking down X-axis: Y is width, Z is height
                (self.interpolated_dim.1, self.interpolated_dim.0)
            }
            _ => {
                // Looking down Z-axis: X is width, Y is height
                (self.interpolated_dim.2, self.interpolated_dim.1)
            }
        }
    }

    fn slice_to_image(slice: &Array2<f32>, window: (f32, f32)) -> Option<GrayImage> {
        let (height, width) = slice.dim();
        let values = slice.as_slice()?;
        let pixel_data: Vec<u8> = values
            .par_iter()
            .map(|&v| Self::window_to_u8(v, window))
            .collect();
        GrayImage::from_raw(width as u32, height as u32, pixel_data)
    }

    fn interpolate_slice(
        slice: &ArrayView2<'_, f32>,
        width: u32,
        height: u32,
        window: (f32, f32),
    ) -> Option<GrayImage> {
        let (slice_height, slice_width) = slice.dim();

        let pixel_data: Vec<u8> = (0..height)
            .into_par_iter()
            .flat_map(|y| {
                (0..width)
                    .map(|x| {
                        let norm_x = (x as f32 + 0.5) / width as f32;
                        let norm_y = (y as f32 + 0.5) / height as f32;

                        // Convert back to source coordinates
                        let src_x = norm_x * slice_width as f32 - 0.5;
                        let src_y = norm_y * slice_height as f32 - 0.5;

                        // Clamp to valid range
                        let src_x = src_x.max(0.0).min((slice_width - 1) as f32);
                        let src_y = src_y.max(0.0).min((slice_height - 1) as f32);

                        let value = Interpolator::bilinear_interpolate(slice, src_y, src_x);
                        Self::window_to_u8(value, window)
                    })
                    .collect::<Vec<u8>>()
            })
            .collect();

        GrayImage::from_raw(width, height, pixel_data)
    }

    fn is_valid_index(&self, index: usize, orientation: Orientation) -> bool {
        index < self.slice_count(orientation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4 slices of 2x3, voxel value = slice index * 100
    fn ramp_volume() -> Volume {
        let data = Array3::from_shape_fn((4, 2, 3), |(z, _, _)| z as f32 * 100.0);
        Volume::new(data, (1.0, 1.0, 1.0))
    }

    fn request(index: usize, blend: BlendMode, thickness: f32) -> SlabRequest {
        SlabRequest {
            index,
            orientation: Orientation::Acquisition,
            thickness,
            blend,
            voi: Some(VoiRange {
                lower: 0.0,
                upper: 300.0,
            }),
            interpolation: Interpolation::None,
        }
    }

    #[test]
    fn slice_counts_follow_axes() {
        let volume = ramp_volume();
        assert_eq!(volume.slice_count(Orientation::Acquisition), 4);
        assert_eq!(volume.slice_count(Orientation::Coronal), 2);
        assert_eq!(volume.slice_count(Orientation::Sagittal), 3);
        assert!(volume.get_slice_from_axis(4, Orientation::Axial).is_none());
    }

    #[test]
    fn composite_renders_single_slice() {
        let image = ramp_volume()
            .render_slab(&request(1, BlendMode::Composite, 10.0))
            .expect("should render");
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(0, 0).0[0], 85);
    }

    #[test]
    fn maximum_intensity_takes_brightest_slice_in_slab() {
        let image = ramp_volume()
            .render_slab(&request(1, BlendMode::MaximumIntensity, 2.0))
            .expect("should render");
        // slab covers slices 0..=2
        assert_eq!(image.get_pixel(0, 0).0[0], 170);
    }

    #[test]
    fn average_divides_by_clamped_slab_size() {
        let image = ramp_volume()
            .render_slab(&request(0, BlendMode::Average, 2.0))
            .expect("should render");
        // slices 0 and 1 averaged: 50
        assert_eq!(image.get_pixel(0, 0).0[0], 42);
    }

    #[test]
    fn slab_wider_than_volume_covers_every_slice() {
        let image = ramp_volume()
            .render_slab(&request(1, BlendMode::MaximumIntensity, 1.0e30))
            .expect("should render");
        assert_eq!(image.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn zero_slice_spacing_steps_one_slice_per_millimetre() {
        let data = Array3::from_shape_fn((4, 2, 3), |(z, _, _)| z as f32 * 100.0);
        let volume = Volume::new(data, (1.0, 1.0, 0.0));
        let image = volume
            .render_slab(&request(1, BlendMode::MaximumIntensity, 2.0))
            .expect("should render");
        // slab covers slices 0..=2
        assert_eq!(image.get_pixel(0, 0).0[0], 170);
    }

    #[test]
    fn out_of_range_index_renders_nothing() {
        assert!(ramp_volume()
            .render_slab(&request(9, BlendMode::Composite, 1.0))
            .is_none());
    }

    #[test]
    fn linear_interpolation_stretches_reconstructed_planes() {
        let data = Array3::from_elem((2, 4, 4), 50.0);
        let volume = Volume::new(data, (1.0, 1.0, 2.0));
        let image = volume
            .render_slab(&SlabRequest {
                orientation: Orientation::Coronal,
                interpolation: Interpolation::Linear,
                voi: None,
                ..request(0, BlendMode::Composite, 1.0)
            })
            .expect("should render");
        assert_eq!(image.dimensions(), (4, 4));
    }
}

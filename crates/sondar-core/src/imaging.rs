//! Physical-space mapping and target size extraction
//!
//! The range-Doppler image lives in (frequency bin, slow-time bin)
//! coordinates. Two resolution factors translate those pixels into
//! millimetres:
//!
//! ```text
//! range:    ρ_r = (c·T_c) / (2·B·T)          fast-time bin height
//! azimuth:  ρ_a = (c/f_lo) / (2·θ)           slow-time bin width
//! ```
//!
//! The azimuth factor depends on the synthetic aperture θ the target swept
//! while rotating past the sensor, estimated from the sequence of measured
//! distances: `θ = arccos(D_min/D_first) + arccos(D_min/D_last)`. θ is
//! clamped away from zero; a target that never moved has no aperture and
//! the division would blow up.
//!
//! Mapping recentres the image on the strongest reflector; size extraction
//! then takes the bounding box of cells above 30 % of the peak and scales
//! it by the two resolutions.

use tracing::{debug, warn};

use crate::params::SondarParams;
use crate::types::{RangeDopplerImage, SPEED_OF_SOUND};

/// Speed of sound in mm/s, the unit the resolutions are expressed in.
const SPEED_OF_SOUND_MM: f64 = SPEED_OF_SOUND * 1000.0;

/// Fraction of the peak intensity that delimits the target boundary.
const BOUNDARY_FRACTION: f32 = 0.3;

/// Peak intensity below which an image carries no meaningful signal.
const MIN_PEAK_INTENSITY: f32 = 0.001;

/// Largest credible target dimension (mm).
const MAX_DIMENSION_MM: f64 = 1000.0;

/// A range-Doppler image mapped into millimetre-scaled physical space
#[derive(Debug, Clone)]
pub struct PhysicalImage {
    /// Intensity grid, same shape as the source range-Doppler image,
    /// centred on the strongest reflector
    pub pixels: Vec<Vec<f32>>,
    /// Height of one cell (mm)
    pub range_resolution_mm: f64,
    /// Width of one cell (mm)
    pub azimuth_resolution_mm: f64,
    /// (row, col) the strongest reflector was moved to
    pub center: (usize, usize),
}

/// Closed set of shapes the external classifier can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeLabel {
    Unknown,
    Circle,
    Rectangle,
    Square,
    Triangle,
    Ellipse,
    Polygon,
}

/// Seam for the external contour-based shape classifier.
///
/// The production classifier runs on OpenCV and is injected from outside
/// the core; headless setups use [`UnknownClassifier`].
pub trait ShapeClassifier: Send {
    fn classify(&self, image: &PhysicalImage, threshold: f32) -> ShapeLabel;
}

/// Classifier stub that never recognises anything
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownClassifier;

impl ShapeClassifier for UnknownClassifier {
    fn classify(&self, _image: &PhysicalImage, _threshold: f32) -> ShapeLabel {
        ShapeLabel::Unknown
    }
}

/// Maps range-Doppler images to physical space and extracts target size
#[derive(Debug, Clone)]
pub struct ImageConverter {
    params: SondarParams,
    rotation_angle: f64,
}

impl ImageConverter {
    pub fn new(params: SondarParams) -> Self {
        let rotation_angle = params.default_aperture_rad;
        Self {
            params,
            rotation_angle,
        }
    }

    /// Estimated synthetic aperture (radians) from the last conversion.
    pub fn rotation_angle(&self) -> f64 {
        self.rotation_angle
    }

    /// Range resolution in mm: `ρ_r = (c·T_c) / (2·B·T)`.
    pub fn range_resolution_mm(&self) -> f64 {
        let t_chirp = self.params.chirp_ms / 1000.0;
        let bandwidth = self.params.bandwidth_hz();
        let t_total = (self.params.chirp_ms + self.params.inter_chirp_gap_ms) / 1000.0;
        (SPEED_OF_SOUND_MM * t_chirp) / (2.0 * bandwidth * t_total)
    }

    /// Azimuth resolution in mm: `ρ_a = λ / (2·θ)` at the chirp's lowest
    /// frequency, with θ clamped to the configured minimum aperture.
    pub fn azimuth_resolution_mm(&self) -> f64 {
        let lambda = SPEED_OF_SOUND_MM / self.params.f_lo_hz;
        let theta = self.rotation_angle.max(self.params.min_aperture_rad);
        lambda / (2.0 * theta)
    }

    /// Convert a range-Doppler image to physical space.
    ///
    /// `distances` is the sequence of target distances measured across the
    /// session; it drives the aperture estimate. Returns `None` for an
    /// empty image.
    pub fn convert_to_physical(
        &mut self,
        image: &RangeDopplerImage,
        distances: &[f64],
    ) -> Option<PhysicalImage> {
        if image.is_empty() || image[0].is_empty() {
            warn!("empty range-Doppler image, nothing to map");
            return None;
        }

        self.estimate_motion(distances);
        let range_resolution_mm = self.range_resolution_mm();
        let azimuth_resolution_mm = self.azimuth_resolution_mm();
        debug!(
            range_resolution_mm,
            azimuth_resolution_mm,
            rotation_deg = self.rotation_angle.to_degrees(),
            "mapping to physical space"
        );

        let rows = image.len();
        let cols = image[0].len();

        // Locate the strongest reflector
        let mut max_row = 0;
        let mut max_col = 0;
        let mut max_intensity = f32::MIN;
        for (i, row) in image.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if v > max_intensity {
                    max_intensity = v;
                    max_row = i;
                    max_col = j;
                }
            }
        }

        // Translate so the reflector lands at the image centre
        let center = (rows / 2, cols / 2);
        let row_offset = center.0 as isize - max_row as isize;
        let col_offset = center.1 as isize - max_col as isize;

        let mut pixels = vec![vec![0.0_f32; cols]; rows];
        for i in 0..rows {
            for j in 0..cols {
                let src_row = i as isize - row_offset;
                let src_col = j as isize - col_offset;
                if src_row >= 0
                    && (src_row as usize) < rows
                    && src_col >= 0
                    && (src_col as usize) < cols
                {
                    pixels[i][j] = image[src_row as usize][src_col as usize];
                }
            }
        }

        Some(PhysicalImage {
            pixels,
            range_resolution_mm,
            azimuth_resolution_mm,
            center,
        })
    }

    /// Estimate the rotation aperture from the distance sequence.
    ///
    /// Falls back to the configured default with fewer than three
    /// measurements or a degenerate geometry.
    fn estimate_motion(&mut self, distances: &[f64]) {
        if distances.len() < 3 {
            warn!(
                measurements = distances.len(),
                "too few distances for motion estimation, using default aperture"
            );
            self.rotation_angle = self.params.default_aperture_rad;
            return;
        }

        let d_min = distances.iter().cloned().fold(f64::INFINITY, f64::min);
        let d_first = distances[0];
        let d_last = distances[distances.len() - 1];

        let theta = (d_min / d_first).acos() + (d_min / d_last).acos();
        if theta.is_finite() {
            self.rotation_angle = theta.max(self.params.min_aperture_rad);
        } else {
            warn!("degenerate distance geometry, using default aperture");
            self.rotation_angle = self.params.default_aperture_rad;
        }
        debug!(
            rotation_deg = self.rotation_angle.to_degrees(),
            "estimated rotation aperture"
        );
    }

    /// Bounding-box size of the target in the physical image, in mm.
    ///
    /// Cells above 30 % of the peak intensity delimit the target; the box
    /// is scaled by the stored resolutions and capped at 1 m per axis. An
    /// image without meaningful signal reports `(0.0, 0.0)`.
    pub fn extract_size(&self, image: &PhysicalImage) -> (f64, f64) {
        let pixels = &image.pixels;
        if pixels.is_empty() || pixels[0].is_empty() {
            return (0.0, 0.0);
        }

        let max_signal = pixels
            .iter()
            .flat_map(|row| row.iter().cloned())
            .fold(f32::MIN, f32::max);
        if max_signal < MIN_PEAK_INTENSITY {
            warn!(max_signal, "no meaningful signal in physical image");
            return (0.0, 0.0);
        }

        let threshold = max_signal * BOUNDARY_FRACTION;
        let rows = pixels.len();
        let cols = pixels[0].len();

        let mut min_row = rows;
        let mut max_row = 0;
        let mut min_col = cols;
        let mut max_col = 0;

        for (i, row) in pixels.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if v > threshold {
                    min_row = min_row.min(i);
                    max_row = max_row.max(i);
                    min_col = min_col.min(j);
                    max_col = max_col.max(j);
                }
            }
        }

        if min_row >= max_row || min_col >= max_col {
            warn!(min_row, max_row, min_col, max_col, "degenerate target boundaries");
            return (0.0, 0.0);
        }

        let length = ((max_row - min_row) as f64 * image.range_resolution_mm)
            .min(MAX_DIMENSION_MM);
        let width = ((max_col - min_col) as f64 * image.azimuth_resolution_mm)
            .min(MAX_DIMENSION_MM);

        debug!(length, width, "extracted target size");
        (length, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn converter() -> ImageConverter {
        ImageConverter::new(SondarParams::default())
    }

    fn physical(pixels: Vec<Vec<f32>>, rho_r: f64, rho_a: f64) -> PhysicalImage {
        PhysicalImage {
            pixels,
            range_resolution_mm: rho_r,
            azimuth_resolution_mm: rho_a,
            center: (0, 0),
        }
    }

    #[test]
    fn test_range_resolution() {
        // (343000 mm/s · 0.02 s) / (2 · 2000 Hz · 0.04 s) = 42.875 mm
        assert_relative_eq!(converter().range_resolution_mm(), 42.875, epsilon = 1e-9);
    }

    #[test]
    fn test_azimuth_resolution_default_aperture() {
        let c = converter();
        let lambda = 343_000.0 / 15_000.0;
        let expected = lambda / (2.0 * 15.0_f64.to_radians());
        assert_relative_eq!(c.azimuth_resolution_mm(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_motion_estimation_from_distances() {
        let mut c = converter();
        let image = vec![vec![1.0_f32; 4]; 4];
        c.convert_to_physical(&image, &[1.0, 0.8, 1.0]).unwrap();
        // arccos(0.8) + arccos(0.8)
        let expected = 2.0 * 0.8_f64.acos();
        assert_relative_eq!(c.rotation_angle(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_aperture_clamped() {
        let mut c = converter();
        let image = vec![vec![1.0_f32; 4]; 4];
        // Constant distances → θ = 0, clamped to the 1° floor
        c.convert_to_physical(&image, &[1.0, 1.0, 1.0]).unwrap();
        assert_relative_eq!(c.rotation_angle(), 1.0_f64.to_radians(), epsilon = 1e-12);
    }

    #[test]
    fn test_too_few_distances_uses_default() {
        let mut c = converter();
        let image = vec![vec![1.0_f32; 4]; 4];
        c.convert_to_physical(&image, &[1.0, 0.9]).unwrap();
        assert_relative_eq!(c.rotation_angle(), 15.0_f64.to_radians(), epsilon = 1e-12);
    }

    #[test]
    fn test_mapping_centres_strongest_reflector() {
        let mut c = converter();
        let mut image = vec![vec![0.0_f32; 8]; 8];
        image[1][2] = 9.0;
        let physical = c.convert_to_physical(&image, &[]).unwrap();
        assert_eq!(physical.center, (4, 4));
        assert_relative_eq!(physical.pixels[4][4], 9.0);
        assert_relative_eq!(physical.pixels[1][2], 0.0);
    }

    #[test]
    fn test_mapping_zero_fills_out_of_source() {
        let mut c = converter();
        let mut image = vec![vec![0.5_f32; 8]; 8];
        image[0][0] = 9.0;
        let physical = c.convert_to_physical(&image, &[]).unwrap();
        // The translation by (+4, +4) leaves the top-left region unsourced
        assert_relative_eq!(physical.pixels[0][0], 0.0);
        assert_relative_eq!(physical.pixels[4][4], 9.0);
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let mut c = converter();
        assert!(c.convert_to_physical(&Vec::new(), &[]).is_none());
    }

    #[test]
    fn test_extract_size_rectangle() {
        let c = converter();
        let mut pixels = vec![vec![0.0_f32; 64]; 64];
        for row in pixels.iter_mut().take(21).skip(10) {
            for v in row.iter_mut().take(26).skip(5) {
                *v = 1.0;
            }
        }
        // rows [10, 20], cols [5, 25] at ρ_r = 5 mm, ρ_a = 3 mm
        let image = physical(pixels, 5.0, 3.0);
        let (length, width) = c.extract_size(&image);
        assert_relative_eq!(length, 50.0, epsilon = 1e-9);
        assert_relative_eq!(width, 60.0, epsilon = 1e-9);
    }

    #[test]
    fn test_extract_size_caps_at_one_metre() {
        let c = converter();
        let mut pixels = vec![vec![0.0_f32; 64]; 64];
        for row in pixels.iter_mut() {
            for v in row.iter_mut() {
                *v = 1.0;
            }
        }
        let image = physical(pixels, 100.0, 100.0);
        let (length, width) = c.extract_size(&image);
        assert_relative_eq!(length, 1000.0);
        assert_relative_eq!(width, 1000.0);
    }

    #[test]
    fn test_extract_size_weak_image() {
        let c = converter();
        let pixels = vec![vec![1e-4_f32; 16]; 16];
        let image = physical(pixels, 5.0, 3.0);
        assert_eq!(c.extract_size(&image), (0.0, 0.0));
    }

    #[test]
    fn test_extract_size_single_point_is_degenerate() {
        let c = converter();
        let mut pixels = vec![vec![0.0_f32; 16]; 16];
        pixels[8][8] = 1.0;
        let image = physical(pixels, 5.0, 3.0);
        assert_eq!(c.extract_size(&image), (0.0, 0.0));
    }

    #[test]
    fn test_unknown_classifier() {
        let image = physical(vec![vec![1.0_f32; 4]; 4], 5.0, 3.0);
        assert_eq!(
            UnknownClassifier.classify(&image, 0.5),
            ShapeLabel::Unknown
        );
    }
}

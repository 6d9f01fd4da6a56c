//! Luminance plane and rectangular regions of it.

use crate::detection::heuristic::is_skin_tone;
use crate::types::{BoundingBox, Frame};

/// Convert RGB to luminance
pub fn luminance(rgb: &[u8]) -> f32 {
    0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32
}

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)`, always inside its plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Region {
    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    /// Sub-region given as fractions of this region's extent
    pub fn band(&self, fx0: f32, fy0: f32, fx1: f32, fy1: f32) -> Region {
        let w = self.width() as f32;
        let h = self.height() as f32;
        let x0 = self.x0 + (w * fx0.clamp(0.0, 1.0)) as usize;
        let x1 = self.x0 + (w * fx1.clamp(0.0, 1.0)) as usize;
        let y0 = self.y0 + (h * fy0.clamp(0.0, 1.0)) as usize;
        let y1 = self.y0 + (h * fy1.clamp(0.0, 1.0)) as usize;
        Region {
            x0,
            y0,
            x1: x1.max(x0),
            y1: y1.max(y0),
        }
    }

    pub fn left_half(&self) -> Region {
        self.band(0.0, 0.0, 0.5, 1.0)
    }

    pub fn right_half(&self) -> Region {
        self.band(0.5, 0.0, 1.0, 1.0)
    }
}

/// Row-major luminance of a frame.
#[derive(Debug, Clone)]
pub struct LumaPlane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl LumaPlane {
    /// `None` for frames whose buffer does not match their dimensions
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        if !frame.is_valid() {
            return None;
        }
        Some(Self {
            width: frame.width as usize,
            height: frame.height as usize,
            data: frame.data.chunks_exact(3).map(luminance).collect(),
        })
    }

    pub fn full(&self) -> Region {
        Region {
            x0: 0,
            y0: 0,
            x1: self.width,
            y1: self.height,
        }
    }

    /// Clamp a bounding box onto the plane
    pub fn region(&self, bbox: &BoundingBox) -> Region {
        let clamp_x = |v: f32| (v.max(0.0) as usize).min(self.width);
        let clamp_y = |v: f32| (v.max(0.0) as usize).min(self.height);
        let x0 = clamp_x(bbox.x);
        let y0 = clamp_y(bbox.y);
        let x1 = clamp_x(bbox.x + bbox.width).max(x0);
        let y1 = clamp_y(bbox.y + bbox.height).max(y0);
        Region { x0, y0, x1, y1 }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    fn values<'a>(&'a self, region: &Region) -> impl Iterator<Item = f32> + 'a {
        let region = *region;
        (region.y0..region.y1)
            .flat_map(move |y| (region.x0..region.x1).map(move |x| self.at(x, y)))
    }

    pub fn mean(&self, region: &Region) -> f32 {
        if region.is_empty() {
            return 0.0;
        }
        self.values(region).sum::<f32>() / region.area() as f32
    }

    pub fn std_dev(&self, region: &Region) -> f32 {
        if region.is_empty() {
            return 0.0;
        }
        let mean = self.mean(region);
        let variance = self
            .values(region)
            .map(|v| (v - mean) * (v - mean))
            .sum::<f32>()
            / region.area() as f32;
        variance.sqrt()
    }

    /// Share of pixels at the extremes of the range
    pub fn clipped_fraction(&self, region: &Region) -> f32 {
        if region.is_empty() {
            return 0.0;
        }
        let clipped = self.values(region).filter(|v| *v <= 5.0 || *v >= 250.0).count();
        clipped as f32 / region.area() as f32
    }

    /// Mean absolute difference between horizontally adjacent pixels
    pub fn horizontal_edge_energy(&self, region: &Region) -> f32 {
        if region.width() < 2 || region.height() == 0 {
            return 0.0;
        }
        let mut total = 0.0;
        for y in region.y0..region.y1 {
            for x in (region.x0 + 1)..region.x1 {
                total += (self.at(x, y) - self.at(x - 1, y)).abs();
            }
        }
        total / ((region.width() - 1) * region.height()) as f32
    }

    /// Variance of the 4-neighbour Laplacian over the region's interior
    pub fn laplacian_variance(&self, region: &Region) -> f32 {
        let x0 = region.x0.max(1);
        let y0 = region.y0.max(1);
        let x1 = region.x1.min(self.width.saturating_sub(1));
        let y1 = region.y1.min(self.height.saturating_sub(1));
        if x1 <= x0 || y1 <= y0 {
            return 0.0;
        }

        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for y in y0..y1 {
            for x in x0..x1 {
                let neighbours =
                    self.at(x - 1, y) + self.at(x + 1, y) + self.at(x, y - 1) + self.at(x, y + 1);
                let laplacian = (4.0 * self.at(x, y) - neighbours) as f64;
                sum += laplacian;
                sum_sq += laplacian * laplacian;
            }
        }

        let n = ((x1 - x0) * (y1 - y0)) as f64;
        let mean = sum / n;
        (sum_sq / n - mean * mean).max(0.0) as f32
    }
}

/// Horizontal centroid of skin-toned pixels, normalised to 0..1 of frame width.
pub fn skin_centroid_x(frame: &Frame) -> Option<f32> {
    if !frame.is_valid() {
        return None;
    }
    let width = frame.width as usize;
    let mut count = 0u64;
    let mut sum_x = 0u64;
    for (i, px) in frame.data.chunks_exact(3).enumerate() {
        if is_skin_tone(px[0], px[1], px[2]) {
            count += 1;
            sum_x += (i % width) as u64;
        }
    }
    if count == 0 {
        return None;
    }
    Some((sum_x as f32 / count as f32 + 0.5) / frame.width as f32)
}

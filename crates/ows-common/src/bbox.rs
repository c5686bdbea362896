//! Request extents.

use serde::{Deserialize, Serialize};

/// A geographic or projected bounding box in the request CRS.
///
/// For geographic CRS (EPSG:4326), coordinates are in degrees.
/// For projected CRS (EPSG:3857, EPSG:32635, etc.), coordinates are in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Ground resolution of a `width` x `height` pixel image over this extent.
    ///
    /// Returns the coarser of the two axes, in CRS units per pixel.
    pub fn ground_resolution(&self, width: u32, height: u32) -> f64 {
        let x_res = self.width().abs() / f64::from(width.max(1));
        let y_res = self.height().abs() / f64::from(height.max(1));
        x_res.max(y_res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_resolution_uses_coarser_axis() {
        let bbox = BoundingBox::new(0.0, 0.0, 2560.0, 1280.0);
        assert_eq!(bbox.ground_resolution(256, 256), 10.0);
        assert_eq!(bbox.ground_resolution(128, 256), 20.0);
    }
}

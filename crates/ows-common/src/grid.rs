//! In-memory band arrays handed to the style evaluator.
//!
//! Grids are row-major, top-to-bottom. The data source delivers them already
//! reprojected onto the request grid, so every band of a request shares the
//! same dimensions.

use std::collections::HashMap;

use num_traits::ToPrimitive;

use crate::error::{OwsError, OwsResult};

/// One band's values for the request grid.
#[derive(Debug, Clone, PartialEq)]
pub struct BandGrid {
    pub width: usize,
    pub height: usize,
    /// Values in row-major order
    pub data: Vec<f32>,
    /// Value marking pixels without data, if the product declares one
    pub nodata: Option<f32>,
}

impl BandGrid {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        Self {
            width,
            height,
            data,
            nodata: None,
        }
    }

    /// Build a grid from any numeric band type (u8, u16, i16, f64, ...).
    ///
    /// Values that cannot be represented become NaN.
    pub fn from_values<T: ToPrimitive>(width: usize, height: usize, values: &[T]) -> Self {
        let data = values
            .iter()
            .map(|v| v.to_f32().unwrap_or(f32::NAN))
            .collect();
        Self::new(width, height, data)
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self::new(width, height, vec![value; width * height])
    }

    pub fn with_nodata(mut self, nodata: f32) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// Value at a pixel index as f64.
    #[inline]
    pub fn value(&self, idx: usize) -> f64 {
        f64::from(self.data[idx])
    }

    /// Whether the pixel holds the declared no-data value.
    #[inline]
    pub fn is_nodata(&self, idx: usize) -> bool {
        match self.nodata {
            Some(nd) if nd.is_nan() => self.data[idx].is_nan(),
            Some(nd) => self.data[idx] == nd,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-pixel mask; `true` marks a pixel without valid data.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelMask {
    pub width: usize,
    pub height: usize,
    masked: Vec<bool>,
}

impl PixelMask {
    /// A mask with every pixel valid.
    pub fn clear(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            masked: vec![false; width * height],
        }
    }

    /// Build a mask from row-major flags.
    ///
    /// Fails with [`OwsError::ShapeMismatch`] unless there is exactly one
    /// flag per pixel.
    pub fn from_flags(width: usize, height: usize, masked: Vec<bool>) -> OwsResult<Self> {
        if masked.len() != width * height {
            return Err(OwsError::ShapeMismatch {
                band: "mask".to_string(),
                width,
                height,
                actual_width: width,
                actual_height: masked.len().checked_div(width).unwrap_or(0),
            });
        }
        Ok(Self {
            width,
            height,
            masked,
        })
    }

    #[inline]
    pub fn is_masked(&self, idx: usize) -> bool {
        self.masked.get(idx).copied().unwrap_or(false)
    }

    pub fn set(&mut self, idx: usize) {
        if let Some(flag) = self.masked.get_mut(idx) {
            *flag = true;
        }
    }

    /// Mask every pixel that is masked in `other` as well.
    pub fn union(&mut self, other: &PixelMask) -> OwsResult<()> {
        if other.width != self.width || other.height != self.height {
            return Err(OwsError::ShapeMismatch {
                band: "mask".to_string(),
                width: self.width,
                height: self.height,
                actual_width: other.width,
                actual_height: other.height,
            });
        }
        for (flag, &theirs) in self.masked.iter_mut().zip(&other.masked) {
            *flag |= theirs;
        }
        Ok(())
    }

    pub fn masked_count(&self) -> usize {
        self.masked.iter().filter(|m| **m).count()
    }
}

/// Bands loaded for one request, keyed by canonical band id.
#[derive(Debug, Clone, Default)]
pub struct BandSet {
    bands: HashMap<String, BandGrid>,
}

impl BandSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, band: impl Into<String>, grid: BandGrid) {
        self.bands.insert(band.into(), grid);
    }

    pub fn with_band(mut self, band: impl Into<String>, grid: BandGrid) -> Self {
        self.insert(band, grid);
        self
    }

    /// Look up a band by canonical id.
    pub fn get(&self, band: &str) -> OwsResult<&BandGrid> {
        self.bands
            .get(band)
            .ok_or_else(|| OwsError::MissingBand(band.to_string()))
    }

    pub fn contains(&self, band: &str) -> bool {
        self.bands.contains_key(band)
    }

    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.bands.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BandGrid)> {
        self.bands.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Common (width, height) of the given bands.
    ///
    /// Fails with [`OwsError::ShapeMismatch`] if any band differs from the
    /// first, or if a band's data length disagrees with its dimensions.
    pub fn shape_of<'a, I>(&self, bands: I) -> OwsResult<(usize, usize)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut shape: Option<(usize, usize)> = None;
        for name in bands {
            let grid = self.get(name)?;
            let (width, height) = *shape.get_or_insert((grid.width, grid.height));
            if grid.width != width || grid.height != height || grid.data.len() != width * height {
                return Err(OwsError::ShapeMismatch {
                    band: name.to_string(),
                    width,
                    height,
                    actual_width: grid.width,
                    actual_height: grid.data.len().checked_div(grid.width).unwrap_or(0),
                });
            }
        }
        Ok(shape.unwrap_or((0, 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_integer_values() {
        let grid = BandGrid::from_values(2, 1, &[100u16, 65535u16]);
        assert_eq!(grid.data, vec![100.0, 65535.0]);
    }

    #[test]
    fn test_nodata_detection() {
        let grid = BandGrid::new(3, 1, vec![0.0, -999.0, 5.0]).with_nodata(-999.0);
        assert!(!grid.is_nodata(0));
        assert!(grid.is_nodata(1));

        let nan_grid = BandGrid::new(2, 1, vec![f32::NAN, 1.0]).with_nodata(f32::NAN);
        assert!(nan_grid.is_nodata(0));
        assert!(!nan_grid.is_nodata(1));
    }

    #[test]
    fn test_shape_mismatch() {
        let bands = BandSet::new()
            .with_band("B01", BandGrid::filled(4, 4, 1.0))
            .with_band("B02", BandGrid::filled(4, 3, 1.0));
        assert!(matches!(
            bands.shape_of(["B01", "B02"]),
            Err(OwsError::ShapeMismatch { .. })
        ));
        assert_eq!(bands.shape_of(["B01"]).unwrap(), (4, 4));
    }

    #[test]
    fn test_shape_rejects_short_data() {
        let bands = BandSet::new().with_band("B01", BandGrid::new(4, 4, vec![0.0; 12]));
        assert!(matches!(
            bands.shape_of(["B01"]),
            Err(OwsError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_band() {
        let bands = BandSet::new();
        assert!(matches!(bands.get("B01"), Err(OwsError::MissingBand(_))));
    }

    #[test]
    fn test_mask_union() {
        let mut a = PixelMask::from_flags(3, 1, vec![true, false, false]).unwrap();
        let b = PixelMask::from_flags(3, 1, vec![false, false, true]).unwrap();
        a.union(&b).unwrap();
        assert_eq!(a.masked_count(), 2);
        assert!(a.is_masked(0));
        assert!(!a.is_masked(1));
        assert!(a.is_masked(2));
    }

    #[test]
    fn test_mask_flags_must_cover_grid() {
        assert!(matches!(
            PixelMask::from_flags(2, 2, vec![]),
            Err(OwsError::ShapeMismatch { width: 2, height: 2, actual_height: 0, .. })
        ));
        assert!(PixelMask::from_flags(2, 2, vec![true; 5]).is_err());
        assert!(PixelMask::from_flags(2, 2, vec![true; 4]).is_ok());
    }

    #[test]
    fn test_mask_union_rejects_other_shape() {
        let mut a = PixelMask::clear(2, 2);
        let b = PixelMask::clear(4, 1);
        assert!(matches!(a.union(&b), Err(OwsError::ShapeMismatch { .. })));
        assert_eq!(a.masked_count(), 0);
    }
}

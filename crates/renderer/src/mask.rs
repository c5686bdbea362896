//! Extent masking of fetched bands.
//!
//! A layer's `extent_mask_func` marks pixels that lie outside the product's
//! valid footprint. The resulting mask is merged with the data source's own
//! mask before the style is evaluated.

use std::collections::HashMap;
use std::sync::Arc;

use ows_common::{BandSet, ExtentMaskFunction, OwsError, OwsResult, PixelMask};

use crate::index::short_key;

/// Mask pixels where any fetched band holds its declared no-data value.
#[derive(Debug, Default)]
pub struct MaskByVal;

impl ExtentMaskFunction for MaskByVal {
    fn mask(&self, bands: &BandSet, width: usize, height: usize) -> PixelMask {
        let mut mask = PixelMask::clear(width, height);
        for (_, grid) in bands.iter().filter(|(_, g)| g.nodata.is_some()) {
            for idx in 0..grid.len().min(width * height) {
                if grid.is_nodata(idx) {
                    mask.set(idx);
                }
            }
        }
        mask
    }
}

/// Mask pixels where any fetched band is NaN or infinite.
#[derive(Debug, Default)]
pub struct MaskByNan;

impl ExtentMaskFunction for MaskByNan {
    fn mask(&self, bands: &BandSet, width: usize, height: usize) -> PixelMask {
        let mut mask = PixelMask::clear(width, height);
        for (_, grid) in bands.iter() {
            for (idx, value) in grid.data.iter().take(width * height).enumerate() {
                if !value.is_finite() {
                    mask.set(idx);
                }
            }
        }
        mask
    }
}

/// Masks nothing.
#[derive(Debug, Default)]
pub struct NoMask;

impl ExtentMaskFunction for NoMask {
    fn mask(&self, _bands: &BandSet, width: usize, height: usize) -> PixelMask {
        PixelMask::clear(width, height)
    }
}

/// Extent mask functions available to layers, keyed by name.
#[derive(Debug, Clone)]
pub struct MaskRegistry {
    functions: HashMap<String, Arc<dyn ExtentMaskFunction>>,
}

impl Default for MaskRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl MaskRegistry {
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// A registry holding `mask_by_val`, `mask_by_nan` and `none`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("mask_by_val", Arc::new(MaskByVal));
        registry.register("mask_by_nan", Arc::new(MaskByNan));
        registry.register("none", Arc::new(NoMask));
        registry
    }

    pub fn register(&mut self, key: impl Into<String>, function: Arc<dyn ExtentMaskFunction>) {
        self.functions.insert(key.into(), function);
    }

    /// Find a mask function by key, falling back to the last dotted segment.
    pub fn lookup(&self, key: &str) -> OwsResult<Arc<dyn ExtentMaskFunction>> {
        self.functions
            .get(key)
            .or_else(|| self.functions.get(short_key(key)))
            .cloned()
            .ok_or_else(|| OwsError::UnknownMaskFunction(key.to_string()))
    }
}

//! Built-in index functions and the registry they are looked up in.
//!
//! Styles refer to functions by key. Existing configurations use dotted keys
//! such as `datacube_ows.band_utils.single_band`; only the last segment is
//! significant unless a function was registered under the full dotted key.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use ows_common::{IndexArgs, IndexFunction, OwsError, OwsResult};

/// The value of one band, unchanged.
///
/// kwargs: `band`
#[derive(Debug, Default)]
pub struct SingleBand;

impl IndexFunction for SingleBand {
    fn band_kwargs(&self) -> &'static [&'static str] {
        &["band"]
    }

    fn compute(&self, args: &IndexArgs<'_>) -> OwsResult<Vec<f64>> {
        let band = args.band("band")?;
        Ok((0..args.pixel_count())
            .into_par_iter()
            .map(|i| band.value(i))
            .collect())
    }
}

/// Normalised difference `(band1 - band2) / (band1 + band2)`, e.g. NDVI.
///
/// kwargs: `band1`, `band2`. Undefined where the sum is zero.
#[derive(Debug, Default)]
pub struct NormDiff;

impl IndexFunction for NormDiff {
    fn band_kwargs(&self) -> &'static [&'static str] {
        &["band1", "band2"]
    }

    fn compute(&self, args: &IndexArgs<'_>) -> OwsResult<Vec<f64>> {
        let b1 = args.band("band1")?;
        let b2 = args.band("band2")?;
        Ok((0..args.pixel_count())
            .into_par_iter()
            .map(|i| {
                let (v1, v2) = (b1.value(i), b2.value(i));
                let sum = v1 + v2;
                if sum == 0.0 {
                    f64::NAN
                } else {
                    (v1 - v2) / sum
                }
            })
            .collect())
    }
}

/// Ratio `band1 / band2`.
///
/// kwargs: `band1`, `band2`. Undefined where `band2` is zero.
#[derive(Debug, Default)]
pub struct BandRatio;

impl IndexFunction for BandRatio {
    fn band_kwargs(&self) -> &'static [&'static str] {
        &["band1", "band2"]
    }

    fn compute(&self, args: &IndexArgs<'_>) -> OwsResult<Vec<f64>> {
        let b1 = args.band("band1")?;
        let b2 = args.band("band2")?;
        Ok((0..args.pixel_count())
            .into_par_iter()
            .map(|i| {
                let denominator = b2.value(i);
                if denominator == 0.0 {
                    f64::NAN
                } else {
                    b1.value(i) / denominator
                }
            })
            .collect())
    }
}

/// `band * scale + offset`.
///
/// kwargs: `band`, `scale`, optional `offset` (default 0).
#[derive(Debug, Default)]
pub struct ScaledBand;

impl IndexFunction for ScaledBand {
    fn band_kwargs(&self) -> &'static [&'static str] {
        &["band"]
    }

    fn required_numeric_kwargs(&self) -> &'static [&'static str] {
        &["scale"]
    }

    fn compute(&self, args: &IndexArgs<'_>) -> OwsResult<Vec<f64>> {
        let band = args.band("band")?;
        let scale = args.number_or("scale", 1.0)?;
        let offset = args.number_or("offset", 0.0)?;
        Ok((0..args.pixel_count())
            .into_par_iter()
            .map(|i| band.value(i) * scale + offset)
            .collect())
    }
}

/// Index functions available to styles, keyed by name.
#[derive(Debug, Clone)]
pub struct IndexFunctionRegistry {
    functions: HashMap<String, Arc<dyn IndexFunction>>,
}

impl Default for IndexFunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl IndexFunctionRegistry {
    /// A registry without any functions.
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// A registry holding `single_band`, `norm_diff`, `band_ratio` and
    /// `scaled_band`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("single_band", Arc::new(SingleBand));
        registry.register("norm_diff", Arc::new(NormDiff));
        registry.register("band_ratio", Arc::new(BandRatio));
        registry.register("scaled_band", Arc::new(ScaledBand));
        registry
    }

    /// Add or replace a function. Must happen before the catalog is loaded.
    pub fn register(&mut self, key: impl Into<String>, function: Arc<dyn IndexFunction>) {
        self.functions.insert(key.into(), function);
    }

    /// Find a function by key, falling back to the last dotted segment.
    pub fn lookup(&self, key: &str) -> OwsResult<Arc<dyn IndexFunction>> {
        self.functions
            .get(key)
            .or_else(|| self.functions.get(short_key(key)))
            .cloned()
            .ok_or_else(|| OwsError::UnknownIndexFunction(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_ok()
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

/// Last segment of a dotted function path.
pub(crate) fn short_key(key: &str) -> &str {
    key.rsplit('.').next().unwrap_or(key)
}

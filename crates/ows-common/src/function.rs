//! Pluggable per-layer functions referenced from configuration by key.
//!
//! Index styles name a function (e.g. `single_band`) and extent masking names
//! a mask function (e.g. `mask_by_val`). Keys are looked up once while the
//! catalog loads; an unknown key aborts startup instead of failing a request.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::bands::BandAliasResolver;
use crate::error::{OwsError, OwsResult};
use crate::grid::{BandGrid, BandSet, PixelMask};

/// A keyword argument value for an index function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KwargValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl KwargValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KwargValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KwargValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Keyword arguments of an index function, as written in the style.
pub type Kwargs = BTreeMap<String, KwargValue>;

/// Everything an index function sees for one evaluation.
#[derive(Debug)]
pub struct IndexArgs<'a> {
    /// Key the function was registered under (for error messages)
    pub function: &'a str,
    pub kwargs: &'a Kwargs,
    pub bands: &'a BandSet,
    pub resolver: &'a BandAliasResolver,
    pub width: usize,
    pub height: usize,
}

impl<'a> IndexArgs<'a> {
    /// The band named by a string kwarg, resolved through the layer's aliases.
    pub fn band(&self, kwarg: &str) -> OwsResult<&'a BandGrid> {
        let identifier = self
            .kwargs
            .get(kwarg)
            .and_then(KwargValue::as_str)
            .ok_or_else(|| self.invalid(format!("missing band argument '{}'", kwarg)))?;
        let canonical = self.resolver.resolve(identifier)?;
        self.bands.get(canonical)
    }

    /// A numeric kwarg, or `default` when it is absent.
    pub fn number_or(&self, kwarg: &str, default: f64) -> OwsResult<f64> {
        match self.kwargs.get(kwarg) {
            None => Ok(default),
            Some(value) => value
                .as_f64()
                .ok_or_else(|| self.invalid(format!("argument '{}' must be a number", kwarg))),
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    fn invalid(&self, message: String) -> OwsError {
        OwsError::IndexFunction {
            function: self.function.to_string(),
            message,
        }
    }
}

/// A function producing one scalar per pixel from a layer's bands.
pub trait IndexFunction: Send + Sync + Debug {
    /// Kwargs whose values name bands (canonical ids or aliases).
    fn band_kwargs(&self) -> &'static [&'static str];

    /// Numeric kwargs that must be present.
    fn required_numeric_kwargs(&self) -> &'static [&'static str] {
        &[]
    }

    /// Check the style's kwargs at load time.
    fn validate_kwargs(&self, kwargs: &Kwargs) -> Result<(), String> {
        for name in self.band_kwargs() {
            match kwargs.get(*name) {
                Some(KwargValue::Text(_)) => {}
                Some(_) => return Err(format!("argument '{}' must name a band", name)),
                None => return Err(format!("missing band argument '{}'", name)),
            }
        }
        for name in self.required_numeric_kwargs() {
            match kwargs.get(*name) {
                Some(KwargValue::Number(_)) => {}
                Some(_) => return Err(format!("argument '{}' must be a number", name)),
                None => return Err(format!("missing argument '{}'", name)),
            }
        }
        Ok(())
    }

    /// Compute the raw index, row-major, `args.pixel_count()` values long.
    ///
    /// Pixels without a defined result are NaN.
    fn compute(&self, args: &IndexArgs<'_>) -> OwsResult<Vec<f64>>;
}

/// A function marking fetched pixels that lie outside the product's extent.
pub trait ExtentMaskFunction: Send + Sync + Debug {
    fn mask(&self, bands: &BandSet, width: usize, height: usize) -> PixelMask;
}

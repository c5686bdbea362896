//! Display ranges of index styles derived from product date ranges.
//!
//! An index style may declare `range: { product: <name> }`. The range is the
//! product's first and last observation date, in days since the Unix epoch,
//! and is looked up once while the catalog loads.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use tracing::info;

use ows_common::{OwsError, OwsResult};

/// Source of per-product display ranges.
pub trait RangeProvider: Send + Sync {
    /// (min, max) display range for a product.
    fn product_range(&self, product: &str) -> OwsResult<(f64, f64)>;
}

/// Product date ranges read from a YAML file of `product: [first, last]`.
///
/// ```yaml
/// s2cloudless_mosaic: [2019-06-01, 2020-08-31]
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticRangeCache {
    ranges: HashMap<String, (NaiveDate, NaiveDate)>,
}

impl StaticRangeCache {
    /// A cache without any products; every lookup fails.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(yaml: &str) -> OwsResult<Self> {
        let raw: HashMap<String, [NaiveDate; 2]> = serde_yaml::from_str(yaml)?;
        let mut cache = Self::empty();
        for (product, [first, last]) in raw {
            if first > last {
                return Err(OwsError::ConfigParse(format!(
                    "range of product '{}' ends ({}) before it starts ({})",
                    product, last, first
                )));
            }
            cache.insert(product, first, last);
        }
        Ok(cache)
    }

    pub fn from_file(path: impl AsRef<Path>) -> OwsResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| OwsError::ConfigIo(format!("{}: {}", path.display(), e)))?;
        let cache = Self::from_yaml_str(&contents)?;
        info!(
            path = %path.display(),
            products = cache.len(),
            "Loaded product date ranges"
        );
        Ok(cache)
    }

    pub fn insert(&mut self, product: impl Into<String>, first: NaiveDate, last: NaiveDate) {
        self.ranges.insert(product.into(), (first, last));
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl RangeProvider for StaticRangeCache {
    fn product_range(&self, product: &str) -> OwsResult<(f64, f64)> {
        let (first, last) = self
            .ranges
            .get(product)
            .ok_or_else(|| OwsError::RangeUnavailable {
                product: product.to_string(),
                message: "no date range recorded for product".to_string(),
            })?;
        Ok((days_since_epoch(*first), days_since_epoch(*last)))
    }
}

fn days_since_epoch(date: NaiveDate) -> f64 {
    (date - NaiveDate::default()).num_days() as f64
}

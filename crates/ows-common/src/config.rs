//! Declarative service configuration loaded from YAML.
//!
//! The records here mirror the configuration file one-to-one. They are
//! resolved into immutable [`Layer`](crate::Layer) values by the catalog
//! builder, which is where fragment references, band aliases and function
//! keys are checked.
//!
//! Reusable fragments (band maps, styles, resource limits) are declared once
//! under top-level keys and referenced from layers by name:
//!
//! ```yaml
//! bands:
//!   bands_s2: { B02: [red], B03: [green], B04: [blue] }
//! layers:
//!   - name: s2
//!     title: s2
//!     product_name: s2_level1c_granule
//!     bands: bands_s2
//!     styling: { default_style: s2_style, styles: [s2_style] }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{OwsError, OwsResult};
use crate::function::Kwargs;
use crate::limits::{LayerResourceLimits, ServiceKind};
use crate::style::ScaleRange;

/// Largest WMTS tile edge served, in pixels.
pub const MAX_WMTS_TILE_SIZE: u32 = 4096;

/// Canonical band id -> aliases.
pub type BandMapRecord = BTreeMap<String, Vec<String>>;

/// Root of the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct OwsConfig {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub wms: WmsConfig,

    #[serde(default)]
    pub wcs: WcsConfig,

    /// Reusable band alias maps
    #[serde(default)]
    pub bands: BTreeMap<String, BandMapRecord>,

    /// Reusable style definitions
    #[serde(default)]
    pub styles: BTreeMap<String, StyleRecord>,

    /// Reusable resource limit policies
    #[serde(default)]
    pub resource_limits: BTreeMap<String, LayerResourceLimits>,

    /// Top-level layers and folders
    pub layers: Vec<LayerNodeRecord>,
}

impl OwsConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> OwsResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> OwsResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| OwsError::ConfigIo(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_yaml_str(&contents)?;
        info!(
            path = %path.display(),
            top_level_nodes = config.layers.len(),
            "Loaded service configuration"
        );
        Ok(config)
    }

    /// Maximum image size (width, height) for a service, if it has one.
    ///
    /// WMTS tiles are sized by the tile matrix rather than configuration, so
    /// WMTS only gets the [`MAX_WMTS_TILE_SIZE`] ceiling.
    pub fn max_image_size(&self, service: ServiceKind) -> Option<(u32, u32)> {
        match service {
            ServiceKind::Wms => Some((self.wms.max_width, self.wms.max_height)),
            ServiceKind::Wmts => Some((MAX_WMTS_TILE_SIZE, MAX_WMTS_TILE_SIZE)),
            ServiceKind::Wcs => match (self.wcs.max_width, self.wcs.max_height) {
                (None, None) => None,
                (w, h) => Some((w.unwrap_or(u32::MAX), h.unwrap_or(u32::MAX))),
            },
        }
    }
}

/// Settings that apply to all services and layers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub title: String,

    #[serde(default, rename = "abstract")]
    pub abstract_text: String,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub info_url: Option<String>,

    #[serde(default)]
    pub allowed_urls: Vec<String>,

    /// Headers added to every response
    #[serde(default)]
    pub response_headers: BTreeMap<String, String>,

    #[serde(default)]
    pub services: ServicesConfig,
}

/// Which OGC services this instance answers.
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_true")]
    pub wms: bool,
    #[serde(default = "default_true")]
    pub wmts: bool,
    #[serde(default)]
    pub wcs: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            wms: true,
            wmts: true,
            wcs: false,
        }
    }
}

impl ServicesConfig {
    pub fn is_enabled(&self, service: ServiceKind) -> bool {
        match service {
            ServiceKind::Wms => self.wms,
            ServiceKind::Wmts => self.wmts,
            ServiceKind::Wcs => self.wcs,
        }
    }
}

/// WMS service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WmsConfig {
    #[serde(default = "default_max_size")]
    pub max_width: u32,
    #[serde(default = "default_max_size")]
    pub max_height: u32,
}

fn default_max_size() -> u32 {
    256
}

impl Default for WmsConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_size(),
            max_height: default_max_size(),
        }
    }
}

/// WCS service settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WcsConfig {
    #[serde(default, rename = "default_geographic_CRS", alias = "default_geographic_crs")]
    pub default_geographic_crs: Option<String>,

    #[serde(default)]
    pub native_format: Option<String>,

    #[serde(default)]
    pub max_width: Option<u32>,

    #[serde(default)]
    pub max_height: Option<u32>,
}

/// Either a reference to a named top-level fragment or an inline value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Fragment<T> {
    Named(String),
    Inline(T),
}

impl<T> Fragment<T> {
    /// Look the fragment up in `pool` if it is a reference.
    pub fn resolve<'a>(
        &'a self,
        pool: &'a BTreeMap<String, T>,
        kind: &'static str,
    ) -> OwsResult<&'a T> {
        match self {
            Fragment::Inline(value) => Ok(value),
            Fragment::Named(name) => pool.get(name).ok_or_else(|| OwsError::UnknownFragment {
                kind,
                name: name.clone(),
            }),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Fragment::Named(name) => Some(name),
            Fragment::Inline(_) => None,
        }
    }
}

/// A style as written in configuration.
///
/// Exactly one of `components` (linear combination) or `index_function`
/// must be present.
#[derive(Debug, Clone, Deserialize)]
pub struct StyleRecord {
    pub name: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, rename = "abstract")]
    pub abstract_text: String,

    /// Channel name -> (band or alias -> multiplier)
    #[serde(default)]
    pub components: Option<BTreeMap<String, BTreeMap<String, f64>>>,

    #[serde(default)]
    pub scale_range: Option<ScaleRange>,

    #[serde(default)]
    pub index_function: Option<IndexFunctionRecord>,

    #[serde(default)]
    pub needed_bands: Vec<String>,

    #[serde(default)]
    pub range: Option<RangeRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexFunctionRecord {
    pub function: String,
    #[serde(default)]
    pub kwargs: Kwargs,
}

/// Display range of an index style.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RangeRecord {
    /// Literal `[min, max]`
    Literal([f64; 2]),
    /// Observed date range of a product, resolved once at load time
    Product { product: String },
}

/// A layer or folder as written in configuration.
///
/// Folders have `layers` and no `name`; named layers have everything else.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerNodeRecord {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default, rename = "abstract")]
    pub abstract_text: String,

    /// Child nodes; present only on folders
    #[serde(default)]
    pub layers: Option<Vec<LayerNodeRecord>>,

    #[serde(default)]
    pub product_name: Option<String>,

    #[serde(default)]
    pub bands: Option<Fragment<BandMapRecord>>,

    #[serde(default)]
    pub resource_limits: Option<Fragment<LayerResourceLimits>>,

    #[serde(default)]
    pub image_processing: Option<ImageProcessingRecord>,

    #[serde(default)]
    pub wcs: Option<WcsLayerRecord>,

    #[serde(default)]
    pub styling: Option<StylingRecord>,
}

impl LayerNodeRecord {
    pub fn is_folder(&self) -> bool {
        self.layers.is_some()
    }

    /// Name for error messages: the layer name, or the folder title.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.title)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageProcessingRecord {
    #[serde(default)]
    pub extent_mask_func: Option<String>,
    #[serde(default)]
    pub always_fetch_bands: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WcsLayerRecord {
    #[serde(alias = "native_CRS")]
    pub native_crs: String,
    #[serde(default)]
    pub default_bands: Vec<String>,
    pub native_resolution: [f64; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct StylingRecord {
    pub default_style: String,
    pub styles: Vec<Fragment<StyleRecord>>,
}

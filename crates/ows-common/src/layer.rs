//! Layer definitions and the presentation hierarchy.

use std::sync::Arc;

use crate::bands::BandAliasResolver;
use crate::error::OwsResult;
use crate::function::ExtentMaskFunction;
use crate::limits::LayerResourceLimits;
use crate::style::{Style, StyleRegistry};

/// A named, independently stylable raster product.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Unique, case-sensitive layer name
    pub name: String,

    /// Human-readable title for capabilities documents
    pub title: String,

    pub abstract_text: String,

    /// Product the layer's bands are read from
    pub product: String,

    pub bands: Arc<BandAliasResolver>,

    pub resource_limits: Arc<LayerResourceLimits>,

    pub styles: StyleRegistry,

    pub image_processing: ImageProcessing,

    /// Coverage settings; `None` when the layer is not published over WCS
    pub wcs: Option<WcsLayerConfig>,
}

impl Layer {
    /// The requested style, or the default when the request names none.
    ///
    /// Fails with [`crate::OwsError::StyleNotFound`] for an unknown name.
    pub fn style(&self, name: Option<&str>) -> OwsResult<&Arc<Style>> {
        self.styles.get_or_default(name)
    }

    /// Canonical bands to fetch for a style's band ids, including any bands
    /// the layer always fetches. Sorted and de-duplicated.
    pub fn bands_to_fetch<'a, I>(&self, style_bands: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut bands: Vec<String> = style_bands
            .into_iter()
            .filter_map(|b| self.bands.resolve(b).ok().map(str::to_string))
            .chain(self.image_processing.always_fetch_bands.iter().cloned())
            .collect();
        bands.sort();
        bands.dedup();
        bands
    }
}

/// Masking applied to fetched data before styling.
#[derive(Debug, Clone, Default)]
pub struct ImageProcessing {
    /// Function marking pixels outside the product's valid extent
    pub extent_mask: Option<Arc<dyn ExtentMaskFunction>>,

    /// Canonical bands fetched for every request regardless of style
    pub always_fetch_bands: Vec<String>,
}

/// WCS-specific layer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WcsLayerConfig {
    pub native_crs: String,

    /// Canonical bands returned when a coverage request names none
    pub default_bands: Vec<String>,

    /// Native pixel size (x, y) in `native_crs` units
    pub native_resolution: (f64, f64),
}

impl WcsLayerConfig {
    /// The coarser of the two native axes, always positive.
    pub fn native_resolution(&self) -> f64 {
        self.native_resolution.0.abs().max(self.native_resolution.1.abs())
    }
}

/// A node of the presentation hierarchy.
#[derive(Debug, Clone)]
pub enum LayerNode {
    Folder(Folder),
    Layer(Arc<Layer>),
}

/// An unnamed grouping of layers; carries no band, style or limit semantics.
#[derive(Debug, Clone)]
pub struct Folder {
    pub title: String,
    pub abstract_text: String,
    pub children: Vec<LayerNode>,
}

impl Folder {
    /// Named layers below this folder, depth first.
    pub fn layers(&self) -> Vec<&Arc<Layer>> {
        let mut out = Vec::new();
        collect_layers(&self.children, &mut out);
        out
    }
}

pub(crate) fn collect_layers<'a>(nodes: &'a [LayerNode], out: &mut Vec<&'a Arc<Layer>>) {
    for node in nodes {
        match node {
            LayerNode::Folder(folder) => collect_layers(&folder.children, out),
            LayerNode::Layer(layer) => out.push(layer),
        }
    }
}

/// Named layers in a list of nodes, depth first in configuration order.
pub fn flatten(nodes: &[LayerNode]) -> Vec<&Arc<Layer>> {
    let mut out = Vec::new();
    collect_layers(nodes, &mut out);
    out
}

//! The layer catalog: every layer of the service, built once from
//! configuration.
//!
//! Building resolves fragment references, looks up index and mask functions,
//! precomputes display ranges and validates every style against its layer's
//! bands. Any problem aborts the build; a catalog that exists is valid.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use ows_common::config::{
    BandMapRecord, Fragment, GlobalConfig, LayerNodeRecord, RangeRecord, StyleRecord,
};
use ows_common::layer::flatten;
use ows_common::{
    BandAliasResolver, Channel, ChannelTerms, Folder, ImageProcessing, IndexStyle, Layer,
    LayerNode, LayerResourceLimits, LinearStyle, OwsConfig, OwsError, OwsResult, ScaleRange,
    ServiceKind, Style, StyleKind, StyleRegistry, WcsLayerConfig,
};
use renderer::{IndexFunctionRegistry, MaskRegistry};

use crate::range::RangeProvider;

/// Functions that configuration may refer to by key.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistries {
    pub index_functions: IndexFunctionRegistry,
    pub masks: MaskRegistry,
}

/// Service-wide settings taken from configuration.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub global: GlobalConfig,
    max_image_sizes: HashMap<ServiceKind, (u32, u32)>,
}

impl ServiceSettings {
    fn from_config(config: &OwsConfig) -> Self {
        let max_image_sizes = [ServiceKind::Wms, ServiceKind::Wmts, ServiceKind::Wcs]
            .into_iter()
            .filter_map(|s| config.max_image_size(s).map(|size| (s, size)))
            .collect();
        Self {
            global: config.global.clone(),
            max_image_sizes,
        }
    }

    pub fn is_enabled(&self, service: ServiceKind) -> bool {
        self.global.services.is_enabled(service)
    }

    /// Maximum (width, height) of a request, if the service has one.
    pub fn max_image_size(&self, service: ServiceKind) -> Option<(u32, u32)> {
        self.max_image_sizes.get(&service).copied()
    }
}

/// All layers of the service, in a flat namespace.
///
/// Immutable once built and shared across requests without locking.
#[derive(Debug, Clone)]
pub struct LayerCatalog {
    settings: ServiceSettings,
    nodes: Vec<LayerNode>,
    layers: Vec<Arc<Layer>>,
    by_name: HashMap<String, usize>,
}

impl LayerCatalog {
    /// Build the catalog from parsed configuration.
    pub fn from_config(
        config: &OwsConfig,
        registries: &FunctionRegistries,
        ranges: &dyn RangeProvider,
    ) -> OwsResult<Self> {
        let mut builder = CatalogBuilder {
            config,
            registries,
            ranges,
            band_maps: HashMap::new(),
            styles: HashMap::new(),
            limits: HashMap::new(),
        };
        let nodes = config
            .layers
            .iter()
            .map(|record| builder.build_node(record))
            .collect::<OwsResult<Vec<_>>>()?;

        let mut layers = Vec::new();
        let mut by_name = HashMap::new();
        for layer in flatten(&nodes) {
            match by_name.entry(layer.name.clone()) {
                Entry::Occupied(_) => return Err(OwsError::DuplicateLayerName(layer.name.clone())),
                Entry::Vacant(slot) => {
                    slot.insert(layers.len());
                    layers.push(Arc::clone(layer));
                }
            }
        }

        info!(
            layers = layers.len(),
            styles = builder.styles.len(),
            band_maps = builder.band_maps.len(),
            "Built layer catalog"
        );

        Ok(Self {
            settings: ServiceSettings::from_config(config),
            nodes,
            layers,
            by_name,
        })
    }

    /// Look up a layer by its exact name. Folders are never found.
    pub fn find_layer(&self, name: &str) -> OwsResult<&Arc<Layer>> {
        self.by_name
            .get(name)
            .map(|&i| &self.layers[i])
            .ok_or_else(|| OwsError::LayerNotFound(name.to_string()))
    }

    /// Named layers in configuration order.
    pub fn layers(&self) -> impl Iterator<Item = &Arc<Layer>> {
        self.layers.iter()
    }

    /// The presentation hierarchy of folders and layers.
    pub fn folders(&self) -> &[LayerNode] {
        &self.nodes
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Resolves configuration records into layers, sharing named fragments.
struct CatalogBuilder<'a> {
    config: &'a OwsConfig,
    registries: &'a FunctionRegistries,
    ranges: &'a dyn RangeProvider,
    band_maps: HashMap<String, Arc<BandAliasResolver>>,
    styles: HashMap<String, Arc<Style>>,
    limits: HashMap<String, Arc<LayerResourceLimits>>,
}

impl CatalogBuilder<'_> {
    fn build_node(&mut self, record: &LayerNodeRecord) -> OwsResult<LayerNode> {
        match &record.layers {
            Some(children) => {
                if let Some(name) = &record.name {
                    return Err(OwsError::InvalidLayer {
                        layer: name.clone(),
                        message: "folders cannot be named".to_string(),
                    });
                }
                let children = children
                    .iter()
                    .map(|child| self.build_node(child))
                    .collect::<OwsResult<Vec<_>>>()?;
                Ok(LayerNode::Folder(Folder {
                    title: record.title.clone(),
                    abstract_text: record.abstract_text.clone(),
                    children,
                }))
            }
            None => Ok(LayerNode::Layer(Arc::new(self.build_layer(record)?))),
        }
    }

    fn build_layer(&mut self, record: &LayerNodeRecord) -> OwsResult<Layer> {
        let invalid = |message: &str| OwsError::InvalidLayer {
            layer: record.label().to_string(),
            message: message.to_string(),
        };

        let name = record.name.clone().ok_or_else(|| invalid("layer has no name"))?;
        let product = record
            .product_name
            .clone()
            .ok_or_else(|| invalid("layer has no product_name"))?;
        let bands = self.band_map(record.bands.as_ref().ok_or_else(|| invalid("layer has no bands"))?)?;
        let styling = record
            .styling
            .as_ref()
            .ok_or_else(|| invalid("layer has no styling section"))?;

        let resource_limits = match &record.resource_limits {
            Some(fragment) => self.resource_limits(fragment)?,
            None => Arc::new(LayerResourceLimits::default()),
        };

        let styles = styling
            .styles
            .iter()
            .map(|fragment| self.style(fragment))
            .collect::<OwsResult<Vec<_>>>()?;
        let styles = StyleRegistry::build(name.clone(), styling.default_style.clone(), styles, &bands)?;

        let image_processing = match &record.image_processing {
            Some(ip) => ImageProcessing {
                extent_mask: ip
                    .extent_mask_func
                    .as_deref()
                    .map(|key| self.registries.masks.lookup(key))
                    .transpose()?,
                always_fetch_bands: bands
                    .resolve_all(ip.always_fetch_bands.iter().map(String::as_str))?,
            },
            None => ImageProcessing::default(),
        };

        let wcs = match &record.wcs {
            Some(wcs) => Some(WcsLayerConfig {
                native_crs: wcs.native_crs.clone(),
                default_bands: bands.resolve_all(wcs.default_bands.iter().map(String::as_str))?,
                native_resolution: (wcs.native_resolution[0], wcs.native_resolution[1]),
            }),
            None => None,
        };

        debug!(
            layer = %name,
            product = %product,
            styles = styles.len(),
            default_style = styles.default_name(),
            "Built layer"
        );

        Ok(Layer {
            name,
            title: record.title.clone(),
            abstract_text: record.abstract_text.clone(),
            product,
            bands,
            resource_limits,
            styles,
            image_processing,
            wcs,
        })
    }

    fn band_map(&mut self, fragment: &Fragment<BandMapRecord>) -> OwsResult<Arc<BandAliasResolver>> {
        if let Some(cached) = fragment.name().and_then(|n| self.band_maps.get(n)) {
            return Ok(Arc::clone(cached));
        }
        let record = fragment.resolve(&self.config.bands, "bands")?;
        let resolver = Arc::new(BandAliasResolver::new(
            record.iter().map(|(band, aliases)| (band.clone(), aliases.clone())),
        )?);
        if let Some(name) = fragment.name() {
            self.band_maps.insert(name.to_string(), Arc::clone(&resolver));
        }
        Ok(resolver)
    }

    fn resource_limits(
        &mut self,
        fragment: &Fragment<LayerResourceLimits>,
    ) -> OwsResult<Arc<LayerResourceLimits>> {
        if let Some(cached) = fragment.name().and_then(|n| self.limits.get(n)) {
            return Ok(Arc::clone(cached));
        }
        let limits = Arc::new(fragment.resolve(&self.config.resource_limits, "resource_limits")?.clone());
        if let Some(name) = fragment.name() {
            self.limits.insert(name.to_string(), Arc::clone(&limits));
        }
        Ok(limits)
    }

    fn style(&mut self, fragment: &Fragment<StyleRecord>) -> OwsResult<Arc<Style>> {
        if let Some(cached) = fragment.name().and_then(|n| self.styles.get(n)) {
            return Ok(Arc::clone(cached));
        }
        let record = fragment.resolve(&self.config.styles, "styles")?;
        let style = Arc::new(self.build_style(record)?);
        if let Some(name) = fragment.name() {
            self.styles.insert(name.to_string(), Arc::clone(&style));
        }
        Ok(style)
    }

    fn build_style(&self, record: &StyleRecord) -> OwsResult<Style> {
        let invalid = |message: String| OwsError::InvalidStyle {
            style: record.name.clone(),
            message,
        };

        let kind = match (&record.components, &record.index_function) {
            (Some(components), None) => {
                let scale_range = record.scale_range.ok_or_else(|| {
                    invalid("linear combination styles need a scale_range".to_string())
                })?;
                let mut channels = HashMap::new();
                for (channel_name, terms) in components {
                    let channel = Channel::parse(channel_name)
                        .ok_or_else(|| invalid(format!("unknown channel '{}'", channel_name)))?;
                    if terms.is_empty() {
                        return Err(invalid(format!(
                            "channel '{}' has no band multipliers",
                            channel_name
                        )));
                    }
                    let terms = terms.iter().map(|(band, m)| (band.clone(), *m)).collect();
                    channels.insert(channel, ChannelTerms::new(terms));
                }
                StyleKind::LinearCombination(LinearStyle {
                    components: channels,
                    scale_range,
                })
            }
            (None, Some(index)) => {
                let function = self.registries.index_functions.lookup(&index.function)?;
                function
                    .validate_kwargs(&index.kwargs)
                    .map_err(|message| OwsError::InvalidIndexKwargs {
                        function: index.function.clone(),
                        message,
                    })?;

                let range = match &record.range {
                    Some(RangeRecord::Literal([min, max])) => Some((*min, *max)),
                    Some(RangeRecord::Product { product }) => Some(self.ranges.product_range(product)?),
                    None => None,
                };
                if let Some((min, max)) = range {
                    ScaleRange::new(min, max)?;
                } else if record.scale_range.is_none() {
                    return Err(OwsError::MissingDisplayRange(record.name.clone()));
                }

                StyleKind::IndexFunction(IndexStyle {
                    function_key: index.function.clone(),
                    function,
                    kwargs: index.kwargs.clone(),
                    needed_bands: record.needed_bands.clone(),
                    range,
                    scale_range: record.scale_range,
                })
            }
            (Some(_), Some(_)) => {
                return Err(invalid(
                    "components and index_function are mutually exclusive".to_string(),
                ))
            }
            (None, None) => {
                return Err(invalid(
                    "style needs either components or an index_function".to_string(),
                ))
            }
        };

        Ok(Style {
            name: record.name.clone(),
            title: record.title.clone(),
            abstract_text: record.abstract_text.clone(),
            kind,
        })
    }
}

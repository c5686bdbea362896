//! Style definitions and the per-layer style registry.
//!
//! A style is either a linear combination of bands per output channel, or an
//! index function producing one scalar per pixel. Styles are resolved from
//! configuration once and shared (via `Arc`) by every layer that uses them.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bands::BandAliasResolver;
use crate::error::{OwsError, OwsResult};
use crate::function::{IndexFunction, Kwargs};

/// An 8-bit RGBA colour, written `[r, g, b, a]` in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u8; 4]", into = "[u8; 4]")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<[u8; 4]> for Rgba {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Self::new(r, g, b, a)
    }
}

impl From<Rgba> for [u8; 4] {
    fn from(c: Rgba) -> Self {
        c.to_array()
    }
}

/// Raw value interval mapped linearly onto the 8-bit output range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct ScaleRange {
    low: f64,
    high: f64,
}

impl ScaleRange {
    /// Fails with [`OwsError::InvalidScaleRange`] unless `low < high`.
    pub fn new(low: f64, high: f64) -> OwsResult<Self> {
        if low.is_finite() && high.is_finite() && low < high {
            Ok(Self { low, high })
        } else {
            Err(OwsError::InvalidScaleRange { low, high })
        }
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    /// Map a raw value onto 0..=255, clipping outside the range.
    ///
    /// NaN maps to 0; callers mask invalid pixels before quantizing.
    #[inline]
    pub fn quantize(&self, raw: f64) -> u8 {
        let scaled = ((raw - self.low) / (self.high - self.low) * 255.0).round();
        // NaN passes through clamp and casts to 0
        scaled.clamp(0.0, 255.0) as u8
    }
}

impl TryFrom<[f64; 2]> for ScaleRange {
    type Error = OwsError;

    fn try_from([low, high]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(low, high)
    }
}

impl From<ScaleRange> for [f64; 2] {
    fn from(r: ScaleRange) -> Self {
        [r.low, r.high]
    }
}

/// An output channel of a linear-combination style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Red,
    Green,
    Blue,
    Alpha,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Red, Channel::Green, Channel::Blue, Channel::Alpha];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "red" => Some(Channel::Red),
            "green" => Some(Channel::Green),
            "blue" => Some(Channel::Blue),
            "alpha" => Some(Channel::Alpha),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Red => "red",
            Channel::Green => "green",
            Channel::Blue => "blue",
            Channel::Alpha => "alpha",
        }
    }

    /// Position of the channel in an RGBA pixel.
    pub fn offset(&self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
            Channel::Alpha => 3,
        }
    }
}

/// Band multipliers contributing to one channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelTerms {
    /// (band id or alias as written, multiplier)
    terms: Vec<(String, f64)>,
}

impl ChannelTerms {
    pub fn new(terms: Vec<(String, f64)>) -> Self {
        Self { terms }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.terms.iter().map(|(b, m)| (b.as_str(), *m))
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// A style whose channels are weighted sums of bands.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearStyle {
    pub components: HashMap<Channel, ChannelTerms>,
    pub scale_range: ScaleRange,
}

impl LinearStyle {
    pub fn channel(&self, channel: Channel) -> Option<&ChannelTerms> {
        self.components.get(&channel)
    }
}

/// A style computed by an index function.
#[derive(Debug, Clone)]
pub struct IndexStyle {
    /// Key the function was configured with
    pub function_key: String,
    /// Function resolved at load time
    pub function: Arc<dyn IndexFunction>,
    pub kwargs: Kwargs,
    pub needed_bands: Vec<String>,
    /// Display range (min, max) used for colourisation and legends
    pub range: Option<(f64, f64)>,
    pub scale_range: Option<ScaleRange>,
}

impl IndexStyle {
    /// The range that maps raw index values onto display grey levels.
    pub fn display_range(&self) -> Option<ScaleRange> {
        match self.range {
            Some((min, max)) => ScaleRange::new(min, max).ok(),
            None => self.scale_range,
        }
    }
}

#[derive(Debug, Clone)]
pub enum StyleKind {
    LinearCombination(LinearStyle),
    IndexFunction(IndexStyle),
}

/// A named transformation from raw bands to a renderable output.
#[derive(Debug, Clone)]
pub struct Style {
    pub name: String,
    pub title: String,
    pub abstract_text: String,
    pub kind: StyleKind,
}

impl Style {
    /// Every band identifier the style refers to, as written.
    pub fn band_references(&self) -> Vec<&str> {
        match &self.kind {
            StyleKind::LinearCombination(linear) => Channel::ALL
                .iter()
                .filter_map(|c| linear.channel(*c))
                .flat_map(|terms| terms.iter().map(|(band, _)| band))
                .collect(),
            StyleKind::IndexFunction(index) => {
                let mut refs: Vec<&str> = index.needed_bands.iter().map(String::as_str).collect();
                refs.extend(
                    index
                        .function
                        .band_kwargs()
                        .iter()
                        .filter_map(|k| index.kwargs.get(*k).and_then(|v| v.as_str())),
                );
                refs
            }
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self.kind, StyleKind::IndexFunction(_))
    }
}

/// The styles available for one layer, keyed by unique name.
#[derive(Debug, Clone)]
pub struct StyleRegistry {
    layer: String,
    styles: Vec<Arc<Style>>,
    by_name: HashMap<String, usize>,
    default_name: String,
}

impl StyleRegistry {
    pub fn new(layer: impl Into<String>, default_name: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            styles: Vec::new(),
            by_name: HashMap::new(),
            default_name: default_name.into(),
        }
    }

    /// Register all styles, validate them against the layer's bands and
    /// check that the default style exists.
    pub fn build<I>(
        layer: impl Into<String>,
        default_name: impl Into<String>,
        styles: I,
        resolver: &BandAliasResolver,
    ) -> OwsResult<Self>
    where
        I: IntoIterator<Item = Arc<Style>>,
    {
        let mut registry = Self::new(layer, default_name);
        for style in styles {
            registry.register(style)?;
        }
        registry.validate(resolver)?;
        registry.default_style()?;
        Ok(registry)
    }

    pub fn register(&mut self, style: Arc<Style>) -> OwsResult<()> {
        if self.by_name.contains_key(&style.name) {
            return Err(OwsError::DuplicateStyleName(style.name.clone()));
        }
        self.by_name.insert(style.name.clone(), self.styles.len());
        self.styles.push(style);
        Ok(())
    }

    /// Check every band reference of every style against the layer's bands.
    pub fn validate(&self, resolver: &BandAliasResolver) -> OwsResult<()> {
        for style in &self.styles {
            for band in style.band_references() {
                resolver.resolve(band)?;
            }

            if let StyleKind::IndexFunction(index) = &style.kind {
                let needed = resolver.resolve_all(index.needed_bands.iter().map(String::as_str))?;
                for kwarg in index.function.band_kwargs() {
                    let Some(band) = index.kwargs.get(*kwarg).and_then(|v| v.as_str()) else {
                        continue;
                    };
                    let canonical = resolver.resolve(band)?;
                    if !needed.iter().any(|n| n == canonical) {
                        return Err(OwsError::InvalidIndexKwargs {
                            function: index.function_key.clone(),
                            message: format!(
                                "band '{}' of style '{}' is not listed in needed_bands",
                                band, style.name
                            ),
                        });
                    }
                }
            }
            debug!(style = %style.name, "Validated style band references");
        }
        Ok(())
    }

    pub fn default_style(&self) -> OwsResult<&Arc<Style>> {
        self.by_name
            .get(&self.default_name)
            .map(|&i| &self.styles[i])
            .ok_or_else(|| OwsError::NoDefaultStyle(self.default_name.clone()))
    }

    /// Look up a style by name. Never falls back to the default.
    pub fn get(&self, name: &str) -> OwsResult<&Arc<Style>> {
        self.by_name
            .get(name)
            .map(|&i| &self.styles[i])
            .ok_or_else(|| OwsError::StyleNotFound {
                layer: self.layer.clone(),
                style: name.to_string(),
            })
    }

    /// The named style, or the default when no name is given.
    ///
    /// An empty name counts as no name, as in a WMS `STYLES=` parameter.
    pub fn get_or_default(&self, name: Option<&str>) -> OwsResult<&Arc<Style>> {
        match name {
            Some(n) if !n.is_empty() => self.get(n),
            _ => self.default_style(),
        }
    }

    /// Name of the layer these styles belong to.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Styles in registration order.
    pub fn styles(&self) -> impl Iterator<Item = &Arc<Style>> {
        self.styles.iter()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

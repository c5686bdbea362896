//! Resource limit policies for protecting the server from expensive requests.

use serde::{Deserialize, Serialize};

use crate::style::Rgba;

/// The OGC service a request arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Wms,
    Wmts,
    Wcs,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Wms => "wms",
            ServiceKind::Wmts => "wmts",
            ServiceKind::Wcs => "wcs",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fill used for zoomed-out responses when a policy doesn't name one.
pub const DEFAULT_ZOOMED_OUT_FILL: Rgba = Rgba::new(150, 180, 200, 160);

/// Limits applied to one service type of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Reject requests that would read more source datasets than this
    #[serde(default)]
    pub max_datasets: Option<usize>,

    /// Serve a fill colour instead of real pixels above this zoom factor
    #[serde(default)]
    pub min_zoom_factor: Option<f64>,

    /// Colour of the zoomed-out fill image
    #[serde(default = "default_fill")]
    pub zoomed_out_fill_colour: Rgba,
}

fn default_fill() -> Rgba {
    DEFAULT_ZOOMED_OUT_FILL
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_datasets: None,
            min_zoom_factor: None,
            zoomed_out_fill_colour: DEFAULT_ZOOMED_OUT_FILL,
        }
    }
}

impl ResourceLimits {
    /// A policy without any limits.
    pub fn unlimited() -> Self {
        Self::default()
    }
}

/// Per-service resource limits of a layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerResourceLimits {
    #[serde(default)]
    pub wms: ResourceLimits,

    /// WMTS limits; WMTS is served through the WMS pipeline, so the WMS
    /// policy applies when this is absent.
    #[serde(default)]
    pub wmts: Option<ResourceLimits>,

    #[serde(default)]
    pub wcs: ResourceLimits,
}

impl LayerResourceLimits {
    pub fn for_service(&self, service: ServiceKind) -> &ResourceLimits {
        match service {
            ServiceKind::Wms => &self.wms,
            ServiceKind::Wmts => self.wmts.as_ref().unwrap_or(&self.wms),
            ServiceKind::Wcs => &self.wcs,
        }
    }
}

/// How zoomed-out a request is relative to the data's native resolution.
///
/// A factor of 1.0 means one output pixel per native pixel; larger values
/// mean more native pixels are squeezed into each output pixel.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ZoomFactor(pub f64);

impl ZoomFactor {
    /// Ratio of the request's ground resolution to the native resolution.
    pub fn from_resolutions(request_resolution: f64, native_resolution: f64) -> Self {
        let native = native_resolution.abs();
        if native == 0.0 {
            return Self(f64::INFINITY);
        }
        Self(request_resolution.abs() / native)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wmts_falls_back_to_wms() {
        let limits = LayerResourceLimits {
            wms: ResourceLimits {
                max_datasets: Some(16),
                ..ResourceLimits::default()
            },
            wmts: None,
            wcs: ResourceLimits::unlimited(),
        };
        assert_eq!(limits.for_service(ServiceKind::Wmts).max_datasets, Some(16));
        assert_eq!(limits.for_service(ServiceKind::Wcs).max_datasets, None);
    }

    #[test]
    fn test_parse_policy_defaults_fill() {
        let limits: LayerResourceLimits =
            serde_yaml::from_str("wms:\n  min_zoom_factor: 35.0\n").unwrap();
        assert_eq!(limits.wms.min_zoom_factor, Some(35.0));
        assert_eq!(limits.wms.zoomed_out_fill_colour, DEFAULT_ZOOMED_OUT_FILL);
        assert_eq!(limits.wcs, ResourceLimits::default());
    }

    #[test]
    fn test_zoom_factor() {
        assert_eq!(ZoomFactor::from_resolutions(400.0, -10.0).value(), 40.0);
        assert!(ZoomFactor::from_resolutions(1.0, 0.0).value().is_infinite());
    }
}

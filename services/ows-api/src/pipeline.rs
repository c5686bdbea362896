//! The request pipeline from a parsed OWS request to a styled output.
//!
//! Stages, in order: service check, request-shape check, layer lookup,
//! resource-limit gate, style lookup, band fetch, extent masking, evaluation.
//! Nothing is fetched unless every earlier stage passes. A zoomed-out request
//! is served its fill before the style is looked up.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use ows_common::{
    BandSet, BoundingBox, Layer, OwsError, OwsResult, PixelMask, ServiceKind, ZoomFactor,
};
use renderer::{OutputMode, RgbaImage, StyleEvaluator, StyleOutput};

use crate::catalog::LayerCatalog;
use crate::gate::{check_request_shape, GateDecision, LoadEstimate, ResourceLimitGate};
use crate::metrics;

/// A map or coverage request as handed over by the protocol layer.
#[derive(Debug, Clone)]
pub struct OwsRequest {
    pub service: ServiceKind,
    pub layer: String,
    /// Requested style; `None` or empty selects the layer's default
    pub style: Option<String>,
    pub bbox: BoundingBox,
    pub width: u32,
    pub height: u32,
    /// Time parameter, passed through to the data source unchanged
    pub time: Option<String>,
    /// Number of source datasets the request would read
    pub dataset_estimate: usize,
    /// Overrides the zoom factor derived from the layer's native resolution
    pub zoom_factor: Option<ZoomFactor>,
    pub output: OutputMode,
}

impl OwsRequest {
    /// A WMS request for the layer's default style.
    pub fn wms(layer: impl Into<String>, bbox: BoundingBox, width: u32, height: u32) -> Self {
        Self {
            service: ServiceKind::Wms,
            layer: layer.into(),
            style: None,
            bbox,
            width,
            height,
            time: None,
            dataset_estimate: 1,
            zoom_factor: None,
            output: OutputMode::Display,
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Zoom factor of the request relative to the layer's native resolution.
    fn effective_zoom_factor(&self, layer: &Layer) -> Option<ZoomFactor> {
        self.zoom_factor.or_else(|| {
            let native = layer.wcs.as_ref()?.native_resolution();
            Some(ZoomFactor::from_resolutions(
                self.bbox.ground_resolution(self.width, self.height),
                native,
            ))
        })
    }
}

/// What the data source is asked to load.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub product: String,
    /// Canonical band ids
    pub bands: Vec<String>,
    pub bbox: BoundingBox,
    pub width: u32,
    pub height: u32,
    pub time: Option<String>,
}

/// Bands returned by the data source, already on the request grid.
#[derive(Debug, Clone, Default)]
pub struct FetchedBands {
    pub bands: BandSet,
    /// Pixels the data source has no data for
    pub mask: Option<PixelMask>,
}

/// Loads band data for a request.
#[async_trait]
pub trait BandFetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> OwsResult<FetchedBands>;
}

/// A request that produced an image or grid.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// Real data, styled
    Admitted(StyleOutput),
    /// A uniform fill served instead of real data
    Degraded(RgbaImage),
}

impl RequestOutcome {
    pub fn status(&self) -> ResponseStatus {
        match self {
            RequestOutcome::Admitted(_) => ResponseStatus::Admitted,
            RequestOutcome::Degraded(_) => ResponseStatus::Degraded,
        }
    }
}

/// Metrics label for requests whose layer name didn't resolve.
pub(crate) const UNKNOWN_LAYER: &str = "unknown";

/// Coarse result of a request, for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Admitted,
    Degraded,
    Rejected,
}

impl ResponseStatus {
    pub fn from_result(result: &OwsResult<RequestOutcome>) -> Self {
        match result {
            Ok(outcome) => outcome.status(),
            Err(_) => ResponseStatus::Rejected,
        }
    }
}

impl LayerCatalog {
    /// Run a request through the whole pipeline.
    ///
    /// Errors are request rejections; the protocol layer turns them into
    /// service exceptions.
    pub async fn resolve_request(
        &self,
        request: &OwsRequest,
        fetcher: &dyn BandFetcher,
    ) -> OwsResult<RequestOutcome> {
        let result = self.run_pipeline(request, fetcher).await;
        let status = ResponseStatus::from_result(&result);
        if let Err(e) = &result {
            warn!(
                service = %request.service,
                layer = %request.layer,
                error = %e,
                "Request rejected"
            );
        }
        metrics::record_request(request.service, self.layer_label(&request.layer), status);
        result
    }

    /// Metrics label for a requested layer name.
    ///
    /// Only configured layer names become labels; anything else is counted
    /// under [`UNKNOWN_LAYER`].
    pub(crate) fn layer_label(&self, name: &str) -> &str {
        self.find_layer(name)
            .map(|layer| layer.name.as_str())
            .unwrap_or(UNKNOWN_LAYER)
    }

    async fn run_pipeline(
        &self,
        request: &OwsRequest,
        fetcher: &dyn BandFetcher,
    ) -> OwsResult<RequestOutcome> {
        let settings = self.settings();
        if !settings.is_enabled(request.service) {
            return Err(OwsError::ServiceDisabled(request.service.to_string()));
        }
        check_request_shape(
            settings.max_image_size(request.service),
            request.width,
            request.height,
        )?;

        let layer = self.find_layer(&request.layer)?;

        let estimate = LoadEstimate {
            width: request.width,
            height: request.height,
            zoom_factor: request.effective_zoom_factor(layer),
            dataset_count: request.dataset_estimate,
        };
        let limits = layer.resource_limits.for_service(request.service);
        if let GateDecision::Degrade { fill } = ResourceLimitGate::new(limits).check(&estimate)? {
            warn!(
                layer = %layer.name,
                zoom_factor = ?estimate.zoom_factor.map(|z| z.value()),
                "Serving zoomed-out fill"
            );
            return Ok(RequestOutcome::Degraded(RgbaImage::filled(
                request.width as usize,
                request.height as usize,
                fill,
            )));
        }

        let style = layer.style(request.style.as_deref())?;
        debug!(layer = %layer.name, style = %style.name, "Resolved layer and style");

        let fetch = FetchRequest {
            product: layer.product.clone(),
            bands: layer.bands_to_fetch(style.band_references()),
            bbox: request.bbox,
            width: request.width,
            height: request.height,
            time: request.time.clone(),
        };
        debug!(product = %fetch.product, bands = ?fetch.bands, "Fetching bands");
        let fetched = fetcher.fetch(fetch).await?;

        let mask = match &layer.image_processing.extent_mask {
            Some(extent) => {
                let mut mask = extent.mask(
                    &fetched.bands,
                    request.width as usize,
                    request.height as usize,
                );
                if let Some(source) = &fetched.mask {
                    mask.union(source)?;
                }
                Some(mask)
            }
            None => fetched.mask,
        };

        let started = Instant::now();
        let output = StyleEvaluator::new().evaluate(
            style,
            &fetched.bands,
            mask.as_ref(),
            &layer.bands,
            request.output,
        )?;
        metrics::record_evaluation_time(&style.name, started.elapsed().as_secs_f64() * 1000.0);

        Ok(RequestOutcome::Admitted(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_status() {
        let degraded: OwsResult<RequestOutcome> =
            Ok(RequestOutcome::Degraded(RgbaImage::transparent(1, 1)));
        assert_eq!(ResponseStatus::from_result(&degraded), ResponseStatus::Degraded);

        let rejected: OwsResult<RequestOutcome> = Err(OwsError::LayerNotFound("x".into()));
        assert_eq!(ResponseStatus::from_result(&rejected), ResponseStatus::Rejected);
    }

    #[test]
    fn test_layer_label_bounded_to_configured_layers() {
        let config = ows_common::OwsConfig::from_yaml_str(test_utils::SAMPLE_CONFIG).unwrap();
        let ranges = crate::StaticRangeCache::from_yaml_str(test_utils::SAMPLE_RANGES).unwrap();
        let catalog =
            LayerCatalog::from_config(&config, &crate::FunctionRegistries::default(), &ranges)
                .unwrap();

        assert_eq!(catalog.layer_label(test_utils::layers::S2), test_utils::layers::S2);
        assert_eq!(catalog.layer_label("landsat_8"), UNKNOWN_LAYER);
        assert_eq!(catalog.layer_label("a/../b"), UNKNOWN_LAYER);
    }
}

//! Tests for the request pipeline, with an in-memory band source.

use std::sync::Mutex;

use async_trait::async_trait;

use ows_api::{
    BandFetcher, FetchRequest, FetchedBands, FunctionRegistries, LayerCatalog, OwsRequest,
    RequestOutcome, ResponseStatus, StaticRangeCache,
};
use ows_common::{
    BandGrid, BandSet, BoundingBox, OwsConfig, OwsError, OwsResult, PixelMask, Rgba, ServiceKind,
    ZoomFactor, MAX_WMTS_TILE_SIZE,
};
use renderer::{OutputMode, StyleOutput};
use test_utils::{layers, styles, SAMPLE_CONFIG, SAMPLE_RANGES};

// ============================================================================
// Helpers
// ============================================================================

/// Serves every requested band as a constant grid and records requests.
#[derive(Default)]
struct MockFetcher {
    value: f32,
    /// Declared no-data value, written into the top-left pixel
    nodata: Option<f32>,
    mask: Option<PixelMask>,
    fail: bool,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockFetcher {
    fn constant(value: f32) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> FetchRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl BandFetcher for MockFetcher {
    async fn fetch(&self, request: FetchRequest) -> OwsResult<FetchedBands> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(OwsError::Fetch("connection refused".to_string()));
        }

        let (w, h) = (request.width as usize, request.height as usize);
        let mut bands = BandSet::new();
        for band in &request.bands {
            let mut grid = BandGrid::filled(w, h, self.value);
            if let Some(nodata) = self.nodata {
                grid.data[0] = nodata;
                grid = grid.with_nodata(nodata);
            }
            bands.insert(band.clone(), grid);
        }
        Ok(FetchedBands {
            bands,
            mask: self.mask.clone(),
        })
    }
}

fn catalog_from(config: &OwsConfig) -> LayerCatalog {
    let ranges = StaticRangeCache::from_yaml_str(SAMPLE_RANGES).unwrap();
    LayerCatalog::from_config(config, &FunctionRegistries::default(), &ranges).unwrap()
}

fn sample_catalog() -> LayerCatalog {
    catalog_from(&OwsConfig::from_yaml_str(SAMPLE_CONFIG).unwrap())
}

/// A square request over `size` metres at `pixels` pixels; native
/// resolution of the sample layers is 10 m.
fn request(layer: &str, size: f64, pixels: u32) -> OwsRequest {
    OwsRequest::wms(layer, BoundingBox::new(0.0, 0.0, size, size), pixels, pixels)
}

fn image(outcome: RequestOutcome) -> renderer::RgbaImage {
    match outcome {
        RequestOutcome::Admitted(StyleOutput::Image(image)) => image,
        other => panic!("expected an admitted image, got {:?}", other.status()),
    }
}

// ============================================================================
// Admission
// ============================================================================

#[tokio::test]
async fn test_default_style_admitted() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher::constant(1050.0);

    let outcome = catalog
        .resolve_request(&request(layers::S2CLOUDLESS, 2560.0, 256), &fetcher)
        .await
        .unwrap();
    assert_eq!(outcome.status(), ResponseStatus::Admitted);

    let image = image(outcome);
    assert_eq!((image.width, image.height), (256, 256));
    // (1050 - 100) / 1900 * 255 = 127.5
    assert_eq!(image.pixel(10, 10), Rgba::new(128, 128, 128, 255));

    let fetched = fetcher.last_request();
    assert_eq!(fetched.product, "s2cloudless_mosaic");
    assert_eq!(fetched.bands, vec!["B01", "B02", "B03"]);
}

#[tokio::test]
async fn test_aliases_resolved_for_fetch() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher::constant(0.0);

    catalog
        .resolve_request(
            &request(layers::S2, 2560.0, 256).with_style(styles::SIMPLE_RGB),
            &fetcher,
        )
        .await
        .unwrap();

    assert_eq!(fetcher.last_request().bands, vec!["B02", "B03", "B04"]);
}

#[tokio::test]
async fn test_zoomed_out_request_degraded() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher::constant(1000.0);

    // 102400 m over 256 px is 400 m/px, zoom factor 40
    let outcome = catalog
        .resolve_request(&request(layers::S2CLOUDLESS, 102_400.0, 256), &fetcher)
        .await
        .unwrap();

    match outcome {
        RequestOutcome::Degraded(image) => {
            assert_eq!((image.width, image.height), (256, 256));
            assert_eq!(image.pixel(0, 0), Rgba::new(150, 180, 200, 160));
            assert_eq!(image.pixel(255, 255), Rgba::new(150, 180, 200, 160));
        }
        other => panic!("expected degraded, got {:?}", other.status()),
    }
    assert_eq!(fetcher.calls(), 0, "degraded requests never fetch");
}

#[tokio::test]
async fn test_moderate_zoom_admitted() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher::constant(1000.0);

    // zoom factor 10
    let outcome = catalog
        .resolve_request(&request(layers::S2CLOUDLESS, 25_600.0, 256), &fetcher)
        .await
        .unwrap();
    assert_eq!(outcome.status(), ResponseStatus::Admitted);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_dataset_limit() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher::constant(1000.0);

    let mut req = request(layers::S2CLOUDLESS, 2560.0, 256);
    req.dataset_estimate = 16;
    assert!(catalog.resolve_request(&req, &fetcher).await.is_ok());

    req.dataset_estimate = 17;
    let result = catalog.resolve_request(&req, &fetcher).await;
    assert_eq!(ResponseStatus::from_result(&result), ResponseStatus::Rejected);
    assert!(matches!(
        result,
        Err(OwsError::TooManyDatasets {
            estimated: 17,
            limit: 16
        })
    ));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_request_too_large() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher::constant(1000.0);

    let result = catalog
        .resolve_request(&request(layers::S2, 5130.0, 513), &fetcher)
        .await;
    assert!(matches!(
        result,
        Err(OwsError::RequestTooLarge {
            max_width: 512,
            ..
        })
    ));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_wmts_tile_ceiling_and_shared_wms_limits() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher::constant(1000.0);

    // larger than the WMS maximum, within the WMTS tile ceiling
    let mut req = request(layers::S2, 10_240.0, 1024);
    req.service = ServiceKind::Wmts;
    assert!(catalog.resolve_request(&req, &fetcher).await.is_ok());

    req.dataset_estimate = 17;
    assert!(matches!(
        catalog.resolve_request(&req, &fetcher).await,
        Err(OwsError::TooManyDatasets { .. })
    ));

    req.dataset_estimate = 1;
    req.zoom_factor = Some(ZoomFactor(40.0));
    assert_eq!(
        catalog.resolve_request(&req, &fetcher).await.unwrap().status(),
        ResponseStatus::Degraded
    );
}

#[tokio::test]
async fn test_oversized_wmts_tile_rejected_before_fill() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher::constant(1000.0);

    let mut req = request(layers::S2, 1_000_000.0, MAX_WMTS_TILE_SIZE + 1);
    req.service = ServiceKind::Wmts;
    req.zoom_factor = Some(ZoomFactor(40.0));
    assert!(matches!(
        catalog.resolve_request(&req, &fetcher).await,
        Err(OwsError::RequestTooLarge { max_width, .. }) if max_width == MAX_WMTS_TILE_SIZE
    ));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_zoomed_out_fill_served_before_style_lookup() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher::constant(1000.0);

    let req = request(layers::S2CLOUDLESS, 102_400.0, 256).with_style("no_such_style");
    let outcome = catalog.resolve_request(&req, &fetcher).await.unwrap();
    assert_eq!(outcome.status(), ResponseStatus::Degraded);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_dataset_limit_checked_before_style_lookup() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher::constant(1000.0);

    let mut req = request(layers::S2CLOUDLESS, 2560.0, 256).with_style("no_such_style");
    req.dataset_estimate = 17;
    assert!(matches!(
        catalog.resolve_request(&req, &fetcher).await,
        Err(OwsError::TooManyDatasets { .. })
    ));

    // admitted by the gate, so the bad style name is reported
    req.dataset_estimate = 1;
    assert!(matches!(
        catalog.resolve_request(&req, &fetcher).await,
        Err(OwsError::StyleNotFound { style, .. }) if style == "no_such_style"
    ));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_disabled_service() {
    let mut config = OwsConfig::from_yaml_str(SAMPLE_CONFIG).unwrap();
    config.global.services.wmts = false;
    let catalog = catalog_from(&config);
    let fetcher = MockFetcher::constant(1000.0);

    let mut req = request(layers::S2, 2560.0, 256);
    req.service = ServiceKind::Wmts;
    assert!(matches!(
        catalog.resolve_request(&req, &fetcher).await,
        Err(OwsError::ServiceDisabled(service)) if service == "wmts"
    ));
}

#[tokio::test]
async fn test_unknown_layer_and_style() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher::constant(1000.0);

    assert!(matches!(
        catalog.resolve_request(&request("landsat", 2560.0, 256), &fetcher).await,
        Err(OwsError::LayerNotFound(name)) if name == "landsat"
    ));

    // fmask's style list doesn't include the s2cloudless recentness style
    let req = request(layers::FMASK, 2560.0, 256).with_style(styles::S2CLOUDLESS_RECENTNESS);
    assert!(matches!(
        catalog.resolve_request(&req, &fetcher).await,
        Err(OwsError::StyleNotFound { layer, .. }) if layer == layers::FMASK
    ));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_empty_style_selects_default() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher::constant(1000.0);

    let req = request(layers::S2, 2560.0, 256).with_style("");
    assert!(catalog.resolve_request(&req, &fetcher).await.is_ok());
    assert_eq!(fetcher.last_request().bands, vec!["B02", "B03", "B04"]);
}

// ============================================================================
// Evaluation
// ============================================================================

#[tokio::test]
async fn test_index_style_raw_and_display() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher::constant(18_200.0);

    let mut req =
        request(layers::S2CLOUDLESS, 2560.0, 256).with_style(styles::S2CLOUDLESS_RECENTNESS);
    req.output = OutputMode::Raw;
    let outcome = catalog.resolve_request(&req, &fetcher).await.unwrap();
    assert_eq!(fetcher.last_request().bands, vec!["B04"]);
    match outcome {
        RequestOutcome::Admitted(StyleOutput::Index(grid)) => {
            assert_eq!(grid.value(3, 3), 18_200.0);
        }
        other => panic!("expected a raw grid, got {:?}", other.status()),
    }

    req.output = OutputMode::Display;
    let image = image(catalog.resolve_request(&req, &fetcher).await.unwrap());
    // (18200 - 18048) / 457 * 255 = 84.8
    assert_eq!(image.pixel(3, 3), Rgba::new(85, 85, 85, 255));
}

#[tokio::test]
async fn test_extent_mask_and_source_mask() {
    let catalog = sample_catalog();
    let mut flags = vec![false; 16];
    flags[5] = true;
    let fetcher = MockFetcher {
        value: 1050.0,
        nodata: Some(0.0),
        mask: Some(PixelMask::from_flags(4, 4, flags).unwrap()),
        ..MockFetcher::default()
    };

    let image = image(
        catalog
            .resolve_request(&request(layers::S2, 40.0, 4), &fetcher)
            .await
            .unwrap(),
    );

    // mask_by_val hides the no-data pixel, the source mask hides pixel 5
    assert_eq!(image.pixel(0, 0), Rgba::TRANSPARENT);
    assert_eq!(image.pixel(1, 1), Rgba::TRANSPARENT);
    assert_eq!(image.pixel(2, 2), Rgba::new(128, 128, 128, 255));
}

#[tokio::test]
async fn test_source_mask_of_other_shape_rejected() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher {
        value: 1050.0,
        mask: Some(PixelMask::clear(3, 1)),
        ..MockFetcher::default()
    };

    let result = catalog
        .resolve_request(&request(layers::S2, 20.0, 2), &fetcher)
        .await;
    assert_eq!(ResponseStatus::from_result(&result), ResponseStatus::Rejected);
    assert!(matches!(
        result,
        Err(OwsError::ShapeMismatch { band, .. }) if band == "mask"
    ));
}

#[tokio::test]
async fn test_fetch_error_rejects() {
    let catalog = sample_catalog();
    let fetcher = MockFetcher {
        fail: true,
        ..MockFetcher::default()
    };

    let result = catalog
        .resolve_request(&request(layers::S2, 2560.0, 256), &fetcher)
        .await;
    assert_eq!(ResponseStatus::from_result(&result), ResponseStatus::Rejected);
    assert!(matches!(result, Err(OwsError::Fetch(_))));
}

//! Request admission.
//!
//! Two checks run before any band data is fetched:
//! - the request shape against the service's maximum image size
//! - the layer's resource limits, which may reject the request or degrade it
//!   to a uniform fill image

use tracing::debug;

use ows_common::{OwsError, OwsResult, ResourceLimits, Rgba, ZoomFactor};

/// Reject requests larger than the service's maximum image size.
///
/// `None` means the service has no size limit.
pub fn check_request_shape(
    max_size: Option<(u32, u32)>,
    width: u32,
    height: u32,
) -> OwsResult<()> {
    match max_size {
        Some((max_width, max_height)) if width > max_width || height > max_height => {
            Err(OwsError::RequestTooLarge {
                width,
                height,
                max_width,
                max_height,
            })
        }
        _ => Ok(()),
    }
}

/// What a request is expected to cost, known before fetching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadEstimate {
    pub width: u32,
    pub height: u32,
    /// `None` when the layer has no native resolution to compare against
    pub zoom_factor: Option<ZoomFactor>,
    /// Number of source datasets the request would read
    pub dataset_count: usize,
}

/// Outcome of a successful admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Fetch and evaluate as normal
    Admit,
    /// Serve a uniform image of this colour instead of real data
    Degrade { fill: Rgba },
}

/// Applies one service's resource limits to a request.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimitGate<'a> {
    limits: &'a ResourceLimits,
}

impl<'a> ResourceLimitGate<'a> {
    pub fn new(limits: &'a ResourceLimits) -> Self {
        Self { limits }
    }

    /// Check the dataset limit, then the zoom limit.
    ///
    /// A request over `max_datasets` is rejected even when it is also zoomed
    /// out far enough to be degraded.
    pub fn check(&self, estimate: &LoadEstimate) -> OwsResult<GateDecision> {
        if let Some(limit) = self.limits.max_datasets {
            if estimate.dataset_count > limit {
                return Err(OwsError::TooManyDatasets {
                    estimated: estimate.dataset_count,
                    limit,
                });
            }
        }

        if let (Some(threshold), Some(zoom)) = (self.limits.min_zoom_factor, estimate.zoom_factor) {
            if zoom.value() > threshold {
                debug!(
                    zoom_factor = zoom.value(),
                    threshold, "Request zoomed out past limit, degrading"
                );
                return Ok(GateDecision::Degrade {
                    fill: self.limits.zoomed_out_fill_colour,
                });
            }
        }

        Ok(GateDecision::Admit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ows_common::limits::DEFAULT_ZOOMED_OUT_FILL;

    fn standard_limits() -> ResourceLimits {
        ResourceLimits {
            max_datasets: Some(16),
            min_zoom_factor: Some(35.0),
            zoomed_out_fill_colour: DEFAULT_ZOOMED_OUT_FILL,
        }
    }

    fn estimate(dataset_count: usize, zoom: f64) -> LoadEstimate {
        LoadEstimate {
            width: 256,
            height: 256,
            zoom_factor: Some(ZoomFactor(zoom)),
            dataset_count,
        }
    }

    #[test]
    fn test_dataset_limit_boundary() {
        let limits = standard_limits();
        let gate = ResourceLimitGate::new(&limits);

        assert_eq!(gate.check(&estimate(16, 1.0)).unwrap(), GateDecision::Admit);
        assert!(matches!(
            gate.check(&estimate(17, 1.0)),
            Err(OwsError::TooManyDatasets {
                estimated: 17,
                limit: 16
            })
        ));
    }

    #[test]
    fn test_zoom_limit() {
        let limits = standard_limits();
        let gate = ResourceLimitGate::new(&limits);

        assert_eq!(
            gate.check(&estimate(1, 40.0)).unwrap(),
            GateDecision::Degrade {
                fill: Rgba::new(150, 180, 200, 160)
            }
        );
        assert_eq!(gate.check(&estimate(1, 10.0)).unwrap(), GateDecision::Admit);
        assert_eq!(gate.check(&estimate(1, 35.0)).unwrap(), GateDecision::Admit);
    }

    #[test]
    fn test_dataset_limit_checked_before_zoom() {
        let limits = standard_limits();
        let gate = ResourceLimitGate::new(&limits);
        assert!(matches!(
            gate.check(&estimate(100, 40.0)),
            Err(OwsError::TooManyDatasets { .. })
        ));
    }

    #[test]
    fn test_unknown_zoom_is_admitted() {
        let limits = standard_limits();
        let gate = ResourceLimitGate::new(&limits);
        let mut e = estimate(1, 0.0);
        e.zoom_factor = None;
        assert_eq!(gate.check(&e).unwrap(), GateDecision::Admit);
    }

    #[test]
    fn test_unlimited_policy() {
        let limits = ResourceLimits::unlimited();
        let gate = ResourceLimitGate::new(&limits);
        assert_eq!(
            gate.check(&estimate(10_000, 1000.0)).unwrap(),
            GateDecision::Admit
        );
    }

    #[test]
    fn test_request_shape() {
        assert!(check_request_shape(Some((256, 256)), 256, 256).is_ok());
        assert!(matches!(
            check_request_shape(Some((256, 256)), 257, 10),
            Err(OwsError::RequestTooLarge { width: 257, .. })
        ));
        assert!(check_request_shape(None, 4096, 4096).is_ok());
    }
}

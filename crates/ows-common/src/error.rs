//! Error types for the OWS style engine.

use thiserror::Error;

/// Result type alias using OwsError.
pub type OwsResult<T> = Result<T, OwsError>;

/// Broad classification of an [`OwsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Detected while loading configuration; startup must abort.
    Configuration,
    /// A request was refused before any data was fetched.
    Admission,
    /// A request failed while fetching or compositing bands.
    Evaluation,
}

/// Primary error type for catalog loading and request handling.
#[derive(Debug, Error)]
pub enum OwsError {
    // === Configuration Errors ===
    #[error("Alias '{alias}' is declared for both band '{first}' and band '{second}'")]
    DuplicateAlias {
        alias: String,
        first: String,
        second: String,
    },

    #[error("Style '{0}' is defined more than once")]
    DuplicateStyleName(String),

    #[error("Default style '{0}' is not defined for the layer")]
    NoDefaultStyle(String),

    #[error("Unknown band or alias: {0}")]
    UnknownBand(String),

    #[error("Layer name '{0}' is used more than once")]
    DuplicateLayerName(String),

    #[error("Unknown {kind} fragment: {name}")]
    UnknownFragment { kind: &'static str, name: String },

    #[error("Unknown index function: {0}")]
    UnknownIndexFunction(String),

    #[error("Invalid arguments for index function '{function}': {message}")]
    InvalidIndexKwargs { function: String, message: String },

    #[error("Unknown extent mask function: {0}")]
    UnknownMaskFunction(String),

    #[error("Invalid scale range [{low}, {high}]: low must be below high")]
    InvalidScaleRange { low: f64, high: f64 },

    #[error("Style '{0}' has neither a range nor a scale_range")]
    MissingDisplayRange(String),

    #[error("Display range for product '{product}' is unavailable: {message}")]
    RangeUnavailable { product: String, message: String },

    #[error("Invalid style '{style}': {message}")]
    InvalidStyle { style: String, message: String },

    #[error("Invalid layer '{layer}': {message}")]
    InvalidLayer { layer: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    #[error("Failed to read configuration: {0}")]
    ConfigIo(String),

    // === Request Admission Errors ===
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Style '{style}' not found for layer '{layer}'")]
    StyleNotFound { layer: String, style: String },

    #[error("Too many datasets: {estimated} would be read, limit is {limit}")]
    TooManyDatasets { estimated: usize, limit: usize },

    #[error("Requested image {width}x{height} exceeds the maximum of {max_width}x{max_height}")]
    RequestTooLarge {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    #[error("Service not enabled: {0}")]
    ServiceDisabled(String),

    // === Evaluation Errors ===
    #[error("Band '{band}' is {actual_width}x{actual_height}, expected {width}x{height}")]
    ShapeMismatch {
        band: String,
        width: usize,
        height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("Band '{0}' was not supplied by the data source")]
    MissingBand(String),

    #[error("Index function '{function}' failed: {message}")]
    IndexFunction { function: String, message: String },

    #[error("Failed to fetch band data: {0}")]
    Fetch(String),
}

impl OwsError {
    /// Which stage of the lifecycle this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            OwsError::LayerNotFound(_)
            | OwsError::StyleNotFound { .. }
            | OwsError::TooManyDatasets { .. }
            | OwsError::RequestTooLarge { .. }
            | OwsError::ServiceDisabled(_) => ErrorCategory::Admission,

            OwsError::ShapeMismatch { .. }
            | OwsError::MissingBand(_)
            | OwsError::IndexFunction { .. }
            | OwsError::Fetch(_) => ErrorCategory::Evaluation,

            _ => ErrorCategory::Configuration,
        }
    }

    pub fn is_config_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    /// Get the OGC exception code for this error.
    pub fn wms_exception_code(&self) -> &'static str {
        match self {
            OwsError::LayerNotFound(_) => "LayerNotDefined",
            OwsError::StyleNotFound { .. } => "StyleNotDefined",
            OwsError::RequestTooLarge { .. } => "InvalidParameterValue",
            OwsError::ServiceDisabled(_) => "OperationNotSupported",
            _ => "NoApplicableCode",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            OwsError::RequestTooLarge { .. } | OwsError::TooManyDatasets { .. } => 400,

            OwsError::LayerNotFound(_)
            | OwsError::StyleNotFound { .. }
            | OwsError::ServiceDisabled(_) => 404,

            OwsError::Fetch(_) => 502,

            _ => 500,
        }
    }
}

impl From<std::io::Error> for OwsError {
    fn from(err: std::io::Error) -> Self {
        OwsError::ConfigIo(err.to_string())
    }
}

impl From<serde_yaml::Error> for OwsError {
    fn from(err: serde_yaml::Error) -> Self {
        OwsError::ConfigParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert!(OwsError::DuplicateLayerName("a".into()).is_config_error());
        assert_eq!(
            OwsError::TooManyDatasets { estimated: 17, limit: 16 }.category(),
            ErrorCategory::Admission
        );
        assert_eq!(
            OwsError::Fetch("timeout".into()).category(),
            ErrorCategory::Evaluation
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(OwsError::LayerNotFound("x".into()).http_status_code(), 404);
        assert_eq!(
            OwsError::LayerNotFound("x".into()).wms_exception_code(),
            "LayerNotDefined"
        );
        assert_eq!(
            OwsError::TooManyDatasets { estimated: 2, limit: 1 }.http_status_code(),
            400
        );
    }
}

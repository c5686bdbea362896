//! OWS style service library.
//!
//! Loads the layer catalog from configuration and runs the request
//! pipeline: admission, band fetching, masking and style evaluation.

pub mod catalog;
pub mod gate;
pub mod metrics;
pub mod pipeline;
pub mod range;

pub use catalog::{FunctionRegistries, LayerCatalog, ServiceSettings};
pub use gate::{GateDecision, LoadEstimate, ResourceLimitGate};
pub use pipeline::{
    BandFetcher, FetchRequest, FetchedBands, OwsRequest, RequestOutcome, ResponseStatus,
};
pub use range::{RangeProvider, StaticRangeCache};

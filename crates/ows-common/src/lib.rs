//! Common types shared by the OWS style engine crates.
//!
//! Everything here is built once from static configuration and is read-only
//! afterwards, so catalog entities can be shared across request tasks
//! without locking.

pub mod bands;
pub mod bbox;
pub mod config;
pub mod error;
pub mod function;
pub mod grid;
pub mod layer;
pub mod limits;
pub mod style;

pub use bands::BandAliasResolver;
pub use bbox::BoundingBox;
pub use config::{OwsConfig, MAX_WMTS_TILE_SIZE};
pub use error::{ErrorCategory, OwsError, OwsResult};
pub use function::{ExtentMaskFunction, IndexArgs, IndexFunction, KwargValue, Kwargs};
pub use grid::{BandGrid, BandSet, PixelMask};
pub use layer::{Folder, ImageProcessing, Layer, LayerNode, WcsLayerConfig};
pub use limits::{LayerResourceLimits, ResourceLimits, ServiceKind, ZoomFactor};
pub use style::{Channel, ChannelTerms, IndexStyle, LinearStyle, Rgba, ScaleRange, Style, StyleKind, StyleRegistry};

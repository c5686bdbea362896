//! Band compositing for raster map styles.
//!
//! Implements the two style kinds:
//! - Linear combination (weighted band sums per RGBA channel)
//! - Index functions (one scalar per pixel, raw or as grey levels)
//!
//! plus the extent mask functions applied to fetched bands.

pub mod composite;
pub mod evaluate;
pub mod index;
pub mod mask;

pub use composite::RgbaImage;
pub use evaluate::{IndexGrid, OutputMode, StyleEvaluator, StyleOutput};
pub use index::IndexFunctionRegistry;
pub use mask::MaskRegistry;

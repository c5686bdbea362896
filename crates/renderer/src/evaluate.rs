//! Style evaluation: turns fetched bands into a renderable output.

use tracing::debug;

use ows_common::{
    BandAliasResolver, BandGrid, BandSet, IndexArgs, IndexStyle, OwsError, OwsResult, PixelMask,
    Style, StyleKind,
};

use crate::composite::{check_mask_shape, composite_linear, is_invalid, RgbaImage};

/// How an index style's output is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// The raw scalar grid, e.g. for a WCS coverage
    Raw,
    /// An 8-bit grey image through the style's display range
    #[default]
    Display,
}

/// A single-band scalar grid; NaN marks pixels without a value.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexGrid {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f64>,
}

impl IndexGrid {
    pub fn value(&self, x: usize, y: usize) -> f64 {
        self.values[y * self.width + x]
    }
}

/// Result of evaluating a style.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleOutput {
    Image(RgbaImage),
    Index(IndexGrid),
}

impl StyleOutput {
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            StyleOutput::Image(image) => (image.width, image.height),
            StyleOutput::Index(grid) => (grid.width, grid.height),
        }
    }

    pub fn as_image(&self) -> Option<&RgbaImage> {
        match self {
            StyleOutput::Image(image) => Some(image),
            StyleOutput::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<&IndexGrid> {
        match self {
            StyleOutput::Index(grid) => Some(grid),
            StyleOutput::Image(_) => None,
        }
    }
}

/// Evaluates resolved styles against a request's bands.
///
/// Stateless; one evaluator can be shared by every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleEvaluator;

impl StyleEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `style` over `bands`.
    ///
    /// Linear-combination styles always produce an image; index styles
    /// produce a raw grid or a grey image depending on `mode`.
    pub fn evaluate(
        &self,
        style: &Style,
        bands: &BandSet,
        mask: Option<&PixelMask>,
        resolver: &BandAliasResolver,
        mode: OutputMode,
    ) -> OwsResult<StyleOutput> {
        debug!(
            style = %style.name,
            bands = bands.len(),
            masked = mask.map(PixelMask::masked_count).unwrap_or(0),
            "Evaluating style"
        );

        match &style.kind {
            StyleKind::LinearCombination(linear) => {
                composite_linear(linear, bands, mask, resolver).map(StyleOutput::Image)
            }
            StyleKind::IndexFunction(index) => {
                let grid = self.evaluate_index(index, bands, mask, resolver)?;
                match mode {
                    OutputMode::Raw => Ok(StyleOutput::Index(grid)),
                    OutputMode::Display => {
                        let range = index
                            .display_range()
                            .ok_or_else(|| OwsError::MissingDisplayRange(style.name.clone()))?;
                        Ok(StyleOutput::Image(render_grey(&grid, |v| range.quantize(v))))
                    }
                }
            }
        }
    }

    /// Run an index function; masked and undefined pixels are NaN.
    pub fn evaluate_index(
        &self,
        index: &IndexStyle,
        bands: &BandSet,
        mask: Option<&PixelMask>,
        resolver: &BandAliasResolver,
    ) -> OwsResult<IndexGrid> {
        let mut needed = resolver.resolve_all(index.needed_bands.iter().map(String::as_str))?;
        for kwarg in index.function.band_kwargs() {
            if let Some(band) = index.kwargs.get(*kwarg).and_then(|v| v.as_str()) {
                let canonical = resolver.resolve(band)?;
                if !needed.iter().any(|n| n == canonical) {
                    needed.push(canonical.to_string());
                }
            }
        }

        let (width, height) = bands.shape_of(needed.iter().map(String::as_str))?;
        check_mask_shape(mask, width, height)?;

        let args = IndexArgs {
            function: &index.function_key,
            kwargs: &index.kwargs,
            bands,
            resolver,
            width,
            height,
        };
        let mut values = index.function.compute(&args)?;
        if values.len() != width * height {
            return Err(OwsError::IndexFunction {
                function: index.function_key.clone(),
                message: format!(
                    "produced {} values for a {}x{} grid",
                    values.len(),
                    width,
                    height
                ),
            });
        }

        let grids: Vec<&BandGrid> = needed
            .iter()
            .map(|b| bands.get(b))
            .collect::<OwsResult<_>>()?;
        for (idx, value) in values.iter_mut().enumerate() {
            if is_invalid(idx, mask, &grids) {
                *value = f64::NAN;
            }
        }

        Ok(IndexGrid {
            width,
            height,
            values,
        })
    }
}

/// Map a scalar grid onto opaque grey pixels; NaN becomes transparent.
fn render_grey(grid: &IndexGrid, level: impl Fn(f64) -> u8) -> RgbaImage {
    let mut image = RgbaImage::transparent(grid.width, grid.height);
    for (value, pixel) in grid.values.iter().zip(image.pixels.chunks_exact_mut(4)) {
        if value.is_nan() {
            continue;
        }
        let g = level(*value);
        pixel.copy_from_slice(&[g, g, g, 255]);
    }
    image
}

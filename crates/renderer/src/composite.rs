//! Linear-combination compositing of bands into RGBA images.

use rayon::prelude::*;

use ows_common::{
    BandAliasResolver, BandGrid, BandSet, Channel, LinearStyle, OwsError, OwsResult, PixelMask,
    Rgba,
};

/// Images at least this many pixels are composited on the rayon pool.
const PARALLEL_THRESHOLD: usize = 4096;

/// An 8-bit RGBA image, 4 bytes per pixel, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl RgbaImage {
    /// A fully transparent image.
    pub fn transparent(width: usize, height: usize) -> Self {
        Self::filled(width, height, Rgba::TRANSPARENT)
    }

    /// A uniform image of one colour.
    pub fn filled(width: usize, height: usize, colour: Rgba) -> Self {
        Self {
            width,
            height,
            pixels: colour.to_array().repeat(width * height),
        }
    }

    /// Colour of the pixel at (x, y).
    pub fn pixel(&self, x: usize, y: usize) -> Rgba {
        let i = (y * self.width + x) * 4;
        Rgba::new(
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        )
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// A channel with its band ids already resolved to grids.
struct ResolvedChannel<'a> {
    offset: usize,
    terms: Vec<(&'a BandGrid, f64)>,
}

/// Composite a linear-combination style.
///
/// Each channel is the weighted sum of its bands in f64, mapped through the
/// style's scale range. Undeclared colour channels are 0, an undeclared
/// alpha channel is opaque. Pixels masked in `mask`, holding no-data in any
/// contributing band or with a non-finite channel sum come out fully
/// transparent.
pub fn composite_linear(
    style: &LinearStyle,
    bands: &BandSet,
    mask: Option<&PixelMask>,
    resolver: &BandAliasResolver,
) -> OwsResult<RgbaImage> {
    let mut contributing: Vec<&str> = Vec::new();
    let mut channels: Vec<(usize, Vec<(&str, f64)>)> = Vec::new();
    for channel in Channel::ALL {
        let Some(terms) = style.channel(channel) else {
            continue;
        };
        let mut resolved = Vec::new();
        for (band, multiplier) in terms.iter() {
            let canonical = resolver.resolve(band)?;
            if !contributing.contains(&canonical) {
                contributing.push(canonical);
            }
            resolved.push((canonical, multiplier));
        }
        channels.push((channel.offset(), resolved));
    }

    let (width, height) = if contributing.is_empty() {
        bands.shape_of(bands.band_names())?
    } else {
        bands.shape_of(contributing.iter().copied())?
    };
    check_mask_shape(mask, width, height)?;

    let grids: Vec<&BandGrid> = contributing
        .iter()
        .map(|b| bands.get(b))
        .collect::<OwsResult<_>>()?;
    let channels: Vec<ResolvedChannel> = channels
        .into_iter()
        .map(|(offset, terms)| {
            let terms = terms
                .into_iter()
                .map(|(band, m)| bands.get(band).map(|grid| (grid, m)))
                .collect::<OwsResult<_>>()?;
            Ok::<_, OwsError>(ResolvedChannel { offset, terms })
        })
        .collect::<OwsResult<_>>()?;

    let mut image = RgbaImage::transparent(width, height);
    if width == 0 || height == 0 {
        return Ok(image);
    }

    let scale = style.scale_range;
    let composite_row = |(y, row): (usize, &mut [u8])| {
        'pixels: for x in 0..width {
            let idx = y * width + x;
            if is_invalid(idx, mask, &grids) {
                continue;
            }
            let mut pixel = [0, 0, 0, 255];
            for channel in &channels {
                let raw: f64 = channel.terms.iter().map(|(g, m)| m * g.value(idx)).sum();
                // NaN or infinite input without a declared no-data value
                if !raw.is_finite() {
                    continue 'pixels;
                }
                pixel[channel.offset] = scale.quantize(raw);
            }
            row[x * 4..x * 4 + 4].copy_from_slice(&pixel);
        }
    };

    if width * height >= PARALLEL_THRESHOLD {
        image
            .pixels
            .par_chunks_mut(width * 4)
            .enumerate()
            .for_each(composite_row);
    } else {
        image
            .pixels
            .chunks_mut(width * 4)
            .enumerate()
            .for_each(composite_row);
    }

    Ok(image)
}

/// Whether a pixel is masked by the fetch mask or by no-data in any of `grids`.
#[inline]
pub(crate) fn is_invalid(idx: usize, mask: Option<&PixelMask>, grids: &[&BandGrid]) -> bool {
    mask.is_some_and(|m| m.is_masked(idx)) || grids.iter().any(|g| g.is_nodata(idx))
}

pub(crate) fn check_mask_shape(
    mask: Option<&PixelMask>,
    width: usize,
    height: usize,
) -> OwsResult<()> {
    match mask {
        Some(m) if m.width != width || m.height != height => Err(OwsError::ShapeMismatch {
            band: "mask".to_string(),
            width,
            height,
            actual_width: m.width,
            actual_height: m.height,
        }),
        _ => Ok(()),
    }
}

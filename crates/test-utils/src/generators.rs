//! Band data generators for creating synthetic reflectance-like grids.
//!
//! These generators create predictable, verifiable patterns that can be
//! used across the test suite. All grids are row-major.

/// Creates a horizontal gradient from `min` (left column) to `max` (right column).
pub fn create_gradient_grid(width: usize, height: usize, min: f32, max: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    let span = (width.max(2) - 1) as f32;
    for _row in 0..height {
        for col in 0..width {
            data.push(min + (max - min) * col as f32 / span);
        }
    }
    data
}

/// Creates surface-reflectance-like values (0..=10000) with a deterministic
/// pseudo-random texture.
pub fn create_reflectance_grid(width: usize, height: usize, seed: u32) -> Vec<u16> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let hash = simple_hash(col as u32, row as u32, seed);
            data.push((hash % 10_001) as u16);
        }
    }
    data
}

/// Creates a checkerboard of `value` and `nodata`, starting with no-data
/// in the top-left pixel.
pub fn create_nodata_checkerboard(width: usize, height: usize, value: f32, nodata: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push(if (row + col) % 2 == 0 { nodata } else { value });
        }
    }
    data
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

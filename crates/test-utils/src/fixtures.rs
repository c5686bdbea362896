//! Common test fixtures for catalog and pipeline tests.

use std::path::PathBuf;

/// A complete service configuration with folders, shared fragments,
/// linear-combination and index styles.
pub const SAMPLE_CONFIG: &str = include_str!("../fixtures/ows_cfg.yaml");

/// Date ranges for the products referenced by [`SAMPLE_CONFIG`].
pub const SAMPLE_RANGES: &str = include_str!("../fixtures/ranges.yaml");

/// Path of the sample configuration inside this crate.
pub fn sample_config_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("ows_cfg.yaml")
}

/// Path of the sample range cache inside this crate.
pub fn sample_ranges_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("ranges.yaml")
}

/// Write `contents` to a file in a fresh temporary directory.
///
/// The directory is removed when the returned guard is dropped.
pub fn write_temp_file(name: &str, contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write temp file");
    (dir, path)
}

/// Layer names defined in [`SAMPLE_CONFIG`].
pub mod layers {
    pub const S2CLOUDLESS: &str = "s2cloudless";
    pub const FMASK: &str = "fmask";
    pub const S2: &str = "s2";
}

/// Style names defined in [`SAMPLE_CONFIG`].
pub mod styles {
    pub const CLOUDLESS_MOSAIC: &str = "cloudless_mosaic_style";
    pub const S2CLOUDLESS_RECENTNESS: &str = "s2cloudless_recentness";
    pub const FMASK_RECENTNESS: &str = "fmask_recentness";
    pub const S2: &str = "s2_style";
    pub const SIMPLE_RGB: &str = "simple_rgb";
}

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_rollup::{config::Settings, data::Dataset, io_utils};
use encoding_rs::UTF_8;
use tempfile::{TempDir, tempdir};

/// Classification threshold the snapshot fixtures are designed around: it
/// makes `Desk`, `Region` and `Book` categories and leaves `Amount` and `Qty`
/// purely numeric.
pub const FIXTURE_CATEGORY_THRESHOLD: usize = 4;

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

pub fn load_fixture(name: &str) -> Dataset {
    io_utils::read_dataset(&fixture_path(name), None, UTF_8).expect("load fixture")
}

pub fn fixture_settings() -> Settings {
    Settings {
        category_threshold: FIXTURE_CATEGORY_THRESHOLD,
        ..Settings::default()
    }
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

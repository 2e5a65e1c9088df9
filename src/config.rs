use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{compare::DEFAULT_COMPARISON_THRESHOLD, schema::DEFAULT_CATEGORY_THRESHOLD};

pub const MIN_COMPARISON_THRESHOLD: f64 = 0.001;
pub const MAX_COMPARISON_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Fields with fewer distinct values than this are categorical.
    pub category_threshold: usize,
    /// Relative difference a common key must exceed to be reported.
    pub comparison_threshold: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            category_threshold: DEFAULT_CATEGORY_THRESHOLD,
            comparison_threshold: DEFAULT_COMPARISON_THRESHOLD,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening settings file {path:?}"))?;
        let settings: Settings = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing settings YAML {path:?}"))?;
        settings.ensure_valid()?;
        Ok(settings)
    }

    /// Applies command-line overrides on top of file or default values.
    pub fn with_overrides(
        mut self,
        category_threshold: Option<usize>,
        comparison_threshold: Option<f64>,
    ) -> Result<Self> {
        if let Some(value) = category_threshold {
            self.category_threshold = value;
        }
        if let Some(value) = comparison_threshold {
            self.comparison_threshold = value;
        }
        self.ensure_valid()?;
        Ok(self)
    }

    pub fn ensure_valid(&self) -> Result<()> {
        ensure!(
            self.category_threshold >= 1,
            "Category threshold must be at least 1"
        );
        ensure!(
            self.comparison_threshold.is_finite()
                && (MIN_COMPARISON_THRESHOLD..=MAX_COMPARISON_THRESHOLD)
                    .contains(&self.comparison_threshold),
            "Comparison threshold {} must lie within [{}, {}]",
            self.comparison_threshold,
            MIN_COMPARISON_THRESHOLD,
            MAX_COMPARISON_THRESHOLD
        );
        Ok(())
    }
}

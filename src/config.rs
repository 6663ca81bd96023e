//! Generator configuration.
//!
//! Loaded from an optional JSON file; every field has a default matching the
//! reference setup (template and course list in the working directory,
//! invoices written to `Resultados_Facturas`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::FailurePolicy;
use crate::error::Result;
use crate::layout::TemplateLayout;
use crate::roster::COURSE_LIST_FILE;

pub const DEFAULT_TEMPLATE: &str = "plantilla.xlsx";
pub const DEFAULT_OUTPUT_DIR: &str = "Resultados_Facturas";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Template workbook, reloaded for every invoice.
    pub template: PathBuf,
    /// Where invoices are written. Created when absent.
    pub output_dir: PathBuf,
    pub course_list: PathBuf,
    pub failure_policy: FailurePolicy,
    pub layout: TemplateLayout,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from(DEFAULT_TEMPLATE),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            course_list: PathBuf::from(COURSE_LIST_FILE),
            failure_policy: FailurePolicy::default(),
            layout: TemplateLayout::default(),
        }
    }
}

impl GeneratorConfig {
    /// Read a JSON configuration file. Missing fields keep their defaults.
    ///
    /// # Errors
    /// I/O or JSON errors, or an inconsistent layout.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)?;
        config.layout.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// [`GeneratorConfig::load`] when a path is given, defaults otherwise.
    ///
    /// # Errors
    /// See [`GeneratorConfig::load`].
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}

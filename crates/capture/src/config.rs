//! Capture run configuration

use std::path::PathBuf;

use contracts::CaptureBlueprint;

use crate::error::{CaptureError, Result};

/// Everything a `CaptureController` needs for one run
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Validated blueprint
    pub blueprint: CaptureBlueprint,

    /// Output root; `velodyne/` and `images/` are created beneath it
    pub output_root: PathBuf,

    /// Print operator narration to stdout
    pub narrate: bool,
}

impl CaptureConfig {
    /// Build from a blueprint whose `[capture].output_dir` is set
    pub fn from_blueprint(blueprint: CaptureBlueprint) -> Result<Self> {
        let output_root = blueprint
            .capture
            .output_dir
            .clone()
            .ok_or(CaptureError::MissingOutputDir)?;

        Ok(Self {
            blueprint,
            output_root,
            narrate: true,
        })
    }

    /// Toggle stdout narration
    pub fn with_narration(mut self, narrate: bool) -> Self {
        self.narrate = narrate;
        self
    }

    /// Frame budget
    pub fn frames(&self) -> u64 {
        self.blueprint.capture.frames
    }
}

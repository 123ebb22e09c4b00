//! Python helper script invocations.
//!
//! The scripts live in one directory and are invoked positionally. Each
//! builder returns a [`ToolCommand`] whose expected output is the file the
//! script must write.

use std::path::{Path, PathBuf};

use mflow_models::{CompressionParams, ConversionParams, DocumentParams};
use serde_json::Value;

use crate::error::{MediaError, MediaResult};
use crate::invoker::ToolCommand;

pub const COMPRESS_SCRIPT: &str = "compress_media.py";
pub const CONVERT_SCRIPT: &str = "convert_media.py";
pub const BACKGROUND_SCRIPT: &str = "remove_background.py";
pub const DOCUMENT_SCRIPT: &str = "document_converter.py";

/// Interpreter and script location.
///
/// The scripts directory is made absolute on construction, so script paths
/// stay valid for commands that run from another working directory.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    python: PathBuf,
    dir: PathBuf,
}

impl ScriptRunner {
    pub fn new(python: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            python: python.into(),
            dir: std::path::absolute(&dir).unwrap_or(dir),
        }
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn script_path(&self, script: &str) -> PathBuf {
        self.dir.join(script)
    }

    /// Scripts that are not present in the scripts directory.
    pub fn missing_scripts(&self) -> Vec<PathBuf> {
        [COMPRESS_SCRIPT, CONVERT_SCRIPT, BACKGROUND_SCRIPT, DOCUMENT_SCRIPT]
            .iter()
            .map(|s| self.script_path(s))
            .filter(|p| !p.is_file())
            .collect()
    }

    fn script(&self, script: &str) -> ToolCommand {
        ToolCommand::new(&self.python).arg(path_arg(&self.script_path(script)))
    }

    /// `compress_media.py <in> <out> <targetSize>`
    pub fn compress(&self, input: &Path, output: &Path, params: &CompressionParams) -> ToolCommand {
        self.script(COMPRESS_SCRIPT)
            .arg(path_arg(input))
            .arg(path_arg(output))
            .arg(params.target_size.clone())
            .expect_output(output)
    }

    /// `convert_media.py <in> <out> <FORMAT>`, run from the scripts directory.
    pub fn convert(&self, input: &Path, output: &Path, params: &ConversionParams) -> ToolCommand {
        self.script(CONVERT_SCRIPT)
            .arg(path_arg(input))
            .arg(path_arg(output))
            .arg(params.normalized_format())
            .working_dir(&self.dir)
            .expect_output(output)
    }

    /// `remove_background.py <in> <out>`
    pub fn remove_background(&self, input: &Path, output: &Path) -> ToolCommand {
        self.script(BACKGROUND_SCRIPT)
            .arg(path_arg(input))
            .arg(path_arg(output))
            .expect_output(output)
    }

    /// `document_converter.py <OP> <in> <out> [options]`, or
    /// `document_converter.py <OP> <out> <in...> [options]` for multi-input operations.
    pub fn document(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        params: &DocumentParams,
    ) -> MediaResult<ToolCommand> {
        let operation = params.operation;
        let first = inputs.first().ok_or_else(|| {
            MediaError::invalid_params(format!("{} needs at least one input", operation.as_str()))
        })?;

        let mut cmd = self.script(DOCUMENT_SCRIPT).arg(operation.as_str());
        if operation.takes_many_inputs() {
            cmd = cmd
                .arg(path_arg(output))
                .args(inputs.iter().map(|p| path_arg(p)));
        } else {
            cmd = cmd.arg(path_arg(first)).arg(path_arg(output));
        }

        if !params.options.is_empty() {
            let options = serde_json::to_string(&Value::Object(params.options.clone()))
                .map_err(|e| MediaError::invalid_params(format!("options: {}", e)))?;
            cmd = cmd.arg(options);
        }

        Ok(cmd.expect_output(output))
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

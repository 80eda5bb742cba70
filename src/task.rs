//! Detection tasks and the descriptors that tell the bridge how to run them.
//!
//! The three tasks differ only in how the image path is handed to the
//! program and where the answer comes back from, so each is described by a
//! [`TaskDescriptor`] rather than its own code path.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::BridgeConfig;
use crate::error::{DetectionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Annotated image written to `processed/`.
    Objects,
    /// JSON verdict printed on stdout.
    SkinDisease,
    /// JSON verdict written to the results file.
    Generic,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Objects => "objects",
            TaskKind::SkinDisease => "skin_disease",
            TaskKind::Generic => "generic",
        }
    }
}

/// How the image path is laid out on the program's command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgLayout {
    /// `<image> [<results file>]`
    Positional,
    /// `--input <image>`
    Input,
    /// `--input <image> --output <artifact>`
    InputOutput,
}

impl ArgLayout {
    /// Build the argument vector. `output` is the artifact for `InputOutput`
    /// and the optional request-scoped results file for `Positional`.
    pub fn args(self, image: &Path, output: Option<&Path>) -> Vec<OsString> {
        let mut args = Vec::with_capacity(4);
        match self {
            ArgLayout::Positional => {
                args.push(image.as_os_str().to_owned());
                if let Some(output) = output {
                    args.push(output.as_os_str().to_owned());
                }
            }
            ArgLayout::Input => {
                args.push("--input".into());
                args.push(image.as_os_str().to_owned());
            }
            ArgLayout::InputOutput => {
                args.push("--input".into());
                args.push(image.as_os_str().to_owned());
                if let Some(output) = output {
                    args.push("--output".into());
                    args.push(output.as_os_str().to_owned());
                }
            }
        }
        args
    }
}

/// Where a task's answer is retrieved from, before it is bound to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// A JSON file in the results directory.
    ResultsFile,
    /// An artifact path computed from the input name; the path is the answer.
    Artifact,
    /// JSON on the program's standard output.
    Stdout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub kind: TaskKind,
    pub script: PathBuf,
    pub layout: ArgLayout,
    pub result: ResultKind,
}

impl TaskDescriptor {
    pub fn for_task(kind: TaskKind, config: &BridgeConfig) -> Self {
        let scripts = &config.scripts;
        let (script, layout, result) = match kind {
            TaskKind::Objects => (&scripts.objects, ArgLayout::InputOutput, ResultKind::Artifact),
            TaskKind::SkinDisease => (&scripts.skin_disease, ArgLayout::Input, ResultKind::Stdout),
            TaskKind::Generic => (&scripts.generic, ArgLayout::Positional, ResultKind::ResultsFile),
        };
        Self {
            kind,
            script: script.clone(),
            layout,
            result,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRequest {
    pub image_path: PathBuf,
    pub task: TaskKind,
}

impl DetectionRequest {
    pub fn new(task: TaskKind, image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            task,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
    Json(serde_json::Value),
    Artifact(PathBuf),
}

impl DetectionResult {
    /// JSON form for relaying to a client. Artifacts become `{"processed_image": path}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            DetectionResult::Json(value) => value.clone(),
            DetectionResult::Artifact(path) => {
                serde_json::json!({ "processed_image": path.to_string_lossy() })
            }
        }
    }
}

/// Reject paths that name no file and make sure a relative path can never
/// be read as an option by the detection program.
pub fn normalize_image_path(path: &Path) -> Result<PathBuf> {
    let invalid = |detail: &str| DetectionError::InvalidInput {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    };

    if path.as_os_str().is_empty() {
        return Err(invalid("path is empty"));
    }
    if path.file_name().is_none() {
        return Err(invalid("path does not name a file"));
    }

    match path.components().next() {
        Some(Component::Normal(first)) if first.to_string_lossy().starts_with('-') => {
            Ok(Path::new(".").join(path))
        }
        _ => Ok(path.to_path_buf()),
    }
}

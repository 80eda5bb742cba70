//! The detection bridge: run one external detector per request and turn
//! whatever it leaves behind into a result or a classified failure.
//!
//! Every call is `plan -> spawn -> await exit -> collect`. Planning binds a
//! [`TaskDescriptor`] to a request (arguments, result location); collecting
//! reads the answer from wherever the descriptor said it would be.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{Instrument, Span, debug, info_span, warn};

use crate::cancel::CancelSignal;
use crate::config::{BridgeConfig, GenericResults};
use crate::consts::{MAX_STDERR_BYTES, request_id};
use crate::error::{DetectionError, Result};
use crate::layout::{Layout, ScopedResults};
use crate::runner::process::{ProcessRunner, truncate_output};
use crate::runner::{Invocation, RunOutput, Runner};
use crate::task::{
    DetectionRequest, DetectionResult, ResultKind, TaskDescriptor, TaskKind, normalize_image_path,
};

/// Where one particular call will find its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultSource {
    /// The shared results file. Other calls may overwrite it.
    FixedFile(PathBuf),
    /// A results file owned by this call; removed once the call ends.
    ScopedFile(PathBuf),
    /// The artifact path handed to the program as `--output`.
    Artifact(PathBuf),
    Stdout,
}

/// A request bound to a concrete command line and result location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub request_id: String,
    pub invocation: Invocation,
    pub source: ResultSource,
}

#[derive(Clone)]
pub struct DetectionBridge {
    layout: Layout,
    interpreter: Option<String>,
    generic_results: GenericResults,
    timeout: Option<Duration>,
    objects: TaskDescriptor,
    skin_disease: TaskDescriptor,
    generic: TaskDescriptor,
    runner: Arc<dyn Runner>,
}

impl DetectionBridge {
    /// A bridge that runs real processes. Creates the output directories.
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        Self::with_runner(config, Arc::new(ProcessRunner))
    }

    pub fn with_runner(config: &BridgeConfig, runner: Arc<dyn Runner>) -> Result<Self> {
        let layout = Layout::from_config(config);
        layout.bootstrap()?;

        Ok(Self {
            layout,
            interpreter: config.interpreter().map(str::to_string),
            generic_results: config.generic_results,
            timeout: config.timeout(),
            objects: TaskDescriptor::for_task(TaskKind::Objects, config),
            skin_disease: TaskDescriptor::for_task(TaskKind::SkinDisease, config),
            generic: TaskDescriptor::for_task(TaskKind::Generic, config),
            runner,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    fn descriptor(&self, kind: TaskKind) -> &TaskDescriptor {
        match kind {
            TaskKind::Objects => &self.objects,
            TaskKind::SkinDisease => &self.skin_disease,
            TaskKind::Generic => &self.generic,
        }
    }

    /// `<processed_dir>/processed_<basename>` for the request's image.
    fn artifact_path(&self, request: &DetectionRequest) -> Result<PathBuf> {
        let image = normalize_image_path(&request.image_path)?;
        self.layout
            .processed_path_for(&image)
            .ok_or_else(|| DetectionError::InvalidInput {
                path: request.image_path.clone(),
                detail: "path does not name a file".to_string(),
            })
    }

    /// Bind a request to its command line and result location without running anything.
    pub fn plan(&self, request: &DetectionRequest) -> Result<Plan> {
        let image = normalize_image_path(&request.image_path)?;
        let descriptor = self.descriptor(request.task);
        let id = request_id();

        let source = match descriptor.result {
            ResultKind::ResultsFile => match self.generic_results {
                GenericResults::Shared => {
                    ResultSource::FixedFile(self.layout.shared_results_file())
                }
                GenericResults::PerRequest => {
                    ResultSource::ScopedFile(self.layout.scoped_results_file(&id))
                }
            },
            ResultKind::Artifact => ResultSource::Artifact(self.artifact_path(request)?),
            ResultKind::Stdout => ResultSource::Stdout,
        };

        // Only paths the program must write to go on its command line; the
        // shared results file is implicit.
        let output = match &source {
            ResultSource::ScopedFile(path) | ResultSource::Artifact(path) => Some(path.as_path()),
            ResultSource::FixedFile(_) | ResultSource::Stdout => None,
        };
        let args = descriptor.layout.args(&image, output);
        let invocation =
            Invocation::new(self.interpreter.as_deref(), descriptor.script.clone(), args);

        Ok(Plan {
            request_id: id,
            invocation,
            source,
        })
    }

    pub async fn detect(&self, request: &DetectionRequest) -> Result<DetectionResult> {
        self.detect_with_cancel(request, CancelSignal::never()).await
    }

    /// Like [`detect`](Self::detect), but gives up as soon as `cancel` fires.
    /// The detector process is killed in that case.
    pub async fn detect_with_cancel(
        &self,
        request: &DetectionRequest,
        cancel: CancelSignal,
    ) -> Result<DetectionResult> {
        let plan = self.plan(request)?;
        let _scoped = plan.scoped_results();

        let output = self
            .run(&plan, cancel)
            .instrument(detect_span(&plan, request))
            .await?;
        match &plan.source {
            ResultSource::Artifact(path) => Ok(DetectionResult::Artifact(path.clone())),
            source => collect_json(source, &output).await.map(DetectionResult::Json),
        }
    }

    /// Run an external detector that writes JSON into the results file, and return that JSON.
    pub async fn detect_generic(&self, image_path: impl AsRef<Path>) -> Result<Value> {
        self.detect_json(&DetectionRequest::new(TaskKind::Generic, image_path.as_ref()))
            .await
    }

    /// Run the object detector and return where it was told to write the annotated image.
    /// Whether the file actually exists is up to the detector.
    pub async fn detect_objects(&self, image_path: impl AsRef<Path>) -> Result<PathBuf> {
        let request = DetectionRequest::new(TaskKind::Objects, image_path.as_ref());
        let plan = self.plan(&request)?;
        let artifact = self.artifact_path(&request)?;

        self.run(&plan, CancelSignal::never())
            .instrument(detect_span(&plan, &request))
            .await?;
        Ok(artifact)
    }

    /// Run the skin disease detector and parse its standard output as JSON.
    pub async fn detect_skin_disease(&self, image_path: impl AsRef<Path>) -> Result<Value> {
        self.detect_json(&DetectionRequest::new(TaskKind::SkinDisease, image_path.as_ref()))
            .await
    }

    async fn detect_json(&self, request: &DetectionRequest) -> Result<Value> {
        let plan = self.plan(request)?;
        let _scoped = plan.scoped_results();

        let output = self
            .run(&plan, CancelSignal::never())
            .instrument(detect_span(&plan, request))
            .await?;
        collect_json(&plan.source, &output).await
    }

    /// Spawn the planned program and wait for a successful exit.
    async fn run(&self, plan: &Plan, mut cancel: CancelSignal) -> Result<RunOutput> {
        let program = plan.invocation.display_name();
        debug!(%program, args = ?plan.invocation.args, "spawning detector");

        let output = tokio::select! {
            output = self.run_bounded(&plan.invocation) => output?,
            _ = cancel.cancelled() => {
                warn!(%program, "detection cancelled");
                return Err(DetectionError::Cancelled { program });
            }
        };

        check_exit(&program, &output)?;
        debug!(%program, "detector finished");
        Ok(output)
    }

    async fn run_bounded(&self, invocation: &Invocation) -> Result<RunOutput> {
        let run = self.runner.run(invocation);
        let result = match self.timeout {
            None => run.await,
            Some(after) => match tokio::time::timeout(after, run).await {
                Ok(output) => output,
                Err(_) => {
                    let program = invocation.display_name();
                    warn!(%program, ?after, "detector timed out");
                    Err(DetectionError::TimedOut { program, after })
                }
            },
        };
        if let Err(DetectionError::Execution { detail, .. }) = &result {
            warn!(%detail, "Error executing detection program");
        }
        result
    }
}

impl Plan {
    /// Guard for this call's own results file, if it has one. Hold it for
    /// the whole call so the file goes away even if the call is abandoned.
    pub fn scoped_results(&self) -> Option<ScopedResults> {
        match &self.source {
            ResultSource::ScopedFile(path) => Some(ScopedResults::new(path)),
            _ => None,
        }
    }
}

fn detect_span(plan: &Plan, request: &DetectionRequest) -> Span {
    info_span!(
        "detect",
        id = %plan.request_id,
        task = request.task.as_str(),
        image = %request.image_path.display(),
    )
}

/// Read the JSON answer from wherever the plan said it would be.
/// Artifacts are relayed as `{"processed_image": path}`.
async fn collect_json(source: &ResultSource, output: &RunOutput) -> Result<Value> {
    match source {
        ResultSource::FixedFile(path) | ResultSource::ScopedFile(path) => read_json(path).await,
        ResultSource::Stdout => parse_json(&output.stdout, "stdout"),
        ResultSource::Artifact(path) => Ok(json!({ "processed_image": path.to_string_lossy() })),
    }
}

fn check_exit(program: &str, output: &RunOutput) -> Result<()> {
    if output.success() {
        return Ok(());
    }

    let status = match output.exit_code {
        Some(code) => format!("exit code {code}"),
        None => "killed by signal".to_string(),
    };
    let stderr = truncate_output(&output.stderr, MAX_STDERR_BYTES);
    warn!(%program, %status, %stderr, "Error executing detection program");

    let detail = if stderr.trim().is_empty() {
        status
    } else {
        format!("{status}: {}", stderr.trim())
    };
    Err(DetectionError::Execution {
        program: program.to_string(),
        detail,
    })
}

async fn read_json(path: &Path) -> Result<Value> {
    let bytes = tokio::fs::read(path).await.map_err(|source| {
        warn!(path = %path.display(), error = %source, "Error reading results file");
        DetectionError::ResultRead {
            path: path.to_path_buf(),
            source,
        }
    })?;
    parse_json(&bytes, &path.display().to_string())
}

fn parse_json(bytes: &[u8], origin: &str) -> Result<Value> {
    serde_json::from_slice(bytes).map_err(|source| {
        warn!(%origin, error = %source, "Error parsing detector output");
        DetectionError::ResultParse {
            origin: origin.to_string(),
            source,
        }
    })
}

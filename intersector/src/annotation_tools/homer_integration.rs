use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::annotation_tools::{AnnotationOutput, AnnotationRequest, CancellationToken, PeakAnnotator};
use crate::config::{DEFAULT_ANNOTATOR, DEFAULT_TIMEOUT_SECS};
use crate::errors::AnnotationError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs HOMER's `annotatePeaks.pl <peaks> <genome>` and keeps its stdout as the
/// annotation table.
#[derive(Debug, Clone)]
pub struct HomerAnnotator {
    /// Program name looked up on PATH, or a path to it.
    pub program: String,
    /// `None` waits for as long as the tool runs.
    pub timeout: Option<Duration>,
}

impl Default for HomerAnnotator {
    fn default() -> Self {
        Self {
            program: DEFAULT_ANNOTATOR.to_string(),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }
}

impl HomerAnnotator {
    pub fn new(program: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn resolve_program(&self) -> Result<PathBuf, AnnotationError> {
        which::which(&self.program).map_err(|e| {
            debug!("which({}) failed: {}", self.program, e);
            AnnotationError::ToolNotFound(self.program.clone())
        })
    }
}

impl PeakAnnotator for HomerAnnotator {
    fn name(&self) -> &str {
        &self.program
    }

    fn annotate(
        &self,
        request: &AnnotationRequest,
        cancel: &CancellationToken,
    ) -> Result<AnnotationOutput, AnnotationError> {
        let program = self.resolve_program()?;
        let out_dir = request
            .output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        // stdout lands in a temp file first so a half-written table never sits
        // under the final name while the tool is still running.
        let stdout_file = NamedTempFile::new_in(out_dir)?;

        let mut cmd = Command::new(&program);
        cmd.arg(&request.peak_file)
            .arg(request.genome.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file.reopen()?))
            .stderr(Stdio::piped());

        info!(
            "Annotating {} against {} with {}",
            request.peak_file.display(),
            request.genome,
            program.display()
        );
        debug!("About to spawn: {:?}", cmd);
        let mut child = cmd.spawn().map_err(|source| AnnotationError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                if let Err(e) = pipe.read_to_end(&mut buf) {
                    warn!("Could not read annotator stderr: {}", e);
                }
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let waited = wait_for_exit(&mut child, &self.program, self.timeout, cancel);

        // A killed tool may leave grandchildren holding stderr open; only join the
        // reader when the tool exited on its own.
        let diagnostics = match (&waited, stderr_reader) {
            (Ok(_), Some(handle)) => handle.join().unwrap_or_default(),
            _ => String::new(),
        };

        // Kept even on failure so the partial table can be inspected.
        stdout_file
            .persist(&request.output_path)
            .map_err(|e| AnnotationError::Io(e.error))?;

        let status = waited?;
        if !status.success() {
            error!(
                "{} failed ({}). Stderr:\n{}",
                self.program,
                status,
                diagnostics.trim_end()
            );
            return Err(AnnotationError::Failed {
                program: self.program.clone(),
                status: status.to_string(),
                stderr: diagnostics.trim().to_string(),
            });
        }

        debug!("{} stderr:\n{}", self.program, diagnostics.trim_end());
        info!("Annotation written to {}", request.output_path.display());
        Ok(AnnotationOutput {
            table_path: request.output_path.clone(),
            diagnostics,
        })
    }
}

fn kill(child: &mut Child, program: &str) {
    if let Err(e) = child.kill() {
        warn!("Could not kill {}: {}", program, e);
    }
    if let Err(e) = child.wait() {
        warn!("Could not reap {}: {}", program, e);
    }
}

/// Polls the child until it exits, the deadline passes, or the token is cancelled.
fn wait_for_exit(
    child: &mut Child,
    program: &str,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<ExitStatus, AnnotationError> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            debug!("{} exited after {:?}", program, started.elapsed());
            return Ok(status);
        }
        if cancel.is_cancelled() {
            warn!("Cancellation requested; stopping {}", program);
            kill(child, program);
            return Err(AnnotationError::Cancelled);
        }
        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                error!("{} exceeded the {:?} timeout", program, limit);
                kill(child, program);
                return Err(AnnotationError::TimedOut {
                    program: program.to_string(),
                    after: limit,
                });
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

//! Media duration probing.
//!
//! Probing is the only blocking step in a build. The builder calls a
//! [`DurationProbe`] synchronously; batch builds probe every file up front
//! with [`probe_batch`] and hand the results to the builder in input order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use reelsmith_common::{ForgeError, ForgeResult, ProbeConfig};
use serde::Deserialize;
use tokio::sync::Semaphore;

/// Reports the duration of a media file in seconds.
pub trait DurationProbe: Send + Sync {
    fn probe_duration(&self, path: &Path) -> ForgeResult<f64>;
}

/// Probe backed by the `ffprobe` command-line tool.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: String,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.ffprobe.clone())
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl DurationProbe for FfprobeProbe {
    fn probe_duration(&self, path: &Path) -> ForgeResult<f64> {
        let output = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .output()
            .map_err(|e| ForgeError::probe(path, format!("failed to run {}: {e}", self.binary)))?;

        if !output.status.success() {
            return Err(ForgeError::probe(
                path,
                format!("{} exited with {}", self.binary, output.status),
            ));
        }
        parse_ffprobe_duration(path, &output.stdout)
    }
}

fn parse_ffprobe_duration(path: &Path, stdout: &[u8]) -> ForgeResult<f64> {
    let parsed: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| ForgeError::probe(path, format!("unreadable probe output: {e}")))?;
    let raw = parsed
        .format
        .duration
        .ok_or_else(|| ForgeError::probe(path, "probe output has no duration"))?;
    let seconds: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ForgeError::probe(path, format!("invalid duration '{raw}'")))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ForgeError::probe(path, format!("invalid duration '{raw}'")));
    }
    Ok(seconds)
}

/// Fixed durations keyed by path. Unknown paths fail to probe.
#[derive(Debug, Clone, Default)]
pub struct MemoryProbe {
    durations: HashMap<PathBuf, f64>,
}

impl MemoryProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<PathBuf>, seconds: f64) -> Self {
        self.durations.insert(path.into(), seconds);
        self
    }
}

impl DurationProbe for MemoryProbe {
    fn probe_duration(&self, path: &Path) -> ForgeResult<f64> {
        self.durations
            .get(path)
            .copied()
            .ok_or_else(|| ForgeError::probe(path, "no duration recorded"))
    }
}

/// Probe many files with at most `parallelism` probes in flight.
///
/// Results are returned in the order of `paths`.
pub async fn probe_batch(
    probe: Arc<dyn DurationProbe>,
    paths: Vec<PathBuf>,
    parallelism: usize,
) -> Vec<ForgeResult<f64>> {
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut handles = Vec::with_capacity(paths.len());

    for path in paths {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                handles.push((path, None, Some(e.to_string())));
                continue;
            }
        };
        let probe = Arc::clone(&probe);
        let task_path = path.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            probe.probe_duration(&task_path)
        });
        handles.push((path, Some(handle), None));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (path, handle, failure) in handles {
        let result = match (handle, failure) {
            (Some(handle), _) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(ForgeError::probe(&path, format!("probe task failed: {e}"))),
            },
            (None, failure) => Err(ForgeError::probe(
                &path,
                failure.unwrap_or_else(|| "probe was not started".to_string()),
            )),
        };
        if let Err(e) = &result {
            tracing::debug!(path = %path.display(), "Probe failed: {e}");
        }
        results.push(result);
    }
    results
}

/// Check if a binary is available on PATH.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

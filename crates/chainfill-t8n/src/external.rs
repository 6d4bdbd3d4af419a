//! `evm t8n` subprocess driver

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{T8nError, T8nResult};
use crate::tool::{EvaluateRequest, TransitionTool};
use crate::types::{T8nInput, T8nOutput, T8nTransaction};

/// Transition tool settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct T8nConfig {
    /// Tool binary
    pub binary: PathBuf,
    /// Arguments inserted before the `t8n` flags
    pub extra_args: Vec<String>,
    /// Seconds before a call is killed
    pub timeout_secs: u64,
    /// Collect per-transaction execution traces
    pub trace: bool,
    /// Write every call's input and output under this directory
    pub debug_dir: Option<PathBuf>,
}

impl Default for T8nConfig {
    fn default() -> Self {
        T8nConfig {
            binary: PathBuf::from("evm"),
            extra_args: Vec::new(),
            timeout_secs: 60,
            trace: false,
            debug_dir: None,
        }
    }
}

/// Runs `evm t8n` (or a compatible binary) once per state transition.
///
/// Input is a single JSON document on stdin and output a single JSON
/// document on stdout. Each call runs on its own current-thread runtime so
/// the timeout can kill the child.
#[derive(Debug)]
pub struct ExternalTransitionTool {
    config: T8nConfig,
    calls: AtomicUsize,
    traces: Mutex<Vec<serde_json::Value>>,
}

impl ExternalTransitionTool {
    /// Create a new driver
    pub fn new(config: T8nConfig) -> Self {
        ExternalTransitionTool {
            config,
            calls: AtomicUsize::new(0),
            traces: Mutex::new(Vec::new()),
        }
    }

    /// Settings in use
    pub fn config(&self) -> &T8nConfig {
        &self.config
    }

    fn args(&self, request: &EvaluateRequest<'_>, trace_dir: Option<&Path>) -> Vec<String> {
        let reward = match request.reward {
            Some(reward) => reward.to_string(),
            None => "-1".to_string(),
        };
        let mut args = self.config.extra_args.clone();
        args.extend(
            [
                "t8n".to_string(),
                "--input.alloc=stdin".to_string(),
                "--input.txs=stdin".to_string(),
                "--input.env=stdin".to_string(),
                "--output.result=stdout".to_string(),
                "--output.alloc=stdout".to_string(),
                format!("--state.fork={}", request.fork_label()),
                format!("--state.chainid={}", request.chain_id),
                format!("--state.reward={}", reward),
            ]
            .into_iter(),
        );
        if let Some(dir) = trace_dir {
            args.push("--trace".to_string());
            args.push(format!("--output.basedir={}", dir.display()));
        }
        args
    }

    async fn run(&self, args: &[String], stdin: Vec<u8>) -> T8nResult<std::process::Output> {
        let binary = self.config.binary.display().to_string();
        let mut child = Command::new(&self.config.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| T8nError::Spawn { binary, source })?;

        // Stdin is fed under the same timeout as the wait
        let pipe = child.stdin.take();
        let feed = async move {
            if let Some(mut pipe) = pipe {
                pipe.write_all(&stdin).await?;
                pipe.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };
        let exchange = async move {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            let output = output.map_err(T8nError::Io)?;
            // A failing tool may exit before draining stdin; its status wins
            match fed {
                Err(e) if output.status.success() => Err(T8nError::Io(e)),
                _ => Ok(output),
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match tokio::time::timeout(timeout, exchange).await {
            Ok(output) => output,
            Err(_) => Err(T8nError::Timeout(self.config.timeout_secs)),
        }
    }

    fn collect_traces(dir: &Path) -> T8nResult<Vec<serde_json::Value>> {
        let mut files = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map_or(false, |ext| ext == "jsonl"))
            .collect::<Vec<_>>();
        files.sort();

        let mut traces = Vec::with_capacity(files.len());
        for file in files {
            let content = std::fs::read_to_string(&file)?;
            let steps = content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(serde_json::from_str)
                .collect::<Result<Vec<serde_json::Value>, _>>()?;
            traces.push(serde_json::Value::Array(steps));
        }
        Ok(traces)
    }

    fn dump_debug(
        &self,
        call: usize,
        args: &[String],
        input: &[u8],
        stdout: &[u8],
    ) -> T8nResult<()> {
        let Some(root) = &self.config.debug_dir else {
            return Ok(());
        };
        let dir = root.join(call.to_string());
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("input.json"), input)?;
        std::fs::write(dir.join("output.json"), stdout)?;
        let command = std::iter::once(self.config.binary.display().to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        std::fs::write(dir.join("t8n.sh"), format!("{}\n", command))?;
        Ok(())
    }
}

impl TransitionTool for ExternalTransitionTool {
    fn name(&self) -> &str {
        "evm t8n"
    }

    fn evaluate(&self, request: &EvaluateRequest<'_>) -> T8nResult<T8nOutput> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let trace_dir = if self.config.trace {
            Some(tempfile::tempdir()?)
        } else {
            None
        };
        let args = self.args(request, trace_dir.as_ref().map(|d| d.path()));

        let input = serde_json::to_vec(&T8nInput {
            alloc: request.alloc,
            txs: request.txs.iter().map(T8nTransaction::from).collect(),
            env: request.env,
        })?;

        tracing::debug!(
            call,
            fork = %request.fork_label(),
            txs = request.txs.len(),
            "Running transition tool"
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let output = runtime.block_on(self.run(&args, input.clone()))?;

        self.dump_debug(call, &args, &input, &output.stdout)?;

        if let Some(dir) = &trace_dir {
            *self.traces.lock() = Self::collect_traces(dir.path())?;
        }

        if !output.status.success() {
            return Err(T8nError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            T8nError::InvalidOutput(format!(
                "{}: {}",
                e,
                String::from_utf8_lossy(&output.stdout).chars().take(200).collect::<String>()
            ))
        })
    }

    fn traces(&self) -> Vec<serde_json::Value> {
        self.traces.lock().clone()
    }
}

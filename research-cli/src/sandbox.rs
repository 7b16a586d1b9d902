//! ABOUTME: Subprocess-backed SandboxService — a local python3 child process
//! ABOUTME: matplotlib figures captured via a patched plt.show, no real isolation

use async_trait::async_trait;
use research_core::{SandboxOutcome, SandboxService};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::warn;

const FIGURE_MARKER: &str = "__FIGURE_BASE64__";
const ERROR_MARKER: &str = "__SANDBOX_ERROR__";
const RESULT_MARKER: &str = "__SANDBOX_RESULT__";

/// Wrapper fed to `python3 -c`; the user's generated code is piped in on
/// stdin and `exec`'d, with `plt.show()` patched to capture each figure as
/// a base64 PNG rather than opening a display window. If the code assigns
/// a `result` variable, it is JSON-serialized and emitted on its own
/// marker line (falling back to `str()` for non-JSON-able values).
const WRAPPER: &str = r#"
import sys, io, base64, json, traceback

code = sys.stdin.read()
figures = []

try:
    import matplotlib
    matplotlib.use("Agg")
    import matplotlib.pyplot as plt

    def _captured_show(*args, **kwargs):
        buf = io.BytesIO()
        plt.gcf().savefig(buf, format="png")
        figures.append(base64.b64encode(buf.getvalue()).decode("ascii"))
        plt.close("all")

    plt.show = _captured_show
except ImportError:
    pass

scope = {}
try:
    exec(compile(code, "<chart>", "exec"), scope)
except Exception:
    print("__SANDBOX_ERROR__")
    traceback.print_exc()
    sys.exit(1)
finally:
    for fig in figures:
        print("__FIGURE_BASE64__" + fig)
    if "result" in scope:
        try:
            print("__SANDBOX_RESULT__" + json.dumps(scope["result"]))
        except TypeError:
            print("__SANDBOX_RESULT__" + json.dumps(str(scope["result"])))
"#;

pub struct PythonSandbox {
    python_bin: String,
}

impl PythonSandbox {
    pub fn new() -> Self {
        Self {
            python_bin: "python3".to_string(),
        }
    }
}

impl Default for PythonSandbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxService for PythonSandbox {
    async fn execute_python(&self, code: &str, timeout_secs: u64) -> SandboxOutcome {
        let start = Instant::now();
        let run = run_child(&self.python_bin, code);

        match tokio::time::timeout(Duration::from_secs(timeout_secs), run).await {
            Ok(Ok((success, stdout, stderr))) => {
                let (stdout, figures, return_value) = extract_figures(&stdout);
                let error = if success { None } else { Some(first_error_line(&stderr, &stdout)) };
                SandboxOutcome {
                    success,
                    stdout,
                    stderr,
                    figures,
                    return_value,
                    execution_time_ms: start.elapsed().as_millis() as u64,
                    error,
                }
            }
            Ok(Err(err)) => {
                warn!(%err, "failed to spawn sandbox subprocess");
                SandboxOutcome {
                    success: false,
                    stdout: String::new(),
                    stderr: String::new(),
                    figures: Vec::new(),
                    return_value: None,
                    execution_time_ms: start.elapsed().as_millis() as u64,
                    error: Some(err.to_string()),
                }
            }
            Err(_) => SandboxOutcome {
                success: false,
                stdout: String::new(),
                stderr: String::new(),
                figures: Vec::new(),
                return_value: None,
                execution_time_ms: start.elapsed().as_millis() as u64,
                error: Some(format!("execution timed out after {timeout_secs}s")),
            },
        }
    }
}

async fn run_child(python_bin: &str, code: &str) -> std::io::Result<(bool, String, String)> {
    let mut child = Command::new(python_bin)
        .arg("-c")
        .arg(WRAPPER)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(code.as_bytes()).await?;
    }

    let output = child.wait_with_output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success() && !stdout.contains(ERROR_MARKER);
    Ok((success, stdout, stderr))
}

/// Splits figure-marker and result-marker lines out of `stdout`, returning
/// the remaining program output alongside the decoded base64 figure
/// strings and the JSON-decoded `result` variable, if any was emitted.
fn extract_figures(stdout: &str) -> (String, Vec<String>, Option<serde_json::Value>) {
    let mut figures = Vec::new();
    let mut return_value = None;
    let mut remaining = Vec::new();
    for line in stdout.lines() {
        if let Some(encoded) = line.strip_prefix(FIGURE_MARKER) {
            figures.push(encoded.to_string());
        } else if let Some(encoded) = line.strip_prefix(RESULT_MARKER) {
            return_value = serde_json::from_str(encoded).ok();
        } else if line != ERROR_MARKER {
            remaining.push(line);
        }
    }
    (remaining.join("\n"), figures, return_value)
}

fn first_error_line(stderr: &str, stdout: &str) -> String {
    stderr
        .lines()
        .last()
        .filter(|l| !l.is_empty())
        .or_else(|| stdout.lines().last())
        .unwrap_or("sandbox execution failed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_figures_splits_marker_lines() {
        let stdout = "hello\n__FIGURE_BASE64__abc123\nworld\n";
        let (remaining, figures, return_value) = extract_figures(stdout);
        assert_eq!(remaining, "hello\nworld");
        assert_eq!(figures, vec!["abc123".to_string()]);
        assert_eq!(return_value, None);
    }

    #[test]
    fn extract_figures_parses_result_marker() {
        let stdout = "hello\n__SANDBOX_RESULT__{\"mean\":3.5}\nworld\n";
        let (remaining, figures, return_value) = extract_figures(stdout);
        assert_eq!(remaining, "hello\nworld");
        assert!(figures.is_empty());
        assert_eq!(return_value, Some(serde_json::json!({"mean": 3.5})));
    }

    #[tokio::test]
    #[ignore = "requires a python3 interpreter on PATH"]
    async fn executes_simple_code() {
        let sandbox = PythonSandbox::new();
        let outcome = sandbox.execute_python("print('hi')", 10).await;
        assert!(outcome.success);
        assert!(outcome.stdout.contains("hi"));
    }
}

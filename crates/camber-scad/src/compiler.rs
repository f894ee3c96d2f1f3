//! OpenSCAD subprocess adapter. Every compile runs in a fresh temporary
//! directory so no state (partial outputs, stale diagnostics, the previous
//! attempt's files) carries over between calls.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use camber_agent::compile::{CompileResult, Compiler};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{Instant, sleep_until};

use crate::connector::{CONNECTOR_FILE_NAME, CONNECTOR_LIBRARY};
use crate::error::Result;

const INPUT_FILE: &str = "input.scad";
const OUTPUT_FILE: &str = "output.stl";
const NO_OUTPUT_DIAGNOSTIC: &str = "No STL output generated";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs the `openscad` binary on source text and reads back the binary STL
/// it produces. Success is decided by the presence of a non-empty output
/// file; the exit status is not consulted, matching how OpenSCAD reports
/// partial failures.
pub struct OpenScadCompiler {
    binary: PathBuf,
    timeout: Duration,
    seed_connector: bool,
}

impl OpenScadCompiler {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: DEFAULT_TIMEOUT,
            seed_connector: false,
        }
    }

    /// Seed the connector library into each compile directory so robot
    /// module sources can `include <module_connector.scad>`.
    pub fn with_connector_library(mut self) -> Self {
        self.seed_connector = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, source: &str) -> Result<CompileResult> {
        let dir = tempfile::tempdir()?;
        tokio::fs::write(dir.path().join(INPUT_FILE), source).await?;
        if self.seed_connector {
            tokio::fs::write(dir.path().join(CONNECTOR_FILE_NAME), CONNECTOR_LIBRARY).await?;
        }

        let mut child = match Command::new(&self.binary)
            .arg(INPUT_FILE)
            .arg("-o")
            .arg(OUTPUT_FILE)
            .current_dir(dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return Ok(CompileResult::Failure {
                    diagnostic: format!("failed to start {}: {e}", self.binary.display()),
                });
            }
        };

        // Stdio::piped above guarantees the handles exist
        let stdout = child.stdout.take().unwrap();
        let stderr = child.stderr.take().unwrap();
        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();

        let mut diagnostics: Vec<String> = Vec::new();
        let mut stdout_done = false;
        let mut stderr_done = false;
        let deadline = Instant::now() + self.timeout;

        loop {
            tokio::select! {
                _ = sleep_until(deadline) => {
                    let _ = child.kill().await;
                    return Ok(CompileResult::Failure {
                        diagnostic: format!("OpenSCAD timed out after {:?}", self.timeout),
                    });
                }
                line = stdout_lines.next_line(), if !stdout_done => match line {
                    Ok(Some(line)) => diagnostics.push(line),
                    _ => stdout_done = true,
                },
                line = stderr_lines.next_line(), if !stderr_done => match line {
                    Ok(Some(line)) => diagnostics.push(line),
                    _ => stderr_done = true,
                },
                status = child.wait() => {
                    if let Err(e) = status {
                        diagnostics.push(format!("failed to wait for compiler: {e}"));
                    }
                    break;
                }
            }
        }

        // lines emitted right before exit may still sit in the pipes
        while let Ok(Some(line)) = stdout_lines.next_line().await {
            diagnostics.push(line);
        }
        while let Ok(Some(line)) = stderr_lines.next_line().await {
            diagnostics.push(line);
        }

        match tokio::fs::read(dir.path().join(OUTPUT_FILE)).await {
            Ok(mesh) if !mesh.is_empty() => Ok(CompileResult::Success { mesh }),
            _ => {
                let diagnostic = if diagnostics.is_empty() {
                    NO_OUTPUT_DIAGNOSTIC.to_string()
                } else {
                    diagnostics.join("\n")
                };
                Ok(CompileResult::Failure { diagnostic })
            }
        }
    }
}

#[async_trait]
impl Compiler for OpenScadCompiler {
    async fn compile(&self, source: &str) -> camber_agent::Result<CompileResult> {
        self.run(source)
            .await
            .map_err(|e| camber_agent::Error::compiler(e.to_string()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    /// Writes a stand-in compiler script. It runs with the compile
    /// directory as cwd and receives `input.scad -o output.stl`.
    fn stub_compiler(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("openscad-stub");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut permissions = std::fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).unwrap();
        path
    }

    #[tokio::test]
    async fn nonempty_output_file_means_success() {
        let dir = tempfile::tempdir().unwrap();
        let stub = stub_compiler(dir.path(), r#"cp "$1" "$3""#);
        let result = OpenScadCompiler::new(stub).compile("cube(5);").await.unwrap();
        assert_eq!(
            result,
            CompileResult::Success {
                mesh: b"cube(5);".to_vec()
            }
        );
    }

    #[tokio::test]
    async fn diagnostics_are_collected_in_emission_order() {
        let dir = tempfile::tempdir().unwrap();
        let stub = stub_compiler(
            dir.path(),
            "echo 'ERROR: Parser error: syntax error' >&2\n\
             echo 'ERROR: Compilation failed.' >&2\n\
             exit 1",
        );
        let result = OpenScadCompiler::new(stub).compile("cube(").await.unwrap();
        assert_eq!(
            result,
            CompileResult::Failure {
                diagnostic: "ERROR: Parser error: syntax error\nERROR: Compilation failed."
                    .to_string()
            }
        );
    }

    #[tokio::test]
    async fn silent_failure_gets_the_generic_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let stub = stub_compiler(dir.path(), "exit 1");
        let result = OpenScadCompiler::new(stub).compile("cube(5);").await.unwrap();
        assert_eq!(
            result,
            CompileResult::Failure {
                diagnostic: NO_OUTPUT_DIAGNOSTIC.to_string()
            }
        );
    }

    #[tokio::test]
    async fn exit_status_is_ignored_when_output_exists() {
        let dir = tempfile::tempdir().unwrap();
        let stub = stub_compiler(
            dir.path(),
            "echo 'WARNING: deprecated syntax' >&2\n\
             printf 'mesh-bytes' > \"$3\"\n\
             exit 2",
        );
        let result = OpenScadCompiler::new(stub).compile("cube(5);").await.unwrap();
        assert_eq!(
            result,
            CompileResult::Success {
                mesh: b"mesh-bytes".to_vec()
            }
        );
    }

    #[tokio::test]
    async fn connector_library_is_seeded_only_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let stub = stub_compiler(
            dir.path(),
            "test -f module_connector.scad || exit 3\n\
             cp module_connector.scad \"$3\"",
        );

        let with = OpenScadCompiler::new(&stub).with_connector_library();
        let CompileResult::Success { mesh } = with.compile("module_connector();").await.unwrap()
        else {
            panic!("expected the seeded library to be found");
        };
        assert!(String::from_utf8(mesh).unwrap().contains("module module_connector()"));

        let without = OpenScadCompiler::new(&stub);
        let result = without.compile("module_connector();").await.unwrap();
        assert_eq!(
            result,
            CompileResult::Failure {
                diagnostic: NO_OUTPUT_DIAGNOSTIC.to_string()
            }
        );
    }

    #[tokio::test]
    async fn each_call_runs_in_a_fresh_directory() {
        let dir = tempfile::tempdir().unwrap();
        let stub = stub_compiler(
            dir.path(),
            "test -f leftover && { echo LEAK >&2; exit 1; }\n\
             touch leftover\n\
             echo clean >&2\n\
             exit 1",
        );
        let compiler = OpenScadCompiler::new(stub);
        for _ in 0..2 {
            let result = compiler.compile("cube(5);").await.unwrap();
            assert_eq!(
                result,
                CompileResult::Failure {
                    diagnostic: "clean".to_string()
                }
            );
        }
    }

    #[tokio::test]
    async fn missing_binary_reports_the_spawn_failure() {
        let compiler = OpenScadCompiler::new("/nonexistent/openscad-missing");
        let result = compiler.compile("cube(5);").await.unwrap();
        let CompileResult::Failure { diagnostic } = result else {
            panic!("expected a failure");
        };
        assert!(diagnostic.starts_with("failed to start /nonexistent/openscad-missing"));
    }

    #[tokio::test]
    async fn hung_compiles_are_killed_at_the_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let stub = stub_compiler(dir.path(), "sleep 30");
        let compiler = OpenScadCompiler::new(stub).with_timeout(Duration::from_millis(200));
        let result = compiler.compile("cube(5);").await.unwrap();
        let CompileResult::Failure { diagnostic } = result else {
            panic!("expected a timeout failure");
        };
        assert!(diagnostic.contains("timed out"));
    }
}

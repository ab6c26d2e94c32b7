//! Executable units inside the datapackage
//!
//! Protocol:
//! - working directory is the datapackage root
//! - stdin receives one JSON object of named arguments
//! - stdout must be one JSON object (results, or the artifact object)
//! - non-zero exit is a unit failure; stderr is forwarded to the log
//!
//! Renderers additionally get [`IMAGE_PATH_ENV`] and write their image there.
//! No timeout and no retry: a unit that fails, fails the invocation.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use super::{Algorithm, Artifact, Renderer, ViewResources};
use crate::binding::Bindings;
use crate::error::{DatapackError, Result};

/// Environment variable naming where a renderer writes its image
pub const IMAGE_PATH_ENV: &str = "DATAPACK_IMAGE_PATH";

/// Algorithm backed by an executable under algorithms/
#[derive(Debug, Clone)]
pub struct CommandAlgorithm {
    name: String,
    program: PathBuf,
    workdir: PathBuf,
}

impl CommandAlgorithm {
    pub fn new(name: impl Into<String>, program: PathBuf, workdir: PathBuf) -> Self {
        Self {
            name: name.into(),
            program,
            workdir,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl Algorithm for CommandAlgorithm {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, inputs), fields(program = %self.program.display()))]
    async fn run(&self, inputs: Bindings) -> Result<Bindings> {
        let payload = serde_json::to_vec(&inputs.to_value()?)?;
        let stdout = run_unit(&self.name, &self.program, &self.workdir, payload, &[]).await?;
        Bindings::from_json_object(parse_stdout(&self.name, &stdout)?, &self.name)
    }
}

/// Renderer backed by an executable under views/
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    name: String,
    program: PathBuf,
    workdir: PathBuf,
}

impl CommandRenderer {
    pub fn new(name: impl Into<String>, program: PathBuf, workdir: PathBuf) -> Self {
        Self {
            name: name.into(),
            program,
            workdir,
        }
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, resources), fields(program = %self.program.display()))]
    async fn render(&self, view: &str, resources: ViewResources) -> Result<Box<dyn Artifact>> {
        let payload = resources
            .iter()
            .map(|(id, handle)| Ok((id.clone(), handle.to_unit_value()?)))
            .collect::<Result<serde_json::Map<String, Value>>>()?;
        let payload = serde_json::to_vec(&Value::Object(payload))?;

        // Removed on drop, including when the unit fails
        let scratch_dir = tempfile::Builder::new().prefix("datapack-").tempdir()?;
        let scratch = scratch_dir.path().join(format!("{view}.png"));
        let env = [(IMAGE_PATH_ENV, scratch.as_os_str())];

        let stdout = run_unit(&self.name, &self.program, &self.workdir, payload, &env).await?;
        let object = parse_stdout(&self.name, &stdout)?;

        let image = tokio::fs::read(&scratch).await.map_err(|e| {
            DatapackError::computation(
                &self.name,
                format!("no image written to ${IMAGE_PATH_ENV} ({e})"),
            )
        })?;
        if let Err(e) = scratch_dir.close() {
            warn!(unit = %self.name, error = %e, "failed to remove scratch directory");
        }

        Ok(Box::new(CommandArtifact { image, object }))
    }
}

/// Artifact produced by a [`CommandRenderer`]
#[derive(Debug, Clone, PartialEq)]
pub struct CommandArtifact {
    pub image: Vec<u8>,
    pub object: Value,
}

impl Artifact for CommandArtifact {
    fn image(&self) -> Result<Vec<u8>> {
        Ok(self.image.clone())
    }

    fn object(&self) -> Result<Value> {
        Ok(self.object.clone())
    }
}

/// Spawn the unit, feed stdin, collect stdout
async fn run_unit(
    unit: &str,
    program: &Path,
    workdir: &Path,
    payload: Vec<u8>,
    env: &[(&str, &std::ffi::OsStr)],
) -> Result<Vec<u8>> {
    let mut command = tokio::process::Command::new(program);
    command
        .current_dir(workdir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in env {
        command.env(key, value);
    }

    let mut child = command
        .spawn()
        .map_err(|e| DatapackError::computation(unit, format!("failed to start: {e}")))?;

    // stdin is fed while stdout drains
    let stdin = child.stdin.take();
    let writer = tokio::spawn(async move {
        if let Some(mut stdin) = stdin {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| DatapackError::computation(unit, format!("failed to wait: {e}")))?;

    if let Ok(Err(e)) = writer.await {
        // A unit may exit without reading its arguments
        debug!(unit = unit, error = %e, "unit closed stdin early");
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines() {
        info!(unit = unit, "{}", line);
    }

    if !output.status.success() {
        return Err(DatapackError::computation(
            unit,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    Ok(output.stdout)
}

fn parse_stdout(unit: &str, stdout: &[u8]) -> Result<Value> {
    serde_json::from_slice(stdout)
        .map_err(|e| DatapackError::computation(unit, format!("stdout is not JSON: {e}")))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn command_algorithm_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "fit", r#"cat > /dev/null; echo '{"k": 4}'"#);
        let algorithm = CommandAlgorithm::new("fit", program, dir.path().to_path_buf());

        let mut inputs = Bindings::new();
        inputs.set("k", json!(3));
        let out = algorithm.run(inputs).await.unwrap();
        assert_eq!(out.get("k").unwrap().as_value(), Some(&json!(4)));
    }

    #[tokio::test]
    async fn command_algorithm_receives_arguments_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "echo_args", r#"printf '{"seen": %s}' "$(cat)""#);
        let algorithm = CommandAlgorithm::new("echo_args", program, dir.path().to_path_buf());

        let mut inputs = Bindings::new();
        inputs.set("k", json!(3));
        let out = algorithm.run(inputs).await.unwrap();
        assert_eq!(out.get("seen").unwrap().as_value(), Some(&json!({"k": 3})));
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_computation_error() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "fail", "echo 'bad input' >&2; exit 3");
        let algorithm = CommandAlgorithm::new("fail", program, dir.path().to_path_buf());

        let err = algorithm.run(Bindings::new()).await.unwrap_err();
        assert!(matches!(err, DatapackError::Computation { .. }));
        assert!(err.to_string().contains("bad input"));
    }

    #[tokio::test]
    async fn non_json_stdout_is_a_computation_error() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "chatty", "echo hello");
        let algorithm = CommandAlgorithm::new("chatty", program, dir.path().to_path_buf());

        let err = algorithm.run(Bindings::new()).await.unwrap_err();
        assert!(err.to_string().contains("not JSON"));
    }

    #[tokio::test]
    async fn failed_render_removes_scratch_image() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("image-path");
        let program = script(
            dir.path(),
            "broken",
            &format!(
                r#"cat > /dev/null; echo "$DATAPACK_IMAGE_PATH" > {}; printf 'PNG' > "$DATAPACK_IMAGE_PATH"; echo oops"#,
                record.display()
            ),
        );
        let renderer = CommandRenderer::new("broken", program, dir.path().to_path_buf());

        let err = renderer.render("plot", ViewResources::new()).await.err().unwrap();
        assert!(err.to_string().contains("not JSON"));

        let scratch = std::fs::read_to_string(&record).unwrap();
        let scratch = PathBuf::from(scratch.trim());
        assert!(scratch.ends_with("plot.png"));
        assert!(!scratch.exists());
        assert!(!scratch.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn command_renderer_collects_image_and_object() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(
            dir.path(),
            "plot",
            r#"cat > /dev/null; printf 'PNG' > "$DATAPACK_IMAGE_PATH"; echo '{"kind": "figure"}'"#,
        );
        let renderer = CommandRenderer::new("plot", program, dir.path().to_path_buf());

        let artifact = renderer.render("plot", ViewResources::new()).await.unwrap();
        assert_eq!(artifact.image().unwrap(), b"PNG".to_vec());
        assert_eq!(artifact.object().unwrap(), json!({"kind": "figure"}));
    }
}

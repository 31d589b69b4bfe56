//! Docker adapter: the sandbox is a long-lived container we exec into.

use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::errors::Error as DockerError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::Docker;
use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use super::{CommandOutput, Sandbox, SandboxError, SandboxInfo};

/// Runs commands inside an existing Docker container.
pub(crate) struct DockerSandbox {
    docker: Docker,
    container: String,
    info: SandboxInfo,
}

impl DockerSandbox {
    /// Connects to the local Docker daemon for `container`.
    pub async fn connect(container: String, info: SandboxInfo) -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| SandboxError::docker_unavailable(e.to_string()))?;

        // Check if Docker is accessible
        docker
            .ping()
            .await
            .map_err(|e| SandboxError::docker_unavailable(e.to_string()))?;

        Ok(Self {
            docker,
            container,
            info,
        })
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    fn info(&self) -> Result<Option<SandboxInfo>, SandboxError> {
        Ok(Some(self.info.clone()))
    }

    async fn run_command(&self, command: &str) -> Result<CommandOutput, SandboxError> {
        let exec = self
            .docker
            .create_exec(
                &self.container,
                CreateExecOptions {
                    cmd: Some(vec!["sh", "-c", command]),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| map_docker_error(&self.container, e))?;

        let stdout = match self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| map_docker_error(&self.container, e))?
        {
            StartExecResults::Attached { output, .. } => {
                collect_output(&self.container, output).await?
            }
            StartExecResults::Detached => String::new(),
        };

        let exit_code = match self.docker.inspect_exec(&exec.id).await {
            Ok(inspect) => inspect.exit_code,
            Err(e) => {
                debug!("Could not inspect exec {}: {}", exec.id, e);
                None
            }
        };

        Ok(CommandOutput { stdout, exit_code })
    }
}

/// Drains an attached exec stream into its stdout.
///
/// A broken stream fails the command; the partial output is discarded.
async fn collect_output<S>(container: &str, mut stream: S) -> Result<String, SandboxError>
where
    S: Stream<Item = Result<LogOutput, DockerError>> + Unpin,
{
    let mut stdout = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(LogOutput::StdOut { message }) => {
                stdout.push_str(&String::from_utf8_lossy(&message));
            }
            Ok(LogOutput::StdErr { message }) => {
                debug!("stderr: {}", String::from_utf8_lossy(&message).trim());
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Error reading exec output: {}", e);
                return Err(map_docker_error(container, e));
            }
        }
    }
    Ok(stdout)
}

/// Maps daemon errors onto the sandbox taxonomy.
///
/// 404 means the container is gone and 409 means it is not running; both
/// tell the caller to recreate the sandbox.
fn map_docker_error(container: &str, err: DockerError) -> SandboxError {
    match err {
        DockerError::DockerResponseServerError {
            status_code: 404,
            message,
        } => SandboxError::not_found(format!("container {container}: {message}")),
        DockerError::DockerResponseServerError {
            status_code: 409,
            message,
        } => SandboxError::stopped(format!("container {container}: {message}")),
        other => SandboxError::provider(other.to_string()),
    }
}

//! Container runtime client used to pre-pull training base images.

use std::io;
use std::path::PathBuf;
use std::process::Command;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PullError {
    #[error("failed to run `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },
    #[error("`{binary} pull {repository}` exited with {status}: {stderr}")]
    Failed {
        binary: String,
        repository: String,
        status: String,
        stderr: String,
    },
}

pub trait ImagePuller {
    fn pull(&self, repository: &str) -> Result<(), PullError>;
}

/// Pulls through a Docker compatible command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ImagePuller for DockerCli {
    fn pull(&self, repository: &str) -> Result<(), PullError> {
        let binary = self.binary.display().to_string();
        tracing::debug!("Pulling TF image: {repository}");

        let output = Command::new(&self.binary)
            .args(["pull", repository])
            .output()
            .map_err(|source| PullError::Spawn {
                binary: binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(PullError::Failed {
                binary,
                repository: repository.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Result of pulling one base image; failures never fail the update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    Pulled { repository: String },
    Failed { repository: String, reason: String },
}

impl PullOutcome {
    pub fn repository(&self) -> &str {
        match self {
            PullOutcome::Pulled { repository } | PullOutcome::Failed { repository, .. } => {
                repository
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PullOutcome::Failed { .. })
    }
}

/// Pulls `repository`, logging instead of propagating any failure.
pub fn pull_best_effort(puller: &dyn ImagePuller, repository: &str) -> PullOutcome {
    match puller.pull(repository) {
        Ok(()) => {
            tracing::info!(repository = %repository, "pulled training base image");
            PullOutcome::Pulled {
                repository: repository.to_string(),
            }
        }
        Err(err) => {
            tracing::error!(repository = %repository, error = %err, "Failed to pull TF image");
            PullOutcome::Failed {
                repository: repository.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    struct Refusing;

    impl ImagePuller for Refusing {
        fn pull(&self, repository: &str) -> Result<(), PullError> {
            Err(PullError::Failed {
                binary: "docker".to_string(),
                repository: repository.to_string(),
                status: "exit status: 1".to_string(),
                stderr: "manifest unknown".to_string(),
            })
        }
    }

    #[test]
    fn failure_becomes_outcome() {
        let outcome = pull_best_effort(&Refusing, "127.0.0.1:5000/tf:py3");
        assert!(outcome.is_failed());
        assert_eq!(outcome.repository(), "127.0.0.1:5000/tf:py3");
        let PullOutcome::Failed { reason, .. } = outcome else {
            panic!("expected failure");
        };
        assert!(reason.contains("manifest unknown"));
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let cli = DockerCli::new("/nonexistent/tf-pack-docker");
        let err = cli.pull("127.0.0.1:5000/tf:py3").unwrap_err();
        assert!(matches!(err, PullError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_failure() {
        let cli = DockerCli::new("false");
        let err = cli.pull("127.0.0.1:5000/tf:py3").unwrap_err();
        assert!(matches!(err, PullError::Failed { .. }));
    }
}

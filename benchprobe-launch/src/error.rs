//! Launch Errors

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while rendering a template or running it in a child process
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Template file could not be read
    #[error("Could not read template \"{}\": {source}", .path.display())]
    TemplateNotFound {
        /// Path that was looked up
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Template references placeholders the context does not provide
    #[error("Template {template} has unbound placeholders: {}", .names.join(", "))]
    UnboundPlaceholder {
        /// Template name
        template: String,
        /// Placeholder names, sorted and deduplicated
        names: Vec<String>,
    },

    /// Configured bootstrap file does not exist
    #[error("Bootstrap file \"{}\" does not exist", .path.display())]
    BootstrapNotFound {
        /// Configured path
        path: PathBuf,
    },

    /// Temporary script could not be written
    #[error("Failed to write script: {0}")]
    Io(#[from] std::io::Error),

    /// Child process could not be started
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        /// Command line
        command: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the child process failed
    #[error("Failed to wait for `{command}`: {source}")]
    Wait {
        /// Command line
        command: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Child process exited unsuccessfully
    #[error("`{command}` {}: {stderr}", describe_exit(.exit_code))]
    NonZeroExit {
        /// Command line
        command: String,
        /// Exit code, `None` if terminated by a signal
        exit_code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// Child process output was not a single valid JSON value
    #[error("Could not decode output of `{command}`: {message}")]
    Decode {
        /// Command line
        command: String,
        /// Decoder message
        message: String,
        /// Leading part of the offending output
        output: String,
    },

    /// Child process ran past its deadline and was killed
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout {
        /// Command line
        command: String,
        /// Deadline that expired
        timeout: Duration,
    },
}

/// Discriminant of [`LaunchError`], for matching without destructuring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchErrorKind {
    /// See [`LaunchError::TemplateNotFound`]
    TemplateNotFound,
    /// See [`LaunchError::UnboundPlaceholder`]
    UnboundPlaceholder,
    /// See [`LaunchError::BootstrapNotFound`]
    BootstrapNotFound,
    /// See [`LaunchError::Io`]
    Io,
    /// See [`LaunchError::Spawn`]
    SpawnFailure,
    /// See [`LaunchError::Wait`]
    WaitFailure,
    /// See [`LaunchError::NonZeroExit`]
    NonZeroExit,
    /// See [`LaunchError::Decode`]
    DecodeFailure,
    /// See [`LaunchError::Timeout`]
    Timeout,
}

impl LaunchError {
    /// Kind of this error
    pub fn kind(&self) -> LaunchErrorKind {
        match self {
            LaunchError::TemplateNotFound { .. } => LaunchErrorKind::TemplateNotFound,
            LaunchError::UnboundPlaceholder { .. } => LaunchErrorKind::UnboundPlaceholder,
            LaunchError::BootstrapNotFound { .. } => LaunchErrorKind::BootstrapNotFound,
            LaunchError::Io(_) => LaunchErrorKind::Io,
            LaunchError::Spawn { .. } => LaunchErrorKind::SpawnFailure,
            LaunchError::Wait { .. } => LaunchErrorKind::WaitFailure,
            LaunchError::NonZeroExit { .. } => LaunchErrorKind::NonZeroExit,
            LaunchError::Decode { .. } => LaunchErrorKind::DecodeFailure,
            LaunchError::Timeout { .. } => LaunchErrorKind::Timeout,
        }
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_failure_is_not_a_write_failure() {
        let err = LaunchError::Wait {
            command: "php /tmp/script.php".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "no child processes"),
        };
        assert_eq!(err.kind(), LaunchErrorKind::WaitFailure);
        assert_eq!(
            err.to_string(),
            "Failed to wait for `php /tmp/script.php`: no child processes"
        );

        let write = LaunchError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert_eq!(write.kind(), LaunchErrorKind::Io);
        assert_eq!(write.to_string(), "Failed to write script: disk full");
    }

    #[test]
    fn test_non_zero_exit_message() {
        let err = LaunchError::NonZeroExit {
            command: "php /tmp/script.php".to_string(),
            exit_code: Some(255),
            stderr: "PHP Fatal error: Class \"Missing\" not found".to_string(),
        };
        assert_eq!(err.kind(), LaunchErrorKind::NonZeroExit);
        assert_eq!(
            err.to_string(),
            "`php /tmp/script.php` exited with code 255: PHP Fatal error: Class \"Missing\" not found"
        );
    }

    #[test]
    fn test_signal_exit_message() {
        let err = LaunchError::NonZeroExit {
            command: "php x.php".to_string(),
            exit_code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("terminated by a signal"));
    }

    #[test]
    fn test_unbound_placeholder_message() {
        let err = LaunchError::UnboundPlaceholder {
            template: "reflector.template".to_string(),
            names: vec!["class".to_string(), "file".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Template reflector.template has unbound placeholders: class, file"
        );
    }
}

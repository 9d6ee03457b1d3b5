//! Process Launcher
//!
//! Renders a template, runs it through an [`IsolatedRunner`] and decodes the
//! single JSON value the script writes to standard output.

use crate::error::LaunchError;
use crate::php;
use crate::runner::{IsolatedRunner, ProcessRunner, RunOutput};
use crate::template::{Template, TemplateContext};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Context key the launcher fills with the bootstrap literal
pub const BOOTSTRAP_KEY: &str = "bootstrap";

/// Maximum number of output characters kept in a decode error
const OUTPUT_EXCERPT_CHARS: usize = 512;

/// Renders templates and runs them in isolated child processes
#[derive(Debug, Clone)]
pub struct Launcher<R = ProcessRunner> {
    runner: R,
    bootstrap: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl<R: IsolatedRunner> Launcher<R> {
    /// Launcher without bootstrap or deadline
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            bootstrap: None,
            timeout: None,
        }
    }

    /// Script the child requires before the target file (typically an autoloader)
    pub fn with_bootstrap(mut self, bootstrap: impl Into<PathBuf>) -> Self {
        self.bootstrap = Some(bootstrap.into());
        self
    }

    /// Deadline for each child process
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Underlying runner
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Configured bootstrap
    pub fn bootstrap(&self) -> Option<&Path> {
        self.bootstrap.as_deref()
    }

    /// Configured deadline
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Render `template` with `context`, run it and decode its output.
    ///
    /// A `bootstrap` entry is added to the context unless the caller
    /// provided one. Nothing is decoded unless the child exits with code 0.
    pub fn launch<T: DeserializeOwned>(
        &self,
        template: &Template,
        mut context: TemplateContext,
    ) -> Result<T, LaunchError> {
        if let Some(bootstrap) = &self.bootstrap {
            if !bootstrap.exists() {
                return Err(LaunchError::BootstrapNotFound {
                    path: bootstrap.clone(),
                });
            }
        }
        if !context.contains(BOOTSTRAP_KEY) {
            context.insert(BOOTSTRAP_KEY, php::export_optional_path(self.bootstrap()));
        }

        let script = template.render(&context)?;
        tracing::debug!(template = template.name(), "launching template");

        let output = self.runner.run(&script, self.timeout)?;
        if !output.success() {
            return Err(LaunchError::NonZeroExit {
                command: output.command,
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        if !output.stderr.trim().is_empty() {
            tracing::debug!(stderr = %output.stderr.trim(), "child diagnostics");
        }

        decode(&output)
    }
}

fn decode<T: DeserializeOwned>(output: &RunOutput) -> Result<T, LaunchError> {
    let text = String::from_utf8_lossy(&output.stdout);
    let text = text.trim();

    if text.is_empty() {
        return Err(LaunchError::Decode {
            command: output.command.clone(),
            message: "no output".to_string(),
            output: String::new(),
        });
    }

    serde_json::from_str(text).map_err(|e| LaunchError::Decode {
        command: output.command.clone(),
        message: e.to_string(),
        output: text.chars().take(OUTPUT_EXCERPT_CHARS).collect(),
    })
}

#![warn(missing_docs)]
//! benchprobe Launch - Isolated Script Execution
//!
//! Renders script templates and runs them in a separate process so that the
//! code they load (fatal errors, output, autoloader side effects) never
//! touches the calling process. Results come back as one JSON value on the
//! child's standard output.
//!
//! ```text
//! Template + TemplateContext
//!        │  render (pure substitution)
//!        ▼
//!   script text ──▶ IsolatedRunner::run ──▶ RunOutput { stdout, stderr, exit_code }
//!                                                  │
//!                                                  ▼
//!                                     Launcher: exit check + JSON decode
//! ```

mod error;
mod launcher;
pub mod php;
mod runner;
mod template;

pub use error::{LaunchError, LaunchErrorKind};
pub use launcher::{BOOTSTRAP_KEY, Launcher};
pub use runner::{DEFAULT_PHP_BINARY, IsolatedRunner, ProcessRunner, RunOutput};
pub use template::{Template, TemplateContext, TemplateId, TemplateSet};

#![warn(missing_docs)]
//! benchprobe - Out-of-process PHP Benchmark Reflection
//!
//! Finds the benchmark class a PHP file declares and describes it (methods,
//! doc comments, ancestors, parameter sets) by running the reflection in a
//! separate PHP process. Whatever the benchmark file does when loaded stays
//! in the child.
//!
//! # Example
//!
//! ```ignore
//! use benchprobe::{ProbeConfig, Reflector};
//!
//! let config = ProbeConfig::discover().unwrap_or_default();
//! let reflector = Reflector::from_config(&config)?;
//!
//! let hierarchy = reflector.reflect("benchmarks/HashBench.php")?;
//! for class in &hierarchy {
//!     println!("{} ({} methods)", class.name, class.methods.len());
//! }
//!
//! let sets = reflector.parameter_sets("benchmarks/HashBench.php", &["provideSizes"])?;
//! ```

mod config;
mod hierarchy;
mod parameters;
mod reflector;

pub use config::{CONFIG_FILE_NAME, LauncherConfig, ProbeConfig, ReflectorConfig};
pub use hierarchy::{ClassInfo, Hierarchy, MethodInfo};
pub use parameters::ParameterSet;
pub use reflector::{ReflectError, Reflector};

// Re-export the building blocks
pub use benchprobe_launch::{
    IsolatedRunner, LaunchError, LaunchErrorKind, Launcher, ProcessRunner, RunOutput, Template,
    TemplateContext, TemplateId, TemplateSet, php,
};
pub use benchprobe_scan::{DeclarationScanner, QualifiedName, find_declaration};

/// Install a formatted `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise benchprobe logs at info, or debug
/// when `verbose` is set. Does nothing if a subscriber is already installed.
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let default_directive = if verbose {
        "benchprobe=debug,benchprobe_scan=debug,benchprobe_launch=debug"
    } else {
        "benchprobe=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

//! Remote Reflector
//!
//! Reflects PHP benchmark classes without loading them into this process.
//! The declaration scanner names the class; a child process loads the file,
//! walks the class and its ancestors with PHP's own reflection and reports
//! back. The child's order is kept as is: no re-sorting, no deduplication.

use crate::config::ProbeConfig;
use crate::hierarchy::{ClassInfo, Hierarchy, MethodInfo};
use crate::parameters::ParameterSet;
use benchprobe_launch::{
    IsolatedRunner, LaunchError, Launcher, ProcessRunner, TemplateContext, TemplateId,
    TemplateSet, php,
};
use benchprobe_scan::{DeclarationScanner, QualifiedName};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors returned by [`Reflector`]
#[derive(Debug, Error)]
pub enum ReflectError {
    /// The file declares no class
    #[error("Could not find a class declaration in \"{}\"", .path.display())]
    InvalidInput {
        /// Scanned file
        path: PathBuf,
    },

    /// The file could not be read
    #[error("Could not read \"{}\": {source}", .path.display())]
    Io {
        /// Scanned file
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Rendering, running or decoding the child process failed
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// Class record as written by the reflector template
#[derive(Debug, Deserialize)]
struct RawClass {
    class: String,
    #[serde(rename = "abstract", default)]
    is_abstract: bool,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    interfaces: Vec<String>,
    #[serde(default)]
    methods: Vec<RawMethod>,
}

#[derive(Debug, Deserialize)]
struct RawMethod {
    name: String,
    #[serde(default)]
    comment: String,
    #[serde(rename = "static", default)]
    is_static: bool,
}

impl RawClass {
    fn into_class_info(self, path: &Path) -> ClassInfo {
        let mut info = ClassInfo::new(self.class, path);
        info.is_abstract = self.is_abstract;
        info.comment = self.comment;
        info.interfaces = self.interfaces.into_iter().collect();
        for method in self.methods {
            info.add_method(MethodInfo {
                class: info.name.clone(),
                name: method.name,
                comment: method.comment,
                is_static: method.is_static,
            });
        }
        info
    }
}

/// Reflects benchmark classes in isolated child processes
#[derive(Debug, Clone)]
pub struct Reflector<R = ProcessRunner> {
    scanner: DeclarationScanner,
    launcher: Launcher<R>,
    templates: TemplateSet,
    jobs: usize,
}

impl Reflector<ProcessRunner> {
    /// Reflector wired from configuration.
    ///
    /// Relative `bootstrap` and `template_dir` paths are taken relative to
    /// the directory the configuration was loaded from.
    pub fn from_config(config: &ProbeConfig) -> anyhow::Result<Self> {
        let launcher_config = &config.launcher;

        let mut runner = ProcessRunner::new(&launcher_config.php_binary);
        if let Some(wrapper) = &launcher_config.php_wrapper {
            runner = runner.with_wrapper(wrapper);
        }
        for (key, value) in &launcher_config.php_config {
            runner = runner.with_ini(key.as_str(), value.as_str());
        }

        let mut launcher = Launcher::new(runner).with_timeout(launcher_config.timeout()?);
        if let Some(bootstrap) = &launcher_config.bootstrap {
            launcher = launcher.with_bootstrap(config.resolve_path(bootstrap));
        }

        let templates = match &launcher_config.template_dir {
            Some(dir) => TemplateSet::from_dir(config.resolve_path(dir)),
            None => TemplateSet::builtin(),
        };

        Ok(Self::new(launcher)
            .with_templates(templates)
            .with_jobs(config.reflector.jobs))
    }
}

impl<R: IsolatedRunner> Reflector<R> {
    /// Reflector using built-in templates, one job
    pub fn new(launcher: Launcher<R>) -> Self {
        Self {
            scanner: DeclarationScanner::new(),
            launcher,
            templates: TemplateSet::builtin(),
            jobs: 1,
        }
    }

    /// Use a different template set
    pub fn with_templates(mut self, templates: TemplateSet) -> Self {
        self.templates = templates;
        self
    }

    /// Use a different declaration scanner
    pub fn with_scanner(mut self, scanner: DeclarationScanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Number of files [`Reflector::reflect_all`] reflects in parallel
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Underlying launcher
    pub fn launcher(&self) -> &Launcher<R> {
        &self.launcher
    }

    /// Reflect the class declared in `path` and its ancestors.
    ///
    /// The first entry of the hierarchy is the class in `path`; the rest are
    /// its ancestors, nearest first.
    pub fn reflect(&self, path: impl AsRef<Path>) -> Result<Hierarchy, ReflectError> {
        let path = path.as_ref();
        let class = self.class_name(path)?;

        let template = self.templates.get(TemplateId::Reflector)?;
        let context = TemplateContext::new()
            .with("file", php::export_path(path))
            .with("class", php::export_string(class.as_str()));

        let records: Vec<RawClass> = self.launcher.launch(&template, context)?;
        let hierarchy: Hierarchy = records
            .into_iter()
            .map(|record| record.into_class_info(path))
            .collect();

        tracing::debug!(
            path = %path.display(),
            class = %class,
            levels = hierarchy.len(),
            "reflected class hierarchy"
        );
        Ok(hierarchy)
    }

    /// Call each named parameter provider of the class in `path`.
    ///
    /// Returns every provider's parameter sets concatenated in provider
    /// order, exactly as the providers produced them.
    pub fn parameter_sets<S: AsRef<str>>(
        &self,
        path: impl AsRef<Path>,
        providers: &[S],
    ) -> Result<Vec<ParameterSet>, ReflectError> {
        let path = path.as_ref();
        let class = self.class_name(path)?;

        let template = self.templates.get(TemplateId::ParameterSetExtractor)?;
        let context = TemplateContext::new()
            .with("file", php::export_path(path))
            .with("class", php::export_string(class.as_str()))
            .with("paramProviders", php::export_list(providers));

        let sets: Vec<ParameterSet> = self.launcher.launch(&template, context)?;
        tracing::debug!(
            path = %path.display(),
            class = %class,
            providers = providers.len(),
            sets = sets.len(),
            "extracted parameter sets"
        );
        Ok(sets)
    }

    /// Reflect many files, one child process each, results in input order.
    ///
    /// Runs on a pool of the configured number of jobs; falls back to one
    /// file at a time if the pool cannot be built.
    pub fn reflect_all<P>(&self, paths: &[P]) -> Vec<Result<Hierarchy, ReflectError>>
    where
        P: AsRef<Path> + Sync,
    {
        if self.jobs == 1 || paths.len() <= 1 {
            return paths.iter().map(|path| self.reflect(path)).collect();
        }

        let pool = match ThreadPoolBuilder::new()
            .num_threads(self.jobs.min(paths.len()))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!(error = %e, "failed to build reflection pool, running sequentially");
                return paths.iter().map(|path| self.reflect(path)).collect();
            }
        };

        pool.install(|| paths.par_iter().map(|path| self.reflect(path)).collect())
    }

    fn class_name(&self, path: &Path) -> Result<QualifiedName, ReflectError> {
        let found = self
            .scanner
            .scan_path(path)
            .map_err(|source| ReflectError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        found.ok_or_else(|| ReflectError::InvalidInput {
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchprobe_launch::{LaunchErrorKind, RunOutput};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers every run with the same JSON and records the scripts
    struct Canned {
        stdout: String,
        scripts: Mutex<Vec<String>>,
    }

    impl Canned {
        fn new(stdout: &str) -> Self {
            Self {
                stdout: stdout.to_string(),
                scripts: Mutex::new(Vec::new()),
            }
        }

        fn scripts(&self) -> Vec<String> {
            self.scripts.lock().unwrap().clone()
        }
    }

    impl IsolatedRunner for Canned {
        fn run(&self, script: &str, _deadline: Option<Duration>) -> Result<RunOutput, LaunchError> {
            self.scripts.lock().unwrap().push(script.to_string());
            Ok(RunOutput {
                command: "php canned.php".to_string(),
                stdout: self.stdout.as_bytes().to_vec(),
                stderr: String::new(),
                exit_code: Some(0),
            })
        }
    }

    const HIERARCHY_JSON: &str = r#"[
        {"class": "Acme\\HashBench", "abstract": false, "comment": "/** @BeforeMethods({\"setUp\"}) */",
         "interfaces": ["Countable"],
         "methods": [{"name": "benchMd5", "comment": "", "static": false},
                     {"name": "setUp", "comment": "", "static": false}]},
        {"class": "Acme\\BaseBench", "abstract": true, "comment": "",
         "interfaces": [],
         "methods": [{"name": "setUp", "comment": "/** base */", "static": false},
                     {"name": "provideSizes", "comment": "", "static": true}]}
    ]"#;

    fn bench_file(source: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("HashBench.php");
        std::fs::write(&path, source).unwrap();
        (dir, path)
    }

    const BENCH_SOURCE: &str =
        "<?php\nnamespace Acme;\n\nclass HashBench extends BaseBench implements \\Countable\n{\n}\n";

    #[test]
    fn test_reflect_builds_hierarchy_in_child_order() {
        let (_dir, path) = bench_file(BENCH_SOURCE);
        let reflector = Reflector::new(Launcher::new(Canned::new(HIERARCHY_JSON)));

        let hierarchy = reflector.reflect(&path).unwrap();

        assert_eq!(hierarchy.len(), 2);
        let top = hierarchy.top().unwrap();
        assert_eq!(top.name, "Acme\\HashBench");
        assert!(!top.is_abstract);
        assert!(top.implements("Countable"));
        assert_eq!(top.path, path);
        assert_eq!(top.comment, "/** @BeforeMethods({\"setUp\"}) */");
        assert_eq!(top.method("benchMd5").unwrap().class, "Acme\\HashBench");

        let parent = &hierarchy.ancestors()[0];
        assert_eq!(parent.name, "Acme\\BaseBench");
        assert!(parent.is_abstract);
        assert_eq!(parent.method("setUp").unwrap().class, "Acme\\BaseBench");

        assert_eq!(hierarchy.find_method("setUp").unwrap().class, "Acme\\HashBench");
        assert!(hierarchy.has_static_method("provideSizes"));
    }

    #[test]
    fn test_reflect_passes_file_and_class_literals() {
        let (_dir, path) = bench_file(BENCH_SOURCE);
        let runner = Canned::new("[]");
        let reflector = Reflector::new(Launcher::new(&runner));

        let hierarchy = reflector.reflect(&path).unwrap();
        assert!(hierarchy.is_empty());

        let scripts = runner.scripts();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].contains(&format!("$file = {};", php::export_path(&path))));
        assert!(scripts[0].contains(r"$class = 'Acme\\HashBench';"));
        assert!(scripts[0].contains("$bootstrap = null;"));
        assert!(!scripts[0].contains("{{"));
    }

    #[test]
    fn test_reflect_without_class_is_invalid_input() {
        let (_dir, path) = bench_file("<?php\nfunction helper() { return 1; }\n");
        let runner = Canned::new(HIERARCHY_JSON);
        let reflector = Reflector::new(Launcher::new(&runner));

        let err = reflector.reflect(&path).unwrap_err();
        assert!(matches!(err, ReflectError::InvalidInput { .. }));
        assert!(runner.scripts().is_empty());
    }

    #[test]
    fn test_reflect_unreadable_path_is_io_error() {
        let reflector = Reflector::new(Launcher::new(Canned::new("[]")));
        let err = reflector.reflect("/nonexistent/benchprobe/Bench.php").unwrap_err();
        assert!(matches!(err, ReflectError::Io { .. }));
    }

    #[test]
    fn test_reflect_decode_failure_propagates() {
        let (_dir, path) = bench_file(BENCH_SOURCE);
        let reflector = Reflector::new(Launcher::new(Canned::new(r#"[{"abstract": true}]"#)));

        match reflector.reflect(&path).unwrap_err() {
            ReflectError::Launch(err) => assert_eq!(err.kind(), LaunchErrorKind::DecodeFailure),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parameter_sets_pass_through() {
        let (_dir, path) = bench_file(BENCH_SOURCE);
        let runner = Canned::new(r#"[{"size": 1}, {"size": 2}, {"algo": "md5"}]"#);
        let reflector = Reflector::new(Launcher::new(&runner));

        let sets = reflector
            .parameter_sets(&path, &["provideSizes", "provideAlgos"])
            .unwrap();

        assert_eq!(sets.len(), 3);
        assert_eq!(sets[1].get("size"), Some(&serde_json::json!(2)));
        assert_eq!(sets[2].get("algo"), Some(&serde_json::json!("md5")));
        assert!(runner.scripts()[0].contains("$paramProviders = ['provideSizes', 'provideAlgos'];"));
    }

    #[test]
    fn test_parameter_sets_without_class_is_invalid_input() {
        let (_dir, path) = bench_file("<?php interface OnlyAnInterface {}");
        let reflector = Reflector::new(Launcher::new(Canned::new("[]")));
        let err = reflector.parameter_sets(&path, &["provide"]).unwrap_err();
        assert!(matches!(err, ReflectError::InvalidInput { .. }));
    }

    /// Reports a one-level hierarchy named after the class in the script
    struct EchoClass;

    impl IsolatedRunner for EchoClass {
        fn run(&self, script: &str, _deadline: Option<Duration>) -> Result<RunOutput, LaunchError> {
            let class = script
                .split("$class = '")
                .nth(1)
                .and_then(|rest| rest.split('\'').next())
                .unwrap_or_default();
            // Later files finish first
            let delay = 5 * (4 - class.trim_start_matches("Bench").parse::<u64>().unwrap_or(4));
            std::thread::sleep(Duration::from_millis(delay));
            Ok(RunOutput {
                command: "php echo.php".to_string(),
                stdout: format!(r#"[{{"class": "{class}"}}]"#).into_bytes(),
                stderr: String::new(),
                exit_code: Some(0),
            })
        }
    }

    #[test]
    fn test_reflect_all_keeps_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..4 {
            let path = dir.path().join(format!("Bench{i}.php"));
            std::fs::write(&path, format!("<?php class Bench{i} {{}}")).unwrap();
            paths.push(path);
        }
        paths.insert(2, dir.path().join("Missing.php"));

        let reflector = Reflector::new(Launcher::new(EchoClass)).with_jobs(3);
        let results = reflector.reflect_all(&paths);

        let names: Vec<Option<String>> = results
            .iter()
            .map(|r| r.as_ref().ok().map(|h| h.top().unwrap().name.clone()))
            .collect();
        assert_eq!(
            names,
            vec![
                Some("Bench0".to_string()),
                Some("Bench1".to_string()),
                None,
                Some("Bench2".to_string()),
                Some("Bench3".to_string()),
            ]
        );
        assert!(matches!(results[2], Err(ReflectError::Io { .. })));
        assert!(results[3].as_ref().unwrap().get(0).unwrap().path.ends_with("Bench2.php"));
    }

    #[test]
    fn test_reflect_all_sequential_matches_parallel_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..3)
            .map(|i| {
                let path = dir.path().join(format!("Bench{i}.php"));
                std::fs::write(&path, format!("<?php class Bench{i} {{}}")).unwrap();
                path
            })
            .collect();

        let reflector = Reflector::new(Launcher::new(EchoClass));
        let names: Vec<String> = reflector
            .reflect_all(&paths)
            .into_iter()
            .map(|r| r.unwrap().top().unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["Bench0", "Bench1", "Bench2"]);
    }

    #[test]
    fn test_from_config() {
        let mut config = ProbeConfig::default();
        config.launcher.php_binary = "/opt/php/bin/php".to_string();
        config.launcher.timeout = "5s".to_string();
        config.reflector.jobs = 0;

        let reflector = Reflector::from_config(&config).unwrap();
        assert_eq!(
            reflector.launcher().runner().interpreter(),
            Path::new("/opt/php/bin/php")
        );
        assert_eq!(reflector.launcher().timeout(), Some(Duration::from_secs(5)));
        assert_eq!(reflector.jobs, 1);
        assert_eq!(reflector.launcher().bootstrap(), None);

        config.launcher.timeout = "soon".to_string();
        assert!(Reflector::from_config(&config).is_err());
    }

    #[test]
    fn test_from_config_resolves_paths_next_to_config_file() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("benchmarks");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(
            root.path().join(crate::config::CONFIG_FILE_NAME),
            "[launcher]\nbootstrap = \"autoload.php\"\ntemplate_dir = \"templates\"\n",
        )
        .unwrap();

        let config = ProbeConfig::discover_from(&nested).unwrap();
        let reflector = Reflector::from_config(&config).unwrap();
        assert_eq!(
            reflector.launcher().bootstrap(),
            Some(root.path().join("autoload.php").as_path())
        );
        assert_eq!(
            reflector.templates.override_dir(),
            Some(root.path().join("templates").as_path())
        );
    }
}

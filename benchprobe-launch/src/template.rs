//! Script Templates
//!
//! Templates are plain text with `{{ name }}` placeholders. Rendering is pure
//! text substitution: values are inserted verbatim, in a single pass, and a
//! placeholder without a context value is an error rather than being left
//! in the output.
//!
//! The built-in templates live in `templates/` next to this crate's manifest
//! and are compiled in. A [`TemplateSet`] can point at a directory of
//! replacements with the same file names.

use crate::error::LaunchError;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid placeholder pattern")
    })
}

/// Built-in child-process operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    /// Reflect a class and its ancestors
    Reflector,
    /// Invoke parameter providers and collect their parameter sets
    ParameterSetExtractor,
}

impl TemplateId {
    /// File name of the template asset
    pub fn file_name(self) -> &'static str {
        match self {
            TemplateId::Reflector => "reflector.template",
            TemplateId::ParameterSetExtractor => "parameter_set_extractor.template",
        }
    }

    fn builtin_body(self) -> &'static str {
        match self {
            TemplateId::Reflector => include_str!("../templates/reflector.template"),
            TemplateId::ParameterSetExtractor => {
                include_str!("../templates/parameter_set_extractor.template")
            }
        }
    }
}

/// Values substituted into a template, keyed by placeholder name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    values: BTreeMap<String, String>,
}

impl TemplateContext {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Value bound to `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether `name` is bound
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

/// A named script body
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    body: Cow<'static, str>,
}

impl Template {
    /// Template from an in-memory body
    pub fn new(name: impl Into<String>, body: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }

    /// Compiled-in template
    pub fn builtin(id: TemplateId) -> Self {
        Self::new(id.file_name(), id.builtin_body())
    }

    /// Load a template from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LaunchError> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path).map_err(|source| LaunchError::TemplateNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path.display().to_string(), body))
    }

    /// Template name (file name or path)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unrendered body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Distinct placeholder names, sorted
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = placeholder_pattern()
            .captures_iter(&self.body)
            .map(|caps| caps[1].to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Substitute every placeholder with its context value
    pub fn render(&self, context: &TemplateContext) -> Result<String, LaunchError> {
        let unbound: Vec<String> = self
            .placeholders()
            .into_iter()
            .filter(|name| !context.contains(name))
            .collect();
        if !unbound.is_empty() {
            return Err(LaunchError::UnboundPlaceholder {
                template: self.name.clone(),
                names: unbound,
            });
        }

        let rendered = placeholder_pattern().replace_all(&self.body, |caps: &Captures<'_>| {
            context.get(&caps[1]).unwrap_or_default().to_string()
        });
        Ok(rendered.into_owned())
    }
}

/// Resolves template ids to built-in bodies or to files in an override directory
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    override_dir: Option<PathBuf>,
}

impl TemplateSet {
    /// Built-in templates only
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Templates read from `dir`, one file per [`TemplateId::file_name`]
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: Some(dir.into()),
        }
    }

    /// Override directory, if any
    pub fn override_dir(&self) -> Option<&Path> {
        self.override_dir.as_deref()
    }

    /// Resolve a template
    pub fn get(&self, id: TemplateId) -> Result<Template, LaunchError> {
        match &self.override_dir {
            Some(dir) => Template::from_path(dir.join(id.file_name())),
            None => Ok(Template::builtin(id)),
        }
    }
}

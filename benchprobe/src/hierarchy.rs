//! Reflection Hierarchy
//!
//! Plain-data model of a class and its ancestors as reported by the child
//! process. Levels are stored by position, child first; nothing points back
//! from one level to another.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// A method declared on one class of the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    /// Fully-qualified name of the declaring class
    pub class: String,
    /// Method name
    pub name: String,
    /// Doc comment, empty if none
    pub comment: String,
    /// Whether the method is static
    pub is_static: bool,
}

/// One class of the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    /// Fully-qualified class name
    pub name: String,
    /// Whether the class is abstract
    pub is_abstract: bool,
    /// Doc comment, empty if none
    pub comment: String,
    /// Names of implemented interfaces
    pub interfaces: BTreeSet<String>,
    /// Source file the hierarchy was reflected from
    pub path: PathBuf,
    /// Methods declared by this class, keyed by name
    pub methods: BTreeMap<String, MethodInfo>,
}

impl ClassInfo {
    /// Class without methods or interfaces
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            is_abstract: false,
            comment: String::new(),
            interfaces: BTreeSet::new(),
            path: path.into(),
            methods: BTreeMap::new(),
        }
    }

    /// Add a method; a method with the same name is replaced
    pub fn add_method(&mut self, method: MethodInfo) {
        self.methods.insert(method.name.clone(), method);
    }

    /// Method declared on this class
    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.get(name)
    }

    /// Whether this class declares `name`
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Whether this class implements `interface`
    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.contains(interface)
    }
}

/// A class followed by its ancestors, child first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hierarchy {
    classes: Vec<ClassInfo>,
}

impl Hierarchy {
    /// Empty hierarchy
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next ancestor
    pub fn push(&mut self, class: ClassInfo) {
        self.classes.push(class);
    }

    /// The reflected class itself
    pub fn top(&self) -> Option<&ClassInfo> {
        self.classes.first()
    }

    /// Ancestors of the reflected class, nearest first
    pub fn ancestors(&self) -> &[ClassInfo] {
        self.classes.get(1..).unwrap_or_default()
    }

    /// Class at `index` (0 is the reflected class)
    pub fn get(&self, index: usize) -> Option<&ClassInfo> {
        self.classes.get(index)
    }

    /// Resolve a method the way a call would: the most derived declaration wins
    pub fn find_method(&self, name: &str) -> Option<&MethodInfo> {
        self.classes.iter().find_map(|class| class.method(name))
    }

    /// Whether any level declares `name`
    pub fn has_method(&self, name: &str) -> bool {
        self.find_method(name).is_some()
    }

    /// Whether the resolved method `name` is static
    pub fn has_static_method(&self, name: &str) -> bool {
        self.find_method(name).is_some_and(|method| method.is_static)
    }

    /// Number of levels
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether there are no levels
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Levels, child first
    pub fn iter(&self) -> std::slice::Iter<'_, ClassInfo> {
        self.classes.iter()
    }

    /// Levels as a slice, child first
    pub fn as_slice(&self) -> &[ClassInfo] {
        &self.classes
    }
}

impl FromIterator<ClassInfo> for Hierarchy {
    fn from_iter<I: IntoIterator<Item = ClassInfo>>(iter: I) -> Self {
        Self {
            classes: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Hierarchy {
    type Item = ClassInfo;
    type IntoIter = std::vec::IntoIter<ClassInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.classes.into_iter()
    }
}

impl<'a> IntoIterator for &'a Hierarchy {
    type Item = &'a ClassInfo;
    type IntoIter = std::slice::Iter<'a, ClassInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.classes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(class: &str, name: &str, is_static: bool) -> MethodInfo {
        MethodInfo {
            class: class.to_string(),
            name: name.to_string(),
            comment: String::new(),
            is_static,
        }
    }

    fn hierarchy() -> Hierarchy {
        let mut child = ClassInfo::new("Acme\\HashBench", "HashBench.php");
        child.add_method(method("Acme\\HashBench", "benchMd5", false));
        child.add_method(method("Acme\\HashBench", "setUp", false));

        let mut parent = ClassInfo::new("Acme\\BaseBench", "HashBench.php");
        parent.is_abstract = true;
        parent.add_method(method("Acme\\BaseBench", "setUp", false));
        parent.add_method(method("Acme\\BaseBench", "provideSizes", true));

        [child, parent].into_iter().collect()
    }

    #[test]
    fn test_top_and_ancestors() {
        let hierarchy = hierarchy();
        assert_eq!(hierarchy.len(), 2);
        assert_eq!(hierarchy.top().unwrap().name, "Acme\\HashBench");
        let ancestors: Vec<&str> = hierarchy.ancestors().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(ancestors, vec!["Acme\\BaseBench"]);
    }

    #[test]
    fn test_override_wins() {
        let hierarchy = hierarchy();
        assert_eq!(hierarchy.find_method("setUp").unwrap().class, "Acme\\HashBench");
        assert_eq!(
            hierarchy.find_method("provideSizes").unwrap().class,
            "Acme\\BaseBench"
        );
    }

    #[test]
    fn test_missing_method_is_none() {
        let hierarchy = hierarchy();
        assert!(hierarchy.find_method("benchSha1").is_none());
        assert!(!hierarchy.has_method("benchSha1"));
    }

    #[test]
    fn test_static_methods() {
        let hierarchy = hierarchy();
        assert!(hierarchy.has_static_method("provideSizes"));
        assert!(!hierarchy.has_static_method("setUp"));
        assert!(!hierarchy.has_static_method("missing"));
    }

    #[test]
    fn test_duplicate_method_last_write_wins() {
        let mut class = ClassInfo::new("A", "a.php");
        class.add_method(MethodInfo {
            comment: "first".to_string(),
            ..method("A", "bench", false)
        });
        class.add_method(MethodInfo {
            comment: "second".to_string(),
            ..method("A", "bench", false)
        });
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.method("bench").unwrap().comment, "second");
    }

    #[test]
    fn test_empty_hierarchy() {
        let hierarchy = Hierarchy::new();
        assert!(hierarchy.is_empty());
        assert!(hierarchy.top().is_none());
        assert!(hierarchy.ancestors().is_empty());
        assert!(hierarchy.find_method("anything").is_none());
    }
}

//! The external rename database, abstractly
//!
//! The engine does not define how mappings are stored; it only needs the
//! get / get-or-create / remove operations below at the class, member, and
//! parameter levels, plus a deep snapshot. [`MemoryMappings`] is the
//! implementation this crate ships.

use std::collections::BTreeMap;
use std::fmt;

/// An immutable address of a class member, optionally narrowed to one
/// parameter. Value-equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct MemberReference {
    pub class_name: String,
    pub name: String,
    pub descriptor: Option<String>,
    pub parameter_index: Option<u16>,
}

impl MemberReference {
    pub fn new(
        class_name: impl Into<String>,
        name: impl Into<String>,
        descriptor: Option<String>,
    ) -> MemberReference {
        MemberReference {
            class_name: class_name.into(),
            name: name.into(),
            descriptor,
            parameter_index: None,
        }
    }

    pub fn parameter(mut self, index: u16) -> MemberReference {
        self.parameter_index = Some(index);
        self
    }
}

impl fmt::Display for MemberReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class_name, self.name)?;
        if let Some(descriptor) = &self.descriptor {
            write!(f, " {}", descriptor)?;
        }
        if let Some(index) = self.parameter_index {
            write!(f, " [param {}]", index)?;
        }
        Ok(())
    }
}

/// Key of a member mapping inside its class: name plus optional descriptor
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct MemberKey {
    pub name: String,
    pub descriptor: Option<String>,
}

impl MemberKey {
    pub fn new(name: impl Into<String>, descriptor: Option<String>) -> MemberKey {
        MemberKey {
            name: name.into(),
            descriptor,
        }
    }
}

/// A field rename proposal
#[derive(Clone, Default, PartialEq, Debug)]
pub struct FieldMapping {
    pub new_name: Option<String>,
}

/// A method rename proposal with per-LVT-slot parameter names
#[derive(Clone, Default, PartialEq, Debug)]
pub struct MethodMapping {
    pub new_name: Option<String>,
    parameters: BTreeMap<u16, String>,
}

impl MethodMapping {
    pub fn parameter(&self, index: u16) -> Option<&str> {
        self.parameters.get(&index).map(String::as_str)
    }

    /// Idempotent under equal names
    pub fn set_parameter(&mut self, index: u16, name: impl Into<String>) {
        self.parameters.insert(index, name.into());
    }

    pub fn parameters(&self) -> &BTreeMap<u16, String> {
        &self.parameters
    }

    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    fn is_empty(&self) -> bool {
        self.new_name.is_none() && self.parameters.is_empty()
    }
}

/// Every rename proposal scoped to one original class
#[derive(Clone, Default, PartialEq, Debug)]
pub struct ClassMapping {
    name: String,
    new_name: Option<String>,
    fields: BTreeMap<MemberKey, FieldMapping>,
    methods: BTreeMap<MemberKey, MethodMapping>,
}

impl ClassMapping {
    /// The original (internal form) class name this mapping is keyed under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn new_name(&self) -> Option<&str> {
        self.new_name.as_deref()
    }

    pub fn set_new_name(&mut self, new_name: impl Into<String>) {
        self.new_name = Some(new_name.into());
    }

    pub fn clear_new_name(&mut self) {
        self.new_name = None;
    }

    /// Look up a field mapping, falling back to a descriptor-less entry
    pub fn field(&self, name: &str, descriptor: Option<&str>) -> Option<&FieldMapping> {
        self.fields
            .get(&MemberKey::new(name, descriptor.map(String::from)))
            .or_else(|| {
                descriptor.and_then(|_| self.fields.get(&MemberKey::new(name, None)))
            })
    }

    pub fn field_or_create(&mut self, name: &str, descriptor: Option<&str>) -> &mut FieldMapping {
        self.fields
            .entry(MemberKey::new(name, descriptor.map(String::from)))
            .or_default()
    }

    pub fn remove_field(&mut self, name: &str, descriptor: Option<&str>) {
        self.fields
            .remove(&MemberKey::new(name, descriptor.map(String::from)));
    }

    pub fn fields(&self) -> impl Iterator<Item = (&MemberKey, &FieldMapping)> {
        self.fields.iter()
    }

    /// Look up a method mapping, falling back to a descriptor-less entry
    pub fn method(&self, name: &str, descriptor: Option<&str>) -> Option<&MethodMapping> {
        self.methods
            .get(&MemberKey::new(name, descriptor.map(String::from)))
            .or_else(|| {
                descriptor.and_then(|_| self.methods.get(&MemberKey::new(name, None)))
            })
    }

    pub fn method_or_create(&mut self, name: &str, descriptor: Option<&str>) -> &mut MethodMapping {
        self.methods
            .entry(MemberKey::new(name, descriptor.map(String::from)))
            .or_default()
    }

    pub fn remove_method(&mut self, name: &str, descriptor: Option<&str>) {
        self.methods
            .remove(&MemberKey::new(name, descriptor.map(String::from)));
    }

    pub fn methods(&self) -> impl Iterator<Item = (&MemberKey, &MethodMapping)> {
        self.methods.iter()
    }

    /// True when the mapping proposes nothing at all
    pub fn is_empty(&self) -> bool {
        self.new_name.is_none()
            && self.fields.values().all(|f| f.new_name.is_none())
            && self.methods.values().all(MethodMapping::is_empty)
    }
}

/// The abstract mapping database the chain operates on
pub trait MappingsSet: Send + Sync + fmt::Debug {
    /// Names (original, internal form) of every class with a mapping
    fn class_names(&self) -> Vec<String>;

    fn class_mapping(&self, name: &str) -> Option<&ClassMapping>;

    fn class_mapping_mut(&mut self, name: &str) -> Option<&mut ClassMapping>;

    fn class_mapping_or_create(&mut self, name: &str) -> &mut ClassMapping;

    fn remove_class_mapping(&mut self, name: &str);

    /// A deep, independent copy
    fn snapshot(&self) -> Box<dyn MappingsSet>;
}

/// The in-memory mapping set
#[derive(Clone, Default, PartialEq, Debug)]
pub struct MemoryMappings {
    classes: BTreeMap<String, ClassMapping>,
}

impl MemoryMappings {
    pub fn new() -> MemoryMappings {
        MemoryMappings::default()
    }

    /// Seed a method rename; convenience for embedders and tests
    pub fn with_method(
        mut self,
        class: &str,
        method: &str,
        descriptor: Option<&str>,
        new_name: &str,
    ) -> MemoryMappings {
        self.class_mapping_or_create(class)
            .method_or_create(method, descriptor)
            .new_name = Some(new_name.to_string());
        self
    }

    /// Seed a field rename
    pub fn with_field(
        mut self,
        class: &str,
        field: &str,
        descriptor: Option<&str>,
        new_name: &str,
    ) -> MemoryMappings {
        self.class_mapping_or_create(class)
            .field_or_create(field, descriptor)
            .new_name = Some(new_name.to_string());
        self
    }

    /// Seed a parameter rename
    pub fn with_parameter(
        mut self,
        class: &str,
        method: &str,
        descriptor: Option<&str>,
        index: u16,
        new_name: &str,
    ) -> MemoryMappings {
        self.class_mapping_or_create(class)
            .method_or_create(method, descriptor)
            .set_parameter(index, new_name);
        self
    }

    /// Seed a class rename
    pub fn with_class(mut self, class: &str, new_name: &str) -> MemoryMappings {
        self.class_mapping_or_create(class)
            .set_new_name(new_name);
        self
    }
}

impl MappingsSet for MemoryMappings {
    fn class_names(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }

    fn class_mapping(&self, name: &str) -> Option<&ClassMapping> {
        self.classes.get(name)
    }

    fn class_mapping_mut(&mut self, name: &str) -> Option<&mut ClassMapping> {
        self.classes.get_mut(name)
    }

    fn class_mapping_or_create(&mut self, name: &str) -> &mut ClassMapping {
        self.classes
            .entry(name.to_string())
            .or_insert_with(|| ClassMapping {
                name: name.to_string(),
                ..ClassMapping::default()
            })
    }

    fn remove_class_mapping(&mut self, name: &str) {
        self.classes.remove(name);
    }

    fn snapshot(&self) -> Box<dyn MappingsSet> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn member_lookup_falls_back_to_descriptorless_entries() {
        let mappings = MemoryMappings::new().with_method("a/A", "go", None, "run");
        let class = mappings.class_mapping("a/A").unwrap();
        assert_eq!(
            class.method("go", Some("()V")).unwrap().new_name.as_deref(),
            Some("run")
        );
        assert!(class.method("stop", Some("()V")).is_none());
    }

    #[test]
    fn exact_descriptor_wins_over_fallback() {
        let mappings = MemoryMappings::new()
            .with_method("a/A", "go", None, "fallback")
            .with_method("a/A", "go", Some("()I"), "exact");
        let class = mappings.class_mapping("a/A").unwrap();
        assert_eq!(
            class.method("go", Some("()I")).unwrap().new_name.as_deref(),
            Some("exact")
        );
        assert_eq!(
            class.method("go", Some("()V")).unwrap().new_name.as_deref(),
            Some("fallback")
        );
    }

    #[test]
    fn snapshots_are_independent() {
        let mappings = MemoryMappings::new().with_method("a/A", "go", None, "run");
        let mut snapshot = mappings.snapshot();
        snapshot
            .class_mapping_or_create("a/A")
            .method_or_create("go", None)
            .new_name = Some("sprint".to_string());
        assert_eq!(
            mappings
                .class_mapping("a/A")
                .unwrap()
                .method("go", None)
                .unwrap()
                .new_name
                .as_deref(),
            Some("run")
        );
    }

    #[test]
    fn empty_class_mappings_report_empty() {
        let mut mappings = MemoryMappings::new();
        let class = mappings.class_mapping_or_create("a/A");
        assert!(class.is_empty());
        class.method_or_create("go", None).new_name = Some("run".to_string());
        assert!(!mappings.class_mapping("a/A").unwrap().is_empty());
    }
}

//! Scoped, mergeable mapping changes
//!
//! A change names a single target reference and knows how to apply itself to
//! a mapping set. When two changes land on the same target the registry asks
//! the existing change to merge with the incoming one; an unresolvable
//! conflict aborts the whole stage.

use super::mappings::{MappingsSet, MemberReference};
use crate::errors::{Error, Result};
use crate::hydrate::super_call_key;
use crate::model::MethodNode;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a change addresses
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum ChangeTarget {
    Class(String),
    Member(MemberReference),
}

/// Member mappings come in two namespaces
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum MemberKind {
    Field,
    Method,
}

/// Outcome of merging an existing change with an incoming one
pub enum MergeOutcome {
    KeepExisting,
    TakeIncoming,
    Merged(Box<dyn MappingsChange>),
    Conflict(String),
}

/// A single scoped mutation of a mapping set
pub trait MappingsChange: Send + Sync {
    fn target(&self) -> ChangeTarget;

    /// Human-readable form for conflict reports
    fn describe(&self) -> String;

    fn apply(&self, mappings: &mut dyn MappingsSet) -> Result<()>;

    /// Resolve a collision with another change on the same target
    fn merge_with(&self, _incoming: &dyn MappingsChange) -> MergeOutcome {
        MergeOutcome::Conflict("change is not mergeable".to_string())
    }

    fn as_any(&self) -> &dyn Any;
}

/// Add or overwrite the deobfuscated name of a class member
pub struct AddMemberMapping {
    kind: MemberKind,
    target: MemberReference,
    new_name: String,
}

impl AddMemberMapping {
    pub fn method(target: MemberReference, new_name: impl Into<String>) -> AddMemberMapping {
        AddMemberMapping {
            kind: MemberKind::Method,
            target,
            new_name: new_name.into(),
        }
    }

    pub fn field(target: MemberReference, new_name: impl Into<String>) -> AddMemberMapping {
        AddMemberMapping {
            kind: MemberKind::Field,
            target,
            new_name: new_name.into(),
        }
    }
}

impl MappingsChange for AddMemberMapping {
    fn target(&self) -> ChangeTarget {
        ChangeTarget::Member(self.target.clone())
    }

    fn describe(&self) -> String {
        format!("add mapping {} -> {}", self.target, self.new_name)
    }

    fn apply(&self, mappings: &mut dyn MappingsSet) -> Result<()> {
        let class = mappings.class_mapping_or_create(&self.target.class_name);
        let descriptor = self.target.descriptor.as_deref();
        match self.kind {
            MemberKind::Method => {
                class
                    .method_or_create(&self.target.name, descriptor)
                    .new_name = Some(self.new_name.clone());
            }
            MemberKind::Field => {
                class.field_or_create(&self.target.name, descriptor).new_name =
                    Some(self.new_name.clone());
            }
        }
        Ok(())
    }

    fn merge_with(&self, incoming: &dyn MappingsChange) -> MergeOutcome {
        match incoming.as_any().downcast_ref::<AddMemberMapping>() {
            Some(other) if other.new_name == self.new_name => MergeOutcome::KeepExisting,
            Some(other) => MergeOutcome::Conflict(format!(
                "proposed names '{}' and '{}' disagree",
                self.new_name, other.new_name
            )),
            None => MergeOutcome::Conflict("change is not mergeable".to_string()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Add or overwrite the deobfuscated name of one method parameter
pub struct AddParameterMapping {
    target: MemberReference,
    new_name: String,
}

impl AddParameterMapping {
    /// `target` must carry a parameter index
    pub fn new(target: MemberReference, new_name: impl Into<String>) -> AddParameterMapping {
        debug_assert!(target.parameter_index.is_some());
        AddParameterMapping {
            target,
            new_name: new_name.into(),
        }
    }
}

impl MappingsChange for AddParameterMapping {
    fn target(&self) -> ChangeTarget {
        ChangeTarget::Member(self.target.clone())
    }

    fn describe(&self) -> String {
        format!("add parameter mapping {} -> {}", self.target, self.new_name)
    }

    fn apply(&self, mappings: &mut dyn MappingsSet) -> Result<()> {
        let index = self
            .target
            .parameter_index
            .expect("parameter change target carries an index");
        mappings
            .class_mapping_or_create(&self.target.class_name)
            .method_or_create(&self.target.name, self.target.descriptor.as_deref())
            .set_parameter(index, self.new_name.clone());
        Ok(())
    }

    fn merge_with(&self, incoming: &dyn MappingsChange) -> MergeOutcome {
        match incoming.as_any().downcast_ref::<AddParameterMapping>() {
            Some(other) if other.new_name == self.new_name => MergeOutcome::KeepExisting,
            Some(other) => MergeOutcome::Conflict(format!(
                "proposed parameter names '{}' and '{}' disagree",
                self.new_name, other.new_name
            )),
            None => MergeOutcome::Conflict("change is not mergeable".to_string()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Remove a class or member mapping, pruning the class mapping if it ends
/// up empty
pub struct RemoveMapping {
    kind: Option<MemberKind>,
    target: ChangeTarget,
}

impl RemoveMapping {
    pub fn class(name: impl Into<String>) -> RemoveMapping {
        RemoveMapping {
            kind: None,
            target: ChangeTarget::Class(name.into()),
        }
    }

    pub fn method(target: MemberReference) -> RemoveMapping {
        RemoveMapping {
            kind: Some(MemberKind::Method),
            target: ChangeTarget::Member(target),
        }
    }

    pub fn field(target: MemberReference) -> RemoveMapping {
        RemoveMapping {
            kind: Some(MemberKind::Field),
            target: ChangeTarget::Member(target),
        }
    }
}

impl MappingsChange for RemoveMapping {
    fn target(&self) -> ChangeTarget {
        self.target.clone()
    }

    fn describe(&self) -> String {
        match &self.target {
            ChangeTarget::Class(name) => format!("remove class mapping {}", name),
            ChangeTarget::Member(member) => format!("remove mapping {}", member),
        }
    }

    fn apply(&self, mappings: &mut dyn MappingsSet) -> Result<()> {
        match &self.target {
            ChangeTarget::Class(name) => mappings.remove_class_mapping(name),
            ChangeTarget::Member(member) => {
                let mut now_empty = false;
                if let Some(class) = mappings.class_mapping_mut(&member.class_name) {
                    match self.kind {
                        Some(MemberKind::Method) => {
                            class.remove_method(&member.name, member.descriptor.as_deref())
                        }
                        Some(MemberKind::Field) | None => {
                            class.remove_field(&member.name, member.descriptor.as_deref())
                        }
                    }
                    now_empty = class.is_empty();
                }
                if now_empty {
                    mappings.remove_class_mapping(&member.class_name);
                }
            }
        }
        Ok(())
    }

    fn merge_with(&self, _incoming: &dyn MappingsChange) -> MergeOutcome {
        // Removing twice is trivially the same removal
        MergeOutcome::KeepExisting
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Copy parameter names from a super-constructor's mapping into a
/// constructor, through an LVT-index correspondence
pub struct CopyConstructorMapping {
    target: MemberReference,
    source: Arc<MethodNode>,
    /// (source parameter LVT index, target LVT index)
    correspondence: Vec<(u16, u16)>,
    /// Parameter names read off the source constructor's mapping when the
    /// change was contributed
    source_params: Vec<(u16, String)>,
}

impl CopyConstructorMapping {
    pub fn new(
        target: MemberReference,
        source: Arc<MethodNode>,
        correspondence: Vec<(u16, u16)>,
        source_params: Vec<(u16, String)>,
    ) -> CopyConstructorMapping {
        CopyConstructorMapping {
            target,
            source,
            correspondence,
            source_params,
        }
    }

    /// Walk the super-constructor chain upward from `from` looking for `to`
    fn chains_up(from: &Arc<MethodNode>, to: &Arc<MethodNode>) -> bool {
        let mut current = from.clone();
        loop {
            if Arc::ptr_eq(&current, to) {
                return true;
            }
            match current.data().get(super_call_key()) {
                Some(call) => current = call.callee.clone(),
                None => return false,
            }
        }
    }
}

impl MappingsChange for CopyConstructorMapping {
    fn target(&self) -> ChangeTarget {
        ChangeTarget::Member(self.target.clone())
    }

    fn describe(&self) -> String {
        format!(
            "copy constructor parameters from {:?} into {}",
            self.source, self.target
        )
    }

    fn apply(&self, mappings: &mut dyn MappingsSet) -> Result<()> {
        if self.source_params.is_empty() {
            return Ok(());
        }
        let method = mappings
            .class_mapping_or_create(&self.target.class_name)
            .method_or_create(&self.target.name, self.target.descriptor.as_deref());
        for &(source_slot, target_slot) in &self.correspondence {
            if let Some((_, name)) = self
                .source_params
                .iter()
                .find(|(slot, _)| *slot == source_slot)
            {
                method.set_parameter(target_slot, name.clone());
            }
        }
        Ok(())
    }

    fn merge_with(&self, incoming: &dyn MappingsChange) -> MergeOutcome {
        let other = match incoming.as_any().downcast_ref::<CopyConstructorMapping>() {
            Some(other) => other,
            None => return MergeOutcome::Conflict("change is not mergeable".to_string()),
        };
        if Arc::ptr_eq(&self.source, &other.source) {
            return MergeOutcome::KeepExisting;
        }
        // Prefer the change sourced higher in the super-constructor chain
        if Self::chains_up(&other.source, &self.source) {
            return MergeOutcome::KeepExisting;
        }
        if Self::chains_up(&self.source, &other.source) {
            return MergeOutcome::TakeIncoming;
        }
        // Unrelated chains: prefer the only side that actually carries names
        match (self.source_params.is_empty(), other.source_params.is_empty()) {
            (false, true) => MergeOutcome::KeepExisting,
            (true, false) => MergeOutcome::TakeIncoming,
            _ => MergeOutcome::Conflict(format!(
                "source constructors {:?} and {:?} are in divergent super-chains",
                self.source, other.source
            )),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Copy parameter names from a functional-interface method into a lambda
/// body at fixed offsets
pub struct CopyLambdaParameterMapping {
    target: MemberReference,
    /// (target LVT index, name)
    names: Vec<(u16, String)>,
}

impl CopyLambdaParameterMapping {
    pub fn new(target: MemberReference, names: Vec<(u16, String)>) -> CopyLambdaParameterMapping {
        CopyLambdaParameterMapping { target, names }
    }
}

impl MappingsChange for CopyLambdaParameterMapping {
    fn target(&self) -> ChangeTarget {
        ChangeTarget::Member(self.target.clone())
    }

    fn describe(&self) -> String {
        format!("copy {} lambda parameter name(s) into {}", self.names.len(), self.target)
    }

    fn apply(&self, mappings: &mut dyn MappingsSet) -> Result<()> {
        if self.names.is_empty() {
            return Ok(());
        }
        let method = mappings
            .class_mapping_or_create(&self.target.class_name)
            .method_or_create(&self.target.name, self.target.descriptor.as_deref());
        for (slot, name) in &self.names {
            method.set_parameter(*slot, name.clone());
        }
        Ok(())
    }

    fn merge_with(&self, incoming: &dyn MappingsChange) -> MergeOutcome {
        match incoming.as_any().downcast_ref::<CopyLambdaParameterMapping>() {
            // The change carrying more names wins
            Some(other) if other.names.len() > self.names.len() => MergeOutcome::TakeIncoming,
            Some(_) => MergeOutcome::KeepExisting,
            None => MergeOutcome::Conflict("change is not mergeable".to_string()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Collects submitted changes keyed by target, merging collisions
#[derive(Default)]
pub struct ChangeRegistry {
    changes: Mutex<BTreeMap<ChangeTarget, Box<dyn MappingsChange>>>,
}

impl ChangeRegistry {
    pub fn new() -> ChangeRegistry {
        ChangeRegistry::default()
    }

    /// Submit one change. A collision on the target invokes the merge
    /// protocol; an unresolvable conflict is an error that aborts the stage.
    pub fn submit(&self, change: Box<dyn MappingsChange>) -> Result<()> {
        let mut changes = self.changes.lock();
        let target = change.target();
        let merge = changes
            .get(&target)
            .map(|existing| (existing.merge_with(&*change), existing.describe()));
        match merge {
            None => {
                changes.insert(target, change);
            }
            Some((MergeOutcome::KeepExisting, _)) => {}
            Some((MergeOutcome::TakeIncoming, _)) => {
                changes.insert(target, change);
            }
            Some((MergeOutcome::Merged(merged), _)) => {
                changes.insert(target, merged);
            }
            Some((MergeOutcome::Conflict(reason), left)) => {
                return Err(Error::MergeConflict {
                    left,
                    right: change.describe(),
                    reason,
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.changes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.lock().is_empty()
    }

    /// Drain the registry in deterministic target order
    pub fn into_changes(self) -> Vec<Box<dyn MappingsChange>> {
        self.changes.into_inner().into_values().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chain::mappings::MemoryMappings;

    fn member(name: &str) -> MemberReference {
        MemberReference::new("a/A", name, Some("()V".to_string()))
    }

    #[test]
    fn equal_add_changes_merge() {
        let registry = ChangeRegistry::new();
        registry
            .submit(Box::new(AddMemberMapping::method(member("go"), "run")))
            .unwrap();
        registry
            .submit(Box::new(AddMemberMapping::method(member("go"), "run")))
            .unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn conflicting_add_changes_fail() {
        let registry = ChangeRegistry::new();
        registry
            .submit(Box::new(AddMemberMapping::method(member("go"), "run")))
            .unwrap();
        let err = registry
            .submit(Box::new(AddMemberMapping::method(member("go"), "walk")))
            .unwrap_err();
        assert!(matches!(err, Error::MergeConflict { .. }));
    }

    #[test]
    fn remove_changes_always_merge() {
        let registry = ChangeRegistry::new();
        registry
            .submit(Box::new(RemoveMapping::method(member("go"))))
            .unwrap();
        registry
            .submit(Box::new(RemoveMapping::method(member("go"))))
            .unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_prunes_empty_class_mappings() {
        let mappings = MemoryMappings::new().with_method("a/A", "go", Some("()V"), "run");
        let mut snapshot = mappings.snapshot();
        RemoveMapping::method(member("go"))
            .apply(&mut *snapshot)
            .unwrap();
        assert!(snapshot.class_mapping("a/A").is_none());
    }

    #[test]
    fn lambda_copies_prefer_more_names() {
        let registry = ChangeRegistry::new();
        registry
            .submit(Box::new(CopyLambdaParameterMapping::new(
                member("lambda$go$0"),
                vec![(1, "x".to_string())],
            )))
            .unwrap();
        registry
            .submit(Box::new(CopyLambdaParameterMapping::new(
                member("lambda$go$0"),
                vec![(1, "x".to_string()), (2, "y".to_string())],
            )))
            .unwrap();
        let changes = registry.into_changes();
        assert_eq!(changes.len(), 1);
        let mut mappings: Box<dyn MappingsSet> = Box::new(MemoryMappings::new());
        changes[0].apply(&mut *mappings).unwrap();
        let class = mappings.class_mapping("a/A").unwrap();
        let method = class.method("lambda$go$0", Some("()V")).unwrap();
        assert_eq!(method.parameter(2), Some("y"));
    }
}

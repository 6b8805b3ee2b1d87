//! Mapping completion: the change chain
//!
//! A chain is an ordered list of [`ChangeContributor`]s. Each stage iterates
//! the union of class mappings and class nodes, collects the submitted
//! changes in a merge-resolving registry, applies them to a fresh copy of
//! the mapping set, and hands the result to the next stage. Stage listeners
//! observe every intermediate snapshot.

mod changes;
mod contributors;
mod mappings;

pub use changes::{
    AddMemberMapping, AddParameterMapping, ChangeRegistry, ChangeTarget, CopyConstructorMapping,
    CopyLambdaParameterMapping, MappingsChange, MemberKind, MergeOutcome, RemoveMapping,
};
pub use contributors::{
    ChainContext, ChangeContributor, CompositeContributor, CopyConstructorParametersDown,
    CopyLambdaParametersDown, CopyMappingsDown, CopyRecordParameters, PropagateMappingsUp,
    RemoveUnusedMappings,
};
pub use mappings::{
    ClassMapping, FieldMapping, MappingsSet, MemberKey, MemberReference, MemoryMappings,
    MethodMapping,
};

use crate::errors::Result;
use crate::provider::ClassDataProvider;
use std::collections::HashSet;

/// Observes the snapshot produced by each chain stage
pub type StageListener = Box<dyn Fn(&str, &dyn MappingsSet) + Send + Sync>;

/// The driver: contributors applied in order, each over a fresh snapshot
#[derive(Default)]
pub struct ChangeChain {
    contributors: Vec<Box<dyn ChangeContributor>>,
    listeners: Vec<StageListener>,
}

impl ChangeChain {
    pub fn new() -> ChangeChain {
        ChangeChain::default()
    }

    pub fn push(&mut self, contributor: Box<dyn ChangeContributor>) -> &mut ChangeChain {
        self.contributors.push(contributor);
        self
    }

    /// Register a listener invoked with each stage's name and result
    pub fn add_listener(&mut self, listener: StageListener) -> &mut ChangeChain {
        self.listeners.push(listener);
        self
    }

    /// Run every contributor against `mappings` and the hydrated graph in
    /// `provider`, returning the final snapshot
    pub fn apply(
        &self,
        mappings: &dyn MappingsSet,
        provider: &ClassDataProvider,
    ) -> Result<Box<dyn MappingsSet>> {
        let mut current = mappings.snapshot();
        for contributor in &self.contributors {
            log::debug!("running change contributor '{}'", contributor.name());
            let registry = ChangeRegistry::new();
            self.run_stage(contributor.as_ref(), &*current, provider, &registry)?;

            let changes = registry.into_changes();
            log::debug!(
                "contributor '{}' produced {} change(s)",
                contributor.name(),
                changes.len()
            );
            let mut next = current.snapshot();
            for change in &changes {
                change.apply(&mut *next)?;
            }
            for listener in &self.listeners {
                listener(contributor.name(), &*next);
            }
            current = next;
        }
        Ok(current)
    }

    /// Call the contributor for the union of class mappings and class nodes
    fn run_stage(
        &self,
        contributor: &dyn ChangeContributor,
        current: &dyn MappingsSet,
        provider: &ClassDataProvider,
        registry: &ChangeRegistry,
    ) -> Result<()> {
        let cx = ChainContext {
            provider,
            mappings: current,
        };
        let mut covered: HashSet<String> = HashSet::new();
        for name in current.class_names() {
            let class = provider.find(&name)?;
            covered.insert(name.clone());
            contributor.contribute(
                class.as_ref(),
                current.class_mapping(&name),
                &cx,
                registry,
            )?;
        }
        for class in provider.stream_all() {
            let class = class?;
            if covered.contains(class.name()) {
                continue;
            }
            contributor.contribute(Some(&class), None, &cx, registry)?;
        }
        Ok(())
    }
}

//! Hydration: cross-class enrichment of the semantic graph
//!
//! The base hydrator inverts the inheritance and nesting hierarchy and links
//! the override relation. Registered [`HydrationProvider`]s then run in
//! dependency-ordered waves, each wave parallel over classes, writing their
//! results into the attached-data bags.

mod base;
mod bridge;
mod ctor;
mod lambda;
mod stack;

pub use base::hydrate_base;
pub use bridge::{bridge_sources_key, bridge_target_key, BridgeTargets};
pub use ctor::{super_call_key, super_callers_key, ConstructorCall, SuperConstructorCalls};
pub use lambda::{lambda_closure_key, lambdas_key, LambdaClosure, LambdaClosures};

use crate::errors::{Error, Result};
use crate::model::{ClassNode, FieldNode, KeyId, MethodNode};
use crate::provider::ClassDataProvider;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Which node family a provider runs against
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum HydrationTarget {
    Classes,
    Methods,
    Fields,
}

/// What a provider sees while hydrating one node
pub struct HydrationContext<'a> {
    pub provider: &'a ClassDataProvider,
}

/// A named enrichment step
///
/// Providers declare the attribute keys they produce and consume; the
/// manager orders execution so every producer of a consumed key has already
/// run. Providers must be safe to invoke concurrently on *different* nodes;
/// they may read attached data anywhere but should only write to the node
/// they were invoked on (or through [`AttachedData::update`], which
/// serializes per node).
///
/// [`AttachedData::update`]: crate::model::AttachedData::update
pub trait HydrationProvider: Send + Sync {
    fn name(&self) -> &str;

    fn target(&self) -> HydrationTarget;

    /// Keys this provider attaches
    fn produces(&self) -> Vec<KeyId> {
        vec![]
    }

    /// Keys this provider reads from earlier providers
    fn consumes(&self) -> Vec<KeyId> {
        vec![]
    }

    fn hydrate_class(&self, _class: &Arc<ClassNode>, _cx: &HydrationContext<'_>) -> Result<()> {
        Ok(())
    }

    fn hydrate_method(&self, _method: &Arc<MethodNode>, _cx: &HydrationContext<'_>) -> Result<()> {
        Ok(())
    }

    fn hydrate_field(&self, _field: &Arc<FieldNode>, _cx: &HydrationContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Runs base hydration and the registered providers in topological waves
pub struct HydrationManager {
    providers: Vec<Arc<dyn HydrationProvider>>,
    parallelism: Option<usize>,
}

impl Default for HydrationManager {
    fn default() -> Self {
        HydrationManager::new()
    }
}

impl HydrationManager {
    /// A manager with no enrichment providers: only base hydration runs
    pub fn new() -> HydrationManager {
        HydrationManager {
            providers: vec![],
            parallelism: None,
        }
    }

    /// A manager with the standard providers (bridge targets,
    /// super-constructor calls, lambda closures) registered
    pub fn standard() -> HydrationManager {
        let mut manager = HydrationManager::new();
        manager.register(Arc::new(BridgeTargets));
        manager.register(Arc::new(SuperConstructorCalls));
        manager.register(Arc::new(LambdaClosures));
        manager
    }

    /// Fix the worker-pool width; 1 runs everything serially
    pub fn with_parallelism(mut self, threads: usize) -> HydrationManager {
        self.parallelism = Some(threads);
        self
    }

    pub fn register(&mut self, provider: Arc<dyn HydrationProvider>) {
        self.providers.push(provider);
    }

    /// Hydrate every class reachable from the provider's standard roots
    pub fn hydrate(&self, provider: &ClassDataProvider) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallelism.unwrap_or(0))
            .build()
            .map_err(|err| {
                Error::Io(std::io::Error::new(std::io::ErrorKind::Other, err))
            })?;
        pool.install(|| self.hydrate_inner(provider))
    }

    fn hydrate_inner(&self, provider: &ClassDataProvider) -> Result<()> {
        let classes = provider.all_classes()?;
        log::debug!("hydrating {} classes", classes.len());
        hydrate_base(&classes)?;

        let waves = self.schedule()?;
        let cx = HydrationContext { provider };
        for wave in waves {
            log::debug!(
                "running hydration wave: {}",
                wave.iter()
                    .map(|p| p.name().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            // Collecting every result first lets all in-flight tasks in the
            // wave finish before an error propagates.
            let results: Vec<Result<()>> = classes
                .par_iter()
                .map(|class| run_wave(class, &wave, &cx))
                .collect();
            for result in results {
                result?;
            }
        }
        Ok(())
    }

    /// Order providers into waves by their produces/consumes declarations
    fn schedule(&self) -> Result<Vec<Vec<Arc<dyn HydrationProvider>>>> {
        let count = self.providers.len();
        let mut producers_of: HashMap<KeyId, Vec<usize>> = HashMap::new();
        for (index, provider) in self.providers.iter().enumerate() {
            for key in provider.produces() {
                producers_of.entry(key).or_default().push(index);
            }
        }

        let mut consumers: Vec<Vec<usize>> = vec![vec![]; count];
        let mut indegree = vec![0usize; count];
        for (index, provider) in self.providers.iter().enumerate() {
            for key in provider.consumes() {
                match producers_of.get(&key) {
                    Some(producers) => {
                        for &producer in producers {
                            if producer != index {
                                consumers[producer].push(index);
                                indegree[index] += 1;
                            }
                        }
                    }
                    None => log::warn!(
                        "hydration provider '{}' consumes a key nothing produces; \
                         scheduling it as if in the first wave",
                        provider.name()
                    ),
                }
            }
        }

        let mut done = vec![false; count];
        let mut remaining = count;
        let mut waves = vec![];
        while remaining > 0 {
            let wave: Vec<usize> = (0..count)
                .filter(|&i| !done[i] && indegree[i] == 0)
                .collect();
            if wave.is_empty() {
                let cycle = (0..count)
                    .filter(|&i| !done[i])
                    .map(|i| self.providers[i].name().to_string())
                    .collect();
                return Err(Error::DependencyCycle(cycle));
            }
            for &index in &wave {
                done[index] = true;
                remaining -= 1;
                for &consumer in &consumers[index] {
                    indegree[consumer] -= 1;
                }
            }
            waves.push(wave.into_iter().map(|i| self.providers[i].clone()).collect());
        }
        Ok(waves)
    }
}

fn run_wave(
    class: &Arc<ClassNode>,
    wave: &[Arc<dyn HydrationProvider>],
    cx: &HydrationContext<'_>,
) -> Result<()> {
    for provider in wave {
        match provider.target() {
            HydrationTarget::Classes => provider.hydrate_class(class, cx)?,
            HydrationTarget::Methods => {
                for method in class.methods() {
                    provider.hydrate_method(method, cx)?;
                }
            }
            HydrationTarget::Fields => {
                for field in class.fields() {
                    provider.hydrate_field(field, cx)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::Key;
    use std::sync::OnceLock;

    struct Dummy {
        name: &'static str,
        produces: Vec<KeyId>,
        consumes: Vec<KeyId>,
    }

    impl HydrationProvider for Dummy {
        fn name(&self) -> &str {
            self.name
        }
        fn target(&self) -> HydrationTarget {
            HydrationTarget::Classes
        }
        fn produces(&self) -> Vec<KeyId> {
            self.produces.clone()
        }
        fn consumes(&self) -> Vec<KeyId> {
            self.consumes.clone()
        }
    }

    fn key(slot: usize) -> KeyId {
        static KEYS: OnceLock<Vec<Key<()>>> = OnceLock::new();
        KEYS.get_or_init(|| (0..8).map(|_| Key::new("test")).collect())[slot].id()
    }

    fn names(waves: &[Vec<Arc<dyn HydrationProvider>>]) -> Vec<Vec<String>> {
        waves
            .iter()
            .map(|wave| wave.iter().map(|p| p.name().to_string()).collect())
            .collect()
    }

    #[test]
    fn providers_order_into_waves() {
        let mut manager = HydrationManager::new();
        manager.register(Arc::new(Dummy {
            name: "late",
            produces: vec![],
            consumes: vec![key(0)],
        }));
        manager.register(Arc::new(Dummy {
            name: "early",
            produces: vec![key(0)],
            consumes: vec![],
        }));
        let waves = manager.schedule().unwrap();
        assert_eq!(
            names(&waves),
            vec![vec!["early".to_string()], vec!["late".to_string()]]
        );
    }

    #[test]
    fn missing_producer_runs_in_first_wave() {
        let mut manager = HydrationManager::new();
        manager.register(Arc::new(Dummy {
            name: "orphan",
            produces: vec![],
            consumes: vec![key(7)],
        }));
        let waves = manager.schedule().unwrap();
        assert_eq!(names(&waves), vec![vec!["orphan".to_string()]]);
    }

    #[test]
    fn cycles_are_a_configuration_error() {
        let mut manager = HydrationManager::new();
        manager.register(Arc::new(Dummy {
            name: "a",
            produces: vec![key(1)],
            consumes: vec![key(2)],
        }));
        manager.register(Arc::new(Dummy {
            name: "b",
            produces: vec![key(2)],
            consumes: vec![key(1)],
        }));
        assert!(matches!(
            manager.schedule(),
            Err(Error::DependencyCycle(_))
        ));
    }
}

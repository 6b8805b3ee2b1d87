//! The class-data provider
//!
//! Maps class names to graph nodes with a strict identity contract: once a
//! provider has produced a node for a name, every later request — direct or
//! through enumeration — returns that same `Arc`. Misses are cached too, so
//! repeated lookups of absent classes stay cheap.

mod roots;
mod system;

pub use roots::{
    close_all, ArchiveRoot, ClassEntry, ClassProviderRoot, DirectoryRoot, MemoryRoot, StackedRoot,
};
pub use system::SystemRoot;

use crate::class_file::ClassFileDecoder;
use crate::errors::Result;
use crate::model::ClassNode;
use crate::types::TypeDescriptor;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Normalize a class name to the cache key form: slash separators, no
/// leading `/`, no trailing `.class`
pub fn normalize_class_name(name: &str) -> String {
    let name = name.strip_prefix('/').unwrap_or(name);
    let name = name.strip_suffix(".class").unwrap_or(name);
    name.replace('.', "/")
}

pub(crate) struct ProviderCore {
    roots: Vec<Box<dyn ClassProviderRoot>>,
    context_roots: Vec<Box<dyn ClassProviderRoot>>,
    decoder: Arc<dyn ClassFileDecoder>,
    strict: bool,
    self_ref: Weak<ProviderCore>,
    cache: RwLock<HashMap<String, Option<Arc<ClassNode>>>>,
    closed: AtomicBool,
}

impl ProviderCore {
    pub(crate) fn strict(&self) -> bool {
        self.strict
    }

    /// Cached lookup by already- or not-yet-normalized name
    pub(crate) fn find_class(&self, name: &str) -> Result<Option<Arc<ClassNode>>> {
        let name = normalize_class_name(name);
        if let Some(cached) = self.cache.read().get(&name) {
            return Ok(cached.clone());
        }
        let loaded = self.load(&name)?;
        let mut cache = self.cache.write();
        // A racing thread may have installed a node first; its instance wins
        // so the identity contract holds.
        let entry = cache.entry(name).or_insert(loaded);
        Ok(entry.clone())
    }

    fn load(&self, name: &str) -> Result<Option<Arc<ClassNode>>> {
        let entry = format!("{}.class", name);
        for root in self.roots.iter().chain(self.context_roots.iter()) {
            if let Some(bytes) = root.class_bytes(&entry)? {
                let file = self.decoder.decode(&bytes)?;
                return Ok(Some(ClassNode::new(self.self_ref.clone(), file)));
            }
        }
        log::debug!("class {} not found in any root", name);
        Ok(None)
    }
}

/// Builder for [`ClassDataProvider`]
pub struct ClassDataProviderBuilder {
    roots: Vec<Box<dyn ClassProviderRoot>>,
    context_roots: Vec<Box<dyn ClassProviderRoot>>,
    decoder: Arc<dyn ClassFileDecoder>,
    strict: bool,
}

impl ClassDataProviderBuilder {
    /// Add a standard root: its classes are the corpus under analysis
    pub fn root(mut self, root: Box<dyn ClassProviderRoot>) -> Self {
        self.roots.push(root);
        self
    }

    /// Add a context root: its classes resolve on demand but are not
    /// enumerated or hydrated
    pub fn context_root(mut self, root: Box<dyn ClassProviderRoot>) -> Self {
        self.context_roots.push(root);
        self
    }

    /// Treat a missing superclass or interface as a hard error
    pub fn classpath_complete(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn build(self) -> ClassDataProvider {
        let core = Arc::new_cyclic(|self_ref| ProviderCore {
            roots: self.roots,
            context_roots: self.context_roots,
            decoder: self.decoder,
            strict: self.strict,
            self_ref: self_ref.clone(),
            cache: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });
        ClassDataProvider { core }
    }
}

/// The addressable, caching source of class nodes
///
/// Scoped: construction takes ownership of the roots' handles and
/// [`close`](ClassDataProvider::close) (or drop) releases them.
pub struct ClassDataProvider {
    core: Arc<ProviderCore>,
}

impl ClassDataProvider {
    pub fn builder(decoder: Arc<dyn ClassFileDecoder>) -> ClassDataProviderBuilder {
        ClassDataProviderBuilder {
            roots: vec![],
            context_roots: vec![],
            decoder,
            strict: false,
        }
    }

    /// Look up a class by internal name (dotted names and `.class` suffixes
    /// are normalized away). `Ok(None)` means definitively absent.
    pub fn find(&self, name: &str) -> Result<Option<Arc<ClassNode>>> {
        self.core.find_class(name)
    }

    /// Look up the class named by a descriptor; non-class descriptors
    /// resolve to nothing
    pub fn find_by_type(&self, descriptor: &TypeDescriptor) -> Result<Option<Arc<ClassNode>>> {
        match descriptor.class_name() {
            Some(name) => self.find(name),
            None => Ok(None),
        }
    }

    /// Lazily enumerate every class reachable from the standard roots
    ///
    /// Enumeration populates the cache, so a later [`find`] of an enumerated
    /// name returns the same instance.
    ///
    /// [`find`]: ClassDataProvider::find
    pub fn stream_all(&self) -> ClassStream<'_> {
        ClassStream {
            provider: self,
            pending: VecDeque::new(),
            next_root: 0,
            seen: HashSet::new(),
            done: false,
        }
    }

    /// Eagerly collected variant of [`stream_all`](ClassDataProvider::stream_all)
    pub fn all_classes(&self) -> Result<Vec<Arc<ClassNode>>> {
        self.stream_all().collect()
    }

    /// The standard roots, for reuse by collaborators
    pub fn roots(&self) -> &[Box<dyn ClassProviderRoot>] {
        &self.core.roots
    }

    pub fn context_roots(&self) -> &[Box<dyn ClassProviderRoot>] {
        &self.core.context_roots
    }

    /// Release every root, accumulating all close failures
    pub fn close(&self) -> Result<()> {
        if self.core.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut failures = vec![];
        for result in [
            close_all(&self.core.roots),
            close_all(&self.core.context_roots),
        ] {
            if let Err(crate::errors::Error::CloseFailure(mut errors)) = result {
                failures.append(&mut errors);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(crate::errors::Error::CloseFailure(failures))
        }
    }
}

impl Drop for ClassDataProvider {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("failed to close class provider roots: {}", err);
        }
    }
}

/// Iterator over every class in the standard roots
pub struct ClassStream<'p> {
    provider: &'p ClassDataProvider,
    pending: VecDeque<String>,
    next_root: usize,
    seen: HashSet<String>,
    done: bool,
}

impl Iterator for ClassStream<'_> {
    type Item = Result<Arc<ClassNode>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(entry) = self.pending.pop_front() {
                let name = normalize_class_name(&entry);
                if name.ends_with("module-info") || !self.seen.insert(name.clone()) {
                    continue;
                }
                match self.provider.find(&name) {
                    Ok(Some(node)) => return Some(Ok(node)),
                    // The entry was enumerated but has since become
                    // unreadable; skip it.
                    Ok(None) => continue,
                    Err(err) => {
                        self.done = true;
                        return Some(Err(err));
                    }
                }
            }
            let root = match self.provider.core.roots.get(self.next_root) {
                Some(root) => root,
                None => {
                    self.done = true;
                    return None;
                }
            };
            self.next_root += 1;
            match root.entries() {
                Ok(entries) => {
                    self.pending
                        .extend(entries.into_iter().map(|e| e.name().to_string()));
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::access_flags::ClassAccessFlags;
    use crate::class_file::{ClassFileData, ClassFileDecoder};

    /// Decodes the byte blob as a UTF-8 class name and synthesizes an empty
    /// public class of that name
    struct NameDecoder;

    impl ClassFileDecoder for NameDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<ClassFileData> {
            let name = std::str::from_utf8(bytes).expect("test bytes are UTF-8");
            Ok(ClassFileData::new(name, ClassAccessFlags::PUBLIC))
        }
    }

    fn provider_over(names: &[&str]) -> ClassDataProvider {
        let mut root = MemoryRoot::new();
        for name in names {
            root.insert(*name, name.as_bytes().to_vec());
        }
        ClassDataProvider::builder(Arc::new(NameDecoder))
            .root(Box::new(root))
            .build()
    }

    #[test]
    fn name_normalization() {
        assert_eq!(normalize_class_name("java.lang.String"), "java/lang/String");
        assert_eq!(
            normalize_class_name("/com/example/Foo.class"),
            "com/example/Foo"
        );
        assert_eq!(normalize_class_name("com/example/Foo"), "com/example/Foo");
    }

    #[test]
    fn find_returns_one_instance_per_name() {
        let provider = provider_over(&["com/example/Foo"]);
        let a = provider.find("com/example/Foo").unwrap().unwrap();
        let b = provider.find("com.example.Foo").unwrap().unwrap();
        let c = provider.find("/com/example/Foo.class").unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn negative_lookups_are_cached() {
        let provider = provider_over(&["com/example/Foo"]);
        assert!(provider.find("com/example/Missing").unwrap().is_none());
        assert!(provider
            .core
            .cache
            .read()
            .get("com/example/Missing")
            .is_some());
        assert!(provider.find("com/example/Missing").unwrap().is_none());
    }

    #[test]
    fn enumeration_and_find_share_instances() {
        let provider = provider_over(&["a/A", "a/B", "b/C"]);
        let streamed = provider.all_classes().unwrap();
        assert_eq!(streamed.len(), 3);
        for node in &streamed {
            let found = provider.find(node.name()).unwrap().unwrap();
            assert!(Arc::ptr_eq(node, &found));
        }
    }

    #[test]
    fn strict_mode_raises_on_missing_superclasses() {
        let mut root = MemoryRoot::new();
        root.insert("a/A", b"a/A".to_vec());
        let provider = ClassDataProvider::builder(Arc::new(NameDecoder))
            .root(Box::new(root))
            .classpath_complete(true)
            .build();
        let class = provider.find("a/A").unwrap().unwrap();
        // java/lang/Object is not on the classpath
        assert!(matches!(
            class.superclass(),
            Err(crate::errors::Error::ClasspathIncomplete { .. })
        ));

        let mut root = MemoryRoot::new();
        root.insert("a/A", b"a/A".to_vec());
        let lenient = ClassDataProvider::builder(Arc::new(NameDecoder))
            .root(Box::new(root))
            .build();
        let class = lenient.find("a/A").unwrap().unwrap();
        assert!(class.superclass().unwrap().is_none());
    }

    #[test]
    fn find_by_type_requires_a_class_descriptor() {
        let provider = provider_over(&["com/example/Foo"]);
        let class = TypeDescriptor::parse("Lcom/example/Foo;").unwrap();
        assert!(provider.find_by_type(&class).unwrap().is_some());
        let primitive = TypeDescriptor::parse("I").unwrap();
        assert!(provider.find_by_type(&primitive).unwrap().is_none());
        let array = TypeDescriptor::parse("[Lcom/example/Foo;").unwrap();
        assert!(provider.find_by_type(&array).unwrap().is_none());
    }
}

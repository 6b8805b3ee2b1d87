//! Class nodes of the semantic graph

use super::attach::AttachedData;
use super::{FieldNode, MethodNode};
use crate::access_flags::{ClassAccessFlags, ClassKinds, InnerClassAccessFlags, Visibility};
use crate::class_file::ClassFileData;
use crate::errors::{Error, Result};
use crate::provider::ProviderCore;
use crate::types::ClassSignature;
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

/// One class of the corpus
///
/// Nodes are created by their provider, cached for its lifetime, and frozen
/// in structure. Only the subclass and inner-class sets, the per-method
/// override links, and the attached-data bag mutate after construction, and
/// only during hydration.
///
/// Accessors that resolve other classes (superclass, interfaces, enclosing
/// class) are lazy and memoized; under contention two threads may resolve
/// concurrently but the provider's identity cache guarantees they observe
/// the same node.
pub struct ClassNode {
    provider: Weak<ProviderCore>,
    file: ClassFileData,
    self_ref: Weak<ClassNode>,

    superclass: OnceLock<Option<Arc<ClassNode>>>,
    interfaces: OnceLock<Vec<Arc<ClassNode>>>,
    enclosing: OnceLock<Option<Arc<ClassNode>>>,
    permitted: OnceLock<Option<Vec<Arc<ClassNode>>>>,
    fields: OnceLock<Vec<Arc<FieldNode>>>,
    methods: OnceLock<Vec<Arc<MethodNode>>>,
    components: OnceLock<Option<Vec<RecordComponent>>>,
    static_inner: OnceLock<bool>,
    signature: OnceLock<Option<Arc<ClassSignature>>>,

    subclasses: RwLock<Vec<Arc<ClassNode>>>,
    inner_classes: RwLock<Vec<Arc<ClassNode>>>,
    attached: AttachedData,
}

impl ClassNode {
    pub(crate) fn new(provider: Weak<ProviderCore>, file: ClassFileData) -> Arc<ClassNode> {
        Arc::new_cyclic(|self_ref| ClassNode {
            provider,
            file,
            self_ref: self_ref.clone(),
            superclass: OnceLock::new(),
            interfaces: OnceLock::new(),
            enclosing: OnceLock::new(),
            permitted: OnceLock::new(),
            fields: OnceLock::new(),
            methods: OnceLock::new(),
            components: OnceLock::new(),
            static_inner: OnceLock::new(),
            signature: OnceLock::new(),
            subclasses: RwLock::new(vec![]),
            inner_classes: RwLock::new(vec![]),
            attached: AttachedData::new(),
        })
    }

    /// Internal (slash) name
    pub fn name(&self) -> &str {
        &self.file.name
    }

    /// The package prefix of the internal name, empty for the default package
    pub fn package(&self) -> &str {
        self.file.name.rsplit_once('/').map(|(p, _)| p).unwrap_or("")
    }

    pub fn access_flags(&self) -> ClassAccessFlags {
        self.file.access_flags
    }

    pub fn kinds(&self) -> ClassKinds {
        ClassKinds::from_flags(self.file.access_flags, self.is_record())
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::from_bits(self.file.access_flags.bits())
    }

    pub fn is_interface(&self) -> bool {
        self.file.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn is_record(&self) -> bool {
        self.file.record_components.is_some()
    }

    pub fn is_final(&self) -> bool {
        self.file.access_flags.contains(ClassAccessFlags::FINAL)
    }

    pub fn is_synthetic(&self) -> bool {
        self.file.access_flags.contains(ClassAccessFlags::SYNTHETIC)
    }

    pub fn is_sealed(&self) -> bool {
        self.file.permitted_subclasses.is_some()
    }

    /// Superclass, resolved through the provider
    ///
    /// `Ok(None)` for `java/lang/Object` and, in lenient mode, for a
    /// superclass missing from the classpath.
    pub fn superclass(&self) -> Result<Option<Arc<ClassNode>>> {
        if let Some(cached) = self.superclass.get() {
            return Ok(cached.clone());
        }
        let resolved = match &self.file.superclass {
            None => None,
            Some(name) => self.resolve_required(name)?,
        };
        Ok(self.superclass.get_or_init(|| resolved).clone())
    }

    pub fn superclass_name(&self) -> Option<&str> {
        self.file.superclass.as_deref()
    }

    /// Raw interface names as declared in the class file
    pub fn interface_names(&self) -> &[String] {
        &self.file.interfaces
    }

    /// Directly implemented (or extended, for interfaces) interfaces
    pub fn interfaces(&self) -> Result<Vec<Arc<ClassNode>>> {
        if let Some(cached) = self.interfaces.get() {
            return Ok(cached.clone());
        }
        let mut resolved = Vec::with_capacity(self.file.interfaces.len());
        for name in &self.file.interfaces {
            if let Some(interface) = self.resolve_required(name)? {
                resolved.push(interface);
            }
        }
        Ok(self.interfaces.get_or_init(|| resolved).clone())
    }

    /// The immediately enclosing class
    ///
    /// Resolves the `EnclosingMethod` attribute first, falling back to the
    /// `InnerClasses` entry whose inner name matches this class.
    pub fn enclosing_class(&self) -> Result<Option<Arc<ClassNode>>> {
        if let Some(cached) = self.enclosing.get() {
            return Ok(cached.clone());
        }
        let name = match &self.file.enclosing {
            Some(enclosing) => Some(enclosing.class.clone()),
            None => self
                .file
                .own_inner_entry()
                .and_then(|entry| entry.outer.clone()),
        };
        let resolved = match name {
            Some(name) => self.resolve(&name)?,
            None => None,
        };
        Ok(self.enclosing.get_or_init(|| resolved).clone())
    }

    pub fn enclosing_class_name(&self) -> Option<&str> {
        match &self.file.enclosing {
            Some(enclosing) => Some(&enclosing.class),
            None => self
                .file
                .own_inner_entry()
                .and_then(|entry| entry.outer.as_deref()),
        }
    }

    /// Permitted subclasses when sealed, else `None`
    pub fn permitted_subclasses(&self) -> Result<Option<Vec<Arc<ClassNode>>>> {
        if let Some(cached) = self.permitted.get() {
            return Ok(cached.clone());
        }
        let resolved = match &self.file.permitted_subclasses {
            None => None,
            Some(names) => {
                let mut nodes = Vec::with_capacity(names.len());
                for name in names {
                    if let Some(node) = self.resolve(name)? {
                        nodes.push(node);
                    }
                }
                Some(nodes)
            }
        };
        Ok(self.permitted.get_or_init(|| resolved).clone())
    }

    pub fn fields(&self) -> &[Arc<FieldNode>] {
        self.fields.get_or_init(|| {
            self.file
                .fields
                .iter()
                .map(|data| FieldNode::new(self.self_ref.clone(), data.clone()))
                .collect()
        })
    }

    pub fn methods(&self) -> &[Arc<MethodNode>] {
        self.methods.get_or_init(|| {
            self.file
                .methods
                .iter()
                .map(|data| MethodNode::new(self.self_ref.clone(), data.clone()))
                .collect()
        })
    }

    /// Find a field by name, and descriptor when given
    pub fn field(&self, name: &str, descriptor: Option<&str>) -> Option<Arc<FieldNode>> {
        self.fields()
            .iter()
            .find(|field| {
                field.name() == name
                    && descriptor.map_or(true, |d| field.descriptor_text() == d)
            })
            .cloned()
    }

    /// Find a method by name, and descriptor when given
    pub fn method(&self, name: &str, descriptor: Option<&str>) -> Option<Arc<MethodNode>> {
        self.methods()
            .iter()
            .find(|method| {
                method.name() == name
                    && descriptor.map_or(true, |d| method.descriptor_text() == d)
            })
            .cloned()
    }

    /// All methods with the given name
    pub fn methods_named(&self, name: &str) -> Vec<Arc<MethodNode>> {
        self.methods()
            .iter()
            .filter(|method| method.name() == name)
            .cloned()
            .collect()
    }

    /// Record components when this is a record, else `None`
    pub fn record_components(&self) -> Option<&[RecordComponent]> {
        self.components
            .get_or_init(|| {
                self.file.record_components.as_ref().map(|components| {
                    components
                        .iter()
                        .map(|data| RecordComponent {
                            parent: self.self_ref.clone(),
                            name: data.name.clone(),
                            descriptor: data.descriptor.clone(),
                            signature: data.signature.clone(),
                        })
                        .collect()
                })
            })
            .as_deref()
    }

    /// The parsed generic class signature, when one is present
    pub fn signature(&self) -> Result<Option<Arc<ClassSignature>>> {
        if let Some(cached) = self.signature.get() {
            return Ok(cached.clone());
        }
        let parsed = match &self.file.signature {
            None => None,
            Some(text) => Some(ClassSignature::parse(text)?),
        };
        Ok(self.signature.get_or_init(|| parsed).clone())
    }

    /// Is this a static nested class?
    ///
    /// True when the class file names an enclosing class and either the
    /// class is an enum or record, the enclosing method resolves to a static
    /// method, or the matching `InnerClasses` entry carries the static or
    /// enum bit. When the enclosing method cannot be resolved the class is
    /// assumed non-static.
    pub fn is_static_inner(&self) -> bool {
        *self
            .static_inner
            .get_or_init(|| self.compute_static_inner())
    }

    fn compute_static_inner(&self) -> bool {
        if self.enclosing_class_name().is_none() {
            return false;
        }
        if self
            .kinds()
            .intersects(ClassKinds::ENUM | ClassKinds::RECORD)
        {
            return true;
        }
        if let Some(enclosing) = &self.file.enclosing {
            if let Some((method_name, method_descriptor)) = &enclosing.method {
                if let Ok(Some(owner)) = self.resolve(&enclosing.class) {
                    if let Some(method) =
                        owner.method(method_name, Some(method_descriptor.as_str()))
                    {
                        return method.is_static();
                    }
                }
                log::debug!(
                    "could not resolve enclosing method {}.{} of {}; assuming non-static",
                    enclosing.class,
                    method_name,
                    self.name()
                );
                return false;
            }
        }
        if let Some(entry) = self.file.own_inner_entry() {
            return entry
                .access_flags
                .intersects(InnerClassAccessFlags::STATIC | InnerClassAccessFlags::ENUM);
        }
        false
    }

    /// Direct subclasses (and implementers), populated by base hydration
    pub fn subclasses(&self) -> Vec<Arc<ClassNode>> {
        self.subclasses.read().clone()
    }

    /// Direct inner classes, populated by base hydration
    pub fn inner_classes(&self) -> Vec<Arc<ClassNode>> {
        self.inner_classes.read().clone()
    }

    pub(crate) fn add_subclass(&self, subclass: Arc<ClassNode>) {
        let mut subclasses = self.subclasses.write();
        if !subclasses.iter().any(|existing| Arc::ptr_eq(existing, &subclass)) {
            subclasses.push(subclass);
        }
    }

    pub(crate) fn add_inner_class(&self, inner: Arc<ClassNode>) {
        let mut inner_classes = self.inner_classes.write();
        if !inner_classes.iter().any(|existing| Arc::ptr_eq(existing, &inner)) {
            inner_classes.push(inner);
        }
    }

    /// This node's attached-data bag
    pub fn data(&self) -> &AttachedData {
        &self.attached
    }

    /// Resolve another class through this node's provider, lenient about
    /// absence
    pub(crate) fn resolve(&self, name: &str) -> Result<Option<Arc<ClassNode>>> {
        let core = self
            .provider
            .upgrade()
            .ok_or_else(|| Error::DetachedNode(self.name().to_string()))?;
        core.find_class(name)
    }

    /// Resolve a superclass or interface: a miss is a hard error when the
    /// provider runs in classpath-complete mode
    fn resolve_required(&self, name: &str) -> Result<Option<Arc<ClassNode>>> {
        let core = self
            .provider
            .upgrade()
            .ok_or_else(|| Error::DetachedNode(self.name().to_string()))?;
        match core.find_class(name)? {
            Some(node) => Ok(Some(node)),
            None if core.strict() => Err(Error::ClasspathIncomplete {
                name: name.to_string(),
                requested_by: self.name().to_string(),
            }),
            None => {
                log::debug!(
                    "{} references missing class {}; continuing without it",
                    self.name(),
                    name
                );
                Ok(None)
            }
        }
    }
}

impl fmt::Debug for ClassNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One component of a record class
///
/// The backing field is resolved lazily against the parent's fields by
/// (name, descriptor).
#[derive(Clone)]
pub struct RecordComponent {
    parent: Weak<ClassNode>,
    name: String,
    descriptor: String,
    signature: Option<String>,
}

impl RecordComponent {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor_text(&self) -> &str {
        &self.descriptor
    }

    pub fn signature_text(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// The field backing this component
    pub fn field(&self) -> Option<Arc<FieldNode>> {
        self.parent
            .upgrade()
            .and_then(|parent| parent.field(&self.name, Some(self.descriptor.as_str())))
    }
}

impl fmt::Debug for RecordComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.descriptor)
    }
}

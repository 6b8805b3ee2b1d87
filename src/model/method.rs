//! Method and constructor nodes of the semantic graph
//!
//! Constructors are method nodes whose name is the `<init>` sigil. They are
//! excluded from the override relation: their super-method link is always
//! absent, their child-method set always empty, and the flag predicates the
//! JVM forbids on constructors are forced false.

use super::attach::AttachedData;
use super::ClassNode;
use crate::access_flags::{MethodAccessFlags, Visibility};
use crate::class_file::{MethodBody, MethodData};
use crate::errors::Result;
use crate::types::{MethodDescriptor, MethodSignature, TypeDescriptor};
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

/// The JVM name of instance constructors
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// One method (or constructor) of a class
pub struct MethodNode {
    parent: Weak<ClassNode>,
    data: MethodData,
    descriptor: OnceLock<Arc<MethodDescriptor>>,
    signature: OnceLock<Option<Arc<MethodSignature>>>,
    super_method: RwLock<Option<Arc<MethodNode>>>,
    child_methods: RwLock<Vec<Arc<MethodNode>>>,
    attached: AttachedData,
}

impl MethodNode {
    pub(crate) fn new(parent: Weak<ClassNode>, data: MethodData) -> Arc<MethodNode> {
        Arc::new(MethodNode {
            parent,
            data,
            descriptor: OnceLock::new(),
            signature: OnceLock::new(),
            super_method: RwLock::new(None),
            child_methods: RwLock::new(vec![]),
            attached: AttachedData::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// The declaring class. `None` only if the whole graph has been dropped.
    pub fn parent(&self) -> Option<Arc<ClassNode>> {
        self.parent.upgrade()
    }

    pub fn is_constructor(&self) -> bool {
        self.data.name == CONSTRUCTOR_NAME
    }

    pub fn access_flags(&self) -> MethodAccessFlags {
        self.data.access_flags
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::from_bits(self.data.access_flags.bits())
    }

    pub fn is_static(&self) -> bool {
        !self.is_constructor() && self.data.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_abstract(&self) -> bool {
        !self.is_constructor() && self.data.access_flags.contains(MethodAccessFlags::ABSTRACT)
    }

    pub fn is_final(&self) -> bool {
        !self.is_constructor() && self.data.access_flags.contains(MethodAccessFlags::FINAL)
    }

    pub fn is_bridge(&self) -> bool {
        !self.is_constructor() && self.data.access_flags.contains(MethodAccessFlags::BRIDGE)
    }

    pub fn is_native(&self) -> bool {
        !self.is_constructor() && self.data.access_flags.contains(MethodAccessFlags::NATIVE)
    }

    pub fn is_synthetic(&self) -> bool {
        self.data.access_flags.contains(MethodAccessFlags::SYNTHETIC)
    }

    /// The raw descriptor text
    pub fn descriptor_text(&self) -> &str {
        &self.data.descriptor
    }

    /// The parsed (and interned) method descriptor
    pub fn descriptor(&self) -> Result<Arc<MethodDescriptor>> {
        if let Some(cached) = self.descriptor.get() {
            return Ok(cached.clone());
        }
        let parsed = MethodDescriptor::parse(&self.data.descriptor)?;
        Ok(self.descriptor.get_or_init(|| parsed).clone())
    }

    pub fn signature_text(&self) -> Option<&str> {
        self.data.signature.as_deref()
    }

    /// The parsed generic method signature, when one is present
    pub fn signature(&self) -> Result<Option<Arc<MethodSignature>>> {
        if let Some(cached) = self.signature.get() {
            return Ok(cached.clone());
        }
        let parsed = match &self.data.signature {
            None => None,
            Some(text) => Some(MethodSignature::parse(text)?),
        };
        Ok(self.signature.get_or_init(|| parsed).clone())
    }

    pub fn parameter_count(&self) -> Result<usize> {
        Ok(self.descriptor()?.parameter_count())
    }

    /// The erased type of the parameter at `index` (0-based source order)
    pub fn parameter(&self, index: usize) -> Result<Option<Arc<TypeDescriptor>>> {
        Ok(self
            .descriptor()?
            .parameter(index)
            .cloned()
            .map(TypeDescriptor::interned))
    }

    /// The decoded body, when the decoder supplied one
    pub fn body(&self) -> Option<&MethodBody> {
        self.data.body.as_ref()
    }

    pub fn has_body(&self) -> bool {
        self.data.body.is_some()
    }

    /// The nearest overridden method, set during base hydration. Always
    /// `None` for constructors and static methods.
    pub fn super_method(&self) -> Option<Arc<MethodNode>> {
        self.super_method.read().clone()
    }

    /// Methods that directly override this one, set during base hydration
    pub fn child_methods(&self) -> Vec<Arc<MethodNode>> {
        self.child_methods.read().clone()
    }

    pub(crate) fn set_super_method(&self, method: Arc<MethodNode>) {
        debug_assert!(!self.is_constructor());
        let mut super_method = self.super_method.write();
        if super_method.is_none() {
            *super_method = Some(method);
        }
    }

    pub(crate) fn add_child_method(&self, method: Arc<MethodNode>) {
        debug_assert!(!self.is_constructor());
        let mut child_methods = self.child_methods.write();
        if !child_methods.iter().any(|existing| Arc::ptr_eq(existing, &method)) {
            child_methods.push(method);
        }
    }

    pub fn data(&self) -> &AttachedData {
        &self.attached
    }
}

impl fmt::Debug for MethodNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parent = self.parent.upgrade();
        write!(
            f,
            "{}.{}:{}",
            parent.as_deref().map(ClassNode::name).unwrap_or("?"),
            self.data.name,
            self.data.descriptor,
        )
    }
}

//! Field nodes of the semantic graph

use super::attach::AttachedData;
use super::ClassNode;
use crate::access_flags::{FieldAccessFlags, Visibility};
use crate::class_file::FieldData;
use crate::errors::Result;
use crate::types::{TypeDescriptor, TypeSignature};
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

/// One field of a class
pub struct FieldNode {
    parent: Weak<ClassNode>,
    data: FieldData,
    descriptor: OnceLock<Arc<TypeDescriptor>>,
    signature: OnceLock<Option<Arc<TypeSignature>>>,
    attached: AttachedData,
}

impl FieldNode {
    pub(crate) fn new(parent: Weak<ClassNode>, data: FieldData) -> Arc<FieldNode> {
        Arc::new(FieldNode {
            parent,
            data,
            descriptor: OnceLock::new(),
            signature: OnceLock::new(),
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

    pub fn access_flags(&self) -> FieldAccessFlags {
        self.data.access_flags
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::from_bits(self.data.access_flags.bits())
    }

    pub fn is_static(&self) -> bool {
        self.data.access_flags.contains(FieldAccessFlags::STATIC)
    }

    pub fn is_final(&self) -> bool {
        self.data.access_flags.contains(FieldAccessFlags::FINAL)
    }

    pub fn is_synthetic(&self) -> bool {
        self.data.access_flags.contains(FieldAccessFlags::SYNTHETIC)
    }

    /// The raw descriptor text
    pub fn descriptor_text(&self) -> &str {
        &self.data.descriptor
    }

    /// The parsed (and interned) type descriptor
    pub fn descriptor(&self) -> Result<Arc<TypeDescriptor>> {
        if let Some(cached) = self.descriptor.get() {
            return Ok(cached.clone());
        }
        let parsed = TypeDescriptor::parse(&self.data.descriptor)?;
        Ok(self.descriptor.get_or_init(|| parsed).clone())
    }

    pub fn signature_text(&self) -> Option<&str> {
        self.data.signature.as_deref()
    }

    /// The parsed generic signature, when one is present
    pub fn signature(&self) -> Result<Option<Arc<TypeSignature>>> {
        if let Some(cached) = self.signature.get() {
            return Ok(cached.clone());
        }
        let parsed = match &self.data.signature {
            None => None,
            Some(text) => Some(TypeSignature::parse(text)?),
        };
        Ok(self.signature.get_or_init(|| parsed).clone())
    }

    pub fn data(&self) -> &AttachedData {
        &self.attached
    }
}

impl fmt::Debug for FieldNode {
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

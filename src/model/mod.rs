//! The semantic graph
//!
//! Classes own their members; members point back at their class with weak
//! handles; everything cross-class resolves by name through the provider
//! that created the node. The provider's identity cache is the arena: one
//! `Arc` per class name per provider lifetime, so node identity is
//! `Arc::ptr_eq`.

mod attach;
mod class;
mod field;
mod method;

pub use attach::{AttachedData, Key, KeyId};
pub use class::{ClassNode, RecordComponent};
pub use field::FieldNode;
pub use method::{MethodNode, CONSTRUCTOR_NAME};

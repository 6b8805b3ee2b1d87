//! Bridge-method target resolution
//!
//! A synthetic bridge method delegates to a sibling whose type refines the
//! bridge's erased descriptor (covariant returns, generic specialization).
//! This provider records the pair in both directions. A candidate only
//! counts as the target if its return type refines the bridge's return
//! type: equal, or a reference type assignable to it through the
//! extends/implements closure.

use super::{HydrationContext, HydrationProvider, HydrationTarget};
use crate::class_file::Instruction;
use crate::errors::Result;
use crate::model::{Key, KeyId, MethodNode};
use crate::types::TypeDescriptor;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

/// On a bridge method: the method it forwards to
pub fn bridge_target_key() -> Key<Arc<MethodNode>> {
    static KEY: OnceLock<Key<Arc<MethodNode>>> = OnceLock::new();
    *KEY.get_or_init(|| Key::new("hypo.bridge.target"))
}

/// On a bridge target: every bridge that forwards to it
pub fn bridge_sources_key() -> Key<Vec<Arc<MethodNode>>> {
    static KEY: OnceLock<Key<Vec<Arc<MethodNode>>>> = OnceLock::new();
    *KEY.get_or_init(|| Key::new("hypo.bridge.sources"))
}

pub struct BridgeTargets;

impl HydrationProvider for BridgeTargets {
    fn name(&self) -> &str {
        "bridge-targets"
    }

    fn target(&self) -> HydrationTarget {
        HydrationTarget::Methods
    }

    fn produces(&self) -> Vec<KeyId> {
        vec![bridge_target_key().id(), bridge_sources_key().id()]
    }

    fn hydrate_method(&self, method: &Arc<MethodNode>, cx: &HydrationContext<'_>) -> Result<()> {
        if !method.is_bridge() || !method.is_synthetic() {
            return Ok(());
        }
        let body = match method.body() {
            Some(body) => body,
            None => return Ok(()),
        };
        let class = match method.parent() {
            Some(class) => class,
            None => return Ok(()),
        };
        let bridge_descriptor = method.descriptor()?;
        let bridge_return = &bridge_descriptor.return_type;
        for insn in &body.instructions {
            let (owner, name, descriptor) = match insn {
                Instruction::Invoke {
                    owner,
                    name,
                    descriptor,
                    ..
                } => (owner, name, descriptor),
                _ => continue,
            };
            if owner != class.name()
                || name != method.name()
                || descriptor == method.descriptor_text()
            {
                continue;
            }
            let target = match class.method(name, Some(descriptor.as_str())) {
                Some(target) if !target.is_synthetic() => target,
                _ => continue,
            };
            if !return_refines(cx, bridge_return, &target.descriptor()?.return_type)? {
                continue;
            }
            log::debug!("bridge {:?} forwards to {:?}", method, target);
            method.data().put(bridge_target_key(), target.clone());
            target.data().update(bridge_sources_key(), |current| {
                let mut sources = current.cloned().unwrap_or_default();
                if !sources.iter().any(|existing| Arc::ptr_eq(existing, method)) {
                    sources.push(method.clone());
                }
                sources
            });
            break;
        }
        Ok(())
    }
}

/// Does the target's return type refine the bridge's return type?
///
/// Equal types always do. Otherwise the target must return a reference
/// type assignable to the bridge's return type: anything for
/// `java/lang/Object`, or a class whose extends/implements closure reaches
/// the bridge's return class. The walk is by name so a parent missing from
/// the classpath just ends that branch.
fn return_refines(
    cx: &HydrationContext<'_>,
    bridge_return: &TypeDescriptor,
    target_return: &TypeDescriptor,
) -> Result<bool> {
    if bridge_return == target_return {
        return Ok(true);
    }
    let bridge_class = match bridge_return.class_name() {
        Some(name) => name,
        None => return Ok(false),
    };
    let target_is_reference = matches!(
        target_return,
        TypeDescriptor::Object(_) | TypeDescriptor::Array { .. }
    );
    if bridge_class == "java/lang/Object" {
        return Ok(target_is_reference);
    }
    let mut queue: Vec<String> = match target_return.class_name() {
        Some(name) => vec![name.to_string()],
        None => return Ok(false),
    };
    let mut seen: HashSet<String> = HashSet::new();
    while let Some(name) = queue.pop() {
        if name == bridge_class {
            return Ok(true);
        }
        if !seen.insert(name.clone()) {
            continue;
        }
        if let Some(node) = cx.provider.find(&name)? {
            if let Some(superclass) = node.superclass_name() {
                queue.push(superclass.to_string());
            }
            for interface in node.interface_names() {
                queue.push(interface.clone());
            }
        }
    }
    Ok(false)
}

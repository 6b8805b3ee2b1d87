//! Super-constructor call extraction
//!
//! Every constructor begins with a `this(...)` or `super(...)` call: the
//! first `invokespecial` of `<init>` whose receiver is the uninitialized
//! `this`. This provider records which constructor that is, together with
//! the correspondence between the callee's parameter LVT slots and the
//! caller's, for every argument that is a direct local-variable load.

use super::stack;
use super::{HydrationContext, HydrationProvider, HydrationTarget};
use crate::class_file::{Instruction, InvokeKind};
use crate::errors::Result;
use crate::model::{Key, KeyId, MethodNode};
use crate::types::MethodDescriptor;
use std::sync::{Arc, OnceLock};

/// The initial constructor call recorded on a constructor
#[derive(Clone)]
pub struct ConstructorCall {
    /// The constructor invoked: same class for `this(...)`, the superclass
    /// for `super(...)`
    pub callee: Arc<MethodNode>,
    /// Pairs of (callee parameter LVT index, caller LVT index) for every
    /// argument slot fed by a direct load
    pub correspondence: Vec<(u16, u16)>,
}

impl ConstructorCall {
    /// Is `ancestor` reachable by walking this call's callee chain upward?
    pub fn chains_to(&self, ancestor: &Arc<MethodNode>) -> bool {
        let mut current = self.callee.clone();
        loop {
            if Arc::ptr_eq(&current, ancestor) {
                return true;
            }
            match current.data().get(super_call_key()) {
                Some(call) => current = call.callee.clone(),
                None => return false,
            }
        }
    }
}

/// On a constructor: its initial `this`/`super` call
pub fn super_call_key() -> Key<ConstructorCall> {
    static KEY: OnceLock<Key<ConstructorCall>> = OnceLock::new();
    *KEY.get_or_init(|| Key::new("hypo.ctor.super-call"))
}

/// On a constructor: every constructor whose initial call targets it
pub fn super_callers_key() -> Key<Vec<Arc<MethodNode>>> {
    static KEY: OnceLock<Key<Vec<Arc<MethodNode>>>> = OnceLock::new();
    *KEY.get_or_init(|| Key::new("hypo.ctor.super-callers"))
}

pub struct SuperConstructorCalls;

impl HydrationProvider for SuperConstructorCalls {
    fn name(&self) -> &str {
        "super-constructor-calls"
    }

    fn target(&self) -> HydrationTarget {
        HydrationTarget::Methods
    }

    fn produces(&self) -> Vec<KeyId> {
        vec![super_call_key().id(), super_callers_key().id()]
    }

    fn hydrate_method(&self, method: &Arc<MethodNode>, cx: &HydrationContext<'_>) -> Result<()> {
        if !method.is_constructor() {
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

        let mut values: Vec<stack::Value> = vec![];
        for insn in &body.instructions {
            if let Instruction::Invoke {
                kind: InvokeKind::Special,
                owner,
                name,
                descriptor,
            } = insn
            {
                if name == crate::model::CONSTRUCTOR_NAME {
                    let is_this_call = owner == class.name();
                    let is_super_call = class.superclass_name() == Some(owner.as_str());
                    let callee_descriptor = MethodDescriptor::parse(descriptor)?;
                    let argc = callee_descriptor.parameter_count();
                    let receiver_is_this = stack::top_n(&values, argc + 1)
                        .map_or(false, |window| window[0] == Some(0));
                    if (is_this_call || is_super_call) && receiver_is_this {
                        let callee = if is_this_call {
                            class.method(crate::model::CONSTRUCTOR_NAME, Some(descriptor.as_str()))
                        } else {
                            cx.provider
                                .find(owner)?
                                .and_then(|superclass| {
                                    superclass.method(
                                        crate::model::CONSTRUCTOR_NAME,
                                        Some(descriptor.as_str()),
                                    )
                                })
                        };
                        if let Some(callee) = callee {
                            let arguments = stack::top_n(&values, argc + 1)
                                .map(|window| window[1..].to_vec())
                                .unwrap_or_default();
                            let callee_slots = callee_descriptor.lvt_indices(true);
                            let correspondence = callee_slots
                                .iter()
                                .zip(arguments.iter())
                                .filter_map(|(&callee_slot, caller_slot)| {
                                    caller_slot.map(|slot| (callee_slot, slot))
                                })
                                .collect();
                            let call = ConstructorCall {
                                callee: callee.clone(),
                                correspondence,
                            };
                            method.data().put(super_call_key(), call);
                            callee.data().update(super_callers_key(), |current| {
                                let mut callers = current.cloned().unwrap_or_default();
                                if !callers
                                    .iter()
                                    .any(|existing| Arc::ptr_eq(existing, method))
                                {
                                    callers.push(method.clone());
                                }
                                callers
                            });
                        }
                        return Ok(());
                    }
                }
            }
            stack::apply(&mut values, insn)?;
        }
        Ok(())
    }
}

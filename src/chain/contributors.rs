//! The standard change contributors
//!
//! Each contributor is invoked once per (class node, class mapping) pair —
//! one side may be absent, never both — reads the hydrated graph and the
//! input mapping set, and submits changes to the registry. Contributors
//! never mutate the mapping set directly.

use super::changes::{
    AddMemberMapping, AddParameterMapping, ChangeRegistry, CopyConstructorMapping,
    CopyLambdaParameterMapping, RemoveMapping,
};
use super::mappings::{ClassMapping, MappingsSet, MemberKey, MemberReference};
use crate::errors::Result;
use crate::hydrate::{bridge_target_key, lambdas_key, super_call_key};
use crate::model::{ClassNode, MethodNode, CONSTRUCTOR_NAME};
use crate::provider::ClassDataProvider;
use std::collections::VecDeque;
use std::sync::Arc;

/// What a contributor sees during one chain stage
pub struct ChainContext<'a> {
    pub provider: &'a ClassDataProvider,
    /// The stage's *input* mapping set; changes apply to a copy afterwards
    pub mappings: &'a dyn MappingsSet,
}

/// A named procedure that proposes mapping changes
pub trait ChangeContributor: Send + Sync {
    fn name(&self) -> &str;

    /// Exactly one of `class` and `mapping` may be `None`, never both
    fn contribute(
        &self,
        class: Option<&Arc<ClassNode>>,
        mapping: Option<&ClassMapping>,
        cx: &ChainContext<'_>,
        registry: &ChangeRegistry,
    ) -> Result<()>;
}

fn method_reference(method: &MethodNode, class: &ClassNode) -> MemberReference {
    MemberReference::new(
        class.name(),
        method.name(),
        Some(method.descriptor_text().to_string()),
    )
}

/// Methods matching a member-mapping key on a class node
fn methods_for_key(class: &ClassNode, key: &MemberKey) -> Vec<Arc<MethodNode>> {
    match &key.descriptor {
        Some(descriptor) => class
            .method(&key.name, Some(descriptor.as_str()))
            .into_iter()
            .collect(),
        None => class.methods_named(&key.name),
    }
}

/// Every method that transitively overrides `method`
fn transitive_overriders(method: &Arc<MethodNode>) -> Vec<Arc<MethodNode>> {
    let mut overriders = vec![];
    let mut queue: VecDeque<Arc<MethodNode>> = method.child_methods().into();
    while let Some(child) = queue.pop_front() {
        if overriders
            .iter()
            .any(|existing: &Arc<MethodNode>| Arc::ptr_eq(existing, &child))
        {
            continue;
        }
        queue.extend(child.child_methods());
        overriders.push(child);
    }
    overriders
}

/// Copies member renames down onto every overriding method, bridges
/// included
pub struct CopyMappingsDown;

impl ChangeContributor for CopyMappingsDown {
    fn name(&self) -> &str {
        "copy-mappings-down"
    }

    fn contribute(
        &self,
        class: Option<&Arc<ClassNode>>,
        mapping: Option<&ClassMapping>,
        _cx: &ChainContext<'_>,
        registry: &ChangeRegistry,
    ) -> Result<()> {
        let (class, mapping) = match (class, mapping) {
            (Some(class), Some(mapping)) => (class, mapping),
            _ => return Ok(()),
        };
        for (key, method_mapping) in mapping.methods() {
            let new_name = match &method_mapping.new_name {
                Some(new_name) => new_name,
                None => continue,
            };
            for method in methods_for_key(class, key) {
                for overrider in transitive_overriders(&method) {
                    let overrider_class = match overrider.parent() {
                        Some(parent) => parent,
                        None => continue,
                    };
                    registry.submit(Box::new(AddMemberMapping::method(
                        method_reference(&overrider, &overrider_class),
                        new_name.clone(),
                    )))?;
                    // A covariant override surfaces as a bridge; its target
                    // carries the real return type and gets the name too.
                    if let Some(target) = overrider.data().get(bridge_target_key()) {
                        registry.submit(Box::new(AddMemberMapping::method(
                            method_reference(&target, &overrider_class),
                            new_name.clone(),
                        )))?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Moves member renames up to the topmost declaration of each override
/// chain
pub struct PropagateMappingsUp;

impl ChangeContributor for PropagateMappingsUp {
    fn name(&self) -> &str {
        "propagate-mappings-up"
    }

    fn contribute(
        &self,
        class: Option<&Arc<ClassNode>>,
        mapping: Option<&ClassMapping>,
        _cx: &ChainContext<'_>,
        registry: &ChangeRegistry,
    ) -> Result<()> {
        let (class, mapping) = match (class, mapping) {
            (Some(class), Some(mapping)) => (class, mapping),
            _ => return Ok(()),
        };
        for (key, method_mapping) in mapping.methods() {
            let new_name = match &method_mapping.new_name {
                Some(new_name) => new_name,
                None => continue,
            };
            for method in methods_for_key(class, key) {
                let mut top = method.clone();
                while let Some(super_method) = top.super_method() {
                    top = super_method;
                }
                if Arc::ptr_eq(&top, &method) {
                    continue;
                }
                let top_class = match top.parent() {
                    Some(parent) => parent,
                    None => continue,
                };
                registry.submit(Box::new(AddMemberMapping::method(
                    method_reference(&top, &top_class),
                    new_name.clone(),
                )))?;
            }
        }
        Ok(())
    }
}

/// Removes mappings whose target class or member does not exist in the
/// corpus
pub struct RemoveUnusedMappings;

impl ChangeContributor for RemoveUnusedMappings {
    fn name(&self) -> &str {
        "remove-unused-mappings"
    }

    fn contribute(
        &self,
        class: Option<&Arc<ClassNode>>,
        mapping: Option<&ClassMapping>,
        _cx: &ChainContext<'_>,
        registry: &ChangeRegistry,
    ) -> Result<()> {
        let mapping = match mapping {
            Some(mapping) => mapping,
            None => return Ok(()),
        };
        let class = match class {
            Some(class) => class,
            None => {
                // No such class in the corpus at all
                registry.submit(Box::new(RemoveMapping::class(mapping.name())))?;
                return Ok(());
            }
        };
        for (key, _) in mapping.methods() {
            let exists = match &key.descriptor {
                Some(descriptor) => class.method(&key.name, Some(descriptor.as_str())).is_some(),
                None => !class.methods_named(&key.name).is_empty(),
            };
            if !exists {
                registry.submit(Box::new(RemoveMapping::method(MemberReference::new(
                    class.name(),
                    key.name.clone(),
                    key.descriptor.clone(),
                ))))?;
            }
        }
        for (key, _) in mapping.fields() {
            if class.field(&key.name, key.descriptor.as_deref()).is_none() {
                registry.submit(Box::new(RemoveMapping::field(MemberReference::new(
                    class.name(),
                    key.name.clone(),
                    key.descriptor.clone(),
                ))))?;
            }
        }
        Ok(())
    }
}

/// Names canonical-constructor parameters of records after their components
/// (or the component field's mapped name, when one exists)
pub struct CopyRecordParameters;

impl ChangeContributor for CopyRecordParameters {
    fn name(&self) -> &str {
        "copy-record-parameters"
    }

    fn contribute(
        &self,
        class: Option<&Arc<ClassNode>>,
        mapping: Option<&ClassMapping>,
        _cx: &ChainContext<'_>,
        registry: &ChangeRegistry,
    ) -> Result<()> {
        let class = match class {
            Some(class) if class.is_record() => class,
            _ => return Ok(()),
        };
        let components = match class.record_components() {
            Some(components) => components,
            None => return Ok(()),
        };
        // The canonical constructor takes exactly the component types in
        // declaration order.
        let canonical_descriptor = {
            let mut descriptor = String::from("(");
            for component in components {
                descriptor.push_str(component.descriptor_text());
            }
            descriptor.push_str(")V");
            descriptor
        };
        let constructor = match class.method(CONSTRUCTOR_NAME, Some(canonical_descriptor.as_str())) {
            Some(constructor) => constructor,
            None => return Ok(()),
        };
        let slots = constructor.descriptor()?.lvt_indices(true);
        for (index, component) in components.iter().enumerate() {
            let name = mapping
                .and_then(|m| m.field(component.name(), Some(component.descriptor_text())))
                .and_then(|field| field.new_name.clone())
                .unwrap_or_else(|| component.name().to_string());
            let slot = match slots.get(index) {
                Some(&slot) => slot,
                None => continue,
            };
            registry.submit(Box::new(AddParameterMapping::new(
                MemberReference::new(
                    class.name(),
                    CONSTRUCTOR_NAME,
                    Some(canonical_descriptor.clone()),
                )
                .parameter(slot),
                name,
            )))?;
        }
        Ok(())
    }
}

/// Copies parameter names along recorded super-constructor calls
pub struct CopyConstructorParametersDown;

impl ChangeContributor for CopyConstructorParametersDown {
    fn name(&self) -> &str {
        "copy-constructor-parameters-down"
    }

    fn contribute(
        &self,
        class: Option<&Arc<ClassNode>>,
        _mapping: Option<&ClassMapping>,
        cx: &ChainContext<'_>,
        registry: &ChangeRegistry,
    ) -> Result<()> {
        let class = match class {
            Some(class) => class,
            None => return Ok(()),
        };
        for constructor in class.methods() {
            if !constructor.is_constructor() {
                continue;
            }
            let call = match constructor.data().get(super_call_key()) {
                Some(call) => call,
                None => continue,
            };
            let callee = call.callee.clone();
            let callee_class = match callee.parent() {
                Some(parent) => parent,
                None => continue,
            };
            let source_params: Vec<(u16, String)> = cx
                .mappings
                .class_mapping(callee_class.name())
                .and_then(|class_mapping| {
                    class_mapping.method(callee.name(), Some(callee.descriptor_text()))
                })
                .map(|method_mapping| {
                    method_mapping
                        .parameters()
                        .iter()
                        .map(|(&slot, name)| (slot, name.clone()))
                        .collect()
                })
                .unwrap_or_default();
            registry.submit(Box::new(CopyConstructorMapping::new(
                method_reference(constructor, class),
                callee,
                call.correspondence.clone(),
                source_params,
            )))?;
        }
        Ok(())
    }
}

/// Copies functional-interface parameter names down into recorded lambda
/// bodies
///
/// This is the interface-driven direction: only mappings present on the
/// interface's abstract method flow into bodies, offset past the captured
/// prefix.
pub struct CopyLambdaParametersDown;

impl ChangeContributor for CopyLambdaParametersDown {
    fn name(&self) -> &str {
        "copy-lambda-parameters-down"
    }

    fn contribute(
        &self,
        class: Option<&Arc<ClassNode>>,
        _mapping: Option<&ClassMapping>,
        cx: &ChainContext<'_>,
        registry: &ChangeRegistry,
    ) -> Result<()> {
        let class = match class {
            Some(class) => class,
            None => return Ok(()),
        };
        for method in class.methods() {
            let closures = match method.data().get(lambdas_key()) {
                Some(closures) => closures,
                None => continue,
            };
            for closure in closures.iter() {
                let interface_method = match &closure.interface_method {
                    Some(interface_method) => interface_method,
                    None => continue,
                };
                let interface_class = match interface_method.parent() {
                    Some(parent) => parent,
                    None => continue,
                };
                let sam_mapping = match cx
                    .mappings
                    .class_mapping(interface_class.name())
                    .and_then(|class_mapping| {
                        class_mapping.method(
                            interface_method.name(),
                            Some(interface_method.descriptor_text()),
                        )
                    }) {
                    Some(sam_mapping) if sam_mapping.has_parameters() => sam_mapping,
                    _ => continue,
                };

                let body = &closure.body;
                let body_class = match body.parent() {
                    Some(parent) => parent,
                    None => continue,
                };
                let body_slots = body.descriptor()?.lvt_indices(!body.is_static());
                let sam_slots = interface_method.descriptor()?.lvt_indices(true);
                let captures = closure.captured_lvts.len();

                let mut names = vec![];
                for (index, &sam_slot) in sam_slots.iter().enumerate() {
                    let name = match sam_mapping.parameter(sam_slot) {
                        Some(name) => name,
                        None => continue,
                    };
                    if let Some(&target_slot) = body_slots.get(captures + index) {
                        names.push((target_slot, name.to_string()));
                    }
                }
                if !names.is_empty() {
                    registry.submit(Box::new(CopyLambdaParameterMapping::new(
                        method_reference(body, &body_class),
                        names,
                    )))?;
                }
            }
        }
        Ok(())
    }
}

/// Runs a list of contributors as one chain stage
pub struct CompositeContributor {
    name: String,
    contributors: Vec<Box<dyn ChangeContributor>>,
}

impl CompositeContributor {
    pub fn new(
        name: impl Into<String>,
        contributors: Vec<Box<dyn ChangeContributor>>,
    ) -> CompositeContributor {
        CompositeContributor {
            name: name.into(),
            contributors,
        }
    }
}

impl ChangeContributor for CompositeContributor {
    fn name(&self) -> &str {
        &self.name
    }

    fn contribute(
        &self,
        class: Option<&Arc<ClassNode>>,
        mapping: Option<&ClassMapping>,
        cx: &ChainContext<'_>,
        registry: &ChangeRegistry,
    ) -> Result<()> {
        for contributor in &self.contributors {
            contributor.contribute(class, mapping, cx, registry)?;
        }
        Ok(())
    }
}

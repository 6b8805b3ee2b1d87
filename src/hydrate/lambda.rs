//! Lambda closure extraction
//!
//! Every `invokedynamic` bootstrapped by the `LambdaMetafactory` ties
//! together a synthetic body method, the functional-interface method being
//! implemented, and the locals captured into the body's synthetic prefix.

use super::stack;
use super::{HydrationContext, HydrationProvider, HydrationTarget};
use crate::class_file::{BootstrapArgument, Instruction};
use crate::errors::Result;
use crate::model::{Key, KeyId, MethodNode};
use crate::types::{MethodDescriptor, TypeDescriptor};
use std::sync::{Arc, OnceLock};

/// One lambda instantiation site
#[derive(Clone)]
pub struct LambdaClosure {
    /// The method containing the `invokedynamic`
    pub container: Arc<MethodNode>,
    /// The synthetic method holding the lambda's code
    pub body: Arc<MethodNode>,
    /// The functional-interface method being implemented, when resolvable
    pub interface_method: Option<Arc<MethodNode>>,
    /// Caller LVT slots captured into the body's leading parameters
    pub captured_lvts: Vec<Option<u16>>,
}

/// On a containing method: every lambda instantiated inside it
pub fn lambdas_key() -> Key<Vec<LambdaClosure>> {
    static KEY: OnceLock<Key<Vec<LambdaClosure>>> = OnceLock::new();
    *KEY.get_or_init(|| Key::new("hypo.lambda.calls"))
}

/// On a synthetic lambda body: its closure record
pub fn lambda_closure_key() -> Key<LambdaClosure> {
    static KEY: OnceLock<Key<LambdaClosure>> = OnceLock::new();
    *KEY.get_or_init(|| Key::new("hypo.lambda.closure"))
}

pub struct LambdaClosures;

impl HydrationProvider for LambdaClosures {
    fn name(&self) -> &str {
        "lambda-closures"
    }

    fn target(&self) -> HydrationTarget {
        HydrationTarget::Methods
    }

    fn produces(&self) -> Vec<KeyId> {
        vec![lambdas_key().id(), lambda_closure_key().id()]
    }

    fn hydrate_method(&self, method: &Arc<MethodNode>, cx: &HydrationContext<'_>) -> Result<()> {
        let body = match method.body() {
            Some(body) => body,
            None => return Ok(()),
        };
        let class = match method.parent() {
            Some(class) => class,
            None => return Ok(()),
        };

        let mut closures = vec![];
        let mut values: Vec<stack::Value> = vec![];
        for insn in &body.instructions {
            if let Instruction::InvokeDynamic {
                name,
                descriptor,
                bootstrap,
            } = insn
            {
                if bootstrap.is_lambda_metafactory() {
                    let implementation = bootstrap.arguments.iter().find_map(|arg| match arg {
                        BootstrapArgument::MethodHandle {
                            owner,
                            name,
                            descriptor,
                            ..
                        } => Some((owner, name, descriptor)),
                        _ => None,
                    });
                    if let Some((impl_owner, impl_name, impl_descriptor)) = implementation {
                        if impl_owner == class.name() {
                            if let Some(lambda_body) =
                                class.method(impl_name, Some(impl_descriptor.as_str()))
                            {
                                if lambda_body.is_synthetic() {
                                    let indy_descriptor = MethodDescriptor::parse(descriptor)?;
                                    let captured = stack::top_n(
                                        &values,
                                        indy_descriptor.parameter_count(),
                                    )
                                    .map(<[stack::Value]>::to_vec)
                                    .unwrap_or_default();
                                    let interface_method = interface_method(
                                        cx,
                                        &indy_descriptor.return_type,
                                        name,
                                    )?;
                                    let closure = LambdaClosure {
                                        container: method.clone(),
                                        body: lambda_body.clone(),
                                        interface_method,
                                        captured_lvts: captured,
                                    };
                                    lambda_body
                                        .data()
                                        .put(lambda_closure_key(), closure.clone());
                                    closures.push(closure);
                                }
                            }
                        }
                    }
                }
            }
            stack::apply(&mut values, insn)?;
        }
        if !closures.is_empty() {
            method.data().put(lambdas_key(), closures);
        }
        Ok(())
    }
}

/// Resolve the single abstract method `name` of the functional interface the
/// `invokedynamic` returns
fn interface_method(
    cx: &HydrationContext<'_>,
    interface_type: &TypeDescriptor,
    name: &str,
) -> Result<Option<Arc<MethodNode>>> {
    let interface = match cx.provider.find_by_type(interface_type)? {
        Some(interface) => interface,
        None => return Ok(None),
    };
    Ok(interface
        .methods()
        .iter()
        .find(|candidate| candidate.name() == name && candidate.is_abstract())
        .cloned())
}

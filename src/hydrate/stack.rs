//! An approximate operand-stack model
//!
//! Hydration providers only need to know which argument slots of a call were
//! fed by direct local-variable loads, so the model tracks one thing per
//! stack value: the LVT slot it was loaded from, or nothing. Instructions
//! outside the reduced vocabulary conservatively push an opaque value.

use crate::class_file::{Instruction, InvokeKind};
use crate::errors::Result;
use crate::types::MethodDescriptor;

/// One modelled stack value: `Some(slot)` iff it is a direct load
pub(crate) type Value = Option<u16>;

/// Apply one instruction's stack effect
pub(crate) fn apply(stack: &mut Vec<Value>, insn: &Instruction) -> Result<()> {
    match insn {
        Instruction::Load { slot } => stack.push(Some(*slot)),
        Instruction::Store { .. } => {
            stack.pop();
        }
        Instruction::Dup => {
            let top = stack.last().copied().flatten();
            stack.push(top);
        }
        Instruction::New { .. } => stack.push(None),
        Instruction::GetField { .. } => {
            stack.pop();
            stack.push(None);
        }
        Instruction::Invoke {
            kind, descriptor, ..
        } => {
            let descriptor = MethodDescriptor::parse(descriptor)?;
            let consumed =
                descriptor.parameter_count() + usize::from(*kind != InvokeKind::Static);
            pop_n(stack, consumed);
            if !descriptor.return_type.is_void() {
                stack.push(None);
            }
        }
        Instruction::InvokeDynamic { descriptor, .. } => {
            let descriptor = MethodDescriptor::parse(descriptor)?;
            pop_n(stack, descriptor.parameter_count());
            if !descriptor.return_type.is_void() {
                stack.push(None);
            }
        }
        Instruction::Return => stack.clear(),
        Instruction::Other => stack.push(None),
    }
    Ok(())
}

/// The top `count` values in push order, if the stack is deep enough
pub(crate) fn top_n(stack: &[Value], count: usize) -> Option<&[Value]> {
    stack.len().checked_sub(count).map(|start| &stack[start..])
}

fn pop_n(stack: &mut Vec<Value>, count: usize) {
    let keep = stack.len().saturating_sub(count);
    stack.truncate(keep);
}

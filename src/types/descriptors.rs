//! Erased type descriptors
//!
//! These are the generic-free type strings the JVM uses for linkage:
//! `I`, `Ljava/lang/Object;`, `[[D`, `(IJ)Ljava/lang/String;`.

use super::intern::Interner;
use super::{push_dotted, Cursor, JvmText};
use crate::errors::Result;
use std::sync::{Arc, OnceLock};

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    pub(crate) fn from_byte(b: u8) -> Option<BaseType> {
        Some(match b {
            b'B' => BaseType::Byte,
            b'C' => BaseType::Char,
            b'D' => BaseType::Double,
            b'F' => BaseType::Float,
            b'I' => BaseType::Int,
            b'J' => BaseType::Long,
            b'S' => BaseType::Short,
            b'Z' => BaseType::Boolean,
            _ => return None,
        })
    }

    pub fn letter(self) -> char {
        match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            BaseType::Byte => "byte",
            BaseType::Char => "char",
            BaseType::Double => "double",
            BaseType::Float => "float",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::Short => "short",
            BaseType::Boolean => "boolean",
        }
    }

    /// Slots occupied in the local variable table
    pub fn width(self) -> u16 {
        match self {
            BaseType::Double | BaseType::Long => 2,
            _ => 1,
        }
    }
}

/// An erased field type, or `void` in return position
///
/// Arrays keep a flattened `(element, dims)` pair: the element is never
/// itself an array and `dims` is at least 1. Values produced by [`parse`]
/// and the factory methods are interned.
///
/// [`parse`]: TypeDescriptor::parse
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeDescriptor {
    Base(BaseType),
    Void,
    Object(String),
    Array { dims: u32, element: Box<TypeDescriptor> },
}

fn descriptor_pool() -> &'static Interner<TypeDescriptor> {
    static POOL: OnceLock<Interner<TypeDescriptor>> = OnceLock::new();
    POOL.get_or_init(Interner::new)
}

impl TypeDescriptor {
    /// Parse a complete field descriptor (or `V`) and intern the result
    pub fn parse(text: &str) -> Result<Arc<TypeDescriptor>> {
        Ok(descriptor_pool().intern(Self::parse_return(text)?))
    }

    /// Parse one descriptor starting at `start`, interning the result
    pub fn parse_prefix(text: &str, start: usize) -> Result<(Arc<TypeDescriptor>, usize)> {
        let (parsed, next) = <Self as JvmText>::parse_at(text, start)?;
        Ok((descriptor_pool().intern(parsed), next))
    }

    /// Parse a descriptor in return position, where `V` is permitted
    fn parse_return(text: &str) -> Result<TypeDescriptor> {
        if text == "V" {
            return Ok(TypeDescriptor::Void);
        }
        <Self as JvmText>::parse_full(text)
    }

    pub fn base(base: BaseType) -> Arc<TypeDescriptor> {
        descriptor_pool().intern(TypeDescriptor::Base(base))
    }

    pub fn void() -> Arc<TypeDescriptor> {
        descriptor_pool().intern(TypeDescriptor::Void)
    }

    pub fn object(class_name: impl Into<String>) -> Arc<TypeDescriptor> {
        descriptor_pool().intern(TypeDescriptor::Object(class_name.into()))
    }

    /// Wrap `element` in `dims` array dimensions, folding nested arrays
    pub fn array(dims: u32, element: TypeDescriptor) -> Arc<TypeDescriptor> {
        assert!(dims >= 1, "array dimension must be at least 1");
        let folded = match element {
            TypeDescriptor::Array {
                dims: inner,
                element,
            } => TypeDescriptor::Array {
                dims: dims + inner,
                element,
            },
            other => TypeDescriptor::Array {
                dims,
                element: Box::new(other),
            },
        };
        descriptor_pool().intern(folded)
    }

    pub(crate) fn interned(self) -> Arc<TypeDescriptor> {
        descriptor_pool().intern(self)
    }

    /// The internal name when this is a plain class type
    pub fn class_name(&self) -> Option<&str> {
        match self {
            TypeDescriptor::Object(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDescriptor::Void)
    }

    /// Slots occupied in the local variable table
    pub fn width(&self) -> u16 {
        match self {
            TypeDescriptor::Base(base) => base.width(),
            TypeDescriptor::Void => 0,
            _ => 1,
        }
    }
}

impl JvmText for TypeDescriptor {
    const WHAT: &'static str = "type descriptor";

    fn render_to(&self, write_to: &mut String) {
        match self {
            TypeDescriptor::Base(base) => write_to.push(base.letter()),
            TypeDescriptor::Void => write_to.push('V'),
            TypeDescriptor::Object(name) => {
                write_to.push('L');
                write_to.push_str(name);
                write_to.push(';');
            }
            TypeDescriptor::Array { dims, element } => {
                for _ in 0..*dims {
                    write_to.push('[');
                }
                element.render_to(write_to);
            }
        }
    }

    fn render_pretty_to(&self, write_to: &mut String) {
        match self {
            TypeDescriptor::Base(base) => write_to.push_str(base.keyword()),
            TypeDescriptor::Void => write_to.push_str("void"),
            TypeDescriptor::Object(name) => push_dotted(name, write_to),
            TypeDescriptor::Array { dims, element } => {
                element.render_pretty_to(write_to);
                for _ in 0..*dims {
                    write_to.push_str("[]");
                }
            }
        }
    }

    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self> {
        match cursor.peek() {
            None => Err(cursor.fail::<Self>("missing type")),
            Some(b'L') => {
                cursor.bump();
                let name = cursor.take_until::<Self>(b';', "class descriptor")?;
                Ok(TypeDescriptor::Object(name.to_string()))
            }
            Some(b'[') => {
                let mut dims = 0u32;
                while cursor.eat(b'[') {
                    dims += 1;
                }
                if cursor.at_end() {
                    return Err(cursor.fail::<Self>("array with no element type"));
                }
                let element = TypeDescriptor::parse_from(cursor)?;
                Ok(TypeDescriptor::Array {
                    dims,
                    element: Box::new(element),
                })
            }
            Some(b) => match BaseType::from_byte(b) {
                Some(base) => {
                    cursor.bump();
                    Ok(TypeDescriptor::Base(base))
                }
                None => Err(cursor.fail::<Self>(format!(
                    "unknown leading character '{}' where a type was expected",
                    b as char
                ))),
            },
        }
    }
}

impl std::fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render_pretty())
    }
}

/// The erased shape of a method: parameter list and return type
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodDescriptor {
    pub parameters: Vec<TypeDescriptor>,
    pub return_type: TypeDescriptor,
}

fn method_descriptor_pool() -> &'static Interner<MethodDescriptor> {
    static POOL: OnceLock<Interner<MethodDescriptor>> = OnceLock::new();
    POOL.get_or_init(Interner::new)
}

impl MethodDescriptor {
    /// Parse a complete method descriptor and intern the result
    pub fn parse(text: &str) -> Result<Arc<MethodDescriptor>> {
        Ok(method_descriptor_pool().intern(<Self as JvmText>::parse_full(text)?))
    }

    pub fn parse_prefix(text: &str, start: usize) -> Result<(Arc<MethodDescriptor>, usize)> {
        let (parsed, next) = <Self as JvmText>::parse_at(text, start)?;
        Ok((method_descriptor_pool().intern(parsed), next))
    }

    pub fn of(
        parameters: Vec<TypeDescriptor>,
        return_type: TypeDescriptor,
    ) -> Arc<MethodDescriptor> {
        method_descriptor_pool().intern(MethodDescriptor {
            parameters,
            return_type,
        })
    }

    pub(crate) fn interned(self) -> Arc<MethodDescriptor> {
        method_descriptor_pool().intern(self)
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameter(&self, index: usize) -> Option<&TypeDescriptor> {
        self.parameters.get(index)
    }

    /// LVT slot of each parameter, accounting for the implicit receiver and
    /// for long/double taking two slots
    pub fn lvt_indices(&self, implicit_this: bool) -> Vec<u16> {
        let mut slot: u16 = if implicit_this { 1 } else { 0 };
        let mut slots = Vec::with_capacity(self.parameters.len());
        for parameter in &self.parameters {
            slots.push(slot);
            slot += parameter.width();
        }
        slots
    }
}

impl JvmText for MethodDescriptor {
    const WHAT: &'static str = "method descriptor";

    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        self.return_type.render_to(write_to);
    }

    fn render_pretty_to(&self, write_to: &mut String) {
        self.return_type.render_pretty_to(write_to);
        write_to.push_str(" (");
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                write_to.push_str(", ");
            }
            parameter.render_pretty_to(write_to);
        }
        write_to.push(')');
    }

    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self> {
        if !cursor.eat(b'(') {
            return Err(cursor.fail::<Self>("method descriptor must start with '('"));
        }
        let mut parameters = vec![];
        while !cursor.eat(b')') {
            if cursor.at_end() {
                return Err(cursor.fail::<Self>("parameter list not terminated with ')'"));
            }
            if cursor.peek() == Some(b'(') {
                return Err(cursor.fail::<Self>("nested method descriptor in parameter list"));
            }
            if cursor.peek() == Some(b'V') {
                return Err(cursor.fail::<Self>("'V' is only valid as a return type"));
            }
            parameters.push(TypeDescriptor::parse_from(cursor)?);
        }
        if cursor.at_end() {
            return Err(cursor.fail::<Self>("missing return type"));
        }
        let return_type = if cursor.eat(b'V') {
            TypeDescriptor::Void
        } else {
            TypeDescriptor::parse_from(cursor)?
        };
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

impl std::fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render_pretty())
    }
}

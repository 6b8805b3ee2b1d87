//! Generic type signatures
//!
//! The generic-preserving companion grammar to [`super::descriptors`]: class
//! types with type arguments and owner chains, type variables, wildcards,
//! method and class signatures. See JVMS §4.7.9.1.
//!
//! Type variables parse *unbound*. [`bind`] walks a signature and attaches
//! the declaring [`TypeParameter`] to each variable a resolver knows about;
//! erasing an unbound variable to a descriptor fails.
//!
//! [`bind`]: TypeSignature::bind

use super::intern::Interner;
use super::{push_dotted, Cursor, JvmText};
use super::{BaseType, MethodDescriptor, TypeDescriptor};
use crate::errors::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// A type in signature position
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeSignature {
    Base(BaseType),
    Void,
    Reference(ReferenceTypeSignature),
}

/// A reference type in signature position
///
/// Array elements are flattened the same way descriptors are: the element is
/// never itself an array.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ReferenceTypeSignature {
    Class(ClassTypeSignature),
    TypeVariable(TypeVariable),
    Array { dims: u32, element: Box<TypeSignature> },
}

/// A possibly-generic class type, innermost member of its owner chain
///
/// `Ljava/util/Map$Entry;` in generic form is
/// `Ljava/util/Map<TK;TV;>.Entry;`: the node for `Entry` owns a node for
/// `java/util/Map`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ClassTypeSignature {
    pub owner: Option<Box<ClassTypeSignature>>,
    /// Slash-qualified for the outermost segment, simple name for members
    pub name: String,
    pub arguments: Vec<TypeArgument>,
}

/// One argument inside `<` ... `>`
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeArgument {
    /// `*`
    Wildcard,
    /// `+` bound
    Extends(ReferenceTypeSignature),
    /// `-` bound
    Super(ReferenceTypeSignature),
    Exact(ReferenceTypeSignature),
}

/// A use of a type variable, optionally bound to its declaration
#[derive(Clone, Debug)]
pub struct TypeVariable {
    pub name: String,
    pub binding: Option<Arc<TypeParameter>>,
}

impl TypeVariable {
    pub fn unbound(name: impl Into<String>) -> TypeVariable {
        TypeVariable {
            name: name.into(),
            binding: None,
        }
    }

    fn binding_name(&self) -> Option<&str> {
        self.binding.as_deref().map(|p| p.name.as_str())
    }
}

// Comparing by variable name plus the bound parameter's name keeps equality
// shallow even when a parameter's own bounds mention further variables.
impl PartialEq for TypeVariable {
    fn eq(&self, other: &TypeVariable) -> bool {
        self.name == other.name && self.binding_name() == other.binding_name()
    }
}

impl Eq for TypeVariable {}

impl Hash for TypeVariable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.binding_name().hash(state);
    }
}

/// A type-parameter declaration: `name:` class bound `:` interface bounds
///
/// Bounds are stored as parsed, i.e. any variables they mention stay
/// unbound; erasure treats such variables as `java/lang/Object`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TypeParameter {
    pub name: String,
    pub class_bound: Option<ReferenceTypeSignature>,
    pub interface_bounds: Vec<ReferenceTypeSignature>,
}

impl TypeParameter {
    /// A parameter with no bounds, erasing to `java/lang/Object`
    pub fn unbounded(name: impl Into<String>) -> Arc<TypeParameter> {
        Arc::new(TypeParameter {
            name: name.into(),
            class_bound: None,
            interface_bounds: vec![],
        })
    }

    /// The erased descriptor of this parameter
    pub fn erasure(&self) -> Arc<TypeDescriptor> {
        self.class_bound
            .as_ref()
            .or_else(|| self.interface_bounds.first())
            .map(ReferenceTypeSignature::erase_or_object)
            .unwrap_or_else(|| TypeDescriptor::object("java/lang/Object"))
    }
}

/// An entry in a method signature's throws list
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ThrowsSignature {
    Class(ClassTypeSignature),
    TypeVariable(TypeVariable),
}

/// The generic shape of a method
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodSignature {
    pub type_parameters: Vec<Arc<TypeParameter>>,
    pub parameters: Vec<TypeSignature>,
    pub return_type: TypeSignature,
    pub throws: Vec<ThrowsSignature>,
}

/// The generic shape of a class declaration
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ClassSignature {
    pub type_parameters: Vec<Arc<TypeParameter>>,
    pub superclass: ClassTypeSignature,
    pub interfaces: Vec<ClassTypeSignature>,
}

fn signature_pool() -> &'static Interner<TypeSignature> {
    static POOL: OnceLock<Interner<TypeSignature>> = OnceLock::new();
    POOL.get_or_init(Interner::new)
}

fn method_signature_pool() -> &'static Interner<MethodSignature> {
    static POOL: OnceLock<Interner<MethodSignature>> = OnceLock::new();
    POOL.get_or_init(Interner::new)
}

fn class_signature_pool() -> &'static Interner<ClassSignature> {
    static POOL: OnceLock<Interner<ClassSignature>> = OnceLock::new();
    POOL.get_or_init(Interner::new)
}

/// Maps a type-variable name to its declaring parameter
pub trait TypeVariableResolver {
    fn resolve(&self, name: &str) -> Option<Arc<TypeParameter>>;
}

/// Resolver that fabricates an unbounded parameter for every name it is
/// asked about. Used when a signature must always bind but accuracy does
/// not matter.
#[derive(Default)]
pub struct SyntheticResolver {
    fabricated: Mutex<HashMap<String, Arc<TypeParameter>>>,
}

impl SyntheticResolver {
    pub fn new() -> SyntheticResolver {
        SyntheticResolver::default()
    }
}

impl TypeVariableResolver for SyntheticResolver {
    fn resolve(&self, name: &str) -> Option<Arc<TypeParameter>> {
        let mut fabricated = self.fabricated.lock();
        Some(
            fabricated
                .entry(name.to_string())
                .or_insert_with(|| TypeParameter::unbounded(name))
                .clone(),
        )
    }
}

/// Resolver over an explicit parameter list, falling back to an outer scope
struct ScopedResolver<'a> {
    parameters: &'a [Arc<TypeParameter>],
    outer: Option<&'a dyn TypeVariableResolver>,
}

impl TypeVariableResolver for ScopedResolver<'_> {
    fn resolve(&self, name: &str) -> Option<Arc<TypeParameter>> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .or_else(|| self.outer.and_then(|outer| outer.resolve(name)))
    }
}

impl TypeSignature {
    /// Parse a complete type signature (or `V`) and intern the result
    pub fn parse(text: &str) -> Result<Arc<TypeSignature>> {
        if text == "V" {
            return Ok(signature_pool().intern(TypeSignature::Void));
        }
        Ok(signature_pool().intern(<Self as JvmText>::parse_full(text)?))
    }

    pub fn parse_prefix(text: &str, start: usize) -> Result<(Arc<TypeSignature>, usize)> {
        let (parsed, next) = <Self as JvmText>::parse_at(text, start)?;
        Ok((signature_pool().intern(parsed), next))
    }

    /// Does any type variable in this signature lack a binding?
    pub fn is_unbound(&self) -> bool {
        match self {
            TypeSignature::Base(_) | TypeSignature::Void => false,
            TypeSignature::Reference(reference) => reference.is_unbound(),
        }
    }

    /// Attach declaring parameters to every variable `resolver` knows about.
    /// Variables the resolver cannot place are left unbound.
    pub fn bind(&self, resolver: &dyn TypeVariableResolver) -> TypeSignature {
        match self {
            TypeSignature::Base(_) | TypeSignature::Void => self.clone(),
            TypeSignature::Reference(reference) => {
                TypeSignature::Reference(reference.bind(resolver))
            }
        }
    }

    /// Strip all bindings, restoring the as-parsed form
    pub fn unbind(&self) -> TypeSignature {
        match self {
            TypeSignature::Base(_) | TypeSignature::Void => self.clone(),
            TypeSignature::Reference(reference) => TypeSignature::Reference(reference.unbind()),
        }
    }

    /// Erase to a descriptor. Fails with an unbound-variable error if any
    /// reachable type variable has no binding.
    pub fn as_descriptor(&self) -> Result<Arc<TypeDescriptor>> {
        Ok(match self {
            TypeSignature::Base(base) => TypeDescriptor::base(*base),
            TypeSignature::Void => TypeDescriptor::void(),
            TypeSignature::Reference(reference) => return reference.as_descriptor(),
        })
    }
}

impl ReferenceTypeSignature {
    pub fn is_unbound(&self) -> bool {
        match self {
            ReferenceTypeSignature::Class(class) => class.is_unbound(),
            ReferenceTypeSignature::TypeVariable(var) => var.binding.is_none(),
            ReferenceTypeSignature::Array { element, .. } => element.is_unbound(),
        }
    }

    pub fn bind(&self, resolver: &dyn TypeVariableResolver) -> ReferenceTypeSignature {
        match self {
            ReferenceTypeSignature::Class(class) => {
                ReferenceTypeSignature::Class(class.bind(resolver))
            }
            ReferenceTypeSignature::TypeVariable(var) => {
                ReferenceTypeSignature::TypeVariable(TypeVariable {
                    name: var.name.clone(),
                    binding: var
                        .binding
                        .clone()
                        .or_else(|| resolver.resolve(&var.name)),
                })
            }
            ReferenceTypeSignature::Array { dims, element } => ReferenceTypeSignature::Array {
                dims: *dims,
                element: Box::new(element.bind(resolver)),
            },
        }
    }

    pub fn unbind(&self) -> ReferenceTypeSignature {
        match self {
            ReferenceTypeSignature::Class(class) => ReferenceTypeSignature::Class(class.unbind()),
            ReferenceTypeSignature::TypeVariable(var) => {
                ReferenceTypeSignature::TypeVariable(TypeVariable::unbound(var.name.clone()))
            }
            ReferenceTypeSignature::Array { dims, element } => ReferenceTypeSignature::Array {
                dims: *dims,
                element: Box::new(element.unbind()),
            },
        }
    }

    pub fn as_descriptor(&self) -> Result<Arc<TypeDescriptor>> {
        match self {
            ReferenceTypeSignature::Class(class) => {
                Ok(TypeDescriptor::object(class.erased_name()))
            }
            ReferenceTypeSignature::TypeVariable(var) => match &var.binding {
                Some(parameter) => Ok(parameter.erasure()),
                None => Err(Error::UnboundTypeVariable(var.name.clone())),
            },
            ReferenceTypeSignature::Array { dims, element } => {
                let element = element.as_descriptor()?;
                Ok(TypeDescriptor::array(*dims, (*element).clone()))
            }
        }
    }

    /// Erasure for bound positions: unbound variables degrade to Object
    /// instead of failing. Used for type-parameter bounds.
    fn erase_or_object(&self) -> Arc<TypeDescriptor> {
        match self {
            ReferenceTypeSignature::TypeVariable(var) => match &var.binding {
                Some(parameter) => parameter.erasure(),
                None => TypeDescriptor::object("java/lang/Object"),
            },
            other => other
                .as_descriptor()
                .unwrap_or_else(|_| TypeDescriptor::object("java/lang/Object")),
        }
    }
}

impl ClassTypeSignature {
    /// A plain, argument-free class type
    pub fn plain(name: impl Into<String>) -> ClassTypeSignature {
        ClassTypeSignature {
            owner: None,
            name: name.into(),
            arguments: vec![],
        }
    }

    /// The erased internal name: owner chain joined with `$`
    pub fn erased_name(&self) -> String {
        match &self.owner {
            Some(owner) => format!("{}${}", owner.erased_name(), self.name),
            None => self.name.clone(),
        }
    }

    pub fn is_unbound(&self) -> bool {
        self.owner.as_ref().map(|o| o.is_unbound()).unwrap_or(false)
            || self.arguments.iter().any(|argument| match argument {
                TypeArgument::Wildcard => false,
                TypeArgument::Extends(r) | TypeArgument::Super(r) | TypeArgument::Exact(r) => {
                    r.is_unbound()
                }
            })
    }

    pub fn bind(&self, resolver: &dyn TypeVariableResolver) -> ClassTypeSignature {
        ClassTypeSignature {
            owner: self.owner.as_ref().map(|o| Box::new(o.bind(resolver))),
            name: self.name.clone(),
            arguments: self
                .arguments
                .iter()
                .map(|argument| match argument {
                    TypeArgument::Wildcard => TypeArgument::Wildcard,
                    TypeArgument::Extends(r) => TypeArgument::Extends(r.bind(resolver)),
                    TypeArgument::Super(r) => TypeArgument::Super(r.bind(resolver)),
                    TypeArgument::Exact(r) => TypeArgument::Exact(r.bind(resolver)),
                })
                .collect(),
        }
    }

    pub fn unbind(&self) -> ClassTypeSignature {
        ClassTypeSignature {
            owner: self.owner.as_ref().map(|o| Box::new(o.unbind())),
            name: self.name.clone(),
            arguments: self
                .arguments
                .iter()
                .map(|argument| match argument {
                    TypeArgument::Wildcard => TypeArgument::Wildcard,
                    TypeArgument::Extends(r) => TypeArgument::Extends(r.unbind()),
                    TypeArgument::Super(r) => TypeArgument::Super(r.unbind()),
                    TypeArgument::Exact(r) => TypeArgument::Exact(r.unbind()),
                })
                .collect(),
        }
    }

    /// Render the owner chain without the leading `L` / trailing `;`
    fn render_chain(&self, write_to: &mut String) {
        if let Some(owner) = &self.owner {
            owner.render_chain(write_to);
            write_to.push('.');
        }
        write_to.push_str(&self.name);
        if !self.arguments.is_empty() {
            write_to.push('<');
            for argument in &self.arguments {
                argument.render_to(write_to);
            }
            write_to.push('>');
        }
    }

    fn render_chain_pretty(&self, write_to: &mut String) {
        if let Some(owner) = &self.owner {
            owner.render_chain_pretty(write_to);
            write_to.push('.');
        }
        push_dotted(&self.name, write_to);
        if !self.arguments.is_empty() {
            write_to.push('<');
            for (i, argument) in self.arguments.iter().enumerate() {
                if i > 0 {
                    write_to.push_str(", ");
                }
                argument.render_pretty_to(write_to);
            }
            write_to.push('>');
        }
    }

    /// Parse the part after the leading `L`, stopping before `;`
    fn parse_chain(cursor: &mut Cursor<'_>) -> Result<ClassTypeSignature> {
        let mut name = String::from(cursor.take_identifier());
        if name.is_empty() {
            return Err(cursor.fail::<Self>("empty class name"));
        }
        while cursor.eat(b'/') {
            name.push('/');
            name.push_str(cursor.take_identifier());
        }
        let mut current = ClassTypeSignature {
            owner: None,
            name,
            arguments: Self::parse_arguments(cursor)?,
        };
        while cursor.eat(b'.') {
            let simple = cursor.take_identifier();
            if simple.is_empty() {
                return Err(cursor.fail::<Self>("empty member class name"));
            }
            current = ClassTypeSignature {
                owner: Some(Box::new(current)),
                name: simple.to_string(),
                arguments: Self::parse_arguments(cursor)?,
            };
        }
        Ok(current)
    }

    fn parse_arguments(cursor: &mut Cursor<'_>) -> Result<Vec<TypeArgument>> {
        let mut arguments = vec![];
        if cursor.eat(b'<') {
            loop {
                match cursor.peek() {
                    Some(b'>') => {
                        cursor.bump();
                        break;
                    }
                    None => {
                        return Err(cursor
                            .fail::<Self>("type-argument list not terminated with '>'"))
                    }
                    _ => arguments.push(TypeArgument::parse_from(cursor)?),
                }
            }
            if arguments.is_empty() {
                return Err(cursor.fail::<Self>("empty type-argument list"));
            }
        }
        Ok(arguments)
    }
}

impl JvmText for ClassTypeSignature {
    const WHAT: &'static str = "class type signature";

    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        self.render_chain(write_to);
        write_to.push(';');
    }

    fn render_pretty_to(&self, write_to: &mut String) {
        self.render_chain_pretty(write_to);
    }

    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self> {
        if !cursor.eat(b'L') {
            return Err(cursor.fail::<Self>("class type signature must start with 'L'"));
        }
        let parsed = Self::parse_chain(cursor)?;
        if !cursor.eat(b';') {
            return Err(cursor.fail::<Self>("class type signature not terminated with ';'"));
        }
        Ok(parsed)
    }
}

impl JvmText for TypeArgument {
    const WHAT: &'static str = "type argument";

    fn render_to(&self, write_to: &mut String) {
        match self {
            TypeArgument::Wildcard => write_to.push('*'),
            TypeArgument::Extends(reference) => {
                write_to.push('+');
                reference.render_to(write_to);
            }
            TypeArgument::Super(reference) => {
                write_to.push('-');
                reference.render_to(write_to);
            }
            TypeArgument::Exact(reference) => reference.render_to(write_to),
        }
    }

    fn render_pretty_to(&self, write_to: &mut String) {
        match self {
            TypeArgument::Wildcard => write_to.push('?'),
            TypeArgument::Extends(reference) => {
                write_to.push_str("? extends ");
                reference.render_pretty_to(write_to);
            }
            TypeArgument::Super(reference) => {
                write_to.push_str("? super ");
                reference.render_pretty_to(write_to);
            }
            TypeArgument::Exact(reference) => reference.render_pretty_to(write_to),
        }
    }

    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self> {
        match cursor.peek() {
            Some(b'*') => {
                cursor.bump();
                Ok(TypeArgument::Wildcard)
            }
            Some(b'+') => {
                cursor.bump();
                Ok(TypeArgument::Extends(ReferenceTypeSignature::parse_from(
                    cursor,
                )?))
            }
            Some(b'-') => {
                cursor.bump();
                Ok(TypeArgument::Super(ReferenceTypeSignature::parse_from(
                    cursor,
                )?))
            }
            _ => Ok(TypeArgument::Exact(ReferenceTypeSignature::parse_from(
                cursor,
            )?)),
        }
    }
}

impl JvmText for ReferenceTypeSignature {
    const WHAT: &'static str = "reference type signature";

    fn render_to(&self, write_to: &mut String) {
        match self {
            ReferenceTypeSignature::Class(class) => class.render_to(write_to),
            ReferenceTypeSignature::TypeVariable(var) => {
                write_to.push('T');
                write_to.push_str(&var.name);
                write_to.push(';');
            }
            ReferenceTypeSignature::Array { dims, element } => {
                for _ in 0..*dims {
                    write_to.push('[');
                }
                element.render_to(write_to);
            }
        }
    }

    fn render_pretty_to(&self, write_to: &mut String) {
        match self {
            ReferenceTypeSignature::Class(class) => class.render_pretty_to(write_to),
            ReferenceTypeSignature::TypeVariable(var) => write_to.push_str(&var.name),
            ReferenceTypeSignature::Array { dims, element } => {
                element.render_pretty_to(write_to);
                for _ in 0..*dims {
                    write_to.push_str("[]");
                }
            }
        }
    }

    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self> {
        match cursor.peek() {
            None => Err(cursor.fail::<Self>("missing reference type")),
            Some(b'L') => Ok(ReferenceTypeSignature::Class(
                ClassTypeSignature::parse_from(cursor)?,
            )),
            Some(b'T') => {
                cursor.bump();
                let name = cursor.take_until::<Self>(b';', "type variable")?;
                if name.is_empty() {
                    return Err(cursor.fail::<Self>("empty type variable name"));
                }
                Ok(ReferenceTypeSignature::TypeVariable(TypeVariable::unbound(
                    name,
                )))
            }
            Some(b'[') => {
                let mut dims = 0u32;
                while cursor.eat(b'[') {
                    dims += 1;
                }
                if cursor.at_end() {
                    return Err(cursor.fail::<Self>("array with no element type"));
                }
                let element = TypeSignature::parse_from(cursor)?;
                Ok(ReferenceTypeSignature::Array {
                    dims,
                    element: Box::new(element),
                })
            }
            Some(b) => Err(cursor.fail::<Self>(format!(
                "unknown leading character '{}' where a reference type was expected",
                b as char
            ))),
        }
    }
}

impl JvmText for TypeSignature {
    const WHAT: &'static str = "type signature";

    fn render_to(&self, write_to: &mut String) {
        match self {
            TypeSignature::Base(base) => write_to.push(base.letter()),
            TypeSignature::Void => write_to.push('V'),
            TypeSignature::Reference(reference) => reference.render_to(write_to),
        }
    }

    fn render_pretty_to(&self, write_to: &mut String) {
        match self {
            TypeSignature::Base(base) => write_to.push_str(base.keyword()),
            TypeSignature::Void => write_to.push_str("void"),
            TypeSignature::Reference(reference) => reference.render_pretty_to(write_to),
        }
    }

    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self> {
        match cursor.peek() {
            None => Err(cursor.fail::<Self>("missing type")),
            Some(b'L') | Some(b'T') | Some(b'[') => Ok(TypeSignature::Reference(
                ReferenceTypeSignature::parse_from(cursor)?,
            )),
            Some(b) => match BaseType::from_byte(b) {
                Some(base) => {
                    cursor.bump();
                    Ok(TypeSignature::Base(base))
                }
                None => Err(cursor.fail::<Self>(format!(
                    "unknown leading character '{}' where a type was expected",
                    b as char
                ))),
            },
        }
    }
}

impl JvmText for ThrowsSignature {
    const WHAT: &'static str = "throws signature";

    fn render_to(&self, write_to: &mut String) {
        match self {
            ThrowsSignature::Class(class) => class.render_to(write_to),
            ThrowsSignature::TypeVariable(var) => {
                write_to.push('T');
                write_to.push_str(&var.name);
                write_to.push(';');
            }
        }
    }

    fn render_pretty_to(&self, write_to: &mut String) {
        match self {
            ThrowsSignature::Class(class) => class.render_pretty_to(write_to),
            ThrowsSignature::TypeVariable(var) => write_to.push_str(&var.name),
        }
    }

    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self> {
        match ReferenceTypeSignature::parse_from(cursor)? {
            ReferenceTypeSignature::Class(class) => Ok(ThrowsSignature::Class(class)),
            ReferenceTypeSignature::TypeVariable(var) => Ok(ThrowsSignature::TypeVariable(var)),
            ReferenceTypeSignature::Array { .. } => {
                Err(cursor.fail::<Self>("array types cannot be thrown"))
            }
        }
    }
}

impl ThrowsSignature {
    fn bind(&self, resolver: &dyn TypeVariableResolver) -> ThrowsSignature {
        match self {
            ThrowsSignature::Class(class) => ThrowsSignature::Class(class.bind(resolver)),
            ThrowsSignature::TypeVariable(var) => ThrowsSignature::TypeVariable(TypeVariable {
                name: var.name.clone(),
                binding: var.binding.clone().or_else(|| resolver.resolve(&var.name)),
            }),
        }
    }

    fn unbind(&self) -> ThrowsSignature {
        match self {
            ThrowsSignature::Class(class) => ThrowsSignature::Class(class.unbind()),
            ThrowsSignature::TypeVariable(var) => {
                ThrowsSignature::TypeVariable(TypeVariable::unbound(var.name.clone()))
            }
        }
    }

    fn is_unbound(&self) -> bool {
        match self {
            ThrowsSignature::Class(class) => class.is_unbound(),
            ThrowsSignature::TypeVariable(var) => var.binding.is_none(),
        }
    }
}

/// Parse a `<` parameter+ `>` block if one is present
fn parse_type_parameters<T: JvmText>(cursor: &mut Cursor<'_>) -> Result<Vec<Arc<TypeParameter>>> {
    let mut parameters = vec![];
    if cursor.eat(b'<') {
        loop {
            match cursor.peek() {
                Some(b'>') => {
                    cursor.bump();
                    break;
                }
                None => {
                    return Err(
                        cursor.fail::<T>("type-parameter list not terminated with '>'")
                    )
                }
                _ => {
                    let name = cursor.take_identifier();
                    if name.is_empty() {
                        return Err(cursor.fail::<T>("empty type-parameter name"));
                    }
                    if !cursor.eat(b':') {
                        return Err(cursor.fail::<T>("type parameter missing ':' bound"));
                    }
                    // The class bound may be empty: `T::Ljava/lang/Comparable;`
                    let class_bound = match cursor.peek() {
                        Some(b':') | Some(b'>') | None => None,
                        _ => Some(ReferenceTypeSignature::parse_from(cursor)?),
                    };
                    let mut interface_bounds = vec![];
                    while cursor.eat(b':') {
                        interface_bounds.push(ReferenceTypeSignature::parse_from(cursor)?);
                    }
                    parameters.push(Arc::new(TypeParameter {
                        name: name.to_string(),
                        class_bound,
                        interface_bounds,
                    }));
                }
            }
        }
        if parameters.is_empty() {
            return Err(cursor.fail::<T>("empty type-parameter list"));
        }
    }
    Ok(parameters)
}

fn render_type_parameters(parameters: &[Arc<TypeParameter>], write_to: &mut String) {
    if parameters.is_empty() {
        return;
    }
    write_to.push('<');
    for parameter in parameters {
        write_to.push_str(&parameter.name);
        write_to.push(':');
        if let Some(class_bound) = &parameter.class_bound {
            class_bound.render_to(write_to);
        }
        for interface_bound in &parameter.interface_bounds {
            write_to.push(':');
            interface_bound.render_to(write_to);
        }
    }
    write_to.push('>');
}

fn render_type_parameters_pretty(parameters: &[Arc<TypeParameter>], write_to: &mut String) {
    if parameters.is_empty() {
        return;
    }
    write_to.push('<');
    for (i, parameter) in parameters.iter().enumerate() {
        if i > 0 {
            write_to.push_str(", ");
        }
        write_to.push_str(&parameter.name);
    }
    write_to.push_str("> ");
}

impl MethodSignature {
    /// Parse a complete method signature and intern the result
    pub fn parse(text: &str) -> Result<Arc<MethodSignature>> {
        Ok(method_signature_pool().intern(<Self as JvmText>::parse_full(text)?))
    }

    pub fn parse_prefix(text: &str, start: usize) -> Result<(Arc<MethodSignature>, usize)> {
        let (parsed, next) = <Self as JvmText>::parse_at(text, start)?;
        Ok((method_signature_pool().intern(parsed), next))
    }

    pub fn is_unbound(&self) -> bool {
        self.parameters.iter().any(TypeSignature::is_unbound)
            || self.return_type.is_unbound()
            || self.throws.iter().any(ThrowsSignature::is_unbound)
    }

    /// Bind variables against this signature's own type parameters first,
    /// then against `outer` (typically the declaring class's signature)
    pub fn bind(&self, outer: Option<&dyn TypeVariableResolver>) -> MethodSignature {
        let scope = ScopedResolver {
            parameters: &self.type_parameters,
            outer,
        };
        MethodSignature {
            type_parameters: self.type_parameters.clone(),
            parameters: self.parameters.iter().map(|p| p.bind(&scope)).collect(),
            return_type: self.return_type.bind(&scope),
            throws: self.throws.iter().map(|t| t.bind(&scope)).collect(),
        }
    }

    pub fn unbind(&self) -> MethodSignature {
        MethodSignature {
            type_parameters: self.type_parameters.clone(),
            parameters: self.parameters.iter().map(TypeSignature::unbind).collect(),
            return_type: self.return_type.unbind(),
            throws: self.throws.iter().map(ThrowsSignature::unbind).collect(),
        }
    }

    /// Erase to a method descriptor; fails on unbound variables
    pub fn as_descriptor(&self) -> Result<Arc<MethodDescriptor>> {
        let mut parameters = Vec::with_capacity(self.parameters.len());
        for parameter in &self.parameters {
            parameters.push((*parameter.as_descriptor()?).clone());
        }
        let return_type = (*self.return_type.as_descriptor()?).clone();
        Ok(MethodDescriptor::of(parameters, return_type))
    }
}

impl JvmText for MethodSignature {
    const WHAT: &'static str = "method signature";

    fn render_to(&self, write_to: &mut String) {
        render_type_parameters(&self.type_parameters, write_to);
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        self.return_type.render_to(write_to);
        for throws in &self.throws {
            write_to.push('^');
            throws.render_to(write_to);
        }
    }

    fn render_pretty_to(&self, write_to: &mut String) {
        render_type_parameters_pretty(&self.type_parameters, write_to);
        self.return_type.render_pretty_to(write_to);
        write_to.push_str(" (");
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                write_to.push_str(", ");
            }
            parameter.render_pretty_to(write_to);
        }
        write_to.push(')');
        for (i, throws) in self.throws.iter().enumerate() {
            write_to.push_str(if i == 0 { " throws " } else { ", " });
            throws.render_pretty_to(write_to);
        }
    }

    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self> {
        let type_parameters = parse_type_parameters::<Self>(cursor)?;
        if !cursor.eat(b'(') {
            return Err(cursor.fail::<Self>("method signature missing '(' parameter list"));
        }
        let mut parameters = vec![];
        while !cursor.eat(b')') {
            if cursor.at_end() {
                return Err(cursor.fail::<Self>("parameter list not terminated with ')'"));
            }
            parameters.push(TypeSignature::parse_from(cursor)?);
        }
        if cursor.at_end() {
            return Err(cursor.fail::<Self>("method signature missing return type"));
        }
        let return_type = if cursor.eat(b'V') {
            TypeSignature::Void
        } else {
            TypeSignature::parse_from(cursor)?
        };
        let mut throws = vec![];
        while cursor.eat(b'^') {
            throws.push(ThrowsSignature::parse_from(cursor)?);
        }
        Ok(MethodSignature {
            type_parameters,
            parameters,
            return_type,
            throws,
        })
    }
}

impl ClassSignature {
    /// Parse a complete class signature and intern the result
    pub fn parse(text: &str) -> Result<Arc<ClassSignature>> {
        Ok(class_signature_pool().intern(<Self as JvmText>::parse_full(text)?))
    }

    pub fn parse_prefix(text: &str, start: usize) -> Result<(Arc<ClassSignature>, usize)> {
        let (parsed, next) = <Self as JvmText>::parse_at(text, start)?;
        Ok((class_signature_pool().intern(parsed), next))
    }

    /// Bind the super class and interface signatures against this
    /// signature's own type parameters, then `outer`
    pub fn bind(&self, outer: Option<&dyn TypeVariableResolver>) -> ClassSignature {
        let scope = ScopedResolver {
            parameters: &self.type_parameters,
            outer,
        };
        ClassSignature {
            type_parameters: self.type_parameters.clone(),
            superclass: self.superclass.bind(&scope),
            interfaces: self.interfaces.iter().map(|i| i.bind(&scope)).collect(),
        }
    }

    /// A resolver over this signature's type parameters
    pub fn resolver(&self) -> impl TypeVariableResolver + '_ {
        ScopedResolver {
            parameters: &self.type_parameters,
            outer: None,
        }
    }
}

impl JvmText for ClassSignature {
    const WHAT: &'static str = "class signature";

    fn render_to(&self, write_to: &mut String) {
        render_type_parameters(&self.type_parameters, write_to);
        self.superclass.render_to(write_to);
        for interface in &self.interfaces {
            interface.render_to(write_to);
        }
    }

    fn render_pretty_to(&self, write_to: &mut String) {
        render_type_parameters_pretty(&self.type_parameters, write_to);
        write_to.push_str("extends ");
        self.superclass.render_pretty_to(write_to);
        for (i, interface) in self.interfaces.iter().enumerate() {
            write_to.push_str(if i == 0 { " implements " } else { ", " });
            interface.render_pretty_to(write_to);
        }
    }

    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self> {
        let type_parameters = parse_type_parameters::<Self>(cursor)?;
        if cursor.at_end() {
            return Err(cursor.fail::<Self>("class signature missing superclass"));
        }
        let superclass = ClassTypeSignature::parse_from(cursor)?;
        let mut interfaces = vec![];
        while !cursor.at_end() && cursor.peek() == Some(b'L') {
            interfaces.push(ClassTypeSignature::parse_from(cursor)?);
        }
        Ok(ClassSignature {
            type_parameters,
            superclass,
            interfaces,
        })
    }
}

impl TypeDescriptor {
    /// Embed this descriptor into the signature grammar
    pub fn as_signature(&self) -> Arc<TypeSignature> {
        fn embed(descriptor: &TypeDescriptor) -> TypeSignature {
            match descriptor {
                TypeDescriptor::Base(base) => TypeSignature::Base(*base),
                TypeDescriptor::Void => TypeSignature::Void,
                TypeDescriptor::Object(name) => TypeSignature::Reference(
                    ReferenceTypeSignature::Class(ClassTypeSignature::plain(name.clone())),
                ),
                TypeDescriptor::Array { dims, element } => {
                    TypeSignature::Reference(ReferenceTypeSignature::Array {
                        dims: *dims,
                        element: Box::new(embed(element)),
                    })
                }
            }
        }
        signature_pool().intern(embed(self))
    }
}

impl MethodDescriptor {
    /// Embed this method descriptor into the signature grammar
    pub fn as_signature(&self) -> Arc<MethodSignature> {
        method_signature_pool().intern(MethodSignature {
            type_parameters: vec![],
            parameters: self
                .parameters
                .iter()
                .map(|p| (*p.as_signature()).clone())
                .collect(),
            return_type: (*self.return_type.as_signature()).clone(),
            throws: vec![],
        })
    }
}

impl std::fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render_pretty())
    }
}

impl std::fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render_pretty())
    }
}

impl std::fmt::Display for ClassSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render_pretty())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn round_trip_signature(text: &str) {
        let parsed = TypeSignature::parse(text).unwrap();
        assert_eq!(parsed.render(), text);
    }

    #[test]
    fn signatures_round_trip() {
        round_trip_signature("I");
        round_trip_signature("TT;");
        round_trip_signature("Ljava/util/List<Ljava/lang/String;>;");
        round_trip_signature("Ljava/util/Map<TK;TV;>;");
        round_trip_signature("Ljava/util/Map<TK;TV;>.Entry;");
        round_trip_signature("[Ljava/util/List<*>;");
        round_trip_signature("Ljava/util/List<+Ljava/lang/Number;>;");
        round_trip_signature("Ljava/util/List<-TT;>;");
    }

    #[test]
    fn method_signatures_round_trip() {
        for text in [
            "()V",
            "(TT;)TT;",
            "<T:Ljava/lang/Object;>(TT;)TT;",
            "<T::Ljava/lang/Comparable<TT;>;>(Ljava/util/List<TT;>;)TT;",
            "(I)V^Ljava/io/IOException;^TX;",
        ] {
            let parsed = MethodSignature::parse(text).unwrap();
            assert_eq!(parsed.render(), text);
        }
    }

    #[test]
    fn class_signatures_round_trip() {
        for text in [
            "Ljava/lang/Object;",
            "<E:Ljava/lang/Object;>Ljava/util/AbstractList<TE;>;Ljava/util/List<TE;>;",
        ] {
            let parsed = ClassSignature::parse(text).unwrap();
            assert_eq!(parsed.render(), text);
        }
    }

    #[test]
    fn parsed_signatures_are_interned() {
        let a = TypeSignature::parse("Ljava/util/List<TT;>;").unwrap();
        let b = TypeSignature::parse("Ljava/util/List<TT;>;").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn rejects_malformed_signatures() {
        assert!(TypeSignature::parse("").is_err());
        assert!(TypeSignature::parse("TT").is_err());
        assert!(TypeSignature::parse("Ljava/util/List<").is_err());
        assert!(TypeSignature::parse("Ljava/util/List<>;").is_err());
        assert!(TypeSignature::parse("Q").is_err());
        assert!(MethodSignature::parse("<T:>").is_err());
        assert!(MethodSignature::parse("(I").is_err());
        assert!(MethodSignature::parse("(I)").is_err());
        assert!(ClassSignature::parse("<T:Ljava/lang/Object;>").is_err());
    }

    #[test]
    fn erasure_of_unbound_variable_fails() {
        let sig = TypeSignature::parse("TT;").unwrap();
        assert!(matches!(
            sig.as_descriptor(),
            Err(crate::errors::Error::UnboundTypeVariable(_))
        ));
    }

    #[test]
    fn binding_enables_erasure() {
        let sig = MethodSignature::parse("<T:Ljava/lang/Number;>(TT;)TT;").unwrap();
        let bound = sig.bind(None);
        let descriptor = bound.as_descriptor().unwrap();
        assert_eq!(descriptor.render(), "(Ljava/lang/Number;)Ljava/lang/Number;");
    }

    #[test]
    fn synthetic_resolver_always_binds() {
        let resolver = SyntheticResolver::new();
        let sig = TypeSignature::parse("TX;").unwrap();
        let bound = sig.bind(&resolver);
        assert!(!bound.is_unbound());
        assert_eq!(bound.as_descriptor().unwrap().render(), "Ljava/lang/Object;");
    }

    #[test]
    fn unbind_restores_parsed_form() {
        let sig = MethodSignature::parse("<T:Ljava/lang/Number;>(TT;)V").unwrap();
        let bound = sig.bind(None);
        assert!(!bound.is_unbound());
        let unbound = bound.unbind();
        assert!(unbound.is_unbound());
        assert_eq!(unbound.render(), sig.render());
    }

    #[test]
    fn descriptor_signature_round_trip() {
        let descriptor = TypeDescriptor::parse("[Ljava/lang/String;").unwrap();
        let back = descriptor.as_signature().as_descriptor().unwrap();
        assert!(Arc::ptr_eq(&descriptor, &back));

        let method = MethodDescriptor::parse("(IJ)Ljava/lang/Object;").unwrap();
        let back = method.as_signature().as_descriptor().unwrap();
        assert!(Arc::ptr_eq(&method, &back));
    }

    #[test]
    fn nested_class_erasure_uses_dollar_names() {
        let sig = TypeSignature::parse("Ljava/util/Map<TK;TV;>.Entry;").unwrap();
        let resolver = SyntheticResolver::new();
        let bound = sig.bind(&resolver);
        assert_eq!(
            bound.as_descriptor().unwrap().render(),
            "Ljava/util/Map$Entry;"
        );
    }
}

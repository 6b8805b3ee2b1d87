//! The class-file decoder contract
//!
//! This crate does not decode bytecode itself. A [`ClassFileDecoder`] is
//! injected into the provider and turns raw class bytes into the structural
//! view below — exactly the attributes the semantic graph and the standard
//! hydration providers consume, nothing more. Method bodies are optional and
//! reduced to the handful of instruction shapes hydration cares about.

use crate::access_flags::{
    ClassAccessFlags, FieldAccessFlags, InnerClassAccessFlags, MethodAccessFlags,
};
use crate::errors::Result;

/// Decodes one class file into its structural attributes
pub trait ClassFileDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<ClassFileData>;
}

/// Structural content of a single decoded class file
#[derive(Clone, Debug)]
pub struct ClassFileData {
    pub access_flags: ClassAccessFlags,
    /// Internal (slash) name
    pub name: String,
    /// Absent only for `java/lang/Object` and module-info
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub signature: Option<String>,
    pub fields: Vec<FieldData>,
    pub methods: Vec<MethodData>,
    /// Entries of the `InnerClasses` attribute
    pub inner_classes: Vec<InnerClassData>,
    /// The `EnclosingMethod` attribute, when present
    pub enclosing: Option<EnclosingData>,
    /// The `PermittedSubclasses` attribute, when present
    pub permitted_subclasses: Option<Vec<String>>,
    /// The `Record` attribute, when present
    pub record_components: Option<Vec<RecordComponentData>>,
}

impl ClassFileData {
    /// A minimal skeleton; used by decoders and test fixtures as a base
    pub fn new(name: impl Into<String>, access_flags: ClassAccessFlags) -> ClassFileData {
        ClassFileData {
            access_flags,
            name: name.into(),
            superclass: Some("java/lang/Object".to_string()),
            interfaces: vec![],
            signature: None,
            fields: vec![],
            methods: vec![],
            inner_classes: vec![],
            enclosing: None,
            permitted_subclasses: None,
            record_components: None,
        }
    }

    /// The `InnerClasses` entry describing this class itself, if any
    pub fn own_inner_entry(&self) -> Option<&InnerClassData> {
        self.inner_classes.iter().find(|entry| entry.inner == self.name)
    }
}

#[derive(Clone, Debug)]
pub struct FieldData {
    pub name: String,
    pub access_flags: FieldAccessFlags,
    pub descriptor: String,
    pub signature: Option<String>,
}

#[derive(Clone, Debug)]
pub struct MethodData {
    pub name: String,
    pub access_flags: MethodAccessFlags,
    pub descriptor: String,
    pub signature: Option<String>,
    /// `None` when the method is abstract/native or the decoder skipped the
    /// `Code` attribute
    pub body: Option<MethodBody>,
}

#[derive(Clone, Debug)]
pub struct InnerClassData {
    pub inner: String,
    pub outer: Option<String>,
    pub simple_name: Option<String>,
    pub access_flags: InnerClassAccessFlags,
}

/// The `EnclosingMethod` attribute
#[derive(Clone, Debug)]
pub struct EnclosingData {
    pub class: String,
    /// (name, descriptor) of the immediately enclosing method, when the
    /// class is local to one
    pub method: Option<(String, String)>,
}

#[derive(Clone, Debug)]
pub struct RecordComponentData {
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
}

/// A decoded method body, reduced to the instruction shapes hydration needs
#[derive(Clone, Debug, Default)]
pub struct MethodBody {
    pub instructions: Vec<Instruction>,
}

impl MethodBody {
    pub fn of(instructions: Vec<Instruction>) -> MethodBody {
        MethodBody { instructions }
    }
}

/// How a plain invocation dispatches
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

/// The instruction vocabulary hydration providers understand
///
/// Anything else a decoder encounters collapses to [`Instruction::Other`],
/// which the stack model treats as producing one opaque value.
#[derive(Clone, Debug)]
pub enum Instruction {
    /// Any `aload`/`iload`/`lload`/`fload`/`dload` family instruction
    Load { slot: u16 },
    /// Any store family instruction
    Store { slot: u16 },
    New { class: String },
    Dup,
    GetField {
        owner: String,
        name: String,
        descriptor: String,
    },
    Invoke {
        kind: InvokeKind,
        owner: String,
        name: String,
        descriptor: String,
    },
    InvokeDynamic {
        name: String,
        descriptor: String,
        bootstrap: BootstrapMethod,
    },
    /// Any return family instruction
    Return,
    Other,
}

/// The bootstrap method backing an `invokedynamic`
#[derive(Clone, Debug)]
pub struct BootstrapMethod {
    pub owner: String,
    pub name: String,
    pub arguments: Vec<BootstrapArgument>,
}

impl BootstrapMethod {
    /// Is this one of the `LambdaMetafactory` entry points?
    pub fn is_lambda_metafactory(&self) -> bool {
        self.owner == "java/lang/invoke/LambdaMetafactory"
            && (self.name == "metafactory" || self.name == "altMetafactory")
    }
}

#[derive(Clone, Debug)]
pub enum BootstrapArgument {
    MethodType(String),
    MethodHandle {
        kind: HandleKind,
        owner: String,
        name: String,
        descriptor: String,
    },
    Other,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

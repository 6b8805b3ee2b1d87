//! Fixture corpus support for the integration suites
//!
//! Classes are described as `ClassFileData` values. A `MemoryRoot` stores
//! each class's *name* as its byte blob and the fixture decoder resolves
//! that name back to the structural description, so the provider pipeline
//! runs exactly as it would over real bytes.

#![allow(dead_code)]

use hypo::class_file::{
    ClassFileData, ClassFileDecoder, FieldData, MethodBody, MethodData, RecordComponentData,
};
use hypo::provider::{ClassDataProvider, MemoryRoot};
use hypo::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};
use std::collections::HashMap;
use std::sync::Arc;

pub struct FixtureDecoder {
    classes: HashMap<String, ClassFileData>,
}

impl ClassFileDecoder for FixtureDecoder {
    fn decode(&self, bytes: &[u8]) -> hypo::Result<ClassFileData> {
        let name = std::str::from_utf8(bytes).expect("fixture names are UTF-8");
        self.classes.get(name).cloned().ok_or_else(|| {
            hypo::Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no fixture class named {}", name),
            ))
        })
    }
}

/// A provider whose standard root serves exactly `classes`
pub fn provider_over(classes: Vec<ClassFileData>) -> ClassDataProvider {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut root = MemoryRoot::new();
    let mut table = HashMap::new();
    for class in classes {
        root.insert(class.name.clone(), class.name.clone().into_bytes());
        table.insert(class.name.clone(), class);
    }
    ClassDataProvider::builder(Arc::new(FixtureDecoder { classes: table }))
        .root(Box::new(root))
        .build()
}

pub fn class(name: &str) -> ClassFileData {
    ClassFileData::new(name, ClassAccessFlags::PUBLIC)
}

pub fn class_extending(name: &str, superclass: &str) -> ClassFileData {
    let mut data = class(name);
    data.superclass = Some(superclass.to_string());
    data
}

pub fn interface(name: &str) -> ClassFileData {
    ClassFileData::new(
        name,
        ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
    )
}

pub fn method(name: &str, descriptor: &str) -> MethodData {
    method_with(name, descriptor, MethodAccessFlags::PUBLIC)
}

pub fn method_with(name: &str, descriptor: &str, access_flags: MethodAccessFlags) -> MethodData {
    MethodData {
        name: name.to_string(),
        access_flags,
        descriptor: descriptor.to_string(),
        signature: None,
        body: None,
    }
}

pub fn method_with_body(
    name: &str,
    descriptor: &str,
    access_flags: MethodAccessFlags,
    body: MethodBody,
) -> MethodData {
    MethodData {
        body: Some(body),
        ..method_with(name, descriptor, access_flags)
    }
}

pub fn field(name: &str, descriptor: &str) -> FieldData {
    FieldData {
        name: name.to_string(),
        access_flags: FieldAccessFlags::PRIVATE | FieldAccessFlags::FINAL,
        descriptor: descriptor.to_string(),
        signature: None,
    }
}

/// A record class with its components, backing fields, and canonical
/// constructor
pub fn record(name: &str, components: &[(&str, &str)]) -> ClassFileData {
    let mut data = class_extending(name, "java/lang/Record");
    data.access_flags |= ClassAccessFlags::FINAL;
    let mut canonical = String::from("(");
    for (component_name, descriptor) in components {
        data.fields.push(field(component_name, descriptor));
        canonical.push_str(descriptor);
    }
    canonical.push_str(")V");
    data.methods.push(method("<init>", &canonical));
    data.record_components = Some(
        components
            .iter()
            .map(|(component_name, descriptor)| RecordComponentData {
                name: component_name.to_string(),
                descriptor: descriptor.to_string(),
                signature: None,
            })
            .collect(),
    );
    data
}

/// The `Parent` / `Child01` / `Child02` hierarchy with one `method()V` on
/// each, used by the chain scenarios
pub fn parent_children_corpus() -> Vec<ClassFileData> {
    let mut parent = class("test/Parent");
    parent.methods.push(method("method", "()V"));
    let mut child01 = class_extending("test/Child01", "test/Parent");
    child01.methods.push(method("method", "()V"));
    let mut child02 = class_extending("test/Child02", "test/Parent");
    child02.methods.push(method("method", "()V"));
    vec![parent, child01, child02]
}

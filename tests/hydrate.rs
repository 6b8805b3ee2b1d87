//! Base hydration and standard-provider behavior over fixture corpora

mod common;

use common::*;
use hypo::class_file::{
    BootstrapArgument, BootstrapMethod, HandleKind, Instruction, InvokeKind, MethodBody,
};
use hypo::hydrate::{
    bridge_sources_key, bridge_target_key, hydrate_base, lambda_closure_key, lambdas_key,
    super_call_key, super_callers_key, HydrationManager,
};
use hypo::{ClassKinds, MethodAccessFlags};
use std::sync::Arc;

#[test]
fn subclasses_and_inner_classes_are_inverted() {
    let mut outer = class("test/Outer");
    outer.inner_classes.push(hypo::class_file::InnerClassData {
        inner: "test/Outer$In".to_string(),
        outer: Some("test/Outer".to_string()),
        simple_name: Some("In".to_string()),
        access_flags: hypo::InnerClassAccessFlags::PUBLIC | hypo::InnerClassAccessFlags::STATIC,
    });
    let mut inner = class("test/Outer$In");
    inner.inner_classes.push(hypo::class_file::InnerClassData {
        inner: "test/Outer$In".to_string(),
        outer: Some("test/Outer".to_string()),
        simple_name: Some("In".to_string()),
        access_flags: hypo::InnerClassAccessFlags::PUBLIC | hypo::InnerClassAccessFlags::STATIC,
    });
    let provider = provider_over(vec![
        outer,
        inner,
        class_extending("test/Base", "java/lang/Object"),
        class_extending("test/Sub", "test/Base"),
    ]);

    HydrationManager::new().hydrate(&provider).unwrap();

    let base = provider.find("test/Base").unwrap().unwrap();
    let sub = provider.find("test/Sub").unwrap().unwrap();
    assert!(base
        .subclasses()
        .iter()
        .any(|subclass| Arc::ptr_eq(subclass, &sub)));

    let outer = provider.find("test/Outer").unwrap().unwrap();
    let inner = provider.find("test/Outer$In").unwrap().unwrap();
    assert!(outer
        .inner_classes()
        .iter()
        .any(|node| Arc::ptr_eq(node, &inner)));
    assert!(outer.subclasses().is_empty());
    assert!(inner.is_static_inner());
}

#[test]
fn override_links_follow_the_hierarchy() {
    let mut top = class("test/Top");
    top.methods.push(method("run", "()V"));
    top.methods.push(method("onlyTop", "()V"));
    let mut mid = class_extending("test/Mid", "test/Top");
    mid.methods.push(method("run", "()V"));
    let mut bottom = class_extending("test/Bottom", "test/Mid");
    bottom.methods.push(method("run", "()V"));
    let provider = provider_over(vec![top, mid, bottom]);

    let classes = provider.all_classes().unwrap();
    hydrate_base(&classes).unwrap();

    let top = provider.find("test/Top").unwrap().unwrap();
    let mid = provider.find("test/Mid").unwrap().unwrap();
    let bottom = provider.find("test/Bottom").unwrap().unwrap();

    let top_run = top.method("run", Some("()V")).unwrap();
    let mid_run = mid.method("run", Some("()V")).unwrap();
    let bottom_run = bottom.method("run", Some("()V")).unwrap();

    // Nearest ancestor wins the super-method link
    assert!(Arc::ptr_eq(&bottom_run.super_method().unwrap(), &mid_run));
    assert!(Arc::ptr_eq(&mid_run.super_method().unwrap(), &top_run));
    assert!(top_run.super_method().is_none());

    // Child links cover every matching ancestor
    assert!(mid_run
        .child_methods()
        .iter()
        .any(|child| Arc::ptr_eq(child, &bottom_run)));
    assert!(top_run
        .child_methods()
        .iter()
        .any(|child| Arc::ptr_eq(child, &mid_run)));

    // A method with no ancestor declaration has no link
    let only_top = top.method("onlyTop", Some("()V")).unwrap();
    assert!(only_top.super_method().is_none());
    assert!(only_top.child_methods().is_empty());
}

#[test]
fn statics_privates_and_constructors_do_not_override() {
    let mut parent = class("test/Parent");
    parent
        .methods
        .push(method_with("util", "()V", MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC));
    parent
        .methods
        .push(method_with("hidden", "()V", MethodAccessFlags::PRIVATE));
    parent.methods.push(method("<init>", "()V"));
    let mut child = class_extending("test/Child", "test/Parent");
    child
        .methods
        .push(method_with("util", "()V", MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC));
    child
        .methods
        .push(method_with("hidden", "()V", MethodAccessFlags::PRIVATE));
    child.methods.push(method("<init>", "()V"));
    let provider = provider_over(vec![parent, child]);

    hydrate_base(&provider.all_classes().unwrap()).unwrap();

    let child = provider.find("test/Child").unwrap().unwrap();
    for name in ["util", "hidden", "<init>"] {
        let method = child.method(name, Some("()V")).unwrap();
        assert!(method.super_method().is_none(), "{} must not override", name);
    }
}

#[test]
fn package_visibility_gates_overrides() {
    let mut parent = class("pkg_a/Parent");
    parent
        .methods
        .push(method_with("visible", "()V", MethodAccessFlags::empty()));
    let mut near = class_extending("pkg_a/Near", "pkg_a/Parent");
    near.methods
        .push(method_with("visible", "()V", MethodAccessFlags::empty()));
    let mut far = class_extending("pkg_b/Far", "pkg_a/Parent");
    far.methods
        .push(method_with("visible", "()V", MethodAccessFlags::empty()));
    let provider = provider_over(vec![parent, near, far]);

    hydrate_base(&provider.all_classes().unwrap()).unwrap();

    let near = provider.find("pkg_a/Near").unwrap().unwrap();
    let far = provider.find("pkg_b/Far").unwrap().unwrap();
    assert!(near
        .method("visible", Some("()V"))
        .unwrap()
        .super_method()
        .is_some());
    assert!(far
        .method("visible", Some("()V"))
        .unwrap()
        .super_method()
        .is_none());
}

#[test]
fn interface_implementations_link_too() {
    let mut iface = interface("test/Runnable2");
    iface.methods.push(method_with(
        "run",
        "()V",
        MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
    ));
    let mut impl_class = class("test/Task");
    impl_class.interfaces.push("test/Runnable2".to_string());
    impl_class.methods.push(method("run", "()V"));
    let provider = provider_over(vec![iface, impl_class]);

    hydrate_base(&provider.all_classes().unwrap()).unwrap();

    let iface = provider.find("test/Runnable2").unwrap().unwrap();
    let task = provider.find("test/Task").unwrap().unwrap();
    assert!(iface.kinds().contains(ClassKinds::INTERFACE));
    let abstract_run = iface.method("run", Some("()V")).unwrap();
    let impl_run = task.method("run", Some("()V")).unwrap();
    assert!(Arc::ptr_eq(&impl_run.super_method().unwrap(), &abstract_run));
    assert!(abstract_run
        .child_methods()
        .iter()
        .any(|child| Arc::ptr_eq(child, &impl_run)));
}

#[test]
fn bridge_targets_resolve_within_the_class() {
    let mut parent = class("test/Parent");
    parent.methods.push(method("get", "()Ljava/lang/Object;"));
    let mut child = class_extending("test/Child", "test/Parent");
    child.methods.push(method("get", "()Ljava/lang/String;"));
    child.methods.push(method_with_body(
        "get",
        "()Ljava/lang/Object;",
        MethodAccessFlags::PUBLIC | MethodAccessFlags::BRIDGE | MethodAccessFlags::SYNTHETIC,
        MethodBody::of(vec![
            Instruction::Load { slot: 0 },
            Instruction::Invoke {
                kind: InvokeKind::Virtual,
                owner: "test/Child".to_string(),
                name: "get".to_string(),
                descriptor: "()Ljava/lang/String;".to_string(),
            },
            Instruction::Return,
        ]),
    ));
    let provider = provider_over(vec![parent, child]);

    HydrationManager::standard().hydrate(&provider).unwrap();

    let child = provider.find("test/Child").unwrap().unwrap();
    let bridge = child.method("get", Some("()Ljava/lang/Object;")).unwrap();
    let target = child.method("get", Some("()Ljava/lang/String;")).unwrap();
    let recorded = bridge.data().get(bridge_target_key()).unwrap();
    assert!(Arc::ptr_eq(&*recorded, &target));
    let sources = target.data().get(bridge_sources_key()).unwrap();
    assert!(sources.iter().any(|source| Arc::ptr_eq(source, &bridge)));
}

#[test]
fn bridge_targets_require_a_refining_return_type() {
    let base = class("test/A");
    let refined = class_extending("test/B", "test/A");
    let unrelated = class("test/C");
    let mut holder = class("test/Holder");
    holder.methods.push(method("make", "()Ltest/C;"));
    holder.methods.push(method("make", "()Ltest/B;"));
    holder.methods.push(method_with_body(
        "make",
        "()Ltest/A;",
        MethodAccessFlags::PUBLIC | MethodAccessFlags::BRIDGE | MethodAccessFlags::SYNTHETIC,
        MethodBody::of(vec![
            Instruction::Load { slot: 0 },
            // Same name and class but an unrelated return type; not a
            // covariant pair
            Instruction::Invoke {
                kind: InvokeKind::Virtual,
                owner: "test/Holder".to_string(),
                name: "make".to_string(),
                descriptor: "()Ltest/C;".to_string(),
            },
            Instruction::Invoke {
                kind: InvokeKind::Virtual,
                owner: "test/Holder".to_string(),
                name: "make".to_string(),
                descriptor: "()Ltest/B;".to_string(),
            },
            Instruction::Return,
        ]),
    ));
    let provider = provider_over(vec![base, refined, unrelated, holder]);

    HydrationManager::standard().hydrate(&provider).unwrap();

    let holder = provider.find("test/Holder").unwrap().unwrap();
    let bridge = holder.method("make", Some("()Ltest/A;")).unwrap();
    let refining = holder.method("make", Some("()Ltest/B;")).unwrap();
    let unrelated = holder.method("make", Some("()Ltest/C;")).unwrap();

    let recorded = bridge.data().get(bridge_target_key()).unwrap();
    assert!(Arc::ptr_eq(&*recorded, &refining));
    assert!(unrelated.data().get(bridge_sources_key()).is_none());
}

#[test]
fn bridges_without_a_refining_candidate_stay_unresolved() {
    let base = class("test/A");
    let unrelated = class("test/C");
    let mut holder = class("test/Holder");
    holder.methods.push(method("make", "()Ltest/C;"));
    holder.methods.push(method_with_body(
        "make",
        "()Ltest/A;",
        MethodAccessFlags::PUBLIC | MethodAccessFlags::BRIDGE | MethodAccessFlags::SYNTHETIC,
        MethodBody::of(vec![
            Instruction::Load { slot: 0 },
            Instruction::Invoke {
                kind: InvokeKind::Virtual,
                owner: "test/Holder".to_string(),
                name: "make".to_string(),
                descriptor: "()Ltest/C;".to_string(),
            },
            Instruction::Return,
        ]),
    ));
    let provider = provider_over(vec![base, unrelated, holder]);

    HydrationManager::standard().hydrate(&provider).unwrap();

    let holder = provider.find("test/Holder").unwrap().unwrap();
    let bridge = holder.method("make", Some("()Ltest/A;")).unwrap();
    assert!(bridge.data().get(bridge_target_key()).is_none());
}

#[test]
fn super_constructor_calls_record_lvt_correspondence() {
    let mut parent = class("test/Parent");
    parent.methods.push(method("<init>", "(I)V"));
    let mut child = class_extending("test/Child", "test/Parent");
    child.methods.push(method_with_body(
        "<init>",
        "(JI)V",
        MethodAccessFlags::PUBLIC,
        MethodBody::of(vec![
            Instruction::Load { slot: 0 },
            // The long occupies slots 1-2; the int parameter lives at 3
            Instruction::Load { slot: 3 },
            Instruction::Invoke {
                kind: InvokeKind::Special,
                owner: "test/Parent".to_string(),
                name: "<init>".to_string(),
                descriptor: "(I)V".to_string(),
            },
            Instruction::Return,
        ]),
    ));
    let provider = provider_over(vec![parent, child]);

    HydrationManager::standard().hydrate(&provider).unwrap();

    let parent = provider.find("test/Parent").unwrap().unwrap();
    let child = provider.find("test/Child").unwrap().unwrap();
    let parent_ctor = parent.method("<init>", Some("(I)V")).unwrap();
    let child_ctor = child.method("<init>", Some("(JI)V")).unwrap();

    let call = child_ctor.data().get(super_call_key()).unwrap();
    assert!(Arc::ptr_eq(&call.callee, &parent_ctor));
    assert_eq!(call.correspondence, vec![(1, 3)]);

    let callers = parent_ctor.data().get(super_callers_key()).unwrap();
    assert!(callers.iter().any(|caller| Arc::ptr_eq(caller, &child_ctor)));
}

#[test]
fn lambda_closures_tie_body_interface_and_captures() {
    let mut iface = interface("test/Consumer2");
    iface.methods.push(method_with(
        "accept",
        "(I)V",
        MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
    ));
    let mut holder = class("test/Holder");
    holder.methods.push(method_with_body(
        "run",
        "(I)V",
        MethodAccessFlags::PUBLIC,
        MethodBody::of(vec![
            Instruction::Load { slot: 1 },
            Instruction::InvokeDynamic {
                name: "accept".to_string(),
                descriptor: "(I)Ltest/Consumer2;".to_string(),
                bootstrap: BootstrapMethod {
                    owner: "java/lang/invoke/LambdaMetafactory".to_string(),
                    name: "metafactory".to_string(),
                    arguments: vec![
                        BootstrapArgument::MethodType("(I)V".to_string()),
                        BootstrapArgument::MethodHandle {
                            kind: HandleKind::InvokeStatic,
                            owner: "test/Holder".to_string(),
                            name: "lambda$run$0".to_string(),
                            descriptor: "(II)V".to_string(),
                        },
                        BootstrapArgument::MethodType("(I)V".to_string()),
                    ],
                },
            },
            Instruction::Return,
        ]),
    ));
    holder.methods.push(method_with(
        "lambda$run$0",
        "(II)V",
        MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC | MethodAccessFlags::SYNTHETIC,
    ));
    let provider = provider_over(vec![iface, holder]);

    HydrationManager::standard().hydrate(&provider).unwrap();

    let holder = provider.find("test/Holder").unwrap().unwrap();
    let iface = provider.find("test/Consumer2").unwrap().unwrap();
    let container = holder.method("run", Some("(I)V")).unwrap();
    let body = holder.method("lambda$run$0", Some("(II)V")).unwrap();

    let closures = container.data().get(lambdas_key()).unwrap();
    assert_eq!(closures.len(), 1);
    let closure = &closures[0];
    assert!(Arc::ptr_eq(&closure.body, &body));
    assert_eq!(closure.captured_lvts, vec![Some(1)]);
    let sam = iface.method("accept", Some("(I)V")).unwrap();
    assert!(Arc::ptr_eq(closure.interface_method.as_ref().unwrap(), &sam));

    let on_body = body.data().get(lambda_closure_key()).unwrap();
    assert!(Arc::ptr_eq(&on_body.body, &body));
}

#[test]
fn hydration_is_stable_under_a_single_thread() {
    let provider = provider_over(parent_children_corpus());
    HydrationManager::standard()
        .with_parallelism(1)
        .hydrate(&provider)
        .unwrap();
    let parent = provider.find("test/Parent").unwrap().unwrap();
    assert_eq!(parent.subclasses().len(), 2);
}

//! Whole-program resolution over small inheritance hierarchies.
//!
//! Drives real sessions over synthetic class files and checks the engine's
//! core guarantees: override chains collapse to one output name, names are
//! unique within a namespace, external ancestors pin their members, and the
//! whole process is deterministic and idempotent.

mod common;

use classcloak::prelude::*;

use common::{ClassFileBuilder, ACC_PRIVATE, ACC_PUBLIC};

fn load(session: &mut ObfuscationSession<FixtureOracle>, builder: &ClassFileBuilder, entry: &str) {
    session.load_class(entry, &builder.build()).unwrap();
}

fn hierarchy_session() -> ObfuscationSession<FixtureOracle> {
    let mut session =
        ObfuscationSession::new(FixtureOracle::with_core_types(), Options::default());

    let mut base = ClassFileBuilder::new("com/demo/Base");
    base.method(ACC_PUBLIC, "greet", "()V")
        .field(ACC_PUBLIC, "count", "I");
    load(&mut session, &base, "Base.class");

    let mut mid = ClassFileBuilder::new("com/demo/Mid");
    mid.extends("com/demo/Base").method(ACC_PUBLIC, "greet", "()V");
    load(&mut session, &mid, "Mid.class");

    let mut leaf = ClassFileBuilder::new("com/demo/Leaf");
    leaf.extends("com/demo/Mid")
        .method(ACC_PUBLIC, "greet", "()V")
        .field(ACC_PUBLIC, "count", "I");
    load(&mut session, &leaf, "Leaf.class");

    session
}

fn method_output(session: &ObfuscationSession<FixtureOracle>, class: &str, name: &str) -> String {
    let tree = session.tree();
    let id = tree.class_by_name(class).unwrap();
    let method = tree.method_of(id, name, "()V").unwrap();
    tree.method(method).base.effective_name().to_string()
}

fn field_output(session: &ObfuscationSession<FixtureOracle>, class: &str, name: &str) -> String {
    let tree = session.tree();
    let id = tree.class_by_name(class).unwrap();
    let field = tree.field_of(id, name).unwrap();
    tree.field(field).base.effective_name().to_string()
}

#[test]
fn override_chain_shares_one_output_name() {
    let mut session = hierarchy_session();
    session.resolve().unwrap();

    let base = method_output(&session, "com/demo/Base", "greet");
    let mid = method_output(&session, "com/demo/Mid", "greet");
    let leaf = method_output(&session, "com/demo/Leaf", "greet");

    assert_ne!(base, "greet");
    assert_eq!(base, mid);
    assert_eq!(mid, leaf);
}

#[test]
fn shadowed_field_shares_one_output_name() {
    let mut session = hierarchy_session();
    session.resolve().unwrap();

    assert_eq!(
        field_output(&session, "com/demo/Base", "count"),
        field_output(&session, "com/demo/Leaf", "count"),
    );
}

#[test]
fn classes_in_one_package_get_distinct_names() {
    let mut session = hierarchy_session();
    session.resolve().unwrap();

    let tree = session.tree();
    let names: Vec<String> = ["com/demo/Base", "com/demo/Mid", "com/demo/Leaf"]
        .iter()
        .map(|qualified| {
            let id = tree.class_by_name(qualified).unwrap();
            tree.class(id).base.effective_name().to_string()
        })
        .collect();
    assert_ne!(names[0], names[1]);
    assert_ne!(names[1], names[2]);
    assert_ne!(names[0], names[2]);
}

#[test]
fn resolution_is_deterministic() {
    let mut first = hierarchy_session();
    first.resolve().unwrap();
    let mut second = hierarchy_session();
    second.resolve().unwrap();

    assert_eq!(first.report().to_string(), second.report().to_string());
}

#[test]
fn double_resolve_is_a_noop() {
    let mut session = hierarchy_session();
    session.resolve().unwrap();
    let before = session.report().to_string();
    session.resolve().unwrap();
    assert_eq!(before, session.report().to_string());
}

#[test]
fn external_ancestor_pins_member_names() {
    let mut oracle = FixtureOracle::with_core_types();
    oracle.insert(
        ExternalTypeInfo::new("ext/Handler").with_visible_methods(["handle"]),
    );
    let mut session = ObfuscationSession::new(oracle, Options::default());

    let mut worker = ClassFileBuilder::new("com/demo/Worker");
    worker
        .implements("ext/Handler")
        .method(ACC_PUBLIC, "handle", "()V")
        .method(ACC_PUBLIC, "internal", "()V");
    load(&mut session, &worker, "Worker.class");
    session.resolve().unwrap();

    let tree = session.tree();
    let id = tree.class_by_name("com/demo/Worker").unwrap();
    let handle = tree.method_of(id, "handle", "()V").unwrap();
    assert_eq!(tree.method(handle).base.effective_name(), "handle");
    assert!(tree.method(handle).external_root);

    let internal = tree.method_of(id, "internal", "()V").unwrap();
    assert_ne!(tree.method(internal).base.effective_name(), "internal");
}

#[test]
fn interface_diamond_shares_one_output_name() {
    let mut session =
        ObfuscationSession::new(FixtureOracle::with_core_types(), Options::default());

    let mut first = ClassFileBuilder::new("com/demo/A");
    first
        .access(ACC_PUBLIC | common::ACC_INTERFACE | common::ACC_ABSTRACT)
        .method(ACC_PUBLIC | common::ACC_ABSTRACT, "m", "()V");
    load(&mut session, &first, "A.class");

    let mut second = ClassFileBuilder::new("com/demo/B");
    second
        .access(ACC_PUBLIC | common::ACC_INTERFACE | common::ACC_ABSTRACT)
        .method(ACC_PUBLIC | common::ACC_ABSTRACT, "m", "()V");
    load(&mut session, &second, "B.class");

    let mut join = ClassFileBuilder::new("com/demo/C");
    join.implements("com/demo/A")
        .implements("com/demo/B")
        .method(ACC_PUBLIC, "m", "()V");
    load(&mut session, &join, "C.class");
    session.resolve().unwrap();

    let a = method_output(&session, "com/demo/A", "m");
    let b = method_output(&session, "com/demo/B", "m");
    let c = method_output(&session, "com/demo/C", "m");
    assert_ne!(a, "m");
    assert_eq!(a, b, "diamond arms diverged: {a} vs {b}");
    assert_eq!(a, c);
}

#[test]
fn external_arm_of_a_diamond_pins_the_whole_group() {
    let mut oracle = FixtureOracle::with_core_types();
    oracle.insert(
        ExternalTypeInfo::new("ext/Handler").with_visible_methods(["handle"]),
    );
    let mut session = ObfuscationSession::new(oracle, Options::default());

    let mut internal = ClassFileBuilder::new("com/demo/Internal");
    internal
        .access(ACC_PUBLIC | common::ACC_INTERFACE | common::ACC_ABSTRACT)
        .method(ACC_PUBLIC | common::ACC_ABSTRACT, "handle", "()V");
    load(&mut session, &internal, "Internal.class");

    let mut join = ClassFileBuilder::new("com/demo/Both");
    join.implements("com/demo/Internal")
        .implements("ext/Handler")
        .method(ACC_PUBLIC, "handle", "()V");
    load(&mut session, &join, "Both.class");
    session.resolve().unwrap();

    // The internal declaration sits in the same group as the externally
    // pinned one, so it has to keep the original name too.
    assert_eq!(
        method_output(&session, "com/demo/Internal", "handle"),
        "handle"
    );
    assert_eq!(method_output(&session, "com/demo/Both", "handle"), "handle");
    let tree = session.tree();
    let id = tree.class_by_name("com/demo/Internal").unwrap();
    let method = tree.method_of(id, "handle", "()V").unwrap();
    assert!(tree.method(method).external_root);
}

#[test]
fn private_methods_do_not_join_override_groups() {
    let mut session =
        ObfuscationSession::new(FixtureOracle::with_core_types(), Options::default());

    let mut base = ClassFileBuilder::new("com/demo/Base");
    base.method(ACC_PRIVATE, "helper", "()V");
    load(&mut session, &base, "Base.class");

    let mut leaf = ClassFileBuilder::new("com/demo/Leaf");
    leaf.extends("com/demo/Base").method(ACC_PUBLIC, "helper", "()V");
    load(&mut session, &leaf, "Leaf.class");
    session.resolve().unwrap();

    let tree = session.tree();
    let base_id = tree.class_by_name("com/demo/Base").unwrap();
    let private = tree.method_of(base_id, "helper", "()V").unwrap();
    assert!(!tree.method(private).is_override);
    assert_ne!(tree.method(private).base.effective_name(), "helper");
}

#[test]
fn default_access_participates_in_override_matching() {
    let mut session =
        ObfuscationSession::new(FixtureOracle::with_core_types(), Options::default());

    // Package-private on both ends: access flags 0.
    let mut base = ClassFileBuilder::new("com/demo/Base");
    base.method(0, "work", "()V");
    load(&mut session, &base, "Base.class");

    let mut leaf = ClassFileBuilder::new("com/demo/Leaf");
    leaf.extends("com/demo/Base").method(0, "work", "()V");
    load(&mut session, &leaf, "Leaf.class");
    session.resolve().unwrap();

    assert_eq!(
        method_output(&session, "com/demo/Base", "work"),
        method_output(&session, "com/demo/Leaf", "work"),
    );
}

#[test]
fn constructors_keep_their_names() {
    let mut session =
        ObfuscationSession::new(FixtureOracle::with_core_types(), Options::default());
    let mut class = ClassFileBuilder::new("com/demo/Thing");
    class.method(ACC_PUBLIC, "<init>", "()V");
    load(&mut session, &class, "Thing.class");
    session.resolve().unwrap();

    let tree = session.tree();
    let id = tree.class_by_name("com/demo/Thing").unwrap();
    let class_node = tree.class(id);
    assert_eq!(class_node.special_methods.len(), 1);
    let init = tree.method(class_node.special_methods[0]);
    assert_eq!(init.base.effective_name(), "<init>");
}

//! Container-driven sessions: class entries rewritten, everything else
//! passed through verbatim.

mod common;

use classcloak::prelude::*;

use common::{ClassFileBuilder, ACC_PUBLIC};

#[test]
fn non_class_entries_pass_through_verbatim() {
    let mut input = MemoryContainer::new();
    let mut greeter = ClassFileBuilder::new("demo/Greeter");
    greeter.method(ACC_PUBLIC, "hello", "()V");
    input.insert("demo/Greeter.class", greeter.build());
    input.insert("META-INF/app.properties", b"key=value".to_vec());

    let mut session =
        ObfuscationSession::new(FixtureOracle::with_core_types(), Options::default());
    session.load_container(&mut input).unwrap();
    session.resolve().unwrap();

    let mut output = MemoryContainer::new();
    session.write_container(&mut output).unwrap();

    assert_eq!(output.len(), 2);
    assert_eq!(
        output.entry("META-INF/app.properties"),
        Some(&b"key=value"[..])
    );

    let class_entry = output
        .names()
        .find(|name| name.ends_with(".class"))
        .unwrap()
        .to_string();
    let decoded = ClassFile::decode(output.entry(&class_entry).unwrap()).unwrap();
    assert_eq!(
        format!("{}.class", decoded.class_name().unwrap()),
        class_entry
    );
    assert_ne!(decoded.class_name().unwrap(), "demo/Greeter");
}

#[test]
fn report_lists_the_rename() {
    let mut session =
        ObfuscationSession::new(FixtureOracle::with_core_types(), Options::default());
    let mut greeter = ClassFileBuilder::new("demo/Greeter");
    greeter.method(ACC_PUBLIC, "hello", "()V");
    session
        .load_class("demo/Greeter.class", &greeter.build())
        .unwrap();
    session.resolve().unwrap();

    let report = session.report();
    assert!(report
        .renamed
        .iter()
        .any(|record| record.original == "demo/Greeter"));
    assert!(!report.frequencies.is_empty());
    assert!(report.to_string().contains("demo/Greeter ->"));
}

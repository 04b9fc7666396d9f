//! Access widening on jars on disk.

use jarwright::classfile::access::*;
use jarwright::transform::{AccessMutation, AccessPatcher, AccessTarget, TransformOptions, transform_archive};
use jarwright::{Error, Transformer};

mod common;

use common::{ClassSpec, create_jar, read_class, temp_dir};

fn engine_jar(dir: &std::path::Path) -> std::path::PathBuf {
    let engine = ClassSpec {
        access: FINAL,
        fields: &[
            (PRIVATE | FINAL, "state", "I"),
            (PRIVATE | STATIC | FINAL | SYNTHETIC, "INSTANCE", "Lcom/example/Engine;"),
        ],
        methods: &[
            (PRIVATE, "tick", "(J)V"),
            (PRIVATE | STATIC, "tick", "(I)V"),
        ],
        ..ClassSpec::new("com/example/Engine")
    }
    .build();
    let inner = ClassSpec {
        access: PRIVATE | STATIC | FINAL,
        fields: &[(PRIVATE, "count", "J")],
        ..ClassSpec::new("com/example/Engine$Inner")
    }
    .build();

    create_jar(
        dir,
        "engine.jar",
        &[
            ("com/example/Engine.class", &engine),
            ("com/example/Engine$Inner.class", &inner),
        ],
    )
    .unwrap()
}

#[test]
fn test_full_access_flips_only_public_and_final() {
    let dir = temp_dir();
    let jar = engine_jar(dir.path());

    let patcher = AccessPatcher::new("open")
        .full(["com/example/Engine.INSTANCE:Lcom/example/Engine;"])
        .unwrap();
    transform_archive(&jar, &TransformOptions::new(), &mut [patcher]).unwrap();

    let engine = read_class(&jar, "com/example/Engine.class");
    let field = engine.find_field("INSTANCE", "Lcom/example/Engine;").unwrap();
    assert_eq!(field.access, PUBLIC | STATIC | SYNTHETIC);
    // untouched members keep their flags
    assert_eq!(engine.find_field("state", "I").unwrap().access, PRIVATE | FINAL);
    assert_eq!(engine.access, FINAL);
}

#[test]
fn test_method_overloads_are_distinguished() {
    let dir = temp_dir();
    let jar = engine_jar(dir.path());

    let patcher = AccessPatcher::new("open")
        .accessible(["com/example/Engine.tick(I)V"])
        .unwrap();
    transform_archive(&jar, &TransformOptions::new(), &mut [patcher]).unwrap();

    let engine = read_class(&jar, "com/example/Engine.class");
    assert_eq!(engine.find_method("tick", "(I)V").unwrap().access, PUBLIC | STATIC);
    assert_eq!(engine.find_method("tick", "(J)V").unwrap().access, PRIVATE);
}

#[test]
fn test_nested_class_and_descriptor_forms() {
    let dir = temp_dir();
    let jar = engine_jar(dir.path());

    let patcher = AccessPatcher::new("open")
        .accessible(["Lcom/example/Engine$Inner;"])
        .unwrap()
        .mutable(["Lcom/example/Engine;state:I"])
        .unwrap()
        .full(["com/example/Engine$Inner.count:J"])
        .unwrap();
    transform_archive(&jar, &TransformOptions::new(), &mut [patcher]).unwrap();

    let inner = read_class(&jar, "com/example/Engine$Inner.class");
    assert_eq!(inner.access, PUBLIC | STATIC | FINAL);
    assert_eq!(inner.find_field("count", "J").unwrap().access, PUBLIC);

    let engine = read_class(&jar, "com/example/Engine.class");
    assert_eq!(engine.find_field("state", "I").unwrap().access, PRIVATE);
}

#[test]
fn test_missing_field_names_field_and_owner() {
    let dir = temp_dir();
    let jar = engine_jar(dir.path());
    let before = std::fs::read(&jar).unwrap();

    let patcher = AccessPatcher::new("open").full(["com/Foo.bar:I", "com/example/Engine.bar:I"]).unwrap();
    let err = transform_archive(&jar, &TransformOptions::new().atomic(true), &mut [patcher]).unwrap_err();

    match &err {
        Error::TransformerFailed { name, .. } => assert_eq!(name, "open"),
        other => panic!("expected TransformerFailed, got {:?}", other),
    }
    match err.root_cause() {
        Error::MemberNotFound { member, owner } => {
            assert_eq!(member, "bar:I");
            assert_eq!(owner, "com/example/Engine");
        }
        other => panic!("expected MemberNotFound, got {:?}", other),
    }
    assert!(err.is_configuration_error());
    assert_eq!(std::fs::read(&jar).unwrap(), before);
}

#[test]
fn test_target_parsing() {
    let field: AccessTarget = "com/Foo.bar:I".parse().unwrap();
    assert_eq!(
        field,
        AccessTarget::Field {
            owner: "com/Foo".into(),
            name: "bar".into(),
            descriptor: "I".into(),
        }
    );
    assert_eq!(field.owner(), "com/Foo");

    let method: AccessTarget = "com/Foo.run(Ljava/lang/String;)V".parse().unwrap();
    assert!(matches!(method, AccessTarget::Method { ref name, .. } if name == "run"));

    for invalid in ["", "com/Foo.", "com/Foo.bar", "com/Foo.run(", ".bar:I"] {
        let err = invalid.parse::<AccessTarget>().unwrap_err();
        assert!(matches!(err, Error::InvalidTarget { .. }), "{:?} parsed", invalid);
    }
}

#[test]
fn test_patcher_exposes_targets() {
    let patcher = AccessPatcher::new("open")
        .accessible(["com/Foo"])
        .unwrap()
        .target(
            AccessTarget::parse("com/Foo.x:I").unwrap(),
            AccessMutation::Mutable,
        );
    assert_eq!(patcher.name(), "open");
    assert_eq!(patcher.targets().len(), 2);
    assert_eq!(patcher.targets()[1].1, AccessMutation::Mutable);
}

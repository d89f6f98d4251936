use std::sync::{Arc, Mutex};

use provision_report::container::{
    provider_fn, Binder, FieldSpec, Instance, MethodSpec, Nesting, ProviderHandle, Scoping,
    TypeSpec,
};
use provision_report::{
    Aggregate, Cause, ErrorKind, Failure, InjectError, Injector, Key, ProvisionError, WrapState,
};

#[derive(Debug)]
struct Named(&'static str);

fn named(name: &'static str) -> TypeSpec {
    TypeSpec::new(name, move |_args| Ok(Arc::new(Named(name)) as Instance))
}

fn failing(name: &'static str, exception: &'static str) -> TypeSpec {
    TypeSpec::new(name, move |_args| Err(Failure::thrown(exception, None)))
}

fn assert_contains_in_order(haystack: &str, needles: &[&str]) {
    let mut rest = haystack;
    for needle in needles {
        match rest.find(needle) {
            Some(at) => rest = &rest[at + needle.len()..],
            None => panic!("expected '{needle}' (in order) in:\n{haystack}"),
        }
    }
}

fn provision_error(err: InjectError) -> ProvisionError {
    match err {
        InjectError::Provision(e) => e,
        InjectError::Configuration(e) => panic!("expected provision error, got:\n{e}"),
    }
}

/// A(ctor b) -> B(field c) -> C(method setD, param d) -> D, where D's
/// constructor throws.
fn chain_module(b: &mut Binder) {
    b.register(named("A").param("b", Key::named("B")));
    b.register(named("B").field(FieldSpec::new("c", Key::named("C"), |_target, _dep| Ok(()))));
    b.register(named("C").method(
        MethodSpec::new("setD", |_target, _args| Ok(())).param("d", Key::named("D")),
    ));
    b.register(failing("D", "UnsupportedOperationException"));
}

#[test]
fn constructor_failure_collects_every_frame_of_the_path() {
    let injector = Injector::builder().module(chain_module).build().unwrap();
    let err = provision_error(injector.get_instance(&Key::named("A")).unwrap_err());

    let expected = "\
Unable to provision, see the following errors:

1) [ErrorInjectingConstructor]: UnsupportedOperationException
  at D.<init>
  at C.setD
      \\_ for 1st parameter d
  at B.c
      \\_ for field c
  at A.<init>
      \\_ for 1st parameter b
  while locating A
Caused by: UnsupportedOperationException";
    assert_eq!(err.to_string(), expected);
    assert_eq!(err.to_string().matches("Caused by: UnsupportedOperationException").count(), 1);
    assert_eq!(err.cause().map(|c| c.type_name()), Some("UnsupportedOperationException"));
    assert_eq!(err.wrap_state(), WrapState::Wrapped);
}

#[test]
fn singleton_scope_adds_no_frames() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            chain_module(b);
            b.bind(Key::named("B")).in_singleton();
        })
        .build()
        .unwrap();
    let err = injector.get_instance(&Key::named("A")).unwrap_err();
    let message = err.to_string();

    assert!(!message.contains("custom provider"));
    assert_contains_in_order(
        &message,
        &[
            "at C.setD",
            "\\_ for 1st parameter d",
            "at B.c",
            "\\_ for field c",
            "at A.<init>",
            "\\_ for 1st parameter b",
        ],
    );
}

#[test]
fn method_injection_failure_names_the_method() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            b.bind(Key::named("Object")).to_instance(Arc::new(Named("object")));
            b.register(named("E").method(
                MethodSpec::new("setObject", |_target, _args| {
                    Err(Failure::thrown("UnsupportedOperationException", None))
                })
                .param("o", Key::named("Object")),
            ));
        })
        .build()
        .unwrap();
    let err = injector.get_instance(&Key::named("E")).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Unable to provision, see the following errors:\n\n\
         1) [ErrorInjectingMethod]: UnsupportedOperationException\n  \
         at E.setObject\n  \
         while locating E\n\
         Caused by: UnsupportedOperationException"
    );
}

#[test]
fn field_injection_failure_names_the_field() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            b.bind(Key::named("String")).to_instance(Arc::new("value".to_string()));
            b.register(named("G").field(FieldSpec::new("value", Key::named("String"), |_t, _d| {
                Err(Failure::thrown("IllegalArgumentException", Some("read-only".to_string())))
            })));
        })
        .build()
        .unwrap();
    let message = injector.get_instance(&Key::named("G")).unwrap_err().to_string();

    assert_contains_in_order(
        &message,
        &[
            "1) [ErrorInjectingField]: IllegalArgumentException: read-only",
            "  at G.value",
            "  while locating G",
            "Caused by: IllegalArgumentException: read-only",
        ],
    );
}

#[test]
fn provider_instance_failure_names_the_provider() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            b.bind(Key::named("Service")).to_provider(
                "ServiceProvider",
                provider_fn(|_ctx| {
                    Err(Failure::thrown("IllegalStateException", Some("no database".to_string())))
                }),
            );
        })
        .build()
        .unwrap();
    let err = provision_error(injector.get_instance(&Key::named("Service")).unwrap_err());
    let message = err.to_string();

    assert_contains_in_order(
        &message,
        &[
            "1) [ErrorInCustomProvider]: IllegalStateException: no database",
            "  at tests/container_provisioning.rs:",
            "      \\_ via custom provider ServiceProvider",
            "  while locating Service",
            "Caused by: IllegalStateException: no database",
        ],
    );
    assert_eq!(err.error_messages()[0].kind(), Some(ErrorKind::ErrorInCustomProvider));
}

#[test]
fn provider_method_failure_points_at_the_module() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            b.provides(
                Key::named("Clock"),
                Scoping::Unscoped,
                provider_fn(|_ctx| Err(Failure::thrown("RuntimeException", None))),
            );
        })
        .build()
        .unwrap();
    let message = injector.get_instance(&Key::named("Clock")).unwrap_err().to_string();

    assert_contains_in_order(
        &message,
        &[
            "1) [ErrorInUserCode]: RuntimeException",
            "  at tests/container_provisioning.rs:",
            "  while locating Clock",
        ],
    );
    assert!(!message.contains("custom provider"));
}

#[test]
fn user_thrown_provision_error_is_wrapped_once() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            b.register(TypeSpec::new("F", |_args| {
                let cause = Cause::new("RuntimeException", None);
                Err(ProvisionError::new("User Exception", Some(cause)).into())
            }));
        })
        .build()
        .unwrap();
    let err = provision_error(injector.get_instance(&Key::named("F")).unwrap_err());

    assert_eq!(
        err.to_string(),
        "Unable to provision, see the following errors:\n\n\
         1) User Exception\n  \
         at F.<init>\n  \
         while locating F\n\
         Caused by: RuntimeException"
    );
    assert_eq!(err.wrap_state(), WrapState::Wrapped);
}

#[test]
fn provider_key_failure_locates_provider_then_target() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            b.bind(Key::named("F")).to_provider_key(Key::named("FProvider"));
            b.register(TypeSpec::new("FProvider", |_args| {
                let provider = provider_fn(|_ctx| {
                    Err(Failure::thrown("UnsupportedOperationException", None))
                });
                Ok(Arc::new(ProviderHandle::new(provider)) as Instance)
            }));
        })
        .build()
        .unwrap();
    let message = injector.get_instance(&Key::named("F")).unwrap_err().to_string();

    assert_contains_in_order(
        &message,
        &[
            "1) [ErrorInCustomProvider]: UnsupportedOperationException",
            "  while locating FProvider",
            "  while locating F",
            "Caused by: UnsupportedOperationException",
        ],
    );
}

#[test]
fn linked_binding_locates_both_keys() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            b.bind(Key::named("Service")).to(Key::named("ServiceImpl"));
            b.register(failing("ServiceImpl", "IllegalStateException"));
        })
        .build()
        .unwrap();
    let message = injector.get_instance(&Key::named("Service")).unwrap_err().to_string();

    assert_contains_in_order(
        &message,
        &[
            "  at ServiceImpl.<init>",
            "  while locating ServiceImpl",
            "  while locating Service",
        ],
    );
}

#[test]
fn inner_and_local_types_cannot_be_injected() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            b.register(named("InnerClass").nesting(Nesting::Inner));
            b.register(named("LocalClass").nesting(Nesting::Local));
        })
        .build()
        .unwrap();

    let inner = provision_error(injector.get_instance(&Key::named("InnerClass")).unwrap_err());
    assert_eq!(
        inner.to_string(),
        "Unable to provision, see the following errors:\n\n\
         1) [InjectInnerClass]: Injecting into inner classes is not supported.\n  \
         while locating InnerClass"
    );
    assert!(inner.cause().is_none());

    let local = injector.get_instance(&Key::named("LocalClass")).unwrap_err();
    assert!(local
        .to_string()
        .contains("1) [InjectInnerClass]: Injecting into inner classes is not supported.\n  while locating LocalClass"));
}

#[test]
fn nested_lookup_passes_through_enclosing_provider() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            b.register(named("Outer").param("mid", Key::named("Mid")));
            b.bind(Key::named("Mid")).to_provider(
                "MidProvider",
                provider_fn(|ctx| {
                    assert!(!ctx.is_top_level());
                    let inner = ctx.get_instance(&Key::named("Inner"))?;
                    Ok(inner)
                }),
            );
            b.register(failing("Inner", "RuntimeException"));
        })
        .build()
        .unwrap();
    let message = injector.get_instance(&Key::named("Outer")).unwrap_err().to_string();

    assert_contains_in_order(
        &message,
        &[
            "Unable to provision, see the following errors:\n\n",
            "1) [ErrorInjectingConstructor]: RuntimeException\n",
            "  at Inner.<init>\n",
            "  while locating Inner\n",
            "  at tests/container_provisioning.rs:",
            "      \\_ via custom provider MidProvider\n",
            "  at Outer.<init>\n",
            "      \\_ for 1st parameter mid\n",
            "  while locating Outer\n",
            "Caused by: RuntimeException",
        ],
    );
    assert_eq!(message.matches("Unable to provision").count(), 1);
    assert_eq!(message.matches("1) ").count(), 1);
}

/// The portion of a report from the first record up to the provider frame.
fn through_provider<'m>(message: &'m str, provider: &str) -> &'m str {
    let start = message.find("1) ").expect("numbered record");
    let marker = format!("via custom provider {provider}");
    let end = message.find(&marker).expect("provider frame") + marker.len();
    &message[start..end]
}

#[test]
fn nested_and_direct_provider_failures_share_the_provider_frame() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            b.register(named("Outer").param("mid", Key::named("Mid")));
            b.bind(Key::named("Mid")).to_provider(
                "MidProvider",
                provider_fn(|ctx| Ok(ctx.get_instance(&Key::named("Inner"))?)),
            );
            b.register(failing("Inner", "RuntimeException"));
        })
        .build()
        .unwrap();

    let nested = injector.get_instance(&Key::named("Outer")).unwrap_err().to_string();
    let direct = injector.get_instance(&Key::named("Mid")).unwrap_err().to_string();

    assert!(nested.contains("MidProvider"));
    assert_eq!(through_provider(&nested, "MidProvider"), through_provider(&direct, "MidProvider"));
    assert!(direct.ends_with("  while locating Mid\nCaused by: RuntimeException"));
    assert!(nested.contains("\\_ via custom provider MidProvider\n  at Outer.<init>"));
}

#[test]
fn top_level_provider_lookup_is_wrapped_once() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            b.bind(Key::named("Top")).to_provider(
                "TopProvider",
                provider_fn(|ctx| {
                    assert!(ctx.is_top_level());
                    Ok(ctx.get_instance(&Key::named("Inner"))?)
                }),
            );
            b.register(failing("Inner", "RuntimeException"));
        })
        .build()
        .unwrap();
    let message = injector.get_instance(&Key::named("Top")).unwrap_err().to_string();

    assert_contains_in_order(
        &message,
        &[
            "1) [ErrorInjectingConstructor]: RuntimeException",
            "  at Inner.<init>",
            "  while locating Inner",
            "      \\_ via custom provider TopProvider",
            "  while locating Top",
        ],
    );
    assert_eq!(message.matches("Unable to provision").count(), 1);
    assert!(!message.contains("2) "));
}

#[test]
fn circular_dependency_is_reported() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            b.register(named("Chicken").param("egg", Key::named("Egg")));
            b.register(named("Egg").param("chicken", Key::named("Chicken")));
        })
        .build()
        .unwrap();
    let err = provision_error(injector.get_instance(&Key::named("Chicken")).unwrap_err());
    let message = err.to_string();

    assert_contains_in_order(
        &message,
        &[
            "1) [CircularDependency]: Found a circular dependency involving Chicken: Chicken -> Egg -> Chicken.",
            "  at Egg.<init>",
            "      \\_ for 1st parameter chicken",
            "  at Chicken.<init>",
            "      \\_ for 1st parameter egg",
            "  while locating Chicken",
        ],
    );
}

#[test]
fn successful_graph_injects_members() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let field_seen = Arc::clone(&seen);
    let method_seen = Arc::clone(&seen);
    let injector = Injector::builder()
        .module(move |b: &mut Binder| {
            let field_seen = Arc::clone(&field_seen);
            let method_seen = Arc::clone(&method_seen);
            b.register(named("Leaf"));
            b.register(
                named("Root")
                    .param("leaf", Key::named("Leaf"))
                    .field(FieldSpec::new("leaf", Key::named("Leaf"), move |_t, dep| {
                        let leaf = dep.downcast_ref::<Named>().map(|n| n.0).unwrap_or("?");
                        field_seen.lock().unwrap().push(format!("field {leaf}"));
                        Ok(())
                    }))
                    .method(
                        MethodSpec::new("setLeaf", move |_t, args| {
                            method_seen.lock().unwrap().push(format!("method {}", args.len()));
                            Ok(())
                        })
                        .param("leaf", Key::named("Leaf")),
                    ),
            );
        })
        .build()
        .unwrap();

    let root = injector.get::<Named>(&Key::named("Root")).unwrap();
    assert_eq!(root.0, "Root");
    assert_eq!(*seen.lock().unwrap(), vec!["field Leaf".to_string(), "method 1".to_string()]);
}

#[test]
fn typed_get_reports_wrong_instance_type() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            b.bind(Key::named("Port")).to_instance(Arc::new(8080u16));
        })
        .build()
        .unwrap();

    assert_eq!(*injector.get::<u16>(&Key::named("Port")).unwrap(), 8080);
    let err = injector.get::<String>(&Key::named("Port")).unwrap_err();
    assert!(err.to_string().contains("Instance bound to Port is not a String."));
    assert!(err.to_string().contains("  while locating Port"));
}

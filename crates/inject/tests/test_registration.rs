use std::any::type_name;
use std::sync::Arc;

use inject::{provides, Factory, Lifecycle, Registry, RegistryError, ServiceType};

trait Notifier: Send + Sync {
    fn channel(&self) -> &'static str;
}

#[derive(Debug)]
struct EmailNotifier;

impl Notifier for EmailNotifier {
    fn channel(&self) -> &'static str {
        "email"
    }
}

provides!(EmailNotifier => dyn Notifier);

/// Deliberately does not implement `Notifier`
#[derive(Debug)]
struct Widget;

#[derive(Debug)]
struct Database {
    url: String,
}

#[derive(Debug)]
struct Repository {
    db: Arc<Database>,
}

#[derive(Debug)]
struct AccountService {
    _repository: Arc<Repository>,
}

fn setup() -> Registry {
    common::init_test_logging();
    Registry::new()
}

#[test]
fn test_interface_mismatch_keeps_existing_mapping() {
    let registry = setup();
    registry
        .register_singleton_interface::<dyn Notifier, EmailNotifier, _>(|_| Ok(EmailNotifier))
        .unwrap();

    let err = registry
        .register(
            ServiceType::of::<dyn Notifier>(),
            Factory::infallible(|_| Widget),
            Lifecycle::Transient,
        )
        .unwrap_err();

    assert!(err.is_type_mismatch());
    let message = err.to_string();
    assert!(message.contains("does not implement interface"));
    assert!(message.contains(type_name::<Widget>()));
    assert!(message.contains(type_name::<dyn Notifier>()));

    assert_eq!(registry.len(), 1);
    assert_eq!(
        registry.lifecycle_of(&ServiceType::of::<dyn Notifier>()),
        Some(Lifecycle::Singleton)
    );
    assert_eq!(registry.must_resolve::<dyn Notifier>().channel(), "email");
}

#[test]
fn test_rejected_registration_on_empty_key_stores_nothing() {
    let registry = setup();
    let err = registry
        .register(
            ServiceType::of::<Database>(),
            Factory::infallible(|_| Widget),
            Lifecycle::Singleton,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        RegistryError::TypeMismatch {
            relation: "match service type",
            ..
        }
    ));
    assert!(!registry.contains::<Database>());
    assert!(registry.is_empty());
}

#[test]
fn test_capability_cast_for_wrong_type_is_malformed() {
    let registry = setup();
    let factory = Factory::infallible(|_| Widget)
        .provides::<EmailNotifier, dyn Notifier>(|notifier| notifier as Arc<dyn Notifier>);

    let err = registry
        .register(ServiceType::of::<dyn Notifier>(), factory, Lifecycle::Singleton)
        .unwrap_err();
    assert!(matches!(err, RegistryError::MalformedFactory { .. }));
    assert!(registry.is_empty());
}

#[test]
fn test_arc_indirection_is_accepted_both_ways() {
    let registry = setup();

    // Result is Arc<Database>, service is Database
    registry
        .register(
            ServiceType::of::<Database>(),
            Factory::shared(|_| {
                Ok(Arc::new(Database {
                    url: "postgres://shared".to_string(),
                }))
            }),
            Lifecycle::Singleton,
        )
        .unwrap();

    // Result is Repository, service is Arc<Repository>
    registry
        .register(
            ServiceType::of::<Arc<Repository>>(),
            Factory::inject(|(db,): (Arc<Database>,)| Ok(Repository { db })),
            Lifecycle::Singleton,
        )
        .unwrap();

    let repository = registry.resolve_as::<Arc<Repository>>().unwrap();
    assert_eq!(repository.db.url, "postgres://shared");
}

#[test]
fn test_unregistered_type_is_reported_and_not_added() {
    let registry = setup();
    let service = ServiceType::of::<Database>();

    assert!(!registry.has(&service));
    let err = registry.resolve(&service).unwrap_err();
    assert!(err.is_not_registered());
    assert_eq!(
        err.to_string(),
        format!("service of type {} not registered", type_name::<Database>())
    );
    assert!(!registry.has(&service));
    assert!(registry.try_resolve::<Database>().is_none());
}

#[test]
fn test_missing_parameter_is_named_in_error() {
    let registry = setup();
    registry
        .register_factory(
            Factory::inject(|(db,): (Arc<Database>,)| Ok(Repository { db })),
            Lifecycle::Transient,
        )
        .unwrap();

    let err = registry.resolve_as::<Repository>().unwrap_err();
    match &err {
        RegistryError::DependencyResolution { dependency, source } => {
            assert_eq!(*dependency, type_name::<Database>());
            assert!(source.is_not_registered());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains(type_name::<Database>()));
}

#[test]
fn test_nested_failure_exposes_full_chain() {
    let registry = setup();
    registry
        .register_factory(
            Factory::inject(|(db,): (Arc<Database>,)| Ok(Repository { db })),
            Lifecycle::Singleton,
        )
        .unwrap();
    registry
        .register_factory(
            Factory::inject(|(repository,): (Arc<Repository>,)| Ok(AccountService { _repository: repository })),
            Lifecycle::Transient,
        )
        .unwrap();

    let err = registry.resolve_as::<AccountService>().unwrap_err();
    assert_eq!(
        err.dependency_chain(),
        vec![type_name::<Repository>(), type_name::<Database>()]
    );
    assert!(err.innermost().is_not_registered());

    let sources = std::iter::successors(
        std::error::Error::source(&err),
        |current| current.source(),
    )
    .count();
    assert_eq!(sources, 2);
}

#[test]
fn test_factory_errors_inside_dependencies_are_wrapped_once() {
    let registry = setup();
    registry
        .register_singleton_type::<Database, _>(|_| Err(anyhow::anyhow!("connection refused")))
        .unwrap();
    registry
        .register_factory(
            Factory::inject(|(db,): (Arc<Database>,)| Ok(Repository { db })),
            Lifecycle::Transient,
        )
        .unwrap();

    let err = registry.resolve_as::<Repository>().unwrap_err();
    assert!(matches!(
        err.innermost(),
        RegistryError::Factory(inner) if inner.to_string() == "connection refused"
    ));
}

#[test]
fn test_clear_keeps_handed_out_instances_usable() {
    let registry = setup();
    registry
        .register_singleton_type(|_| {
            Ok(Database {
                url: "sqlite::memory:".to_string(),
            })
        })
        .unwrap();
    registry
        .register_singleton_interface::<dyn Notifier, EmailNotifier, _>(|_| Ok(EmailNotifier))
        .unwrap();

    let db = registry.resolve_as::<Database>().unwrap();
    let notifier = registry.resolve_as::<dyn Notifier>().unwrap();
    let before = registry.list_types();
    assert_eq!(before.len(), 2);

    registry.clear();

    assert!(registry.list_types().is_empty());
    for service in &before {
        assert!(!registry.has(service));
    }
    assert_eq!(db.url, "sqlite::memory:");
    assert_eq!(notifier.channel(), "email");
    assert!(registry.resolve_as::<Database>().unwrap_err().is_not_registered());
}

#[test]
fn test_list_types_reports_registered_keys() {
    let registry = setup();
    registry
        .register_value(Database {
            url: "memory".to_string(),
        })
        .unwrap();
    registry
        .register_singleton_interface::<dyn Notifier, EmailNotifier, _>(|_| Ok(EmailNotifier))
        .unwrap();

    let types = registry.list_types();
    assert!(types.contains(&ServiceType::of::<Database>()));
    assert!(types.contains(&ServiceType::of::<dyn Notifier>()));
    assert!(!types.contains(&ServiceType::of::<EmailNotifier>()));
}

#[test]
fn test_describe_serializes_to_json() {
    let registry = setup();
    registry
        .register_value(Database {
            url: "memory".to_string(),
        })
        .unwrap();
    registry
        .register_factory(
            Factory::inject(|(db,): (Arc<Database>,)| Ok(Repository { db })),
            Lifecycle::Transient,
        )
        .unwrap();
    registry.resolve_as::<Repository>().unwrap();

    let infos = registry.describe();
    assert_eq!(infos.len(), 2);
    let repository = infos
        .iter()
        .find(|info| info.service == type_name::<Repository>())
        .unwrap();
    assert_eq!(repository.dependencies, vec![type_name::<Database>().to_string()]);
    assert_eq!(repository.creations, 1);

    let json = serde_json::to_value(&infos).unwrap();
    assert_eq!(json.as_array().map(Vec::len), Some(2));
    assert!(json[0]["lifecycle"].as_str().is_some());
}

use std::sync::Arc;

use test_case::test_case;

use crate::backend_registry::{BACKENDS, BackendRegistry};
use crate::{Backend, CpuBackend, Error, ErrorKind};

#[test_case("CPU", ""; "bare")]
#[test_case("cpu", ""; "lowercase")]
#[test_case("CPU:threads=4", "threads=4"; "configured")]
#[test_case("Cpu:a:b", "a:b"; "suffix_keeps_colons")]
fn test_create_cpu(device: &str, configuration: &str) {
    let backend = BackendRegistry::new().create(device).unwrap();
    assert_eq!(backend.name(), CpuBackend::NAME);
    assert_eq!(backend.configuration(), configuration);
}

#[test]
fn test_unknown_device() {
    let Err(err) = BackendRegistry::new().create("GPU:0") else { panic!("GPU must not be registered") };
    assert!(matches!(&err, Error::UnknownBackend { device } if device == "GPU"));
    assert_eq!(err.kind(), ErrorKind::Configuration);

    assert!(BackendRegistry::empty().create("CPU").is_err());
}

#[test]
fn test_register_factory() {
    let registry = BackendRegistry::new();
    registry.register_factory(
        "interp",
        Arc::new(|configuration| Ok(Arc::new(CpuBackend::new(format!("interp/{configuration}"))) as Arc<dyn Backend>)),
    );
    assert_eq!(registry.registered_devices(), vec!["CPU".to_string(), "INTERP".to_string()]);

    let backend = registry.create("INTERP:fast").unwrap();
    assert_eq!(backend.configuration(), "interp/fast");
}

#[test]
fn test_each_create_is_a_fresh_backend() {
    let a = BACKENDS.create("CPU").unwrap();
    let b = BACKENDS.create("CPU").unwrap();
    assert!(!std::ptr::addr_eq(Arc::as_ptr(&a), Arc::as_ptr(&b)));
    assert!(BACKENDS.registered_devices().contains(&"CPU".to_string()));
}

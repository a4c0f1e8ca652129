//! Tests for core_kernel error types

use core_kernel::error::CoreError;
use core_kernel::ports::PortError;

#[test]
fn test_core_error_validation() {
    let error = CoreError::validation("Invalid input");

    match error {
        CoreError::Validation(msg) => assert_eq!(msg, "Invalid input"),
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_core_error_invalid_state() {
    let error = CoreError::invalid_state("Cannot move a completed case back to pending");

    match error {
        CoreError::InvalidStateTransition(msg) => assert!(msg.contains("completed case")),
        _ => panic!("Expected InvalidStateTransition error"),
    }
}

#[test]
fn test_core_error_not_found() {
    let error = CoreError::not_found("Customer not found");

    match error {
        CoreError::NotFound(msg) => assert_eq!(msg, "Customer not found"),
        _ => panic!("Expected NotFound error"),
    }
}

#[test]
fn test_unknown_variant_display() {
    let error = CoreError::unknown_variant("payment status", "paid-ish");
    let display = error.to_string();

    assert!(display.contains("payment status"));
    assert!(display.contains("paid-ish"));
}

#[test]
fn test_core_error_configuration() {
    let error = CoreError::Configuration("Missing encryption key".to_string());

    match error {
        CoreError::Configuration(msg) => assert_eq!(msg, "Missing encryption key"),
        _ => panic!("Expected Configuration error"),
    }
}

#[test]
fn test_not_found_maps_to_port_not_found() {
    let port: PortError = CoreError::not_found("RNW-1").into();
    assert!(port.is_not_found());
    assert!(!port.is_transient());
}

#[test]
fn test_port_error_transient_kinds() {
    assert!(PortError::connection("refused").is_transient());
    assert!(PortError::ServiceUnavailable { service: "sendgrid".into() }.is_transient());
    assert!(!PortError::conflict("duplicate manager").is_transient());
    assert!(!PortError::internal("boom").is_transient());
}

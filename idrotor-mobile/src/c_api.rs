//! Flat C ABI over the shared rotator.
//!
//! ```c
//! void        rotateDeviceID(void);
//! const char *getCurrentDeviceID(void);
//! int32_t     idrotor_setup(void);
//! int32_t     idrotor_last_error(void);
//! ```
//!
//! `getCurrentDeviceID` returns a pointer into a thread-local buffer owned by
//! the library. It stays valid until the next `getCurrentDeviceID` call on the
//! same thread and must not be freed. On failure it returns NULL and
//! `idrotor_last_error` reports why.
//!
//! Every function catches panics; none unwinds into the caller.

use crate::{shared_rotator, DeviceIdRotator, IdRotorMobileError};
use idrotor_lib::IdRotorErrorCode;
use std::cell::{Cell, RefCell};
use std::ffi::{c_char, CString};
use std::panic;
use std::ptr;

/// Header for C and Objective-C callers, written by `generate-bindings`.
pub const C_HEADER: &str = r#"/* idrotor.h (generated by generate-bindings) */
#ifndef IDROTOR_H
#define IDROTOR_H

#include <stdint.h>

#ifdef __cplusplus
extern "C" {
#endif

/* Replace the current identifier. Check idrotor_last_error() afterwards. */
void rotateDeviceID(void);

/* Current identifier, or NULL. Owned by the library; valid until the next
 * call on the same thread. Do not free. */
const char *getCurrentDeviceID(void);

/* Initialize and redirect native accessors. 0 on success. */
int32_t idrotor_setup(void);

/* Code of the last failure on this thread; 0 if the last call succeeded. */
int32_t idrotor_last_error(void);

#define IDROTOR_ERR_ENTROPY_UNAVAILABLE 1000
#define IDROTOR_ERR_NOT_INITIALIZED 2000
#define IDROTOR_ERR_REDIRECTION_UNAVAILABLE 3000
#define IDROTOR_ERR_FORMAT_INVARIANT_VIOLATION 4000
#define IDROTOR_ERR_STORAGE 5000
#define IDROTOR_ERR_CONFIG 6000
#define IDROTOR_ERR_INTERNAL 9999

#ifdef __cplusplus
}
#endif

#endif /* IDROTOR_H */
"#;

thread_local! {
    static LAST_ERROR: Cell<i32> = const { Cell::new(0) };
    static CURRENT_ID: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn record<T>(result: Result<T, IdRotorMobileError>) -> Option<T> {
    match result {
        Ok(value) => {
            LAST_ERROR.with(|slot| slot.set(0));
            Some(value)
        }
        Err(err) => {
            tracing::debug!(code = err.code(), "C call failed: {err}");
            LAST_ERROR.with(|slot| slot.set(err.code()));
            None
        }
    }
}

fn record_panic() {
    tracing::error!("panic caught at C boundary");
    LAST_ERROR.with(|slot| slot.set(IdRotorErrorCode::Internal as i32));
}

fn rotate_with(rotator: &DeviceIdRotator) {
    record(rotator.rotate_identifier());
}

fn current_with(rotator: &DeviceIdRotator) -> *const c_char {
    let Some(current) = record(rotator.get_current_identifier()) else {
        return ptr::null();
    };
    // Canonical identifiers never contain NUL.
    let Ok(text) = CString::new(current) else {
        LAST_ERROR.with(|slot| slot.set(IdRotorErrorCode::FormatInvariantViolation as i32));
        return ptr::null();
    };
    CURRENT_ID.with(|buffer| {
        let mut buffer = buffer.borrow_mut();
        buffer.insert(text).as_ptr()
    })
}

/// Rotate the shared identifier.
///
/// Fails (see [`idrotor_last_error`]) if setup has not run or entropy is
/// unavailable; the identifier is unchanged in that case.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn rotateDeviceID() {
    let outcome = panic::catch_unwind(|| rotate_with(&shared_rotator()));
    if outcome.is_err() {
        record_panic();
    }
}

/// Current shared identifier as a NUL-terminated canonical string, or NULL.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn getCurrentDeviceID() -> *const c_char {
    panic::catch_unwind(|| current_with(&shared_rotator())).unwrap_or_else(|_| {
        record_panic();
        ptr::null()
    })
}

/// Initialize the shared rotator and redirect native entry points.
///
/// Returns 0 on success, including when some entry points could not be
/// redirected, otherwise the error code.
#[no_mangle]
pub extern "C" fn idrotor_setup() -> i32 {
    panic::catch_unwind(|| {
        record(shared_rotator().setup());
        idrotor_last_error()
    })
    .unwrap_or_else(|_| {
        record_panic();
        IdRotorErrorCode::Internal as i32
    })
}

/// Error code of the last C ABI call on this thread; 0 means it succeeded.
#[no_mangle]
pub extern "C" fn idrotor_last_error() -> i32 {
    LAST_ERROR.with(Cell::get)
}

#[cfg(test)]
mod tests {
    use super::*;
    use idrotor_lib::interception::{DispatchTableBackend, EntryPointKind};
    use idrotor_lib::rotation::IdentifierStore;
    use idrotor_lib::test_utils::{assert_intercepted, hardware_table, ExhaustibleEntropy};
    use idrotor_lib::{IdentifierGenerator, RotorConfig};
    use std::ffi::CStr;
    use std::sync::Arc;

    fn read(rotator: &DeviceIdRotator) -> Option<String> {
        let ptr = current_with(rotator);
        if ptr.is_null() {
            return None;
        }
        Some(unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string())
    }

    #[test]
    fn test_rotate_reports_entropy_failure() {
        let table = hardware_table();
        // One draw for setup, one for the first rotation.
        let rotator = DeviceIdRotator::from_store(
            IdentifierStore::new(
                RotorConfig::default(),
                IdentifierGenerator::new(Arc::new(ExhaustibleEntropy::new(8, 2))),
            ),
            Arc::new(DispatchTableBackend::new(table.clone())),
        );
        rotator.setup().unwrap();

        rotate_with(&rotator);
        assert_eq!(idrotor_last_error(), 0);
        let current = read(&rotator).unwrap();

        rotate_with(&rotator);
        assert_eq!(idrotor_last_error(), 1000);
        assert_eq!(read(&rotator).as_deref(), Some(current.as_str()));
        assert_eq!(idrotor_last_error(), 0);
        assert_eq!(rotator.rotation_count().unwrap(), 1);

        let symbol = EntryPointKind::VendorIdentifier.entry_point().symbol();
        assert_intercepted(&table, &symbol, &current);
    }

    #[test]
    fn test_header_matches_exports() {
        for declaration in [
            "void rotateDeviceID(void);",
            "const char *getCurrentDeviceID(void);",
            "int32_t idrotor_setup(void);",
            "int32_t idrotor_last_error(void);",
        ] {
            assert!(C_HEADER.contains(declaration), "missing {declaration}");
        }
        for (name, code) in [
            ("ENTROPY_UNAVAILABLE", IdRotorErrorCode::EntropyUnavailable),
            ("NOT_INITIALIZED", IdRotorErrorCode::NotInitialized),
            ("REDIRECTION_UNAVAILABLE", IdRotorErrorCode::RedirectionUnavailable),
            ("FORMAT_INVARIANT_VIOLATION", IdRotorErrorCode::FormatInvariantViolation),
            ("STORAGE", IdRotorErrorCode::Storage),
            ("CONFIG", IdRotorErrorCode::Config),
            ("INTERNAL", IdRotorErrorCode::Internal),
        ] {
            let line = format!("#define IDROTOR_ERR_{name} {}", code as i32);
            assert!(C_HEADER.contains(&line), "missing {line}");
        }
    }

    #[test]
    fn test_read_before_setup_is_null() {
        let rotator = DeviceIdRotator::from_store(
            IdentifierStore::with_defaults(),
            Arc::new(DispatchTableBackend::new(hardware_table())),
        );
        assert!(read(&rotator).is_none());
        assert_eq!(idrotor_last_error(), 2000);
    }
}

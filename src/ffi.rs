//! FFI bindings for the progress engine
//!
//! This module provides C-compatible functions for calling the engine from
//! other languages. Every function takes the records payload (JSON array or
//! NDJSON) and a request JSON object, and returns a newly allocated JSON
//! string that must be freed by the caller using `progress_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::EngineConfig;
use crate::error::ProgressError;
use crate::pipeline::ProgressEngine;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

type JsonOperation = fn(&ProgressEngine, &str, &str) -> Result<String, ProgressError>;

/// Shared body of the engine entry points.
unsafe fn run_operation(
    engine: &ProgressEngine,
    records: *const c_char,
    request: *const c_char,
    operation: JsonOperation,
) -> *mut c_char {
    clear_last_error();

    let records_str = match cstr_to_string(records) {
        Some(s) => s,
        None => {
            set_last_error("Invalid records string pointer");
            return ptr::null_mut();
        }
    };

    let request_str = match cstr_to_string(request) {
        Some(s) => s,
        None => {
            set_last_error("Invalid request string pointer");
            return ptr::null_mut();
        }
    };

    match operation(engine, &records_str, &request_str) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API (default configuration)
// ============================================================================

/// Build the evolution series for the request's visible member.
///
/// # Safety
/// - `records` and `request` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `progress_free_string`.
/// - Returns NULL on error; call `progress_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn progress_evolution(
    records: *const c_char,
    request: *const c_char,
) -> *mut c_char {
    run_operation(&ProgressEngine::new(), records, request, ProgressEngine::evolution_json)
}

/// Compare two records (or first and last when the request names none).
///
/// # Safety
/// Same contract as [`progress_evolution`]. The result is the JSON `null`
/// literal when fewer than two records are visible.
#[no_mangle]
pub unsafe extern "C" fn progress_compare(
    records: *const c_char,
    request: *const c_char,
) -> *mut c_char {
    run_operation(&ProgressEngine::new(), records, request, ProgressEngine::compare_json)
}

/// Summarize the request's visible member.
///
/// # Safety
/// Same contract as [`progress_evolution`].
#[no_mangle]
pub unsafe extern "C" fn progress_summary(
    records: *const c_char,
    request: *const c_char,
) -> *mut c_char {
    run_operation(&ProgressEngine::new(), records, request, ProgressEngine::summary_json)
}

/// Visible records newest first, with display-rounded BMI.
///
/// # Safety
/// Same contract as [`progress_evolution`].
#[no_mangle]
pub unsafe extern "C" fn progress_history(
    records: *const c_char,
    request: *const c_char,
) -> *mut c_char {
    run_operation(&ProgressEngine::new(), records, request, ProgressEngine::history_json)
}

/// Facility overview over every record the actor may read.
///
/// # Safety
/// Same contract as [`progress_evolution`].
#[no_mangle]
pub unsafe extern "C" fn progress_facility_overview(
    records: *const c_char,
    request: *const c_char,
) -> *mut c_char {
    run_operation(&ProgressEngine::new(), records, request, ProgressEngine::facility_json)
}

// ============================================================================
// Configured Engine API
// ============================================================================

/// Opaque handle to a configured ProgressEngine
pub struct ProgressEngineHandle {
    engine: ProgressEngine,
}

/// Create an engine from a configuration JSON object (NULL for defaults).
///
/// # Safety
/// - `config` must be NULL or a valid null-terminated C string.
/// - Must be freed with `progress_engine_free`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn progress_engine_new(config: *const c_char) -> *mut ProgressEngineHandle {
    clear_last_error();

    let config = if config.is_null() {
        EngineConfig::default()
    } else {
        let json = match cstr_to_string(config) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match EngineConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let handle = Box::new(ProgressEngineHandle {
        engine: ProgressEngine::with_config(config),
    });
    Box::into_raw(handle)
}

/// Free an engine handle.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `progress_engine_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn progress_engine_free(engine: *mut ProgressEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Evolution series with a configured engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `progress_engine_new`.
/// - Otherwise the same contract as [`progress_evolution`].
#[no_mangle]
pub unsafe extern "C" fn progress_engine_evolution(
    engine: *const ProgressEngineHandle,
    records: *const c_char,
    request: *const c_char,
) -> *mut c_char {
    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    run_operation(&(*engine).engine, records, request, ProgressEngine::evolution_json)
}

/// Summary with a configured engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `progress_engine_new`.
/// - Otherwise the same contract as [`progress_evolution`].
#[no_mangle]
pub unsafe extern "C" fn progress_engine_summary(
    engine: *const ProgressEngineHandle,
    records: *const c_char,
    request: *const c_char,
) -> *mut c_char {
    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    run_operation(&(*engine).engine, records, request, ProgressEngine::summary_json)
}

// ============================================================================
// Memory and error helpers
// ============================================================================

/// Get the last error message of the calling thread.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `progress_free_string`,
///   or NULL when no error is recorded.
#[no_mangle]
pub unsafe extern "C" fn progress_last_error() -> *mut c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(msg) => msg.clone().into_raw(),
        None => ptr::null_mut(),
    })
}

/// Free a string returned by any `progress_*` function.
///
/// # Safety
/// - `s` must be a pointer returned by this library, or NULL.
#[no_mangle]
pub unsafe extern "C" fn progress_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDS: &str = r#"[{"id": "00000000-0000-4000-8000-000000000001", "member": 1,
        "date": "2024-06-01", "weight": 80.0, "height": 180.0,
        "created_at": "2024-06-01T08:00:00Z", "updated_at": "2024-06-01T08:00:00Z"}]"#;

    const REQUEST: &str = r#"{"actor": {"user_id": 1, "role": "member", "member_id": 1},
        "as_of": "2024-06-30"}"#;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        progress_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_summary() {
        let records = CString::new(RECORDS).unwrap();
        let request = CString::new(REQUEST).unwrap();
        unsafe {
            let out = progress_summary(records.as_ptr(), request.as_ptr());
            assert!(!out.is_null());
            let value: serde_json::Value = serde_json::from_str(&take_string(out)).unwrap();
            assert_eq!(value["status"], "available");
            assert_eq!(value["record_count"], 1);
        }
    }

    #[test]
    fn test_ffi_compare_single_record_is_null() {
        let records = CString::new(RECORDS).unwrap();
        let request = CString::new(REQUEST).unwrap();
        unsafe {
            let out = progress_compare(records.as_ptr(), request.as_ptr());
            assert_eq!(take_string(out), "null");
        }
    }

    #[test]
    fn test_ffi_error_reporting() {
        let records = CString::new("not json").unwrap();
        let request = CString::new(REQUEST).unwrap();
        unsafe {
            let out = progress_evolution(records.as_ptr(), request.as_ptr());
            assert!(out.is_null());
            let err = progress_last_error();
            assert!(!err.is_null());
            assert!(take_string(err).contains("line 1"));

            let out = progress_evolution(ptr::null(), request.as_ptr());
            assert!(out.is_null());
        }
    }

    #[test]
    fn test_ffi_configured_engine() {
        let config = CString::new(r#"{"default_window_days": 7}"#).unwrap();
        let records = CString::new(RECORDS).unwrap();
        let request = CString::new(REQUEST).unwrap();
        unsafe {
            let engine = progress_engine_new(config.as_ptr());
            assert!(!engine.is_null());
            let out = progress_engine_evolution(engine, records.as_ptr(), request.as_ptr());
            let value: serde_json::Value = serde_json::from_str(&take_string(out)).unwrap();
            assert_eq!(value["window_days"], 7);
            assert_eq!(value["dates"].as_array().unwrap().len(), 0);
            progress_engine_free(engine);
        }
    }
}

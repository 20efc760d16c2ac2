//! FFI bindings for the RFI dormancy engine
//!
//! This module provides C-compatible functions for calling the engine from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `rfi_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::EngineConfig;
use crate::error::ComputeError;
use crate::matrix::ActivityMatrix;
use crate::pipeline::{analyze_matrix, DormancyEngine};

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

/// Parse an optional config pointer; NULL selects the defaults
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<EngineConfig, ComputeError> {
    if config_json.is_null() {
        return Ok(EngineConfig::default());
    }
    match cstr_to_string(config_json) {
        Some(json) => EngineConfig::from_json(&json),
        None => Err(ComputeError::Configuration(
            "config is not valid UTF-8".to_string(),
        )),
    }
}

fn finish(result: Result<String, ComputeError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Profile every user in a JSON activity matrix and return the batch report as JSON.
///
/// # Safety
/// - `matrix_json` must be a valid null-terminated C string.
/// - `config_json` must be a valid null-terminated C string or NULL for defaults.
/// - Returns a newly allocated string that must be freed with `rfi_free_string`.
/// - Returns NULL on error; call `rfi_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn rfi_analyze_json(
    matrix_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let matrix_str = match cstr_to_string(matrix_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid matrix JSON string pointer");
            return ptr::null_mut();
        }
    };

    finish(config_from_ptr(config_json).and_then(|config| {
        let report = analyze_matrix(&matrix_str, config)?;
        Ok(serde_json::to_string(&report)?)
    }))
}

/// Profile a single user and return the detail (row, episodes, RFI matrix) as JSON.
///
/// # Safety
/// - `matrix_json` and `user_id` must be valid null-terminated C strings.
/// - `config_json` must be a valid null-terminated C string or NULL for defaults.
/// - Returns a newly allocated string that must be freed with `rfi_free_string`.
/// - Returns NULL on error; call `rfi_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn rfi_profile_user_json(
    matrix_json: *const c_char,
    user_id: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let matrix_str = match cstr_to_string(matrix_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid matrix JSON string pointer");
            return ptr::null_mut();
        }
    };

    let user_str = match cstr_to_string(user_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid user_id string pointer");
            return ptr::null_mut();
        }
    };

    finish(config_from_ptr(config_json).and_then(|config| {
        let engine = DormancyEngine::new(config)?;
        let matrix = ActivityMatrix::parse_json(&matrix_str)?;
        let detail = engine.profile_user(&matrix, &user_str)?;
        Ok(serde_json::to_string(&detail)?)
    }))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by the `rfi_*` functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an `rfi_*` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn rfi_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next `rfi_*` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn rfi_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn rfi_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn sample_matrix_json() -> CString {
        CString::new(
            r#"{
                "users": [
                    {"user_id": "u1", "activity": [1, 1, 0, 0, 0, 1, 1, 0, 1]},
                    {"user_id": "u2", "activity": [1, 0, 0, 1, 0, 0, 0, 0, 0]},
                    {"user_id": "bad", "activity": [1, 0]}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_ffi_analyze_json() {
        let json = sample_matrix_json();

        unsafe {
            let result = rfi_analyze_json(json.as_ptr(), ptr::null());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(value["rows"].as_array().unwrap().len(), 2);
            assert_eq!(value["errors"][0]["user_id"], "bad");

            rfi_free_string(result);
        }
    }

    #[test]
    fn test_ffi_analyze_with_config() {
        let json = sample_matrix_json();
        let config = CString::new(r#"{"decay": {"model": "exponential", "k": 0.1}}"#).unwrap();

        unsafe {
            let result = rfi_analyze_json(json.as_ptr(), config.as_ptr());
            assert!(!result.is_null());
            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.contains("exponential"));
            rfi_free_string(result);
        }
    }

    #[test]
    fn test_ffi_profile_user() {
        let json = sample_matrix_json();
        let user = CString::new("u2").unwrap();

        unsafe {
            let result = rfi_profile_user_json(json.as_ptr(), user.as_ptr(), ptr::null());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(value["profile"]["User ID"], "u2");
            assert_eq!(value["episodes"].as_array().unwrap().len(), 2);

            rfi_free_string(result);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = rfi_analyze_json(invalid_json.as_ptr(), ptr::null());
            assert!(result.is_null());

            let error = rfi_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            let json = sample_matrix_json();
            let missing = CString::new("nobody").unwrap();
            let result = rfi_profile_user_json(json.as_ptr(), missing.as_ptr(), ptr::null());
            assert!(result.is_null());
            let error_str = CStr::from_ptr(rfi_last_error()).to_str().unwrap();
            assert!(error_str.contains("nobody"));
        }
    }

    #[test]
    fn test_ffi_invalid_config() {
        let json = sample_matrix_json();
        let config = CString::new(r#"{"recent_window_days": 0}"#).unwrap();

        unsafe {
            let result = rfi_analyze_json(json.as_ptr(), config.as_ptr());
            assert!(result.is_null());
            assert!(!rfi_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = rfi_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}

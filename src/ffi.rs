//! FFI bindings for gait-kinematics
//!
//! This module provides C-compatible functions for calling the analyzer from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `gait_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::bands::ReferenceBandSet;
use crate::config::AnalysisConfig;
use crate::pipeline::{analyze_json, GaitAnalyzer};
use crate::types::{Activity, CameraView};

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

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Caller must free the result
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Parse the view and activity arguments shared by every entry point
unsafe fn context_args(
    view: *const c_char,
    activity: *const c_char,
) -> Result<(CameraView, Activity), String> {
    let view = cstr_to_string(view).ok_or("Invalid view string pointer")?;
    let activity = cstr_to_string(activity).ok_or("Invalid activity string pointer")?;
    let view = view.parse::<CameraView>().map_err(|e| e.to_string())?;
    let activity = activity.parse::<Activity>().map_err(|e| e.to_string())?;
    Ok((view, activity))
}

// ============================================================================
// Stateless API
// ============================================================================

/// Analyze a landmark stream JSON document and return the report JSON.
///
/// # Safety
/// - `json`, `view`, and `activity` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `gait_free_string`.
/// - Returns NULL on error; call `gait_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gait_analyze_json(
    json: *const c_char,
    view: *const c_char,
    activity: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let (view, activity) = match context_args(view, activity) {
        Ok(args) => args,
        Err(e) => {
            set_last_error(&e);
            return ptr::null_mut();
        }
    };

    match analyze_json(&json_str, view, activity) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Return the built-in reference bands for a view and activity as JSON.
///
/// # Safety
/// - `view` and `activity` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `gait_free_string`.
/// - Returns NULL on error; call `gait_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gait_bands_json(
    view: *const c_char,
    activity: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let (view, activity) = match context_args(view, activity) {
        Ok(args) => args,
        Err(e) => {
            set_last_error(&e);
            return ptr::null_mut();
        }
    };

    let table = ReferenceBandSet::standard().table(view, activity);
    match serde_json::to_string(&table) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Configured Analyzer API
// ============================================================================

/// Opaque handle to a GaitAnalyzer
pub struct GaitAnalyzerHandle {
    analyzer: GaitAnalyzer,
}

/// Create an analyzer from an optional configuration JSON document.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Must be freed with `gait_analyzer_free`.
/// - Returns NULL on error; call `gait_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gait_analyzer_new(config_json: *const c_char) -> *mut GaitAnalyzerHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        AnalysisConfig::default()
    } else {
        let json_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match AnalysisConfig::from_json(&json_str) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match GaitAnalyzer::with_config(config) {
        Ok(analyzer) => Box::into_raw(Box::new(GaitAnalyzerHandle { analyzer })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an analyzer.
///
/// # Safety
/// - `analyzer` must be a valid pointer returned by `gait_analyzer_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn gait_analyzer_free(analyzer: *mut GaitAnalyzerHandle) {
    if !analyzer.is_null() {
        drop(Box::from_raw(analyzer));
    }
}

/// Analyze a landmark stream with a configured analyzer.
///
/// # Safety
/// - `analyzer` must be a valid pointer returned by `gait_analyzer_new`.
/// - `json`, `view`, and `activity` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `gait_free_string`.
/// - Returns NULL on error; call `gait_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gait_analyzer_analyze(
    analyzer: *const GaitAnalyzerHandle,
    json: *const c_char,
    view: *const c_char,
    activity: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if analyzer.is_null() {
        set_last_error("Null analyzer pointer");
        return ptr::null_mut();
    }

    let handle = &*analyzer;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let (view, activity) = match context_args(view, activity) {
        Ok(args) => args,
        Err(e) => {
            set_last_error(&e);
            return ptr::null_mut();
        }
    };

    match handle.analyzer.analyze_json(&json_str, view, activity, None) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a gait function.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a gait function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn gait_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next gait function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn gait_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn gait_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

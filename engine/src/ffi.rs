//! FFI layer for mobile hosts.
//!
//! This module provides C-compatible functions that a React Native native
//! module (or any other host) can call. All data crosses the boundary as
//! JSON strings.
//!
//! # Memory Management
//!
//! - Strings returned by `berth_*` functions are allocated by Rust
//! - Caller must free them with `berth_string_free`
//! - Store pointers must be freed with `berth_store_free`
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>"}` on failure

use crate::{
    ActionKind, CollectionName, Error, FailureOutcome, OfflineSnapshot, OfflineStore,
    PendingAction, Transition,
};
use std::ffi::{c_char, CStr, CString};
use std::ptr;

/// Result wrapper for FFI responses.
#[derive(serde::Serialize)]
#[serde(untagged)]
enum FfiResult<T: serde::Serialize> {
    Ok { ok: T },
    Err { error: String },
}

impl<T: serde::Serialize> FfiResult<T> {
    fn ok(value: T) -> Self {
        FfiResult::Ok { ok: value }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e))
    }
}

/// Serializable form of [`FailureOutcome`].
#[derive(serde::Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
enum FailureReport {
    #[serde(rename_all = "camelCase")]
    Retry { retry_count: u32 },
    Dropped { action: PendingAction },
}

impl From<FailureOutcome> for FailureReport {
    fn from(outcome: FailureOutcome) -> Self {
        match outcome {
            FailureOutcome::Retry(retry_count) => FailureReport::Retry { retry_count },
            FailureOutcome::Dropped(action) => FailureReport::Dropped { action },
        }
    }
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `berth_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => CString::new(r#"{"error":"string contained null bytes"}"#)
            .unwrap_or_default()
            .into_raw(),
    }
}

fn ok_string<T: serde::Serialize>(value: T) -> *mut c_char {
    to_c_string(FfiResult::ok(value).to_json())
}

fn err_string(message: impl Into<String>) -> *mut c_char {
    to_c_string(
        FfiResult::<()>::Err {
            error: message.into(),
        }
        .to_json(),
    )
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

unsafe fn parse_collection(name: *const c_char) -> Result<CollectionName, String> {
    let name = from_c_string(name).ok_or("invalid collection name")?;
    name.parse().map_err(|e: Error| e.to_string())
}

// ============================================================================
// Store Lifecycle
// ============================================================================

/// Create a new, empty store for a device.
///
/// # Returns
/// Pointer to OfflineStore, or null on failure.
///
/// # Safety
/// - `node_id` must be a valid null-terminated C string or null
/// - Caller must free the returned pointer with `berth_store_free`
#[no_mangle]
pub unsafe extern "C" fn berth_store_new(node_id: *const c_char) -> *mut OfflineStore {
    match from_c_string(node_id) {
        Some(node_id) => Box::into_raw(Box::new(OfflineStore::new(node_id))),
        None => ptr::null_mut(),
    }
}

/// Free a store.
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new`
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn berth_store_free(store: *mut OfflineStore) {
    if !store.is_null() {
        drop(Box::from_raw(store));
    }
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a valid pointer from a `berth_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn berth_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Pending Actions
// ============================================================================

/// Queue a mutation.
///
/// # Arguments
/// - `kind`: one of `booking`, `message`, `favorite`, `review`
/// - `payload_json`: request body for the kind's endpoint
/// - `now`: timestamp in milliseconds
///
/// # Returns
/// JSON string: `{"ok": "<action id>"}` or `{"error": "message"}`
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new` or null
/// - `kind` and `payload_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `berth_string_free`
#[no_mangle]
pub unsafe extern "C" fn berth_store_enqueue(
    store: *mut OfflineStore,
    kind: *const c_char,
    payload_json: *const c_char,
    now: u64,
) -> *mut c_char {
    let store = match store.as_mut() {
        Some(s) => s,
        None => return err_string("null store pointer"),
    };

    let kind = match from_c_string(kind).map(|k| k.parse::<ActionKind>()) {
        Some(Ok(kind)) => kind,
        Some(Err(e)) => return err_string(e.to_string()),
        None => return err_string("invalid action kind"),
    };

    let payload_str = match from_c_string(payload_json) {
        Some(s) => s,
        None => return err_string("invalid payload JSON"),
    };

    let payload: serde_json::Value = match serde_json::from_str(&payload_str) {
        Ok(p) => p,
        Err(e) => return err_string(Error::InvalidPayload(e.to_string()).to_string()),
    };

    ok_string(store.enqueue(kind, payload, now))
}

/// Get the pending actions in replay order.
///
/// # Returns
/// JSON string: `{"ok": [PendingAction, ...]}` or `{"error": "message"}`
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new` or null
/// - Caller must free the returned string with `berth_string_free`
#[no_mangle]
pub unsafe extern "C" fn berth_store_pending(store: *const OfflineStore) -> *mut c_char {
    match store.as_ref() {
        Some(s) => ok_string(s.list_pending()),
        None => err_string("null store pointer"),
    }
}

/// Get pending action count, or -1 for a null store.
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new` or null
#[no_mangle]
pub unsafe extern "C" fn berth_store_pending_count(store: *const OfflineStore) -> i64 {
    match store.as_ref() {
        Some(s) => s.list_pending().len() as i64,
        None => -1,
    }
}

/// Remove a delivered action.
///
/// # Returns
/// JSON string: `{"ok": PendingAction}` or `{"error": "message"}`
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new` or null
/// - `id` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `berth_string_free`
#[no_mangle]
pub unsafe extern "C" fn berth_store_remove(
    store: *mut OfflineStore,
    id: *const c_char,
) -> *mut c_char {
    let store = match store.as_mut() {
        Some(s) => s,
        None => return err_string("null store pointer"),
    };

    let id = match from_c_string(id) {
        Some(s) => s,
        None => return err_string("invalid id"),
    };

    match store.remove(&id) {
        Ok(action) => ok_string(action),
        Err(e) => err_string(e.to_string()),
    }
}

/// Record a failed replay of an action.
///
/// # Returns
/// JSON string: `{"ok": {"status": "retry", "retryCount": n}}`,
/// `{"ok": {"status": "dropped", "action": PendingAction}}` or
/// `{"error": "message"}`
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new` or null
/// - `id` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `berth_string_free`
#[no_mangle]
pub unsafe extern "C" fn berth_store_record_failure(
    store: *mut OfflineStore,
    id: *const c_char,
) -> *mut c_char {
    let store = match store.as_mut() {
        Some(s) => s,
        None => return err_string("null store pointer"),
    };

    let id = match from_c_string(id) {
        Some(s) => s,
        None => return err_string("invalid id"),
    };

    match store.record_failure(&id) {
        Ok(outcome) => ok_string(FailureReport::from(outcome)),
        Err(e) => err_string(e.to_string()),
    }
}

// ============================================================================
// Cached Collections
// ============================================================================

/// Replace a cached collection.
///
/// # Arguments
/// - `name`: one of `boats`, `bookings`, `messages`
/// - `items_json`: JSON array of records
/// - `now`: timestamp in milliseconds
///
/// # Returns
/// JSON string: `{"ok": null}` or `{"error": "message"}`
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new` or null
/// - `name` and `items_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `berth_string_free`
#[no_mangle]
pub unsafe extern "C" fn berth_store_write_collection(
    store: *mut OfflineStore,
    name: *const c_char,
    items_json: *const c_char,
    now: u64,
) -> *mut c_char {
    let store = match store.as_mut() {
        Some(s) => s,
        None => return err_string("null store pointer"),
    };

    let name = match parse_collection(name) {
        Ok(n) => n,
        Err(e) => return err_string(e),
    };

    let items_str = match from_c_string(items_json) {
        Some(s) => s,
        None => return err_string("invalid items JSON"),
    };

    let items: Vec<serde_json::Value> = match serde_json::from_str(&items_str) {
        Ok(items) => items,
        Err(e) => return err_string(format!("parse error: {}", e)),
    };

    store.write_collection(name, items, now);
    ok_string(())
}

/// Read a cached collection.
///
/// # Returns
/// JSON string: `{"ok": [items]}` or `{"error": "message"}`
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new` or null
/// - `name` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `berth_string_free`
#[no_mangle]
pub unsafe extern "C" fn berth_store_read_collection(
    store: *const OfflineStore,
    name: *const c_char,
) -> *mut c_char {
    let store = match store.as_ref() {
        Some(s) => s,
        None => return err_string("null store pointer"),
    };

    match parse_collection(name) {
        Ok(name) => ok_string(store.read_collection(name)),
        Err(e) => err_string(e),
    }
}

// ============================================================================
// Mode and Status
// ============================================================================

/// Apply a connectivity signal.
///
/// # Arguments
/// - `offline`: 0 for online, non-zero for offline
///
/// # Returns
/// JSON string: `{"ok": "unchanged" | "wentOffline" | "cameOnline"}`
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new` or null
/// - Caller must free the returned string with `berth_string_free`
#[no_mangle]
pub unsafe extern "C" fn berth_store_set_offline(
    store: *mut OfflineStore,
    offline: i32,
) -> *mut c_char {
    let store = match store.as_mut() {
        Some(s) => s,
        None => return err_string("null store pointer"),
    };

    let transition = match store.set_offline(offline != 0) {
        Transition::Unchanged => "unchanged",
        Transition::WentOffline => "wentOffline",
        Transition::CameOnline => "cameOnline",
    };
    ok_string(transition)
}

/// 1 when offline, 0 when online, -1 for a null store.
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new` or null
#[no_mangle]
pub unsafe extern "C" fn berth_store_is_offline(store: *const OfflineStore) -> i32 {
    match store.as_ref() {
        Some(s) => i32::from(s.is_offline()),
        None => -1,
    }
}

/// Record a completed sync at `now`.
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new` or null
#[no_mangle]
pub unsafe extern "C" fn berth_store_mark_synced(store: *mut OfflineStore, now: u64) {
    if let Some(s) = store.as_mut() {
        s.mark_synced(now);
    }
}

/// Get a status summary.
///
/// # Returns
/// JSON string: `{"ok": SyncStatus}` or `{"error": "message"}`
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new` or null
/// - Caller must free the returned string with `berth_string_free`
#[no_mangle]
pub unsafe extern "C" fn berth_store_status(store: *const OfflineStore, now: u64) -> *mut c_char {
    match store.as_ref() {
        Some(s) => ok_string(s.status(now)),
        None => err_string("null store pointer"),
    }
}

/// Drop all cached collections, pending actions and the last-sync marker.
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new` or null
#[no_mangle]
pub unsafe extern "C" fn berth_store_clear(store: *mut OfflineStore) {
    if let Some(s) = store.as_mut() {
        s.clear();
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Export store state as a snapshot.
///
/// # Returns
/// JSON string: `{"ok": OfflineSnapshot}` or `{"error": "message"}`
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new` or null
/// - Caller must free the returned string with `berth_string_free`
#[no_mangle]
pub unsafe extern "C" fn berth_store_export(store: *const OfflineStore) -> *mut c_char {
    match store.as_ref() {
        Some(s) => ok_string(s.export_state()),
        None => err_string("null store pointer"),
    }
}

/// Import state from a snapshot.
///
/// # Returns
/// JSON string: `{"ok": null}` or `{"error": "message"}`
///
/// # Safety
/// - `store` must be a valid pointer from `berth_store_new` or null
/// - `snapshot_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `berth_string_free`
#[no_mangle]
pub unsafe extern "C" fn berth_store_import(
    store: *mut OfflineStore,
    snapshot_json: *const c_char,
) -> *mut c_char {
    let store = match store.as_mut() {
        Some(s) => s,
        None => return err_string("null store pointer"),
    };

    let snapshot_str = match from_c_string(snapshot_json) {
        Some(s) => s,
        None => return err_string("invalid snapshot JSON"),
    };

    let result = OfflineSnapshot::from_json(&snapshot_str).and_then(|s| store.import_state(s));
    match result {
        Ok(()) => ok_string(()),
        Err(e) => err_string(e.to_string()),
    }
}

// ============================================================================
// Utility
// ============================================================================

/// Get the engine version.
///
/// # Returns
/// Static string pointer (do not free)
#[no_mangle]
pub extern "C" fn berth_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

/// Get the snapshot format version.
#[no_mangle]
pub extern "C" fn berth_snapshot_format_version() -> u32 {
    crate::SNAPSHOT_FORMAT_VERSION
}

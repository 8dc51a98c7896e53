//! C ABI surface (spec.md §6), matching the original `MMW.h`/`mmw_*`
//! symbol names and argument shapes so an existing non-Rust binding
//! (the original's Python `Bindings.cpp`, or any future language shim)
//! can link against this library unchanged.
//!
//! `extern "C"` functions can't carry generic state across calls, so
//! this is the one place in the crate that keeps a process-wide
//! singleton — exactly the scope spec.md §9 says a C ABI needs, and no
//! wider than that.

use std::ffi::{c_char, CStr, CString};
use std::os::raw::c_void;
use std::sync::{Mutex, OnceLock};

use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::ClientError;

/// Mirrors the original's `MmwResult`: `0` on success, nonzero on
/// failure. No error ever unwinds across this boundary (spec.md §7).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmwResult {
    Ok = 0,
    Error = 1,
}

/// Mirrors spec.md §6's `reliability ∈ {BEST_EFFORT, RELIABLE}`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmwReliability {
    BestEffort = 0,
    Reliable = 1,
}

impl From<MmwReliability> for bool {
    fn from(r: MmwReliability) -> bool {
        matches!(r, MmwReliability::Reliable)
    }
}

static CLIENT: OnceLock<Mutex<Option<Client>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<Client>> {
    CLIENT.get_or_init(|| Mutex::new(None))
}

/// # Safety
/// `ptr` must be null or point to a valid, NUL-terminated C string that
/// outlives this call.
unsafe fn str_from_c(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(str::to_owned)
}

/// `mmw_initialize(host, port)`: stores the broker endpoint and builds
/// the singleton codec for the process. Errors if `host` is null or
/// `port` is `0` (spec.md §4.4).
///
/// # Safety
/// `host` must be null or a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn mmw_initialize(host: *const c_char, port: u16) -> MmwResult {
    let Some(host) = str_from_c(host) else {
        return MmwResult::Error;
    };
    let config = ClientConfig {
        broker_host: host,
        broker_port: port,
        ..ClientConfig::default()
    };
    match Client::initialize(config) {
        Ok(client) => {
            *slot().lock().unwrap() = Some(client);
            MmwResult::Ok
        }
        Err(e) => {
            tracing::error!(error = %e, "mmw_initialize failed");
            MmwResult::Error
        }
    }
}

/// # Safety
/// `topic` must be null or a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn mmw_create_publisher(topic: *const c_char) -> MmwResult {
    with_topic(topic, |client, topic| client.create_publisher(topic))
}

/// `callback` is invoked on the subscriber's dedicated receive thread
/// (spec.md §4.4, §9) with a NUL-terminated copy of each delivered
/// text payload; the pointer is only valid for the duration of the
/// call.
///
/// # Safety
/// `topic` must be null or a valid NUL-terminated C string. `callback`,
/// if non-null, must be safe to call from a thread other than the one
/// that registered the subscriber.
#[no_mangle]
pub unsafe extern "C" fn mmw_create_subscriber(
    topic: *const c_char,
    callback: Option<unsafe extern "C" fn(*const c_char)>,
) -> MmwResult {
    let Some(callback) = callback else {
        return MmwResult::Error;
    };
    with_topic(topic, |client, topic| {
        client.create_subscriber(topic, move |text: &str| {
            if let Ok(c_text) = CString::new(text) {
                unsafe { callback(c_text.as_ptr()) };
            }
        })
    })
}

/// As [`mmw_create_subscriber`], but `callback` receives a pointer to
/// the raw payload bytes of a binary publish. Matching the original's
/// `mmw_create_subscriber_raw`, no length is passed alongside the
/// pointer — callers that need one should encode it in the payload.
///
/// # Safety
/// Same requirements as [`mmw_create_subscriber`].
#[no_mangle]
pub unsafe extern "C" fn mmw_create_subscriber_raw(
    topic: *const c_char,
    callback: Option<unsafe extern "C" fn(*const c_void)>,
) -> MmwResult {
    let Some(callback) = callback else {
        return MmwResult::Error;
    };
    with_topic(topic, |client, topic| {
        client.create_subscriber_raw(topic, move |bytes: &[u8]| {
            unsafe { callback(bytes.as_ptr() as *const c_void) };
        })
    })
}

/// # Safety
/// `topic` and `payload` must be null or valid NUL-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn mmw_publish(
    topic: *const c_char,
    payload: *const c_char,
    reliability: MmwReliability,
) -> MmwResult {
    let (Some(topic), Some(payload)) = (str_from_c(topic), str_from_c(payload)) else {
        return MmwResult::Error;
    };
    call_client(|client| client.publish(&topic, &payload, reliability.into()))
}

/// # Safety
/// `topic` must be null or a valid NUL-terminated C string. `payload`
/// must be null or point to at least `size` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn mmw_publish_raw(
    topic: *const c_char,
    payload: *const c_void,
    size: usize,
    reliability: MmwReliability,
) -> MmwResult {
    let Some(topic) = str_from_c(topic) else {
        return MmwResult::Error;
    };
    if payload.is_null() {
        return MmwResult::Error;
    }
    let bytes = std::slice::from_raw_parts(payload as *const u8, size);
    call_client(|client| client.publish_raw(&topic, bytes, reliability.into()))
}

/// Orderly teardown: releases the process-wide client singleton so a
/// later `mmw_initialize` call can start fresh.
#[no_mangle]
pub extern "C" fn mmw_cleanup() -> MmwResult {
    let client = slot().lock().unwrap().take();
    match client {
        Some(client) => match client.cleanup() {
            Ok(()) => MmwResult::Ok,
            Err(e) => {
                tracing::error!(error = %e, "mmw_cleanup failed");
                MmwResult::Error
            }
        },
        None => MmwResult::Error,
    }
}

fn call_client(f: impl FnOnce(&Client) -> Result<(), ClientError>) -> MmwResult {
    let guard = slot().lock().unwrap();
    match guard.as_ref() {
        Some(client) => match f(client) {
            Ok(()) => MmwResult::Ok,
            Err(e) => {
                tracing::error!(error = %e, "client call failed");
                MmwResult::Error
            }
        },
        None => {
            tracing::error!("client call failed: not initialized");
            MmwResult::Error
        }
    }
}

unsafe fn with_topic(
    topic: *const c_char,
    f: impl FnOnce(&Client, &str) -> Result<(), ClientError>,
) -> MmwResult {
    let Some(topic) = str_from_c(topic) else {
        return MmwResult::Error;
    };
    call_client(|client| f(client, &topic))
}

#![allow(clippy::missing_safety_doc)]

use std::cell::RefCell;
use std::ffi::{c_char, CStr, CString};
use std::mem::ManuallyDrop;
use std::ptr::null_mut;
use std::slice;

use hce::{CommunicationLog, DeactivationReason, Filter, HostApduService, Responder};

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = RefCell::new(None);
}

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("Invalid filter: {0}")]
    Filter(#[from] hce::filter::Error),

    #[error("Communication log is unavailable: {0}")]
    Log(#[from] hce::sink::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("String contains an interior NUL: {0}")]
    Nul(#[from] std::ffi::NulError),

    #[error("String is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

fn unwrap_or<T, E>(result: Result<T, E>, default: T) -> T
where
    E: ToString,
{
    // If result is an error, sets the message to LAST_ERROR.
    // Clears the last error otherwise.
    LAST_ERROR.with(|last| *last.borrow_mut() = result.as_ref().err().map(|e| e.to_string()));

    match result {
        Ok(value) => value,
        Err(_) => default,
    }
}

/// A struct represents a byte array.
/// Dependents can read it from ptr to ptr+len, and should ignore about cap.
/// ptr can be null pointer, so dependents must check the ptr is not null.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct ByteArray {
    ptr: *mut u8,
    len: usize,
    cap: usize,
}

impl Default for ByteArray {
    fn default() -> Self {
        Self {
            ptr: null_mut(),
            len: 0,
            cap: 0,
        }
    }
}

impl From<Vec<u8>> for ByteArray {
    fn from(bytes: Vec<u8>) -> Self {
        let mut bytes = ManuallyDrop::new(bytes);

        Self {
            ptr: bytes.as_mut_ptr(),
            len: bytes.len(),
            cap: bytes.capacity(),
        }
    }
}

impl ByteArray {
    fn drain(self) {
        let Self { ptr, len, cap } = self;
        if !ptr.is_null() {
            let _ = unsafe { Vec::from_raw_parts(ptr, len, cap) };
        }
    }
}

/// An emulated card: the responder, its communication log, and the filter for log views.
pub struct Service {
    responder: Responder<CommunicationLog>,
    filter: Filter,
}

impl Service {
    fn new(capacity: usize) -> Self {
        Self {
            responder: Responder::new(CommunicationLog::with_capacity(capacity)),
            filter: Filter::new(),
        }
    }

    fn dump_log(&self) -> Result<CString, Error> {
        let entries = self.responder.sink().visible(&self.filter)?;
        let mut buf = Vec::new();
        CommunicationLog::write_to(&mut buf, &entries)?;

        Ok(CString::new(buf)?)
    }
}

/// Initiates the libhce_ffi library.
/// Currently this occur no side effects, but it will be added in the future.
/// So dependents should call this before using other functions.
#[no_mangle]
pub extern "C" fn hce_init() {}

/// Returns the latest error occurred before calling this function.
/// If no error occurred before or failed to get the error, returns null pointer.
/// The returned string must be released with `hce_string_free`.
#[no_mangle]
pub extern "C" fn hce_last_error() -> *mut c_char {
    match LAST_ERROR
        .with(|last| last.borrow().clone())
        .and_then(|e| CString::new(e).ok())
    {
        Some(str) => str.into_raw(),
        None => null_mut(),
    }
}

/// Releases a string returned by this library.
#[no_mangle]
pub unsafe extern "C" fn hce_string_free(str: *mut c_char) {
    if !str.is_null() {
        let _ = CString::from_raw(str);
    }
}

/// Creates a new emulated card keeping up to `capacity` log entries.
#[no_mangle]
pub extern "C" fn hce_new_service(capacity: usize) -> *mut Service {
    Box::into_raw(Box::new(Service::new(capacity)))
}

/// Closes the emulated card.
#[no_mangle]
pub unsafe extern "C" fn hce_service_close(service: *mut Service) {
    if !service.is_null() {
        let _ = Box::from_raw(service);
    }
}

/// Handles the command APDU of `len` octets at `command`, then returns the response APDU.
/// A null `command` is handled as an empty one.
/// The response must be released with `hce_byte_array_free`.
#[no_mangle]
pub unsafe extern "C" fn hce_service_handle_command(
    service: *const Service,
    command: *const u8,
    len: usize,
) -> ByteArray {
    let command: &[u8] = match command.is_null() {
        true => &[],
        _ => slice::from_raw_parts(command, len),
    };

    match service.as_ref() {
        Some(service) => service.responder.handle_command(command).into(),
        None => ByteArray::default(),
    }
}

/// Notifies the emulated card that the link was deactivated.
#[no_mangle]
pub unsafe extern "C" fn hce_service_handle_deactivation(service: *const Service, reason: i32) {
    if let Some(service) = service.as_ref() {
        service
            .responder
            .handle_deactivation(DeactivationReason::from(reason));
    }
}

/// Adds a filter pattern hiding matching entries from the dumped log.
/// Returns false and sets the last error if the pattern is invalid.
#[no_mangle]
pub unsafe extern "C" fn hce_service_add_filter(
    service: *mut Service,
    pattern: *const c_char,
) -> bool {
    let service = match service.as_mut() {
        Some(service) if !pattern.is_null() => service,
        _ => return false,
    };

    unwrap_or(
        CStr::from_ptr(pattern)
            .to_str()
            .map_err(Error::from)
            .and_then(|p| service.filter.add(p).map_err(Error::from))
            .map(|_| true),
        false,
    )
}

/// Dumps the visible communication log, one message per line.
/// The returned string must be released with `hce_string_free`.
#[no_mangle]
pub unsafe extern "C" fn hce_service_dump_log(service: *const Service) -> *mut c_char {
    match service.as_ref() {
        Some(service) => unwrap_or(service.dump_log().map(CString::into_raw), null_mut()),
        None => null_mut(),
    }
}

/// Releases a byte array returned by this library.
#[no_mangle]
pub extern "C" fn hce_byte_array_free(array: ByteArray) {
    array.drain();
}

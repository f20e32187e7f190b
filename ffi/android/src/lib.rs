#![allow(clippy::missing_safety_doc)]

#[macro_use]
extern crate log;

use std::sync::Mutex;

use jni::objects::JClass;
use jni::sys::{jbyteArray, jint, jlong, jstring};
use jni::JNIEnv;

use hce::sink::{self, Event, Sink};
use hce::{CommunicationLog, DeactivationReason, HostApduService, Responder};

const NULL: jbyteArray = 0 as jbyteArray;

static LAST_ERROR: Mutex<Option<String>> = Mutex::new(None);

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error("JNI Error: {0}")]
    Jni(#[from] jni::errors::Error),

    #[error("Service handle is null")]
    NullService,
}

/// Forwards every event to the platform log, the way a `HostApduService` would with `Log.d`.
#[derive(Debug, Default, Clone, Copy)]
struct LogcatSink;

impl Sink for LogcatSink {
    fn record(&self, event: &Event<'_>) -> sink::Result<()> {
        match event {
            Event::Command(bytes) => debug!("Received APDU: {}", hex::encode_upper(bytes)),
            Event::Response(bytes) => debug!("Sent APDU: {}", hex::encode_upper(bytes)),
            Event::Deactivated(reason) => debug!("Deactivated: reason = {}", reason),
        }

        Ok(())
    }
}

type Service = Responder<(LogcatSink, CommunicationLog)>;

fn new_service(capacity: usize) -> Service {
    Responder::new((LogcatSink, CommunicationLog::with_capacity(capacity)))
}

fn set_last_error(message: Option<String>) {
    if let Ok(mut last) = LAST_ERROR.lock() {
        *last = message;
    }
}

fn unwrap_or_default<T>(result: Result<T, Error>, default: T) -> T {
    match result {
        Ok(value) => {
            set_last_error(None);
            value
        }
        Err(err) => {
            error!("{}", err);
            set_last_error(Some(err.to_string()));
            default
        }
    }
}

macro_rules! wrap {
    (jbyteArray, $inner: expr) => {
        unwrap_or_default((|| -> Result<jbyteArray, Error> { $inner })(), NULL)
    };

    ($t: ty, $inner: expr) => {
        unwrap_or_default((|| -> Result<$t, Error> { $inner })(), Default::default())
    };
}

unsafe fn service<'a>(ptr: jlong) -> Result<&'a Service, Error> {
    (ptr as *const Service).as_ref().ok_or(Error::NullService)
}

#[no_mangle]
pub extern "C" fn Java_rs_hce_ffi_LibHce_init(_env: JNIEnv, _class: JClass) {
    #[cfg(target_os = "android")]
    {
        if let Err(e) = android_log::init("HCE.FFI") {
            set_last_error(Some(e.to_string()));
        }
    }
}

#[no_mangle]
pub extern "C" fn Java_rs_hce_ffi_LibHce_lastError(env: JNIEnv, _class: JClass) -> jstring {
    let message = LAST_ERROR.lock().ok().and_then(|last| last.clone());

    match message.map(|m| env.new_string(m)) {
        Some(Ok(str)) => str.into_raw(),
        _ => 0 as jstring,
    }
}

#[no_mangle]
pub extern "C" fn Java_rs_hce_ffi_LibHce_newService(
    _env: JNIEnv,
    _class: JClass,
    capacity: jint,
) -> jlong {
    let service = new_service(capacity.max(0) as usize);

    Box::into_raw(Box::new(service)) as jlong
}

#[no_mangle]
pub unsafe extern "C" fn Java_rs_hce_ffi_LibHce_processCommandApdu(
    env: JNIEnv,
    _class: JClass,
    service_ptr: jlong,
    apdu: jbyteArray,
) -> jbyteArray {
    wrap!(jbyteArray, {
        let service = service(service_ptr)?;
        let command = match apdu.is_null() {
            true => vec![],
            _ => env.convert_byte_array(apdu)?,
        };

        let response = service.handle_command(&command);

        Ok(env.byte_array_from_slice(&response)?)
    })
}

#[no_mangle]
pub unsafe extern "C" fn Java_rs_hce_ffi_LibHce_onDeactivated(
    _env: JNIEnv,
    _class: JClass,
    service_ptr: jlong,
    reason: jint,
) {
    wrap!((), {
        service(service_ptr)?.handle_deactivation(DeactivationReason::from(reason));

        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn Java_rs_hce_ffi_LibHce_closeService(
    _env: JNIEnv,
    _class: JClass,
    service_ptr: jlong,
) {
    if service_ptr != 0 {
        let _ = Box::from_raw(service_ptr as *mut Service);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_answers_and_logs() {
        let service = new_service(4);

        assert_eq!(vec![0x90, 0x00], service.handle_command(&[0x00, 0xA4, 0x04, 0x00]));
        service.handle_deactivation(DeactivationReason::DESELECTED);

        let (_, log) = service.sink();
        assert_eq!(3, log.len());
    }

    #[test]
    fn test_null_service_handle() {
        assert!(matches!(unsafe { service(0) }, Err(Error::NullService)));
    }

    #[test]
    fn test_logcat_sink_never_fails() {
        assert!(LogcatSink.record(&Event::Command(&[])).is_ok());
    }
}

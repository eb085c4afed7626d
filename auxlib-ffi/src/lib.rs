//! AUXLib: C ABI over the scripted signal engine.
//!
//! The host creates instances, gets small integer handles back, evaluates
//! scripts against them and reads the flattened samples, all without seeing
//! any engine type.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`; see `include/auxlib.h`.
//! - Every call takes one process-wide lock, so calls from different threads
//!   serialize.
//! - A buffer returned by `aux_eval` stays valid until the next `aux_eval` or
//!   `aux_delete` of the same handle.
//! - Failures write a message readable through `aux_get_err_msg`; successful
//!   calls leave the previous message in place.
//!
//! Rust callers can use [`Session`] directly.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::path::Path;
use std::ptr;

use auxlib_engine::{AuxEngine, EngineConfig};
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{Mutex, MutexGuard};

pub mod error;
pub mod error_channel;
mod panic_guard;
pub mod registry;
pub mod session;

pub use error::{AuxError, UNKNOWN_ERROR};
pub use error_channel::{ErrorChannel, MAX_ERR_MSG_LEN};
pub use registry::{Handle, Registry, ResultCache};
pub use session::{Evaluation, InfoValue, Paths, Property, Session};

use error::{EVAL_EMPTY, EVAL_OTHER_ERROR};
use panic_guard::ffi_guard;

static SESSION: Lazy<Mutex<Session<AuxEngine>>> =
    Lazy::new(|| Mutex::new(Session::new(EngineConfig::from_env())));

/// The session behind the C entry points.
pub fn session() -> MutexGuard<'static, Session<AuxEngine>> {
    SESSION.lock()
}

pub(crate) fn record_panic(payload: &(dyn std::any::Any + Send)) {
    let err = AuxError::from_panic(payload);
    tracing::error!("panic at the C boundary: {err}");
    let _ = session().report::<()>(Err(err));
}

/// # Safety
/// `p` must be null or point to a NUL-terminated string that outlives `'a`.
unsafe fn opt_str<'a>(p: *const c_char) -> Result<Option<&'a str>, AuxError> {
    if p.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(p)
        .to_str()
        .map(Some)
        .map_err(|_| AuxError::BadArgument("string argument is not valid UTF-8"))
}

/// # Safety
/// As [`opt_str`].
unsafe fn req_str<'a>(p: *const c_char, what: &'static str) -> Result<&'a str, AuxError> {
    opt_str(p)?.ok_or(AuxError::BadArgument(what))
}

/// # Safety
/// As [`opt_str`], for each pointer.
unsafe fn paths<'a>(
    wav: *const c_char,
    aux: *const c_char,
    data: *const c_char,
) -> Result<Paths<'a>, AuxError> {
    Ok(Paths { wav: opt_str(wav)?, aux: opt_str(aux)?, data: opt_str(data)? })
}

fn to_c_int(n: usize) -> c_int {
    c_int::try_from(n).unwrap_or(c_int::MAX)
}

// --- Creation / destruction -------------------------------------------------------

/// Create an instance. `sample_rate > 1` selects that rate, anything else the
/// default. Null paths keep the defaults. Returns a handle ≥ 0, or -1.
///
/// # Safety
/// Each path must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn aux_new(
    sample_rate: c_int,
    wave_path: *const c_char,
    aux_path: *const c_char,
    data_path: *const c_char,
) -> c_int {
    ffi_guard!(-1, {
        let mut session = session();
        let res = match paths(wave_path, aux_path, data_path) {
            Ok(paths) => session.create(sample_rate, paths),
            Err(e) => session.report(Err(e)),
        };
        res.unwrap_or(-1)
    })
}

/// Destroy an instance. Invalid or already destroyed handles are ignored.
#[no_mangle]
pub extern "C" fn aux_delete(handle: c_int) {
    ffi_guard!((), {
        session().destroy(handle);
    })
}

// --- Evaluation ------------------------------------------------------------------

/// Evaluate `script` on `handle`.
///
/// Returns the channel count and sets `*buffer` to `*length * channels`
/// planar samples; 0 for an empty result (`*buffer` null, `*length` 0);
/// -1 invalid handle; -2 script error; -3 any other failure. Null
/// out-pointers are not written.
///
/// # Safety
/// `script` must be a valid NUL-terminated string; `buffer` and `length`
/// must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn aux_eval(
    handle: c_int,
    script: *const c_char,
    buffer: *mut *mut f64,
    length: *mut c_int,
) -> c_int {
    ffi_guard!(EVAL_OTHER_ERROR, {
        let mut session = session();
        let res = match req_str(script, "script is null") {
            Ok(src) => session.evaluate(handle, src),
            Err(e) => session.report(Err(e)),
        };
        let (data, len, code) = match res {
            Ok(Some(ev)) => {
                let data = session.samples(&ev).map_or(ptr::null_mut(), |s| s.as_ptr().cast_mut());
                (data, ev.len, to_c_int(ev.channels))
            }
            Ok(None) => (ptr::null_mut(), 0, EVAL_EMPTY),
            Err(e) => return e.code(),
        };
        if !buffer.is_null() {
            *buffer = data;
        }
        if !length.is_null() {
            *length = to_c_int(len);
        }
        code
    })
}

// --- Native signal ---------------------------------------------------------------

/// Play the native signal of `handle` on output device `device_id`
/// (negative: default device). Returns 1, or 0 on failure.
///
/// Holds the session lock while the device starts, up to
/// [`auxlib_engine::playback::START_TIMEOUT`].
#[no_mangle]
pub extern "C" fn aux_play(handle: c_int, device_id: c_int) -> c_int {
    ffi_guard!(0, { c_int::from(session().play(handle, device_id).is_ok()) })
}

/// Write the native signal of `handle` to a 16-bit wave file.
/// Returns 1, or 0 on failure.
///
/// # Safety
/// `filename` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn aux_wavwrite(handle: c_int, filename: *const c_char) -> c_int {
    ffi_guard!(0, {
        let mut session = session();
        let res = match req_str(filename, "file name is null") {
            Ok(name) => session.persist(handle, Path::new(name)),
            Err(e) => session.report(Err(e)),
        };
        c_int::from(res.is_ok())
    })
}

// --- Errors / introspection ------------------------------------------------------

/// Message of the most recent failure; empty before the first one.
/// The pointer stays valid for the life of the process.
#[no_mangle]
pub extern "C" fn aux_get_err_msg() -> *const c_char {
    ffi_guard!(b"\0".as_ptr().cast(), { session().errors().as_ptr() })
}

/// Read property `name` of `handle` into `output`: `wavepath`, `auxpath` and
/// `datapath` write a NUL-terminated string, `fs` a 32-bit integer.
/// Returns 1, or 0 on failure.
///
/// # Safety
/// `name` must be a valid NUL-terminated string; `output` must be valid for
/// writes of the property (string length + 1, or 4 bytes).
#[no_mangle]
pub unsafe extern "C" fn aux_get_info(handle: c_int, name: *const c_char, output: *mut c_void) -> c_int {
    ffi_guard!(0, {
        let mut session = session();
        let res = match req_str(name, "property name is null") {
            Ok(name) => session.get_info(handle, name),
            Err(e) => session.report(Err(e)),
        };
        let Ok(value) = res else { return 0 };
        if output.is_null() {
            let _ = session.report::<()>(Err(AuxError::BadArgument("output buffer is null")));
            return 0;
        }
        match value {
            InfoValue::Path(p) => {
                let out = output.cast::<u8>();
                ptr::copy_nonoverlapping(p.as_ptr(), out, p.len());
                *out.add(p.len()) = 0;
            }
            InfoValue::Rate(fs) => {
                output.cast::<i32>().write_unaligned(i32::try_from(fs).unwrap_or(i32::MAX));
            }
        }
        1
    })
}

// --- Logging ---------------------------------------------------------------------

static LOGGING: OnceCell<bool> = OnceCell::new();

/// Install a `tracing` subscriber writing to stderr, filtered by `RUST_LOG`
/// (default `info`). Returns 1 if this library's subscriber is active.
#[no_mangle]
pub extern "C" fn aux_init_logging() -> c_int {
    ffi_guard!(0, {
        let ok = *LOGGING.get_or_init(|| {
            let filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .is_ok()
        });
        c_int::from(ok)
    })
}

//! Panic guard for the C boundary.
//!
//! Every `extern "C"` function wraps its body so a panic never unwinds into
//! the host. The panic is recorded in the error channel and the function
//! returns its failure sentinel instead.

/// Run the body; on panic record it and evaluate to `$fallback`.
///
/// ```ignore
/// pub extern "C" fn aux_thing() -> c_int {
///     ffi_guard!(0, {
///         // ... body ...
///         1
///     })
/// }
/// ```
macro_rules! ffi_guard {
    ($fallback:expr, $body:block) => {{
        use std::panic::{self, AssertUnwindSafe};

        match panic::catch_unwind(AssertUnwindSafe(move || $body)) {
            Ok(result) => result,
            Err(payload) => {
                $crate::record_panic(payload.as_ref());
                $fallback
            }
        }
    }};
}

pub(crate) use ffi_guard;

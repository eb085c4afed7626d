//! Return codes and the last-error channel through the C entry points.

use std::ffi::{c_char, c_void, CStr, CString};
use std::ptr;

use auxlib::{
    aux_delete, aux_eval, aux_get_err_msg, aux_get_info, aux_init_logging, aux_new, aux_wavwrite, MAX_ERR_MSG_LEN,
};
use parking_lot::{const_mutex, Mutex};

// tests in this file share the global session and its error channel
static SERIAL: Mutex<()> = const_mutex(());

fn new_with(rate: i32, wav: Option<&str>) -> i32 {
    let wav = wav.map(|w| CString::new(w).unwrap());
    unsafe { aux_new(rate, wav.as_ref().map_or(ptr::null(), |w| w.as_ptr()), ptr::null(), ptr::null()) }
}

fn eval(h: i32, src: &str) -> (i32, *mut f64, i32) {
    let src = CString::new(src).unwrap();
    let mut buf = ptr::null_mut();
    let mut len = -1;
    let n = unsafe { aux_eval(h, src.as_ptr(), &mut buf, &mut len) };
    (n, buf, len)
}

fn err_msg() -> String {
    unsafe { CStr::from_ptr(aux_get_err_msg()) }.to_str().unwrap().to_owned()
}

#[test]
fn eval_codes() {
    let _g = SERIAL.lock();
    let h = new_with(1000, None);
    assert!(h >= 0);

    assert_eq!(eval(-1, "1").0, -1);
    assert_eq!(err_msg(), "AUXLib error: Invalid handle.");

    assert_eq!(eval(h, "tone(440,").0, -2);
    let script_err = err_msg();
    assert!(!script_err.is_empty());

    // success keeps the previous message
    let (n, buf, len) = eval(h, "dc(0.5, 4)");
    assert_eq!((n, len), (1, 4));
    assert_eq!(unsafe { *buf.add(3) }, 0.5);
    assert_eq!(err_msg(), script_err);

    // empty result: code 0, no buffer, channel untouched
    let (n, buf, len) = eval(h, "silence(0)");
    assert_eq!((n, len), (0, 0));
    assert!(buf.is_null());
    assert_eq!(err_msg(), script_err);

    // null script is a non-script failure
    let mut len = 0;
    assert_eq!(unsafe { aux_eval(h, ptr::null(), ptr::null_mut(), &mut len) }, -3);

    aux_delete(h);
    assert_eq!(eval(h, "1").0, -1);
    assert_eq!(err_msg(), "AUXLib error: Invalid handle - already deleted.");
}

#[test]
fn eval_tolerates_null_out_params() {
    let _g = SERIAL.lock();
    let h = new_with(1000, None);
    let src = CString::new("stereo(dc(1, 2), dc(2, 2))").unwrap();
    assert_eq!(unsafe { aux_eval(h, src.as_ptr(), ptr::null_mut(), ptr::null_mut()) }, 2);
    aux_delete(h);
}

#[test]
fn long_messages_are_truncated_and_terminated() {
    let _g = SERIAL.lock();
    let h = new_with(1000, None);
    let script = format!("throw \"{}\"", "x".repeat(5000));
    assert_eq!(eval(h, &script).0, -2);
    let msg = err_msg();
    assert_eq!(msg.len(), MAX_ERR_MSG_LEN - 1);
    aux_delete(h);
}

#[test]
fn get_info_paths_and_bad_names() {
    let _g = SERIAL.lock();
    let dir = tempfile::tempdir().unwrap();
    let dir_str = dir.path().to_str().unwrap();
    let h = new_with(0, Some(dir_str));

    let mut out = [0 as c_char; 512];
    let name = CString::new("wavepath").unwrap();
    assert_eq!(unsafe { aux_get_info(h, name.as_ptr(), out.as_mut_ptr().cast::<c_void>()) }, 1);
    assert_eq!(unsafe { CStr::from_ptr(out.as_ptr()) }.to_str().unwrap(), dir_str);

    let name = CString::new("auxpath").unwrap();
    assert_eq!(unsafe { aux_get_info(h, name.as_ptr(), out.as_mut_ptr().cast::<c_void>()) }, 1);
    assert_eq!(out[0], 0);

    let name = CString::new("colour").unwrap();
    assert_eq!(unsafe { aux_get_info(h, name.as_ptr(), out.as_mut_ptr().cast::<c_void>()) }, 0);
    assert_eq!(err_msg(), "AUXLib error: Invalid property name was passed to AUXGetInfo().");
    aux_delete(h);
}

#[test]
fn wavwrite_reports_failures() {
    let _g = SERIAL.lock();
    let dir = tempfile::tempdir().unwrap();
    let h = new_with(8000, None);
    let file = CString::new(dir.path().join("out.wav").to_str().unwrap()).unwrap();

    assert_eq!(unsafe { aux_wavwrite(h, file.as_ptr()) }, 0);
    assert!(!err_msg().is_empty());

    assert_eq!(eval(h, "tone(440, 20)").0, 1);
    assert_eq!(unsafe { aux_wavwrite(h, file.as_ptr()) }, 1);
    assert!(dir.path().join("out.wav").exists());

    assert_eq!(unsafe { aux_wavwrite(-3, file.as_ptr()) }, 0);
    assert_eq!(err_msg(), "AUXLib error: Invalid handle.");
    aux_delete(h);
}

#[test]
fn logging_init_is_idempotent() {
    let first = aux_init_logging();
    assert!(first == 0 || first == 1);
    assert_eq!(aux_init_logging(), first);
}

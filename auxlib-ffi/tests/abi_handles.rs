//! Handle lifecycle through the C entry points.
//!
//! The C surface shares one process-wide session, so everything that depends
//! on exact handle numbers lives in a single test in its own binary.

use std::ffi::{c_void, CStr, CString};
use std::ptr;

use auxlib::{aux_delete, aux_eval, aux_get_err_msg, aux_get_info, aux_new};

fn new(rate: i32) -> i32 {
    unsafe { aux_new(rate, ptr::null(), ptr::null(), ptr::null()) }
}

fn eval(h: i32, src: &str) -> (i32, *mut f64, i32) {
    let src = CString::new(src).unwrap();
    let mut buf = ptr::null_mut();
    let mut len = -1;
    let n = unsafe { aux_eval(h, src.as_ptr(), &mut buf, &mut len) };
    (n, buf, len)
}

fn fs(h: i32) -> Option<i32> {
    let name = CString::new("fs").unwrap();
    let mut out = 0i32;
    let ok = unsafe { aux_get_info(h, name.as_ptr(), (&mut out as *mut i32).cast::<c_void>()) };
    (ok == 1).then_some(out)
}

fn err_msg() -> String {
    unsafe { CStr::from_ptr(aux_get_err_msg()) }.to_str().unwrap().to_owned()
}

#[test]
fn create_evaluate_destroy_recycle() {
    assert_eq!(new(44_100), 0);
    let (n, buf, len) = eval(0, "stereo(tone(440, 10), tone(880, 10))");
    assert_eq!(n, 2);
    assert_eq!(len, 441);
    let samples = unsafe { std::slice::from_raw_parts(buf, (len * n) as usize) };
    assert!(samples[0].abs() < 1e-9);
    assert!(samples[441].abs() < 1e-9);
    assert!(samples.iter().all(|s| s.abs() <= 1.0));
    aux_delete(0);

    assert_eq!(new(48_000), 0);
    assert_eq!(fs(0), Some(48_000));

    // growth while nothing is free, then oldest freed index first
    assert_eq!(new(0), 1);
    assert_eq!(new(0), 2);
    assert_eq!(fs(1), Some(22_050));
    aux_delete(2);
    aux_delete(1);
    assert_eq!(new(0), 2);
    assert_eq!(new(0), 1);
    assert_eq!(new(0), 3);

    // destroy never fails and never touches the error channel
    let before = err_msg();
    aux_delete(-1);
    aux_delete(1);
    aux_delete(1);
    aux_delete(99);
    assert_eq!(err_msg(), before);

    assert_eq!(fs(1), None);
    assert_eq!(err_msg(), "AUXLib error: Invalid handle - already deleted.");
    assert_eq!(fs(7), None);
    assert_eq!(err_msg(), "AUXLib error: Invalid handle.");
    assert_eq!(new(0), 1);
}

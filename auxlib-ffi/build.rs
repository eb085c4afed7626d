// Publishes the C header next to the build output.
//
// With a `cbindgen` binary on PATH the header is regenerated from the crate
// sources; otherwise the checked-in `include/auxlib.h` is copied. Either way
// it ends up at $OUT_DIR/auxlib.h.

use std::{env, fs, path::PathBuf, process::Command};

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=include/auxlib.h");

    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("cargo sets CARGO_MANIFEST_DIR"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("cargo sets OUT_DIR"));
    let header_repo = crate_dir.join("include").join("auxlib.h");
    let header_out = out_dir.join("auxlib.h");

    let generated = Command::new("cbindgen")
        .args(["--crate", "auxlib-ffi", "--lang", "C", "--output"])
        .arg(&header_out)
        .current_dir(&crate_dir)
        .status()
        .map(|s| s.success())
        .unwrap_or(false);

    if generated {
        println!("cargo:warning=auxlib-ffi: header generated with cbindgen -> {}", header_out.display());
        return;
    }

    fs::copy(&header_repo, &header_out).expect("include/auxlib.h is checked in");
}

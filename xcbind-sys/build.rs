//! Build script for xcbind-sys.
//!
//! 1. Optionally runs `bindgen` to regenerate Rust bindings (feature `regenerate`).
//! 2. Locates the system `libxcb` and configures the linker for dynamic linking.
//!
//! # Environment variables
//!
//! - `XCBIND_LIB_DIR`: Directory containing `libxcb`. Searched before the
//!   standard system library directories.
//!
//! - `XCBIND_XCB_HEADER`: Path to `xcb/xcb.h` for the `regenerate` feature.
//!   Defaults to `/usr/include/xcb/xcb.h`.
//!
//! - `XCBIND_UPDATE_BINDINGS`: When set alongside the `regenerate` feature, the
//!   freshly generated `bindings.rs` is copied back to `src/bindings.rs` so it
//!   can be committed to the repository.

use std::env;
#[cfg(feature = "regenerate")]
use std::fs;
use std::path::{Path, PathBuf};

/// Directories searched for `libxcb` when `XCBIND_LIB_DIR` is unset.
const SYSTEM_LIB_DIRS: &[&str] = &[
    "/usr/lib",
    "/usr/lib64",
    "/usr/lib/x86_64-linux-gnu",
    "/usr/lib/aarch64-linux-gnu",
    "/usr/local/lib",
    "/usr/X11/lib",
    "/opt/X11/lib",
    "/opt/homebrew/lib",
];

fn main() {
    println!("cargo:rerun-if-env-changed=XCBIND_LIB_DIR");
    println!("cargo:rerun-if-env-changed=XCBIND_XCB_HEADER");
    println!("cargo:rerun-if-env-changed=XCBIND_UPDATE_BINDINGS");
    println!("cargo:rerun-if-env-changed=DOCS_RS");

    // docs.rs: no native libs, pre-generated bindings suffice.
    if env::var("DOCS_RS").is_ok() {
        return;
    }

    let target = env::var("TARGET").expect("TARGET not set");

    #[cfg(feature = "regenerate")]
    {
        let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
        generate_bindings(&out_dir);
    }

    match find_library(&target) {
        Some(lib_dir) => {
            println!("cargo:rustc-link-search=native={}", lib_dir.display());
            println!("cargo:rustc-link-lib=dylib=xcb");
            println!("cargo:LIB_DIR={}", lib_dir.display());
        }
        None => {
            println!(
                "cargo:warning=xcbind-sys: libxcb not found (set XCBIND_LIB_DIR); \
                 binaries calling into libxcb will fail to link"
            );
        }
    }
}

// ===========================================================================
// Bindings generation (only compiled with `regenerate` feature)
// ===========================================================================

/// Run `bindgen` on the system header to produce `$OUT_DIR/bindings.rs`.
#[cfg(feature = "regenerate")]
fn generate_bindings(out_dir: &Path) {
    let header = env::var("XCBIND_XCB_HEADER").unwrap_or_else(|_| "/usr/include/xcb/xcb.h".into());
    let out_file = out_dir.join("bindings.rs");

    let bindings = bindgen::Builder::default()
        .header(header.as_str())
        .use_core()
        .allowlist_function("xcb_(connect|disconnect|flush|get_file_descriptor)")
        .allowlist_function("xcb_(connection_has_error|generate_id|get_setup)")
        .allowlist_function("xcb_(wait_for_event|poll_for_event|wait_for_reply)")
        .allowlist_function("xcb_(request_check|discard_reply)")
        .allowlist_function("xcb_(get_input_focus|no_operation_checked)")
        .allowlist_function("xcb_change_window_attributes_checked")
        .allowlist_type("xcb_window_t")
        .allowlist_type("xcb_generic_(event|error|reply)_t")
        .allowlist_var("X_PROTOCOL.*")
        .allowlist_var("X_TCP_PORT")
        .allowlist_var("XCB_(NONE|COPY_FROM_PARENT|CURRENT_TIME|NO_SYMBOL)")
        .allowlist_var("XCB_CONN_.*")
        .derive_debug(true)
        .derive_default(true)
        .derive_eq(true)
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .generate()
        .expect("bindgen failed to generate bindings from xcb.h");

    bindings
        .write_to_file(&out_file)
        .expect("Failed to write bindings.rs");

    if env::var("XCBIND_UPDATE_BINDINGS").is_ok() {
        let manifest =
            PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
        let committed = manifest.join("src").join("bindings.rs");
        fs::copy(&out_file, &committed).expect("Failed to copy bindings.rs to src/");
        println!(
            "cargo:warning=Updated committed bindings: {}",
            committed.display()
        );
    }
}

// ===========================================================================
// Library discovery
// ===========================================================================

/// Returns the first directory that contains a linkable `libxcb`.
fn find_library(target: &str) -> Option<PathBuf> {
    let file = lib_filename(target);
    if let Ok(dir) = env::var("XCBIND_LIB_DIR") {
        let dir = PathBuf::from(dir);
        if has_library(&dir, file) {
            return Some(dir);
        }
        println!(
            "cargo:warning=xcbind-sys: {file} not found in XCBIND_LIB_DIR={}",
            dir.display()
        );
    }
    SYSTEM_LIB_DIRS
        .iter()
        .map(PathBuf::from)
        .find(|dir| has_library(dir, file))
}

fn has_library(dir: &Path, file: &str) -> bool {
    dir.join(file).exists()
}

fn lib_filename(target: &str) -> &'static str {
    if target.contains("apple") {
        "libxcb.dylib"
    } else {
        "libxcb.so"
    }
}

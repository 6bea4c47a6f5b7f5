//! Raw FFI bindings to `libxcb`.
//!
//! Only the primitives `xcbind` consumes are declared: connection lifecycle,
//! sequence-keyed reply retrieval, event retrieval, and two core protocol
//! requests. Everything here is `unsafe` to call; see `xcbind` for the safe
//! wrapper.

#![cfg_attr(not(test), no_std)]
#![allow(non_camel_case_types, non_upper_case_globals, non_snake_case, missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(feature = "regenerate")]
include!(concat!(env!("OUT_DIR"), "/bindings.rs"));

#[cfg(not(feature = "regenerate"))]
include!("bindings.rs");

//! DRMAA v1 client, loaded at runtime with `libloading`.
//!
//! Grid Engine, HTCondor and most other batch schedulers ship a
//! `libdrmaa.so`. The library path is taken from `$DRMAA_LIBRARY_PATH`
//! when set, the same convention the vendor bindings follow.

pub mod ffi;
mod library;

pub use library::{DEFAULT_DRMAA_LIBRARY, DRMAA_LIBRARY_PATH_ENV, DrmaaLibrary};

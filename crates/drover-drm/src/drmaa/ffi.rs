//! Raw FFI constants and function signatures for the DRMAA v1 C binding.
//!
//! These values must match `drmaa.h` as shipped by Grid Engine, HTCondor,
//! Slurm-DRMAA and the other DRMAA 1.0 implementations.

use std::ffi::{CStr, c_void};
use std::os::raw::{c_char, c_int};

// ===========================================================================
// Buffer sizes
// ===========================================================================

pub const DRMAA_ERROR_STRING_BUFFER: usize = 1024;
pub const DRMAA_JOBNAME_BUFFER: usize = 1024;
pub const DRMAA_CONTACT_BUFFER: usize = 1024;

// ===========================================================================
// Template attribute names
// ===========================================================================

pub const DRMAA_REMOTE_COMMAND: &CStr = c"drmaa_remote_command";
pub const DRMAA_NATIVE_SPECIFICATION: &CStr = c"drmaa_native_specification";

// ===========================================================================
// Error codes (DRMAA_ERRNO_*)
// ===========================================================================

pub const DRMAA_ERRNO_SUCCESS: c_int = 0;
pub const DRMAA_ERRNO_INTERNAL_ERROR: c_int = 1;
pub const DRMAA_ERRNO_DRM_COMMUNICATION_FAILURE: c_int = 2;
pub const DRMAA_ERRNO_AUTH_FAILURE: c_int = 3;
pub const DRMAA_ERRNO_INVALID_ARGUMENT: c_int = 4;
pub const DRMAA_ERRNO_NO_ACTIVE_SESSION: c_int = 5;
pub const DRMAA_ERRNO_NO_MEMORY: c_int = 6;
pub const DRMAA_ERRNO_INVALID_CONTACT_STRING: c_int = 7;
pub const DRMAA_ERRNO_DEFAULT_CONTACT_STRING_ERROR: c_int = 8;
pub const DRMAA_ERRNO_NO_DEFAULT_CONTACT_STRING_SELECTED: c_int = 9;
pub const DRMAA_ERRNO_DRMS_INIT_FAILED: c_int = 10;
pub const DRMAA_ERRNO_ALREADY_ACTIVE_SESSION: c_int = 11;
pub const DRMAA_ERRNO_DRMS_EXIT_ERROR: c_int = 12;
pub const DRMAA_ERRNO_INVALID_ATTRIBUTE_FORMAT: c_int = 13;
pub const DRMAA_ERRNO_INVALID_ATTRIBUTE_VALUE: c_int = 14;
pub const DRMAA_ERRNO_CONFLICTING_ATTRIBUTE_VALUES: c_int = 15;
pub const DRMAA_ERRNO_TRY_LATER: c_int = 16;
pub const DRMAA_ERRNO_DENIED_BY_DRM: c_int = 17;
pub const DRMAA_ERRNO_INVALID_JOB: c_int = 18;

/// Returns `true` if the return code indicates success.
#[inline]
pub fn is_success(code: c_int) -> bool {
    code == DRMAA_ERRNO_SUCCESS
}

/// Fallback text for a code whose diagnosis buffer came back empty.
pub fn describe(code: c_int) -> &'static str {
    match code {
        DRMAA_ERRNO_INTERNAL_ERROR => "internal error",
        DRMAA_ERRNO_DRM_COMMUNICATION_FAILURE => "communication with the scheduler failed",
        DRMAA_ERRNO_AUTH_FAILURE => "authorization failure",
        DRMAA_ERRNO_INVALID_ARGUMENT => "invalid argument",
        DRMAA_ERRNO_NO_ACTIVE_SESSION => "no active session",
        DRMAA_ERRNO_NO_MEMORY => "out of memory",
        DRMAA_ERRNO_INVALID_CONTACT_STRING => "invalid contact string",
        DRMAA_ERRNO_DEFAULT_CONTACT_STRING_ERROR => "cannot use the default contact string",
        DRMAA_ERRNO_NO_DEFAULT_CONTACT_STRING_SELECTED => "no default contact string selected",
        DRMAA_ERRNO_DRMS_INIT_FAILED => "scheduler initialization failed",
        DRMAA_ERRNO_ALREADY_ACTIVE_SESSION => "a session is already active",
        DRMAA_ERRNO_DRMS_EXIT_ERROR => "scheduler exit failed",
        DRMAA_ERRNO_INVALID_ATTRIBUTE_FORMAT => "invalid attribute format",
        DRMAA_ERRNO_INVALID_ATTRIBUTE_VALUE => "invalid attribute value",
        DRMAA_ERRNO_CONFLICTING_ATTRIBUTE_VALUES => "conflicting attribute values",
        DRMAA_ERRNO_TRY_LATER => "scheduler busy, try later",
        DRMAA_ERRNO_DENIED_BY_DRM => "denied by the scheduler",
        DRMAA_ERRNO_INVALID_JOB => "invalid job",
        _ => "unknown error",
    }
}

// ===========================================================================
// Opaque handle types
// ===========================================================================

/// Opaque job template handle (`drmaa_job_template_t *`).
pub type DrmaaJobTemplate = *mut c_void;

// ===========================================================================
// Function signatures
// ===========================================================================

/// `int drmaa_init(const char *contact, char *error_diagnosis, size_t error_diag_len)`
pub type FnInit = unsafe extern "C" fn(*const c_char, *mut c_char, usize) -> c_int;

/// `int drmaa_exit(char *error_diagnosis, size_t error_diag_len)`
pub type FnExit = unsafe extern "C" fn(*mut c_char, usize) -> c_int;

/// `int drmaa_get_contact(char *contact, size_t contact_len, char *error_diagnosis, size_t error_diag_len)`
pub type FnGetContact = unsafe extern "C" fn(*mut c_char, usize, *mut c_char, usize) -> c_int;

/// `int drmaa_allocate_job_template(drmaa_job_template_t **jt, char *error_diagnosis, size_t error_diag_len)`
pub type FnAllocateJobTemplate =
    unsafe extern "C" fn(*mut DrmaaJobTemplate, *mut c_char, usize) -> c_int;

/// `int drmaa_delete_job_template(drmaa_job_template_t *jt, char *error_diagnosis, size_t error_diag_len)`
pub type FnDeleteJobTemplate = unsafe extern "C" fn(DrmaaJobTemplate, *mut c_char, usize) -> c_int;

/// `int drmaa_set_attribute(drmaa_job_template_t *jt, const char *name, const char *value, char *error_diagnosis, size_t error_diag_len)`
pub type FnSetAttribute = unsafe extern "C" fn(
    DrmaaJobTemplate,
    *const c_char,
    *const c_char,
    *mut c_char,
    usize,
) -> c_int;

/// `int drmaa_run_job(char *job_id, size_t job_id_len, const drmaa_job_template_t *jt, char *error_diagnosis, size_t error_diag_len)`
pub type FnRunJob =
    unsafe extern "C" fn(*mut c_char, usize, DrmaaJobTemplate, *mut c_char, usize) -> c_int;

/// `int drmaa_control(const char *jobid, int action, char *error_diagnosis, size_t error_diag_len)`
pub type FnControl = unsafe extern "C" fn(*const c_char, c_int, *mut c_char, usize) -> c_int;

/// A zeroed output buffer for strings returned by the library.
pub fn string_buffer<const N: usize>() -> [c_char; N] {
    [0; N]
}

/// Read a nul-terminated string out of a library-filled buffer.
///
/// Stops at the first nul byte or the end of the buffer, whichever comes
/// first, so an unterminated buffer never reads out of bounds.
pub fn buffer_to_string(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

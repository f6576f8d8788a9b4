//! Load a DRMAA v1 client library and drive a scheduler session through it.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use libloading::{Library, Symbol};

use super::ffi;
use crate::client::{DrmClient, DrmConnection};
use crate::error::{DrmError, DrmResult};
use crate::job::{JobControlAction, JobId, JobTemplate};

/// Environment variable naming the DRMAA library to load.
pub const DRMAA_LIBRARY_PATH_ENV: &str = "DRMAA_LIBRARY_PATH";

/// Library loaded when [`DRMAA_LIBRARY_PATH_ENV`] is unset.
pub const DEFAULT_DRMAA_LIBRARY: &str = "libdrmaa.so";

/// A DRMAA v1 client library on disk.
///
/// Nothing is loaded until [`DrmClient::connect`] is called, so a missing
/// library surfaces as [`DrmError::Configuration`] on first use of the
/// session rather than at startup.
#[derive(Debug, Clone)]
pub struct DrmaaLibrary {
    path: PathBuf,
    serialize_calls: bool,
}

impl DrmaaLibrary {
    /// Use the library at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            serialize_calls: false,
        }
    }

    /// Use `$DRMAA_LIBRARY_PATH`, falling back to `libdrmaa.so` on the
    /// loader search path.
    pub fn from_env() -> Self {
        let path = std::env::var_os(DRMAA_LIBRARY_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DRMAA_LIBRARY));
        Self::new(path)
    }

    /// Serialize every call into the library behind one lock.
    ///
    /// Needed for implementations that are not reentrant.
    pub fn serialize_calls(mut self, serialize: bool) -> Self {
        self.serialize_calls = serialize;
        self
    }

    /// Path the library will be loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DrmClient for DrmaaLibrary {
    fn name(&self) -> &str {
        "drmaa"
    }

    fn connect(&self, contact: Option<&str>) -> DrmResult<Arc<dyn DrmConnection>> {
        let api = DrmaaApi::load(&self.path)?;
        let contact = api.init(contact)?;

        tracing::debug!(
            library = %self.path.display(),
            contact = %contact,
            "DRMAA session initialized"
        );

        Ok(Arc::new(DrmaaConnection {
            api,
            contact,
            call_lock: self.serialize_calls.then(|| Mutex::new(())),
        }))
    }
}

// ---------------------------------------------------------------------------
// Function table
// ---------------------------------------------------------------------------

/// A loaded DRMAA library with every entry point resolved.
///
/// The library handle is kept alive so the resolved pointers stay valid.
struct DrmaaApi {
    _library: Library,
    path: String,
    fn_init: ffi::FnInit,
    fn_exit: ffi::FnExit,
    fn_get_contact: ffi::FnGetContact,
    fn_allocate_job_template: ffi::FnAllocateJobTemplate,
    fn_delete_job_template: ffi::FnDeleteJobTemplate,
    fn_set_attribute: ffi::FnSetAttribute,
    fn_run_job: ffi::FnRunJob,
    fn_control: ffi::FnControl,
}

impl DrmaaApi {
    fn load(path: &Path) -> DrmResult<Self> {
        let path_str = path.display().to_string();

        // SAFETY: loading an external shared library runs its initializers.
        // The operator chooses which library is trusted.
        let library = unsafe { Library::new(path) }.map_err(|e| {
            DrmError::Configuration(format!("failed to load DRMAA library '{path_str}': {e}"))
        })?;

        tracing::info!("loaded DRMAA library '{path_str}'");

        Ok(Self {
            fn_init: resolve(&library, "drmaa_init", &path_str)?,
            fn_exit: resolve(&library, "drmaa_exit", &path_str)?,
            fn_get_contact: resolve(&library, "drmaa_get_contact", &path_str)?,
            fn_allocate_job_template: resolve(&library, "drmaa_allocate_job_template", &path_str)?,
            fn_delete_job_template: resolve(&library, "drmaa_delete_job_template", &path_str)?,
            fn_set_attribute: resolve(&library, "drmaa_set_attribute", &path_str)?,
            fn_run_job: resolve(&library, "drmaa_run_job", &path_str)?,
            fn_control: resolve(&library, "drmaa_control", &path_str)?,
            _library: library,
            path: path_str,
        })
    }

    /// Start or reattach a session and return its contact string.
    fn init(&self, contact: Option<&str>) -> DrmResult<String> {
        let contact = contact
            .map(CString::new)
            .transpose()
            .map_err(|e| DrmError::SessionUnavailable(format!("invalid contact string: {e}")))?;
        let contact_ptr = contact.as_ref().map_or(ptr::null(), |c| c.as_ptr());

        let mut diag = ffi::string_buffer::<{ ffi::DRMAA_ERROR_STRING_BUFFER }>();
        let ret = unsafe { (self.fn_init)(contact_ptr, diag.as_mut_ptr(), diag.len()) };
        check(ret, &diag)?;

        let mut buf = ffi::string_buffer::<{ ffi::DRMAA_CONTACT_BUFFER }>();
        let ret = unsafe {
            (self.fn_get_contact)(buf.as_mut_ptr(), buf.len(), diag.as_mut_ptr(), diag.len())
        };
        if let Err(e) = check(ret, &diag) {
            self.exit();
            return Err(e);
        }

        Ok(ffi::buffer_to_string(&buf))
    }

    fn exit(&self) {
        let mut diag = ffi::string_buffer::<{ ffi::DRMAA_ERROR_STRING_BUFFER }>();
        let ret = unsafe { (self.fn_exit)(diag.as_mut_ptr(), diag.len()) };
        match check(ret, &diag) {
            Ok(()) => tracing::debug!("DRMAA session in '{}' closed", self.path),
            Err(e) => tracing::error!("drmaa_exit failed for '{}': {e}", self.path),
        }
    }

    fn allocate_job_template(&self) -> DrmResult<TemplateHandle<'_>> {
        let mut raw: ffi::DrmaaJobTemplate = ptr::null_mut();
        let mut diag = ffi::string_buffer::<{ ffi::DRMAA_ERROR_STRING_BUFFER }>();
        let ret =
            unsafe { (self.fn_allocate_job_template)(&mut raw, diag.as_mut_ptr(), diag.len()) };
        check(ret, &diag)?;
        if raw.is_null() {
            return Err(DrmError::Internal(
                "drmaa_allocate_job_template returned a null template".into(),
            ));
        }
        Ok(TemplateHandle { api: self, raw })
    }
}

/// An allocated job template, released on drop.
struct TemplateHandle<'a> {
    api: &'a DrmaaApi,
    raw: ffi::DrmaaJobTemplate,
}

impl TemplateHandle<'_> {
    fn set_attribute(&self, name: &CStr, value: &str) -> DrmResult<()> {
        let value = CString::new(value).map_err(|e| DrmError::InvalidAttribute {
            name: name.to_string_lossy().into_owned(),
            message: e.to_string(),
        })?;

        let mut diag = ffi::string_buffer::<{ ffi::DRMAA_ERROR_STRING_BUFFER }>();
        let ret = unsafe {
            (self.api.fn_set_attribute)(
                self.raw,
                name.as_ptr(),
                value.as_ptr(),
                diag.as_mut_ptr(),
                diag.len(),
            )
        };
        check(ret, &diag).map_err(|e| match e {
            DrmError::Drm { message, .. } => DrmError::InvalidAttribute {
                name: name.to_string_lossy().into_owned(),
                message,
            },
            other => other,
        })
    }

    fn run(&self) -> DrmResult<JobId> {
        let mut job_id = ffi::string_buffer::<{ ffi::DRMAA_JOBNAME_BUFFER }>();
        let mut diag = ffi::string_buffer::<{ ffi::DRMAA_ERROR_STRING_BUFFER }>();
        let ret = unsafe {
            (self.api.fn_run_job)(
                job_id.as_mut_ptr(),
                job_id.len(),
                self.raw,
                diag.as_mut_ptr(),
                diag.len(),
            )
        };
        check(ret, &diag)?;
        Ok(JobId::new(ffi::buffer_to_string(&job_id)))
    }
}

impl Drop for TemplateHandle<'_> {
    fn drop(&mut self) {
        let mut diag = ffi::string_buffer::<{ ffi::DRMAA_ERROR_STRING_BUFFER }>();
        let ret =
            unsafe { (self.api.fn_delete_job_template)(self.raw, diag.as_mut_ptr(), diag.len()) };
        if let Err(e) = check(ret, &diag) {
            tracing::warn!("failed to release job template: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A live DRMAA session. Closed with `drmaa_exit` on drop.
struct DrmaaConnection {
    api: DrmaaApi,
    contact: String,
    call_lock: Option<Mutex<()>>,
}

impl DrmaaConnection {
    fn serialize(&self) -> Option<MutexGuard<'_, ()>> {
        self.call_lock
            .as_ref()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl DrmConnection for DrmaaConnection {
    fn contact(&self) -> &str {
        &self.contact
    }

    fn run_job(&self, template: &JobTemplate) -> DrmResult<JobId> {
        let _guard = self.serialize();

        let handle = self.api.allocate_job_template()?;
        handle.set_attribute(ffi::DRMAA_REMOTE_COMMAND, &template.remote_command)?;
        if !template.native_specification.is_empty() {
            handle.set_attribute(
                ffi::DRMAA_NATIVE_SPECIFICATION,
                &template.native_specification,
            )?;
        }
        handle.run()
    }

    fn control(&self, job_id: &JobId, action: JobControlAction) -> DrmResult<()> {
        let id = CString::new(job_id.as_str())
            .map_err(|_| DrmError::InvalidJob(job_id.to_string()))?;

        let _guard = self.serialize();

        let mut diag = ffi::string_buffer::<{ ffi::DRMAA_ERROR_STRING_BUFFER }>();
        let ret = unsafe {
            (self.api.fn_control)(id.as_ptr(), action.code(), diag.as_mut_ptr(), diag.len())
        };
        check(ret, &diag).map_err(|e| match e {
            DrmError::InvalidJob(_) => DrmError::InvalidJob(job_id.to_string()),
            other => other,
        })
    }
}

impl Drop for DrmaaConnection {
    fn drop(&mut self) {
        let _guard = self.serialize();
        self.api.exit();
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve a required symbol.
fn resolve<T: Copy>(library: &Library, name: &str, path: &str) -> DrmResult<T> {
    tracing::trace!("resolving symbol '{name}'");

    // SAFETY: `T` matches the signature declared in `drmaa.h`.
    unsafe {
        let sym: Symbol<T> = library.get(name.as_bytes()).map_err(|e| {
            DrmError::Configuration(format!("symbol '{name}' not found in '{path}': {e}"))
        })?;
        Ok(*sym)
    }
}

fn check(code: c_int, diag: &[c_char]) -> DrmResult<()> {
    if ffi::is_success(code) {
        Ok(())
    } else {
        Err(error_from_code(code, diag))
    }
}

/// Map a DRMAA return code and its diagnosis buffer to a [`DrmError`].
fn error_from_code(code: c_int, diag: &[c_char]) -> DrmError {
    let mut message = ffi::buffer_to_string(diag);
    if message.is_empty() {
        message = ffi::describe(code).to_string();
    }

    match code {
        ffi::DRMAA_ERRNO_INVALID_JOB => DrmError::InvalidJob(message),
        ffi::DRMAA_ERRNO_NO_ACTIVE_SESSION
        | ffi::DRMAA_ERRNO_DRMS_INIT_FAILED
        | ffi::DRMAA_ERRNO_INVALID_CONTACT_STRING
        | ffi::DRMAA_ERRNO_DEFAULT_CONTACT_STRING_ERROR
        | ffi::DRMAA_ERRNO_NO_DEFAULT_CONTACT_STRING_SELECTED
        | ffi::DRMAA_ERRNO_ALREADY_ACTIVE_SESSION => DrmError::SessionUnavailable(message),
        ffi::DRMAA_ERRNO_NO_MEMORY | ffi::DRMAA_ERRNO_INTERNAL_ERROR => {
            DrmError::Internal(message)
        }
        _ => DrmError::Drm { code, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library_is_configuration_error() {
        let client = DrmaaLibrary::new("/nonexistent/libdrmaa.so");
        let err = client.connect(None).err().unwrap();
        assert!(matches!(err, DrmError::Configuration(_)));
        assert!(err.to_string().contains("/nonexistent/libdrmaa.so"));
    }

    #[test]
    fn test_builder() {
        let client = DrmaaLibrary::new("/opt/sge/lib/libdrmaa.so").serialize_calls(true);
        assert_eq!(client.name(), "drmaa");
        assert_eq!(client.path(), Path::new("/opt/sge/lib/libdrmaa.so"));
        assert!(client.serialize_calls);
    }

    #[test]
    fn test_error_from_code() {
        let empty = ffi::string_buffer::<8>();
        assert!(error_from_code(ffi::DRMAA_ERRNO_INVALID_JOB, &empty).is_invalid_job());
        assert!(matches!(
            error_from_code(ffi::DRMAA_ERRNO_DRMS_INIT_FAILED, &empty),
            DrmError::SessionUnavailable(_)
        ));

        let mut diag = ffi::string_buffer::<32>();
        for (slot, byte) in diag.iter_mut().zip(b"queue disabled") {
            *slot = *byte as c_char;
        }
        match error_from_code(ffi::DRMAA_ERRNO_DENIED_BY_DRM, &diag) {
            DrmError::Drm { code, message } => {
                assert_eq!(code, 17);
                assert_eq!(message, "queue disabled");
            }
            other => panic!("unexpected error: {other}"),
        }

        match error_from_code(ffi::DRMAA_ERRNO_TRY_LATER, &empty) {
            DrmError::Drm { message, .. } => assert_eq!(message, "scheduler busy, try later"),
            other => panic!("unexpected error: {other}"),
        }
    }
}

//! # Subsystem library loader.
//!
//! Loads a shared library, resolves its descriptor export, verifies the
//! ABI, and creates the subsystem instance. Rejection at any step closes
//! the library again. Unload always destroys the instance **before**
//! `dlclose`.
//!
//! [`Loader::from_descriptor`] admits a descriptor without `dlopen` — the
//! acceptance path is identical, so statically linked (in-process)
//! subsystems ride the same ABI.

use std::ffi::{CStr, CString};
use std::path::Path;
use std::ptr;

use libc::{c_void, RTLD_NOW};
use tracing::{error, warn};

use crate::composition::abi::{
    DescriptorFn, SubsystemDescriptor, SubsystemHandle, SubsystemParams, DESCRIPTOR_SYMBOL,
    SUBSYS_ABI_VERSION, SUBSYS_OK,
};
use crate::error::{ResultCode, SysResult, SystemError};

/// A loaded subsystem: library handle, descriptor, and live instance.
///
/// `handle` is null for in-process subsystems admitted through
/// [`Loader::from_descriptor`].
#[derive(Debug)]
pub struct LoadedSubsystem {
    handle: *mut c_void,
    descriptor: *const SubsystemDescriptor,
    instance: *mut SubsystemHandle,
}

// The raw pointers are owned exclusively by this value; the controller
// serializes all calls through it.
unsafe impl Send for LoadedSubsystem {}

impl LoadedSubsystem {
    pub(crate) fn descriptor(&self) -> &SubsystemDescriptor {
        // invariant: only constructed with a verified non-null descriptor
        unsafe { &*self.descriptor }
    }

    pub(crate) fn instance(&self) -> *mut SubsystemHandle {
        self.instance
    }

    /// Subsystem name reported by the descriptor.
    pub fn name(&self) -> String {
        cstr_or(self.descriptor().name, "<unnamed>")
    }

    /// Version string reported by the descriptor.
    pub fn version(&self) -> String {
        cstr_or(self.descriptor().version_str, "")
    }
}

fn cstr_or(ptr: *const libc::c_char, default: &str) -> String {
    if ptr.is_null() {
        return default.to_string();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Loads and unloads subsystem libraries.
pub struct Loader;

impl Loader {
    /// Conventional library file name for a manifest subsystem name.
    pub fn library_path(dir: &Path, name: &str) -> std::path::PathBuf {
        dir.join(format!("lib{name}.so"))
    }

    /// Opens `so_path`, resolves the descriptor, verifies the ABI, and
    /// creates the instance.
    pub fn load(so_path: &Path, params: &SubsystemParams) -> SysResult<LoadedSubsystem> {
        let c_path = CString::new(so_path.to_string_lossy().as_bytes()).map_err(|_| {
            SystemError::with(ResultCode::InvalidArgument, "library path contains NUL")
        })?;

        let handle = unsafe { libc::dlopen(c_path.as_ptr(), RTLD_NOW) };
        if handle.is_null() {
            let reason = dlerror_string();
            error!(path = %so_path.display(), %reason, "dlopen failed");
            return Err(SystemError::with(
                ResultCode::NotFound,
                format!("dlopen failed: {reason}"),
            ));
        }

        let sym = unsafe { libc::dlsym(handle, DESCRIPTOR_SYMBOL.as_ptr().cast()) };
        if sym.is_null() {
            error!(path = %so_path.display(), "missing descriptor symbol");
            unsafe { libc::dlclose(handle) };
            return Err(SystemError::with(
                ResultCode::NotFound,
                "missing symbol: subsystem_descriptor",
            ));
        }

        let descriptor_fn: DescriptorFn = unsafe { std::mem::transmute(sym) };
        let descriptor = unsafe { descriptor_fn() };

        match Self::accept(descriptor, params) {
            Ok(instance) => Ok(LoadedSubsystem {
                handle,
                descriptor,
                instance,
            }),
            Err(e) => {
                unsafe { libc::dlclose(handle) };
                Err(e)
            }
        }
    }

    /// Admits an in-process descriptor through the same acceptance path as
    /// [`Loader::load`], without a library handle.
    ///
    /// # Safety
    ///
    /// `descriptor` must point to a descriptor table that stays valid for
    /// the lifetime of the returned value.
    pub unsafe fn from_descriptor(
        descriptor: *const SubsystemDescriptor,
        params: &SubsystemParams,
    ) -> SysResult<LoadedSubsystem> {
        let instance = Self::accept(descriptor, params)?;
        Ok(LoadedSubsystem {
            handle: ptr::null_mut(),
            descriptor,
            instance,
        })
    }

    /// Shared acceptance: descriptor validity, ABI version, vtable, create.
    fn accept(
        descriptor: *const SubsystemDescriptor,
        params: &SubsystemParams,
    ) -> SysResult<*mut SubsystemHandle> {
        if descriptor.is_null() {
            return Err(SystemError::with(
                ResultCode::InvalidArgument,
                "null subsystem descriptor",
            ));
        }
        let desc = unsafe { &*descriptor };

        if desc.abi_version != SUBSYS_ABI_VERSION {
            error!(
                found = desc.abi_version,
                expected = SUBSYS_ABI_VERSION,
                "subsystem abi version mismatch"
            );
            return Err(SystemError::with(
                ResultCode::NotSupported,
                format!(
                    "abi version mismatch: library {} host {}",
                    desc.abi_version, SUBSYS_ABI_VERSION
                ),
            ));
        }
        if desc.vtable.is_null() {
            return Err(SystemError::with(
                ResultCode::InvalidArgument,
                "descriptor has a null vtable",
            ));
        }

        let mut instance: *mut SubsystemHandle = ptr::null_mut();
        if let Some(create) = desc.create {
            let ret = unsafe { create(params, &mut instance) };
            if ret != SUBSYS_OK {
                error!(ret, "subsystem create failed");
                return Err(SystemError::with(
                    ResultCode::InternalError,
                    format!("subsystem create returned {ret}"),
                ));
            }
        }
        Ok(instance)
    }

    /// Destroys the instance, then closes the library.
    pub fn unload(mut loaded: LoadedSubsystem) {
        if let Some(destroy) = loaded.descriptor().destroy {
            if !loaded.instance.is_null() {
                unsafe { destroy(loaded.instance) };
            }
        }
        if !loaded.handle.is_null() {
            let rc = unsafe { libc::dlclose(loaded.handle) };
            if rc != 0 {
                warn!(rc, "dlclose returned non-zero");
            }
        }
        loaded.handle = ptr::null_mut();
        loaded.instance = ptr::null_mut();
    }
}

fn dlerror_string() -> String {
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        "unknown".to_string()
    } else {
        unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::testkit;

    #[test]
    fn missing_library_is_not_found() {
        let owned = testkit::params("sample.yaml");
        let params = owned.as_params();
        let err = Loader::load(Path::new("libdoes_not_exist.so"), &params).unwrap_err();
        assert_eq!(err.code(), ResultCode::NotFound);
    }

    #[test]
    fn in_process_descriptor_is_accepted() {
        // S5's acceptance path, positive case
        let owned = testkit::params("sample.yaml");
        let params = owned.as_params();
        let loaded =
            unsafe { Loader::from_descriptor(testkit::sample_descriptor(), &params) }.unwrap();
        assert_eq!(loaded.name(), "sample");
        assert_eq!(loaded.version(), "1.0.0");
        Loader::unload(loaded);
    }

    #[test]
    fn abi_mismatch_is_rejected() {
        // S5: version 99 against host version 1
        let owned = testkit::params("sample.yaml");
        let params = owned.as_params();
        let err = unsafe { Loader::from_descriptor(testkit::mismatched_descriptor(), &params) }
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::NotSupported);
    }

    #[test]
    fn null_vtable_is_rejected() {
        let owned = testkit::params("sample.yaml");
        let params = owned.as_params();
        let err = unsafe { Loader::from_descriptor(testkit::null_vtable_descriptor(), &params) }
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidArgument);
    }

    #[test]
    fn unload_destroys_the_instance() {
        let owned = testkit::params("sample.yaml");
        let params = owned.as_params();
        let before = testkit::DESTROY_COUNT.load(std::sync::atomic::Ordering::SeqCst);
        let loaded =
            unsafe { Loader::from_descriptor(testkit::sample_descriptor(), &params) }.unwrap();
        Loader::unload(loaded);
        let after = testkit::DESTROY_COUNT.load(std::sync::atomic::Ordering::SeqCst);
        assert!(after > before);
    }
}

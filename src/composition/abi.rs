//! # Subsystem binary interface.
//!
//! The stable C ABI a shared-library subsystem exports. One symbol,
//! [`DESCRIPTOR_SYMBOL`], is a no-argument function returning a pointer to
//! a const [`SubsystemDescriptor`]; everything else hangs off that
//! descriptor. Layouts are `#[repr(C)]` and field-ordered to match the
//! published interface; the descriptor must remain valid until the library
//! is unloaded.

use libc::{c_char, c_int, c_void};

/// ABI revision the host was compiled against.
pub const SUBSYS_ABI_VERSION: u32 = 1;

/// Export symbol every subsystem library provides.
pub const DESCRIPTOR_SYMBOL: &[u8] = b"subsystem_descriptor\0";

pub const SUBSYS_OK: c_int = 0;
pub const SUBSYS_ERR: c_int = -1;
pub const SUBSYS_ERR_INCOMPATIBLE_ABI: c_int = -2;
pub const SUBSYS_ERR_INVALID_ARG: c_int = -3;

/// Kind of configuration source handed to `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ConfigType {
    File = 0,
    Lvdb = 1,
}

/// Kind of manifest source handed to `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ManifestType {
    File = 0,
    Lvdb = 1,
}

/// Opaque per-subsystem state owned by the library.
#[repr(C)]
pub struct SubsystemHandle {
    _opaque: [u8; 0],
}

/// Parameters passed to `create` and the registry entry points.
///
/// String pointers are borrowed; the host keeps them alive for the duration
/// of the call.
#[repr(C)]
pub struct SubsystemParams {
    pub config_type: ConfigType,
    pub config_path: *const c_char,
    pub manifest_type: ManifestType,
    pub manifest_path: *const c_char,
}

/// Lifecycle operation table. All operations take the handle first and
/// return 0 on success, negative on failure.
#[repr(C)]
pub struct SubsystemVTable {
    /// `sizeof(SubsystemVTable)` as compiled into the library.
    pub size: u32,
    pub abi_version: u32,
    pub init: Option<unsafe extern "C" fn(*mut SubsystemHandle) -> c_int>,
    pub self_test: Option<unsafe extern "C" fn(*mut SubsystemHandle) -> c_int>,
    pub configure: Option<unsafe extern "C" fn(*mut SubsystemHandle) -> c_int>,
    pub ready: Option<unsafe extern "C" fn(*mut SubsystemHandle) -> c_int>,
    pub start: Option<unsafe extern "C" fn(*mut SubsystemHandle) -> c_int>,
    pub pause: Option<unsafe extern "C" fn(*mut SubsystemHandle) -> c_int>,
    pub stop: Option<unsafe extern "C" fn(*mut SubsystemHandle) -> c_int>,
    pub recovery: Option<unsafe extern "C" fn(*mut SubsystemHandle) -> c_int>,
    pub safe: Option<unsafe extern "C" fn(*mut SubsystemHandle) -> c_int>,
    pub system_mode: Option<unsafe extern "C" fn(*mut SubsystemHandle, u32) -> c_int>,
    pub query:
        Option<unsafe extern "C" fn(*mut SubsystemHandle, u32, *mut c_void, *mut c_void) -> c_int>,
}

/// Versioned table a subsystem library exports.
#[repr(C)]
pub struct SubsystemDescriptor {
    /// Must equal [`SUBSYS_ABI_VERSION`]; mismatches are rejected at load.
    pub abi_version: u32,
    pub name: *const c_char,
    pub version_str: *const c_char,
    /// Non-null for an accepted descriptor.
    pub vtable: *const SubsystemVTable,
    pub create:
        Option<unsafe extern "C" fn(*const SubsystemParams, *mut *mut SubsystemHandle) -> c_int>,
    pub destroy: Option<unsafe extern "C" fn(*mut SubsystemHandle)>,
    pub registry: Option<unsafe extern "C" fn(*const SubsystemParams) -> c_int>,
    pub registry_module: Option<unsafe extern "C" fn(*const SubsystemParams) -> c_int>,
}

/// Signature of the exported descriptor function.
pub type DescriptorFn = unsafe extern "C" fn() -> *const SubsystemDescriptor;

/// Owning builder for [`SubsystemParams`].
///
/// The raw params borrow their string storage from this value, so a params
/// view must not outlive it.
pub struct OwnedSubsystemParams {
    config_type: ConfigType,
    config_path: std::ffi::CString,
    manifest_type: ManifestType,
    manifest_path: std::ffi::CString,
}

impl OwnedSubsystemParams {
    pub fn new(
        config_type: ConfigType,
        config_path: &str,
        manifest_type: ManifestType,
        manifest_path: &str,
    ) -> crate::error::SysResult<Self> {
        let make = |s: &str| {
            std::ffi::CString::new(s).map_err(|_| {
                crate::error::SystemError::with(
                    crate::error::ResultCode::InvalidArgument,
                    "params path contains NUL",
                )
            })
        };
        Ok(Self {
            config_type,
            config_path: make(config_path)?,
            manifest_type,
            manifest_path: make(manifest_path)?,
        })
    }

    /// Raw view borrowing this value's string storage.
    pub fn as_params(&self) -> SubsystemParams {
        SubsystemParams {
            config_type: self.config_type,
            config_path: self.config_path.as_ptr(),
            manifest_type: self.manifest_type,
            manifest_path: self.manifest_path.as_ptr(),
        }
    }
}

// Descriptor and vtable are tables of function pointers and static
// strings; the host serializes calls into one subsystem through its
// controller.
unsafe impl Send for SubsystemDescriptor {}
unsafe impl Sync for SubsystemDescriptor {}
unsafe impl Send for SubsystemVTable {}
unsafe impl Sync for SubsystemVTable {}

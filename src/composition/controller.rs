//! # Subsystem controller.
//!
//! Safe façade over one [`LoadedSubsystem`]: holds the handle, descriptor,
//! instance, and a stable name, and dispatches lifecycle operations into
//! the raw vtable. Raw handles never escape the controller. Operations the
//! vtable leaves unset are treated as trivially successful; failures come
//! back as platform results converted from the ABI ints. Controllers do
//! not retry.

use libc::c_void;
use tracing::debug;

use crate::composition::abi::{OwnedSubsystemParams, SubsystemHandle};
use crate::composition::loader::{LoadedSubsystem, Loader};
use crate::error::{SysResult, SystemError};

/// Host-side wrapper around one loaded subsystem.
pub struct SubsystemController {
    name: String,
    subsystem: LoadedSubsystem,
    params: OwnedSubsystemParams,
}

type LifecycleFn = unsafe extern "C" fn(*mut SubsystemHandle) -> libc::c_int;

impl SubsystemController {
    pub fn new(
        name: impl Into<String>,
        subsystem: LoadedSubsystem,
        params: OwnedSubsystemParams,
    ) -> Self {
        Self {
            name: name.into(),
            subsystem,
            params,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version string the descriptor reports.
    pub fn version(&self) -> String {
        self.subsystem.version()
    }

    pub fn initialize(&self) -> SysResult<()> {
        self.call(self.vtable().init, "init")
    }

    pub fn self_test(&self) -> SysResult<()> {
        self.call(self.vtable().self_test, "self_test")
    }

    pub fn configure(&self) -> SysResult<()> {
        self.call(self.vtable().configure, "configure")
    }

    pub fn ready(&self) -> SysResult<()> {
        self.call(self.vtable().ready, "ready")
    }

    pub fn start(&self) -> SysResult<()> {
        self.call(self.vtable().start, "start")
    }

    pub fn pause(&self) -> SysResult<()> {
        self.call(self.vtable().pause, "pause")
    }

    pub fn stop(&self) -> SysResult<()> {
        self.call(self.vtable().stop, "stop")
    }

    pub fn recovery(&self) -> SysResult<()> {
        self.call(self.vtable().recovery, "recovery")
    }

    pub fn safe(&self) -> SysResult<()> {
        self.call(self.vtable().safe, "safe")
    }

    /// Broadcasts a system mode value to the subsystem.
    pub fn system_mode(&self, mode: u32) -> SysResult<()> {
        debug!(subsystem = %self.name, mode, "system_mode");
        match self.vtable().system_mode {
            Some(f) => SystemError::from_abi(unsafe { f(self.subsystem.instance(), mode) }),
            None => Ok(()),
        }
    }

    /// Opaque query pass-through; `code` semantics belong to the subsystem.
    ///
    /// # Safety
    ///
    /// `input` and `output` must satisfy whatever layout the subsystem
    /// documents for `code`; the host cannot type them.
    pub unsafe fn query(
        &self,
        code: u32,
        input: *mut c_void,
        output: *mut c_void,
    ) -> SysResult<()> {
        match self.vtable().query {
            Some(f) => SystemError::from_abi(f(self.subsystem.instance(), code, input, output)),
            None => Ok(()),
        }
    }

    /// Host-side IoC registration hook.
    pub fn registry(&self) -> SysResult<()> {
        debug!(subsystem = %self.name, "registry");
        match self.subsystem.descriptor().registry {
            Some(f) => {
                let params = self.params.as_params();
                SystemError::from_abi(unsafe { f(&params) })
            }
            None => Ok(()),
        }
    }

    /// Module-container IoC registration hook.
    pub fn registry_module(&self) -> SysResult<()> {
        debug!(subsystem = %self.name, "registry_module");
        match self.subsystem.descriptor().registry_module {
            Some(f) => {
                let params = self.params.as_params();
                SystemError::from_abi(unsafe { f(&params) })
            }
            None => Ok(()),
        }
    }

    /// Destroys the instance and closes the library.
    pub fn unload(self) {
        debug!(subsystem = %self.name, "unload");
        Loader::unload(self.subsystem);
    }

    fn vtable(&self) -> &crate::composition::abi::SubsystemVTable {
        // invariant: acceptance rejected null vtables
        unsafe { &*self.subsystem.descriptor().vtable }
    }

    fn call(&self, op: Option<LifecycleFn>, what: &str) -> SysResult<()> {
        debug!(subsystem = %self.name, op = what, "lifecycle call");
        match op {
            Some(f) => SystemError::from_abi(unsafe { f(self.subsystem.instance()) }),
            None => Ok(()),
        }
    }
}

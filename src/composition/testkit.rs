//! In-process sample subsystem used by composition tests.
//!
//! Implements the full descriptor/vtable surface the way a real shared
//! library would, with behavior knobs parsed from the config path string
//! (e.g. `"fail_starts=2;reject_mode=3"`) so every instance is
//! self-contained and tests can run in parallel.

use std::ffi::CStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use libc::{c_int, c_void};

use crate::composition::abi::{
    ConfigType, ManifestType, OwnedSubsystemParams, SubsystemDescriptor, SubsystemHandle,
    SubsystemParams, SubsystemVTable, SUBSYS_ERR, SUBSYS_ERR_INVALID_ARG, SUBSYS_OK,
};

/// Query code: copy a [`SampleSnapshot`] into `out`.
pub(crate) const QUERY_SNAPSHOT: u32 = 1;

/// Global destroy counter (delta-checked by tests).
pub(crate) static DESTROY_COUNT: AtomicUsize = AtomicUsize::new(0);
/// Global registry-hook counter (delta-checked by tests).
pub(crate) static REGISTRY_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Observable state, written out through `query`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SampleSnapshot {
    pub initialized: u32,
    pub running: u32,
    pub mode: u32,
    pub start_calls: u32,
}

struct SampleState {
    snapshot: SampleSnapshot,
    fail_starts: u32,
    reject_mode: Option<u32>,
}

fn parse_spec(spec: &str) -> (u32, Option<u32>) {
    let mut fail_starts = 0;
    let mut reject_mode = None;
    for part in spec.split(';') {
        if let Some(v) = part.strip_prefix("fail_starts=") {
            fail_starts = v.parse().unwrap_or(0);
        } else if let Some(v) = part.strip_prefix("reject_mode=") {
            reject_mode = v.parse().ok();
        }
    }
    (fail_starts, reject_mode)
}

unsafe fn state<'a>(h: *mut SubsystemHandle) -> Option<&'a mut SampleState> {
    (h as *mut SampleState).as_mut()
}

unsafe extern "C" fn sample_init(h: *mut SubsystemHandle) -> c_int {
    match state(h) {
        Some(s) => {
            s.snapshot.initialized = 1;
            SUBSYS_OK
        }
        None => SUBSYS_ERR_INVALID_ARG,
    }
}

unsafe extern "C" fn sample_noop(h: *mut SubsystemHandle) -> c_int {
    if h.is_null() {
        SUBSYS_ERR_INVALID_ARG
    } else {
        SUBSYS_OK
    }
}

unsafe extern "C" fn sample_start(h: *mut SubsystemHandle) -> c_int {
    match state(h) {
        Some(s) => {
            s.snapshot.start_calls += 1;
            if s.fail_starts > 0 {
                s.fail_starts -= 1;
                return SUBSYS_ERR;
            }
            s.snapshot.running = 1;
            SUBSYS_OK
        }
        None => SUBSYS_ERR_INVALID_ARG,
    }
}

unsafe extern "C" fn sample_stop(h: *mut SubsystemHandle) -> c_int {
    match state(h) {
        Some(s) => {
            s.snapshot.running = 0;
            SUBSYS_OK
        }
        None => SUBSYS_ERR_INVALID_ARG,
    }
}

unsafe extern "C" fn sample_system_mode(h: *mut SubsystemHandle, mode: u32) -> c_int {
    match state(h) {
        Some(s) => {
            if s.reject_mode == Some(mode) {
                return SUBSYS_ERR;
            }
            s.snapshot.mode = mode;
            SUBSYS_OK
        }
        None => SUBSYS_ERR_INVALID_ARG,
    }
}

unsafe extern "C" fn sample_query(
    h: *mut SubsystemHandle,
    code: u32,
    _in: *mut c_void,
    out: *mut c_void,
) -> c_int {
    match state(h) {
        Some(s) => {
            if code == QUERY_SNAPSHOT && !out.is_null() {
                *(out as *mut SampleSnapshot) = s.snapshot;
            }
            SUBSYS_OK
        }
        None => SUBSYS_ERR_INVALID_ARG,
    }
}

unsafe extern "C" fn sample_create(
    params: *const SubsystemParams,
    out: *mut *mut SubsystemHandle,
) -> c_int {
    if out.is_null() {
        return SUBSYS_ERR_INVALID_ARG;
    }
    let spec = params
        .as_ref()
        .filter(|p| !p.config_path.is_null())
        .map(|p| CStr::from_ptr(p.config_path).to_string_lossy().into_owned())
        .unwrap_or_default();
    let (fail_starts, reject_mode) = parse_spec(&spec);

    let boxed = Box::new(SampleState {
        snapshot: SampleSnapshot::default(),
        fail_starts,
        reject_mode,
    });
    *out = Box::into_raw(boxed) as *mut SubsystemHandle;
    SUBSYS_OK
}

unsafe extern "C" fn sample_destroy(h: *mut SubsystemHandle) {
    if !h.is_null() {
        drop(Box::from_raw(h as *mut SampleState));
        DESTROY_COUNT.fetch_add(1, Ordering::SeqCst);
    }
}

unsafe extern "C" fn sample_registry(_params: *const SubsystemParams) -> c_int {
    REGISTRY_COUNT.fetch_add(1, Ordering::SeqCst);
    SUBSYS_OK
}

static SAMPLE_VTABLE: SubsystemVTable = SubsystemVTable {
    size: std::mem::size_of::<SubsystemVTable>() as u32,
    abi_version: 1,
    init: Some(sample_init),
    self_test: Some(sample_noop),
    configure: Some(sample_noop),
    ready: Some(sample_noop),
    start: Some(sample_start),
    pause: Some(sample_noop),
    stop: Some(sample_stop),
    recovery: Some(sample_noop),
    safe: Some(sample_noop),
    system_mode: Some(sample_system_mode),
    query: Some(sample_query),
};

static SAMPLE_DESCRIPTOR: SubsystemDescriptor = SubsystemDescriptor {
    abi_version: 1,
    name: c"sample".as_ptr(),
    version_str: c"1.0.0".as_ptr(),
    vtable: &SAMPLE_VTABLE,
    create: Some(sample_create),
    destroy: Some(sample_destroy),
    registry: Some(sample_registry),
    registry_module: Some(sample_registry),
};

static MISMATCHED_DESCRIPTOR: SubsystemDescriptor = SubsystemDescriptor {
    abi_version: 99,
    name: c"from-the-future".as_ptr(),
    version_str: c"9.9.9".as_ptr(),
    vtable: &SAMPLE_VTABLE,
    create: Some(sample_create),
    destroy: Some(sample_destroy),
    registry: None,
    registry_module: None,
};

static NULL_VTABLE_DESCRIPTOR: SubsystemDescriptor = SubsystemDescriptor {
    abi_version: 1,
    name: c"hollow".as_ptr(),
    version_str: c"0.0.0".as_ptr(),
    vtable: std::ptr::null(),
    create: None,
    destroy: None,
    registry: None,
    registry_module: None,
};

pub(crate) fn sample_descriptor() -> *const SubsystemDescriptor {
    &SAMPLE_DESCRIPTOR
}

pub(crate) fn mismatched_descriptor() -> *const SubsystemDescriptor {
    &MISMATCHED_DESCRIPTOR
}

pub(crate) fn null_vtable_descriptor() -> *const SubsystemDescriptor {
    &NULL_VTABLE_DESCRIPTOR
}

/// Owned params with a test-behavior spec as the config path.
pub(crate) fn params(spec: &str) -> OwnedSubsystemParams {
    OwnedSubsystemParams::new(ConfigType::File, spec, ManifestType::File, "system_manifest.yaml")
        .expect("test params are NUL-free")
}

/// Reads the sample snapshot back through the controller's query surface.
pub(crate) unsafe fn snapshot_of(
    controller: &crate::composition::SubsystemController,
) -> SampleSnapshot {
    let mut snap = SampleSnapshot::default();
    controller
        .query(
            QUERY_SNAPSHOT,
            std::ptr::null_mut(),
            &mut snap as *mut SampleSnapshot as *mut c_void,
        )
        .expect("query should succeed");
    snap
}

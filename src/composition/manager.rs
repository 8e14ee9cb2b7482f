//! # Subsystem manager.
//!
//! Loads every manifest subsystem, wraps each in a controller, and fans
//! lifecycle operations out across the fleet.
//!
//! ## Rules
//! - Fan-out order is the manifest's priority order (descending, stable on
//!   ties): higher-priority subsystems start first and stop first.
//! - Fan-outs never short-circuit: every subsystem gets the call; each
//!   failure is logged with the subsystem name and the aggregate result is
//!   an error naming the failures.
//! - A required subsystem that fails to load aborts loading; an optional
//!   one logs a warning and loading continues.
//! - `start_all` honors the manifest restart policy: a failed start is
//!   retried up to `max_retries` with `restart_delay_ms` between attempts
//!   when the policy allows.
//! - Mode broadcast is non-transactional: rejections are reported, already
//!   applied subsystems are not rolled back.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::composition::abi::{ConfigType, ManifestType, OwnedSubsystemParams};
use crate::composition::controller::SubsystemController;
use crate::composition::loader::{LoadedSubsystem, Loader};
use crate::composition::restart::RestartSpec;
use crate::error::{ResultCode, SysResult, SystemError};
use crate::events::{Bus, Event, EventKind};
use crate::manifest::{SubsystemInfo, SystemManifest};
use crate::modes::SystemMode;

/// Owns the controller fleet and drives it through the lifecycle.
pub struct SubsystemManager {
    controllers: HashMap<String, SubsystemController>,
    /// Manifest priority order (descending); drives every fan-out.
    order: Vec<String>,
    restarts: HashMap<String, RestartSpec>,
    library_dir: PathBuf,
    bus: Option<Bus>,
}

impl SubsystemManager {
    /// Manager resolving `lib<name>.so` under `library_dir`.
    pub fn new(library_dir: impl Into<PathBuf>) -> Self {
        Self {
            controllers: HashMap::new(),
            order: Vec::new(),
            restarts: HashMap::new(),
            library_dir: library_dir.into(),
            bus: None,
        }
    }

    /// Manager that publishes composition events on the platform bus.
    pub fn with_bus(library_dir: impl Into<PathBuf>, bus: Bus) -> Self {
        let mut manager = Self::new(library_dir);
        manager.bus = Some(bus);
        manager
    }

    /// Loads every manifest subsystem in priority order.
    pub fn load(&mut self, manifest: &SystemManifest, manifest_path: &str) -> SysResult<()> {
        for info in &manifest.subsystems {
            let so_path = Loader::library_path(&self.library_dir, &info.name);
            let params = OwnedSubsystemParams::new(
                ConfigType::File,
                &info.config,
                ManifestType::File,
                manifest_path,
            )?;
            let raw = params.as_params();

            match Loader::load(&so_path, &raw) {
                Ok(loaded) => {
                    self.insert(info, loaded, params)?;
                }
                Err(e) => {
                    self.publish(
                        Event::now(EventKind::SubsystemLoadFailed)
                            .with_subsystem(&info.name)
                            .with_error(e.to_string()),
                    );
                    if info.optional {
                        warn!(subsystem = %info.name, error = %e, "optional subsystem failed to load");
                        continue;
                    }
                    error!(subsystem = %info.name, error = %e, "required subsystem failed to load");
                    return Err(SystemError::with(
                        e.code(),
                        format!("failed to load subsystem '{}': {e}", info.name),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Adopts an already-loaded (typically in-process) subsystem under the
    /// same controller discipline as dlopen'd ones.
    pub fn adopt(
        &mut self,
        info: &SubsystemInfo,
        loaded: LoadedSubsystem,
        params: OwnedSubsystemParams,
    ) -> SysResult<()> {
        self.insert(info, loaded, params)
    }

    fn insert(
        &mut self,
        info: &SubsystemInfo,
        loaded: LoadedSubsystem,
        params: OwnedSubsystemParams,
    ) -> SysResult<()> {
        if self.controllers.contains_key(&info.name) {
            Loader::unload(loaded);
            return Err(SystemError::with(
                ResultCode::AlreadyExists,
                format!("subsystem '{}' already loaded", info.name),
            ));
        }
        let controller = SubsystemController::new(info.name.clone(), loaded, params);
        info!(subsystem = %info.name, version = %controller.version(), "loaded subsystem controller");
        self.publish(Event::now(EventKind::SubsystemLoaded).with_subsystem(&info.name));

        self.restarts
            .insert(info.name.clone(), RestartSpec::from_manifest(info));
        self.order.push(info.name.clone());
        self.controllers.insert(info.name.clone(), controller);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SubsystemController> {
        self.controllers.get(name)
    }

    /// Subsystem names in fan-out order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn registry_all(&self) -> SysResult<()> {
        self.call_all("registry", SubsystemController::registry)
    }

    pub fn registry_module_all(&self) -> SysResult<()> {
        self.call_all("registry module", SubsystemController::registry_module)
    }

    pub fn initialize_all(&self) -> SysResult<()> {
        self.call_all("initialize", SubsystemController::initialize)
    }

    pub fn self_test_all(&self) -> SysResult<()> {
        self.call_all("self test", SubsystemController::self_test)
    }

    pub fn configure_all(&self) -> SysResult<()> {
        self.call_all("configure", SubsystemController::configure)
    }

    pub fn ready_all(&self) -> SysResult<()> {
        self.call_all("ready", SubsystemController::ready)
    }

    /// Start fan-out with restart-policy retries.
    pub fn start_all(&self) -> SysResult<()> {
        let mut failed: Vec<String> = Vec::new();
        for name in &self.order {
            let ctrl = &self.controllers[name];
            let spec = self.restarts.get(name).copied().unwrap_or_default();
            if !self.start_one(ctrl, spec) {
                failed.push(name.clone());
            }
        }
        self.aggregate("start", failed)
    }

    pub fn pause_all(&self) -> SysResult<()> {
        self.call_all("pause", SubsystemController::pause)
    }

    pub fn stop_all(&self) -> SysResult<()> {
        self.call_all("stop", SubsystemController::stop)
    }

    pub fn recovery_all(&self) -> SysResult<()> {
        self.call_all("recovery", SubsystemController::recovery)
    }

    pub fn safe_all(&self) -> SysResult<()> {
        self.call_all("safe", SubsystemController::safe)
    }

    /// Broadcasts a mode to every subsystem. Non-transactional: rejections
    /// are reported but nothing is rolled back.
    pub fn system_mode_all(&self, mode: SystemMode) -> SysResult<()> {
        let mut failed: Vec<String> = Vec::new();
        for name in &self.order {
            let ctrl = &self.controllers[name];
            if let Err(e) = ctrl.system_mode(mode.as_abi()) {
                error!(subsystem = %name, %mode, error = %e, "subsystem rejected mode");
                self.publish(
                    Event::now(EventKind::ModeRejected)
                        .with_subsystem(name)
                        .with_mode(mode.name())
                        .with_error(e.to_string()),
                );
                failed.push(name.clone());
            }
        }
        self.aggregate("system mode", failed)
    }

    /// Destroys every subsystem and closes its library, in fan-out order.
    pub fn unload_all(&mut self) {
        for name in std::mem::take(&mut self.order) {
            if let Some(ctrl) = self.controllers.remove(&name) {
                ctrl.unload();
                self.publish(Event::now(EventKind::SubsystemUnloaded).with_subsystem(&name));
            }
        }
        self.restarts.clear();
    }

    fn start_one(&self, ctrl: &SubsystemController, spec: RestartSpec) -> bool {
        let mut attempt: u32 = 0;
        loop {
            match ctrl.start() {
                Ok(()) => return true,
                Err(e) => {
                    error!(subsystem = %ctrl.name(), attempt, error = %e, "subsystem start failed");
                    self.publish(
                        Event::now(EventKind::LifecycleFailed)
                            .with_subsystem(ctrl.name())
                            .with_name("start")
                            .with_error(e.to_string()),
                    );
                    if spec.policy.allows_retry() && attempt < spec.max_retries {
                        attempt += 1;
                        warn!(subsystem = %ctrl.name(), attempt, max = spec.max_retries,
                              delay_ms = spec.delay.as_millis() as u64, "retrying subsystem start");
                        std::thread::sleep(spec.delay);
                        continue;
                    }
                    return false;
                }
            }
        }
    }

    fn call_all(
        &self,
        action: &str,
        op: impl Fn(&SubsystemController) -> SysResult<()>,
    ) -> SysResult<()> {
        let mut failed: Vec<String> = Vec::new();
        for name in &self.order {
            let ctrl = &self.controllers[name];
            if let Err(e) = op(ctrl) {
                error!(subsystem = %name, action, error = %e, "subsystem operation failed");
                self.publish(
                    Event::now(EventKind::LifecycleFailed)
                        .with_subsystem(name)
                        .with_name(action)
                        .with_error(e.to_string()),
                );
                failed.push(name.clone());
            }
        }
        self.aggregate(action, failed)
    }

    fn aggregate(&self, action: &str, failed: Vec<String>) -> SysResult<()> {
        if failed.is_empty() {
            Ok(())
        } else {
            Err(SystemError::with(
                ResultCode::InternalError,
                format!("{action} failed for: {}", failed.join(", ")),
            ))
        }
    }

    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev);
        }
    }
}

impl Drop for SubsystemManager {
    fn drop(&mut self) {
        self.unload_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::testkit;

    fn info(name: &str, priority: i32) -> SubsystemInfo {
        SubsystemInfo {
            name: name.into(),
            group: String::new(),
            description: String::new(),
            priority,
            config: "sample.yaml".into(),
            auto_start: false,
            allow_version: String::new(),
            affinity: Vec::new(),
            restart_policy: String::new(),
            restart_delay_ms: 0,
            max_retries: 0,
            optional: false,
            denied_modes: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    fn adopt_sample(manager: &mut SubsystemManager, info: &SubsystemInfo) {
        let params = testkit::params(&info.config);
        let raw = params.as_params();
        let loaded =
            unsafe { Loader::from_descriptor(testkit::sample_descriptor(), &raw) }.unwrap();
        manager.adopt(info, loaded, params).unwrap();
    }

    #[test]
    fn fan_out_reaches_every_subsystem_in_order() {
        let mut manager = SubsystemManager::new(".");
        adopt_sample(&mut manager, &info("high", 50));
        adopt_sample(&mut manager, &info("low", 10));
        assert_eq!(manager.names(), ["high".to_string(), "low".to_string()]);

        manager.initialize_all().unwrap();
        manager.start_all().unwrap();
        for name in ["high", "low"] {
            let snap = unsafe { testkit::snapshot_of(manager.get(name).unwrap()) };
            assert_eq!(snap.initialized, 1);
            assert_eq!(snap.running, 1);
        }
        manager.stop_all().unwrap();
        manager.unload_all();
        assert!(manager.get("high").is_none());
    }

    #[test]
    fn failures_do_not_short_circuit_the_fan_out() {
        let mut manager = SubsystemManager::new(".");
        let mut bad = info("bad", 50);
        bad.config = "fail_starts=9".into();
        adopt_sample(&mut manager, &bad);
        adopt_sample(&mut manager, &info("good", 10));

        let err = manager.start_all().unwrap_err();
        assert_eq!(err.code(), ResultCode::InternalError);
        assert!(err.message().unwrap().contains("bad"));

        // the later subsystem still got its start
        let snap = unsafe { testkit::snapshot_of(manager.get("good").unwrap()) };
        assert_eq!(snap.running, 1);
    }

    #[test]
    fn start_retries_per_restart_policy() {
        let mut manager = SubsystemManager::new(".");
        let mut flaky = info("flaky", 0);
        flaky.config = "fail_starts=2".into();
        flaky.restart_policy = "on_failure".into();
        flaky.restart_delay_ms = 1;
        flaky.max_retries = 3;
        adopt_sample(&mut manager, &flaky);

        manager.start_all().unwrap();
        let snap = unsafe { testkit::snapshot_of(manager.get("flaky").unwrap()) };
        assert_eq!(snap.start_calls, 3);
        assert_eq!(snap.running, 1);
    }

    #[test]
    fn never_policy_does_not_retry() {
        let mut manager = SubsystemManager::new(".");
        let mut flaky = info("flaky", 0);
        flaky.config = "fail_starts=1".into();
        adopt_sample(&mut manager, &flaky);

        manager.start_all().unwrap_err();
        let snap = unsafe { testkit::snapshot_of(manager.get("flaky").unwrap()) };
        assert_eq!(snap.start_calls, 1);
        assert_eq!(snap.running, 0);
    }

    #[test]
    fn mode_broadcast_is_not_rolled_back() {
        let mut manager = SubsystemManager::new(".");
        let mut rejecting = info("rejecting", 50);
        rejecting.config = format!("reject_mode={}", SystemMode::Update.as_abi());
        adopt_sample(&mut manager, &rejecting);
        adopt_sample(&mut manager, &info("accepting", 10));

        let err = manager.system_mode_all(SystemMode::Update).unwrap_err();
        assert!(err.message().unwrap().contains("rejecting"));

        // the accepting subsystem keeps the applied mode
        let snap = unsafe { testkit::snapshot_of(manager.get("accepting").unwrap()) };
        assert_eq!(snap.mode, SystemMode::Update.as_abi());
    }

    #[test]
    fn required_load_failure_aborts_with_the_subsystem_name() {
        // S5, required path: the library does not exist on disk
        let mut manager = SubsystemManager::new("/nonexistent-libdir");
        let manifest = SystemManifest {
            subsystems: vec![info("ghost", 0)],
            ..SystemManifest::default()
        };
        let err = manager.load(&manifest, "system_manifest.yaml").unwrap_err();
        assert!(err.message().unwrap().contains("ghost"));
    }

    #[test]
    fn optional_load_failure_continues() {
        let mut manager = SubsystemManager::new("/nonexistent-libdir");
        let mut ghost = info("ghost", 0);
        ghost.optional = true;
        let manifest = SystemManifest {
            subsystems: vec![ghost],
            ..SystemManifest::default()
        };
        manager.load(&manifest, "system_manifest.yaml").unwrap();
        assert!(manager.names().is_empty());
    }

    #[test]
    fn duplicate_adoption_is_rejected() {
        let mut manager = SubsystemManager::new(".");
        adopt_sample(&mut manager, &info("sample", 0));

        let params = testkit::params("sample.yaml");
        let raw = params.as_params();
        let loaded =
            unsafe { Loader::from_descriptor(testkit::sample_descriptor(), &raw) }.unwrap();
        let err = manager.adopt(&info("sample", 0), loaded, params).unwrap_err();
        assert_eq!(err.code(), ResultCode::AlreadyExists);
    }
}

//! # Command dispatcher.
//!
//! Mode-gated routing of named commands to registered services. The
//! dispatcher resolves its collaborators (registry, system config, target
//! service) from the IoC container; a per-dispatch [`Scope`] backs scoped
//! service lifetimes and expires on every exit path.
//!
//! ## Rules
//! - Unknown command → `NotFound`.
//! - Current mode not in `allowed_modes` → `PermissionDenied`. Rejections
//!   return typed errors without warning-level logging; a gated command is
//!   expected traffic.
//! - Missing or mistyped argument → `InvalidArgument`.
//! - Service unresolvable → `InvalidState`.
//! - After successful dispatch, the command's `emit` topics are published
//!   on the platform bus.

use tracing::debug;

use crate::config::SystemConfig;
use crate::error::{ResultCode, SysResult, SystemError};
use crate::events::{Bus, Event, EventKind};
use crate::ioc::{type_key, Container};

use super::message::Message;
use super::registry::{CommandInfo, CommandRegistry};
use super::service::SystemService;

/// Routes commands through the mode gate to their services.
pub struct CommandDispatcher<'c> {
    container: &'c Container,
    bus: Option<Bus>,
}

impl<'c> CommandDispatcher<'c> {
    pub fn new(container: &'c Container) -> Self {
        Self {
            container,
            bus: None,
        }
    }

    /// Dispatcher that publishes command events on the platform bus.
    pub fn with_bus(container: &'c Container, bus: Bus) -> Self {
        Self {
            container,
            bus: Some(bus),
        }
    }

    /// Dispatches one command.
    pub fn dispatch(&self, command: &str, args: &Message) -> SysResult<()> {
        let registry = self
            .container
            .resolve::<CommandRegistry>(type_key::<CommandRegistry>())
            .ok_or_else(|| {
                SystemError::with(ResultCode::NotFound, "command registry not registered")
            })?;

        let Some(info) = registry.find(command) else {
            return self.reject(
                command,
                SystemError::with(ResultCode::NotFound, "unknown command"),
            );
        };

        let mode = self.current_mode();
        if !info.allowed_modes.contains(&mode) {
            debug!(command, %mode, "command not allowed in current mode");
            return self.reject(
                command,
                SystemError::with(
                    ResultCode::PermissionDenied,
                    format!("command not allowed in mode '{mode}'"),
                ),
            );
        }

        if let Err(e) = validate(&info, args) {
            return self.reject(command, e);
        }

        // per-dispatch scope: scoped collaborators expire when it drops
        let scope = self.container.scope();
        let Some(service) = self
            .container
            .resolve_scoped::<dyn SystemService>(&info.service, &scope)
        else {
            return self.reject(
                command,
                SystemError::with(
                    ResultCode::InvalidState,
                    format!("service '{}' not found", info.service),
                ),
            );
        };

        service.invoke(command, args)?;
        debug!(command, service = %info.service, "command dispatched");

        if let Some(bus) = &self.bus {
            bus.publish(Event::now(EventKind::CommandDispatched).with_name(command));
            for topic in &info.emit {
                bus.publish(
                    Event::now(EventKind::CommandEmitted)
                        .with_name(command)
                        .with_topic(topic),
                );
            }
        }
        Ok(())
    }

    fn current_mode(&self) -> String {
        self.container
            .resolve::<SystemConfig>(type_key::<SystemConfig>())
            .map(|cfg| cfg.mode())
            .unwrap_or_else(|| SystemConfig::DEFAULT_MODE.to_string())
    }

    fn reject(&self, command: &str, error: SystemError) -> SysResult<()> {
        if let Some(bus) = &self.bus {
            bus.publish(
                Event::now(EventKind::CommandRejected)
                    .with_name(command)
                    .with_error(error.to_string()),
            );
        }
        Err(error)
    }
}

/// Validates argument presence and declared types.
fn validate(info: &CommandInfo, args: &Message) -> SysResult<()> {
    for (key, arg_type) in &info.arg_types {
        let Some(value) = args.values.get(key) else {
            return Err(SystemError::with(
                ResultCode::InvalidArgument,
                format!("missing required argument: {key}"),
            ));
        };
        if !arg_type.matches(value) {
            return Err(SystemError::with(
                ResultCode::InvalidArgument,
                format!("type mismatch for argument: {key}"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ArgType, CommandTable};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct SampleService {
        table: CommandTable,
    }

    impl SampleService {
        fn new(calls: Arc<AtomicUsize>) -> Self {
            let mut table = CommandTable::new();
            table.insert("Sample", move |_args| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Self { table }
        }
    }

    impl SystemService for SampleService {
        fn invoke(&self, command: &str, args: &Message) -> SysResult<()> {
            self.table.invoke(command, args)
        }
    }

    fn setup(allowed_modes: &[&str]) -> (Container, Arc<AtomicUsize>, Arc<SystemConfig>) {
        let container = Container::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let registry = CommandRegistry::new();
        registry.register_commands(vec![CommandInfo {
            name: "Sample".into(),
            service: "sample".into(),
            allowed_modes: allowed_modes.iter().map(|m| m.to_string()).collect(),
            arg_types: [("rate".to_string(), ArgType::Int)].into(),
            emit: vec!["event.sample.accepted".into()],
            description: String::new(),
        }]);
        container.register_singleton::<CommandRegistry>(
            type_key::<CommandRegistry>(),
            Arc::new(registry),
        );

        let config = Arc::new(SystemConfig::new("bench", ""));
        container
            .register_singleton::<SystemConfig>(type_key::<SystemConfig>(), Arc::clone(&config));

        let service: Arc<dyn SystemService> = Arc::new(SampleService::new(Arc::clone(&calls)));
        container.register_singleton::<dyn SystemService>("sample", service);

        (container, calls, config)
    }

    fn sample_args() -> Message {
        Message::new("cmd").with("rate", 30i64)
    }

    #[test]
    fn mode_gate_rejects_then_admits() {
        // S6: denied in low_power, allowed in normal
        let (container, calls, config) = setup(&["normal"]);
        let dispatcher = CommandDispatcher::new(&container);

        config.set_mode("low_power");
        let err = dispatcher.dispatch("Sample", &sample_args()).unwrap_err();
        assert_eq!(err.code(), ResultCode::PermissionDenied);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        config.set_mode("normal");
        dispatcher.dispatch("Sample", &sample_args()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_command_is_not_found() {
        let (container, _calls, _config) = setup(&["normal"]);
        let dispatcher = CommandDispatcher::new(&container);
        let err = dispatcher.dispatch("Nope", &Message::new("cmd")).unwrap_err();
        assert_eq!(err.code(), ResultCode::NotFound);
    }

    #[test]
    fn argument_validation_gates_dispatch() {
        let (container, calls, _config) = setup(&["normal"]);
        let dispatcher = CommandDispatcher::new(&container);

        let err = dispatcher.dispatch("Sample", &Message::new("cmd")).unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidArgument);

        let err = dispatcher
            .dispatch("Sample", &Message::new("cmd").with("rate", "fast"))
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidArgument);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unresolvable_service_is_invalid_state() {
        let (container, _calls, _config) = setup(&["normal"]);
        container.deregister::<dyn SystemService>("sample");
        let dispatcher = CommandDispatcher::new(&container);
        let err = dispatcher.dispatch("Sample", &sample_args()).unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidState);
    }

    #[tokio::test]
    async fn emits_declared_topics_after_dispatch() {
        let (container, _calls, _config) = setup(&["normal"]);
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let dispatcher = CommandDispatcher::with_bus(&container, bus);

        dispatcher.dispatch("Sample", &sample_args()).unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::CommandDispatched);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, EventKind::CommandEmitted);
        assert_eq!(second.topic.as_deref(), Some("event.sample.accepted"));
    }
}

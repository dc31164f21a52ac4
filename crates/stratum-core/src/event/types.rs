use std::fmt;

/// Events produced by the core components themselves.
///
/// Payloads are free-form JSON; each emitter documents its own fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemEvent {
    PluginLoading,
    PluginLoaded,
    PluginLoadError,
    PluginRegistering,
    PluginRegistered,
    PluginRegisterError,
    PluginUnloading,
    PluginUnloaded,
    PluginUnloadError,
    PluginStatusChanged,

    ServiceRegistered,
    ServiceResolved,
    ServiceUnregistered,
    ServiceContainerCleared,

    LifecyclePhaseRegistered,
    LifecycleHookRegistered,
    LifecycleHookUnregistered,
    LifecycleStarting,
    LifecycleStarted,
    LifecycleStopping,
    LifecycleStopped,
    LifecyclePhaseStarting,
    LifecyclePhaseCompleted,
    LifecyclePhaseError,
    LifecycleHookCompleted,
    LifecycleHookError,
    LifecycleHookEnabledChanged,

    ConfigChanged,
    ConfigSourceAdded,
    ConfigSourceRemoved,

    KernelStarted,
    KernelStopped,
}

impl SystemEvent {
    /// Wire name of the event type
    pub fn name(&self) -> &'static str {
        match self {
            SystemEvent::PluginLoading => "plugin.loading",
            SystemEvent::PluginLoaded => "plugin.loaded",
            SystemEvent::PluginLoadError => "plugin.load.error",
            SystemEvent::PluginRegistering => "plugin.registering",
            SystemEvent::PluginRegistered => "plugin.registered",
            SystemEvent::PluginRegisterError => "plugin.register.error",
            SystemEvent::PluginUnloading => "plugin.unloading",
            SystemEvent::PluginUnloaded => "plugin.unloaded",
            SystemEvent::PluginUnloadError => "plugin.unload.error",
            SystemEvent::PluginStatusChanged => "plugin.status.changed",

            SystemEvent::ServiceRegistered => "service.registered",
            SystemEvent::ServiceResolved => "service.resolved",
            SystemEvent::ServiceUnregistered => "service.unregistered",
            SystemEvent::ServiceContainerCleared => "service.container.cleared",

            SystemEvent::LifecyclePhaseRegistered => "lifecycle.phase.registered",
            SystemEvent::LifecycleHookRegistered => "lifecycle.hook.registered",
            SystemEvent::LifecycleHookUnregistered => "lifecycle.hook.unregistered",
            SystemEvent::LifecycleStarting => "lifecycle.starting",
            SystemEvent::LifecycleStarted => "lifecycle.started",
            SystemEvent::LifecycleStopping => "lifecycle.stopping",
            SystemEvent::LifecycleStopped => "lifecycle.stopped",
            SystemEvent::LifecyclePhaseStarting => "lifecycle.phase.starting",
            SystemEvent::LifecyclePhaseCompleted => "lifecycle.phase.completed",
            SystemEvent::LifecyclePhaseError => "lifecycle.phase.error",
            SystemEvent::LifecycleHookCompleted => "lifecycle.hook.completed",
            SystemEvent::LifecycleHookError => "lifecycle.hook.error",
            SystemEvent::LifecycleHookEnabledChanged => "lifecycle.hook.enabled.changed",

            SystemEvent::ConfigChanged => "config.changed",
            SystemEvent::ConfigSourceAdded => "config.source.added",
            SystemEvent::ConfigSourceRemoved => "config.source.removed",

            SystemEvent::KernelStarted => "kernel.started",
            SystemEvent::KernelStopped => "kernel.stopped",
        }
    }
}

impl fmt::Display for SystemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

use crate::event::SystemEvent;

#[test]
fn test_system_event_names() {
    assert_eq!(SystemEvent::PluginLoadError.name(), "plugin.load.error");
    assert_eq!(SystemEvent::ServiceContainerCleared.name(), "service.container.cleared");
    assert_eq!(SystemEvent::LifecycleHookEnabledChanged.name(), "lifecycle.hook.enabled.changed");
    assert_eq!(SystemEvent::ConfigChanged.to_string(), "config.changed");
}

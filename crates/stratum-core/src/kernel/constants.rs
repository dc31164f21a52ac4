/// Application name
pub const APP_NAME: &str = "Stratum";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix of the environment variables read as configuration
pub const ENV_PREFIX: &str = "STRATUM";

/// Default event history capacity
pub const DEFAULT_HISTORY_SIZE: usize = crate::event::DEFAULT_MAX_HISTORY_SIZE;

/// Default plugins directory
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// Default plugin data directory
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default plugin cache directory
pub const DEFAULT_CACHE_DIR: &str = "cache";

/// Priority of configuration files passed through the kernel options
pub const CONFIG_FILE_PRIORITY: i32 = 50;

// Service ids under which the kernel registers its components
pub const KERNEL_SERVICE: &str = "kernel";
pub const EVENT_BUS_SERVICE: &str = "eventBus";
pub const SERVICE_CONTAINER_SERVICE: &str = "serviceContainer";
pub const PLUGIN_REGISTRY_SERVICE: &str = "pluginRegistry";
pub const LIFECYCLE_MANAGER_SERVICE: &str = "lifecycleManager";
pub const CONFIG_MANAGER_SERVICE: &str = "configManager";

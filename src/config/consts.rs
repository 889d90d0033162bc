/// Default fuel level for WASM execution (100 million instructions)
pub const DEFAULT_FUEL_LEVEL: u64 = 100_000_000;
/// Minimum allowed fuel level (1 million instructions)
pub const MIN_FUEL_LEVEL: u64 = 1_000_000;
/// Maximum allowed fuel level (500 million instructions) - security limit
pub const MAX_FUEL_LEVEL: u64 = 500_000_000;
/// Largest WASM handler module accepted by the loader (16MB)
pub const MAX_WASM_MODULE_SIZE: usize = 16 * 1024 * 1024;

/// Entry point looked up when neither the request nor the config names one
pub const DEFAULT_ENTRY_POINT: &str = "application";
/// The default tenant, served by the host's own execution context
pub const DEFAULT_TENANT: &str = "";
/// Tenant name that transports use to ask for the default tenant explicitly
pub const GLOBAL_TENANT_ALIAS: &str = "global";

/// Transport config key selecting the tenant (application group)
pub const TENANT_CONFIG_KEY: &str = "WSGIApplicationGroup";
/// Transport config key enabling per-request module reload
pub const RELOAD_CONFIG_KEY: &str = "WSGIScriptReloading";
/// Transport config key naming the entry point
pub const ENTRY_POINT_CONFIG_KEY: &str = "WSGICallableObject";
/// Value of [`RELOAD_CONFIG_KEY`] that turns reloading on
pub const RELOAD_ENABLED_VALUE: &str = "ON";

/// Header names never copied into a request environment
pub const SUPPRESSED_HEADERS: &[&str] = &["SCRIPT_FILENAME"];
/// Attribute whose presence switches the URL scheme to https
pub const HTTPS_INDICATOR: &str = "HTTPS";

/// Interface version reported as `wsgi.version`
pub const INTERFACE_VERSION: (u32, u32) = (1, 0);
/// Whether several processes may serve one tenant, unless configured
pub const DEFAULT_MULTIPROCESS: bool = true;
/// Read size used when a file wrapper has to be streamed chunk by chunk
pub const DEFAULT_FILE_WRAPPER_BLOCK_SIZE: usize = 8192;
/// Largest request body accepted by the environment builder (1GB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024 * 1024;

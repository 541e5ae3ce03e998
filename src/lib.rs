pub mod config;
pub mod observer;
pub mod poll;
pub mod service;

#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;

// Well-known names and paths of the installation under test.
pub const YGGDRASIL_UNIT: &str = "yggdrasil";
pub const ECHO_WORKER_UNIT: &str = "com.redhat.Yggdrasil1.Worker1.echo.service";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/yggdrasil/config.toml";
pub const CLIENT_ID_PATH: &str = "/var/lib/yggdrasil/client-id";
pub const DEFAULT_PATH_PREFIX: &str = "yggdrasil";

// The scheme could be "mqtt://" or "mqtts://"; the test flows force the
// daemon onto a plain local listener.
pub const LOCAL_BROKER_URL: &str = "mqtt://localhost:1883";
pub const LOCAL_BROKER_HOST: &str = "localhost";
pub const LOCAL_BROKER_PORT: u16 = 1883;

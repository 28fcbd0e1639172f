//! Configuration fixtures shared by the integration tests

use rip_server::ServerConfig;
use rstest::fixture;

/// Generic server: `time` readable, two catalog policies
pub const GENERIC_TOML: &str = r#"
[server]
host = "127.0.0.1"
port = 8080

[control.info]
name = "RIP Generic"
description = "A generic implementation of RIP"
authors = "J. Chacon"
keywords = "Raspberry PI, RIP"

[control.info.sampling_methods.PeriodicSampler]
first_sampling = "15"
period = "2"

[control.info.sampling_methods.PeriodicSendOnDelta]
first_sampling = "10"
period = "5"
delta = "2"

[[control.info.readables]]
name = "time"
description = "Server time in seconds"
type = "float"
min = "0"
max = "Inf"
precision = "0"
"#;

/// Pendulum lab with readables, writables and a delta policy
pub const PENDULUM_JSON: &str = r#"{
  "server": {"host": "lab.local", "port": 9000},
  "control": {"info": {
    "name": "Pendulum",
    "description": "Inverted pendulum",
    "default_sampling": "Fast",
    "sampling_methods": {
      "Fast": {"first_sampling": 0, "period": 1},
      "OnChange": {"first_sampling": 0, "period": 1, "delta": 2}
    },
    "readables": [
      {"name": "time", "type": "float", "min": 0, "max": "Inf"},
      {"name": "angle", "type": "float", "min": -180, "max": 180, "precision": 2},
      {"name": "speed", "type": "float", "sampling": {"type": "OnChange", "params": {}}}
    ],
    "writables": [
      {"name": "torque", "type": "float", "min": -1, "max": 1},
      {"name": "mode", "type": "string"},
      {"name": "enabled", "type": "bool"}
    ]
  }}
}"#;

#[fixture]
pub fn generic_config() -> ServerConfig {
    ServerConfig::from_toml_str(GENERIC_TOML).expect("generic config is valid")
}

#[fixture]
pub fn pendulum_config() -> ServerConfig {
    ServerConfig::from_json_str(PENDULUM_JSON).expect("pendulum config is valid")
}

/// Single readable `x` governed by the given catalog policy
pub fn single_variable_config(policy_json: &str) -> ServerConfig {
    ServerConfig::from_json_str(&format!(
        r#"{{"control": {{"info": {{
            "default_sampling": "Policy",
            "sampling_methods": {{"Policy": {policy_json}}},
            "readables": [{{"name": "x"}}]
        }}}}}}"#
    ))
    .expect("single variable config is valid")
}

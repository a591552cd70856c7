use serde::{Deserialize, Serialize};

/// Address of the liveness HTTP endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

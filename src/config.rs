//! Host-facing configuration.
//!
//! Every section has a `Default` and `#[serde(default)]`, so a host JSON
//! document only needs the fields it overrides:
//!
//! ```
//! let cfg = pendulum_core::config::EngineConfig::from_json_str(
//!     r#"{ "session": { "seed": 7 }, "solver": { "helper_scale": 0.4 } }"#,
//! ).unwrap();
//! assert_eq!(cfg.session.seed, 7);
//! assert_eq!(cfg.session.record_interval, 0.1);
//! ```

use serde::{Deserialize, Serialize};

#[cfg(feature = "golden-mode")]
use crate::golden::GoldenConfig;
use crate::systems::session::SessionConfig;
use crate::systems::solver::SolverConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub session: SessionConfig,
    pub solver: SolverConfig,
    #[cfg(feature = "golden-mode")]
    pub golden: GoldenConfig,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

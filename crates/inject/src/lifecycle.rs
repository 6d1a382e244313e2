use serde::{Deserialize, Serialize};
use std::fmt;

/// Instance reuse policy for a registered service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// A new instance on every resolution
    Transient,
    /// Created on first successful resolution, then shared
    Singleton,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Transient => f.write_str("transient"),
            Lifecycle::Singleton => f.write_str("singleton"),
        }
    }
}

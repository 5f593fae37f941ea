use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Per-loader settings.
///
/// Deserializes from `{ "dispatch_timeout_ms": 250 }`; an absent or `null` timeout means a
/// dispatch waits for its data source indefinitely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct LoaderOptions {
    #[serde(default, rename = "dispatch_timeout_ms", deserialize_with = "millis")]
    pub dispatch_timeout: Option<Duration>,
}

impl LoaderOptions {
    /// Fails a dispatch whose data source has not answered within `timeout`.
    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = Some(timeout);
        self
    }
}

fn millis<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::poll::PollSpec;

/// Every delay, budget and count the run loop uses, in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayTimings {
    pub tab_load_timeout_ms: u64,
    pub tab_load_interval_ms: u64,
    pub initial_settle_ms: u64,
    pub max_fetch_clicks: u32,
    pub fetch_settle_ms: u64,
    pub copy_settle_ms: u64,
    pub code_poll_timeout_ms: u64,
    pub code_poll_interval_ms: u64,
    pub acquire_backoff_ms: u64,
    pub focus_settle_ms: u64,
    pub reconnect_settle_ms: u64,
    pub reconnect_post_load_ms: u64,
    pub submit_settle_ms: u64,
    pub unknown_backoff_ms: u64,
    pub failure_backoff_ms: u64,
}

impl Default for RelayTimings {
    fn default() -> Self {
        Self {
            tab_load_timeout_ms: 20_000,
            tab_load_interval_ms: 300,
            initial_settle_ms: 800,
            max_fetch_clicks: 10,
            fetch_settle_ms: 1_500,
            copy_settle_ms: 400,
            code_poll_timeout_ms: 8_000,
            code_poll_interval_ms: 250,
            acquire_backoff_ms: 1_500,
            focus_settle_ms: 500,
            reconnect_settle_ms: 4_000,
            reconnect_post_load_ms: 1_000,
            submit_settle_ms: 2_000,
            unknown_backoff_ms: 20_000,
            failure_backoff_ms: 1_200,
        }
    }
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

impl RelayTimings {
    pub fn tab_load(&self) -> PollSpec {
        PollSpec::deadline(ms(self.tab_load_interval_ms), ms(self.tab_load_timeout_ms))
    }

    pub fn code_poll(&self) -> PollSpec {
        PollSpec::deadline(
            ms(self.code_poll_interval_ms),
            ms(self.code_poll_timeout_ms),
        )
    }

    pub fn initial_settle(&self) -> Duration {
        ms(self.initial_settle_ms)
    }

    pub fn fetch_settle(&self) -> Duration {
        ms(self.fetch_settle_ms)
    }

    pub fn copy_settle(&self) -> Duration {
        ms(self.copy_settle_ms)
    }

    pub fn acquire_backoff(&self) -> Duration {
        ms(self.acquire_backoff_ms)
    }

    pub fn focus_settle(&self) -> Duration {
        ms(self.focus_settle_ms)
    }

    pub fn reconnect_settle(&self) -> Duration {
        ms(self.reconnect_settle_ms)
    }

    pub fn reconnect_post_load(&self) -> Duration {
        ms(self.reconnect_post_load_ms)
    }

    pub fn submit_settle(&self) -> Duration {
        ms(self.submit_settle_ms)
    }

    pub fn unknown_backoff(&self) -> Duration {
        ms(self.unknown_backoff_ms)
    }

    pub fn failure_backoff(&self) -> Duration {
        ms(self.failure_backoff_ms)
    }

    /// Millisecond-scale timings for driving the loop against in-memory tabs.
    pub fn quick() -> Self {
        Self {
            tab_load_timeout_ms: 200,
            tab_load_interval_ms: 1,
            initial_settle_ms: 1,
            max_fetch_clicks: 10,
            fetch_settle_ms: 1,
            copy_settle_ms: 1,
            code_poll_timeout_ms: 60,
            code_poll_interval_ms: 2,
            acquire_backoff_ms: 2,
            focus_settle_ms: 1,
            reconnect_settle_ms: 1,
            reconnect_post_load_ms: 1,
            submit_settle_ms: 1,
            unknown_backoff_ms: 3,
            failure_backoff_ms: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::PollBudget;

    #[test]
    fn partial_override_keeps_defaults() {
        let timings: RelayTimings =
            serde_json::from_str(r#"{"unknown_backoff_ms": 5000}"#).unwrap();
        assert_eq!(timings.unknown_backoff(), Duration::from_secs(5));
        assert_eq!(timings.max_fetch_clicks, 10);
        assert_eq!(
            timings.code_poll().budget,
            PollBudget::Deadline(Duration::from_millis(8_000))
        );
    }
}

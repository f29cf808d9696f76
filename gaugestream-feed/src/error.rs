use crate::tick::{Market, Provider};
use smol_str::SmolStr;
use thiserror::Error;

/// All errors generated in `gaugestream-feed`.
///
/// Transport failures and liveness trips are recovered internally via
/// reconnection; they surface through the event channel for observability
/// rather than as `Err` returns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("invalid stream endpoint: {0}")]
    Endpoint(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("liveness watchdog tripped: {0}")]
    Liveness(String),

    #[error("symbol {symbol} unsupported on {provider}/{market}")]
    Unsupported {
        symbol: SmolStr,
        provider: Provider,
        market: Market,
    },

    #[error("feed connection already stopped")]
    Stopped,
}

impl FeedError {
    /// Determine whether an error should force the current session to close
    /// and the reconnect schedule to run.
    pub fn is_terminal(&self) -> bool {
        match self {
            FeedError::Transport(_) | FeedError::Liveness(_) => true,
            FeedError::Endpoint(_) | FeedError::Unsupported { .. } | FeedError::Stopped => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_is_terminal() {
        struct TestCase {
            input: FeedError,
            expected: bool,
        }

        let tests = vec![
            // TC0: transport errors force reconnection
            TestCase {
                input: FeedError::Transport("connection reset".to_string()),
                expected: true,
            },
            // TC1: watchdog trips force reconnection
            TestCase {
                input: FeedError::Liveness("idle for 31s".to_string()),
                expected: true,
            },
            // TC2: an unsupported symbol never tears the session down
            TestCase {
                input: FeedError::Unsupported {
                    symbol: SmolStr::new("DOGEUSDT"),
                    provider: Provider::Binance,
                    market: Market::Us,
                },
                expected: false,
            },
            // TC3: a bad endpoint is a configuration problem, not a session one
            TestCase {
                input: FeedError::Endpoint("not a url".to_string()),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.input.is_terminal(), test.expected, "TC{} failed", index);
        }
    }
}

//! Shared constants for the polling core

use std::time::Duration;

/// Maximum time a single fetch may take before it is abandoned
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Pending manual refresh requests per widget (extra requests are coalesced)
pub const REFRESH_QUEUE_DEPTH: usize = 1;

/// Capacity of the scheduler's command mailbox
pub const COMMAND_QUEUE_DEPTH: usize = 32;

/// Error shown when an integration reports failure without a message
pub const DEFAULT_REMOTE_ERROR: &str = "Plugin returned error";

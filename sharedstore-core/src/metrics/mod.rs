//! Metric descriptions for the storage contexts
//!
//! The contexts record through the `metrics` facade. Nothing is exported
//! unless the embedding application installs a recorder.

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// Application messages handed to channel listeners
pub const MESSAGES_PASSTHROUGH: &str = "sharedstore.messages.passthrough";
/// Tagged envelopes routed to a store
pub const MESSAGES_PROTOCOL: &str = "sharedstore.messages.protocol";
/// Tagged envelopes naming an operation nobody handles
pub const MESSAGES_UNKNOWN_OPERATION: &str = "sharedstore.messages.unknown_operation";
/// Snapshot messages posted by the owner, one per receiving worker
pub const BROADCASTS_SENT: &str = "sharedstore.broadcasts.sent";
/// Occupied entries per broadcast snapshot
pub const SNAPSHOT_ENTRIES: &str = "sharedstore.snapshot.entries";
/// Workers currently attached to the owner
pub const WORKERS_REGISTERED: &str = "sharedstore.workers.registered";

/// Register descriptions with the installed recorder
///
/// Call once after installing a recorder; a no-op otherwise.
pub fn init_metrics() {
    describe_counter!(
        MESSAGES_PASSTHROUGH,
        Unit::Count,
        "Application messages delivered to channel listeners"
    );
    describe_counter!(
        MESSAGES_PROTOCOL,
        Unit::Count,
        "Tagged envelopes dispatched to a store"
    );
    describe_counter!(
        MESSAGES_UNKNOWN_OPERATION,
        Unit::Count,
        "Tagged envelopes with an unrecognized operation"
    );
    describe_counter!(
        BROADCASTS_SENT,
        Unit::Count,
        "Snapshot messages posted to workers"
    );
    describe_histogram!(
        SNAPSHOT_ENTRIES,
        Unit::Count,
        "Occupied entries carried by each broadcast snapshot"
    );
    describe_gauge!(
        WORKERS_REGISTERED,
        Unit::Count,
        "Workers attached to the owner context"
    );
}

/// Every metric name this crate records
pub fn metric_names() -> [&'static str; 6] {
    [
        MESSAGES_PASSTHROUGH,
        MESSAGES_PROTOCOL,
        MESSAGES_UNKNOWN_OPERATION,
        BROADCASTS_SENT,
        SNAPSHOT_ENTRIES,
        WORKERS_REGISTERED,
    ]
}

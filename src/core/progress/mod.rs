pub mod reporter;

pub use reporter::{
    Measure, ProgressEvent, ProgressReporter, SyncSnapshot, SyncState, Tick, Tracked,
    DEFAULT_EVENT_CAPACITY,
};

//! Analytics events and the event aggregator.
//!
//! Recorded events are buffered per class (view and non-view) and persisted
//! until a buffer reaches its threshold, at which point the whole buffer is
//! serialized into one `events=[...]` request and handed to the request queue.

mod aggregator;
mod error;
mod event;
mod segmentation;

pub use aggregator::{EventAggregator, FlushOutcome, RecordOutcome};
pub use error::{EventError, EventResult};
pub use event::{keys, Event, NewEvent};
pub use segmentation::{Primitive, SegmentValue, Segmentation};

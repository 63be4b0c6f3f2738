//! Collaborator traits
//!
//! These traits define the narrow contracts between the link logic and the
//! things it does not own: the inference engine, image storage, indicator
//! outputs and wall-clock time.

pub mod actuator;
pub mod source;
pub mod storage;

pub use actuator::Actuator;
pub use source::{FrameSource, SourceStatus};
pub use storage::{FrameStore, StoreError, TimeSource, Timestamp, MAX_TIMESTAMP_LEN};

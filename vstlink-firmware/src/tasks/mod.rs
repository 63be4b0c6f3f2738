//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels.

pub mod indicator;
pub mod link_rx;
pub mod link_tx;
pub mod storage;

pub use indicator::{indicator_task, Indicators};
pub use link_rx::link_rx_task;
pub use link_tx::link_tx_task;
pub use storage::storage_task;

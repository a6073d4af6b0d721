pub mod engine;
pub mod progress;
pub mod walker;

pub use progress::{ChannelProgress, LogProgress, NullProgress, ProgressSink, ProgressState};
pub use walker::{parse_list_line, ListEntry};

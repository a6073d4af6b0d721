use log::debug;
use tokio::sync::mpsc;

/// Progress of one in-flight transfer or scan.
///
/// `total_bytes` is `None` when the total is unknown (a `SIZE` lookup failed
/// or returned -1); consumers should render an indeterminate state then.
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub label: String,
    pub total_bytes: Option<u64>,
    pub transferred_bytes: u64,
}

impl ProgressState {
    pub fn percent(&self) -> Option<u8> {
        match self.total_bytes {
            Some(total) if total > 0 => {
                Some(((self.transferred_bytes * 100) / total).min(100) as u8)
            }
            Some(_) => Some(100),
            None => None,
        }
    }
}

/// Sink for per-chunk progress updates.
///
/// The I/O side pushes into this from the worker context; implementations
/// must hand updates to any UI over a thread-safe channel rather than let the
/// worker touch UI state directly.
pub trait ProgressSink: Send + Sync {
    fn update(&self, state: &ProgressState);
}

/// Discards all updates. Used where progress is meaningless (LIST bodies).
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update(&self, _state: &ProgressState) {}
}

/// Logs progress at debug level.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn update(&self, state: &ProgressState) {
        match state.percent() {
            Some(pct) => debug!(
                "{}: {}/{} bytes ({}%)",
                state.label,
                state.transferred_bytes,
                state.total_bytes.unwrap_or(0),
                pct
            ),
            None => debug!("{}: {} bytes", state.label, state.transferred_bytes),
        }
    }
}

/// Forwards each update over an unbounded channel to an external consumer.
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressState>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn update(&self, state: &ProgressState) {
        // A closed receiver just means nobody is watching anymore.
        let _ = self.tx.send(state.clone());
    }
}

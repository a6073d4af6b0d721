pub mod queue;

pub use queue::{JobOutcome, JobReport, TransferJob, TransferJobQueue};

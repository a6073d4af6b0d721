use std::future::Future;
use std::path::PathBuf;

use log::{error, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{FtpError, Result};
use crate::session::FtpSession;

/// One queued transfer. Consumed exactly once by the worker; `Stop` is the
/// sentinel that terminates it.
#[derive(Debug, Clone)]
pub enum TransferJob {
    UploadFile { local: PathBuf, remote: String },
    UploadFolder { local: PathBuf, remote: String },
    DownloadFile { remote: String, local: PathBuf },
    DownloadFolder { remote: String, local: PathBuf },
    Stop,
}

impl TransferJob {
    pub fn describe(&self) -> String {
        match self {
            TransferJob::UploadFile { local, remote } => {
                format!("upload {} -> {}", local.display(), remote)
            }
            TransferJob::UploadFolder { local, remote } => {
                format!("upload folder {} -> {}", local.display(), remote)
            }
            TransferJob::DownloadFile { remote, local } => {
                format!("download {} -> {}", remote, local.display())
            }
            TransferJob::DownloadFolder { remote, local } => {
                format!("download folder {} -> {}", remote, local.display())
            }
            TransferJob::Stop => "stop".to_string(),
        }
    }
}

/// How a job ended. `Rejected` is kept apart from `Failed` so a consumer can
/// tell "malware detected" from "network problem".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Rejected(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: String,
    pub outcome: JobOutcome,
}

/// Single background worker that serializes transfers against the one
/// control connection.
///
/// Enqueue never blocks and may be called from any task; the worker owns the
/// session and performs all socket and file I/O. Jobs run strictly in FIFO
/// order, one at a time, to completion; a failed job is reported and the
/// worker moves on to the next.
pub struct TransferJobQueue {
    tx: mpsc::UnboundedSender<TransferJob>,
    worker: JoinHandle<()>,
}

impl TransferJobQueue {
    /// Starts the worker over a connected, authenticated session.
    pub fn start(mut session: FtpSession) -> (Self, mpsc::UnboundedReceiver<JobReport>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<TransferJob>();
        let (report_tx, report_rx) = mpsc::unbounded_channel::<JobReport>();

        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if matches!(job, TransferJob::Stop) {
                    break;
                }
                let description = job.describe();
                info!("Starting job: {}", description);
                let outcome = match run_job(&mut session, job).await {
                    Ok(()) => JobOutcome::Completed,
                    Err(e) if e.is_security_rejection() => {
                        error!("Job rejected: {}: {}", description, e);
                        JobOutcome::Rejected(e.to_string())
                    }
                    Err(e) => {
                        error!("Job failed: {}: {}", description, e);
                        JobOutcome::Failed(e.to_string())
                    }
                };
                let _ = report_tx.send(JobReport {
                    job: description,
                    outcome,
                });
            }
            if let Err(e) = session.quit().await {
                error!("QUIT failed: {}", e);
            }
        });

        (Self { tx, worker }, report_rx)
    }

    /// Starts the worker with an arbitrary job handler. Used by tests to
    /// exercise the ordering guarantees without a live server.
    pub fn start_with<H, Fut>(mut handler: H) -> (Self, mpsc::UnboundedReceiver<JobReport>)
    where
        H: FnMut(TransferJob) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<TransferJob>();
        let (report_tx, report_rx) = mpsc::unbounded_channel::<JobReport>();

        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if matches!(job, TransferJob::Stop) {
                    break;
                }
                let description = job.describe();
                let outcome = match handler(job).await {
                    Ok(()) => JobOutcome::Completed,
                    Err(e) if e.is_security_rejection() => JobOutcome::Rejected(e.to_string()),
                    Err(e) => JobOutcome::Failed(e.to_string()),
                };
                let _ = report_tx.send(JobReport {
                    job: description,
                    outcome,
                });
            }
        });

        (Self { tx, worker }, report_rx)
    }

    /// Adds a job to the back of the queue. Never blocks.
    pub fn enqueue(&self, job: TransferJob) -> Result<()> {
        self.tx
            .send(job)
            .map_err(|_| FtpError::Transfer("transfer queue is closed".to_string()))
    }

    /// Asks the worker to finish the queued jobs and stop. No mid-transfer
    /// cancellation: an in-flight job always runs to completion.
    pub fn shutdown(&self) {
        let _ = self.tx.send(TransferJob::Stop);
    }

    /// Waits for the worker to exit.
    pub async fn join(self) {
        let _ = self.worker.await;
    }
}

async fn run_job(session: &mut FtpSession, job: TransferJob) -> Result<()> {
    match job {
        TransferJob::UploadFile { local, remote } => {
            session.put(&local, &remote).await.map(|_| ())
        }
        TransferJob::UploadFolder { local, remote } => session.put_folder(&local, &remote).await,
        TransferJob::DownloadFile { remote, local } => {
            session.get(&remote, &local).await.map(|_| ())
        }
        TransferJob::DownloadFolder { remote, local } => {
            session.get_folder(&remote, &local).await
        }
        TransferJob::Stop => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    fn job(name: &str) -> TransferJob {
        TransferJob::UploadFile {
            local: PathBuf::from(name),
            remote: name.to_string(),
        }
    }

    #[tokio::test]
    async fn runs_jobs_in_fifo_order_without_overlap() {
        let windows: Arc<Mutex<Vec<(String, Instant, Instant)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let windows_clone = Arc::clone(&windows);

        let (queue, mut reports) = TransferJobQueue::start_with(move |job| {
            let windows = Arc::clone(&windows_clone);
            async move {
                let started = Instant::now();
                tokio::time::sleep(Duration::from_millis(30)).await;
                windows
                    .lock()
                    .unwrap()
                    .push((job.describe(), started, Instant::now()));
                Ok(())
            }
        });

        queue.enqueue(job("one")).unwrap();
        queue.enqueue(job("two")).unwrap();
        queue.enqueue(job("three")).unwrap();
        queue.shutdown();
        queue.join().await;

        let windows = windows.lock().unwrap();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].0, "upload one -> one");
        assert_eq!(windows[1].0, "upload two -> two");
        assert_eq!(windows[2].0, "upload three -> three");
        // Execution windows must not overlap: each job starts after the
        // previous one finished.
        assert!(windows[0].2 <= windows[1].1);
        assert!(windows[1].2 <= windows[2].1);

        let mut order = Vec::new();
        while let Ok(report) = reports.try_recv() {
            order.push(report);
        }
        assert_eq!(order.len(), 3);
        assert!(order.iter().all(|r| r.outcome == JobOutcome::Completed));
    }

    #[tokio::test]
    async fn a_failed_job_does_not_stop_the_worker() {
        let (queue, mut reports) = TransferJobQueue::start_with(|job| async move {
            if job.describe().contains("bad") {
                Err(FtpError::Transfer("boom".to_string()))
            } else {
                Ok(())
            }
        });

        queue.enqueue(job("bad")).unwrap();
        queue.enqueue(job("good")).unwrap();
        queue.shutdown();
        queue.join().await;

        let first = reports.try_recv().unwrap();
        let second = reports.try_recv().unwrap();
        assert!(matches!(first.outcome, JobOutcome::Failed(_)));
        assert_eq!(second.outcome, JobOutcome::Completed);
    }

    #[tokio::test]
    async fn security_rejection_is_reported_distinctly() {
        let (queue, mut reports) = TransferJobQueue::start_with(|_| async {
            Err(FtpError::SecurityRejection("INFECTED verdict".to_string()))
        });

        queue.enqueue(job("evil")).unwrap();
        queue.shutdown();
        queue.join().await;

        let report = reports.try_recv().unwrap();
        assert!(matches!(report.outcome, JobOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn enqueue_after_worker_stop_fails() {
        let (queue, _reports) = TransferJobQueue::start_with(|_| async { Ok(()) });
        queue.shutdown();
        // Once the worker has exited, the job channel is closed.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(queue.enqueue(job("late")).is_err());
    }
}

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use shared_models::notification::{deliver, NotificationPort, Recipient};

use crate::error::DispatchError;
use crate::models::{NotificationJob, WorkerConfig};
use crate::services::recipients::ParticipantResolver;

/// Producer side of the notification queue. Cheap to clone; submission never waits.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<NotificationJob>,
}

/// Handle on the workers draining the queue.
pub struct NotificationWorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl NotificationDispatcher {
    /// Opens a bounded queue and spawns `config.workers` tasks draining it.
    pub fn start(
        config: &WorkerConfig,
        port: Arc<dyn NotificationPort>,
        resolver: Arc<ParticipantResolver>,
    ) -> (Self, NotificationWorkerPool) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..config.workers.max(1))
            .map(|i| {
                let worker = NotificationWorker {
                    name: format!("notification-worker-{}", i),
                    receiver: Arc::clone(&receiver),
                    shutdown: shutdown_rx.clone(),
                    port: Arc::clone(&port),
                    resolver: Arc::clone(&resolver),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        info!(
            "Started {} notification worker(s), queue capacity {}",
            config.workers.max(1),
            config.queue_capacity.max(1)
        );
        (Self { sender }, NotificationWorkerPool { shutdown, handles })
    }

    /// Enqueues a job. A full or closed queue drops the job and reports why.
    pub fn submit(&self, job: NotificationJob) -> Result<(), DispatchError> {
        let job_id = job.job_id;
        let kind = job.kind;

        match self.sender.try_send(job) {
            Ok(()) => {
                debug!("Queued {} notification {}", kind, job_id);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Notification queue full, dropping {} notification {}", kind, job_id);
                Err(DispatchError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Notification queue closed, dropping {} notification {}", kind, job_id);
                Err(DispatchError::QueueClosed)
            }
        }
    }
}

impl NotificationWorkerPool {
    /// Closes the queue, lets the workers drain what is already queued, and waits for them.
    pub async fn shutdown(self) {
        info!("Shutting down notification workers");
        let _ = self.shutdown.send(true);

        for result in futures::future::join_all(self.handles).await {
            if let Err(e) = result {
                error!("Notification worker ended abnormally: {}", e);
            }
        }
        info!("Notification workers stopped");
    }
}

struct NotificationWorker {
    name: String,
    receiver: Arc<Mutex<mpsc::Receiver<NotificationJob>>>,
    shutdown: watch::Receiver<bool>,
    port: Arc<dyn NotificationPort>,
    resolver: Arc<ParticipantResolver>,
}

impl NotificationWorker {
    async fn run(mut self) {
        debug!("Worker loop started: {}", self.name);

        while let Some(job) = self.next_job().await {
            if let Err(e) = self.process(&job).await {
                warn!(
                    "Worker {} could not deliver {} notification {}: {}",
                    self.name, job.kind, job.job_id, e
                );
            }
        }

        debug!("Worker loop ended: {}", self.name);
    }

    /// The next queued job, or `None` once shutdown was requested and the queue is empty.
    async fn next_job(&mut self) -> Option<NotificationJob> {
        let mut receiver = self.receiver.lock().await;

        if *self.shutdown.borrow() {
            receiver.close();
            return receiver.try_recv().ok();
        }

        tokio::select! {
            job = receiver.recv() => job,
            _ = self.shutdown.changed() => {
                receiver.close();
                receiver.try_recv().ok()
            }
        }
    }

    #[instrument(skip(self, job), fields(job_id = %job.job_id, kind = %job.kind))]
    async fn process(&self, job: &NotificationJob) -> Result<(), DispatchError> {
        let participants = self
            .resolver
            .resolve(&job.appointment, job.detail.clone())
            .await?;

        let mut recipients: Vec<&Recipient> = Vec::with_capacity(2);
        if job.audience.includes_patient() {
            recipients.push(&participants.patient);
        }
        if job.audience.includes_doctor() {
            recipients.push(&participants.doctor);
        }

        let mut first_failure = None;
        for recipient in recipients {
            if let Err(e) = deliver(self.port.as_ref(), job.kind, recipient, &participants.notice).await {
                warn!("Failed to send {} to {}: {}", job.kind, recipient.email, e);
                first_failure.get_or_insert(e);
            }
        }

        match first_failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

//! Certificate delivery by e-mail.
//!
//! Delivery is a capability behind [`EmailSender`]. The shipped [`LogMailer`]
//! only logs what would be sent. Deliveries run as a background job tracked
//! by the job controller so the generation request returns immediately.

use async_trait::async_trait;
use common::jobs::JobStatus;
use std::sync::Arc;

use crate::job_controller::state::JobsState;
use crate::storage::ObjectStore;

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Returns whether the message was accepted for delivery.
    async fn send(&self, to: &str, attachment: &[u8], filename: &str) -> bool;
}

pub struct LogMailer;

#[async_trait]
impl EmailSender for LogMailer {
    async fn send(&self, to: &str, attachment: &[u8], filename: &str) -> bool {
        log::info!(
            "e-mail to {} with {} ({} bytes) logged, not sent",
            to,
            filename,
            attachment.len()
        );
        true
    }
}

/// One certificate to mail.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub to: String,
    pub full_name: String,
    pub object_key: String,
}

/// Spawns the delivery job and returns its id. Deliveries without an address
/// are skipped and not counted. The job fails when nothing could be sent.
pub async fn schedule_email_job(
    jobs: JobsState,
    objects: Arc<dyn ObjectStore>,
    mailer: Arc<dyn EmailSender>,
    deliveries: Vec<Delivery>,
) -> String {
    let job_id = jobs.register().await;
    let id = job_id.clone();

    tokio::spawn(async move {
        let deliveries: Vec<Delivery> = deliveries
            .into_iter()
            .filter(|d| !d.to.trim().is_empty())
            .collect();
        let total = deliveries.len();
        jobs.report(&id, JobStatus::InProgress(0)).await;

        let mut sent = 0usize;
        for (i, delivery) in deliveries.iter().enumerate() {
            match objects.get(&delivery.object_key).await {
                Ok(Some(pdf)) => {
                    let filename = delivery
                        .object_key
                        .rsplit('/')
                        .next()
                        .unwrap_or(&delivery.object_key);
                    if mailer.send(&delivery.to, &pdf, filename).await {
                        sent += 1;
                    } else {
                        log::warn!("mailer rejected certificate for {}", delivery.full_name);
                    }
                }
                Ok(None) => log::warn!(
                    "certificate {} for {} is gone, not mailed",
                    delivery.object_key,
                    delivery.full_name
                ),
                Err(e) => log::error!("cannot read {}: {}", delivery.object_key, e),
            }
            let progress = ((i + 1) as f32 / total as f32 * 100.0) as u32;
            jobs.report(&id, JobStatus::InProgress(progress)).await;
        }

        log::info!("e-mail job {} finished: sent {} of {}", id, sent, total);
        let summary = format!("sent {sent} of {total}");
        let status = if total > 0 && sent == 0 {
            JobStatus::Failed(summary)
        } else {
            JobStatus::Completed(summary)
        };
        jobs.report(&id, status).await;
    });

    job_id
}

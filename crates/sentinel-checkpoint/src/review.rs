use sentinel_core::{Modality, ReviewId, SessionId, StationId, Subject, Tier, Timestamp, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

use crate::error::{CheckpointError, CheckpointResult};

/// A session waiting for an operator, as shown on the review screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReview {
    pub review_id: ReviewId,
    pub session_id: SessionId,
    pub station_id: StationId,
    pub subject: Subject,
    pub tier: Tier,
    pub modality: Modality,
    pub enqueued_at: Timestamp,
}

struct QueueEntry {
    review: PendingReview,
    order: u64,
    reply: oneshot::Sender<Verdict>,
}

// ---------------------------------------------------------------------------
// ReviewQueue — pending sessions from every station, consumable by any operator
// ---------------------------------------------------------------------------

/// Work queue of sessions in `AwaitingManualReview`.
///
/// Each entry owns the sending half of the channel its station is waiting
/// on. Resolving sends the verdict; removing drops the sender, which the
/// waiting [`PendingScan`] observes as a cancellation.
#[derive(Default)]
pub struct ReviewQueue {
    inner: Mutex<QueueInner>,
}

#[derive(Default)]
struct QueueInner {
    entries: HashMap<ReviewId, QueueEntry>,
    next_order: u64,
}

impl ReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CheckpointResult<MutexGuard<'_, QueueInner>> {
        self.inner
            .lock()
            .map_err(|e| CheckpointError::Internal(format!("review queue lock poisoned: {}", e)))
    }

    /// Add a review and return the handle the station waits on.
    pub(crate) fn enqueue(&self, review: PendingReview) -> CheckpointResult<PendingScan> {
        let (reply, receiver) = oneshot::channel();
        let mut inner = self.lock()?;
        inner.next_order += 1;
        let order = inner.next_order;
        inner.entries.insert(
            review.review_id.clone(),
            QueueEntry {
                review: review.clone(),
                order,
                reply,
            },
        );
        Ok(PendingScan { review, receiver })
    }

    /// Pending reviews, oldest first.
    pub fn list(&self) -> CheckpointResult<Vec<PendingReview>> {
        let inner = self.lock()?;
        let mut entries: Vec<&QueueEntry> = inner.entries.values().collect();
        entries.sort_by_key(|e| e.order);
        Ok(entries.into_iter().map(|e| e.review.clone()).collect())
    }

    pub fn get(&self, review_id: &ReviewId) -> CheckpointResult<Option<PendingReview>> {
        Ok(self
            .lock()?
            .entries
            .get(review_id)
            .map(|e| e.review.clone()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `apply` against a pending review and, only if it succeeds, remove
    /// the review and deliver the verdict to the waiting station.
    ///
    /// The queue lock is held across `apply`, so two operators cannot
    /// resolve the same review and a failed write leaves it pending.
    pub(crate) fn resolve_with<F>(
        &self,
        review_id: &ReviewId,
        apply: F,
    ) -> CheckpointResult<(PendingReview, Verdict)>
    where
        F: FnOnce(&PendingReview) -> CheckpointResult<Verdict>,
    {
        let mut inner = self.lock()?;
        let review = inner
            .entries
            .get(review_id)
            .map(|e| e.review.clone())
            .ok_or_else(|| CheckpointError::ReviewNotFound(review_id.to_string()))?;

        let verdict = apply(&review)?;

        if let Some(entry) = inner.entries.remove(review_id) {
            if entry.reply.send(verdict.clone()).is_err() {
                tracing::debug!(
                    review = %review_id,
                    "station stopped waiting before the review was resolved"
                );
            }
        }
        Ok((review, verdict))
    }

    /// Drop a pending review without resolving it.
    pub(crate) fn remove(&self, review_id: &ReviewId) -> CheckpointResult<Option<PendingReview>> {
        Ok(self
            .lock()?
            .entries
            .remove(review_id)
            .map(|e| e.review))
    }
}

// ---------------------------------------------------------------------------
// PendingScan — the station's side of a suspended session
// ---------------------------------------------------------------------------

/// Handle returned to the station when its scan needs manual review.
#[derive(Debug)]
pub struct PendingScan {
    review: PendingReview,
    receiver: oneshot::Receiver<Verdict>,
}

impl PendingScan {
    pub fn review(&self) -> &PendingReview {
        &self.review
    }

    pub fn review_id(&self) -> &ReviewId {
        &self.review.review_id
    }

    /// Wait for the operator's decision.
    ///
    /// Resolves to `SessionCancelled` if the review is discarded instead.
    pub async fn wait(self) -> CheckpointResult<Verdict> {
        self.receiver
            .await
            .map_err(|_| CheckpointError::SessionCancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(n: u32) -> PendingReview {
        PendingReview {
            review_id: ReviewId::new(format!("REV-{}", n)),
            session_id: SessionId::new(format!("SES-{}", n)),
            station_id: StationId::new(format!("gate-{}", n)),
            subject: Subject::guest(format!("S{}", n), "Visitor"),
            tier: Tier::Red1,
            modality: Modality::Qr,
            enqueued_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn test_resolve_delivers_verdict() {
        let queue = ReviewQueue::new();
        let pending = queue.enqueue(review(1)).unwrap();
        assert_eq!(queue.len(), 1);

        let (resolved, verdict) = queue
            .resolve_with(pending.review_id(), |_| Ok(Verdict::allow("ok")))
            .unwrap();
        assert!(verdict.is_allow());
        assert_eq!(resolved.station_id.as_str(), "gate-1");
        assert!(queue.is_empty());
        assert_eq!(pending.wait().await.unwrap(), Verdict::allow("ok"));
    }

    #[tokio::test]
    async fn test_failed_apply_keeps_review_pending() {
        let queue = ReviewQueue::new();
        let pending = queue.enqueue(review(1)).unwrap();
        let id = pending.review_id().clone();

        let err = queue
            .resolve_with(&id, |_| {
                Err(CheckpointError::Persistence("grant store offline".into()))
            })
            .unwrap_err();
        assert!(matches!(err, CheckpointError::Persistence(_)));
        assert!(queue.get(&id).unwrap().is_some());

        queue
            .resolve_with(&id, |_| Ok(Verdict::deny("refused")))
            .unwrap();
        assert!(pending.wait().await.unwrap().is_deny());
    }

    #[tokio::test]
    async fn test_remove_cancels_waiter() {
        let queue = ReviewQueue::new();
        let pending = queue.enqueue(review(1)).unwrap();
        let removed = queue.remove(pending.review_id()).unwrap();
        assert!(removed.is_some());
        assert!(matches!(
            pending.wait().await,
            Err(CheckpointError::SessionCancelled)
        ));
    }

    #[test]
    fn test_resolve_unknown_review() {
        let queue = ReviewQueue::new();
        let err = queue
            .resolve_with(&ReviewId::new("REV-404"), |_| Ok(Verdict::allow("x")))
            .unwrap_err();
        assert!(matches!(err, CheckpointError::ReviewNotFound(_)));
    }

    #[test]
    fn test_list_is_oldest_first() {
        let queue = ReviewQueue::new();
        let mut handles = Vec::new();
        for n in [3, 1, 12, 2] {
            handles.push(queue.enqueue(review(n)).unwrap());
        }
        let ids: Vec<String> = queue
            .list()
            .unwrap()
            .into_iter()
            .map(|r| r.review_id.to_string())
            .collect();
        assert_eq!(ids, vec!["REV-3", "REV-1", "REV-12", "REV-2"]);
    }

    #[test]
    fn test_resolving_after_waiter_dropped_still_succeeds() {
        let queue = ReviewQueue::new();
        let pending = queue.enqueue(review(1)).unwrap();
        let id = pending.review_id().clone();
        drop(pending);
        assert!(queue
            .resolve_with(&id, |_| Ok(Verdict::allow("ok")))
            .is_ok());
    }
}

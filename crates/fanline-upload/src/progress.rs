//! Submission progress reporting.
//!
//! Progress flows through a `watch` channel as a lazy, finite sequence of
//! [`SubmissionUpdate`] snapshots: the saga and uploader publish, the
//! surrounding UI holds the receiver. The sink enforces that the overall
//! percentage never decreases across the whole saga, not just within one
//! file, and callers may publish with `0.0` to keep the current value while
//! changing phase or message.

use tokio::sync::watch;

use fanline_core::models::{SubmissionPhase, SubmissionUpdate};

#[derive(Clone)]
pub struct ProgressSink {
    tx: watch::Sender<SubmissionUpdate>,
}

impl ProgressSink {
    pub fn channel() -> (Self, watch::Receiver<SubmissionUpdate>) {
        let (tx, rx) = watch::channel(SubmissionUpdate::default());
        (Self { tx }, rx)
    }

    /// Publish a snapshot. The overall percentage is clamped to the
    /// non-decreasing range [last, 100].
    pub fn update(
        &self,
        phase: SubmissionPhase,
        overall_progress: f32,
        message: impl Into<String>,
    ) {
        let message = message.into();
        self.tx.send_modify(|current| {
            let floor = current.overall_progress;
            *current = SubmissionUpdate {
                phase,
                overall_progress: overall_progress.clamp(floor, 100.0),
                message,
            };
        });
    }

    /// Latest published snapshot.
    pub fn last(&self) -> SubmissionUpdate {
        self.tx.borrow().clone()
    }
}

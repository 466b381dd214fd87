//! Progress reporting surface.

use tokio::sync::mpsc;

use crate::domain::result::Progress;

/// Receives a [`Progress`] update each time a row settles.
///
/// Called from the runner's own loop only, so updates arrive in order and
/// `completed` strictly increases.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: Progress);
}

impl<F> ProgressSink for F
where
    F: Fn(Progress) + Send + Sync,
{
    fn on_progress(&self, progress: Progress) {
        self(progress)
    }
}

impl ProgressSink for mpsc::UnboundedSender<Progress> {
    fn on_progress(&self, progress: Progress) {
        // A dropped receiver just means nobody is watching
        let _ = self.send(progress);
    }
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _progress: Progress) {}
}

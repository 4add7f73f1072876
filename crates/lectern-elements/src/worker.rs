//! Background task bookkeeping shared by the elements.

use std::time::Duration;

use lectern_core::ElementChannels;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Owns the cancellation token of an element's background task.
///
/// Dropping the handle stops the task, so an element discarded without
/// `deactivate` does not leak its worker.
#[derive(Debug, Default)]
pub(crate) struct WorkerHandle {
    token: Option<CancellationToken>,
}

impl WorkerHandle {
    /// Issue a fresh token, cancelling any previous one.
    pub(crate) fn start(&mut self) -> CancellationToken {
        self.stop();
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        token
    }

    /// Cancel the running task, if any.
    pub(crate) fn stop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.is_cancelled())
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Interval whose first tick fires one full `period` from now.
pub(crate) fn interval_after(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Discard all input until cancelled, keeping the output senders alive.
pub(crate) fn spawn_discard(channels: ElementChannels, token: CancellationToken, element: &'static str) {
    let ElementChannels {
        admin_html,
        user_html,
        mut admin_input,
        mut user_input,
    } = channels;
    drop(tokio::spawn(async move {
        let _keep = (admin_html, user_html);
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                Some(_) = admin_input.recv() => {}
                Some(_) = user_input.recv() => {}
                else => break,
            }
        }
        tracing::debug!(element, "element worker stopped");
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_cancels_issued_token() {
        let mut handle = WorkerHandle::default();
        let token = handle.start();
        assert!(handle.is_running());
        handle.stop();
        assert!(token.is_cancelled());
        assert!(!handle.is_running());
    }

    #[test]
    fn restart_cancels_previous_token() {
        let mut handle = WorkerHandle::default();
        let first = handle.start();
        let second = handle.start();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn drop_cancels_token() {
        let mut handle = WorkerHandle::default();
        let token = handle.start();
        drop(handle);
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn interval_after_skips_immediate_tick() {
        let start = Instant::now();
        let mut interval = interval_after(Duration::from_secs(5));
        let _ = interval.tick().await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn discard_worker_keeps_outputs_open_until_cancelled() {
        let (channels, mut ports) = ElementChannels::pair(4);
        let token = CancellationToken::new();
        spawn_discard(channels, token.clone(), "Test");

        ports.user_input.send("ignored".into()).await.unwrap();
        tokio::task::yield_now().await;
        assert!(ports.admin_html.try_recv().is_err());

        token.cancel();
        assert!(ports.admin_html.recv().await.is_none());
        assert!(ports.user_html.recv().await.is_none());
    }
}

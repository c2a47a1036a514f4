use crate::session::{SessionEnd, Transaction};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ServerMetrics {
    sessions_opened: AtomicU64,
    requests_total: AtomicU64,
    responses_ok: AtomicU64,
    exceptions_sent: AtomicU64,
    frame_errors: AtomicU64,
    idle_timeouts: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerMetricsSnapshot {
    pub sessions_opened: u64,
    pub requests_total: u64,
    pub responses_ok: u64,
    pub exceptions_sent: u64,
    pub frame_errors: u64,
    pub idle_timeouts: u64,
}

impl ServerMetrics {
    pub fn snapshot(&self) -> ServerMetricsSnapshot {
        ServerMetricsSnapshot {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            requests_total: self.requests_total.load(Ordering::Relaxed),
            responses_ok: self.responses_ok.load(Ordering::Relaxed),
            exceptions_sent: self.exceptions_sent.load(Ordering::Relaxed),
            frame_errors: self.frame_errors.load(Ordering::Relaxed),
            idle_timeouts: self.idle_timeouts.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction(&self, transaction: &Transaction) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if transaction.exception.is_some() {
            self.exceptions_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.responses_ok.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_session_end(&self, end: &SessionEnd) {
        match end {
            SessionEnd::PeerClosed => {}
            SessionEnd::IdleTimeout => {
                self.idle_timeouts.fetch_add(1, Ordering::Relaxed);
            }
            SessionEnd::Frame(_) => {
                self.frame_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

//! Mailbox monitoring for the session actor.
//!
//! Thresholds scale with the configured mailbox capacity:
//!
//! | Level    | Backlog                    |
//! |----------|----------------------------|
//! | Normal   | up to 20% of capacity      |
//! | Warning  | 20% to 80% of capacity     |
//! | Critical | above 80% of capacity      |

use crate::observability;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    /// Below normal threshold.
    Normal,
    /// Between normal and warning thresholds.
    Warning,
    /// Above warning threshold.
    Critical,
}

/// Tracks the session actor's backlog and emits the depth gauge.
#[derive(Debug)]
pub struct MailboxMonitor {
    session_id: String,
    normal_threshold: usize,
    warning_threshold: usize,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    /// Create a monitor for a mailbox of the given capacity.
    #[must_use]
    pub fn new(session_id: impl Into<String>, capacity: usize) -> Self {
        Self {
            session_id: session_id.into(),
            normal_threshold: capacity / 5,
            warning_threshold: capacity.saturating_mul(4) / 5,
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record the backlog observed when a message is taken off the mailbox
    /// (including that message).
    pub fn record_backlog(&self, backlog: usize) {
        let previous = self.depth.swap(backlog, Ordering::Relaxed);
        self.peak_depth.fetch_max(backlog, Ordering::Relaxed);
        observability::update_mailbox_depth(previous, backlog);

        match self.level_for_depth(backlog) {
            MailboxLevel::Critical => {
                warn!(
                    target: "session.actor",
                    session_id = %self.session_id,
                    depth = backlog,
                    threshold = self.warning_threshold,
                    "Mailbox depth critical"
                );
            }
            // Log once when crossing into warning
            MailboxLevel::Warning if previous <= self.normal_threshold => {
                debug!(
                    target: "session.actor",
                    session_id = %self.session_id,
                    depth = backlog,
                    "Mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// Record a message as processed.
    pub fn record_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Last observed backlog.
    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Highest observed backlog.
    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    /// Total messages processed.
    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    /// Level of the last observed backlog.
    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        self.level_for_depth(self.current_depth())
    }

    fn level_for_depth(&self, depth: usize) -> MailboxLevel {
        if depth > self.warning_threshold {
            MailboxLevel::Critical
        } else if depth > self.normal_threshold {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

impl Drop for MailboxMonitor {
    fn drop(&mut self) {
        observability::update_mailbox_depth(self.depth.load(Ordering::Relaxed), 0);
    }
}

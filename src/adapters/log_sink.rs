//! Log-based notification adapter.
//!
//! Implements [`NotificationSink`] by writing operator notices to the
//! `log` facade.  A UI bridge would implement the same trait and show
//! them as toasts.

use log::{error, info, warn};

use crate::app::events::{Notice, NoticeLevel};
use crate::app::ports::NotificationSink;

/// Adapter that logs every [`Notice`] to the console.
#[derive(Debug, Default)]
pub struct LogNotifier {
    emitted: usize,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of notices emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

impl NotificationSink for LogNotifier {
    fn notify(&mut self, notice: &Notice) {
        self.emitted += 1;
        match notice.level {
            NoticeLevel::Info => info!("NOTICE | {}", notice.message),
            NoticeLevel::Success => info!("NOTICE | ok | {}", notice.message),
            NoticeLevel::Warning => warn!("NOTICE | {}", notice.message),
            NoticeLevel::Error => error!("NOTICE | {}", notice.message),
        }
    }
}

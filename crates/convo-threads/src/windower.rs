//! Conversation windowing: grouping a room's message stream into
//! gap-delimited windows.
//!
//! Windowing is a single linear pass. A new window opens when the gap to
//! the previous message exceeds the gap threshold, when the window's span
//! would exceed the maximum duration, or when the window is full. Windows
//! below the minimum size are dropped, not retried; their messages remain
//! unthreaded and are re-windowed on a later pass.

use std::sync::Arc;

use tracing::debug;

use convo_storage::Storage;
use convo_types::{ConversationWindow, Message, WindowingConfig};

use crate::error::ThreadsError;

/// Groups eligible messages into conversation windows.
pub struct ConversationWindower {
    storage: Arc<Storage>,
    config: WindowingConfig,
}

impl ConversationWindower {
    pub fn new(storage: Arc<Storage>, config: WindowingConfig) -> Self {
        Self { storage, config }
    }

    /// Fetch a room's eligible messages in timestamp order, optionally
    /// bounded by source time.
    pub fn eligible_messages(
        &self,
        room_id: &str,
        since_ms: Option<i64>,
        until_ms: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, ThreadsError> {
        let messages = self
            .storage
            .messages_in_room(room_id, since_ms, until_ms, limit)?;
        Ok(messages.into_iter().filter(Message::is_eligible).collect())
    }

    /// Window a room's not-yet-threaded messages, capped to `limit`
    /// windows.
    ///
    /// Restricting the input to thread-less messages makes threading
    /// idempotent: reprocessing never revisits messages a prior pass
    /// already assigned.
    pub fn unprocessed_windows(
        &self,
        room_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationWindow>, ThreadsError> {
        // Over-fetch relative to the window cap so full windows can form
        let fetch = limit.saturating_mul(50).min(self.config.fetch_limit * 10);
        let messages = self.storage.unthreaded_messages(room_id, fetch.max(self.config.fetch_limit))?;

        let mut windows = window_messages(messages, &self.config);
        windows.truncate(limit);

        debug!(
            room_id = %room_id,
            windows = windows.len(),
            "produced unprocessed windows"
        );
        Ok(windows)
    }
}

/// Group messages into windows with a single linear pass.
///
/// Input must be in timestamp order; ineligible messages (system-authored
/// or blank) are skipped. Windows smaller than `config.min_messages` are
/// dropped.
pub fn window_messages(
    messages: Vec<Message>,
    config: &WindowingConfig,
) -> Vec<ConversationWindow> {
    let mut windows = Vec::new();
    let mut current: Option<ConversationWindow> = None;

    for message in messages {
        if !message.is_eligible() {
            continue;
        }

        let boundary = match &current {
            None => false,
            Some(window) => {
                let gap_ms = message.timestamp.timestamp_millis()
                    - window.last_message_at.timestamp_millis();
                let span_ms = message.timestamp.timestamp_millis()
                    - window.first_message_at.timestamp_millis();

                gap_ms > config.gap_ms
                    || span_ms > config.max_duration_ms
                    || window.len() >= config.max_messages
            }
        };

        if boundary {
            if let Some(finished) = current.take() {
                if finished.len() >= config.min_messages {
                    windows.push(finished);
                }
            }
        }

        match current.as_mut() {
            Some(window) => window.push(message),
            None => current = Some(ConversationWindow::open(message)),
        }
    }

    if let Some(window) = current {
        if window.len() >= config.min_messages {
            windows.push(window);
        }
    }

    windows
}

//! Debounced per-room thread processing.
//!
//! Message ingestion calls [`ThreadOrchestrator::queue_processing`] and
//! returns immediately; the windowing and analysis work happens on the
//! debounce tick. Each room is an independent unit of work.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use convo_storage::Storage;
use convo_threads::{ConversationWindower, ThreadAnalyzer, ThreadStorage};
use convo_types::{BackfillConfig, ConversationWindow, DistillConfig, SchedulingConfig};

use crate::debounce::DebounceScheduler;
use crate::error::OrchestratorError;

/// Drives windowing, analysis, and thread persistence per room.
pub struct ThreadOrchestrator {
    storage: Arc<Storage>,
    windower: ConversationWindower,
    analyzer: ThreadAnalyzer,
    threads: ThreadStorage,
    scheduler: DebounceScheduler,
    scheduling: SchedulingConfig,
    backfill: BackfillConfig,
}

impl ThreadOrchestrator {
    pub fn new(storage: Arc<Storage>, analyzer: ThreadAnalyzer, config: &DistillConfig) -> Self {
        Self {
            windower: ConversationWindower::new(storage.clone(), config.windowing.clone()),
            threads: ThreadStorage::new(storage.clone()),
            scheduler: DebounceScheduler::new(Duration::from_millis(
                config.scheduling.thread_debounce_ms,
            )),
            analyzer,
            scheduling: config.scheduling.clone(),
            backfill: config.backfill.clone(),
            storage,
        }
    }

    /// The scheduler, exposed for tests and diagnostics.
    pub fn scheduler(&self) -> &DebounceScheduler {
        &self.scheduler
    }

    /// Debounce a processing pass for a room. Returns immediately;
    /// repeated calls within the window coalesce into one pass.
    pub fn queue_processing(self: &Arc<Self>, room_id: &str) {
        let this = self.clone();
        let room = room_id.to_string();
        self.scheduler.trigger(room_id, async move {
            if let Err(e) = this.process_room(&room).await {
                warn!(room_id = %room, error = %e, "room processing pass failed");
            }
        });
    }

    /// Run one processing pass: analyze and persist up to the per-pass
    /// cap of unprocessed windows. Returns the number of threads
    /// created.
    ///
    /// No-ops when the completion service is unavailable rather than
    /// burning windows on fallback-quality threads.
    pub async fn process_room(&self, room_id: &str) -> Result<usize, OrchestratorError> {
        if !self.analyzer.is_available() {
            debug!(room_id = %room_id, "completion service unavailable, skipping pass");
            return Ok(0);
        }

        let windows = self
            .windower
            .unprocessed_windows(room_id, self.scheduling.windows_per_pass)?;
        if windows.is_empty() {
            return Ok(0);
        }

        let mut created = 0;
        for window in &windows {
            match self.process_window(window).await {
                Ok(()) => created += 1,
                Err(e) => {
                    // The batch rolled back; the window stays eligible
                    warn!(room_id = %room_id, error = %e, "window persistence failed");
                }
            }
        }

        info!(room_id = %room_id, threads = created, windows = windows.len(), "processing pass complete");
        Ok(created)
    }

    /// Historical catch-up: process a room's backlog in fixed-size
    /// batches with an inter-batch delay, the subsystem's one explicit
    /// throughput cap. Returns the number of threads created.
    pub async fn backfill_room(&self, room_id: &str) -> Result<usize, OrchestratorError> {
        let windows = self
            .windower
            .unprocessed_windows(room_id, self.backfill.limit)?;
        info!(room_id = %room_id, windows = windows.len(), "starting backfill");

        let mut created = 0;
        for (i, batch) in windows.chunks(self.backfill.batch_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(self.backfill.batch_delay_ms)).await;
            }

            for window in batch {
                // Live processing may have threaded this window mid-run
                if self.already_threaded(window)? {
                    debug!(room_id = %room_id, "skipping already-threaded window");
                    continue;
                }
                match self.process_window(window).await {
                    Ok(()) => created += 1,
                    Err(e) => {
                        warn!(room_id = %room_id, error = %e, "backfill window failed");
                    }
                }
            }
        }

        info!(room_id = %room_id, threads = created, "backfill complete");
        Ok(created)
    }

    async fn process_window(&self, window: &ConversationWindow) -> Result<(), OrchestratorError> {
        let analysis = self.analyzer.analyze_window(window).await;
        self.threads.create_thread(window, &analysis)?;
        Ok(())
    }

    /// Whether any of the window's messages already belong to a thread.
    fn already_threaded(&self, window: &ConversationWindow) -> Result<bool, OrchestratorError> {
        for id in &window.message_ids {
            if let Some(message) = self.storage.get_message(id)? {
                if message.thread_id.is_some() {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

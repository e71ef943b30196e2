//! Engine lifecycle: starting the background evictor.

use std::sync::Arc;

use tracing::info;

use crate::evictor::BackgroundEvictor;

use super::CacheEngine;

impl CacheEngine {
    /// Spawn the periodic overflow sweep on the current tokio runtime.
    ///
    /// Returns `None` when `background_evictor` is off in the config. The
    /// task runs until [`BackgroundEvictor::shutdown`] is called or the
    /// handle is dropped.
    #[tracing::instrument(skip(self))]
    pub fn start_background_evictor(self: &Arc<Self>) -> Option<BackgroundEvictor> {
        if !self.config.background_evictor {
            info!("Background evictor disabled");
            return None;
        }
        let period = self.config.evictor_interval();
        info!(period_ms = period.as_millis() as u64, "Starting background evictor");
        Some(BackgroundEvictor::spawn(Arc::clone(self), period))
    }
}

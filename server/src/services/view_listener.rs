use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Drives boundary sync from settled view changes, one notification at a time.
pub async fn run(state: AppState) {
    let mut rx = state.viewport.subscribe();
    info!("view listener started");

    loop {
        let snapshot = match rx.recv().await {
            Ok(snapshot) => snapshot,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "view listener lagged; syncing to the latest view");
                state.viewport.current()
            }
            Err(RecvError::Closed) => break,
        };

        let started = state.boundaries.on_viewport_changed(snapshot.view);
        if !started.is_empty() {
            debug!(
                version = snapshot.version,
                layers = started.len(),
                "boundary sync dispatched"
            );
        }
    }

    info!("view listener stopped");
}

//! Concurrent dispatch of eligible encoders and candidate scoring.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::OptimizeError;
use crate::optimize::{util, ImageOptimizer, OptimizeParams, OptimizedImage, ORIGINAL};

type Outcome = Result<Option<OptimizedImage>, OptimizeError>;

/// Race the eligible adapters and return the smallest candidate.
///
/// Every adapter runs on its own task and reports exactly one outcome into
/// a channel sized to the worker count, so no worker ever blocks on send.
/// Adapter errors are logged and swallowed; the original is always in the
/// ranking, so the caller gets a servable result unless the request is
/// cancelled. Losing produced candidates are deleted before returning; the
/// winner's file is surrendered to the caller.
pub(crate) async fn dispatch(
    original: OptimizedImage,
    optimizers: Vec<Arc<dyn ImageOptimizer>>,
    params: &OptimizeParams,
    cancel: CancellationToken,
) -> Result<OptimizedImage, OptimizeError> {
    debug_assert!(!optimizers.is_empty());

    let (tx, mut rx) = mpsc::channel::<Outcome>(optimizers.len());
    let mut workers = Vec::with_capacity(optimizers.len());
    for optimizer in optimizers {
        let tx = tx.clone();
        let source = params.source_path.clone();
        let hidpi = params.hidpi;
        let cancel = cancel.clone();
        workers.push(tokio::spawn(async move {
            // Each worker watches the token itself: dropping the optimize
            // future kills any in-flight encoder child (kill-on-drop), even
            // when the dispatcher is already gone.
            tokio::select! {
                _ = cancel.cancelled() => {}
                outcome = optimizer.optimize(&source, hidpi) => {
                    let _ = tx.send(outcome).await;
                }
            }
        }));
    }
    drop(tx);

    let mut candidates = vec![original];
    let mut pending = workers.len();
    while pending > 0 {
        tokio::select! {
            _ = cancel.cancelled() => {
                // Aborting a worker drops its in-flight child process,
                // which is spawned kill-on-drop. Partial temp files are
                // left to the sweep.
                for worker in &workers {
                    worker.abort();
                }
                return Err(OptimizeError::Cancelled);
            }
            outcome = rx.recv() => {
                match outcome {
                    Some(Ok(Some(candidate))) => candidates.push(candidate),
                    Some(Ok(None)) => {}
                    Some(Err(e)) => tracing::warn!(%e, "optimizer failed"),
                    None => break,
                }
                pending -= 1;
            }
        }
    }

    // Stable by construction: equal sizes keep their arrival order, with
    // the original always first in line.
    candidates.sort_by_key(|c| c.size);
    for candidate in &candidates {
        tracing::debug!(
            optimizer = %candidate.optimizer,
            size = candidate.size,
            mime_type = %candidate.mime_type,
            "candidate"
        );
    }

    let chosen = candidates.remove(0);
    for loser in &candidates {
        if loser.optimizer != ORIGINAL {
            util::remove_quiet(&loser.path).await;
        }
    }
    Ok(chosen)
}

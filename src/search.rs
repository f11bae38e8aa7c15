use std::sync::Arc;
use std::thread;

use tracing::{debug, trace, warn};

use crate::engine::RecognitionEngine;
use crate::error::{EngineError, ErrorCode};
use crate::frame::Image;
use crate::pending::{CancelToken, PendingEntry, PendingSet, TaskId};
use crate::result::RecognitionResult;

/// Lifecycle of one remote search.
///
/// Every search ends with exactly one terminal event
/// ([`Completed`](SearchEvent::Completed) or [`Failed`](SearchEvent::Failed)),
/// cancelled searches included. By the time it is posted the task has
/// already left the scanner's pending set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    Started {
        task: TaskId,
    },
    Completed {
        task: TaskId,
        result: Option<RecognitionResult>,
    },
    Failed {
        task: TaskId,
        error: EngineError,
    },
}

impl SearchEvent {
    pub fn task(&self) -> TaskId {
        match self {
            Self::Started { task } | Self::Completed { task, .. } | Self::Failed { task, .. } => {
                *task
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Started { .. })
    }
}

/// Start a remote search for `image` on its own thread.
///
/// The task is registered in `pending` under `cancel` before this returns.
/// A token that is already cancelled ends the search before it reaches the
/// engine. `reply` is called from the search thread; if that thread cannot
/// be spawned it is called right away with an [`ErrorCode::Thread`] failure.
pub(crate) fn spawn<E, F>(
    engine: Arc<E>,
    image: Image,
    cancel: CancelToken,
    pending: &PendingSet,
    reply: F,
) -> TaskId
where
    E: RecognitionEngine + ?Sized,
    F: Fn(SearchEvent) + Send + Sync + 'static,
{
    let task = TaskId::next();
    let entry = pending.register(task, cancel.clone());
    let reply = Arc::new(reply);

    let thread_reply = Arc::clone(&reply);
    let spawned = thread::Builder::new()
        .name(format!("scan-search-{task}"))
        .spawn(move || run(&*engine, image, entry, &cancel, &*thread_reply));

    if let Err(error) = spawned {
        // The closure, and with it the pending entry, is gone by now.
        warn!(%task, %error, "failed to spawn search thread");
        reply(SearchEvent::Failed {
            task,
            error: EngineError::new(ErrorCode::Thread, error.to_string()),
        });
    }
    task
}

fn run<E>(
    engine: &E,
    image: Image,
    entry: PendingEntry,
    cancel: &CancelToken,
    reply: &dyn Fn(SearchEvent),
) where
    E: RecognitionEngine + ?Sized,
{
    let task = entry.task();
    if cancel.is_cancelled() {
        drop(entry);
        debug!(%task, "search cancelled before it started");
        reply(SearchEvent::Failed {
            task,
            error: ErrorCode::Aborted.into(),
        });
        return;
    }

    reply(SearchEvent::Started { task });
    let outcome = engine.remote_search(&image, cancel);
    drop(image);
    drop(entry);

    match outcome {
        Ok(result) => {
            trace!(%task, found = result.is_some(), "search completed");
            reply(SearchEvent::Completed { task, result });
        }
        Err(error) => {
            debug!(%task, %error, "search failed");
            reply(SearchEvent::Failed { task, error });
        }
    }
}

use std::sync::{Arc, Weak};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, trace};

use crate::engine::RecognitionEngine;
use crate::error::{EngineError, Error, ErrorCode};
use crate::pending::{CancelToken, PendingEntry, TaskId};

/// Receives the progress of offline store synchronization.
///
/// All methods are called on the thread that runs
/// [`Scanner::dispatch`](crate::Scanner::dispatch).
#[allow(unused_variables)]
pub trait SyncListener: Send + Sync {
    fn on_sync_start(&self) {}

    fn on_sync_progress(&self, total: u32, current: u32) {}

    fn on_sync_complete(&self) {}

    fn on_sync_failed(&self, error: &EngineError) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Started,
    Progress { total: u32, current: u32 },
    Completed,
    Failed(EngineError),
}

impl SyncEvent {
    pub fn deliver(&self, listener: &dyn SyncListener) {
        match self {
            Self::Started => listener.on_sync_start(),
            Self::Progress { total, current } => listener.on_sync_progress(*total, *current),
            Self::Completed => listener.on_sync_complete(),
            Self::Failed(error) => listener.on_sync_failed(error),
        }
    }
}

/// An event on its way from the sync thread to the scanner's owner.
pub(crate) struct SyncNotice {
    pub task: TaskId,
    pub primary: Weak<dyn SyncListener>,
    pub event: SyncEvent,
}

pub(crate) struct SyncJob {
    pub entry: PendingEntry,
    pub cancel: CancelToken,
    pub primary: Weak<dyn SyncListener>,
}

/// Spawn the dedicated sync thread. It runs queued jobs one at a time and
/// exits once `jobs` is disconnected.
pub(crate) fn spawn_thread<E>(
    engine: Arc<E>,
    jobs: Receiver<SyncJob>,
    notices: Sender<SyncNotice>,
) -> Result<(), Error>
where
    E: RecognitionEngine + ?Sized,
{
    let name = "scan-sync";
    thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            for job in jobs {
                run(&*engine, job, &notices);
            }
            trace!("sync thread exiting");
        })
        .map(drop)
        .map_err(|source| Error::Spawn {
            name: name.into(),
            source,
        })
}

fn run<E>(engine: &E, job: SyncJob, notices: &Sender<SyncNotice>)
where
    E: RecognitionEngine + ?Sized,
{
    let SyncJob {
        entry,
        cancel,
        primary,
    } = job;
    let task = entry.task();
    let post = |event| {
        let _ = notices.send(SyncNotice {
            task,
            primary: primary.clone(),
            event,
        });
    };

    if cancel.is_cancelled() {
        drop(entry);
        debug!(%task, "sync cancelled before it started");
        post(SyncEvent::Failed(ErrorCode::Aborted.into()));
        return;
    }

    info!(%task, "sync started");
    post(SyncEvent::Started);
    let outcome = engine.sync(
        &mut |total: u32, current: u32| post(SyncEvent::Progress { total, current }),
        &cancel,
    );
    drop(entry);

    match outcome {
        Ok(()) => {
            info!(%task, "sync complete");
            post(SyncEvent::Completed);
        }
        Err(error) => {
            info!(%task, %error, "sync failed");
            post(SyncEvent::Failed(error));
        }
    }
}

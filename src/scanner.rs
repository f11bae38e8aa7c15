use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, trace, warn};

use crate::engine::RecognitionEngine;
use crate::error::Error;
use crate::frame::Image;
use crate::pending::{CancelToken, PendingSet, TaskId};
use crate::registry::SubscriberRegistry;
use crate::search::{self, SearchEvent};
use crate::sync::{self, SyncEvent, SyncJob, SyncListener, SyncNotice};

struct Inner<E: ?Sized> {
    searches: PendingSet,
    syncs: PendingSet,
    sync_listeners: SubscriberRegistry<dyn SyncListener>,
    sync_jobs: Sender<SyncJob>,
    notices: Receiver<SyncNotice>,
    engine: Arc<E>,
}

impl<E: ?Sized> Drop for Inner<E> {
    fn drop(&mut self) {
        let cancelled = self.searches.cancel_all() + self.syncs.cancel_all();
        if cancelled > 0 {
            debug!(cancelled, "scanner dropped with tasks in flight");
        }
    }
}

/// Shared handle to a recognition engine and its background tasks.
///
/// A scanner owns the remote searches started through it and the single
/// sync thread. Sync events are queued and handed to listeners by
/// [`dispatch`](Scanner::dispatch), so they are always delivered on the
/// thread that pumps the scanner.
pub struct Scanner<E: RecognitionEngine> {
    inner: Arc<Inner<E>>,
}

impl<E: RecognitionEngine> Clone for Scanner<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: RecognitionEngine> Scanner<E> {
    /// Open a scanner over `engine`, failing with [`Error::Incompatible`]
    /// if the engine cannot run here.
    pub fn open(engine: E) -> Result<Self, Error> {
        if !engine.is_compatible() {
            return Err(Error::Incompatible);
        }
        let engine = Arc::new(engine);
        let (sync_jobs, jobs) = crossbeam_channel::unbounded();
        let (events, notices) = crossbeam_channel::unbounded();
        sync::spawn_thread(Arc::clone(&engine), jobs, events)?;
        info!("scanner opened");

        Ok(Self {
            inner: Arc::new(Inner {
                searches: PendingSet::new(),
                syncs: PendingSet::new(),
                sync_listeners: SubscriberRegistry::new(),
                sync_jobs,
                notices,
                engine,
            }),
        })
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.inner.engine
    }

    /// Start synchronizing the offline image store, reporting to `listener`
    /// and to every listener added with
    /// [`add_sync_listener`](Scanner::add_sync_listener).
    ///
    /// Returns `false` without starting anything if a sync is already
    /// running.
    pub fn sync(&self, listener: &Arc<dyn SyncListener>) -> bool {
        let task = TaskId::next();
        let cancel = CancelToken::new();
        let Some(entry) = self.inner.syncs.register_exclusive(task, cancel.clone()) else {
            debug!("sync already in progress");
            return false;
        };
        let job = SyncJob {
            entry,
            cancel,
            primary: Arc::downgrade(listener),
        };
        self.inner.sync_jobs.send(job).is_ok()
    }

    pub fn is_syncing(&self) -> bool {
        !self.inner.syncs.is_empty()
    }

    /// Ask the running sync, if any, to stop. Returns whether one was running.
    pub fn cancel_sync(&self) -> bool {
        self.inner.syncs.cancel_all() > 0
    }

    /// Also report sync events to `listener`. Returns `false` if it was
    /// already registered.
    pub fn add_sync_listener(&self, listener: &Arc<dyn SyncListener>) -> bool {
        self.inner.sync_listeners.add(listener)
    }

    pub fn remove_sync_listener(&self, listener: &Arc<dyn SyncListener>) -> bool {
        self.inner.sync_listeners.remove(listener)
    }

    /// Start a remote search for `image`. `reply` receives the lifecycle
    /// events from the search thread.
    pub fn search<F>(&self, image: Image, reply: F) -> TaskId
    where
        F: Fn(SearchEvent) + Send + Sync + 'static,
    {
        self.search_with(image, CancelToken::new(), reply)
    }

    /// [`search`](Scanner::search) under a token the caller can cancel
    /// before the task is registered.
    pub(crate) fn search_with<F>(&self, image: Image, cancel: CancelToken, reply: F) -> TaskId
    where
        F: Fn(SearchEvent) + Send + Sync + 'static,
    {
        search::spawn(
            Arc::clone(&self.inner.engine),
            image,
            cancel,
            &self.inner.searches,
            reply,
        )
    }

    /// Cancel every remote search in flight. Returns how many were signalled.
    pub fn cancel_searches(&self) -> usize {
        self.inner.searches.cancel_all()
    }

    pub fn is_searching(&self) -> bool {
        !self.inner.searches.is_empty()
    }

    /// Deliver queued sync events to their listeners without blocking.
    /// Returns the number of events handled.
    pub fn dispatch(&self) -> usize {
        let mut handled = 0;
        while let Ok(notice) = self.inner.notices.try_recv() {
            self.deliver(notice);
            handled += 1;
        }
        handled
    }

    /// Like [`dispatch`](Scanner::dispatch), but waits up to `timeout` for
    /// the first event. If the sync thread is gone it still waits out the
    /// timeout, so a pumping loop does not spin.
    pub fn dispatch_timeout(&self, timeout: Duration) -> usize {
        match self.inner.notices.recv_timeout(timeout) {
            Ok(notice) => {
                self.deliver(notice);
                1 + self.dispatch()
            }
            Err(RecvTimeoutError::Timeout) => 0,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("sync thread is gone");
                thread::sleep(timeout);
                0
            }
        }
    }

    fn deliver(&self, notice: SyncNotice) {
        let SyncNotice {
            task,
            primary,
            event,
        } = notice;
        if matches!(&event, SyncEvent::Failed(error) if error.is_aborted()) {
            debug!(%task, "sync aborted");
            return;
        }

        let primary = primary.upgrade();
        if let Some(primary) = &primary {
            event.deliver(&**primary);
        }
        let extras = self.inner.sync_listeners.notify_all(|listener| {
            let listener_ptr: *const dyn SyncListener = listener;
            let is_primary = primary
                .as_ref()
                .is_some_and(|p| std::ptr::addr_eq(Arc::as_ptr(p), listener_ptr));
            if !is_primary {
                event.deliver(listener);
            }
        });
        trace!(%task, ?event, extras, "sync event delivered");
    }
}

use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::engine::RecognitionEngine;
use crate::error::{EngineError, Error};
use crate::frame::Frame;
use crate::pending::CancelToken;
use crate::result::RecognitionResult;
use crate::scanner::Scanner;
use crate::search::SearchEvent;
use crate::source::{FrameSink, FrameSource, OrientationSensor};
use crate::types::ResultKinds;
use crate::worker::{FrameWorker, Job, JobId};

/// Everything that lands in a session's inbox.
pub(crate) enum Message {
    Frame(Frame),
    Scan {
        job: JobId,
        outcome: Result<Option<RecognitionResult>, EngineError>,
    },
    Search {
        job: JobId,
        event: SearchEvent,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Scanning. When `snap_armed`, the next focused frame goes to a remote
    /// search instead.
    Running { snap_armed: bool },
    Paused,
}

impl SessionState {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Receives the outcome of a session's work.
///
/// Methods are called from [`ScannerSession::dispatch`], on the thread that
/// owns the session.
#[allow(unused_variables)]
pub trait SessionListener {
    fn on_scan_complete(&self, result: Option<&RecognitionResult>) {}

    fn on_scan_failed(&self, error: &EngineError) {}

    fn on_remote_search_start(&self) {}

    fn on_remote_search_complete(&self, result: Option<&RecognitionResult>) {}

    fn on_remote_search_failed(&self, error: &EngineError) {}
}

#[derive(Debug, Clone)]
enum JobKind {
    Scan,
    /// Cancels the search, including one the worker has not started yet.
    Snap(CancelToken),
}

#[derive(Debug, Clone)]
struct Ticket {
    id: JobId,
    kind: JobKind,
}

/// Drives a [`FrameSource`] through a frame worker and reports results to a
/// [`SessionListener`].
///
/// The session is single-threaded: commands and [`dispatch`] are meant to
/// be called from the same thread, which is also where listener callbacks
/// run. Frames are pulled one at a time; a new one is only requested once
/// the worker has finished with the previous one.
///
/// [`dispatch`]: ScannerSession::dispatch
pub struct ScannerSession<S: FrameSource, E: RecognitionEngine> {
    scanner: Scanner<E>,
    source: S,
    listener: Weak<dyn SessionListener>,
    worker: Option<FrameWorker>,
    inbox: Receiver<Message>,
    state: SessionState,
    options: ResultKinds,
    close_timeout: Duration,
    frame_requested: bool,
    job: Option<Ticket>,
    next_job: JobId,
}

impl<S: FrameSource, E: RecognitionEngine> ScannerSession<S, E> {
    /// Spawn the frame worker and start `source`. The session starts out
    /// [`Idle`](SessionState::Idle); call [`resume`](Self::resume) to scan.
    ///
    /// `listener` is not kept alive by the session.
    pub fn new<L>(
        scanner: Scanner<E>,
        mut source: S,
        sensor: Arc<dyn OrientationSensor>,
        listener: &Arc<L>,
        config: &SessionConfig,
    ) -> Result<Self, Error>
    where
        L: SessionListener + 'static,
    {
        let (tx, inbox) = crossbeam_channel::unbounded();
        let worker = FrameWorker::spawn(&config.worker_name, scanner.clone(), sensor, tx.clone())?;
        source
            .start(FrameSink::new(tx))
            .map_err(|e| Error::Source(Box::new(e)))?;

        let listener: Weak<L> = Arc::downgrade(listener);
        let listener: Weak<dyn SessionListener> = listener;
        debug!(options = ?config.options, "session created");
        Ok(Self {
            scanner,
            source,
            listener,
            worker: Some(worker),
            inbox,
            state: SessionState::Idle,
            options: config.options,
            close_timeout: config.close_timeout(),
            frame_requested: false,
            job: None,
            next_job: JobId::first(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn options(&self) -> ResultKinds {
        self.options
    }

    pub fn scanner(&self) -> &Scanner<E> {
        &self.scanner
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_closed(&self) -> bool {
        self.worker.is_none()
    }

    /// Start or restart scanning with a fresh stabilizer.
    ///
    /// Returns `false` if the session is already running or closed; the
    /// locked result is then left as it is.
    pub fn resume(&mut self) -> bool {
        if self.state.is_running() || self.is_closed() {
            return false;
        }
        self.state = SessionState::Running { snap_armed: false };
        self.post(Job::Reset);
        info!("session resumed");
        self.request_frame();
        true
    }

    /// Stop scanning. Frames that arrive while paused are dropped; a job
    /// already with the worker still reports its outcome.
    pub fn pause(&mut self) -> bool {
        if !self.state.is_running() {
            return false;
        }
        self.state = SessionState::Paused;
        info!("session paused");
        true
    }

    /// Send the next focused frame to a remote search.
    pub fn snap(&mut self) -> bool {
        if self.state != (SessionState::Running { snap_armed: false }) {
            return false;
        }
        self.state = SessionState::Running { snap_armed: true };
        debug!("snap armed");
        true
    }

    /// Cancel remote searches and disarm a pending snap.
    ///
    /// A snap frame still queued with the worker never reaches the engine.
    /// Returns `false` if there was no search in flight, no snap frame with
    /// the worker and no armed snap.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.scanner.cancel_searches();
        let armed = self.state == SessionState::Running { snap_armed: true };
        if armed {
            self.state = SessionState::Running { snap_armed: false };
        }
        // The search reports back on its own; the session no longer waits.
        let detached = self.detach_snap();
        debug!(cancelled, armed, detached, "snap cancelled");
        if armed || detached {
            self.request_frame();
        }
        cancelled > 0 || armed || detached
    }

    /// Change what the following frames are scanned for.
    pub fn set_options(&mut self, options: ResultKinds) -> bool {
        if self.is_closed() {
            return false;
        }
        debug!(?options, "options changed");
        self.options = options;
        true
    }

    /// Pause, cancel remote searches, stop the source and the frame worker.
    ///
    /// Waits at most the configured close timeout for the worker. Returns
    /// whether it stopped in time. Closing twice is a no-op.
    pub fn close(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return true;
        };
        self.state = SessionState::Paused;
        self.detach_snap();
        self.scanner.cancel_searches();
        if let Err(error) = self.source.stop() {
            warn!(%error, "failed to stop frame source");
        }
        let stopped = worker.shutdown(self.close_timeout);

        // Release whatever frames are still queued.
        let dropped = self.inbox.try_iter().count();
        self.frame_requested = false;
        self.job = None;
        info!(stopped, dropped, "session closed");
        stopped
    }

    /// Handle everything in the inbox without blocking. Returns the number
    /// of messages handled.
    pub fn dispatch(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.inbox.try_recv() {
            self.handle(message);
            handled += 1;
        }
        handled
    }

    /// Like [`dispatch`](Self::dispatch), but waits up to `timeout` for the
    /// first message. A closed session has nothing left to deliver; it waits
    /// out the timeout all the same, so a pumping loop does not spin.
    pub fn dispatch_timeout(&mut self, timeout: Duration) -> usize {
        match self.inbox.recv_timeout(timeout) {
            Ok(message) => {
                self.handle(message);
                1 + self.dispatch()
            }
            Err(RecvTimeoutError::Timeout) => 0,
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(timeout);
                0
            }
        }
    }

    fn handle(&mut self, message: Message) {
        if self.is_closed() {
            return;
        }
        match message {
            Message::Frame(frame) => self.on_frame(frame),
            Message::Scan { job, outcome } => self.on_scan(job, outcome),
            Message::Search { job, event } => self.on_search(job, event),
        }
    }

    fn on_frame(&mut self, frame: Frame) {
        self.frame_requested = false;
        if self.job.is_some() {
            trace!("dropping unrequested frame");
            return;
        }
        match self.state {
            SessionState::Running { snap_armed: false } => {
                let options = self.options;
                let job = self.issue(JobKind::Scan);
                self.post(Job::Scan {
                    job,
                    frame,
                    options,
                });
            }
            SessionState::Running { snap_armed: true } => {
                if self.source.is_focused() {
                    let cancel = CancelToken::new();
                    let job = self.issue(JobKind::Snap(cancel.clone()));
                    self.post(Job::Snap { job, frame, cancel });
                } else {
                    trace!("not focused, skipping frame");
                    drop(frame);
                    self.source.request_focus();
                    self.request_frame();
                }
            }
            SessionState::Idle | SessionState::Paused => {
                trace!("not running, dropping frame");
            }
        }
    }

    fn on_scan(&mut self, job: JobId, outcome: Result<Option<RecognitionResult>, EngineError>) {
        if !self.is_current(job) {
            trace!(%job, "ignoring stale scan outcome");
            return;
        }
        self.job = None;
        if let Some(listener) = self.listener.upgrade() {
            match &outcome {
                Ok(result) => listener.on_scan_complete(result.as_ref()),
                Err(error) => listener.on_scan_failed(error),
            }
        }
        self.request_frame();
    }

    fn on_search(&mut self, job: JobId, event: SearchEvent) {
        if !self.is_current(job) {
            trace!(%job, ?event, "ignoring event of a detached search");
            return;
        }
        let listener = self.listener.upgrade();
        match event {
            SearchEvent::Started { .. } => {
                if let Some(listener) = &listener {
                    listener.on_remote_search_start();
                }
                return;
            }
            SearchEvent::Completed { result, .. } => {
                self.finish_snap();
                if let Some(listener) = &listener {
                    listener.on_remote_search_complete(result.as_ref());
                }
            }
            SearchEvent::Failed { error, .. } if error.is_aborted() => {
                self.finish_snap();
                debug!(%job, "remote search aborted");
            }
            SearchEvent::Failed { error, .. } => {
                self.finish_snap();
                if let Some(listener) = &listener {
                    listener.on_remote_search_failed(&error);
                }
            }
        }
        self.request_frame();
    }

    fn finish_snap(&mut self) {
        self.job = None;
        if self.state == (SessionState::Running { snap_armed: true }) {
            self.state = SessionState::Running { snap_armed: false };
        }
    }

    /// Stop waiting for the snap job, if that is what the worker holds, and
    /// cancel its search. Returns whether there was one.
    fn detach_snap(&mut self) -> bool {
        match self.job.take() {
            Some(Ticket {
                kind: JobKind::Snap(cancel),
                ..
            }) => {
                cancel.cancel();
                true
            }
            other => {
                self.job = other;
                false
            }
        }
    }

    fn is_current(&self, job: JobId) -> bool {
        self.job.as_ref().is_some_and(|ticket| ticket.id == job)
    }

    fn issue(&mut self, kind: JobKind) -> JobId {
        let id = self.next_job;
        self.next_job = id.next();
        self.job = Some(Ticket { id, kind });
        id
    }

    fn post(&mut self, job: Job) {
        let posted = self.worker.as_ref().is_some_and(|worker| worker.post(job));
        if !posted {
            warn!("frame worker is gone");
            self.job = None;
        }
    }

    /// Pull the next frame, unless one is already on its way or the worker
    /// still holds the previous one.
    fn request_frame(&mut self) {
        if !self.state.is_running() || self.frame_requested || self.job.is_some() {
            return;
        }
        self.frame_requested = true;
        self.source.request_next_frame();
    }
}

impl<S: FrameSource, E: RecognitionEngine> Drop for ScannerSession<S, E> {
    fn drop(&mut self) {
        self.close();
    }
}

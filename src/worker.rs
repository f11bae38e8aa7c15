use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace, warn};

use crate::engine::RecognitionEngine;
use crate::error::Error;
use crate::frame::{Frame, Image};
use crate::pending::CancelToken;
use crate::scanner::Scanner;
use crate::session::Message;
use crate::source::OrientationSensor;
use crate::stabilizer::Stabilizer;
use crate::types::ResultKinds;

/// Identifies one frame handed to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct JobId(u64);

impl JobId {
    pub(crate) fn first() -> Self {
        Self(1)
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) enum Job {
    /// Forget the locked result.
    Reset,
    Scan {
        job: JobId,
        frame: Frame,
        options: ResultKinds,
    },
    Snap {
        job: JobId,
        frame: Frame,
        cancel: CancelToken,
    },
    Quit,
}

/// The thread that runs recognition for a session, one job at a time.
///
/// It is the only thread that touches the [`Stabilizer`] or calls the
/// engine's local operations. Outcomes go back to the session's inbox.
pub(crate) struct FrameWorker {
    jobs: Sender<Job>,
    quit: Arc<AtomicBool>,
    done: Receiver<()>,
}

impl FrameWorker {
    pub(crate) fn spawn<E: RecognitionEngine>(
        name: &str,
        scanner: Scanner<E>,
        sensor: Arc<dyn OrientationSensor>,
        outbox: Sender<Message>,
    ) -> Result<Self, Error> {
        let (jobs, inbox) = crossbeam_channel::unbounded();
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);
        let quit = Arc::new(AtomicBool::new(false));

        let state = WorkerState {
            scanner,
            sensor,
            outbox,
            quit: Arc::clone(&quit),
            stabilizer: Stabilizer::new(),
        };
        thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                state.run(inbox);
                // Disconnects `done`.
                drop(done_tx);
            })
            .map_err(|source| Error::Spawn {
                name: name.into(),
                source,
            })?;

        Ok(Self { jobs, quit, done })
    }

    /// Queue a job. Returns `false` if the worker has stopped.
    pub(crate) fn post(&self, job: Job) -> bool {
        self.jobs.send(job).is_ok()
    }

    /// Stop the worker, dropping any jobs still queued, and wait up to
    /// `timeout` for its thread to finish. Returns `false` if it did not
    /// finish in time; the thread is then left to exit on its own.
    pub(crate) fn shutdown(self, timeout: Duration) -> bool {
        self.stop();
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "frame worker did not stop in time, abandoning it");
                false
            }
        }
    }

    fn stop(&self) {
        self.quit.store(true, Ordering::Release);
        let _ = self.jobs.send(Job::Quit);
    }
}

impl Drop for FrameWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

struct WorkerState<E: RecognitionEngine> {
    scanner: Scanner<E>,
    sensor: Arc<dyn OrientationSensor>,
    outbox: Sender<Message>,
    quit: Arc<AtomicBool>,
    stabilizer: Stabilizer,
}

impl<E: RecognitionEngine> WorkerState<E> {
    fn run(mut self, inbox: Receiver<Job>) {
        for job in inbox.iter() {
            if self.quit.load(Ordering::Acquire) {
                break;
            }
            let delivered = match job {
                Job::Reset => {
                    self.stabilizer.reset();
                    true
                }
                Job::Scan {
                    job,
                    frame,
                    options,
                } => self.scan(job, frame, options),
                Job::Snap { job, frame, cancel } => {
                    self.snap(job, frame, cancel);
                    true
                }
                Job::Quit => break,
            };
            if !delivered {
                debug!("session is gone, stopping frame worker");
                break;
            }
        }
        trace!("frame worker exiting");
    }

    fn image(&self, frame: Frame) -> Image {
        let orientation = self
            .sensor
            .orientation()
            .for_camera(frame.is_front_facing());
        Image::new(frame, orientation.exif())
    }

    fn scan(&mut self, job: JobId, frame: Frame, options: ResultKinds) -> bool {
        let image = self.image(frame);
        let outcome = self
            .stabilizer
            .scan(&**self.scanner.engine(), &image, options);
        drop(image);

        match &outcome {
            Ok(result) => trace!(%job, ?result, "scan complete"),
            Err(error) => debug!(%job, %error, "scan failed"),
        }
        self.outbox.send(Message::Scan { job, outcome }).is_ok()
    }

    fn snap(&self, job: JobId, frame: Frame, cancel: CancelToken) {
        let image = self.image(frame);
        let outbox = self.outbox.clone();
        let task = self.scanner.search_with(image, cancel, move |event| {
            let _ = outbox.send(Message::Search { job, event });
        });
        debug!(%job, %task, "remote search launched");
    }
}

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use scan_session::{
    CancelToken, EngineError, ErrorCode, Frame, FrameInfo, FrameSink, FrameSource, Image,
    Orientation, OrientationSensor, PixelFormat, RecognitionEngine, RecognitionResult,
    ResultKind, ResultKinds, Scanner, ScannerSession, SessionListener, Size, SyncListener,
};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn image_result(id: &str) -> RecognitionResult {
    RecognitionResult::new(ResultKind::Image, id.as_bytes().to_vec())
}

fn gray_info() -> FrameInfo {
    FrameInfo {
        pixel_format: PixelFormat::Gray8,
        size: Size {
            width: 4,
            height: 4,
        },
        bytes_per_row: 4,
        front_facing: false,
    }
}

pub fn frame() -> Frame {
    Frame::new(vec![0; 16], gray_info()).unwrap()
}

/// A frame that bumps `recycled` once its buffer is handed back.
pub fn tracked_frame(recycled: &Arc<AtomicUsize>) -> Frame {
    let recycled = Arc::clone(recycled);
    Frame::with_recycler(vec![0; 16], gray_info(), move |_| {
        recycled.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap()
}

pub fn image() -> Image {
    Image::new(frame(), Default::default())
}

/// Recognition engine that replays scripted answers.
pub struct ScriptedEngine {
    pub compatible: bool,
    pub local: Mutex<VecDeque<Result<Option<RecognitionResult>, EngineError>>>,
    pub decodes: Mutex<VecDeque<Option<RecognitionResult>>>,
    pub matches: Mutex<VecDeque<bool>>,
    pub remote: Mutex<VecDeque<Result<Option<RecognitionResult>, EngineError>>>,
    /// When set, remote searches wait until cancelled.
    pub remote_blocks: bool,
    pub local_delay: Duration,
    pub sync_steps: Vec<(u32, u32)>,
    pub sync_failure: Option<ErrorCode>,
    pub local_calls: AtomicUsize,
    pub match_calls: AtomicUsize,
    pub remote_calls: AtomicUsize,
    pub gate_tx: Sender<()>,
    pub gate_rx: Receiver<()>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        Self {
            compatible: true,
            local: Mutex::default(),
            decodes: Mutex::default(),
            matches: Mutex::default(),
            remote: Mutex::default(),
            remote_blocks: false,
            local_delay: Duration::ZERO,
            sync_steps: Vec::new(),
            sync_failure: None,
            local_calls: AtomicUsize::new(0),
            match_calls: AtomicUsize::new(0),
            remote_calls: AtomicUsize::new(0),
            gate_tx,
            gate_rx,
        }
    }
}

impl ScriptedEngine {
    /// Let a running sync take its next step.
    pub fn step(&self) {
        self.gate_tx.send(()).unwrap();
    }

    fn wait_for_step(&self, cancel: &CancelToken) -> Result<(), EngineError> {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                return Err(ErrorCode::Aborted.into());
            }
            if self.gate_rx.recv_timeout(Duration::from_millis(5)).is_ok() {
                return Ok(());
            }
        }
        Err(ErrorCode::Timeout.into())
    }
}

impl RecognitionEngine for ScriptedEngine {
    fn is_compatible(&self) -> bool {
        self.compatible
    }

    fn local_search(&self, _: &Image) -> Result<Option<RecognitionResult>, EngineError> {
        self.local_calls.fetch_add(1, Ordering::SeqCst);
        if !self.local_delay.is_zero() {
            thread::sleep(self.local_delay);
        }
        self.local.lock().pop_front().unwrap_or(Ok(None))
    }

    fn decode(&self, _: &Image, _: ResultKinds) -> Result<Option<RecognitionResult>, EngineError> {
        Ok(self.decodes.lock().pop_front().flatten())
    }

    fn matches(&self, _: &Image, _: &RecognitionResult) -> Result<bool, EngineError> {
        self.match_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.matches.lock().pop_front().unwrap_or(false))
    }

    fn remote_search(
        &self,
        _: &Image,
        cancel: &CancelToken,
    ) -> Result<Option<RecognitionResult>, EngineError> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        if self.remote_blocks {
            let deadline = Instant::now() + WAIT;
            while !cancel.is_cancelled() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(2));
            }
            return Err(ErrorCode::Aborted.into());
        }
        self.remote.lock().pop_front().unwrap_or(Ok(None))
    }

    fn sync(
        &self,
        progress: &mut dyn FnMut(u32, u32),
        cancel: &CancelToken,
    ) -> Result<(), EngineError> {
        for &(total, current) in &self.sync_steps {
            self.wait_for_step(cancel)?;
            progress(total, current);
        }
        self.wait_for_step(cancel)?;
        match self.sync_failure {
            Some(code) => Err(code.into()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("no camera")]
pub struct NoCamera;

#[derive(Default)]
pub struct SourceState {
    pub sink: Option<FrameSink>,
    pub requests: usize,
    pub focus_requests: usize,
    pub focused: bool,
    pub fail_start: bool,
    pub stopped: bool,
}

/// Frame source whose frames are delivered by hand.
#[derive(Clone, Default)]
pub struct ManualSource(pub Arc<Mutex<SourceState>>);

impl ManualSource {
    pub fn focused() -> Self {
        let source = Self::default();
        source.0.lock().focused = true;
        source
    }

    pub fn deliver(&self, frame: Frame) -> bool {
        let sink = self.0.lock().sink.clone();
        sink.is_some_and(|sink| sink.deliver(frame))
    }

    pub fn requests(&self) -> usize {
        self.0.lock().requests
    }

    pub fn focus_requests(&self) -> usize {
        self.0.lock().focus_requests
    }
}

impl FrameSource for ManualSource {
    type Error = NoCamera;

    fn start(&mut self, sink: FrameSink) -> Result<(), NoCamera> {
        let mut state = self.0.lock();
        if state.fail_start {
            return Err(NoCamera);
        }
        state.sink = Some(sink);
        Ok(())
    }

    fn request_next_frame(&mut self) {
        self.0.lock().requests += 1;
    }

    fn is_focused(&self) -> bool {
        self.0.lock().focused
    }

    fn request_focus(&mut self) {
        self.0.lock().focus_requests += 1;
    }

    fn stop(&mut self) -> Result<(), NoCamera> {
        let mut state = self.0.lock();
        state.stopped = true;
        state.sink = None;
        Ok(())
    }
}

/// Orientation sensor that holds the frame worker until opened.
pub struct GatedSensor {
    readings: AtomicUsize,
    gate_tx: Sender<()>,
    gate_rx: Receiver<()>,
}

impl Default for GatedSensor {
    fn default() -> Self {
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        Self {
            readings: AtomicUsize::new(0),
            gate_tx,
            gate_rx,
        }
    }
}

impl GatedSensor {
    /// How many readings have been asked for so far.
    pub fn readings(&self) -> usize {
        self.readings.load(Ordering::SeqCst)
    }

    pub fn open(&self) {
        self.gate_tx.send(()).unwrap();
    }
}

impl OrientationSensor for GatedSensor {
    fn orientation(&self) -> Orientation {
        self.readings.fetch_add(1, Ordering::SeqCst);
        let _ = self.gate_rx.recv_timeout(WAIT);
        Orientation::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ScanComplete(Option<RecognitionResult>),
    ScanFailed(ErrorCode),
    SearchStart,
    SearchComplete(Option<RecognitionResult>),
    SearchFailed(ErrorCode),
    SyncStart,
    SyncProgress(u32, u32),
    SyncComplete,
    SyncFailed(ErrorCode),
}

/// Listener that records everything it is told.
#[derive(Default)]
pub struct Recorder(Mutex<Vec<Event>>);

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    pub fn has(&self, event: &Event) -> bool {
        self.0.lock().contains(event)
    }

    fn push(&self, event: Event) {
        self.0.lock().push(event);
    }
}

impl SessionListener for Recorder {
    fn on_scan_complete(&self, result: Option<&RecognitionResult>) {
        self.push(Event::ScanComplete(result.cloned()));
    }

    fn on_scan_failed(&self, error: &EngineError) {
        self.push(Event::ScanFailed(error.code()));
    }

    fn on_remote_search_start(&self) {
        self.push(Event::SearchStart);
    }

    fn on_remote_search_complete(&self, result: Option<&RecognitionResult>) {
        self.push(Event::SearchComplete(result.cloned()));
    }

    fn on_remote_search_failed(&self, error: &EngineError) {
        self.push(Event::SearchFailed(error.code()));
    }
}

impl SyncListener for Recorder {
    fn on_sync_start(&self) {
        self.push(Event::SyncStart);
    }

    fn on_sync_progress(&self, total: u32, current: u32) {
        self.push(Event::SyncProgress(total, current));
    }

    fn on_sync_complete(&self) {
        self.push(Event::SyncComplete);
    }

    fn on_sync_failed(&self, error: &EngineError) {
        self.push(Event::SyncFailed(error.code()));
    }
}

/// Pump the session until `done` holds, failing the test after [`WAIT`].
pub fn pump_session<E: RecognitionEngine>(
    session: &mut ScannerSession<ManualSource, E>,
    mut done: impl FnMut(&ScannerSession<ManualSource, E>) -> bool,
) {
    let deadline = Instant::now() + WAIT;
    while !done(session) {
        assert!(Instant::now() < deadline, "timed out pumping session");
        session.dispatch_timeout(Duration::from_millis(10));
    }
}

/// Pump sync events until `done` holds, failing the test after [`WAIT`].
pub fn pump_scanner<E: RecognitionEngine>(scanner: &Scanner<E>, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !done() {
        assert!(Instant::now() < deadline, "timed out pumping scanner");
        scanner.dispatch_timeout(Duration::from_millis(10));
    }
}

/// Poll until `done` holds, failing the test after [`WAIT`].
pub fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting");
        thread::sleep(Duration::from_millis(1));
    }
}

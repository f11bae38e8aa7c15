use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use scan_session::{
    CancelToken, EngineError, ErrorCode, FixedOrientation, Frame, FrameInfo, FrameSink,
    FrameSource, Image, PixelFormat, RecognitionEngine, RecognitionResult, ResultKind,
    ResultKinds, Scanner, ScannerSession, SessionConfig, SessionListener, Size, SyncListener,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

/// A camera that renders a blank NV21 frame ~30 times a second, on request.
#[derive(Default)]
struct SimulatedCamera {
    requests: Option<Sender<()>>,
}

impl FrameSource for SimulatedCamera {
    type Error = std::io::Error;

    fn start(&mut self, sink: FrameSink) -> Result<(), Self::Error> {
        let (tx, rx) = crossbeam_channel::unbounded::<()>();
        thread::Builder::new()
            .name("camera".into())
            .spawn(move || {
                let info = FrameInfo {
                    pixel_format: PixelFormat::Nv21,
                    size: Size {
                        width: WIDTH,
                        height: HEIGHT,
                    },
                    bytes_per_row: WIDTH as usize,
                    front_facing: false,
                };
                let len = (WIDTH * HEIGHT * 3 / 2) as usize;
                for () in rx {
                    thread::sleep(Duration::from_millis(33));
                    let frame = Frame::new(vec![0; len], info).expect("valid geometry");
                    if !sink.deliver(frame) {
                        break;
                    }
                }
            })?;
        self.requests = Some(tx);
        Ok(())
    }

    fn request_next_frame(&mut self) {
        if let Some(requests) = &self.requests {
            let _ = requests.send(());
        }
    }

    fn is_focused(&self) -> bool {
        true
    }

    fn request_focus(&mut self) {}

    fn stop(&mut self) -> Result<(), Self::Error> {
        self.requests = None;
        Ok(())
    }
}

/// Pretends to see a QR code from the fifth frame on.
#[derive(Default)]
struct DemoEngine {
    frames: AtomicU32,
}

impl RecognitionEngine for DemoEngine {
    fn local_search(&self, _: &Image) -> Result<Option<RecognitionResult>, EngineError> {
        Err(ErrorCode::EmptyStore.into())
    }

    fn decode(
        &self,
        _: &Image,
        formats: ResultKinds,
    ) -> Result<Option<RecognitionResult>, EngineError> {
        let n = self.frames.fetch_add(1, Ordering::Relaxed);
        let found = n >= 4 && formats.contains(ResultKind::QrCode);
        Ok(found.then(|| RecognitionResult::new(ResultKind::QrCode, b"https://example.org".to_vec())))
    }

    fn matches(&self, _: &Image, _: &RecognitionResult) -> Result<bool, EngineError> {
        Ok(false)
    }

    fn remote_search(
        &self,
        _: &Image,
        cancel: &CancelToken,
    ) -> Result<Option<RecognitionResult>, EngineError> {
        thread::sleep(Duration::from_millis(200));
        if cancel.is_cancelled() {
            return Err(ErrorCode::Aborted.into());
        }
        Ok(Some(RecognitionResult::new(ResultKind::Image, b"aGVsbG8".to_vec())))
    }

    fn sync(
        &self,
        progress: &mut dyn FnMut(u32, u32),
        cancel: &CancelToken,
    ) -> Result<(), EngineError> {
        for current in 1..=5 {
            if cancel.is_cancelled() {
                return Err(ErrorCode::Aborted.into());
            }
            thread::sleep(Duration::from_millis(20));
            progress(5, current);
        }
        Ok(())
    }
}

struct Printer;

impl SessionListener for Printer {
    fn on_scan_complete(&self, result: Option<&RecognitionResult>) {
        if let Some(result) = result {
            println!("scanned {result}");
        }
    }

    fn on_scan_failed(&self, error: &EngineError) {
        println!("scan failed: {error}");
    }

    fn on_remote_search_start(&self) {
        println!("remote search started");
    }

    fn on_remote_search_complete(&self, result: Option<&RecognitionResult>) {
        match result.and_then(RecognitionResult::data_from_base64url) {
            Some(id) => println!("remote search found {}", String::from_utf8_lossy(&id)),
            None => println!("remote search found nothing"),
        }
    }
}

impl SyncListener for Printer {
    fn on_sync_progress(&self, total: u32, current: u32) {
        println!("sync {current}/{total}");
    }

    fn on_sync_complete(&self) {
        println!("sync complete");
    }
}

fn pump(session: &mut ScannerSession<SimulatedCamera, DemoEngine>, duration: Duration) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        session.dispatch_timeout(Duration::from_millis(10));
        session.scanner().dispatch();
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scan_session=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let scanner = Scanner::open(DemoEngine::default()).expect("engine is compatible");
    let printer = Arc::new(Printer);
    let sync_listener: Arc<dyn SyncListener> = printer.clone();
    scanner.sync(&sync_listener);

    let config = SessionConfig {
        options: ResultKinds::IMAGE | ResultKinds::QR_CODE,
        ..Default::default()
    };
    let mut session = ScannerSession::new(
        scanner,
        SimulatedCamera::default(),
        Arc::new(FixedOrientation::default()),
        &printer,
        &config,
    )
    .expect("failed to create session");

    session.resume();
    pump(&mut session, Duration::from_millis(500));

    println!("snap!");
    session.snap();
    pump(&mut session, Duration::from_millis(500));

    let stopped = session.close();
    println!("closed (worker stopped in time: {stopped})");
}

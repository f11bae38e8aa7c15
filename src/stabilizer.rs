use tracing::{trace, warn};

use crate::engine::RecognitionEngine;
use crate::error::{EngineError, ErrorCode};
use crate::frame::Image;
use crate::result::RecognitionResult;
use crate::types::{ResultKind, ResultKinds};

/// Consecutive failed confirmations after which a locked result is dropped.
pub const MAX_MISSES: u8 = 2;

/// Temporal confirmation of scan results.
///
/// Once something is recognized it is "locked": following frames first try
/// to confirm it, which is much cheaper than a full search. A single frame
/// that fails confirmation still reports the locked result; the second
/// consecutive miss drops it.
#[derive(Debug, Default)]
pub struct Stabilizer {
    last: Option<RecognitionResult>,
    misses: u8,
}

impl Stabilizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.misses = 0;
    }

    pub fn last_result(&self) -> Option<&RecognitionResult> {
        self.last.as_ref()
    }

    pub fn miss_count(&self) -> u8 {
        self.misses
    }

    /// Run one frame through confirmation, local image search and barcode
    /// decoding, in that order, stopping at the first result.
    ///
    /// An empty image store counts as "nothing found". Any other failure of
    /// the search or decode step aborts the frame and leaves the previous
    /// result in place.
    pub fn scan<E>(
        &mut self,
        engine: &E,
        image: &Image,
        options: ResultKinds,
    ) -> Result<Option<RecognitionResult>, EngineError>
    where
        E: RecognitionEngine + ?Sized,
    {
        let mut result = self.confirm(engine, image);

        if result.is_none() && options.contains(ResultKind::Image) {
            match engine.local_search(image) {
                Ok(found) => result = self.fresh(found),
                Err(e) if e.code() == ErrorCode::EmptyStore => {
                    trace!("image store is empty");
                }
                Err(e) => return Err(e),
            }
        }

        let barcodes = options.barcodes();
        if result.is_none() && !barcodes.is_empty() {
            let found = engine.decode(image, barcodes)?;
            result = self.fresh(found);
        }

        self.last = result.clone();
        Ok(result)
    }

    fn fresh(&mut self, found: Option<RecognitionResult>) -> Option<RecognitionResult> {
        if found.is_some() {
            self.misses = 0;
        }
        found
    }

    /// Returns the locked result if it is still to be reported for this frame.
    fn confirm<E>(&mut self, engine: &E, image: &Image) -> Option<RecognitionResult>
    where
        E: RecognitionEngine + ?Sized,
    {
        let last = self.last.as_ref()?;
        if self.misses >= MAX_MISSES {
            return None;
        }

        let verdict = match last.kind() {
            ResultKind::Image => engine.matches(image, last),
            kind => engine
                .decode(image, kind.into())
                .map(|found| found.is_some_and(|r| r.data() == last.data())),
        };

        match verdict {
            Ok(true) => {
                self.misses = 0;
                trace!(result = %last, "locked result confirmed");
                Some(last.clone())
            }
            Ok(false) => {
                self.misses += 1;
                trace!(result = %last, misses = self.misses, "locked result not confirmed");
                (self.misses < MAX_MISSES).then(|| last.clone())
            }
            Err(error) => {
                warn!(%error, "confirmation failed");
                None
            }
        }
    }
}

use crate::error::EngineError;
use crate::frame::Image;
use crate::pending::CancelToken;
use crate::result::RecognitionResult;
use crate::types::ResultKinds;

/// The recognition engine the pipeline drives.
///
/// Every operation is blocking. The local operations (`local_search`,
/// `decode`, `matches`) are only ever called from the session's frame
/// worker thread; `remote_search` runs on a search thread and `sync` on the
/// scanner's sync thread.
pub trait RecognitionEngine: Send + Sync + 'static {
    /// Whether the engine can run on this device. Checked once, when the
    /// [`Scanner`](crate::Scanner) is opened.
    fn is_compatible(&self) -> bool {
        true
    }

    /// Search the offline image store. Fails with
    /// [`ErrorCode::EmptyStore`](crate::ErrorCode::EmptyStore) if the store
    /// has not been synced yet.
    fn local_search(&self, image: &Image) -> Result<Option<RecognitionResult>, EngineError>;

    /// Decode a barcode of one of the given `formats`.
    fn decode(
        &self,
        image: &Image,
        formats: ResultKinds,
    ) -> Result<Option<RecognitionResult>, EngineError>;

    /// Check whether `image` still shows the image-store entry `reference`.
    fn matches(&self, image: &Image, reference: &RecognitionResult) -> Result<bool, EngineError>;

    /// Search the remote image service.
    ///
    /// Implementations should poll `cancel` and return an
    /// [`ErrorCode::Aborted`](crate::ErrorCode::Aborted) error once it is set.
    fn remote_search(
        &self,
        image: &Image,
        cancel: &CancelToken,
    ) -> Result<Option<RecognitionResult>, EngineError>;

    /// Synchronize the offline image store, reporting `(total, current)`
    /// through `progress` as it goes.
    fn sync(
        &self,
        progress: &mut dyn FnMut(u32, u32),
        cancel: &CancelToken,
    ) -> Result<(), EngineError>;
}

use core::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::types::ResultKind;

/// A recognized barcode or image.
///
/// Two results are equal when they have the same kind and the same payload.
/// The absence of a result is modelled as `Option::None` by every API that
/// can produce one.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RecognitionResult {
    kind: ResultKind,
    data: Box<[u8]>,
}

impl RecognitionResult {
    pub fn new(kind: ResultKind, data: impl Into<Box<[u8]>>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    /// The raw payload: decoded barcode bytes, or the image identifier.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The payload as UTF-8 text, with invalid sequences replaced.
    pub fn value(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Decode a payload that was encoded as unpadded base64url, as image
    /// identifiers usually are. Returns `None` if the payload is not valid
    /// base64url.
    pub fn data_from_base64url(&self) -> Option<Vec<u8>> {
        URL_SAFE_NO_PAD.decode(&self.data).ok()
    }
}

impl fmt::Debug for RecognitionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionResult")
            .field("kind", &self.kind)
            .field("value", &self.value())
            .finish()
    }
}

impl fmt::Display for RecognitionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_covers_kind_and_payload() {
        let a = RecognitionResult::new(ResultKind::QrCode, b"hello".to_vec());
        assert_eq!(a, RecognitionResult::new(ResultKind::QrCode, &b"hello"[..]));
        assert_ne!(a, RecognitionResult::new(ResultKind::DataMatrix, b"hello".to_vec()));
        assert_ne!(a, RecognitionResult::new(ResultKind::QrCode, b"hello!".to_vec()));
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn base64url_payloads_decode() {
        let id = RecognitionResult::new(ResultKind::Image, b"aGk_Pw".to_vec());
        assert_eq!(id.data_from_base64url().as_deref(), Some(&b"hi??"[..]));

        let junk = RecognitionResult::new(ResultKind::Image, b"***".to_vec());
        assert_eq!(junk.data_from_base64url(), None);
    }
}

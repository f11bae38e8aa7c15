use core::fmt;
use core::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Pixel formats understood by the recognition engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Packed 32-bit pixels, `(A << 24) | (R << 16) | (G << 8) | B` in native endianness.
    Rgb32,
    /// 8-bit grayscale.
    Gray8,
    /// Y plane followed by an interleaved V/U plane at half vertical resolution.
    Nv21,
}

impl PixelFormat {
    /// Smallest legal row stride for a row of `width` pixels.
    pub fn min_bytes_per_row(&self, width: u32) -> usize {
        match self {
            Self::Rgb32 => (width as usize).saturating_mul(4),
            Self::Gray8 | Self::Nv21 => width as usize,
        }
    }
}

/// Pixel dimensions of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// Physical orientation of the device, as reported by an orientation sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    /// Portrait, upright.
    #[default]
    Up = 0,
    /// Landscape, rotated clockwise.
    Right = 1,
    /// Portrait, upside-down.
    Down = 2,
    /// Landscape, rotated counter-clockwise.
    Left = 3,
}

impl Orientation {
    fn from_index(index: u8) -> Self {
        match index % 4 {
            0 => Self::Up,
            1 => Self::Right,
            2 => Self::Down,
            _ => Self::Left,
        }
    }

    /// Orientation as seen by the camera that produced the frame.
    ///
    /// Front-facing sensors are mirrored, which swaps the two portrait
    /// orientations.
    pub fn for_camera(self, front_facing: bool) -> Self {
        if front_facing {
            Self::from_index(6 - self as u8)
        } else {
            self
        }
    }

    /// EXIF tag locating the image origin for a frame captured in this orientation.
    pub fn exif(self) -> ExifOrientation {
        match self {
            Self::Up => ExifOrientation::LeftBottom,
            Self::Right => ExifOrientation::BottomRight,
            Self::Down => ExifOrientation::RightTop,
            Self::Left => ExifOrientation::TopLeft,
        }
    }
}

/// Where the origin of the image lies, using the EXIF numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExifOrientation {
    /// Leave the image untouched.
    Undefined = 0,
    #[default]
    TopLeft = 1,
    BottomRight = 3,
    RightTop = 6,
    LeftBottom = 8,
}

impl ExifOrientation {
    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// The kinds of result a scan can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Ean8,
    Ean13,
    QrCode,
    DataMatrix,
    Image,
}

impl ResultKind {
    pub const ALL: [ResultKind; 5] = [
        Self::Ean8,
        Self::Ean13,
        Self::QrCode,
        Self::DataMatrix,
        Self::Image,
    ];

    pub fn bit(self) -> u32 {
        match self {
            Self::Ean8 => 1 << 0,
            Self::Ean13 => 1 << 1,
            Self::QrCode => 1 << 2,
            Self::DataMatrix => 1 << 3,
            Self::Image => 1 << 31,
        }
    }

    pub fn is_barcode(self) -> bool {
        !matches!(self, Self::Image)
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ean8 => "EAN-8",
            Self::Ean13 => "EAN-13",
            Self::QrCode => "QR code",
            Self::DataMatrix => "Data Matrix",
            Self::Image => "image",
        })
    }
}

/// A set of [`ResultKind`]s, stored as the engine's bitmask.
///
/// Used both as the session scan options and as the format mask handed
/// to [`RecognitionEngine::decode`](crate::RecognitionEngine::decode).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<ResultKind>", into = "Vec<ResultKind>")]
pub struct ResultKinds(u32);

impl ResultKinds {
    pub const NONE: Self = Self(0);
    pub const EAN8: Self = Self(1 << 0);
    pub const EAN13: Self = Self(1 << 1);
    pub const QR_CODE: Self = Self(1 << 2);
    pub const DATA_MATRIX: Self = Self(1 << 3);
    pub const IMAGE: Self = Self(1 << 31);
    pub const BARCODES: Self =
        Self(Self::EAN8.0 | Self::EAN13.0 | Self::QR_CODE.0 | Self::DATA_MATRIX.0);

    /// Keep only the bits that name a known kind.
    pub fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & (Self::BARCODES.0 | Self::IMAGE.0))
    }

    /// Only the barcode kinds of this set.
    pub fn barcodes(self) -> Self {
        Self(self.0 & Self::BARCODES.0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, kind: ResultKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn iter(self) -> impl Iterator<Item = ResultKind> {
        ResultKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl Default for ResultKinds {
    fn default() -> Self {
        Self::IMAGE
    }
}

impl fmt::Debug for ResultKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl From<ResultKind> for ResultKinds {
    fn from(kind: ResultKind) -> Self {
        Self(kind.bit())
    }
}

impl From<Vec<ResultKind>> for ResultKinds {
    fn from(kinds: Vec<ResultKind>) -> Self {
        kinds.into_iter().collect()
    }
}

impl From<ResultKinds> for Vec<ResultKind> {
    fn from(kinds: ResultKinds) -> Self {
        kinds.iter().collect()
    }
}

impl FromIterator<ResultKind> for ResultKinds {
    fn from_iter<I: IntoIterator<Item = ResultKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, |acc, k| acc | Self::from(k))
    }
}

impl BitOr for ResultKinds {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ResultKinds {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

use core::fmt;
use std::sync::Arc;

use arrayvec::ArrayVec;

use crate::error::Error;
use crate::types::{ExifOrientation, PixelFormat, Size};

/// Maximum number of planes in any supported pixel format.
pub const MAX_PLANES: usize = 2;

/// A single plane of image data.
pub struct Plane<'a> {
    pub data: &'a [u8],
    pub bytes_per_row: usize,
}

/// Geometry of a frame as produced by the frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub pixel_format: PixelFormat,
    pub size: Size,
    pub bytes_per_row: usize,
    /// Whether the frame comes from a front-facing (mirrored) camera.
    pub front_facing: bool,
}

#[derive(Debug, Clone, Copy)]
struct PlaneLayout {
    offset: usize,
    len: usize,
}

type Recycler = Box<dyn FnOnce(Vec<u8>) + Send + Sync + 'static>;

struct FrameBuffer {
    data: Vec<u8>,
    info: FrameInfo,
    planes: ArrayVec<PlaneLayout, MAX_PLANES>,
    recycle: Option<Recycler>,
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        if let Some(recycle) = self.recycle.take() {
            recycle(std::mem::take(&mut self.data));
        }
    }
}

/// A reference-counted camera frame.
///
/// Every clone is a stake in the underlying buffer. The buffer goes back to
/// the frame source (through the recycler given to
/// [`Frame::with_recycler`]) only when the last stake is released, whichever
/// thread that happens on.
#[derive(Clone)]
pub struct Frame {
    buffer: Arc<FrameBuffer>,
}

impl Frame {
    /// Wrap a raw buffer. Fails if the buffer is too small for the geometry.
    pub fn new(data: Vec<u8>, info: FrameInfo) -> Result<Self, Error> {
        Self::build(data, info, None)
    }

    /// Like [`Frame::new`], handing the buffer to `recycle` once the last
    /// stake is released.
    pub fn with_recycler(
        data: Vec<u8>,
        info: FrameInfo,
        recycle: impl FnOnce(Vec<u8>) + Send + Sync + 'static,
    ) -> Result<Self, Error> {
        Self::build(data, info, Some(Box::new(recycle)))
    }

    fn build(data: Vec<u8>, info: FrameInfo, recycle: Option<Recycler>) -> Result<Self, Error> {
        if info.size.width == 0 || info.size.height == 0 {
            return Err(Error::InvalidFrame("empty frame"));
        }
        if info.bytes_per_row < info.pixel_format.min_bytes_per_row(info.size.width) {
            return Err(Error::InvalidFrame("row stride shorter than a row of pixels"));
        }

        const OVERFLOW: Error = Error::InvalidFrame("frame geometry overflows");
        let rows = info.size.height as usize;
        let luma = info.bytes_per_row.checked_mul(rows).ok_or(OVERFLOW)?;
        let mut planes = ArrayVec::new();
        planes.push(PlaneLayout {
            offset: 0,
            len: luma,
        });
        if info.pixel_format == PixelFormat::Nv21 {
            planes.push(PlaneLayout {
                offset: luma,
                len: info
                    .bytes_per_row
                    .checked_mul(rows.div_ceil(2))
                    .ok_or(OVERFLOW)?,
            });
        }

        let required = planes
            .iter()
            .try_fold(0usize, |sum, p| sum.checked_add(p.len))
            .ok_or(OVERFLOW)?;
        if data.len() < required {
            return Err(Error::InvalidFrame("buffer shorter than frame geometry"));
        }

        Ok(Self {
            buffer: Arc::new(FrameBuffer {
                data,
                info,
                planes,
                recycle,
            }),
        })
    }

    pub fn info(&self) -> FrameInfo {
        self.buffer.info
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.buffer.info.pixel_format
    }

    pub fn size(&self) -> Size {
        self.buffer.info.size
    }

    pub fn bytes_per_row(&self) -> usize {
        self.buffer.info.bytes_per_row
    }

    pub fn is_front_facing(&self) -> bool {
        self.buffer.info.front_facing
    }

    /// The whole raw buffer.
    pub fn data(&self) -> &[u8] {
        &self.buffer.data
    }

    pub fn planes(&self) -> ArrayVec<Plane<'_>, MAX_PLANES> {
        self.buffer
            .planes
            .iter()
            .map(|p| Plane {
                data: &self.buffer.data[p.offset..p.offset + p.len],
                bytes_per_row: self.buffer.info.bytes_per_row,
            })
            .collect()
    }

    /// Take an additional stake in this frame.
    pub fn stake(&self) -> Frame {
        self.clone()
    }

    /// Give up this stake. The buffer is recycled if it was the last one.
    pub fn release(self) {}

    /// Number of stakes currently held on the buffer.
    pub fn stakes(&self) -> usize {
        Arc::strong_count(&self.buffer)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("info", &self.buffer.info)
            .field("len", &self.buffer.data.len())
            .field("stakes", &self.stakes())
            .finish()
    }
}

/// A frame prepared for the recognition engine: a stake in the frame plus
/// the orientation it was captured in.
#[derive(Debug, Clone)]
pub struct Image {
    frame: Frame,
    orientation: ExifOrientation,
}

impl Image {
    pub fn new(frame: Frame, orientation: ExifOrientation) -> Self {
        Self { frame, orientation }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn orientation(&self) -> ExifOrientation {
        self.orientation
    }

    /// Release the image, returning its stake in the frame.
    pub fn into_frame(self) -> Frame {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn nv21(width: u32, height: u32) -> FrameInfo {
        FrameInfo {
            pixel_format: PixelFormat::Nv21,
            size: Size { width, height },
            bytes_per_row: width as usize,
            front_facing: false,
        }
    }

    #[test]
    fn nv21_has_luma_and_chroma_planes() {
        let frame = Frame::new(vec![0; 4 * 3 + 4 * 2], nv21(4, 3)).expect("valid frame");
        let planes = frame.planes();
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0].data.len(), 12);
        assert_eq!(planes[1].data.len(), 8);
        assert_eq!(planes[1].bytes_per_row, 4);
    }

    #[test]
    fn rejects_short_buffers_and_strides() {
        assert!(matches!(
            Frame::new(vec![0; 10], nv21(4, 3)),
            Err(Error::InvalidFrame(_))
        ));
        let info = FrameInfo {
            pixel_format: PixelFormat::Rgb32,
            size: Size {
                width: 4,
                height: 1,
            },
            bytes_per_row: 8,
            front_facing: false,
        };
        assert!(matches!(
            Frame::new(vec![0; 64], info),
            Err(Error::InvalidFrame(_))
        ));
    }

    #[test]
    fn oversized_geometry_is_rejected() {
        let gray = FrameInfo {
            pixel_format: PixelFormat::Gray8,
            size: Size {
                width: 4,
                height: 4,
            },
            bytes_per_row: usize::MAX / 2 + 1,
            front_facing: false,
        };
        assert!(matches!(
            Frame::new(vec![0; 16], gray),
            Err(Error::InvalidFrame("frame geometry overflows"))
        ));

        // Luma fits, luma plus chroma does not.
        let nv21 = FrameInfo {
            bytes_per_row: usize::MAX / 3,
            ..nv21(4, 2)
        };
        assert!(matches!(
            Frame::new(vec![0; 16], nv21),
            Err(Error::InvalidFrame("frame geometry overflows"))
        ));
    }

    #[test]
    fn buffer_recycled_after_last_stake() {
        let recycled = Arc::new(AtomicUsize::new(0));
        let counter = recycled.clone();
        let frame = Frame::with_recycler(vec![7; 20], nv21(4, 3), move |buf| {
            assert_eq!(buf.len(), 20);
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("valid frame");

        let image = Image::new(frame.stake(), ExifOrientation::TopLeft);
        assert_eq!(frame.stakes(), 2);
        frame.release();
        assert_eq!(recycled.load(Ordering::SeqCst), 0);
        drop(image);
        assert_eq!(recycled.load(Ordering::SeqCst), 1);
    }
}

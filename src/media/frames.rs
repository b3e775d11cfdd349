// SPDX-License-Identifier: GPL-3.0-only

//! Latest-wins frame delivery
//!
//! The analysis output of a bound pipeline pushes frames into a
//! [`FrameSink`] from the backend's callback thread. The sink converts each
//! frame to packed BGRA and publishes it into a `tokio::sync::watch` slot, so
//! a slow subscriber only ever sees the newest frame. At most one conversion
//! runs at a time; frames arriving during a conversion are dropped, and
//! nothing is converted while no subscriber is listening.

use crate::backends::camera::types::AnalysisImage;
use crate::constants::FRAME_FORMAT_BGRA8888;
use crate::errors::CameraResult;
use crate::media::conversions::{pack_rows, rgba_to_bgra, yuv420_to_rgba};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, warn};

/// One converted frame as delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameEnvelope {
    /// Packed BGRA, 4 bytes per pixel
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: u32,
    pub format: &'static str,
}

impl FrameEnvelope {
    fn bgra(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            width,
            height,
            bytes_per_row: width * 4,
            format: FRAME_FORMAT_BGRA8888,
        }
    }

    /// Convert a frame from the analysis output
    pub fn from_analysis(image: AnalysisImage) -> CameraResult<Self> {
        match image {
            AnalysisImage::Yuv420(yuv) => {
                let bytes = yuv420_to_rgba(&yuv)?;
                Ok(Self::bgra(bytes, yuv.width, yuv.height))
            }
            AnalysisImage::Rgba8888 {
                data,
                width,
                height,
                row_stride,
            } => {
                let packed = pack_rows(&data, width as usize * 4, height as usize, row_stride)?;
                Ok(Self::bgra(rgba_to_bgra(&packed)?, width, height))
            }
            AnalysisImage::Bgra8888 {
                data,
                width,
                height,
                row_stride,
            } => {
                let packed = pack_rows(&data, width as usize * 4, height as usize, row_stride)?;
                Ok(Self::bgra(packed, width, height))
            }
        }
    }
}

type Slot = Option<Arc<FrameEnvelope>>;

struct SinkInner {
    slot: watch::Sender<Slot>,
    enabled: AtomicBool,
    converting: AtomicBool,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Shared entry point for analysis frames
#[derive(Clone)]
pub struct FrameSink {
    inner: Arc<SinkInner>,
}

impl Default for FrameSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            inner: Arc::new(SinkInner {
                slot,
                enabled: AtomicBool::new(false),
                converting: AtomicBool::new(false),
                delivered: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Open a new subscription; it sees frames published from now on
    pub fn subscribe(&self) -> FrameStream {
        FrameStream {
            rx: self.inner.slot.subscribe(),
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.inner.slot.receiver_count() > 0
    }

    /// Gate delivery; frames arriving while disabled are discarded
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.inner.slot.send_replace(None);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Convert and publish a frame
    ///
    /// Takes the frame by value so its buffer is released as soon as
    /// conversion ends. Returns whether the frame was published.
    pub fn deliver(&self, image: AnalysisImage) -> bool {
        if !self.is_enabled() || !self.has_subscriber() {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if self
            .inner
            .converting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("Frame dropped, conversion in flight");
            return false;
        }

        let result = FrameEnvelope::from_analysis(image);
        self.inner.converting.store(false, Ordering::Release);

        match result {
            Ok(envelope) => {
                self.inner.slot.send_replace(Some(Arc::new(envelope)));
                self.inner.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                warn!(error = %e, "Dropping undecodable analysis frame");
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// (delivered, dropped) frame counters
    pub fn stats(&self) -> (u64, u64) {
        (
            self.inner.delivered.load(Ordering::Relaxed),
            self.inner.dropped.load(Ordering::Relaxed),
        )
    }
}

/// Subscription to the frame slot
pub struct FrameStream {
    rx: watch::Receiver<Slot>,
}

impl FrameStream {
    /// Wait for the next published frame
    ///
    /// Returns `None` once the sink is gone.
    pub async fn next(&mut self) -> Option<Arc<FrameEnvelope>> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(frame) = self.rx.borrow_and_update().clone() {
                return Some(frame);
            }
        }
    }

    /// Most recent frame, if any, without waiting
    pub fn latest(&self) -> Option<Arc<FrameEnvelope>> {
        self.rx.borrow().clone()
    }
}

//! Per-frame counters describing what the pipeline did.

use std::fmt;

/// Work done during one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Chunks resident in the world at the end of the frame.
    pub loaded: usize,
    /// Chunks generated or loaded from persistence and inserted this frame.
    pub generated: usize,
    /// Meshes installed this frame.
    pub meshed: usize,
    pub uploaded: usize,
    pub released: usize,
    pub drawn: usize,
    /// Chunks in the load set skipped because they lie outside the frustum.
    pub frustum_culled: usize,
    pub unloaded: usize,
    /// Generation requests still outstanding at the end of the frame.
    pub pending: usize,
}

impl FrameStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_generated(&mut self) {
        self.generated += 1;
    }

    pub fn record_meshed(&mut self) {
        self.meshed += 1;
    }

    pub fn record_upload(&mut self) {
        self.uploaded += 1;
    }

    pub fn record_release(&mut self) {
        self.released += 1;
    }

    pub fn record_draw(&mut self) {
        self.drawn += 1;
    }

    pub fn record_unloaded(&mut self, count: usize) {
        self.unloaded += count;
    }
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loaded={} generated={} meshed={} uploaded={} released={} drawn={} culled={} unloaded={} pending={}",
            self.loaded,
            self.generated,
            self.meshed,
            self.uploaded,
            self.released,
            self.drawn,
            self.frustum_culled,
            self.unloaded,
            self.pending
        )
    }
}

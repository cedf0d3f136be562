//! A render context that records calls instead of touching a GPU.
//!
//! `RecordingRenderContext` keeps the same bookkeeping a real context would
//! (which handles are resident, how many indices each holds) and logs every
//! call, so the dispatcher and the frame pipeline can be checked without a
//! device. The demo binary uses it to run the engine headless.

use std::collections::HashMap;

use log::error;

use super::{meshing::Mesh, MeshHandle, RenderContext};
use crate::{
    core::error::RenderError,
    engine_state::camera_state::{CameraState, CameraView},
};

/// Call log and residency state of a [`RecordingRenderContext`].
#[derive(Debug)]
pub struct RecordingRenderContext {
    camera: CameraState,
    resident: HashMap<MeshHandle, usize>,
    /// Every upload, in call order.
    pub uploads: Vec<MeshHandle>,
    /// Every release of a resident handle, in call order.
    pub releases: Vec<MeshHandle>,
    /// Draws queued since the last present.
    pub draws: Vec<MeshHandle>,
    /// Draw lists of every presented frame.
    pub presented: Vec<Vec<MeshHandle>>,
    /// Draws issued for handles that were not resident.
    pub invalid_draws: usize,
    fail_uploads: bool,
}

impl RecordingRenderContext {
    pub fn new(camera: CameraState) -> Self {
        Self {
            camera,
            resident: HashMap::new(),
            uploads: Vec::new(),
            releases: Vec::new(),
            draws: Vec::new(),
            presented: Vec::new(),
            invalid_draws: 0,
            fail_uploads: false,
        }
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraState {
        &mut self.camera
    }

    /// Makes every following upload fail, to exercise error paths.
    pub fn set_fail_uploads(&mut self, fail: bool) {
        self.fail_uploads = fail;
    }

    pub fn is_resident(&self, handle: MeshHandle) -> bool {
        self.resident.contains_key(&handle)
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    /// Index count last uploaded for `handle`.
    pub fn index_count(&self, handle: MeshHandle) -> Option<usize> {
        self.resident.get(&handle).copied()
    }

    /// Draw list of the most recently presented frame.
    pub fn last_frame(&self) -> &[MeshHandle] {
        self.presented.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

impl RenderContext for RecordingRenderContext {
    fn upload(&mut self, handle: MeshHandle, mesh: &Mesh) -> Result<(), RenderError> {
        if self.fail_uploads {
            return Err(RenderError::Upload {
                handle,
                reason: "uploads disabled".to_owned(),
            });
        }
        self.resident.insert(handle, mesh.indices.len());
        self.uploads.push(handle);
        Ok(())
    }

    fn release(&mut self, handle: MeshHandle) {
        if self.resident.remove(&handle).is_some() {
            self.releases.push(handle);
        }
    }

    fn draw(&mut self, handle: MeshHandle) {
        if !self.resident.contains_key(&handle) {
            error!("Draw issued for {} which has no buffers", handle);
            self.invalid_draws += 1;
        }
        self.draws.push(handle);
    }

    fn query_camera(&self) -> CameraView {
        self.camera.view()
    }

    fn present(&mut self) {
        self.presented.push(std::mem::take(&mut self.draws));
    }
}

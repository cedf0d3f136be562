//! # Camera State Management
//!
//! Camera position and orientation, projection, and the frustum derived from
//! them. The render context owns a `CameraState` and hands the engine a
//! read-only `CameraView` each frame.

use cgmath::Point3;
use web_time::Duration;

pub mod camera;
pub mod frustum;

use camera::{Camera, CameraController, MovementInput, Projection};
use frustum::Frustum;

/// What the visibility pass needs to know about the camera for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub position: Point3<f32>,
    pub frustum: Frustum,
}

/// Camera, projection and controller kept together by a render context.
#[derive(Debug, Clone)]
pub struct CameraState {
    pub camera: Camera,
    pub projection: Projection,
    pub controller: CameraController,
}

impl CameraState {
    pub fn new(camera: Camera, projection: Projection) -> Self {
        Self {
            camera,
            projection,
            controller: CameraController::new(8.0, 1.0),
        }
    }

    /// Records one frame of movement input.
    pub fn intake_input(&mut self, input: &MovementInput) {
        self.controller.intake_input(input);
    }

    /// Applies pending input.
    ///
    /// # Returns
    /// `true` if the camera moved or turned.
    pub fn update(&mut self, dt: Duration) -> bool {
        if !self.controller.has_updates() {
            return false;
        }
        self.camera.apply_and_reset_controller(&mut self.controller, dt);
        true
    }

    pub fn view(&self) -> CameraView {
        self.camera.view(&self.projection)
    }
}

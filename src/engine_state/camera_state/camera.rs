//! # Camera Implementation
//!
//! This module contains the core camera implementation including:
//! - Camera representation and transformations
//! - Projection matrix handling
//! - Camera controller for movement input
//! - GPU uniform layout for the view-projection matrix
//!
//! ## Key Components
//! - `Camera`: Represents the camera's position and orientation in 3D space
//! - `Projection`: Manages perspective projection settings
//! - `CameraController`: Accumulates movement deltas between frames
//! - `CameraUniform`: Packed data structure for GPU shaders

use cgmath::*;
use std::f32::consts::FRAC_PI_2;
use web_time::Duration;

use super::{frustum::Frustum, CameraView};

/// Transformation matrix to convert from OpenGL's coordinate system to WGPU's.
///
/// WGPU's NDC depth range is 0 to 1 rather than OpenGL's -1 to 1. This matrix:
/// 1. Scales the Z coordinate from [-1, 1] to [-0.5, 0.5]
/// 2. Translates the Z coordinate from [-0.5, 0.5] to [0, 1]
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,  // Scale Z from [-1,1] to [-0.5,0.5]
    0.0, 0.0, 0.5, 1.0,  // Translate Z from [-0.5,0.5] to [0,1]
);

/// Safe limit for pitch to prevent gimbal lock
const SAFE_FRAC_PI_2: f32 = FRAC_PI_2 - 0.0001;

/// A first-person camera in 3D space.
///
/// Yaw 0 looks along +X; positive pitch looks up.
#[derive(Debug, Clone)]
pub struct Camera {
    /// The camera's position in world space
    pub position: Point3<f32>,
    /// Horizontal rotation (around Y axis) in radians
    pub yaw: Rad<f32>,
    /// Vertical rotation (around X axis) in radians
    pub pitch: Rad<f32>,
}

impl Camera {
    /// Creates a new camera with the specified position and orientation.
    ///
    /// # Arguments
    /// * `position` - Initial position of the camera in world space
    /// * `yaw` - Initial yaw (horizontal rotation around Y axis)
    /// * `pitch` - Initial pitch (vertical rotation around X axis)
    pub fn new<V: Into<Point3<f32>>, Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(
        position: V,
        yaw: Y,
        pitch: P,
    ) -> Self {
        Self {
            position: position.into(),
            yaw: yaw.into(),
            pitch: pitch.into(),
        }
    }

    /// Normalized direction the camera is facing.
    pub fn forward(&self) -> Vector3<f32> {
        let (yaw_sin, yaw_cos) = self.yaw.0.sin_cos();
        let (pitch_sin, pitch_cos) = self.pitch.0.sin_cos();
        Vector3::new(pitch_cos * yaw_cos, pitch_sin, pitch_cos * yaw_sin).normalize()
    }

    /// Calculates the view matrix for this camera.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_to_rh(self.position, self.forward(), Vector3::unit_y())
    }

    /// Position and frustum as seen through `projection`.
    pub fn view(&self, projection: &Projection) -> CameraView {
        let view_projection = projection.calc_matrix() * self.calc_matrix();
        CameraView {
            position: self.position,
            frustum: Frustum::from_view_projection(&view_projection),
        }
    }

    /// Applies the controller's accumulated input, scaled by `dt`, then resets it.
    ///
    /// # Arguments
    /// * `controller` - The camera controller containing input state
    /// * `dt` - Time elapsed since the last update
    pub fn apply_and_reset_controller(&mut self, controller: &mut CameraController, dt: Duration) {
        let dt = dt.as_secs_f32();

        // Move forward/backward and left/right on the horizontal plane
        let (yaw_sin, yaw_cos) = self.yaw.0.sin_cos();
        let forward = Vector3::new(yaw_cos, 0.0, yaw_sin);
        let right = Vector3::new(-yaw_sin, 0.0, yaw_cos);
        self.position += forward
            * (controller.amount_forward - controller.amount_backward)
            * controller.speed
            * dt;
        self.position +=
            right * (controller.amount_right - controller.amount_left) * controller.speed * dt;
        self.position.y += (controller.amount_up - controller.amount_down) * controller.speed * dt;

        self.yaw += Rad(controller.rotate_horizontal) * controller.sensitivity * dt;
        self.pitch += Rad(-controller.rotate_vertical) * controller.sensitivity * dt;

        controller.reset();

        // Clamp pitch to prevent gimbal lock
        if self.pitch < -Rad(SAFE_FRAC_PI_2) {
            self.pitch = -Rad(SAFE_FRAC_PI_2);
        } else if self.pitch > Rad(SAFE_FRAC_PI_2) {
            self.pitch = Rad(SAFE_FRAC_PI_2);
        }
    }
}

/// Represents a camera's projection matrix and related parameters.
#[derive(Debug, Clone)]
pub struct Projection {
    /// Aspect ratio (width / height)
    aspect: f32,
    /// Vertical field of view in radians
    fovy: Rad<f32>,
    /// Near clipping plane distance
    znear: f32,
    /// Far clipping plane distance
    zfar: f32,
}

impl Projection {
    /// Creates a new projection with the given parameters.
    ///
    /// # Arguments
    /// * `width` - Viewport width in pixels
    /// * `height` - Viewport height in pixels
    /// * `fovy` - Vertical field of view (can be any type convertible to `Rad<f32>`)
    /// * `znear` - Near clipping plane distance
    /// * `zfar` - Far clipping plane distance
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    /// Updates the projection's aspect ratio for viewport resizing.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn zfar(&self) -> f32 {
        self.zfar
    }

    /// Perspective projection combined with the OpenGL to WGPU depth transform.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Movement requested by the input source for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementInput {
    pub move_forward: bool,
    pub move_backward: bool,
    pub move_left: bool,
    pub move_right: bool,
    pub move_up: bool,
    pub move_down: bool,
    /// Mouse delta in pixels, if the view was rotated.
    pub rotate_view: Option<(f64, f64)>,
}

/// Accumulates movement input until the next camera update.
#[derive(Debug, Clone)]
pub struct CameraController {
    // Movement amounts
    amount_left: f32,
    amount_right: f32,
    amount_forward: f32,
    amount_backward: f32,
    amount_up: f32,
    amount_down: f32,

    // Rotation amounts (in radians)
    rotate_horizontal: f32,
    rotate_vertical: f32,

    // Configuration
    speed: f32,
    sensitivity: f32,
}

impl CameraController {
    /// Creates a new camera controller with the given speed and sensitivity.
    ///
    /// # Arguments
    /// * `speed` - Base movement speed in blocks per second
    /// * `sensitivity` - Mouse look sensitivity multiplier
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            amount_left: 0.0,
            amount_right: 0.0,
            amount_forward: 0.0,
            amount_backward: 0.0,
            amount_up: 0.0,
            amount_down: 0.0,
            rotate_horizontal: 0.0,
            rotate_vertical: 0.0,
            speed,
            sensitivity,
        }
    }

    /// Records one frame of movement input.
    pub fn intake_input(&mut self, input: &MovementInput) {
        let amount = |pressed: bool| if pressed { 1.0 } else { 0.0 };
        self.amount_forward = amount(input.move_forward);
        self.amount_backward = amount(input.move_backward);
        self.amount_left = amount(input.move_left);
        self.amount_right = amount(input.move_right);
        self.amount_up = amount(input.move_up);
        self.amount_down = amount(input.move_down);
        if let Some((delta_x, delta_y)) = input.rotate_view {
            if delta_x.abs() > 0.5 {
                self.rotate_horizontal = delta_x as f32;
            }
            if delta_y.abs() > 0.5 {
                self.rotate_vertical = delta_y as f32;
            }
        }
    }

    /// Returns `true` if applying the controller would move or turn the camera.
    pub fn has_updates(&self) -> bool {
        self.amount_forward > 0.0
            || self.amount_backward > 0.0
            || self.amount_left > 0.0
            || self.amount_right > 0.0
            || self.amount_up > 0.0
            || self.amount_down > 0.0
            || self.rotate_horizontal != 0.0
            || self.rotate_vertical != 0.0
    }

    fn reset(&mut self) {
        self.rotate_horizontal = 0.0;
        self.rotate_vertical = 0.0;
        self.amount_up = 0.0;
        self.amount_down = 0.0;
        self.amount_left = 0.0;
        self.amount_right = 0.0;
        self.amount_forward = 0.0;
        self.amount_backward = 0.0;
    }
}

/// GPU-friendly representation of camera data for shaders.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    // cgmath types are not Pod, so matrices are stored as plain arrays
    view_proj: [[f32; 4]; 4],
    position: [f32; 4],
}

impl CameraUniform {
    /// Builds the uniform for the current camera state.
    pub fn from_camera(camera: &Camera, projection: &Projection) -> Self {
        let view_proj = projection.calc_matrix() * camera.calc_matrix();
        let position: [f32; 3] = camera.position.into();
        Self {
            view_proj: view_proj.into(),
            position: [position[0], position[1], position[2], 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_moves_camera_forward() {
        let mut camera = Camera::new(Point3::new(0.0, 10.0, 0.0), Deg(0.0), Deg(0.0));
        let mut controller = CameraController::new(4.0, 1.0);
        controller.intake_input(&MovementInput {
            move_forward: true,
            ..MovementInput::default()
        });
        assert!(controller.has_updates());

        camera.apply_and_reset_controller(&mut controller, Duration::from_millis(500));
        assert!((camera.position.x - 2.0).abs() < 1e-5);
        assert!((camera.position.y - 10.0).abs() < 1e-5);
        assert!(!controller.has_updates());
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::new(Point3::new(0.0, 0.0, 0.0), Deg(0.0), Deg(0.0));
        let mut controller = CameraController::new(1.0, 1.0);
        controller.intake_input(&MovementInput {
            rotate_view: Some((0.0, -1000.0)),
            ..MovementInput::default()
        });
        camera.apply_and_reset_controller(&mut controller, Duration::from_secs(1));
        assert!(camera.pitch.0 < FRAC_PI_2);
    }

    #[test]
    fn view_frustum_faces_forward() {
        let camera = Camera::new(Point3::new(0.0, 0.0, 0.0), Deg(0.0), Deg(0.0));
        let projection = Projection::new(800, 600, Deg(70.0), 0.1, 500.0);
        let view = camera.view(&projection);
        assert!(view.frustum.contains_point(Point3::new(20.0, 0.0, 0.0)));
        assert!(!view.frustum.contains_point(Point3::new(-20.0, 0.0, 0.0)));
    }
}

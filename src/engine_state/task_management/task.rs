//! # Task System Core Traits
//!
//! This module defines the fundamental building blocks of the task system,
//! which runs chunk generation and mesh building off the frame thread.
//!
//! ## Core Components
//! - `Task`: A unit of work that can be executed on a worker thread
//! - `TaskResult`: The outcome of a task, applied on the frame thread
//! - `TaskContext`: Engine state a result may touch while it is applied
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The task returns a boxed `TaskResult`, or `failure()` if `process()` panicked
//! 4. The result's `handle_result()` is called on the frame thread
//! 5. The result can spawn follow-up tasks
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred between threads
//! - `TaskResult` must be `Send` to be transferred back to the frame thread
//! - Results never touch the render context; uploads happen in the dispatcher

use std::{collections::HashSet, sync::Arc};

use crate::engine_state::{
    frame_stats::FrameStats,
    rendering::meshing::MeshBuilder,
    voxels::{coordinates::ChunkCoordinate, world::World},
};

/// Coordinates with a task in flight, so the frame loop never schedules the
/// same work twice.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InFlightWork {
    pub generation: HashSet<ChunkCoordinate>,
    pub meshing: HashSet<ChunkCoordinate>,
}

impl InFlightWork {
    pub fn is_empty(&self) -> bool {
        self.generation.is_empty() && self.meshing.is_empty()
    }
}

/// Engine state available while applying task results.
pub struct TaskContext<'a> {
    pub world: &'a Arc<World>,
    pub mesh_builder: MeshBuilder,
    pub in_flight: &'a mut InFlightWork,
    pub stats: &'a mut FrameStats,
    /// Mesh builds that may still be scheduled this frame. Results that spawn
    /// mesh tasks draw from it.
    pub mesh_budget: usize,
}

/// A unit of work that can be executed asynchronously.
///
/// Tasks own everything they need (shared handles to the world or a chunk),
/// so they can run on any worker without borrowing from the frame thread.
pub trait Task: Send {
    /// Performs the work. Runs on a worker thread, or inline when the manager
    /// has no workers.
    fn process(&self) -> Box<dyn TaskResult + Send>;

    /// The result to apply when `process` panicked, releasing whatever the task
    /// had claimed so the work is retried on a later frame.
    fn failure(&self) -> Box<dyn TaskResult + Send>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// The result of processing a `Task`.
pub trait TaskResult: Send {
    /// Applies the result on the frame thread.
    ///
    /// # Returns
    /// Follow-up tasks to schedule (can be empty).
    fn handle_result(self: Box<Self>, context: &mut TaskContext<'_>) -> Vec<Box<dyn Task + Send>>;
}

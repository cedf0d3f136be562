//! # Task Management System
//!
//! Runs chunk generation and mesh building on a pool of worker threads while the
//! frame thread keeps sole ownership of everything that must not be shared
//! (the render context, the in-flight bookkeeping, the frame counters).
//!
//! ## Architecture Overview
//! - `TaskManager`: Central coordinator for task distribution and worker management
//! - `Task`: A unit of work that can be executed asynchronously
//! - `TaskResult`: The result of a completed task, which can spawn additional tasks
//! - `TaskChannel`: Communication channel between the frame thread and one worker
//!
//! ## Task Lifecycle
//! 1. Tasks are created and published via `TaskManager::publish_task()`
//! 2. The manager distributes tasks to available worker channels using round-robin
//! 3. Workers process tasks and send the results back
//! 4. Results are applied on the frame thread in `process_completed_tasks()`
//! 5. Results can spawn new tasks, which are published in turn
//!
//! ## Inline Mode
//! A manager created with zero workers keeps every task queued until
//! `process_queued_tasks()`, which then runs them on the calling thread. The
//! results are applied by the next `process_completed_tasks()` exactly as worker
//! results would be, so the frame loop is the same in both modes.
//!
//! ## Panics
//! A task that panics does not take its worker down. The panic is caught and the
//! task's `failure()` result is applied instead, which releases whatever the task
//! had claimed.
//!
//! ## Example Usage
//! ```ignore
//! let mut task_manager = TaskManager::new(config.streaming.worker_threads);
//!
//! task_manager.publish_task(Box::new(ChunkGenerationTask::new(world.clone(), coordinate)));
//!
//! // Once per frame:
//! task_manager.process_completed_tasks(&mut context);
//! task_manager.process_queued_tasks();
//! ```

pub mod task;

use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::mpsc::{channel, Receiver, Sender, TryRecvError},
    thread::{self, JoinHandle},
};

use log::{debug, error, info, warn};
use task::{Task, TaskContext, TaskResult};
use web_time::{Duration, Instant};

/// A communication channel between the frame thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks to the worker; dropped on shutdown to stop it
/// - `result_receiver`: Receives task results from the worker
/// - `num_tasks_in_flight`: Tasks sent whose result has not been received yet
/// - `worker`: Handle to the worker thread, joined on shutdown
#[derive(Debug)]
pub struct TaskChannel {
    task_sender: Option<Sender<Box<dyn Task + Send>>>,
    result_receiver: Receiver<Box<dyn TaskResult + Send>>,
    num_tasks_in_flight: usize,
    worker: Option<JoinHandle<()>>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// The `TaskManager` is responsible for:
/// - Creating and managing worker threads
/// - Distributing tasks across available workers
/// - Collecting results and applying them on the frame thread
/// - Queuing tasks while all workers are busy
pub struct TaskManager {
    channels: Vec<TaskChannel>,
    queued_tasks: VecDeque<Box<dyn Task + Send>>,
    current_channel: usize,
    /// Results of tasks run inline, waiting for `process_completed_tasks`.
    inline_results: Vec<Box<dyn TaskResult + Send>>,
}

/// Maximum number of tasks that can be in flight per worker channel.
///
/// Keeping this at 1 leaves the remaining work in `queued_tasks`, where the
/// frame loop can still see how much is outstanding.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

/// Runs a task, substituting its failure result if it panics.
fn run_task(task: Box<dyn Task + Send>) -> Box<dyn TaskResult + Send> {
    match panic::catch_unwind(AssertUnwindSafe(|| task.process())) {
        Ok(result) => result,
        Err(_) => {
            error!("Task '{}' panicked", task.describe());
            task.failure()
        }
    }
}

impl TaskManager {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create. Zero runs every
    ///   task inline on the thread calling `process_queued_tasks`.
    ///
    /// Workers that fail to spawn are skipped with a warning; if none can be
    /// spawned the manager falls back to inline mode.
    pub fn new(num_workers: usize) -> Self {
        let mut channels = Vec::with_capacity(num_workers);

        if num_workers > 0 {
            info!(
                "Starting {} task workers (available parallelism: {:?})",
                num_workers,
                thread::available_parallelism()
            );
        }

        for index in 0..num_workers {
            let (task_tx, task_rx) = channel::<Box<dyn Task + Send>>();
            let (result_tx, result_rx) = channel::<Box<dyn TaskResult + Send>>();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    if result_tx.send(run_task(task)).is_err() {
                        break;
                    }
                }
            };

            match thread::Builder::new()
                .name(format!("voxel-worker-{index}"))
                .spawn(task_closure)
            {
                Ok(worker) => channels.push(TaskChannel {
                    task_sender: Some(task_tx),
                    result_receiver: result_rx,
                    num_tasks_in_flight: 0,
                    worker: Some(worker),
                }),
                Err(error) => warn!("Failed to spawn task worker {}: {}", index, error),
            }
        }

        if num_workers > 0 && channels.is_empty() {
            warn!("No task workers could be started, running tasks inline");
        }

        TaskManager {
            channels,
            queued_tasks: VecDeque::new(),
            current_channel: 0,
            inline_results: Vec::new(),
        }
    }

    /// Number of live worker threads. Zero means inline mode.
    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }

    /// Tasks handed to workers whose results have not been applied yet.
    pub fn in_flight_count(&self) -> usize {
        self.channels.iter().map(|channel| channel.num_tasks_in_flight).sum::<usize>()
            + self.inline_results.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queued_tasks.len()
    }

    /// `true` when nothing is queued, running or waiting to be applied.
    pub fn is_idle(&self) -> bool {
        self.queued_tasks.is_empty() && self.in_flight_count() == 0
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was handed to the worker
    /// - `Err(task)` if the worker is gone, so the task can be requeued
    fn try_send_task(
        &mut self,
        task: Box<dyn Task + Send>,
        channel_idx: usize,
    ) -> Result<(), Box<dyn Task + Send>> {
        let channel = &mut self.channels[channel_idx];
        let Some(sender) = &channel.task_sender else {
            return Err(task);
        };
        match sender.send(task) {
            Ok(()) => {
                channel.num_tasks_in_flight += 1;
                Ok(())
            }
            Err(error) => {
                warn!("Task worker {} disconnected", channel_idx);
                Err(error.0)
            }
        }
    }

    /// Finds a worker channel that can accept a new task, round-robin from the
    /// last used channel.
    fn find_available_channel(&self) -> Option<usize> {
        let count = self.channels.len();
        (0..count)
            .map(|offset| (self.current_channel + offset) % count)
            .find(|&index| {
                let channel = &self.channels[index];
                channel.task_sender.is_some() && channel.num_tasks_in_flight < MAX_TASKS_IN_FLIGHT
            })
    }

    /// Publishes a new task for execution.
    ///
    /// # Returns
    /// - `true` if the task was immediately handed to a worker
    /// - `false` if the task was queued (all workers busy, or inline mode)
    pub fn publish_task(&mut self, task: Box<dyn Task + Send>) -> bool {
        let Some(channel_idx) = self.find_available_channel() else {
            self.queued_tasks.push_back(task);
            return false;
        };

        match self.try_send_task(task, channel_idx) {
            Ok(()) => {
                self.current_channel = (channel_idx + 1) % self.channels.len();
                true
            }
            Err(task) => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Hands queued tasks to idle workers, oldest first. In inline mode every
    /// queued task is run on the calling thread instead.
    pub fn process_queued_tasks(&mut self) {
        if self.channels.is_empty() {
            while let Some(task) = self.queued_tasks.pop_front() {
                self.inline_results.push(run_task(task));
            }
            return;
        }

        while let Some(channel_idx) = self.find_available_channel() {
            let Some(task) = self.queued_tasks.pop_front() else {
                break;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(()) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    self.queued_tasks.push_front(task);
                    break;
                }
            }
        }
    }

    /// Applies every result that has arrived, without blocking.
    ///
    /// Follow-up tasks returned by the results are published afterwards.
    ///
    /// # Returns
    /// The number of results applied.
    pub fn process_completed_tasks(&mut self, context: &mut TaskContext<'_>) -> usize {
        let mut results = std::mem::take(&mut self.inline_results);

        for (index, channel) in self.channels.iter_mut().enumerate() {
            loop {
                match channel.result_receiver.try_recv() {
                    Ok(result) => {
                        channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
                        results.push(result);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if channel.num_tasks_in_flight > 0 {
                            error!(
                                "Task worker {} exited with {} tasks in flight",
                                index, channel.num_tasks_in_flight
                            );
                        }
                        channel.num_tasks_in_flight = 0;
                        channel.task_sender = None;
                        break;
                    }
                }
            }
        }

        let applied = results.len();
        let mut tasks_to_queue = Vec::new();
        for result in results {
            tasks_to_queue.extend(result.handle_result(context));
        }
        for task in tasks_to_queue {
            self.publish_task(task);
        }
        applied
    }

    /// Runs and applies tasks until the manager is idle or `timeout` passes.
    ///
    /// # Returns
    /// `true` if every task finished.
    pub fn finish(&mut self, context: &mut TaskContext<'_>, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.process_queued_tasks();
            self.process_completed_tasks(context);
            if self.is_idle() {
                return true;
            }
            if Instant::now() >= deadline {
                warn!(
                    "Gave up waiting for tasks: {} queued, {} in flight",
                    self.queued_count(),
                    self.in_flight_count()
                );
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Stops the workers and waits for them to exit. Queued tasks are dropped.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        if !self.queued_tasks.is_empty() {
            debug!("Dropping {} queued tasks on shutdown", self.queued_tasks.len());
            self.queued_tasks.clear();
        }
        for channel in &mut self.channels {
            channel.task_sender = None;
        }
        for (index, channel) in self.channels.iter_mut().enumerate() {
            if let Some(worker) = channel.worker.take() {
                if worker.join().is_err() {
                    error!("Task worker {} panicked during shutdown", index);
                }
            }
        }
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        core::config::TerrainConfig,
        engine_state::{
            frame_stats::FrameStats,
            rendering::meshing::MeshBuilder,
            task_management::task::InFlightWork,
            voxels::{coordinates::ChunkDimensions, terrain::TerrainGenerator, world::World},
        },
    };

    /// Counts as one mesh when applied and spawns `follow_ups` more of itself.
    struct CountTask {
        follow_ups: usize,
        panics: bool,
    }

    struct Counted {
        follow_ups: usize,
    }

    struct Failed;

    impl Task for CountTask {
        fn process(&self) -> Box<dyn TaskResult + Send> {
            if self.panics {
                panic!("count task told to panic");
            }
            Box::new(Counted {
                follow_ups: self.follow_ups,
            })
        }

        fn failure(&self) -> Box<dyn TaskResult + Send> {
            Box::new(Failed)
        }

        fn describe(&self) -> String {
            "count".to_owned()
        }
    }

    impl TaskResult for Counted {
        fn handle_result(self: Box<Self>, context: &mut TaskContext<'_>) -> Vec<Box<dyn Task + Send>> {
            context.stats.record_meshed();
            (0..self.follow_ups)
                .map(|_| {
                    Box::new(CountTask {
                        follow_ups: 0,
                        panics: false,
                    }) as Box<dyn Task + Send>
                })
                .collect()
        }
    }

    impl TaskResult for Failed {
        fn handle_result(self: Box<Self>, context: &mut TaskContext<'_>) -> Vec<Box<dyn Task + Send>> {
            context.stats.record_release();
            Vec::new()
        }
    }

    fn world() -> Arc<World> {
        let dimensions = ChunkDimensions::new(4, 4, 4);
        Arc::new(World::new(
            TerrainGenerator::new(1, TerrainConfig::default(), dimensions),
            None,
        ))
    }

    fn count(follow_ups: usize) -> Box<dyn Task + Send> {
        Box::new(CountTask {
            follow_ups,
            panics: false,
        })
    }

    #[test]
    fn inline_mode_runs_tasks_on_process_queued() {
        let world = world();
        let mut in_flight = InFlightWork::default();
        let mut stats = FrameStats::default();
        let mut context = TaskContext {
            world: &world,
            mesh_builder: MeshBuilder::default(),
            in_flight: &mut in_flight,
            stats: &mut stats,
            mesh_budget: 0,
        };

        let mut manager = TaskManager::new(0);
        assert!(!manager.publish_task(count(2)));
        assert_eq!(manager.queued_count(), 1);
        assert_eq!(manager.process_completed_tasks(&mut context), 0);

        manager.process_queued_tasks();
        assert_eq!(manager.in_flight_count(), 1);
        assert_eq!(manager.process_completed_tasks(&mut context), 1);
        assert_eq!(manager.queued_count(), 2);

        manager.process_queued_tasks();
        assert_eq!(manager.process_completed_tasks(&mut context), 2);
        assert!(manager.is_idle());
        assert_eq!(stats.meshed, 3);
    }

    #[test]
    fn workers_process_all_tasks_and_follow_ups() {
        let world = world();
        let mut in_flight = InFlightWork::default();
        let mut stats = FrameStats::default();
        let mut context = TaskContext {
            world: &world,
            mesh_builder: MeshBuilder::default(),
            in_flight: &mut in_flight,
            stats: &mut stats,
            mesh_budget: 0,
        };

        let mut manager = TaskManager::new(2);
        assert_eq!(manager.worker_count(), 2);
        for _ in 0..5 {
            manager.publish_task(count(1));
        }
        assert!(manager.queued_count() >= 3);

        assert!(manager.finish(&mut context, Duration::from_secs(10)));
        manager.shutdown();
        assert_eq!(stats.meshed, 10);
    }

    #[test]
    fn panicking_task_applies_its_failure_result() {
        let world = world();
        let mut in_flight = InFlightWork::default();
        let mut stats = FrameStats::default();
        let mut context = TaskContext {
            world: &world,
            mesh_builder: MeshBuilder::default(),
            in_flight: &mut in_flight,
            stats: &mut stats,
            mesh_budget: 0,
        };

        let mut manager = TaskManager::new(1);
        manager.publish_task(Box::new(CountTask {
            follow_ups: 0,
            panics: true,
        }));
        manager.publish_task(count(0));

        assert!(manager.finish(&mut context, Duration::from_secs(10)));
        assert_eq!(stats.released, 1);
        assert_eq!(stats.meshed, 1);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut manager = TaskManager::new(2);
        manager.publish_task(count(0));
        manager.shutdown();
        manager.shutdown();
        assert_eq!(manager.queued_count(), 0);
    }
}

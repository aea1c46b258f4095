//! Worker pool: fixed worker set, bounded FIFO queue, settle-all execution.
//!
//! Every submitted task settles exactly once. Settlement happens in one of four places:
//! the worker finishing (output or timeout), the supervisor noticing a dead worker
//! (`WorkerCrashed`), [`WorkerPool::terminate`] (`Shutdown`), or submission itself
//! (`Overloaded`, `Shutdown`). The reply sender for a task lives in pool state, never in
//! the worker, so whichever of these runs first takes it and the others find nothing.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinError};
use uuid::Uuid;

use crate::config::WorkerPoolConfig;
use crate::error::PoolError;
use crate::handler::TaskHandler;
use crate::stats::PoolStats;

type Reply<T> = oneshot::Sender<Result<T, PoolError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    NotStarted,
    Running,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Idle,
    Busy,
}

/// Message moved into a worker.
struct Assignment<I> {
    task_id: Uuid,
    input: I,
}

/// A task waiting for a worker.
struct Job<H: TaskHandler> {
    task_id: Uuid,
    input: H::Input,
    reply: Reply<H::Output>,
    enqueued_at: Instant,
}

struct InFlight<T> {
    task_id: Uuid,
    reply: Reply<T>,
    started_at: Instant,
}

struct WorkerSlot<H: TaskHandler> {
    id: usize,
    sender: mpsc::Sender<Assignment<H::Input>>,
    abort: AbortHandle,
    in_flight: Option<InFlight<H::Output>>,
    /// Cleared when the worker's channel is found closed; the supervisor replaces it.
    alive: bool,
}

impl<H: TaskHandler> WorkerSlot<H> {
    fn state(&self) -> WorkerState {
        if self.in_flight.is_some() {
            WorkerState::Busy
        } else {
            WorkerState::Idle
        }
    }
}

struct PoolState<H: TaskHandler> {
    lifecycle: Lifecycle,
    workers: Vec<WorkerSlot<H>>,
    queue: VecDeque<Job<H>>,
    next_worker_id: usize,
    completed_tasks: u64,
    failed_tasks: u64,
    respawned_workers: u64,
}

impl<H: TaskHandler> PoolState<H> {
    fn idle_worker(&self) -> Option<usize> {
        self.workers
            .iter()
            .position(|w| w.alive && w.state() == WorkerState::Idle)
    }

    /// Hand `job` to worker `idx`. Gives the job back if the worker is gone.
    fn assign(&mut self, idx: usize, job: Job<H>) -> Result<(), Job<H>> {
        let Job {
            task_id,
            input,
            reply,
            enqueued_at,
        } = job;
        let slot = &mut self.workers[idx];

        match slot.sender.try_send(Assignment { task_id, input }) {
            Ok(()) => {
                tracing::debug!(
                    task_id = %task_id,
                    worker_id = slot.id,
                    waited_ms = enqueued_at.elapsed().as_millis() as u64,
                    "Task assigned to worker"
                );
                slot.in_flight = Some(InFlight {
                    task_id,
                    reply,
                    started_at: Instant::now(),
                });
                Ok(())
            }
            Err(err) => {
                slot.alive = false;
                let Assignment { input, .. } = err.into_inner();
                Err(Job {
                    task_id,
                    input,
                    reply,
                    enqueued_at,
                })
            }
        }
    }

    /// Move queued jobs onto idle workers, oldest first.
    fn drain_queue(&mut self) {
        while !self.queue.is_empty() {
            let Some(idx) = self.idle_worker() else {
                break;
            };
            let Some(job) = self.queue.pop_front() else {
                break;
            };
            if let Err(job) = self.assign(idx, job) {
                self.queue.push_front(job);
            }
        }
    }

    fn snapshot(&self, queue_capacity: usize) -> PoolStats {
        let total_workers = self.workers.len();
        let busy_workers = self
            .workers
            .iter()
            .filter(|w| w.state() == WorkerState::Busy)
            .count();
        PoolStats {
            total_workers,
            available_workers: total_workers - busy_workers,
            busy_workers,
            queued_tasks: self.queue.len(),
            queue_capacity,
            completed_tasks: self.completed_tasks,
            failed_tasks: self.failed_tasks,
            respawned_workers: self.respawned_workers,
        }
    }
}

struct PoolInner<H: TaskHandler> {
    handler: H,
    config: WorkerPoolConfig,
    state: Mutex<PoolState<H>>,
}

impl<H: TaskHandler> PoolInner<H> {
    fn lock_state(&self) -> MutexGuard<'_, PoolState<H>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_worker(self: &Arc<Self>, state: &mut PoolState<H>) {
        let worker_id = state.next_worker_id;
        state.next_worker_id += 1;

        let (sender, receiver) = mpsc::channel(1);
        let handle = tokio::spawn(run_worker(
            Arc::downgrade(self),
            worker_id,
            self.handler.clone(),
            receiver,
            self.config.task_timeout,
        ));
        let abort = handle.abort_handle();

        // Supervisor: a worker only stops on its own when it dies.
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let outcome = handle.await;
            if let Some(inner) = weak.upgrade() {
                inner.on_worker_exit(worker_id, outcome);
            }
        });

        state.workers.push(WorkerSlot {
            id: worker_id,
            sender,
            abort,
            in_flight: None,
            alive: true,
        });
    }

    /// Settle the task a worker just finished and give it the next queued one.
    fn complete(&self, worker_id: usize, task_id: Uuid, result: Result<H::Output, PoolError>) {
        let mut state = self.lock_state();
        let Some(idx) = state.workers.iter().position(|w| w.id == worker_id) else {
            // Worker was removed by terminate; the task was already settled there.
            return;
        };

        let in_flight = match state.workers[idx].in_flight.take() {
            Some(f) if f.task_id == task_id => f,
            other => {
                state.workers[idx].in_flight = other;
                tracing::warn!(
                    worker_id = worker_id,
                    task_id = %task_id,
                    "Completion for a task the worker does not own, ignoring"
                );
                return;
            }
        };

        let duration_ms = in_flight.started_at.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                state.completed_tasks += 1;
                tracing::debug!(
                    worker_id = worker_id,
                    task_id = %task_id,
                    duration_ms = duration_ms,
                    "Task completed"
                );
            }
            Err(e) => {
                state.failed_tasks += 1;
                tracing::warn!(
                    worker_id = worker_id,
                    task_id = %task_id,
                    duration_ms = duration_ms,
                    error = %e,
                    "Task failed in worker"
                );
            }
        }

        // Receiver may be gone if the submitter stopped waiting.
        let _ = in_flight.reply.send(result);

        state.drain_queue();
    }

    fn on_worker_exit(self: &Arc<Self>, worker_id: usize, outcome: Result<(), JoinError>) {
        let mut state = self.lock_state();
        if state.lifecycle != Lifecycle::Running {
            return;
        }
        let Some(idx) = state.workers.iter().position(|w| w.id == worker_id) else {
            return;
        };

        let slot = state.workers.swap_remove(idx);
        let reason = match &outcome {
            Err(e) if e.is_panic() => "panicked",
            Err(_) => "cancelled",
            Ok(()) => "exited",
        };
        tracing::error!(
            worker_id = worker_id,
            reason = reason,
            "Upload worker died unexpectedly, respawning"
        );

        if let Some(in_flight) = slot.in_flight {
            state.failed_tasks += 1;
            tracing::error!(
                worker_id = worker_id,
                task_id = %in_flight.task_id,
                "Rejecting task of crashed worker"
            );
            let _ = in_flight
                .reply
                .send(Err(PoolError::WorkerCrashed { worker_id }));
        }

        self.spawn_worker(&mut state);
        state.respawned_workers += 1;
        state.drain_queue();
    }
}

impl<H: TaskHandler> Drop for PoolInner<H> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for worker in &state.workers {
            worker.abort.abort();
        }
        // Pending replies are dropped here; their handles resolve to `Shutdown`.
    }
}

async fn run_worker<H: TaskHandler>(
    pool: Weak<PoolInner<H>>,
    worker_id: usize,
    handler: H,
    mut receiver: mpsc::Receiver<Assignment<H::Input>>,
    task_timeout: Duration,
) {
    tracing::debug!(worker_id = worker_id, action = handler.action(), "Worker started");

    while let Some(Assignment { task_id, input }) = receiver.recv().await {
        let result = match tokio::time::timeout(task_timeout, handler.handle(input)).await {
            Ok(output) => Ok(output),
            Err(_) => {
                tracing::warn!(
                    worker_id = worker_id,
                    task_id = %task_id,
                    timeout_secs = task_timeout.as_secs_f64(),
                    "Task timed out, releasing worker"
                );
                Err(PoolError::TimedOut {
                    timeout: task_timeout,
                })
            }
        };

        let Some(inner) = pool.upgrade() else {
            break;
        };
        inner.complete(worker_id, task_id, result);
    }

    tracing::debug!(worker_id = worker_id, "Worker stopped");
}

/// Future resolving to the settlement of one submitted task.
///
/// Resolves to `Err(PoolError::Shutdown)` if the pool is dropped before the task settles.
pub struct TaskHandle<T> {
    task_id: Uuid,
    receiver: oneshot::Receiver<Result<T, PoolError>>,
}

impl<T> TaskHandle<T> {
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, PoolError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|settled| settled.unwrap_or(Err(PoolError::Shutdown)))
    }
}

/// Fixed-size pool of async workers running one [`TaskHandler`].
///
/// Created once per process and owned by service startup: call [`WorkerPool::init`]
/// to spawn workers and [`WorkerPool::terminate`] on shutdown. Cloning shares the pool.
pub struct WorkerPool<H: TaskHandler> {
    inner: Arc<PoolInner<H>>,
}

impl<H: TaskHandler> Clone for WorkerPool<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H: TaskHandler> WorkerPool<H> {
    /// Create a pool without spawning workers. Tasks submitted before `init` wait in the
    /// queue.
    pub fn new(handler: H, config: WorkerPoolConfig) -> Self {
        let state = PoolState {
            lifecycle: Lifecycle::NotStarted,
            workers: Vec::with_capacity(config.size),
            queue: VecDeque::new(),
            next_worker_id: 1,
            completed_tasks: 0,
            failed_tasks: 0,
            respawned_workers: 0,
        };

        Self {
            inner: Arc::new(PoolInner {
                handler,
                config,
                state: Mutex::new(state),
            }),
        }
    }

    /// Spawn the configured number of workers. Calling it again while running is a no-op.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn init(&self) -> Result<(), PoolError> {
        let mut state = self.inner.lock_state();
        match state.lifecycle {
            Lifecycle::Running => return Ok(()),
            Lifecycle::Terminated => return Err(PoolError::Shutdown),
            Lifecycle::NotStarted => {}
        }

        let size = self.inner.config.size.max(1);
        for _ in 0..size {
            self.inner.spawn_worker(&mut state);
        }
        state.lifecycle = Lifecycle::Running;
        state.drain_queue();

        tracing::info!(
            workers = size,
            max_queue_depth = self.inner.config.max_queue_depth,
            task_timeout_secs = self.inner.config.task_timeout.as_secs(),
            action = self.inner.handler.action(),
            "Worker pool started"
        );

        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_state().lifecycle == Lifecycle::Running
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.inner.config
    }

    /// Submit one task. Runs immediately on an idle worker, otherwise waits in FIFO order.
    ///
    /// Rejects immediately with `Overloaded` when the queue is full and with `Shutdown`
    /// after `terminate`.
    pub fn submit(&self, input: H::Input) -> TaskHandle<H::Output> {
        let (reply, receiver) = oneshot::channel();
        let task_id = Uuid::new_v4();
        let max = self.inner.config.max_queue_depth;

        let mut state = self.inner.lock_state();
        if state.lifecycle == Lifecycle::Terminated {
            let _ = reply.send(Err(PoolError::Shutdown));
        } else if state.queue.len() >= max && state.idle_worker().is_none() {
            state.failed_tasks += 1;
            tracing::warn!(
                task_id = %task_id,
                queued = state.queue.len(),
                max_queue_depth = max,
                "Worker pool overloaded, rejecting task"
            );
            let _ = reply.send(Err(PoolError::Overloaded {
                queued: state.queue.len(),
                max,
            }));
        } else {
            state.queue.push_back(Job {
                task_id,
                input,
                reply,
                enqueued_at: Instant::now(),
            });
            state.drain_queue();
            if !state.queue.is_empty() {
                tracing::debug!(
                    task_id = %task_id,
                    queued = state.queue.len(),
                    "No idle worker, task queued"
                );
            }
        }

        TaskHandle { task_id, receiver }
    }

    /// Run one task and wait for its settlement.
    pub async fn execute(&self, input: H::Input) -> Result<H::Output, PoolError> {
        self.submit(input).await
    }

    /// Submit every task at once and wait until all of them have settled.
    ///
    /// One failure never cuts the others short. Results are in submission order.
    pub async fn execute_parallel(
        &self,
        inputs: Vec<H::Input>,
    ) -> Vec<Result<H::Output, PoolError>> {
        let handles: Vec<_> = inputs.into_iter().map(|input| self.submit(input)).collect();
        join_all(handles).await
    }

    /// Run tasks in successive slices of `batch_size`, each slice through
    /// [`execute_parallel`](Self::execute_parallel), to cap in-flight work.
    pub async fn execute_batch(
        &self,
        inputs: Vec<H::Input>,
        batch_size: usize,
    ) -> Vec<Result<H::Output, PoolError>> {
        let batch_size = batch_size.max(1);
        let total = inputs.len();
        let mut results = Vec::with_capacity(total);
        let mut remaining = inputs.into_iter();

        let mut chunk_index = 0;
        loop {
            let chunk: Vec<_> = remaining.by_ref().take(batch_size).collect();
            if chunk.is_empty() {
                break;
            }
            chunk_index += 1;
            let chunk_len = chunk.len();
            let start = Instant::now();

            results.extend(self.execute_parallel(chunk).await);

            tracing::info!(
                chunk = chunk_index,
                chunk_size = chunk_len,
                processed = results.len(),
                total = total,
                duration_ms = start.elapsed().as_millis() as u64,
                "Chunk settled"
            );
        }

        results
    }

    /// Non-blocking snapshot of worker and queue counters.
    pub fn stats(&self) -> PoolStats {
        self.inner
            .lock_state()
            .snapshot(self.inner.config.max_queue_depth)
    }

    /// Stop every worker and settle all queued and in-flight tasks with `Shutdown`.
    ///
    /// Returns the number of tasks that were rejected. Later submissions are rejected too.
    pub fn terminate(&self) -> usize {
        let mut state = self.inner.lock_state();
        state.lifecycle = Lifecycle::Terminated;

        let mut rejected = 0;
        for job in state.queue.drain(..) {
            let _ = job.reply.send(Err(PoolError::Shutdown));
            rejected += 1;
        }

        let workers = std::mem::take(&mut state.workers);
        for worker in workers {
            worker.abort.abort();
            if let Some(in_flight) = worker.in_flight {
                let _ = in_flight.reply.send(Err(PoolError::Shutdown));
                rejected += 1;
            }
        }
        state.failed_tasks += rejected as u64;

        tracing::info!(rejected_tasks = rejected, "Worker pool terminated");
        rejected
    }
}

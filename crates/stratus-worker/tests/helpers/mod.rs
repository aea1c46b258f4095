//! Test handler with controllable behaviour for worker pool tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stratus_worker::{TaskHandler, WorkerPoolConfig};

#[derive(Debug, Clone)]
pub enum TestTask {
    /// Sleep, then return the value.
    Sleep { ms: u64, value: u32 },
    /// Record the value in the execution log, then return it.
    Record(u32),
    /// Never finish.
    Hang,
    /// Panic inside the worker.
    Panic,
}

#[derive(Clone, Default)]
pub struct TestHandler {
    pub running: Arc<AtomicUsize>,
    pub max_running: Arc<AtomicUsize>,
    pub log: Arc<Mutex<Vec<u32>>>,
}

impl TestHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<u32> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskHandler for TestHandler {
    type Input = TestTask;
    type Output = u32;

    fn action(&self) -> &'static str {
        "test"
    }

    async fn handle(&self, input: TestTask) -> u32 {
        match input {
            TestTask::Sleep { ms, value } => {
                let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_running.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                self.running.fetch_sub(1, Ordering::SeqCst);
                value
            }
            TestTask::Record(value) => {
                self.log.lock().unwrap().push(value);
                tokio::time::sleep(Duration::from_millis(5)).await;
                value
            }
            TestTask::Hang => {
                std::future::pending::<()>().await;
                0
            }
            TestTask::Panic => panic!("simulated worker crash"),
        }
    }
}

pub fn pool_config(size: usize, max_queue_depth: usize, timeout: Duration) -> WorkerPoolConfig {
    WorkerPoolConfig {
        size,
        max_queue_depth,
        task_timeout: timeout,
    }
}

pub fn sleeps(count: u32, ms: u64) -> Vec<TestTask> {
    (0..count).map(|value| TestTask::Sleep { ms, value }).collect()
}

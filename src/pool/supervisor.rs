//! Keeps the configured number of workers alive.

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::worker::{Worker, WorkerContext};

pub struct PoolSupervisor {
    ctx: WorkerContext,
    target: usize,
    interval: Duration,
    handle: Handle,
    workers: Vec<JoinHandle<()>>,
    next_id: usize,
}

impl PoolSupervisor {
    pub fn new(ctx: WorkerContext, target: usize, interval: Duration, handle: Handle) -> Self {
        Self {
            ctx,
            target,
            interval,
            handle,
            workers: Vec::with_capacity(target),
            next_id: 0,
        }
    }

    /// Check the pool every interval, starting immediately.
    ///
    /// There is no stop condition: the loop ends only when its runtime is
    /// shut down.
    pub async fn run(mut self) {
        info!(
            "Pool supervisor started: {} workers, checking every {:?}",
            self.target, self.interval
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.replenish();
        }
    }

    /// Forget finished workers and start replacements up to the target
    /// count. Returns the number of workers started.
    ///
    /// Nothing is started once shutdown has been signalled.
    pub fn replenish(&mut self) -> usize {
        let before = self.workers.len();
        self.workers.retain(|worker| !worker.is_finished());
        let finished = before - self.workers.len();

        if self.ctx.shutdown.load(Ordering::SeqCst) {
            return 0;
        }
        if finished > 0 {
            warn!("{} worker(s) ended unexpectedly, replacing", finished);
        }

        let mut started = 0;
        while self.workers.len() < self.target {
            let id = self.next_id;
            self.next_id += 1;
            let worker = Worker::new(id, self.ctx.clone()).spawn(&self.handle);
            self.workers.push(worker);
            started += 1;
        }

        if started > 0 {
            debug!("Started {} worker(s)", started);
        }
        started
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

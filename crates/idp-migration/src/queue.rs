use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Select, Sender};

/// A boolean flag workers check between jobs, grounded on
/// `index-scheduler::scheduler::MustStopProcessing`.
#[derive(Default, Clone, Debug)]
pub struct MustStopProcessing(Arc<AtomicBool>);

impl MustStopProcessing {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn must_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// The three priority lanes from spec.md §5: `high`, `default` and `low`.
/// A worker always drains `high` before `default` and `default` before
/// `low`, matching a strict-priority `crossbeam_channel::Select`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Default,
    Low,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct Queue {
    high: Sender<Job>,
    default: Sender<Job>,
    low: Sender<Job>,
    must_stop_processing: MustStopProcessing,
    workers: Vec<JoinHandle<()>>,
}

impl Queue {
    /// Spawn `worker_count` threads, each draining the three lanes in
    /// strict priority order until told to stop.
    pub fn start(worker_count: usize) -> Self {
        let (high_tx, high_rx) = crossbeam_channel::unbounded::<Job>();
        let (default_tx, default_rx) = crossbeam_channel::unbounded::<Job>();
        let (low_tx, low_rx) = crossbeam_channel::unbounded::<Job>();
        let must_stop_processing = MustStopProcessing::default();

        let workers = (0..worker_count.max(1))
            .map(|index| {
                let high_rx = high_rx.clone();
                let default_rx = default_rx.clone();
                let low_rx = low_rx.clone();
                let must_stop_processing = must_stop_processing.clone();
                std::thread::Builder::new()
                    .name(format!("idp-migration-worker-{index}"))
                    .spawn(move || worker_loop(high_rx, default_rx, low_rx, must_stop_processing))
                    .expect("failed to spawn migration worker thread")
            })
            .collect();

        Queue { high: high_tx, default: default_tx, low: low_tx, must_stop_processing, workers }
    }

    /// Enqueue `job` onto `priority`'s lane. Never blocks: the lanes are
    /// unbounded, matching the at-most-memory-bound queue depth spec.md §5
    /// asks for instead of a fixed-capacity channel that could deadlock a
    /// caller against a stalled worker pool.
    pub fn submit(&self, priority: Priority, job: impl FnOnce() + Send + 'static) {
        let sender = match priority {
            Priority::High => &self.high,
            Priority::Default => &self.default,
            Priority::Low => &self.low,
        };
        let _ = sender.send(Box::new(job));
    }

    pub fn must_stop_processing(&self) -> MustStopProcessing {
        self.must_stop_processing.clone()
    }

    /// Signal all workers to stop after their current job and join them.
    pub fn shutdown(self) {
        self.must_stop_processing.must_stop();
        drop(self.high);
        drop(self.default);
        drop(self.low);
        for worker in self.workers {
            let _ = worker.join();
        }
    }
}

fn worker_loop(high: Receiver<Job>, default: Receiver<Job>, low: Receiver<Job>, must_stop_processing: MustStopProcessing) {
    loop {
        if must_stop_processing.get() {
            return;
        }
        if let Ok(job) = high.try_recv() {
            job();
            continue;
        }
        if let Ok(job) = default.try_recv() {
            job();
            continue;
        }
        if let Ok(job) = low.try_recv() {
            job();
            continue;
        }

        let mut select = Select::new();
        let high_index = select.recv(&high);
        let default_index = select.recv(&default);
        let low_index = select.recv(&low);

        let operation = match select.select_timeout(std::time::Duration::from_millis(200)) {
            Ok(operation) => operation,
            Err(_) => continue,
        };

        let job = match operation.index() {
            index if index == high_index => operation.recv(&high),
            index if index == default_index => operation.recv(&default),
            index if index == low_index => operation.recv(&low),
            _ => unreachable!(),
        };

        if let Ok(job) = job {
            job();
        } else {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn high_priority_jobs_run_before_low_priority_ones() {
        let queue = Queue::start(1);
        let (tx, rx) = mpsc::channel();

        let high_tx = tx.clone();
        queue.submit(Priority::High, move || high_tx.send("high").unwrap());
        let low_tx = tx.clone();
        queue.submit(Priority::Low, move || low_tx.send("low").unwrap());

        assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap(), "high");
        assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap(), "low");
        queue.shutdown();
    }

    #[test]
    fn shutdown_stops_workers_without_running_further_jobs() {
        let queue = Queue::start(2);
        let stop_flag = queue.must_stop_processing();
        queue.shutdown();
        assert!(stop_flag.get());
    }
}

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use core_affinity::CoreId;
use crossbeam_queue::SegQueue;
use log::{info, warn};
use rand::Rng;
use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    thread,
    time::{Duration, Instant},
};

use locked_queues::{CoarseQueue, ConcurrentQueue, FineQueue, Handle};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = BenchConfig::parse();
    config.validate()?;
    info!("benchmarking with {config:?}");

    let report = match config.queue {
        QueueKind::Coarse => benchmark(CoarseQueue::new(), &config)?,
        QueueKind::Fine => benchmark(FineQueue::new(), &config)?,
        QueueKind::Segqueue => benchmark(SegQueue::new(), &config)?,
        QueueKind::ConcurrentQueue => {
            benchmark(concurrent_queue::ConcurrentQueue::unbounded(), &config)?
        }
        QueueKind::Lockfree => benchmark(lockfree::queue::Queue::new(), &config)?,
    };

    println!("throughput: {}", report.throughput());
    println!("number of enqueues: {}", report.enqueues);
    println!("number of dequeues: {}", report.dequeues);
    Ok(())
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum QueueKind {
    /// single lock over a VecDeque
    Coarse,
    /// linked list with separate head and tail locks
    Fine,
    /// crossbeam's lock-free SegQueue
    Segqueue,
    /// the concurrent-queue crate, unbounded
    ConcurrentQueue,
    /// the lockfree crate's Michael-Scott queue
    Lockfree,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct BenchConfig {
    /// queue implementation to benchmark.
    #[arg(long, value_enum, default_value_t = QueueKind::Fine)]
    queue: QueueKind,
    /// number of elements to add to the queue before starting the main
    /// threaded test.
    #[arg(long)]
    prefill: usize,
    /// number of threads pushing elements onto the queue.
    #[arg(long)]
    producer_threads: usize,
    /// number of threads popping elements off the queue.
    #[arg(long)]
    consumer_threads: usize,
    /// duration in seconds to run the test
    #[arg(long)]
    duration: usize,
    /// pin every worker thread to its own core.
    #[arg(long)]
    pin_cores: bool,
    /// turn every worker into a mixed producer/consumer that enqueues with
    /// this probability and dequeues otherwise.
    #[arg(long)]
    mixed_ratio: Option<f64>,
}

impl BenchConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if self.duration == 0 {
            bail!("--duration must be at least one second");
        }
        if self.workers() == 0 {
            bail!("at least one producer or consumer thread is required");
        }
        if let Some(ratio) = self.mixed_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                bail!("--mixed-ratio must be within [0, 1], got {ratio}");
            }
        }
        Ok(())
    }

    fn workers(&self) -> usize {
        self.producer_threads + self.consumer_threads
    }
}

#[derive(Debug)]
struct BenchReport {
    enqueues: usize,
    dequeues: usize,
    elapsed: Duration,
}

impl BenchReport {
    fn throughput(&self) -> f64 {
        (self.enqueues + self.dequeues) as f64 / self.elapsed.as_secs_f64()
    }
}

#[derive(Clone, Copy)]
enum Role {
    Producer,
    Consumer,
    Mixed(f64),
}

fn benchmark<C>(queue: C, config: &BenchConfig) -> anyhow::Result<BenchReport>
where
    C: ConcurrentQueue<i32>,
    for<'a> &'a C: Send,
{
    let mut handle = queue.register();
    for i in 0..config.prefill {
        handle.enqueue(i as i32);
    }

    let cores = if config.pin_cores {
        Some(pinning_cores(core_affinity::get_core_ids(), config.workers())?)
    } else {
        None
    };
    let core_for = |worker: usize| cores.as_ref().map(|cores| cores[worker % cores.len()]);

    let roles = (0..config.producer_threads)
        .map(|_| Role::Producer)
        .chain((0..config.consumer_threads).map(|_| Role::Consumer))
        .map(|role| match config.mixed_ratio {
            Some(ratio) => Role::Mixed(ratio),
            None => role,
        });

    let done: AtomicBool = AtomicBool::new(false);
    let enqueues = AtomicUsize::new(0);
    let dequeues = AtomicUsize::new(0);

    let start = Instant::now();
    thread::scope(|s| {
        for (worker, role) in roles.enumerate() {
            let core = core_for(worker);
            let (queue, done, enqueues, dequeues) = (&queue, &done, &enqueues, &dequeues);
            s.spawn(move || {
                if let Some(core) = core {
                    pin(core);
                }
                let (local_enqueues, local_dequeues) = run_worker(queue, role, done);
                enqueues.fetch_add(local_enqueues, Ordering::Relaxed);
                dequeues.fetch_add(local_dequeues, Ordering::Relaxed);
            });
        }

        thread::sleep(Duration::from_secs(config.duration as u64));
        done.store(true, Ordering::Relaxed);
    });

    let report = BenchReport {
        enqueues: enqueues.into_inner(),
        dequeues: dequeues.into_inner(),
        elapsed: start.elapsed(),
    };
    info!("finished: {report:?}");
    Ok(report)
}

fn pinning_cores(cores: Option<Vec<CoreId>>, workers: usize) -> anyhow::Result<Vec<CoreId>> {
    let cores = cores.context("could not list the CPU cores")?;
    if cores.is_empty() {
        bail!("no CPU cores available to pin {workers} workers to");
    }
    if cores.len() < workers {
        warn!("{workers} workers share {} cores, some will be pinned together", cores.len());
    }
    Ok(cores)
}

fn pin(core: CoreId) {
    if !core_affinity::set_for_current(core) {
        warn!("could not pin worker to core {}", core.id);
    }
}

fn run_worker<C: ConcurrentQueue<i32>>(queue: &C, role: Role, done: &AtomicBool) -> (usize, usize) {
    let mut handle = queue.register();
    let mut local_enqueues = 0;
    let mut local_dequeues = 0;
    match role {
        Role::Producer => {
            while !done.load(Ordering::Relaxed) {
                handle.enqueue(405);
                local_enqueues += 1;
            }
        }
        Role::Consumer => {
            while !done.load(Ordering::Relaxed) {
                handle.dequeue();
                local_dequeues += 1;
            }
        }
        Role::Mixed(ratio) => {
            let mut rng = rand::thread_rng();
            while !done.load(Ordering::Relaxed) {
                if rng.gen_bool(ratio) {
                    handle.enqueue(405);
                    local_enqueues += 1;
                } else {
                    handle.dequeue();
                    local_dequeues += 1;
                }
            }
        }
    }
    (local_enqueues, local_dequeues)
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use core_affinity::CoreId;

    use super::{pinning_cores, BenchConfig, QueueKind};

    fn parse(args: &[&str]) -> BenchConfig {
        BenchConfig::try_parse_from(std::iter::once("locked-queues").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults_to_the_fine_queue() {
        let config = parse(&[
            "--prefill", "10", "--producer-threads", "1", "--consumer-threads", "1", "--duration", "1",
        ]);
        assert!(matches!(config.queue, QueueKind::Fine));
        assert!(!config.pin_cores);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        let config = parse(&[
            "--queue", "coarse", "--prefill", "0", "--producer-threads", "2", "--consumer-threads", "0",
            "--duration", "1", "--mixed-ratio", "1.5",
        ]);
        assert!(matches!(config.queue, QueueKind::Coarse));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_workers() {
        let config = parse(&[
            "--prefill", "0", "--producer-threads", "0", "--consumer-threads", "0", "--duration", "1",
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn pinning_needs_at_least_one_core() {
        assert!(pinning_cores(None, 2).is_err());
        assert!(pinning_cores(Some(Vec::new()), 2).is_err());
        let cores = pinning_cores(Some(vec![CoreId { id: 0 }]), 4).unwrap();
        assert_eq!(cores.len(), 1);
    }
}

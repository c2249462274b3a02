//! I2C channel coordinator
//!
//! Started when the I2C transport is registered. Each physical bus gets a
//! worker thread draining a FIFO queue, so transactions submitted for the
//! same bus complete in submission order while buses progress independently.
//! Callers never block: `submit` queues the request and returns, and the
//! completion runs exactly once on the worker thread (or on the caller's
//! thread when the request is rejected before queueing).

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use hashbrown::HashMap;
use pbus_api::error::{bad_state, Error, Result};
use pbus_api::protocol::I2cImplProtocol;
use pbus_api::sync::{AtomicBool, Mutex, Ordering};

/// Outcome of one transaction: the bytes read, or the failure
pub type I2cResult = Result<Vec<u8>>;

/// Completion callback of a transaction
pub type I2cCompletion = Box<dyn FnOnce(I2cResult) + Send + 'static>;

struct I2cRequest {
    address: u16,
    write: Vec<u8>,
    read_len: usize,
    completion: I2cCompletion,
}

struct BusWorker {
    max_transfer: usize,
    queue: Sender<I2cRequest>,
    thread: Option<JoinHandle<()>>,
}

/// Pending transaction whose result arrives over a channel
pub struct I2cPending {
    rx: Receiver<I2cResult>,
}

impl I2cPending {
    /// Creates the pending half and the completion that fulfils it
    pub fn new() -> (Self, I2cCompletion) {
        let (tx, rx) = mpsc::channel();
        let completion: I2cCompletion = Box::new(move |result| {
            // The receiver may already be gone; nobody is left to tell.
            let _ = tx.send(result);
        });
        (Self { rx }, completion)
    }

    /// Blocks until the transaction completes
    pub fn wait(self) -> I2cResult {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(bad_state("i2c completion dropped")))
    }

    /// Returns the result if the transaction has completed
    pub fn try_result(&self) -> Option<I2cResult> {
        self.rx.try_recv().ok()
    }
}

/// Per-bus transaction queues over one I2C transport
pub struct I2cCoordinator {
    workers: Mutex<HashMap<u32, BusWorker>>,
    stopped: AtomicBool,
}

impl I2cCoordinator {
    /// Spawns one worker per bus reported by `transport`.
    pub fn start(transport: Arc<dyn I2cImplProtocol>, thread_prefix: &str) -> Result<Self> {
        let bus_count = transport.bus_count();
        let mut workers = HashMap::new();

        for bus_id in 0..bus_count {
            let max_transfer = transport.max_transfer_size(bus_id)?;
            let (queue, rx) = mpsc::channel();
            let worker_transport = transport.clone();
            let thread = thread::Builder::new()
                .name(format!("{}-{}", thread_prefix, bus_id))
                .spawn(move || run_worker(bus_id, worker_transport, rx))
                .map_err(|e| {
                    log::error!("i2c: failed to start worker for bus {}: {}", bus_id, e);
                    Error::ResourceExhausted
                })?;
            workers.insert(
                bus_id,
                BusWorker {
                    max_transfer,
                    queue,
                    thread: Some(thread),
                },
            );
        }

        log::info!("i2c: coordinator started with {} bus(es)", bus_count);
        Ok(Self {
            workers: Mutex::new(workers),
            stopped: AtomicBool::new(false),
        })
    }

    /// Number of physical buses
    pub fn bus_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Largest single transfer accepted on `bus_id`
    pub fn max_transfer_size(&self, bus_id: u32) -> Result<usize> {
        self.workers
            .lock()
            .get(&bus_id)
            .map(|w| w.max_transfer)
            .ok_or(Error::InvalidChannel)
    }

    /// Queues a transaction on `bus_id`; `completion` receives the outcome.
    pub fn submit(&self, bus_id: u32, address: u16, write: Vec<u8>, read_len: usize, completion: I2cCompletion) {
        let request = I2cRequest {
            address,
            write,
            read_len,
            completion,
        };

        let rejected = if self.stopped.load(Ordering::Acquire) {
            Some((request, bad_state("i2c coordinator stopped")))
        } else {
            let workers = self.workers.lock();
            match workers.get(&bus_id) {
                None => Some((request, Error::InvalidChannel)),
                Some(w) if request.write.len() > w.max_transfer || request.read_len > w.max_transfer => {
                    let err = Error::InvalidArgument(format!(
                        "transfer of {}/{} bytes exceeds bus {} maximum of {}",
                        request.write.len(),
                        request.read_len,
                        bus_id,
                        w.max_transfer
                    ));
                    Some((request, err))
                }
                Some(w) => match w.queue.send(request) {
                    Ok(()) => None,
                    Err(mpsc::SendError(request)) => Some((request, bad_state("i2c worker gone"))),
                },
            }
        };

        // Completions run outside the worker map lock; they may submit again.
        if let Some((request, err)) = rejected {
            log::debug!("i2c: rejected transaction on bus {}: {}", bus_id, err);
            (request.completion)(Err(err));
        }
    }

    /// Stops accepting work, drains the queues and joins the workers.
    ///
    /// Called from a worker (a completion dropping the last bus reference),
    /// that worker is detached instead of joined and exits once its
    /// completion returns.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        let current = thread::current().id();
        let workers: Vec<BusWorker> = self.workers.lock().drain().map(|(_, w)| w).collect();
        for mut worker in workers {
            let thread = worker.thread.take();
            drop(worker);
            match thread {
                Some(thread) if thread.thread().id() == current => {
                    log::debug!("i2c: shutdown on worker {:?}, detaching it", thread.thread().name());
                }
                Some(thread) => {
                    if thread.join().is_err() {
                        log::error!("i2c: worker panicked");
                    }
                }
                None => {}
            }
        }
        log::info!("i2c: coordinator stopped");
    }
}

impl Drop for I2cCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(bus_id: u32, transport: Arc<dyn I2cImplProtocol>, rx: Receiver<I2cRequest>) {
    log::debug!("i2c: worker for bus {} running", bus_id);
    for request in rx {
        let result = match transport.transact(bus_id, request.address, &request.write, request.read_len) {
            Ok(data) if data.len() == request.read_len => Ok(data),
            Ok(data) => {
                log::warn!(
                    "i2c: bus {} addr {:#x} returned {} bytes, expected {}",
                    bus_id,
                    request.address,
                    data.len(),
                    request.read_len
                );
                Err(Error::BusError)
            }
            Err(Error::Timeout) => Err(Error::Timeout),
            Err(e) => {
                log::warn!("i2c: bus {} addr {:#x} failed: {}", bus_id, request.address, e);
                Err(Error::BusError)
            }
        };
        (request.completion)(result);
    }
    log::debug!("i2c: worker for bus {} exiting", bus_id);
}

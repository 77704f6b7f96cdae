//! Fixed-size worker pool driving the cooperative task graph.
//!
//! Each task owns its private state and is re-entered through jobs posted to
//! this pool; jobs for a single task are never run concurrently with one
//! another as long as the caller only ever posts its next job from within
//! the previous one (the "slot message" discipline of §5). A panicking job
//! does not shrink the pool: the worker that ran it is replaced in place.
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::{JoinHandle, panicking, spawn};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    NewJob(Job),
    Terminate,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ThreadPoolError {
    SendFailed,
}

impl fmt::Display for ThreadPoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadPoolError::SendFailed => write!(f, "failed to send job to worker thread"),
        }
    }
}

impl std::error::Error for ThreadPoolError {}

/// RAII guard held by every worker thread. On drop (normal exit or unwind)
/// it decrements the live count, and on unwind it immediately respawns a
/// replacement worker so the pool's capacity never shrinks after a panic.
struct Sentinel {
    shared: Arc<Shared>,
}

impl Drop for Sentinel {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
        if panicking() {
            self.shared.spawn_worker();
        }
    }
}

struct Shared {
    receiver: Mutex<Receiver<Message>>,
    live: AtomicUsize,
    capacity: usize,
}

impl Shared {
    fn spawn_worker(self: &Arc<Self>) -> JoinHandle<()> {
        self.live.fetch_add(1, Ordering::SeqCst);
        let shared = Arc::clone(self);

        spawn(move || {
            let _sentinel = Sentinel {
                shared: Arc::clone(&shared),
            };

            loop {
                let msg = {
                    let rx = match shared.receiver.lock() {
                        Ok(guard) => guard,
                        Err(_) => break,
                    };
                    rx.recv()
                };

                match msg {
                    Ok(Message::NewJob(job)) => job(),
                    Ok(Message::Terminate) | Err(_) => break,
                }
            }
        })
    }
}

/// A fixed-size pool of OS threads executing posted jobs.
pub struct ThreadPool {
    handles: Vec<Option<JoinHandle<()>>>,
    sender: Sender<Message>,
    shared: Arc<Shared>,
}

impl ThreadPool {
    pub fn new(mut size: usize) -> ThreadPool {
        if size == 0 {
            size = 1;
        }

        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared {
            receiver: Mutex::new(rx),
            live: AtomicUsize::new(0),
            capacity: size,
        });

        let mut handles = Vec::with_capacity(size);
        for _ in 0..size {
            handles.push(Some(shared.spawn_worker()));
        }

        ThreadPool {
            handles,
            sender: tx,
            shared,
        }
    }

    pub fn execute<F>(&self, job: F) -> Result<(), ThreadPoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .send(Message::NewJob(Box::new(job)))
            .map_err(|_| ThreadPoolError::SendFailed)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn live_workers(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        for _ in 0..self.shared.capacity {
            let _ = self.sender.send(Message::Terminate);
        }
        for handle in &mut self.handles {
            if let Some(h) = handle.take() {
                let _ = h.join();
            }
        }
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("capacity", &self.shared.capacity)
            .field("live", &self.shared.live.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn zero_size_defaults_to_one() {
        let pool = ThreadPool::new(0);
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn executes_job() {
        let pool = ThreadPool::new(2);
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);
        pool.execute(move || *c.lock().unwrap() += 1).unwrap();
        sleep(Duration::from_millis(100));
        assert_eq!(*counter.lock().unwrap(), 1);
    }

    #[test]
    fn survives_panicking_job() {
        let pool = ThreadPool::new(2);
        pool.execute(|| panic!("boom")).unwrap();
        sleep(Duration::from_millis(100));
        assert_eq!(pool.live_workers(), 2);

        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);
        pool.execute(move || *c.lock().unwrap() += 1).unwrap();
        sleep(Duration::from_millis(100));
        assert_eq!(*counter.lock().unwrap(), 1);
    }
}

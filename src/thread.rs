// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Supervised worker threads and the bounded queue that joins them.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::mem::drop;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use log::{error, info};

////////////////////////////////////////////////////////////////////////
// THREAD GROUPS                                                      //
////////////////////////////////////////////////////////////////////////

/// A group of respawnable threads managed together.
///
/// Threads are started with [`ThreadGroup::start_respawnable`]. If a
/// thread's task returns or panics while the group is running, the task
/// is started again on a fresh thread.
///
/// A `ThreadGroup` is shut down through [`ThreadGroup::shut_down`].
/// No new threads can be started after that, and exiting threads are no
/// longer respawned. Long-running tasks should therefore watch
/// [`ThreadGroup::is_shutting_down`], or block on something that a
/// shutdown hook ([`ThreadGroup::on_shutdown`]) releases, and return
/// when the group shuts down. [`ThreadGroup::await_shutdown`] waits
/// until every thread has exited.
pub struct ThreadGroup {
    records: Mutex<GroupRecords>,

    /// Notified, together with the `records` mutex, when shutdown is
    /// initiated and when the last thread exits afterwards.
    shutdown_wakeup: Condvar,
}

/// The internal records of a [`ThreadGroup`].
#[derive(Default)]
struct GroupRecords {
    thread_count: usize,
    shutting_down: bool,
    shutdown_hooks: Vec<Box<dyn FnOnce() + Send + 'static>>,
}

impl ThreadGroup {
    /// Creates a new thread group.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(GroupRecords::default()),
            shutdown_wakeup: Condvar::new(),
        })
    }

    /// Starts a respawnable thread in the `ThreadGroup`. The thread
    /// will execute `task`. If `task` exits or panics and the
    /// `ThreadGroup` is not shutting down, a new thread will be started
    /// to execute `task` again. Successive starts are spaced at least
    /// [`THREAD_RESPAWN_DELAY`] apart, so that a task that fails
    /// immediately does not spin.
    pub fn start_respawnable<F>(self: &Arc<Self>, name: &str, task: F) -> Result<(), Error>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut records = self.records.lock().unwrap();
        if records.shutting_down {
            Err(Error::ShuttingDown)
        } else {
            start_respawnable(self.clone(), &mut records, name.to_owned(), Arc::new(task))
                .map_err(Into::into)
        }
    }

    /// Registers `hook` to run once when the group shuts down. If the
    /// group is already shutting down, `hook` runs immediately.
    pub fn on_shutdown<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut records = self.records.lock().unwrap();
        if records.shutting_down {
            drop(records);
            hook();
        } else {
            records.shutdown_hooks.push(Box::new(hook));
        }
    }

    /// Shuts down the `ThreadGroup` and runs its shutdown hooks.
    pub fn shut_down(&self) {
        let mut records = self.records.lock().unwrap();
        records.shutting_down = true;
        let hooks = std::mem::take(&mut records.shutdown_hooks);
        self.shutdown_wakeup.notify_all();
        drop(records);
        for hook in hooks {
            hook();
        }
    }

    /// Waits for the `ThreadGroup` to shut down. This is defined as (1)
    /// shutdown having been initiated ([`ThreadGroup::shut_down`]) and
    /// (2) the thread count having dropped to zero. Calling this from a
    /// thread within the group deadlocks, since the thread count can
    /// then never reach zero.
    pub fn await_shutdown(&self) {
        let records = self.records.lock().unwrap();
        let _guard = self
            .shutdown_wakeup
            .wait_while(records, |r| !r.shutting_down || r.thread_count > 0)
            .unwrap();
    }

    /// Returns whether the `ThreadGroup` is shutting down.
    pub fn is_shutting_down(&self) -> bool {
        self.records.lock().unwrap().shutting_down
    }
}

/// The minimum time between successive starts of a respawnable thread.
/// A thread that exits sooner than this after its start waits out the
/// remainder before respawning.
pub const THREAD_RESPAWN_DELAY: Duration = Duration::from_secs(1);

/// A handle owned by a respawnable thread. Dropping it (when the thread
/// exits or panics) updates the group's records and, unless the group
/// is shutting down, starts the task again.
struct RespawnableHandle<F>
where
    F: Fn() + Send + Sync + 'static,
{
    group: Arc<ThreadGroup>,
    parent: ThreadId,
    task: Arc<F>,
    last_start: Instant,
}

/// The implementation of respawnable thread creation.
fn start_respawnable<F>(
    group: Arc<ThreadGroup>,
    records: &mut MutexGuard<GroupRecords>,
    name: String,
    task: Arc<F>,
) -> io::Result<()>
where
    F: Fn() + Send + Sync + 'static,
{
    records.thread_count += 1;
    let handle = RespawnableHandle {
        group,
        parent: thread::current().id(),
        task,
        last_start: Instant::now(),
    };
    let result = thread::Builder::new().name(name).spawn(move || {
        (handle.task)();
        drop(handle);
    });
    if result.is_err() {
        records.thread_count -= 1;
    }
    result.and(Ok(()))
}

impl<F> Drop for RespawnableHandle<F>
where
    F: Fn() + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let current_thread = thread::current();
        let thread_name = current_thread.name().unwrap_or("anonymous");

        // Being dropped in the parent thread means the OS refused to
        // start the thread; start_respawnable already holds the records
        // mutex and cleans up.
        if current_thread.id() == self.parent {
            return;
        }

        if thread::panicking() {
            error!("Worker thread {} panicked", thread_name);
        }

        let mut records = self.group.records.lock().unwrap();
        if !records.shutting_down {
            if !thread::panicking() {
                error!("Worker thread {} exited prematurely", thread_name);
            }

            let since_last_start = Instant::now().duration_since(self.last_start);
            if since_last_start < THREAD_RESPAWN_DELAY {
                // The wait releases the records mutex, and a shutdown
                // notification cuts it short.
                let wait_for = THREAD_RESPAWN_DELAY - since_last_start;
                info!(
                    "Respawn of thread {} throttled: delayed by {} ms",
                    thread_name,
                    wait_for.as_millis()
                );
                records = self
                    .group
                    .shutdown_wakeup
                    .wait_timeout(records, wait_for)
                    .unwrap()
                    .0;
            }

            if !records.shutting_down {
                let result = start_respawnable(
                    self.group.clone(),
                    &mut records,
                    thread_name.to_owned(),
                    self.task.clone(),
                );
                if let Err(e) = result {
                    error!("Respawn of thread {} failed: {}", thread_name, e);
                }
            }
        }

        records.thread_count -= 1;
        if records.shutting_down && records.thread_count == 0 {
            self.group.shutdown_wakeup.notify_all();
        }
    }
}

////////////////////////////////////////////////////////////////////////
// BOUNDED QUEUES                                                     //
////////////////////////////////////////////////////////////////////////

/// A fixed-capacity FIFO queue for handing items from producer threads
/// to consumer threads.
///
/// [`BoundedQueue::put`] blocks while the queue is full and
/// [`BoundedQueue::take`] blocks while it is empty, so a slow consumer
/// throttles its producers. Once [closed](BoundedQueue::close), the
/// queue accepts nothing more, but items already in it can still be
/// taken.
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,

    /// Notified when an item is taken or the queue is closed.
    not_full: Condvar,

    /// Notified when an item is put or the queue is closed.
    not_empty: Condvar,
}

struct QueueState<T> {
    items: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

impl<T> BoundedQueue<T> {
    /// Creates an empty queue holding at most `capacity` items. A
    /// capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                capacity,
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Appends `item` to the queue, waiting for room if it is full.
    /// Fails if the queue is closed, before or during the wait.
    pub fn put(&self, item: T) -> Result<(), Closed> {
        let state = self.state.lock().unwrap();
        let mut state = self
            .not_full
            .wait_while(state, |s| !s.closed && s.items.len() >= s.capacity)
            .unwrap();
        if state.closed {
            return Err(Closed);
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the oldest item from the queue, waiting for one if the
    /// queue is empty. Returns `None` once the queue is closed and
    /// drained.
    pub fn take(&self) -> Option<T> {
        let state = self.state.lock().unwrap();
        let mut state = self
            .not_empty
            .wait_while(state, |s| !s.closed && s.items.is_empty())
            .unwrap();
        let item = state.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Closes the queue, waking every blocked caller.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Returns whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Returns the number of items in the queue.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    /// Returns whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of items the queue holds.
    pub fn capacity(&self) -> usize {
        self.state.lock().unwrap().capacity
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error type for [`ThreadGroup`] operations.
#[derive(Debug)]
pub enum Error {
    /// An OS-level error occurred during the creation of a thread.
    Io(io::Error),

    /// The [`ThreadGroup`] is shutting down.
    ShuttingDown,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(err) => err.fmt(f),
            Self::ShuttingDown => f.write_str("thread group is shutting down"),
        }
    }
}

impl std::error::Error for Error {}

/// The error returned when putting into a closed [`BoundedQueue`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Closed;

impl fmt::Display for Closed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("queue is closed")
    }
}

impl std::error::Error for Closed {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn await_shutdown_works() {
        let exited = Arc::new(Mutex::new(0));
        let group = ThreadGroup::new();
        const SLEEP_DURATION: Duration = Duration::from_millis(100);
        let start = Instant::now();
        for i in 0..2 {
            let exited_cloned = exited.clone();
            let group_cloned = group.clone();
            group
                .start_respawnable(&format!("sleeper {}", i), move || loop {
                    thread::sleep(SLEEP_DURATION);
                    if group_cloned.is_shutting_down() {
                        *exited_cloned.lock().unwrap() += 1;
                        return;
                    }
                })
                .unwrap();
        }
        group.shut_down();
        group.await_shutdown();
        assert!(Instant::now().duration_since(start) > SLEEP_DURATION);
        assert_eq!(*exited.lock().unwrap(), 2);
    }

    #[test]
    fn respawnable_threads_respawn() {
        let times_executed = Arc::new(Mutex::new(0));
        let times_executed_cloned = times_executed.clone();
        let wakeup = Arc::new(Condvar::new());
        let wakeup_cloned = wakeup.clone();
        let group = ThreadGroup::new();
        group
            .start_respawnable("counter", move || {
                let mut times_executed = times_executed_cloned.lock().unwrap();
                *times_executed += 1;
                wakeup_cloned.notify_all();
            })
            .unwrap();
        let times_executed = times_executed.lock().unwrap();
        let times_executed = wakeup.wait_while(times_executed, |n| *n < 2).unwrap();
        assert!(*times_executed >= 2);
        drop(times_executed);
        group.shut_down();
        group.await_shutdown();
    }

    #[test]
    fn thread_group_rejects_new_threads_after_shutdown() {
        let group = ThreadGroup::new();
        group.shut_down();
        assert!(matches!(
            group.start_respawnable("late", || ()),
            Err(Error::ShuttingDown)
        ));
    }

    #[test]
    fn shutdown_hooks_run_once() {
        let group = ThreadGroup::new();
        let runs = Arc::new(Mutex::new(0));
        let runs_cloned = runs.clone();
        group.on_shutdown(move || *runs_cloned.lock().unwrap() += 1);
        group.shut_down();
        group.shut_down();
        assert_eq!(*runs.lock().unwrap(), 1);

        // Hooks registered after shutdown run right away.
        let runs_cloned = runs.clone();
        group.on_shutdown(move || *runs_cloned.lock().unwrap() += 1);
        assert_eq!(*runs.lock().unwrap(), 2);
    }

    #[test]
    fn queue_is_fifo() {
        let queue = BoundedQueue::new(3);
        for i in 0..3 {
            queue.put(i).unwrap();
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.take(), Some(0));
        assert_eq!(queue.take(), Some(1));
        assert_eq!(queue.take(), Some(2));
        assert!(queue.is_empty());
    }

    #[test]
    fn put_blocks_while_full() {
        let queue = Arc::new(BoundedQueue::new(2));
        queue.put(1).unwrap();
        queue.put(2).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = queue.clone();
            let done = done.clone();
            thread::spawn(move || {
                queue.put(3).unwrap();
                done.store(true, Ordering::SeqCst);
            })
        };
        thread::sleep(Duration::from_millis(100));
        assert!(!done.load(Ordering::SeqCst));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.take(), Some(1));
        producer.join().unwrap();
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(queue.take(), Some(2));
        assert_eq!(queue.take(), Some(3));
    }

    #[test]
    fn close_wakes_blocked_callers() {
        let queue = Arc::new(BoundedQueue::<u32>::new(1));
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.take())
        };
        thread::sleep(Duration::from_millis(50));
        queue.close();
        assert_eq!(consumer.join().unwrap(), None);

        let queue = Arc::new(BoundedQueue::new(1));
        queue.put(1).unwrap();
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || queue.put(2))
        };
        thread::sleep(Duration::from_millis(50));
        queue.close();
        assert_eq!(producer.join().unwrap(), Err(Closed));
    }

    #[test]
    fn closed_queue_drains() {
        let queue = BoundedQueue::new(4);
        queue.put("a").unwrap();
        queue.put("b").unwrap();
        queue.close();
        assert!(queue.is_closed());
        assert_eq!(queue.put("c"), Err(Closed));
        assert_eq!(queue.take(), Some("a"));
        assert_eq!(queue.take(), Some("b"));
        assert_eq!(queue.take(), None);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let queue = BoundedQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.put(()).unwrap();
        assert_eq!(queue.len(), 1);
    }
}

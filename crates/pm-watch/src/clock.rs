//! Sleep abstraction for poll loops
//!
//! The watcher never reads a clock; it only sleeps between samples and counts
//! the intervals. Swapping the sleeper is what lets the poll loops run against
//! simulated time (see [`crate::sim::SimClock`]).

use std::fmt::Debug;
use std::time::Duration;

/// Something that can block the calling thread for a while
pub trait Sleeper: Debug + Send {
    /// Block for `interval`
    fn sleep(&mut self, interval: Duration);
}

/// Real sleeper backed by `std::thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for Box<S> {
    fn sleep(&mut self, interval: Duration) {
        (**self).sleep(interval);
    }
}

//! Blocking primitives used to bound and observe concurrent writers.

mod semaphore;
mod wait_group;

pub use semaphore::CountingSemaphore;
pub use wait_group::WaitGroup;

//! Kernel threads and the synchronization primitives built on them.
pub mod alarm;
pub mod communicator;
pub mod condition;
pub mod kthread;
pub mod lock;
pub mod semaphore;

pub use alarm::Alarm;
pub use communicator::Communicator;
pub use condition::Condition2;
pub use kthread::KThread;
pub use lock::Lock;
pub use semaphore::Semaphore;

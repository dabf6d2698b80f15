// Storage module

pub mod object_store;
pub mod queue;

pub use object_store::{FsObjectStore, ObjectStore};
pub use queue::{InProcessQueue, NotificationQueue, QueueMessage};

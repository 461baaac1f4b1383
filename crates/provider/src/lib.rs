pub mod admin;
pub mod error;
pub mod log;
pub mod memory;
pub mod object;
pub mod publisher;
pub mod subscription;

pub use admin::{BucketNotification, IamBinding, IamPolicy, InfraAdmin, NotificationRequest};
pub use error::ProviderError;
pub use log::LogPublisher;
pub use memory::MemoryObjectStore;
pub use object::{ObjectStore, StoredObject};
pub use publisher::{DynPublisher, Publisher};
pub use subscription::{EventSource, ReceivedMessage};

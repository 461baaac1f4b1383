pub mod blob;
pub mod draft;
pub mod error;
pub mod event;
pub mod form;
pub mod notification;
pub mod subject;
pub mod topology;

pub use blob::{BlobId, object_key};
pub use draft::{DraftKind, DraftRecord};
pub use error::CoreError;
pub use event::{DraftMetadata, EventKind, LifecycleTransition, StorageEvent};
pub use form::FormType;
pub use notification::{ItemKind, NotificationKey, NotificationKind, NotificationMessage};
pub use subject::SubjectId;
pub use topology::BucketTopology;

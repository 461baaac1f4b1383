//! Google Cloud implementations of the draftsync collaborators.
//!
//! - [`GcpInfraAdmin`]: topics, subscriptions, topic IAM policy, bucket
//!   notifications and the storage service account, over the REST APIs
//! - [`PullSubscription`]: Pub/Sub pull, acknowledge and release
//! - [`GcpKmsKek`]: Cloud KMS key wrapping for envelope encryption
//! - **Pub/Sub publishing** (`pubsub` feature): [`PubSubPublisher`]
//! - **Cloud Storage objects** (`storage` feature): [`GcsObjectStore`]
//!
//! All clients share a [`GcpBaseConfig`] for project ID, credentials and
//! endpoint overrides.

pub mod admin;
pub mod auth;
pub mod config;
pub mod error;
pub mod kms;
mod rest;
pub mod subscriber;

#[cfg(feature = "pubsub")]
pub mod publisher;

#[cfg(feature = "storage")]
pub mod storage;

pub use admin::GcpInfraAdmin;
pub use auth::AccessTokenSource;
pub use config::{GcpBaseConfig, RestEndpoints};
pub use error::GcpProviderError;
pub use kms::GcpKmsKek;
pub use rest::RestClient;
pub use subscriber::PullSubscription;

#[cfg(feature = "pubsub")]
pub use publisher::PubSubPublisher;

#[cfg(feature = "storage")]
pub use storage::GcsObjectStore;

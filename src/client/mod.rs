//! Everything that turns a raw byte stream into a running AMI client:
//! configuration, the error taxonomy, the pending-request table, the
//! subscription hub, the login/logoff conveniences, the builder, and the
//! `Client` type itself that ties them to the reader task.

pub mod builder;
pub mod config;
pub mod core;
pub mod error;
pub mod hub;
pub mod login;
pub mod pending;

pub use builder::ClientBuilder;
pub use config::{ActionIdGenerator, BackpressurePolicy, ClientConfig, UuidActionIdGenerator};
pub use core::Client;
pub use error::{ClientError, Result};
pub use hub::Subscription;

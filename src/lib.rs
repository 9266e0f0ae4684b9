//! A multiplexing client for the Asterisk Manager Interface (AMI).
//!
//! AMI is a line-oriented, CRLF-delimited text protocol spoken over a single
//! bidirectional TCP stream. This crate turns that one stream into two
//! logically independent surfaces: request/reply (many callers may have a
//! request outstanding at once) and a fan-out event stream (unsolicited
//! server messages, and solicited follow-up events that share an `ActionID`
//! with a prior request).
//!
//! # Quick start
//!
//! ```rust,no_run
//! use ami_client::ClientBuilder;
//!
//! # async fn example() -> ami_client::Result<()> {
//! let client = ClientBuilder::connect("localhost:5038").await?;
//! client.login("admin", "secret", false).await?;
//!
//! let reply = client.publish(client.action("Ping")).await?;
//! assert_eq!(reply.get("Response"), Some("Pong"));
//!
//! let mut events = client.subscribe().await;
//! while let Some(event) = events.recv().await {
//!     match event {
//!         Ok(msg) => println!("event: {:?}", msg.get("Event")),
//!         Err(_cause) => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! * [`message`] — the in-memory `Message` representation and its wire codec.
//! * [`framer`] — splits an inbound byte stream into `CRLFCRLF`-delimited frames.
//! * [`connection`] — the split reader/writer halves built on top of the framer.
//! * [`client`] — the pending-request table, subscription hub, and the
//!   `Client` type that ties the reader task, writer and both tables
//!   together.

pub mod client;
pub mod connection;
pub mod framer;
pub mod message;

#[cfg(test)]
mod tests;

pub use client::{
    ActionIdGenerator, BackpressurePolicy, Client, ClientBuilder, ClientConfig, ClientError,
    Result, Subscription, UuidActionIdGenerator,
};
pub use message::Message;

//! DX Cluster Client - A Rust library and CLI for amateur radio DX cluster feeds.
//!
//! This crate provides:
//! - A nom-based parser for `DX de` spot lines
//! - A bounded, thread-safe history of received spots with query helpers
//! - Per-region IARU band plans
//! - An async telnet client that logs in and streams spots in the background
//!
//! # Example
//!
//! ```rust,no_run
//! use dx_cluster_client::{ClusterClient, ClusterClientConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ClusterClientConfig::with_callsign("W6JSV").with_server("dxc.nc7j.com", 7300);
//! let client = ClusterClient::new(config)?;
//! client.connect().await?;
//!
//! for spot in client.by_band("20m", None) {
//!     println!("{}", spot);
//! }
//!
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod band;
pub mod client;
pub mod config;
pub mod http;
pub mod parser;
pub mod query;
pub mod spot;
pub mod store;

pub use band::{InvalidRegion, Region};
pub use client::{
    ClientError, ClusterClient, ClusterClientConfig, ClusterStatus, ConnectionState,
};
pub use config::{Config, ConfigError};
pub use parser::{ParseError, looks_like_spot, parse, parse_spot};
pub use spot::DxSpot;
pub use store::SpotStore;

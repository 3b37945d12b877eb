//! Garden Relay - Grow A Garden stock notification relay.
//!
//! This crate provides the relay that keeps registered users informed about
//! the in-game shop, responsible for:
//! - Persisting the set of registered users
//! - Aggregating the six upstream stock feeds into one report
//! - Running one repeating delivery session per tracking user
//!
//! # Architecture
//!
//! A bot front-end forwards user commands to the HTTP command API
//! ([`routes`]). Tracking users get a periodic report built by the
//! [`aggregator`] and handed to a [`delivery`] channel; a session ends on
//! request or as soon as its user turns out to be unreachable.

pub mod aggregator;
pub mod commands;
pub mod config;
pub mod countdown;
pub mod delivery;
pub mod error;
pub mod feeds;
pub mod report;
pub mod routes;
pub mod session;
pub mod store;

pub use aggregator::{ReportSource, StockAggregator};
pub use commands::CommandHandler;
pub use config::Config;
pub use delivery::{Delivery, DeliveryError, WebhookDelivery};
pub use error::{RelayError, Result};
pub use report::StockReport;
pub use session::SessionManager;
pub use store::{JsonFileUserStore, MemoryUserStore, RegisterOutcome, UserStore};

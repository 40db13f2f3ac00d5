//! Core library for the `route-watch` CLI.
//!
//! Monitors configured routes for traffic congestion by comparing current
//! travel time against a free-flow baseline and, when a congested route has
//! a faster alternative, fires a configurable notification command.
//!
//! - [`config`]: route, provider and notification configuration
//! - [`provider`]: the [`RouteProvider`] trait and its Mapbox, Google Maps
//!   and mock implementations
//! - [`monitor`]: congestion evaluation and the alternative-route check
//! - [`notify`]: subprocess-based notification delivery
//! - [`worker`]: the `check`, `populate-free-flow` and `watch` entry points

pub mod config;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod provider;
pub mod worker;

pub use config::{Config, LatLong, NotificationConfig, RouteConfig};
pub use error::Error;
pub use monitor::{CongestionReport, RouteMonitor};
pub use notify::Notifier;
pub use provider::{RouteProvider, Traffic, TravelEstimate};

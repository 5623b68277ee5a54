//! Travel-time sampling over a road network.
//!
//! The pipeline runs in three stages, each leaving a document on disk for the
//! next:
//!
//! 1. [`sampler`] draws origin/destination pairs from a [`graph::RoadGraph`]
//!    and writes a [`sampler::RouteQueue`].
//! 2. [`collect`] queries a directions page for every pair in one time window,
//!    checkpointing as it goes, and writes raw [`collect::ResultRecord`]s.
//! 3. [`aggregate`] filters, groups and averages the records, derives speeds,
//!    flags implausible results, and [`export`] writes them as vector features.

pub mod aggregate;
pub mod collect;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod geo;
pub mod geocode;
pub mod graph;
pub mod output;
pub mod parser;
pub mod rng;
pub mod sampler;
pub mod store;
pub mod window;

//! AI Pulse - A Hebrew AI News Aggregator
//!
//! This crate collects AI stories from official blogs, local channels, tech
//! news and community sites, ranks them by source priority and recency, and
//! attaches Hebrew display text before writing a single JSON snapshot.

pub mod aggregator;
pub mod classify;
pub mod config;
pub mod enrich;
pub mod fetcher;
pub mod model;
pub mod routes;
pub mod store;
pub mod translate;

//! # Helpdesk Insight Core
//!
//! Shared, runtime-free logic for Helpdesk Insight: ticket models,
//! tokenization, the inverted index and IDF table, similarity scoring,
//! train/test evaluation, root-cause and heatmap aggregates, and SLA
//! risk scoring.
//!
//! This crate contains no tokio, network, or filesystem dependencies.
//! Everything here is synchronous and operates on immutable inputs; the
//! only async surface is the [`oracle::TextOracle`] trait, which the
//! application crate implements.

pub mod aggregate;
pub mod evaluate;
pub mod index;
pub mod models;
pub mod oracle;
pub mod similarity;
pub mod sla;
pub mod tokenize;

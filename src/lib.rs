//! # Helpdesk Insight
//!
//! Ticket similarity search, classification, and SLA risk engine for a
//! helpdesk dashboard.
//!
//! The algorithms live in the runtime-free `helpdesk-insight-core` crate.
//! This crate wires them into a service: configuration, upload ingestion,
//! the text oracle client, the training orchestrator, a CLI and an HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────────────┐
//! │ JSON upload │──▶│   Ingest    │──▶│ Engine (snapshot)    │
//! │   (rows)    │   │ col mapping │   │ index+eval+aggregate │
//! └─────────────┘   └─────────────┘   └──────────┬───────────┘
//!                                                │   ▲
//!                      ┌─────────────────────────┤   │ paced
//!                      ▼                         ▼   │
//!                 ┌──────────┐             ┌──────────┐ ┌────────┐
//!                 │   CLI    │             │   HTTP   │ │ Oracle │
//!                 │  (hdi)   │             │  (axum)  │ │ (chat) │
//!                 └──────────┘             └──────────┘ └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! hdi train tickets.json
//! hdi search tickets.json "vpn timeout"
//! hdi sla tickets.json --now 2024-06-01T09:00:00Z
//! hdi serve --upload tickets.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`ingest`] | Upload rows → corpus |
//! | [`oracle`] | Text oracle providers and suggestion retry |
//! | [`pacing`] | Rate-limited task queue |
//! | [`engine`] | Training cycles and read models |
//! | [`report`] | CLI command output |
//! | [`server`] | JSON HTTP API |

pub mod config;
pub mod engine;
pub mod ingest;
pub mod oracle;
pub mod pacing;
pub mod report;
pub mod server;

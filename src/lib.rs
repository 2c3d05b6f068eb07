//! # Pagesmith
//!
//! A search endpoint that answers every query with a topic page. Queries
//! that match an existing page (exactly or by substring) reuse it; anything
//! else is aggregated from external sources, written up by a language
//! model, and stored so the next request for it is a lookup.
//!
//! ## Architecture
//!
//! ```text
//!  POST /api/search
//!         │
//!         ▼
//! ┌────────────────┐  hit   ┌──────────┐
//! │  Orchestrator  │───────▶│  SQLite  │
//! └───────┬────────┘        └────▲─────┘
//!         │ miss                 │
//!         ▼                      │
//! ┌────────────┐  ┌───────────┐  │  ┌─────────┐
//! │ Aggregator │─▶│ Generator │──┴─▶│  Cache  │
//! └────────────┘  └───────────┘     └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pagesmith init                    # create database
//! pagesmith search "rust traits"    # find or generate a page
//! pagesmith get 1                   # print a stored page
//! pagesmith serve                   # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`query`] | Query validation and normalization |
//! | [`matching`] | Fuzzy-match policy |
//! | [`store`] | Page persistence (SQLite and in-memory) |
//! | [`aggregate`] | External content aggregation |
//! | [`generate`] | LLM page generation |
//! | [`extract`] | Title/description/thumbnail extraction |
//! | [`cache`] | Result cache |
//! | [`activity`] | Best-effort activity and view tracking |
//! | [`orchestrator`] | The search request flow |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod activity;
pub mod aggregate;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod generate;
pub mod get;
pub mod matching;
pub mod migrate;
pub mod models;
pub mod orchestrator;
pub mod query;
pub mod search;
pub mod server;
pub mod store;

//! # Product Sheet Generator
//!
//! Builds e-commerce product records and catalog sheets from an EAN barcode.
//!
//! An EAN is searched on the web, the raw results are flattened into a
//! [`models::SearchEvidence`] bundle, a product is generated from that
//! evidence, and optionally a sales/SEO sheet is derived from the product.
//! Both generation steps run either on deterministic templates or through a
//! text-generation provider, chosen once at startup.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌─────────┐   ┌───────┐   ┌──────────┐
//! │  Search  │──▶│ Extract │──▶│ Content │──▶│ Sheet │──▶│  Store   │
//! │ provider │   │evidence │   │generator│   │  gen  │   │ SQLite   │
//! └──────────┘   └─────────┘   └─────────┘   └───────┘   └────┬─────┘
//!                                                              │
//!                                    ┌─────────────────────────┤
//!                                    ▼                         ▼
//!                               ┌──────────┐             ┌──────────┐
//!                               │   CLI    │             │   HTTP   │
//!                               │  (psg)   │             │  (axum)  │
//!                               └──────────┘             └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! psg init                      # create database
//! psg generate 3401570052       # product + sheet from an EAN
//! psg sheets export <id>        # PrestaShop record
//! psg serve                     # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Classified error taxonomy |
//! | [`models`] | Core data types |
//! | [`search`] | Web search providers |
//! | [`extract`] | Search results → evidence |
//! | [`completion`] | Text-generation provider abstraction |
//! | [`reply`] | Strict JSON reply parsing |
//! | [`content`] | Product generation |
//! | [`sheet`] | Sheet generation |
//! | [`export`] | Export formats |
//! | [`store`] | Storage trait and backends |
//! | [`catalog`] | Product and sheet operations |
//! | [`pipeline`] | End-to-end orchestration |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod catalog;
pub mod completion;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod export;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod reply;
pub mod search;
pub mod server;
pub mod sheet;
pub mod store;

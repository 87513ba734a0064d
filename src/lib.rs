//! # Raidledger - Raid History Ledger for Local Match Servers
//!
//! Raidledger records what a player carries into a raid, what they bring
//! back out, and what it was all worth. It hooks a local match server's
//! raid lifecycle, snapshots inventories at the raid boundaries, prices the
//! difference, and keeps a compact per-player archive that players can
//! query from an in-game chat dialog or from the command line.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use raidledger::config::Config;
//! use raidledger::record::{RaidTracker, RecordStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let store = RecordStore::open(&config.ledger.data_dir).await?;
//!     let _tracker = RaidTracker::new(store, config.ledger.track_scav_raids);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`record`] - Ledger core: snapshots, valuation, lifecycle, archives, storage
//! - [`host`] - Contracts with the hosting game server (events, price catalog)
//! - [`chat`] - In-game chat command surface
//! - [`config`] - Configuration management and validation
//!
//! ## Architecture
//!
//! The host feeds lifecycle events into [`record::RaidTracker`]; everything
//! downstream is pure ledger logic:
//!
//! ```text
//! ┌─────────────────┐
//! │   Host events   │ ← raid start / raid end / id remap
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   RaidTracker   │ ← snapshot, reconcile, compress
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   RecordStore   │ ← per-player JSON persistence
//! └─────────────────┘
//!          ▲
//! ┌─────────────────┐
//! │ Chat / CLI      │ ← list, info, check
//! └─────────────────┘
//! ```

pub mod chat;
pub mod config;
pub mod host;
pub mod record;

//! # pricectl: bulk EC2 pricing from spreadsheet inventories
//!
//! `pricectl` takes an inventory of EC2 instances exported as a spreadsheet, prices every row
//! against a remote pricing service in one batched call, and presents the on-demand, savings plan
//! and reserved instance figures with their effective discounts. Priced batches can be exported
//! to a CSV file, an XLSX workbook or a remote spreadsheet, and every export attempt is recorded
//! in a persistent audit log.
//!
//! ## Pipeline
//!
//! An uploaded file passes through the [`ingest`] gate (type and size checks), is read into raw
//! header-keyed rows, and is normalized into [`types::PricingRequest`]s. Two header dialects are
//! understood: the plain `region_code, instance_type, ...` layout and billing exports whose headers
//! carry an `aws/` prefix.
//!
//! The [`dispatch::Dispatcher`] sends the whole batch through a [`client::PricingClient`] while
//! holding a single-flight busy flag, then publishes the outcome into the [`store::ResultStore`].
//! Consumers subscribe to the store and render it through a [`filter::ResultFilter`], which is a
//! pure projection over the stored outcomes.
//!
//! The [`export::ExportEngine`] turns a priced batch into one of the export targets and appends a
//! record to the [`history::ExportHistory`] whether the export succeeded or not. Remote exports
//! need the bearer token held by the [`auth::CredentialStore`].
//!
//! ## Configuration
//!
//! See [`config`] for the YAML file and `PRICECTL_` environment variables.

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod export;
pub mod filter;
pub mod history;
pub mod ingest;
pub mod storage;
pub mod store;
pub mod telemetry;
pub mod types;

pub use client::{HttpPricingClient, MockPricingClient, PricingClient};
pub use config::Config;
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use errors::{Error, Result};
pub use export::ExportEngine;
pub use history::ExportHistory;
pub use store::ResultStore;

//! pr-sisyphus - a label-driven, single-lane merge queue for GitHub
//!
//! PRs enter the queue when a human adds the `ready-to-merge` label. For
//! each repository the queue takes the oldest waiting PR, locks it with
//! `processing-merge`, and drives it through conflict, freshness and CI
//! checks until it is merged or kicked out with `error-conflict` or
//! `error-ci`. Labels are the only state; every pass re-reads them.
//!
//! # Architecture
//!
//! - [`queue`] - the reconciliation engine (pure planner + executor)
//! - [`platform`] - GitHub gateway traits and octocrab implementations
//! - [`sweep`] - reconcile every repository of every installation
//! - [`webhook`] - map event deliveries to repositories
//! - [`server`] - axum routes for webhooks, the scheduler and health
//! - [`config`] - TOML file plus environment overrides
//! - [`auth`] - App or token credentials for commands

pub mod auth;
pub mod config;
pub mod error;
pub mod platform;
pub mod queue;
pub mod server;
pub mod sweep;
pub mod types;
pub mod webhook;

//! Vendor Risk & Procurement Analytics API Library
//!
//! Scores supplier risk, ranks the vendors supplying an item and produces
//! heuristic procurement forecasts from purchase history. An external
//! language-model provider may refine risk and comparison results, but its
//! output is always reconciled against the local computation.
//!
//! # Modules
//!
//! - `models`: Procurement records and analytic result types.
//! - `errors`: Error handling types.
//! - `metrics`: Vendor metric normalization with documented defaults.
//! - `risk`: Risk factor analysis, weighted scoring and insights.
//! - `ranking`: Multi-criteria vendor ranking per item.
//! - `forecast`: Stock-out, demand, pricing and vendor risk forecasts.
//! - `ai_validator`: Parsing and reconciliation of provider output.
//! - `prompts`: Prompt rendering for the provider.
//! - `provider_client`: Provider trait, HTTP client and guarded gateway.
//! - `circuit_breaker`: Circuit breaker for provider calls.
//! - `cache_validator`: Checksummed provider response cache.
//! - `storage`: Read-only procurement store backends.
//! - `db`: Database connection and store selection.
//! - `config`: Configuration management.
//! - `services`: Orchestration of store, analytics and provider.
//! - `handlers`: HTTP request handlers.

pub mod ai_validator;
pub mod cache_validator;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod errors;
pub mod forecast;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod prompts;
pub mod provider_client;
pub mod ranking;
pub mod risk;
pub mod services;
pub mod storage;

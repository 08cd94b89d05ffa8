//! Staffing need, shortage and excess reconciliation engine.
//!
//! This crate turns per-slot presence records into staffing matrices, derives
//! a statistical need baseline and an upper ceiling from them, computes
//! shortage and excess behind a set of data-quality guards, and decomposes the
//! totals across roles and employment categories so that every breakdown
//! reconciles with the overall figure.

#![warn(missing_docs)]

pub mod api;
pub mod artifacts;
pub mod calculation;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pipeline;

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity-Ledger: keep a local CSV ledger of Garmin Connect activities
//!
//! This crate provides the sync pipeline (session tokens, paginated fetch,
//! idempotent merge, atomic ledger replace) and the read-side aggregation
//! used by the static site.

pub mod config;
pub mod error;
pub mod fs_utils;
pub mod models;
pub mod services;
pub mod time_utils;

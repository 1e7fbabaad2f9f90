// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Matchfeed runtime library: resilient acquisition of CS2 match schedules.
//!
//! Raw records come from the first strategy in the fallback chain that
//! yields a list (direct API, mirror, session-aware browser scrape). They are
//! normalized into a three-way [`model::Snapshot`] that the
//! [`cache::CacheManager`] keeps fresh and the [`rest`] layer serves.

pub mod acquisition;
pub mod cache;
pub mod challenge;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod normalize;
pub mod refresher;
pub mod renderer;
pub mod rest;
pub mod session;

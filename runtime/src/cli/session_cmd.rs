// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Inspect or discard the persisted browser session.

use crate::config::Config;
use crate::session::SessionStore;
use anyhow::Result;
use chrono::DateTime;
use serde_json::json;

pub fn show(config: &Config, json: bool) -> Result<()> {
    let store = SessionStore::new(config.session_dir());
    let state = store.load()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "dir": store.dir(),
                "cookies": state.cookies,
                "localStorage": state.local_storage,
                "sessionStorage": state.session_storage,
            }))?
        );
        return Ok(());
    }

    println!("Session: {}", store.dir().display());
    if state.is_empty() {
        println!("  (empty)");
        return Ok(());
    }
    println!("Cookies ({})", state.cookies.len());
    for c in &state.cookies {
        let expires = c
            .expires
            .filter(|e| *e > 0.0)
            .and_then(|e| DateTime::from_timestamp(e as i64, 0))
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "session".into());
        println!(
            "  {:<32} {:<24} {expires}",
            c.name,
            c.domain.as_deref().unwrap_or("-")
        );
    }
    println!("localStorage keys:   {}", state.local_storage.len());
    println!("sessionStorage keys: {}", state.session_storage.len());
    Ok(())
}

pub fn clear(config: &Config) -> Result<()> {
    let store = SessionStore::new(config.session_dir());
    store.clear()?;
    println!("Session cleared: {}", store.dir().display());
    Ok(())
}

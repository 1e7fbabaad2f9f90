// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment readiness check.

use crate::config::Config;
use crate::renderer::chromium::resolve_executable;
use crate::session::SessionStore;
use anyhow::Result;

/// Check browser availability, the data directory and the saved session.
pub async fn run(config: &Config) -> Result<()> {
    println!("matchfeed doctor");
    println!("================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    println!("Source API:   {}", config.source_api_url);
    println!("Listing page: {}", config.source_page_url);
    println!("Mirror:       {}", config.mirror_url);
    println!("Refresh:      every {}s", config.refresh_interval.as_secs());
    println!();

    let mut ready = true;

    if config.browser_enabled {
        match resolve_executable(config.chrome_path.as_deref()) {
            Ok(path) => println!("[OK] Chromium found: {}", path.display()),
            Err(e) => {
                ready = false;
                println!("[!!] {e:#}");
            }
        }
        if config.headless {
            println!("[??] Headless mode: bot challenges cannot be solved by hand");
        }
        match config.challenge_timeout {
            Some(limit) => println!("[OK] Challenge wait bounded to {}s", limit.as_secs()),
            None => println!("[??] Challenge wait is unbounded"),
        }
    } else {
        println!("[--] Browser scrape disabled");
    }

    match std::fs::create_dir_all(&config.data_dir) {
        Ok(()) => println!("[OK] Data directory: {}", config.data_dir.display()),
        Err(e) => {
            ready = false;
            println!("[!!] Data directory {} unusable: {e}", config.data_dir.display());
        }
    }

    let store = SessionStore::new(config.session_dir());
    match store.load() {
        Ok(state) if state.is_empty() => println!("[--] No saved session"),
        Ok(state) => println!(
            "[OK] Saved session: {} cookies, {} storage keys",
            state.cookies.len(),
            state.local_storage.len() + state.session_storage.len()
        ),
        Err(e) => println!("[!!] Saved session unreadable: {e}"),
    }

    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}

// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! One-shot pipeline run printed to stdout.

use super::{Pipeline, SignalMode};
use crate::config::Config;
use crate::model::{CanonicalMatch, MatchTime, Snapshot};
use anyhow::{bail, Result};

pub async fn run(config: Config, json: bool) -> Result<()> {
    let pipeline = Pipeline::build(&config, SignalMode::Terminal)?;
    let snapshot = pipeline.cache.refresh().await;
    let status = pipeline.cache.status().await;

    let Some(source) = status.source else {
        bail!("every acquisition strategy was unavailable");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
    } else {
        print_snapshot(&snapshot);
        println!();
        println!("{} matches via {source}", snapshot.len());
    }
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    for (title, matches) in [
        ("LIVE", &snapshot.live),
        ("UPCOMING", &snapshot.upcoming),
        ("FINISHED", &snapshot.finished),
    ] {
        println!("{title} ({})", matches.len());
        for m in matches {
            println!("  {}", describe(m));
        }
    }
}

fn describe(m: &CanonicalMatch) -> String {
    let mut line = format!("{} vs {}", m.team1, m.team2);
    if let Some(event) = &m.event {
        line.push_str(&format!("  [{event}]"));
    }
    match &m.time {
        Some(t @ MatchTime::Epoch(_)) => {
            if let Some(at) = t.instant() {
                line.push_str(&format!("  {}", at.format("%Y-%m-%d %H:%M UTC")));
            }
        }
        Some(MatchTime::Text(text)) => line.push_str(&format!("  {text}")),
        None => {}
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MatchStatus;
    use serde_json::Value;

    #[test]
    fn test_describe() {
        let m = CanonicalMatch {
            id: None,
            team1: "A".into(),
            team2: "B".into(),
            event: Some("Major".into()),
            time: Some(MatchTime::Epoch(0)),
            status: MatchStatus::Upcoming,
            link: None,
            score: None,
            raw: Value::Null,
        };
        assert_eq!(describe(&m), "A vs B  [Major]  1970-01-01 00:00 UTC");
    }
}

// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Raw record → canonical match normalization.
//!
//! Strategies disagree on field names and nesting, so every field goes
//! through an explicit resolution chain. A record that cannot be read at
//! all is skipped; a record with unreadable fields gets defaults.

use crate::error::{FeedError, FeedResult};
use crate::model::{CanonicalMatch, MatchStatus, MatchTime, RawRecord, Snapshot, TBD};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

/// JavaScript-style truthiness, the way the sources encode flags.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Non-empty text from a string or number field.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `field.name`, else `field` itself.
fn nested_or_flat(fields: &Map<String, Value>, key: &str) -> Option<String> {
    let value = fields.get(key)?;
    text(value.get("name")).or_else(|| text(Some(value)))
}

fn match_time(fields: &Map<String, Value>) -> Option<MatchTime> {
    let value = fields
        .get("date")
        .filter(|v| truthy(v))
        .or_else(|| fields.get("time").filter(|v| truthy(v)))?;
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(MatchTime::Epoch),
        Value::String(s) => Some(MatchTime::Text(s.clone())),
        _ => None,
    }
}

/// Maps raw records to a partitioned [`Snapshot`].
#[derive(Debug, Clone)]
pub struct Normalizer {
    match_base_url: String,
}

impl Normalizer {
    /// `match_base_url` is the prefix for synthesized links, without a
    /// trailing slash.
    pub fn new(match_base_url: impl Into<String>) -> Self {
        let base: String = match_base_url.into();
        Self {
            match_base_url: base.trim_end_matches('/').to_string(),
        }
    }

    /// Normalize against the current time.
    pub fn normalize(&self, records: &[RawRecord]) -> Snapshot {
        self.normalize_at(records, Utc::now())
    }

    /// Normalize with `now` as the reference for past/future decisions.
    ///
    /// Partitions keep input order.
    pub fn normalize_at(&self, records: &[RawRecord], now: DateTime<Utc>) -> Snapshot {
        let mut snapshot = Snapshot {
            live: Vec::new(),
            upcoming: Vec::new(),
            finished: Vec::new(),
            timestamp: now,
        };

        for (index, record) in records.iter().enumerate() {
            let canonical = match self.normalize_record(record, now) {
                Ok(canonical) => canonical,
                Err(e) => {
                    debug!("skipping record {index} from {}: {e}", record.source);
                    continue;
                }
            };
            match canonical.status {
                MatchStatus::Live => snapshot.live.push(canonical),
                MatchStatus::Upcoming => snapshot.upcoming.push(canonical),
                MatchStatus::Finished => snapshot.finished.push(canonical),
            }
        }
        snapshot
    }

    /// Resolve one record. Fails only when the record is not an object.
    pub fn normalize_record(
        &self,
        record: &RawRecord,
        now: DateTime<Utc>,
    ) -> FeedResult<CanonicalMatch> {
        let fields = record.fields.as_object().ok_or_else(|| {
            FeedError::MalformedRecord(format!("expected an object, got {}", record.fields))
        })?;

        let id = text(fields.get("id").filter(|v| truthy(v)))
            .or_else(|| text(fields.get("matchId")));
        let time = match_time(fields);
        let status = resolve_status(fields, time.as_ref(), now);

        let team = |key: &str, flat_key: &str| {
            nested_or_flat(fields, key)
                .or_else(|| text(fields.get(flat_key)))
                .unwrap_or_else(|| TBD.to_string())
        };

        let link = match &id {
            Some(id) => Some(format!("{}/{id}", self.match_base_url)),
            None => text(fields.get("link")),
        };

        Ok(CanonicalMatch {
            team1: team("team1", "team1Name"),
            team2: team("team2", "team2Name"),
            event: nested_or_flat(fields, "event"),
            time,
            status,
            link,
            score: fields.get("result").filter(|v| truthy(v)).cloned(),
            id,
            raw: record.fields.clone(),
        })
    }
}

/// Explicit label, then live flag, then past start time, then upcoming.
fn resolve_status(
    fields: &Map<String, Value>,
    time: Option<&MatchTime>,
    now: DateTime<Utc>,
) -> MatchStatus {
    if let Some(status) = fields
        .get("status")
        .and_then(Value::as_str)
        .and_then(MatchStatus::from_label)
    {
        return status;
    }
    if fields.get("live").is_some_and(truthy) {
        return MatchStatus::Live;
    }
    match time.and_then(MatchTime::instant) {
        Some(start) if start < now => MatchStatus::Finished,
        _ => MatchStatus::Upcoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StrategyKind;
    use chrono::Duration;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::new("https://www.hltv.org/matches/")
    }

    fn raw(fields: Value) -> RawRecord {
        RawRecord::new(StrategyKind::DirectApi, fields)
    }

    #[test]
    fn test_nested_live_record() {
        let snap = normalizer().normalize(&[raw(json!({
            "team1": {"name": "Astralis"},
            "team2": {"name": "NAVI"},
            "live": true,
            "id": "123"
        }))]);

        assert_eq!(snap.live.len(), 1);
        assert!(snap.upcoming.is_empty() && snap.finished.is_empty());
        let m = &snap.live[0];
        assert_eq!(m.id.as_deref(), Some("123"));
        assert_eq!(m.team1, "Astralis");
        assert_eq!(m.team2, "NAVI");
        assert_eq!(m.status, MatchStatus::Live);
        assert_eq!(m.link.as_deref(), Some("https://www.hltv.org/matches/123"));
        assert_eq!(m.raw["id"], "123");
    }

    #[test]
    fn test_time_decides_when_no_flags() {
        let now = Utc::now();
        let past = (now - Duration::hours(3)).timestamp_millis();
        let future = (now + Duration::hours(3)).timestamp_millis();
        let snap = normalizer().normalize_at(
            &[
                raw(json!({"date": past})),
                raw(json!({"date": future})),
                raw(json!({})),
                raw(json!({"time": (now - Duration::days(1)).to_rfc3339()})),
                raw(json!({"time": "14:30"})),
            ],
            now,
        );
        assert_eq!(snap.finished.len(), 2);
        assert_eq!(snap.upcoming.len(), 3);
        assert_eq!(snap.upcoming[0].time, Some(MatchTime::Epoch(future)));
        assert_eq!(snap.upcoming[2].time, Some(MatchTime::Text("14:30".into())));
    }

    #[test]
    fn test_explicit_status_wins() {
        let past = (Utc::now() - Duration::hours(1)).timestamp_millis();
        let snap = normalizer().normalize(&[
            raw(json!({"status": "upcoming", "live": true, "date": past})),
            raw(json!({"status": "Finished"})),
            raw(json!({"status": "postponed", "live": 1})),
        ]);
        assert_eq!(snap.upcoming.len(), 1);
        assert_eq!(snap.finished.len(), 1);
        assert_eq!(snap.live.len(), 1, "unknown labels fall through to derivation");
    }

    #[test]
    fn test_unreadable_fields_default() {
        let snap = normalizer().normalize(&[raw(json!({
            "team1": null,
            "team2": {"logo": "x.png"},
            "event": {"id": 9},
        }))]);
        let m = &snap.upcoming[0];
        assert_eq!(m.team1, TBD);
        assert_eq!(m.team2, TBD);
        assert_eq!(m.event, None);
        assert_eq!(m.id, None);
        assert_eq!(m.link, None);
        assert_eq!(m.score, None);
    }

    #[test]
    fn test_flat_and_fallback_fields() {
        let snap = normalizer().normalize(&[raw(json!({
            "matchId": 2370001,
            "team1": "Vitality",
            "team2Name": "FaZe",
            "event": "BLAST Premier",
            "result": {"team1": 16, "team2": 9},
            "status": "over"
        }))]);
        let m = &snap.finished[0];
        assert_eq!(m.id.as_deref(), Some("2370001"));
        assert_eq!(m.team1, "Vitality");
        assert_eq!(m.team2, "FaZe");
        assert_eq!(m.event.as_deref(), Some("BLAST Premier"));
        assert_eq!(m.score, Some(json!({"team1": 16, "team2": 9})));
    }

    #[test]
    fn test_raw_link_used_without_id() {
        let snap = normalizer().normalize(&[raw(json!({
            "link": "https://example.org/m/1"
        }))]);
        assert_eq!(snap.upcoming[0].link.as_deref(), Some("https://example.org/m/1"));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let snap = normalizer().normalize(&[
            raw(json!("not a record")),
            raw(json!({"live": true})),
            raw(json!(42)),
            raw(json!({"team1": "A"})),
        ]);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.upcoming[0].team1, "A");
        assert!(matches!(
            normalizer().normalize_record(&raw(json!([1])), Utc::now()),
            Err(FeedError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_partitions_are_stable() {
        let records: Vec<_> = (0..6)
            .map(|i| raw(json!({"id": format!("m{i}"), "live": i % 2 == 0})))
            .collect();
        let snap = normalizer().normalize(&records);
        let ids = |ms: &[CanonicalMatch]| -> Vec<String> {
            ms.iter().filter_map(|m| m.id.clone()).collect()
        };
        assert_eq!(ids(&snap.live), vec!["m0", "m2", "m4"]);
        assert_eq!(ids(&snap.upcoming), vec!["m1", "m3", "m5"]);
    }

    #[test]
    fn test_canonical_output_renormalizes_identically() {
        let now = Utc::now();
        let records = vec![
            raw(json!({"id": "1", "team1": {"name": "A"}, "team2": {"name": "B"}, "live": true})),
            raw(json!({"id": "2", "date": (now - Duration::hours(2)).timestamp_millis()})),
            raw(json!({"id": "3", "date": (now + Duration::hours(2)).timestamp_millis()})),
            raw(json!({"team1": "C", "event": {"name": "Major"}})),
        ];
        let first = normalizer().normalize_at(&records, now);

        let refed: Vec<RawRecord> = [&first.live, &first.upcoming, &first.finished]
            .into_iter()
            .flatten()
            .map(|m| raw(serde_json::to_value(m).unwrap()))
            .collect();
        let second = normalizer().normalize_at(&refed, now);

        let key = |s: &Snapshot| {
            let names = |ms: &[CanonicalMatch]| {
                ms.iter()
                    .map(|m| (m.id.clone(), m.team1.clone(), m.event.clone(), m.link.clone()))
                    .collect::<Vec<_>>()
            };
            (names(&s.live), names(&s.upcoming), names(&s.finished))
        };
        assert_eq!(key(&first), key(&second));
    }
}

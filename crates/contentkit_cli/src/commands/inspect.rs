//! Inspect command implementation.

use chrono::{TimeZone, Utc};
use contentkit_cache::{CacheRecord, CacheStore};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Summary of one cached record.
#[derive(Debug, Serialize)]
pub struct RecordSummary {
    /// Content key.
    pub key: String,
    /// Request URL.
    pub url: String,
    /// Content type uid, if recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_uid: Option<String>,
    /// Capture time, RFC 3339.
    pub captured_at: String,
    /// Age in seconds.
    pub age_secs: u64,
    /// Encoded response size in bytes.
    pub response_bytes: usize,
}

/// Cache inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Cache directory.
    pub path: String,
    /// Number of readable records listed.
    pub record_count: usize,
    /// Listed records, sorted by key.
    pub records: Vec<RecordSummary>,
}

/// Runs the inspect command.
pub fn run(
    dir: &Path,
    class_uid: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !dir.is_dir() {
        return Err(format!("No cache found at {:?}", dir).into());
    }
    info!("Inspecting cache at {:?}", dir);
    let store = CacheStore::open(dir)?;
    let result = collect(&store, dir, class_uid)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Builds the inspection result for `store`.
pub fn collect(
    store: &CacheStore,
    dir: &Path,
    class_uid: Option<&str>,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let now = store.now_millis();
    let records: Vec<RecordSummary> = store
        .entries()?
        .iter()
        .filter(|r| class_uid.map_or(true, |uid| r.class_uid.as_deref() == Some(uid)))
        .map(|r| summarize(r, now))
        .collect();

    Ok(InspectResult {
        path: dir.display().to_string(),
        record_count: records.len(),
        records,
    })
}

fn summarize(record: &CacheRecord, now: i64) -> RecordSummary {
    let captured_at = Utc
        .timestamp_millis_opt(record.timestamp)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| record.timestamp.to_string());
    RecordSummary {
        key: record.key.to_string(),
        url: record.url.clone(),
        class_uid: record.class_uid.clone(),
        captured_at,
        age_secs: record.age_millis(now) / 1000,
        response_bytes: serde_json::to_vec(&record.response).map_or(0, |v| v.len()),
    }
}

fn print_text_output(result: &InspectResult) {
    println!("Cache: {}", result.path);
    println!("Records: {}", result.record_count);
    println!();
    for record in &result.records {
        println!("{}", record.key);
        println!("  URL:        {}", record.url);
        if let Some(uid) = &record.class_uid {
            println!("  Type:       {}", uid);
        }
        println!("  Captured:   {} ({}s ago)", record.captured_at, record.age_secs);
        println!("  Response:   {} bytes", record.response_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentkit_cache::{ContentHasher, ManualClock, RequestEcho};
    use serde_json::{json, Map};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[test]
    fn collect_filters_by_class_uid() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let store = CacheStore::open(dir.path()).unwrap().with_clock(clock.clone());
        for (url, uid) in [("https://a", "product"), ("https://b", "brand")] {
            let key = ContentHasher::content_key(url, &Map::new(), &BTreeMap::new());
            let mut echo = RequestEcho::new(url);
            echo.class_uid = Some(uid.into());
            store.put(&key, &echo, &json!({"entries": []})).unwrap();
        }
        clock.advance(5_000);

        let all = collect(&store, dir.path(), None).unwrap();
        assert_eq!(all.record_count, 2);

        let products = collect(&store, dir.path(), Some("product")).unwrap();
        assert_eq!(products.record_count, 1);
        assert_eq!(products.records[0].url, "https://a");
        assert_eq!(products.records[0].age_secs, 5);
        assert_eq!(products.records[0].response_bytes, br#"{"entries":[]}"#.len());
    }
}

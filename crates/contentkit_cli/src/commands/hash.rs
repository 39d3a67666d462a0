//! Hash command implementation.

use contentkit_cache::{ContentHasher, ContentKey};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Runs the hash command.
pub fn run(url: &str, params: &[String], headers: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let key = content_key(url, params, headers)?;
    println!("{}", key);
    Ok(())
}

/// Computes the content key for a request given as command-line pairs.
pub fn content_key(
    url: &str,
    params: &[String],
    headers: &[String],
) -> Result<ContentKey, Box<dyn std::error::Error>> {
    let mut param_map = Map::new();
    for pair in params {
        let (name, raw) = split_pair(pair)?;
        // Bare words that are not JSON are taken as strings.
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        param_map.insert(name.to_string(), value);
    }

    let mut header_map = BTreeMap::new();
    for pair in headers {
        let (name, value) = split_pair(pair)?;
        header_map.insert(name.to_string(), value.to_string());
    }

    Ok(ContentHasher::content_key(url, &param_map, &header_map))
}

fn split_pair(pair: &str) -> Result<(&str, &str), Box<dyn std::error::Error>> {
    match pair.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name, value)),
        _ => Err(format!("expected name=value, got {:?}", pair).into()),
    }
}

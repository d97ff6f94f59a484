// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

use super::*;
use serial_test::serial;

#[yare::parameterized(
    absent     = { None, Parsed::Absent },
    numeric    = { Some("12345".to_string()), Parsed::Value(12345) },
    negative   = { Some("-1".to_string()), Parsed::Value(-1) },
    word       = { Some("not-a-number".to_string()), Parsed::Invalid("not-a-number".to_string()) },
    empty      = { Some(String::new()), Parsed::Invalid(String::new()) },
    fractional = { Some("1.5".to_string()), Parsed::Invalid("1.5".to_string()) },
)]
fn stored_values_parse(raw: Option<String>, expected: Parsed) {
    assert_eq!(parse_stored(raw), expected);
}

#[test]
#[serial(redis_env)]
fn config_from_env_defaults() {
    for name in ["REDIS_HOST", "REDIS_PORT", "REDIS_DB_NUM", "REDIS_PASS"] {
        std::env::remove_var(name);
    }
    std::env::set_var("REDIS_HOST", "cache.example.com");
    let config = JournalConfig::from_env().unwrap();
    assert_eq!(config.host, "cache.example.com");
    assert_eq!(config.port, 6379);
    assert_eq!(config.db, 0);
    assert!(config.password.is_none());
    std::env::remove_var("REDIS_HOST");
}

#[test]
#[serial(redis_env)]
fn config_from_env_requires_host() {
    std::env::remove_var("REDIS_HOST");
    assert!(matches!(JournalConfig::from_env(), Err(JournalConfigError::MissingHost)));
}

#[tokio::test]
async fn fake_store_round_trips() {
    let mut store = FakeCursorStore::new();
    assert_eq!(store.most_recent_event().await.unwrap(), None);
    store.record_processed(99).await.unwrap();
    assert_eq!(store.most_recent_event().await.unwrap(), Some(99));
    store.clear().await.unwrap();
    assert_eq!(store.most_recent_event().await.unwrap(), None);
}

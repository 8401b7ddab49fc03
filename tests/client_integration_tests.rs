//! Integration Tests for the Cache Client
//!
//! Exercises the two-level consistency protocol end to end against the
//! in-process remote store, with a local store the tests can probe directly.

use std::thread::sleep;
use std::time::Duration;

use dualcache::keys::HASHED_KEY_LENGTH;
use dualcache::local::NEGATIVE_SENTINEL;
use dualcache::remote::MemoryConnector;
use dualcache::{CacheClient, CacheError, ClientConfig, LocalStore, SharedLocalStore};
use proptest::prelude::*;

// == Helper Functions ==

fn config(prefix: &str) -> ClientConfig {
    ClientConfig::new("memory")
        .with_local_prefix(prefix)
        .with_retry_interval(Duration::ZERO)
        .with_max_retry(3)
}

fn client_with_store(
    prefix: &str,
) -> (CacheClient<MemoryConnector>, MemoryConnector, SharedLocalStore) {
    let connector = MemoryConnector::new();
    let store = LocalStore::shared(100);
    let mut client =
        CacheClient::with_store(config(prefix), connector.clone(), store.clone()).unwrap();
    client.select(0).unwrap();
    (client, connector, store)
}

fn probe(store: &SharedLocalStore, local_key: &str) -> Option<String> {
    store
        .lock()
        .unwrap()
        .peek(local_key)
        .map(|entry| entry.value.clone())
}

// == Round-trip ==

#[test]
fn test_round_trip_with_and_without_local_layer() {
    for prefix in ["app", ""] {
        let (mut client, _, _) = client_with_store(prefix);

        assert!(client.set("user:1", "alice", 0).unwrap());
        assert_eq!(client.get("user:1").unwrap().as_deref(), Some("alice"));

        assert!(client.set("user:2", "bob", 30).unwrap());
        assert_eq!(client.get_or("user:2", "nobody").unwrap(), "bob");
    }
}

// == TTL Expiry ==

#[test]
fn test_ttl_expiry_returns_default() {
    let (mut client, _, _) = client_with_store("app");

    client.set("short", "lived", 1).unwrap();
    assert_eq!(client.get_or("short", "gone").unwrap(), "lived");

    sleep(Duration::from_millis(1100));

    let value = client.get_or("short", "gone").unwrap();
    assert_eq!(value, "gone");
    assert_ne!(value, NEGATIVE_SENTINEL);
}

// == Negative Caching ==

#[test]
fn test_negative_caching_skips_second_remote_read() {
    let (mut client, connector, store) = client_with_store("app");

    assert_eq!(client.get_or("missing", "dflt").unwrap(), "dflt");
    assert_eq!(client.get_or("missing", "dflt").unwrap(), "dflt");
    assert_eq!(connector.command_count("GET"), 1);

    let local_key = client.local_key("missing").unwrap();
    assert_eq!(probe(&store, &local_key).as_deref(), Some(NEGATIVE_SENTINEL));
}

#[test]
fn test_negative_entry_expires_with_local_ttl() {
    let (mut client, connector, _) = client_with_store("app");
    assert!(client.set_local_ttl(1));

    assert_eq!(client.get("later").unwrap(), None);
    connector.poke(0, "later", "now");
    assert_eq!(client.get("later").unwrap(), None);

    sleep(Duration::from_millis(1100));
    assert_eq!(client.get("later").unwrap().as_deref(), Some("now"));
    assert_eq!(connector.command_count("GET"), 2);
}

#[test]
fn test_disabled_local_layer_always_reads_remote() {
    let (mut client, connector, store) = client_with_store("");

    client.get("missing").unwrap();
    client.get("missing").unwrap();

    assert_eq!(connector.command_count("GET"), 2);
    assert!(store.lock().unwrap().is_empty());
}

// == Delete ==

#[test]
fn test_delete_invalidates_both_layers() {
    let (mut client, connector, store) = client_with_store("app");

    client.set("k", "v", 0).unwrap();
    let local_key = client.local_key("k").unwrap();
    assert_eq!(probe(&store, &local_key).as_deref(), Some("v"));

    assert_eq!(client.delete("k").unwrap(), 1);

    assert_eq!(probe(&store, &local_key), None);
    assert_eq!(connector.peek(0, "k"), None);
    assert_eq!(client.get_or("k", "dflt").unwrap(), "dflt");
}

// == Key-length Fallback ==

#[test]
fn test_long_keys_use_fixed_length_hash_locally() {
    let (mut client, connector, store) = client_with_store("app");
    let stem = "x".repeat(60);
    let first = format!("{}-first", stem);
    let second = format!("{}-second", stem);

    client.set(&first, "1", 0).unwrap();
    client.set(&second, "2", 0).unwrap();

    let first_local = client.local_key(&first).unwrap();
    let second_local = client.local_key(&second).unwrap();
    assert_eq!(first_local.len(), "app".len() + HASHED_KEY_LENGTH);
    assert_ne!(first_local, second_local);
    assert_eq!(probe(&store, &first_local).as_deref(), Some("1"));

    assert_eq!(connector.peek(0, &first).as_deref(), Some("1"));
    assert_eq!(connector.peek(0, &second).as_deref(), Some("2"));
    assert_eq!(client.get(&second).unwrap().as_deref(), Some("2"));
}

#[test]
fn test_clients_share_store_without_collisions() {
    let connector = MemoryConnector::new();
    let store = LocalStore::shared(100);
    let mut orders = CacheClient::with_store(config("ord"), connector.clone(), store.clone()).unwrap();
    let mut users = CacheClient::with_store(config("usr"), connector.clone(), store.clone()).unwrap();
    orders.select(0).unwrap();
    users.select(1).unwrap();

    orders.set("id", "o-1", 0).unwrap();
    users.set("id", "u-1", 0).unwrap();

    assert_eq!(orders.get("id").unwrap().as_deref(), Some("o-1"));
    assert_eq!(users.get("id").unwrap().as_deref(), Some("u-1"));

    users.clear().unwrap();
    assert_eq!(orders.get("id").unwrap().as_deref(), Some("o-1"));
    assert_eq!(store.lock().unwrap().len(), 1);
}

// == Retry ==

#[test]
fn test_retry_recovers_from_transient_failures() {
    let (mut client, connector, _) = client_with_store("app");

    connector.fail_next(2);
    assert!(client.set("k", "v", 0).unwrap());
    assert_eq!(connector.peek(0, "k").as_deref(), Some("v"));

    client.close();
    connector.fail_next(2);
    assert_eq!(client.delete("gone").unwrap(), 0);

    // A transient failure on a live session drops it and reconnects.
    connector.fail_next(1);
    assert!(client.has("k").unwrap());
    assert_eq!(connector.open_sessions(), 1);
}

#[test]
fn test_retry_exhaustion_surfaces_transient_error() {
    let (mut client, connector, _) = client_with_store("");
    connector.poke(0, "k", "v");

    connector.fail_next(3);
    assert!(matches!(
        client.get("k"),
        Err(CacheError::TransientConnection(_))
    ));

    assert_eq!(client.get("k").unwrap().as_deref(), Some("v"));
}

#[test]
fn test_remote_failure_is_not_retried() {
    let (mut client, connector, _) = client_with_store("app");

    connector.reject_next(1);
    assert!(matches!(
        client.set("k", "v", 0),
        Err(CacheError::RemoteFailure(_))
    ));
    assert_eq!(connector.total_commands(), 0);
    assert_eq!(connector.connects(), 1);
}

// == Database Selection ==

#[test]
fn test_out_of_range_database_index() {
    let connector = MemoryConnector::new();
    let mut client = CacheClient::new(config("app"), connector.clone()).unwrap();

    assert!(matches!(client.select(-1), Err(CacheError::InvalidArgument(_))));
    assert!(matches!(client.select(16), Err(CacheError::InvalidArgument(_))));
    assert_eq!(client.current_db(), None);
    assert_eq!(connector.connects(), 0);
    assert_eq!(connector.total_commands(), 0);
}

#[test]
fn test_one_session_per_database() {
    let (mut client, connector, _) = client_with_store("");

    client.set("a", "1", 0).unwrap();
    client.select(2).unwrap();
    client.set("a", "2", 0).unwrap();
    client.select(0).unwrap();
    client.get("a").unwrap();

    assert_eq!(connector.connects(), 2);
    assert_eq!(connector.open_sessions(), 2);
    assert_eq!(connector.peek(2, "a").as_deref(), Some("2"));

    assert!(client.reconnect(0).unwrap());
    assert!(!client.reconnect(5).unwrap());
    assert_eq!(connector.open_sessions(), 2);

    client.close();
    assert_eq!(connector.open_sessions(), 0);
}

// == Property Tests ==

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_round_trip(
        key in "[a-zA-Z0-9:_]{1,80}",
        value in ".{0,64}",
        ttl in 0u64..3600,
        local in any::<bool>(),
    ) {
        let prefix = if local { "app" } else { "" };
        let (mut client, _, _) = client_with_store(prefix);

        prop_assert!(client.set(&key, &value, ttl).unwrap());
        prop_assert_eq!(client.get(&key).unwrap(), Some(value));
    }

    #[test]
    fn prop_sentinel_never_leaks(key in "[a-z]{1,20}") {
        let (mut client, connector, _) = client_with_store("app");
        connector.poke(0, &key, NEGATIVE_SENTINEL);

        // A remote value equal to the sentinel is returned verbatim but never cached.
        let first = client.get(&key).unwrap();
        prop_assert_eq!(first.as_deref(), Some(NEGATIVE_SENTINEL));
        let second = client.get(&key).unwrap();
        prop_assert_eq!(second.as_deref(), Some(NEGATIVE_SENTINEL));
        prop_assert_eq!(connector.command_count("GET"), 2);
    }
}

//! Property tests for the invariants in the vault specification's testable
//! properties section: round-trip, update semantics, compaction, and tamper
//! detection. Argon2id's "moderate" cost profile makes each `create`/`open`
//! call expensive, so these run far fewer cases than a typical proptest
//! suite — enough to cover the shape of the state space without turning the
//! test run into a KDF benchmark.

use noodlevault::{Vault, VaultError};
use proptest::collection::vec as pvec;
use proptest::prelude::*;

fn entry_strategy() -> impl Strategy<Value = (String, Vec<u8>, u64)> {
    ("[a-z]{1,12}", pvec(any::<u8>(), 0..64), any::<u64>())
}

/// A batch of key/value/mtime triples with duplicate keys filtered out, so
/// every generated key in the batch is distinct.
fn distinct_entries(max_len: usize) -> impl Strategy<Value = Vec<(String, Vec<u8>, u64)>> {
    pvec(entry_strategy(), 1..=max_len).prop_map(|entries| {
        let mut seen = std::collections::HashSet::new();
        entries.into_iter().filter(|(k, _, _)| seen.insert(k.clone())).collect()
    })
}

fn vault_path(tmp: &tempfile::TempDir) -> (String, String) {
    (tmp.path().to_str().unwrap().to_owned(), "alice".to_owned())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(6))]

    /// Property 1: every added key round-trips through `open_key` +
    /// `place_open_value`, and `last_modified_time` returns its `mtime`.
    #[test]
    fn round_trip_add_then_open(entries in distinct_entries(6)) {
        let tmp = tempfile::tempdir().unwrap();
        let (dir, user) = vault_path(&tmp);
        let mut vault = Vault::create(&dir, &user, b"hunter2").unwrap();

        for (key, value, mtime) in &entries {
            vault.add_key(1, key.as_bytes(), value, *mtime).unwrap();
        }

        for (key, value, mtime) in &entries {
            vault.open_key(key.as_bytes()).unwrap();
            let mut buf = vec![0u8; value.len() + 1];
            let (len, ty) = vault.place_open_value(&mut buf).unwrap();
            prop_assert_eq!(&buf[..len], value.as_slice());
            prop_assert_eq!(ty, 1);
            prop_assert_eq!(vault.last_modified_time(key.as_bytes()).unwrap(), *mtime);
        }
    }

    /// Property 2: after any successful sequence of mutations, a fresh
    /// `Vault::open` on the same file with the same password succeeds.
    #[test]
    fn at_rest_verifiability(entries in distinct_entries(5)) {
        let tmp = tempfile::tempdir().unwrap();
        let (dir, user) = vault_path(&tmp);
        let mut vault = Vault::create(&dir, &user, b"hunter2").unwrap();
        for (key, value, mtime) in &entries {
            vault.add_key(1, key.as_bytes(), value, *mtime).unwrap();
        }
        if let Some((key, _, _)) = entries.first() {
            vault.delete_key(key.as_bytes()).unwrap();
        }
        vault.close();

        prop_assert!(Vault::open(&dir, &user, b"hunter2").is_ok());
    }

    /// Property 4: `update_key` is observationally equivalent to
    /// `delete_key` followed by `add_key` — new value and mtime visible,
    /// key count unchanged.
    #[test]
    fn update_is_delete_then_add(
        value_a in pvec(any::<u8>(), 0..64),
        value_b in pvec(any::<u8>(), 0..64),
        mtime_a in any::<u64>(),
        mtime_b in any::<u64>(),
    ) {
        let tmp = tempfile::tempdir().unwrap();
        let (dir, user) = vault_path(&tmp);
        let mut vault = Vault::create(&dir, &user, b"hunter2").unwrap();
        vault.add_key(1, b"k", &value_a, mtime_a).unwrap();
        let before_count = vault.num_vault_keys().unwrap();

        vault.update_key(2, b"k", &value_b, mtime_b).unwrap();

        prop_assert_eq!(vault.num_vault_keys().unwrap(), before_count);
        vault.open_key(b"k").unwrap();
        let mut buf = vec![0u8; value_b.len() + 1];
        let (len, ty) = vault.place_open_value(&mut buf).unwrap();
        prop_assert_eq!(&buf[..len], value_b.as_slice());
        prop_assert_eq!(ty, 2);
        prop_assert_eq!(vault.last_modified_time(b"k").unwrap(), mtime_b);
    }

    /// Property 5: compaction preserves every (key, value, type, mtime)
    /// tuple and doubles the slot count.
    #[test]
    fn compaction_preserves_tuples(entries in distinct_entries(5)) {
        let tmp = tempfile::tempdir().unwrap();
        let (dir, user) = vault_path(&tmp);
        let mut vault = Vault::create(&dir, &user, b"hunter2").unwrap();
        for (i, (key, value, mtime)) in entries.iter().enumerate() {
            vault.add_key(i as u8, key.as_bytes(), value, *mtime).unwrap();
        }
        if let Some((key, _, _)) = entries.first() {
            vault.delete_key(key.as_bytes()).unwrap();
        }

        let before_slots = vault.slot_count;
        vault.compact().unwrap();
        prop_assert_eq!(vault.slot_count, before_slots * 2);

        let surviving = &entries[1.min(entries.len())..];
        prop_assert_eq!(vault.num_vault_keys().unwrap(), surviving.len());
        for (i, (key, value, mtime)) in entries.iter().enumerate().skip(1) {
            vault.open_key(key.as_bytes()).unwrap();
            let mut buf = vec![0u8; value.len() + 1];
            let (len, ty) = vault.place_open_value(&mut buf).unwrap();
            prop_assert_eq!(&buf[..len], value.as_slice());
            prop_assert_eq!(ty, i as u8);
            prop_assert_eq!(vault.last_modified_time(key.as_bytes()).unwrap(), *mtime);
        }
    }
}

/// Property 8 (tamper detection): flipping a bit anywhere the file MAC
/// covers causes `open` to fail. A plain `#[test]` (not `proptest!`) is
/// enough here — every byte before the trailing MAC is covered by the same
/// check, so one representative offset per on-disk region exercises the
/// property as completely as a random or exhaustive sweep would.
#[test]
fn tamper_detection_flips_are_caught() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().to_str().unwrap();
    let mut vault = Vault::create(dir, "alice", b"hunter2").unwrap();
    vault.add_key(1, b"email", b"a@b.example", 1000).unwrap();
    vault.close();

    let path = tmp.path().join("alice.vault");
    let original = std::fs::read(&path).unwrap();

    // One representative offset per region the file MAC covers: header
    // version byte, password salt, encrypted master, master nonce, the slot
    // table, the entry heap, and the trailing file MAC itself. An
    // exhaustive per-byte sweep would say nothing more about correctness
    // here — the file MAC covers every byte before it, so a flip anywhere
    // in that range is the same class of failure.
    let offsets = [0usize, 10, 30, 80, 115, original.len() - 40, original.len() - 1];

    for &byte_idx in &offsets {
        let mut tampered = original.clone();
        tampered[byte_idx] ^= 0x01;
        std::fs::write(&path, &tampered).unwrap();

        // Per §7, a decryption failure while unwrapping the master key is
        // classified `WRONGPASS`; every other tamper is a MAC mismatch and
        // is classified `FILE`. Either way `open` must reject the file.
        let err = Vault::open(dir, "alice", b"hunter2").unwrap_err();
        assert!(
            matches!(err, VaultError::File | VaultError::WrongPass),
            "byte {byte_idx}: expected File or WrongPass, got {err:?}"
        );
    }

    std::fs::write(&path, &original).unwrap();
    Vault::open(dir, "alice", b"hunter2").unwrap().close();
}

//! Properties of the document codec, merge and lock/unlock over arbitrary maps.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use proptest::prelude::*;
use tagdoc::document::is_reserved;
use tagdoc::emulator::EmulatedTag;
use tagdoc::{
    codec, LanguageCode, NfcHardware, Result, SessionManager, TagDocument, TagDocumentStore,
    TagEmulator, Technology, UnlockResult,
};

fn key() -> impl Strategy<Value = String> {
    "\\PC{1,12}".prop_filter("reserved key", |k| !is_reserved(k))
}

// Short values plus ones long enough to need a long NDEF record.
fn value() -> impl Strategy<Value = String> {
    prop_oneof!["\\PC{0,24}", "\\PC{200,320}"]
}

fn fields(max: usize) -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(key(), value(), 0..max)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

struct Tag {
    emulator: Arc<TagEmulator>,
    sessions: SessionManager,
    store: TagDocumentStore,
}

impl Tag {
    async fn blank() -> Self {
        let emulator = Arc::new(TagEmulator::with_tag(EmulatedTag {
            capacity: 1 << 20,
            ..EmulatedTag::blank()
        }));
        emulator.start().await.unwrap();
        Self {
            sessions: SessionManager::new(emulator.clone(), Technology::Ndef),
            emulator,
            store: TagDocumentStore::default(),
        }
    }

    async fn write(&self, patch: BTreeMap<String, String>) -> Result<TagDocument> {
        let store = self.store.clone();
        self.sessions
            .run_with_session(move |session| async move { store.write(&session, &patch).await })
            .await
    }

    async fn lock(&self, password: String) -> Result<()> {
        let store = self.store.clone();
        self.sessions
            .run_with_session(move |session| async move { store.lock(&session, &password).await })
            .await
    }

    async fn unlock(&self, candidate: String) -> Result<UnlockResult> {
        let store = self.store.clone();
        self.sessions
            .run_with_session(move |session| async move {
                store.unlock(&session, &candidate).await
            })
            .await
    }

    async fn read(&self) -> Result<TagDocument> {
        let store = self.store.clone();
        self.sessions
            .run_with_session(move |session| async move { store.read(&session).await })
            .await
    }
}

proptest! {
    #[test]
    fn test_codec_roundtrip(map in fields(8), password in proptest::option::of("\\PC{0,16}")) {
        let mut original = TagDocument::from_fields(map).unwrap();
        if let Some(password) = password {
            original.apply_lock(&password);
        }

        let message = codec::encode(&original, &LanguageCode::default());
        prop_assert_eq!(codec::try_decode(Some(message.as_slice())).unwrap(), original);
    }

    #[test]
    fn test_merge_preserves_untouched_keys(existing in fields(8), patch in fields(8)) {
        let mut merged = TagDocument::from_fields(existing.clone()).unwrap();
        merged.merge(&patch).unwrap();

        for (key, value) in existing.iter().filter(|(k, _)| !patch.contains_key(*k)) {
            prop_assert_eq!(merged.get(key), Some(value.as_str()));
        }
    }

    #[test]
    fn test_merge_overwrites_patched_keys(existing in fields(8), patch in fields(8)) {
        let mut merged = TagDocument::from_fields(existing.clone()).unwrap();
        merged.merge(&patch).unwrap();

        for (key, value) in &patch {
            prop_assert_eq!(merged.get(key), Some(value.as_str()));
        }
        let union: BTreeSet<&String> = existing.keys().chain(patch.keys()).collect();
        prop_assert_eq!(merged.len(), union.len());
    }

    #[test]
    fn test_lock_unlock(
        map in fields(4),
        password in "\\PC{1,16}",
        other in "\\PC{0,16}",
        reuse in any::<bool>(),
    ) {
        let candidate = if reuse { password.clone() } else { other };
        let matches = candidate == password;

        runtime().block_on(async {
            let tag = Tag::blank().await;
            let written = tag.write(map).await.unwrap();
            tag.lock(password.clone()).await.unwrap();
            let locked_message = tag.emulator.message();

            let result = tag.unlock(candidate).await.unwrap();
            let current = tag.read().await.unwrap();

            if matches {
                assert_eq!(result, UnlockResult::Success);
                assert!(!current.is_locked());
                assert_eq!(current, written);
            } else {
                assert_eq!(result, UnlockResult::InvalidPassword);
                assert_eq!(tag.emulator.message(), locked_message);
                assert_eq!(current.password(), Some(password.as_str()));
                assert_eq!(current.fields(), written.fields());
            }
        });
    }
}

use std::collections::HashMap;
use tavern_core::{Character, Persona, TavernError};
use tavern_store::{EntityStore, JsonEntityStore, UpsertOutcome};

/// Helper: a character store inside a fresh temp directory.
fn temp_characters() -> (JsonEntityStore<Character>, tempfile::TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonEntityStore::new(tmp.path().join("characters.json"));
    (store, tmp)
}

fn character(id: &str, name: &str) -> Character {
    Character {
        id: id.to_string(),
        name: name.to_string(),
        tagline: format!("{name}'s tagline"),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_distinct_upserts_keep_latest_version_of_each() {
    let (store, _tmp) = temp_characters();

    let writes = [
        ("c1", "Aria"),
        ("c2", "Borin"),
        ("c1", "Aria the Bold"),
        ("c3", "Cyra"),
        ("c2", "Borin Stonehand"),
        ("c1", "Aria the Wise"),
    ];
    let mut latest: HashMap<&str, Character> = HashMap::new();
    for (id, name) in writes {
        let c = character(id, name);
        store.upsert(c.clone()).await.unwrap();
        latest.insert(id, c);
    }

    let all = store.load_all().await.unwrap();
    assert_eq!(all.len(), latest.len());
    for stored in &all {
        assert_eq!(stored, &latest[stored.id.as_str()]);
    }
}

#[tokio::test]
async fn test_upsert_existing_id_never_grows_collection() {
    let (store, _tmp) = temp_characters();
    store.upsert(character("c1", "Aria")).await.unwrap();
    store.upsert(character("c2", "Borin")).await.unwrap();

    for i in 0..5 {
        let outcome = store
            .upsert(character("c1", &format!("Aria v{i}")))
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert_eq!(store.load_all().await.unwrap().len(), 2);
    }
}

#[tokio::test]
async fn test_upsert_replaces_in_place_preserving_order() {
    let (store, _tmp) = temp_characters();
    store.upsert(character("c1", "Aria")).await.unwrap();
    store.upsert(character("c2", "Borin")).await.unwrap();
    store.upsert(character("c3", "Cyra")).await.unwrap();

    store.upsert(character("c2", "Borin II")).await.unwrap();

    let ids: Vec<String> = store
        .load_all()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
}

#[tokio::test]
async fn test_delete_nonexistent_leaves_file_identical() {
    let (store, _tmp) = temp_characters();
    store.upsert(character("c1", "Aria")).await.unwrap();
    let before = std::fs::read(store.path()).unwrap();

    let err = store.delete_by_id("ghost").await.unwrap_err();
    assert!(matches!(err, TavernError::NotFound { kind: "character", .. }));

    let after = std::fs::read(store.path()).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_delete_on_missing_file_is_not_found_and_creates_nothing() {
    let (store, _tmp) = temp_characters();
    let err = store.delete_by_id("c1").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!store.path().exists());
}

#[tokio::test]
async fn test_delete_returns_removed_entity() {
    let (store, _tmp) = temp_characters();
    let mut aria = character("c1", "Aria");
    aria.img = "/assets/characters/aria.png".to_string();
    store.upsert(aria.clone()).await.unwrap();
    store.upsert(character("c2", "Borin")).await.unwrap();

    let removed = store.delete_by_id("c1").await.unwrap();
    assert_eq!(removed, aria);

    let remaining = store.load_all().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "c2");
}

#[tokio::test]
async fn test_stores_are_independent() {
    let tmp = tempfile::tempdir().unwrap();
    let characters = JsonEntityStore::<Character>::new(tmp.path().join("characters.json"));
    let personas = JsonEntityStore::<Persona>::new(tmp.path().join("personas.json"));

    characters.upsert(character("shared", "Aria")).await.unwrap();
    personas
        .upsert(Persona {
            id: "shared".to_string(),
            display_name: "Bob".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    personas.delete_by_id("shared").await.unwrap();
    assert_eq!(characters.get("shared").await.unwrap().name, "Aria");
    assert!(personas.load_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_persistence_across_store_instances() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("characters.json");

    {
        let store = JsonEntityStore::<Character>::new(path.clone());
        store.upsert(character("c1", "Aria")).await.unwrap();
    }

    let store2 = JsonEntityStore::<Character>::new(path);
    assert_eq!(store2.get("c1").await.unwrap().name, "Aria");
}

#[tokio::test]
async fn test_concurrent_upserts_do_not_lose_updates() {
    let tmp = tempfile::tempdir().unwrap();
    let store = std::sync::Arc::new(JsonEntityStore::<Character>::new(
        tmp.path().join("characters.json"),
    ));

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .upsert(character(&format!("c{i}"), "Parallel"))
                .await
                .unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(store.load_all().await.unwrap().len(), 20);
}

#[tokio::test]
async fn test_reads_legacy_go_written_file() {
    let (store, _tmp) = temp_characters();
    std::fs::write(
        store.path(),
        r#"[
  {
    "id": "aria_1700000000",
    "name": "Aria",
    "tagline": "Bard",
    "description": "",
    "greeting": "Hi",
    "definition": "",
    "tags": {"genre": ["fantasy"]},
    "img": "/assets/characters/aria.png"
  }
]"#,
    )
    .unwrap();

    let all = store.load_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].tags["genre"].contains("fantasy"));
}

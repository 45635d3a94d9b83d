use tavern_core::{ChatMessage, Role};
use tavern_session::{FileSessionMemory, SessionKey, SessionMemory, DEFAULT_WINDOW};

/// Helper: create a FileSessionMemory in a temp directory.
async fn temp_memory() -> (FileSessionMemory, tempfile::TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let memory = FileSessionMemory::new(tmp.path().join("history"))
        .await
        .unwrap();
    (memory, tmp)
}

fn key(character: &str, user: &str) -> SessionKey {
    SessionKey::new(character, user).unwrap()
}

fn contents(messages: &[ChatMessage]) -> Vec<&str> {
    messages.iter().map(|m| m.content.as_str()).collect()
}

#[tokio::test]
async fn test_default_window_is_five() {
    let (memory, _tmp) = temp_memory().await;
    assert_eq!(DEFAULT_WINDOW, 5);
    assert_eq!(memory.window(), 5);
}

#[tokio::test]
async fn test_six_appends_keep_last_five() {
    let (memory, _tmp) = temp_memory().await;
    let k = key("alice", "bob");

    for word in ["hi", "there", "how", "are", "you", "today"] {
        memory.append(&k, ChatMessage::user(word)).await.unwrap();
    }

    let loaded = memory.load(&k).await;
    assert_eq!(contents(&loaded), vec!["there", "how", "are", "you", "today"]);
}

#[tokio::test]
async fn test_load_returns_min_of_n_and_window() {
    for n in 0..=8 {
        let (memory, _tmp) = temp_memory().await;
        let k = key("c1", "u1");
        let sent: Vec<String> = (0..n).map(|i| format!("msg-{i}")).collect();
        for text in &sent {
            memory.append(&k, ChatMessage::user(text)).await.unwrap();
        }

        let loaded = memory.load(&k).await;
        assert_eq!(loaded.len(), n.min(DEFAULT_WINDOW), "n = {n}");
        let expected: Vec<&str> = sent[n.saturating_sub(DEFAULT_WINDOW)..]
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(contents(&loaded), expected, "n = {n}");
    }
}

#[tokio::test]
async fn test_append_returns_resulting_window() {
    let (memory, _tmp) = temp_memory().await;
    let k = key("alice", "bob");

    memory.append(&k, ChatMessage::user("q1")).await.unwrap();
    let window = memory
        .append(&k, ChatMessage::assistant("a1"))
        .await
        .unwrap();
    assert_eq!(window.len(), 2);
    assert_eq!(window[1].role, Role::Assistant);
}

#[tokio::test]
async fn test_reset_then_load_is_empty() {
    let (memory, _tmp) = temp_memory().await;
    let k = key("alice", "bob");
    memory.append(&k, ChatMessage::user("hi")).await.unwrap();

    memory.reset(&k).await.unwrap();
    assert!(memory.load(&k).await.is_empty());
}

#[tokio::test]
async fn test_reset_nonexistent_is_ok() {
    let (memory, _tmp) = temp_memory().await;
    memory.reset(&key("nobody", "here")).await.unwrap();
}

#[tokio::test]
async fn test_sessions_are_isolated_per_user() {
    let (memory, _tmp) = temp_memory().await;
    memory
        .append(&key("c1", "bob"), ChatMessage::user("from bob"))
        .await
        .unwrap();
    memory
        .append(&key("c1", "eve"), ChatMessage::user("from eve"))
        .await
        .unwrap();

    memory.reset(&key("c1", "bob")).await.unwrap();
    assert!(memory.load(&key("c1", "bob")).await.is_empty());
    assert_eq!(contents(&memory.load(&key("c1", "eve")).await), vec!["from eve"]);
}

#[tokio::test]
async fn test_purge_by_character_respects_separator() {
    let (memory, tmp) = temp_memory().await;
    for (c, u) in [("c1", "bob"), ("c1", "eve"), ("c10", "bob"), ("c2", "bob")] {
        memory
            .append(&key(c, u), ChatMessage::user("hello"))
            .await
            .unwrap();
    }

    let removed = memory.purge_by_character("c1").await.unwrap();
    assert_eq!(removed, 2);

    let history = tmp.path().join("history");
    assert!(!history.join("c1_bob.json").exists());
    assert!(!history.join("c1_eve.json").exists());
    assert!(history.join("c10_bob.json").exists());
    assert!(history.join("c2_bob.json").exists());
    assert_eq!(memory.load(&key("c10", "bob")).await.len(), 1);
}

#[tokio::test]
async fn test_purge_with_underscored_ids() {
    let (memory, _tmp) = temp_memory().await;
    memory
        .append(&key("aria_1700", "bob_1800"), ChatMessage::user("hi"))
        .await
        .unwrap();
    memory
        .append(&key("aria_17000", "bob_1800"), ChatMessage::user("hi"))
        .await
        .unwrap();

    assert_eq!(memory.purge_by_character("aria_1700").await.unwrap(), 1);
    assert_eq!(memory.load(&key("aria_17000", "bob_1800")).await.len(), 1);
}

#[tokio::test]
async fn test_purge_unknown_character_removes_nothing() {
    let (memory, _tmp) = temp_memory().await;
    memory
        .append(&key("c1", "bob"), ChatMessage::user("hello"))
        .await
        .unwrap();
    assert_eq!(memory.purge_by_character("c9").await.unwrap(), 0);
    assert_eq!(memory.load(&key("c1", "bob")).await.len(), 1);
}

#[tokio::test]
async fn test_persistence_across_instances() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("history");
    let k = key("alice", "bob");

    {
        let memory = FileSessionMemory::new(dir.clone()).await.unwrap();
        memory.append(&k, ChatMessage::user("persist me")).await.unwrap();
    }

    let memory2 = FileSessionMemory::new(dir).await.unwrap();
    assert_eq!(contents(&memory2.load(&k).await), vec!["persist me"]);
}

#[tokio::test]
async fn test_reads_legacy_string_history() {
    let (memory, tmp) = temp_memory().await;
    std::fs::write(
        tmp.path().join("history").join("alice_bob.json"),
        r#"["old question", "another"]"#,
    )
    .unwrap();

    let loaded = memory.load(&key("alice", "bob")).await;
    assert_eq!(loaded.len(), 2);
    assert!(loaded.iter().all(|m| m.role == Role::User));
}

#[tokio::test]
async fn test_concurrent_appends_same_key_are_serialized() {
    let tmp = tempfile::tempdir().unwrap();
    let memory = std::sync::Arc::new(
        FileSessionMemory::with_window(tmp.path().join("history"), 100)
            .await
            .unwrap(),
    );
    let k = key("alice", "bob");

    let mut handles = Vec::new();
    for i in 0..25 {
        let memory = memory.clone();
        let k = k.clone();
        handles.push(tokio::spawn(async move {
            memory
                .append(&k, ChatMessage::user(format!("m{i}")))
                .await
                .unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(memory.load(&k).await.len(), 25);
}

#[tokio::test]
async fn test_list_reports_every_session() {
    let (memory, _tmp) = temp_memory().await;
    memory
        .append(&key("c1", "bob"), ChatMessage::user("first"))
        .await
        .unwrap();
    memory
        .append(&key("c2", "bob"), ChatMessage::user("second"))
        .await
        .unwrap();

    let mut keys: Vec<String> = memory
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.key)
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["c1_bob", "c2_bob"]);
}

#[tokio::test]
async fn test_reset_from_second_instance_is_seen() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("history");
    let server = FileSessionMemory::new(dir.clone()).await.unwrap();
    let cli = FileSessionMemory::new(dir.clone()).await.unwrap();
    let k = key("alice", "bob");

    server.append(&k, ChatMessage::user("secret")).await.unwrap();
    assert_eq!(server.load(&k).await.len(), 1);

    cli.reset(&k).await.unwrap();
    assert!(!dir.join("alice_bob.json").exists());
    assert!(server.load(&k).await.is_empty());

    let window = server.append(&k, ChatMessage::user("next")).await.unwrap();
    assert_eq!(contents(&window), vec!["next"]);
}

#[tokio::test]
async fn test_purge_from_second_instance_is_seen() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("history");
    let server = FileSessionMemory::new(dir.clone()).await.unwrap();
    let cli = FileSessionMemory::new(dir).await.unwrap();
    let k = key("c1", "bob");

    server.append(&k, ChatMessage::user("hello")).await.unwrap();
    assert_eq!(cli.purge_by_character("c1").await.unwrap(), 1);
    assert!(server.load(&k).await.is_empty());
}

#[tokio::test]
async fn test_concurrent_append_and_reset_stay_consistent() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("history");
    let memory = std::sync::Arc::new(FileSessionMemory::with_window(dir.clone(), 100).await.unwrap());
    let k = key("alice", "bob");

    let mut handles = Vec::new();
    for i in 0..30 {
        let memory = memory.clone();
        let k = k.clone();
        handles.push(tokio::spawn(async move {
            if i % 5 == 0 {
                memory.reset(&k).await.unwrap();
            } else {
                memory
                    .append(&k, ChatMessage::user(format!("m{i}")))
                    .await
                    .unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let loaded = memory.load(&k).await;
    let path = dir.join("alice_bob.json");
    let on_disk: Vec<ChatMessage> = match std::fs::read_to_string(&path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap(),
        Err(_) => Vec::new(),
    };
    assert_eq!(loaded, on_disk);
    assert!(loaded.len() <= 24);

    let leftovers: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".json.tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

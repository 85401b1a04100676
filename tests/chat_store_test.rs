use std::sync::Arc;

use holo::chat::{Role, UiMessage};
use holo::store::ChatStore;

#[test]
fn unknown_chat_is_empty() {
    let store = ChatStore::new();
    assert!(store.load("nope").is_empty());
    assert!(store.is_empty());
}

#[test]
fn save_replaces_the_whole_history() {
    let store = ChatStore::new();
    store.save(
        "a",
        vec![
            UiMessage::text("1", Role::User, "hi"),
            UiMessage::text("2", Role::Assistant, "hello"),
        ],
    );
    store.save("a", vec![UiMessage::text("3", Role::User, "again")]);

    let loaded = store.load("a");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, "3");
    assert_eq!(store.len(), 1);
}

#[test]
fn chats_are_isolated_across_threads() {
    let store = Arc::new(ChatStore::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let id = format!("chat-{i}");
                store.save(&id, vec![UiMessage::text(format!("m{i}"), Role::User, "x")]);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.len(), 8);
    for i in 0..8 {
        assert_eq!(store.load(&format!("chat-{i}"))[0].id, format!("m{i}"));
    }
}

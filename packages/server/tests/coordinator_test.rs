//! Coordinator-level scenarios over the in-memory collaborators.

use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use yoriai_server::{
    config::SeedData,
    domain::{
        ChatMessage, Command, Connection, MessageContent, MessageKind, NotificationError,
        NotificationFanout, RoomId, UserId,
    },
    infrastructure::{
        auth::StaticTokenVerifier,
        message_pusher::WebSocketMessagePusher,
        repository::{InMemoryMembershipStore, InMemoryMessageStore},
    },
    usecase::{Collaborators, Coordinator, CoordinatorConfig},
};
use yoriai_shared::time::FixedClock;

/// 通知ファンアウトの呼び出しを記録する
#[derive(Default)]
struct RecordingFanout {
    calls: StdMutex<Vec<(RoomId, UserId)>>,
}

#[async_trait]
impl NotificationFanout for RecordingFanout {
    async fn notify_room_members(
        &self,
        room_id: &RoomId,
        exclude_user_id: &UserId,
        _message: &ChatMessage,
    ) -> Result<(), NotificationError> {
        self.calls
            .lock()
            .unwrap()
            .push((room_id.clone(), exclude_user_id.clone()));
        Ok(())
    }
}

/// Helper struct holding a started coordinator and its in-memory collaborators
struct Harness {
    coordinator: Coordinator,
    messages: Arc<InMemoryMessageStore>,
    fanout: Arc<RecordingFanout>,
}

impl Harness {
    /// alice / bob / carol, room "general" = {alice, bob}, room "random" = {alice}
    fn start() -> Self {
        let seed = SeedData::from_json(
            r#"{
                "users": [
                    {"token": "alice-token", "userId": "alice", "displayName": "Alice"},
                    {"token": "bob-token", "userId": "bob", "displayName": "Bob"},
                    {"token": "carol-token", "userId": "carol", "displayName": "Carol"}
                ],
                "rooms": [
                    {"roomId": "general", "members": ["alice", "bob"]},
                    {"roomId": "random", "members": ["alice"]}
                ]
            }"#,
        )
        .unwrap()
        .validate()
        .unwrap();

        let clock = Arc::new(FixedClock::new(1_700_000_000_000));
        let messages = Arc::new(InMemoryMessageStore::new(seed.directory, 100, clock.clone()));
        let fanout = Arc::new(RecordingFanout::default());
        let coordinator = Coordinator::new(
            Collaborators {
                auth_verifier: Arc::new(StaticTokenVerifier::new(seed.tokens)),
                membership_store: Arc::new(InMemoryMembershipStore::with_rooms(seed.rooms)),
                message_store: messages.clone(),
                notification_fanout: fanout.clone(),
                message_pusher: Arc::new(WebSocketMessagePusher::new()),
                clock,
            },
            CoordinatorConfig::default(),
        );
        coordinator.start();

        Self {
            coordinator,
            messages,
            fanout,
        }
    }

    async fn connect(&self, user: &str) -> TestConnection {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = format!("{}-token", user);
        let connection = self
            .coordinator
            .connect_user()
            .execute(Some(token.as_str()), tx)
            .await
            .unwrap();
        TestConnection { connection, rx }
    }

    async fn send(&self, conn: &TestConnection, command: Command) {
        let _ = self
            .coordinator
            .handle_command()
            .execute(&conn.connection, command)
            .await;
    }
}

/// Helper struct for one open connection and its outbound frames
struct TestConnection {
    connection: Connection,
    rx: UnboundedReceiver<String>,
}

impl TestConnection {
    /// 受信済みのイベントを全て取り出す
    fn events(&mut self) -> Vec<serde_json::Value> {
        let mut events = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            events.push(serde_json::from_str(&frame).unwrap());
        }
        events
    }

    fn event_types(&mut self) -> Vec<String> {
        self.events()
            .iter()
            .map(|event| event["type"].as_str().unwrap().to_string())
            .collect()
    }
}

fn room(id: &str) -> RoomId {
    RoomId::new(id.to_string()).unwrap()
}

fn text(content: &str) -> MessageContent {
    MessageContent::new(content.to_string()).unwrap()
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_presence_reference_counting() {
    // テスト項目: N 本の接続のうち N-1 本を閉じてもオンライン、N 本目で user_offline が 1 回だけ届く
    // given (前提条件):
    let harness = Harness::start();
    let mut bob = harness.connect("bob").await;
    let alice1 = harness.connect("alice").await;
    let alice2 = harness.connect("alice").await;
    let alice3 = harness.connect("alice").await;
    assert_eq!(bob.event_types(), vec!["online_users", "user_online"]);

    // when (操作):
    let disconnect = harness.coordinator.disconnect_user();
    assert!(!disconnect.execute(alice1.connection).await.went_offline);
    assert!(!disconnect.execute(alice2.connection).await.went_offline);

    // then (期待する結果):
    assert!(bob.events().is_empty());
    let presence = harness.coordinator.presence();
    assert!(presence.is_online(&UserId::new("alice".to_string()).unwrap()).await);

    assert!(disconnect.execute(alice3.connection).await.went_offline);
    let events = bob.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "user_offline");
    assert_eq!(events[0]["userId"], "alice");
}

#[tokio::test(start_paused = true)]
async fn test_typing_debounce_and_self_healing() {
    // テスト項目: 入力開始の連打は 1 回の user_typing になり、最後の更新から 5 秒後に自動停止する
    // given (前提条件):
    let harness = Harness::start();
    let alice = harness.connect("alice").await;
    let mut bob = harness.connect("bob").await;
    bob.events();

    // when (操作):
    for _ in 0..3 {
        harness
            .send(&alice, Command::TypingStart { room_id: room("general") })
            .await;
        tokio::time::advance(Duration::from_millis(500)).await;
    }
    settle().await;

    // then (期待する結果):
    assert_eq!(bob.event_types(), vec!["user_typing"]);

    // 最後の start は 0.5 秒前。あと 4.4 秒では発火しない
    tokio::time::advance(Duration::from_millis(4400)).await;
    settle().await;
    assert!(bob.events().is_empty());

    tokio::time::advance(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(bob.event_types(), vec!["user_stopped_typing"]);
    assert_eq!(harness.coordinator.typing().entry_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_two_device_typing_scenario() {
    // テスト項目: A（2 接続）が入力を始めると B に user_typing が届き、5.1 秒後に何もしなくても user_stopped_typing が届く
    // given (前提条件):
    let harness = Harness::start();
    let a1 = harness.connect("alice").await;
    let mut a2 = harness.connect("alice").await;
    let mut b = harness.connect("bob").await;
    a2.events();
    b.events();

    // when (操作):
    harness
        .send(&a1, Command::TypingStart { room_id: room("general") })
        .await;

    // then (期待する結果):
    let events = b.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "user_typing");
    assert_eq!(events[0]["roomId"], "general");
    assert_eq!(events[0]["userId"], "alice");

    tokio::time::advance(Duration::from_millis(5100)).await;
    settle().await;
    let events = b.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "user_stopped_typing");
    assert_eq!(events[0]["roomId"], "general");
    assert_eq!(events[0]["userId"], "alice");
    // A のもう一方の接続にも開始・停止が届く
    assert_eq!(a2.event_types(), vec!["user_typing", "user_stopped_typing"]);
}

#[tokio::test]
async fn test_message_clears_typing() {
    // テスト項目: 入力中のユーザーがメッセージを送ると、入力中状態が解除される
    // given (前提条件):
    let harness = Harness::start();
    let alice = harness.connect("alice").await;
    let mut bob = harness.connect("bob").await;
    harness
        .send(&alice, Command::TypingStart { room_id: room("general") })
        .await;
    bob.events();

    // when (操作):
    harness
        .send(
            &alice,
            Command::SendMessage {
                room_id: room("general"),
                content: text("hi"),
                kind: MessageKind::Text,
            },
        )
        .await;

    // then (期待する結果):
    assert_eq!(bob.event_types(), vec!["new_message", "user_stopped_typing"]);
    assert_eq!(harness.coordinator.typing().entry_count().await, 0);
}

#[tokio::test]
async fn test_non_member_rejection() {
    // テスト項目: メンバーでないユーザーの send_message / join_room は拒否され、何も配信・永続化されない
    // given (前提条件):
    let harness = Harness::start();
    let mut alice = harness.connect("alice").await;
    let mut carol = harness.connect("carol").await;
    alice.events();
    carol.events();

    // when (操作):
    harness
        .send(
            &carol,
            Command::SendMessage {
                room_id: room("general"),
                content: text("let me in"),
                kind: MessageKind::Text,
            },
        )
        .await;
    harness
        .send(&carol, Command::JoinRoom { room_id: room("general") })
        .await;
    settle().await;

    // then (期待する結果):
    let errors = carol.events();
    assert_eq!(errors.len(), 2);
    for error in &errors {
        assert_eq!(error["type"], "error");
        assert_eq!(error["kind"], "membership_denied");
    }
    assert!(alice.events().is_empty());
    assert_eq!(harness.messages.count().await, 0);
    assert!(harness.fanout.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_multi_device_fan_out_exactly_once() {
    // テスト項目: 2 接続のうち一方から送ったメッセージが、両方の接続と他のメンバーに 1 回ずつ届く
    // given (前提条件):
    let harness = Harness::start();
    let mut phone = harness.connect("alice").await;
    let mut laptop = harness.connect("alice").await;
    let mut bob = harness.connect("bob").await;
    let mut carol = harness.connect("carol").await;
    for conn in [&mut phone, &mut laptop, &mut bob, &mut carol] {
        conn.events();
    }

    // when (操作):
    harness
        .send(
            &phone,
            Command::SendMessage {
                room_id: room("general"),
                content: text("from my phone"),
                kind: MessageKind::Text,
            },
        )
        .await;
    settle().await;

    // then (期待する結果):
    let persisted = harness.messages.messages_in_room(&room("general")).await;
    assert_eq!(persisted.len(), 1);
    for conn in [&mut phone, &mut laptop, &mut bob] {
        let events = conn.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "new_message");
        assert_eq!(events[0]["message"]["id"], persisted[0].id.to_string());
        assert_eq!(events[0]["message"]["senderName"], "Alice");
    }
    // carol はメンバーではない
    assert!(carol.events().is_empty());
    assert_eq!(
        *harness.fanout.calls.lock().unwrap(),
        vec![(room("general"), UserId::new("alice".to_string()).unwrap())]
    );
}

#[tokio::test]
async fn test_push_and_evict_membership() {
    // テスト項目: メンバー追加・除名が開いている接続に再接続なしで反映される
    // given (前提条件):
    let harness = Harness::start();
    let mut carol = harness.connect("carol").await;
    let alice = harness.connect("alice").await;
    carol.events();
    let carol_id = carol.connection.user_id().clone();

    // when (操作): carol を general に追加
    let pushed = harness
        .coordinator
        .rooms()
        .push_member_into_room(&carol_id, &room("general"))
        .await;
    harness
        .send(
            &alice,
            Command::SendMessage {
                room_id: room("general"),
                content: text("welcome"),
                kind: MessageKind::Text,
            },
        )
        .await;

    // then (期待する結果):
    assert_eq!(pushed, 1);
    assert_eq!(carol.event_types(), vec!["joined_room", "new_message"]);

    // when (操作): carol を除名
    let evicted = harness
        .coordinator
        .rooms()
        .evict_member_from_room(&carol_id, &room("general"))
        .await;
    harness
        .send(
            &alice,
            Command::SendMessage {
                room_id: room("general"),
                content: text("bye"),
                kind: MessageKind::Text,
            },
        )
        .await;

    // then (期待する結果):
    assert_eq!(evicted, 1);
    assert_eq!(carol.event_types(), vec!["removed_from_room"]);
}

#[tokio::test]
async fn test_isolated_coordinators_do_not_share_state() {
    // テスト項目: 別々に作ったコーディネーターは状態を共有しない
    // given (前提条件):
    let first = Harness::start();
    let second = Harness::start();

    // when (操作):
    let _alice = first.connect("alice").await;

    // then (期待する結果):
    assert_eq!(first.coordinator.presence().connection_count().await, 1);
    assert_eq!(second.coordinator.presence().connection_count().await, 0);
}

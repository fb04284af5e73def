//! Integration tests for switching between conversations on one transport.

use std::sync::Arc;

use chat_orchestrator::adapters::{InMemoryWidgetEventBus, MockTransport};
use chat_orchestrator::application::{ConversationEngine, Engine};
use chat_orchestrator::domain::conversation::{Conversation, ConversationPatch, ConversationStatus};
use chat_orchestrator::domain::foundation::{ConversationId, StreamId};
use chat_orchestrator::domain::genui::{AIChunk, StreamAssembler, StreamState};
use chat_orchestrator::domain::message::IncomingMessage;
use chat_orchestrator::ports::{HistoryPage, TransportCapabilities, WidgetEventKind};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn conversation(id: &str, status: ConversationStatus) -> Conversation {
    Conversation::new(id, format!("Conversation {id}")).with_status(status)
}

fn cid(id: &str) -> ConversationId {
    ConversationId::new(id)
}

async fn setup(conversations: Vec<Conversation>) -> (ConversationEngine, Arc<MockTransport>) {
    let transport = Arc::new(
        MockTransport::new()
            .with_capabilities(TransportCapabilities::conversations())
            .with_conversations(conversations),
    );
    let engine = ConversationEngine::new(Engine::new(transport.clone()));
    engine.init().await.unwrap();
    (engine, transport)
}

fn message_ids(engine: &ConversationEngine) -> Vec<String> {
    engine
        .engine()
        .messages()
        .into_iter()
        .map(|m| m.id.to_string())
        .collect()
}

// =============================================================================
// Init
// =============================================================================

#[tokio::test]
async fn init_activates_first_open_conversation() {
    let (engine, transport) = setup(vec![
        conversation("a", ConversationStatus::Resolved),
        conversation("b", ConversationStatus::Pending),
        conversation("c", ConversationStatus::Open),
    ])
    .await;

    assert_eq!(engine.active().map(|c| c.id), Some(cid("c")));
    assert_eq!(engine.conversations().len(), 3);
    assert_eq!(transport.calls().switched, vec![cid("c")]);
}

#[tokio::test]
async fn init_without_listing_leaves_registry_empty() {
    let transport = Arc::new(MockTransport::new().with_conversations(vec![conversation(
        "a",
        ConversationStatus::Open,
    )]));
    let engine = ConversationEngine::new(Engine::new(transport.clone()));

    engine.init().await.unwrap();

    assert!(engine.conversations().is_empty());
    assert!(engine.active().is_none());
    assert_eq!(transport.calls().list_conversations, 0);
}

#[tokio::test]
async fn conversation_updates_merge_into_registry() {
    let (engine, transport) = setup(vec![conversation("a", ConversationStatus::Open)]).await;

    transport.emit_conversation_update(
        "a",
        ConversationPatch {
            last_message: Some("See you tomorrow".into()),
            ..ConversationPatch::default()
        },
    );

    let updated = engine.registry().get(&cid("a")).unwrap();
    assert_eq!(updated.last_message.as_deref(), Some("See you tomorrow"));
}

#[tokio::test]
async fn retried_init_registers_update_callback_once() {
    let transport = Arc::new(
        MockTransport::new()
            .with_capabilities(TransportCapabilities::conversations())
            .with_conversations(vec![conversation("a", ConversationStatus::Open)]),
    );
    transport.fail_connects(1);
    let engine = ConversationEngine::new(Engine::new(transport.clone()));

    assert!(engine.init().await.is_err());
    engine.init().await.unwrap();

    assert_eq!(transport.calls().conversation_update_handlers, 1);
    assert_eq!(engine.active().map(|c| c.id), Some(cid("a")));
}

// =============================================================================
// Switching
// =============================================================================

#[tokio::test]
async fn switching_caches_and_restores_snapshots() {
    let (engine, transport) = setup(vec![
        conversation("a", ConversationStatus::Open),
        conversation("b", ConversationStatus::Open).with_unread(4),
    ])
    .await;
    transport.emit_message(IncomingMessage::text("a1", "first in a"));
    transport.emit_message(IncomingMessage::text("a2", "second in a"));
    let snapshot_a = engine.engine().messages();

    engine.switch_to(&cid("b")).await.unwrap();

    assert!(engine.engine().messages().is_empty());
    assert_eq!(engine.registry().cached_messages(&cid("a")), snapshot_a);
    assert_eq!(engine.registry().get(&cid("b")).unwrap().unread_count, Some(0));

    transport.emit_message(IncomingMessage::text("b1", "in b"));
    engine.switch_to(&cid("a")).await.unwrap();

    assert_eq!(engine.engine().messages(), snapshot_a);
    assert_eq!(message_ids(&engine), vec!["a1", "a2"]);

    engine.switch_to(&cid("b")).await.unwrap();
    assert_eq!(message_ids(&engine), vec!["b1"]);
}

#[tokio::test]
async fn switching_to_active_conversation_is_a_no_op() {
    let (engine, transport) = setup(vec![conversation("a", ConversationStatus::Open)]).await;
    let switches_before = transport.calls().switched.len();

    engine.switch_to(&cid("a")).await.unwrap();

    assert_eq!(transport.calls().switched.len(), switches_before);
}

#[tokio::test]
async fn restore_resets_dedup_for_switched_in_conversation() {
    let (engine, transport) = setup(vec![
        conversation("a", ConversationStatus::Open),
        conversation("b", ConversationStatus::Open),
    ])
    .await;
    transport.emit_message(IncomingMessage::text("m1", "only in a"));

    engine.switch_to(&cid("b")).await.unwrap();
    transport.emit_message(IncomingMessage::text("m1", "same id, different conversation"));

    assert_eq!(engine.engine().messages().len(), 1);
}

#[tokio::test]
async fn stream_switched_away_mid_flight_stays_one_message() {
    let transport = Arc::new(
        MockTransport::new()
            .with_capabilities(TransportCapabilities::conversations())
            .with_conversations(vec![
                conversation("a", ConversationStatus::Open),
                conversation("b", ConversationStatus::Open),
            ]),
    );
    let bus = Arc::new(InMemoryWidgetEventBus::recording());
    let engine = ConversationEngine::new(Engine::builder(transport.clone()).events(bus.clone()).build());
    engine.init().await.unwrap();
    let message_id = StreamAssembler::message_id_for(&StreamId::new("s1"));

    transport.emit_chunk("s1", AIChunk::text(1, "hel"), false);
    engine.switch_to(&cid("b")).await.unwrap();
    transport.emit_chunk("s1", AIChunk::text(2, "lo"), true);

    assert!(engine.engine().messages().is_empty());
    assert_eq!(bus.events_of_kind(WidgetEventKind::GenUiStreamStarted).len(), 1);
    assert_eq!(bus.events_of_kind(WidgetEventKind::GenUiStreamCompleted).len(), 1);

    let cached = engine.registry().cached_messages(&cid("a"));
    let state = StreamState::from_payload(&cached[0].data).unwrap();
    assert_eq!(state.text(), "hello");

    engine.switch_to(&cid("a")).await.unwrap();

    let messages = engine.engine().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, message_id);
    let state = StreamState::from_payload(&messages[0].data).unwrap();
    assert_eq!(state.text(), "hello");
    assert!(state.streaming_complete);
}

#[tokio::test]
async fn stream_completed_elsewhere_survives_further_switches() {
    let (engine, transport) = setup(vec![
        conversation("a", ConversationStatus::Open),
        conversation("b", ConversationStatus::Open),
        conversation("c", ConversationStatus::Open),
    ])
    .await;

    transport.emit_chunk("s1", AIChunk::text(1, "par"), false);
    engine.switch_to(&cid("b")).await.unwrap();
    transport.emit_chunk("s1", AIChunk::text(2, "tial"), true);
    engine.switch_to(&cid("c")).await.unwrap();
    engine.switch_to(&cid("a")).await.unwrap();

    let messages = engine.engine().messages();
    assert_eq!(messages.len(), 1);
    let state = StreamState::from_payload(&messages[0].data).unwrap();
    assert_eq!(state.text(), "partial");
    assert!(state.streaming_complete);
}

#[tokio::test]
async fn history_paging_starts_over_in_switched_in_conversation() {
    let transport = Arc::new(
        MockTransport::new()
            .with_capabilities(TransportCapabilities {
                history: true,
                ..TransportCapabilities::conversations()
            })
            .with_conversations(vec![
                conversation("a", ConversationStatus::Open),
                conversation("b", ConversationStatus::Open),
            ])
            .with_history_page(HistoryPage {
                messages: vec![IncomingMessage::text("a-old", "from a")],
                has_more: false,
                cursor: None,
            })
            .with_history_page(HistoryPage {
                messages: vec![IncomingMessage::text("b-old", "from b")],
                has_more: true,
                cursor: Some("b-2".into()),
            }),
    );
    let engine = ConversationEngine::new(Engine::new(transport.clone()));
    engine.init().await.unwrap();

    assert_eq!(engine.engine().load_history().await.unwrap(), 1);
    assert!(!engine.engine().has_more_history());

    engine.switch_to(&cid("b")).await.unwrap();

    assert!(engine.engine().has_more_history());
    assert_eq!(engine.engine().load_history().await.unwrap(), 1);
    assert_eq!(message_ids(&engine), vec!["b-old"]);
    assert_eq!(transport.calls().history_cursors, vec![None, None]);
}

// =============================================================================
// Create / close
// =============================================================================

#[tokio::test]
async fn create_new_adds_and_activates() {
    let (engine, transport) = setup(vec![conversation("a", ConversationStatus::Open)]).await;

    let created = engine.create_new(Some("Billing"), None).await.unwrap().unwrap();

    assert_eq!(created.title, "Billing");
    assert_eq!(engine.active().map(|c| c.id), Some(created.id.clone()));
    assert_eq!(engine.conversations().len(), 2);
    assert_eq!(transport.calls().created, vec![Some("Billing".to_string())]);
}

#[tokio::test]
async fn create_new_without_support_returns_none() {
    let transport = Arc::new(MockTransport::new());
    let engine = ConversationEngine::new(Engine::new(transport.clone()));
    engine.init().await.unwrap();

    let created = engine.create_new(Some("Billing"), None).await.unwrap();

    assert!(created.is_none());
    assert!(engine.conversations().is_empty());
    assert!(transport.calls().created.is_empty());
}

#[tokio::test]
async fn closing_active_moves_to_next_open_conversation() {
    let (engine, _) = setup(vec![
        conversation("a", ConversationStatus::Open),
        conversation("b", ConversationStatus::Closed),
        conversation("c", ConversationStatus::Pending),
    ])
    .await;
    assert_eq!(engine.active().map(|c| c.id), Some(cid("a")));

    engine.close(&cid("a")).await.unwrap();

    assert_eq!(engine.active().map(|c| c.id), Some(cid("c")));
    assert!(engine.registry().get(&cid("a")).unwrap().status.is_closed());
}

#[tokio::test]
async fn closing_last_open_conversation_clears_active() {
    let (engine, _) = setup(vec![
        conversation("a", ConversationStatus::Open),
        conversation("b", ConversationStatus::Closed),
    ])
    .await;

    engine.close(&cid("a")).await.unwrap();

    assert!(engine.active().is_none());
}

#[tokio::test]
async fn closing_inactive_conversation_keeps_active() {
    let (engine, transport) = setup(vec![
        conversation("a", ConversationStatus::Open),
        conversation("b", ConversationStatus::Open),
    ])
    .await;

    engine.close(&cid("b")).await.unwrap();

    assert_eq!(engine.active().map(|c| c.id), Some(cid("a")));
    assert_eq!(transport.calls().closed, vec![cid("b")]);
}

#[tokio::test]
async fn destroy_forgets_conversations() {
    let (engine, transport) = setup(vec![conversation("a", ConversationStatus::Open)]).await;

    engine.destroy().await;

    assert!(engine.conversations().is_empty());
    assert!(engine.active().is_none());
    assert_eq!(transport.calls().disconnect, 1);
    assert!(engine.switch_to(&cid("a")).await.is_err());
}

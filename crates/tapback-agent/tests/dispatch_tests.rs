// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Poll-cycle scenarios driven through the full agent with mock adapters.

use std::path::PathBuf;

use tapback_core::{
    AgentEvent, AttachmentKind, ConversationKind, Direction, OutboundTarget, Participant,
    StreamPayload,
};
use tapback_test_utils::{MockSearch, TestHarness};

const ALICE: &str = "+15550001111";
const MALLORY: &str = "+15559990000";

fn harness() -> TestHarness {
    TestHarness::builder().allowing(&[ALICE]).build()
}

#[tokio::test]
async fn allowed_individual_trigger_replies_to_sender() {
    let h = harness();
    h.provider.add_stream_text(&["4", ""]).await;
    h.source.push("iMessage;-;+15550001111", ConversationKind::Individual, "+1 (555) 000-1111", "@ai what's 2+2", 100);

    assert_eq!(h.poll().await, 1);

    let sent = h.sender.sent_messages().await;
    assert_eq!(sent, vec![("4".to_string(), OutboundTarget::Phone(ALICE.into()))]);

    let requests = h.provider.requests().await;
    assert_eq!(requests.len(), 1);
    let input = format!("{:?}", requests[0].input);
    assert!(input.contains("User request: what's 2+2"));
    assert!(input.contains("Requester: +15550001111"));

    let reply = h
        .sink
        .events()
        .into_iter()
        .find(|e| matches!(e, AgentEvent::NewMessage { response: Some(_), .. }))
        .unwrap();
    assert_eq!(
        reply,
        AgentEvent::NewMessage {
            phone: ALICE.into(),
            message: "@ai what's 2+2".into(),
            chat_type: ConversationKind::Individual,
            chat_guid: Some("iMessage;-;+15550001111".into()),
            response: Some("4".into()),
        }
    );
}

#[tokio::test]
async fn sender_outside_allow_list_is_logged_but_ignored() {
    let h = harness();
    h.source.push("chat-m", ConversationKind::Individual, MALLORY, "@ai tell me a secret", 100);

    h.poll().await;

    assert_eq!(h.provider.request_count().await, 0);
    assert_eq!(h.sender.sent_count().await, 0);
    assert_eq!(h.sink.count("new_message"), 1);

    let log = h.agent.get_message_log(None);
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].phone, MALLORY);
    assert_eq!(log[0].direction, Direction::Received);
}

#[tokio::test]
async fn self_sent_trigger_never_replies() {
    let h = harness();
    h.source.push_from_me("chat1", ConversationKind::Individual, "@ai ping", 100);

    h.poll().await;

    assert_eq!(h.provider.request_count().await, 0);
    assert_eq!(h.sender.sent_count().await, 0);
}

#[tokio::test]
async fn untriggered_and_empty_commands_are_ignored() {
    let h = harness();
    h.source.push("chat1", ConversationKind::Individual, ALICE, "just chatting", 100);
    h.source.push("chat1", ConversationKind::Individual, ALICE, "@ai   ", 101);

    assert_eq!(h.poll().await, 2);
    assert_eq!(h.provider.request_count().await, 0);
    assert_eq!(h.sink.count("new_message"), 2);
}

#[tokio::test]
async fn watermark_tracks_the_newest_message() {
    let h = harness();
    for (ts, text) in [(300, "c"), (100, "a"), (200, "b")] {
        h.source.push("chat1", ConversationKind::Individual, MALLORY, text, ts);
    }

    assert_eq!(h.poll().await, 3);
    assert_eq!(h.agent.health().await.last_seen_timestamp, 300);
    assert_eq!(h.poll().await, 0);

    h.source.push("chat1", ConversationKind::Individual, MALLORY, "d", 250);
    assert_eq!(h.poll().await, 0);
    assert_eq!(h.agent.health().await.last_seen_timestamp, 300);
}

#[tokio::test]
async fn group_replies_go_to_the_chat() {
    let h = harness();
    h.provider.add_stream_text(&["hello all"]).await;
    h.source.push("iMessage;+;chat42", ConversationKind::Group, ALICE, "@ai say hi", 100);

    h.poll().await;

    let sent = h.sender.sent_messages().await;
    assert_eq!(sent[0].1, OutboundTarget::Chat("iMessage;+;chat42".into()));
    let log = h.agent.get_message_log(None);
    let outbound = log.iter().find(|e| e.direction == Direction::Sent).unwrap();
    assert_eq!(outbound.phone, ALICE);
}

#[tokio::test]
async fn stream_deltas_reach_observers_in_order() {
    let h = harness();
    h.provider.add_stream_text(&["one ", "two ", "three"]).await;
    h.source.push("chat1", ConversationKind::Individual, ALICE, "@ai count", 100);

    h.poll().await;

    let payloads: Vec<_> = h
        .sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AgentEvent::AiStream { payload, .. } => Some(payload),
            _ => None,
        })
        .collect();
    assert_eq!(
        payloads,
        vec![
            StreamPayload::Delta { delta: "one ".into() },
            StreamPayload::Delta { delta: "two ".into() },
            StreamPayload::Delta { delta: "three".into() },
            StreamPayload::Done { text: "one two three".into() },
        ]
    );
}

#[tokio::test]
async fn unreachable_store_is_reported_once_per_outage() {
    let h = harness();
    h.source.set_unreachable(true);

    h.poll().await;
    h.poll().await;
    assert_eq!(h.sink.count("agent_error"), 1);
    match &h.sink.events()[0] {
        AgentEvent::AgentError { kind, hint, .. } => {
            assert_eq!(kind, "db_open");
            assert!(hint.as_deref().unwrap().contains("Full Disk Access"));
        }
        other => panic!("unexpected event {other:?}"),
    }

    h.source.set_unreachable(false);
    h.poll().await;
    h.source.set_unreachable(true);
    h.poll().await;
    assert_eq!(h.sink.count("agent_error"), 2);
}

#[tokio::test]
async fn one_failed_send_does_not_stop_the_batch() {
    let h = harness();
    h.sender.fail_sends(true);
    h.provider.add_stream_text(&["first reply"]).await;
    h.source.push("chat1", ConversationKind::Individual, ALICE, "@ai first", 100);
    h.source.push("chat1", ConversationKind::Individual, MALLORY, "hello", 101);

    assert_eq!(h.poll().await, 2);
    assert_eq!(h.agent.health().await.last_seen_timestamp, 101);
    assert_eq!(h.sink.count("message_sent"), 0);

    h.sender.fail_sends(false);
    h.provider.add_stream_text(&["second reply"]).await;
    h.source.push("chat1", ConversationKind::Individual, ALICE, "@ai second", 102);
    h.poll().await;

    // The mock records every attempt, failed ones included.
    assert_eq!(h.sent_texts().await, vec!["first reply".to_string(), "second reply".to_string()]);
    assert_eq!(h.sink.count("message_sent"), 1);
}

#[tokio::test]
async fn ambiguous_mention_asks_for_clarification() {
    let h = harness();
    h.source.set_participants(
        "chat-g",
        vec![
            Participant {
                handle: "a".into(),
                name: Some("Jon Smith".into()),
            },
            Participant {
                handle: "b".into(),
                name: Some("Jonas Lee".into()),
            },
        ],
    );
    h.source.push("chat-g", ConversationKind::Group, ALICE, "@ai what did @jon say?", 100);

    h.poll().await;

    assert_eq!(h.provider.request_count().await, 0);
    let texts = h.sent_texts().await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("I found multiple matches:"));
    assert!(texts[0].contains("1. Jon Smith (a)"));
    assert!(texts[0].contains("2. Jonas Lee (b)"));
}

#[tokio::test]
async fn resolved_mention_adds_their_latest_message() {
    let h = harness();
    h.source.set_participants(
        "chat-g",
        vec![Participant {
            handle: "+15552223333".into(),
            name: Some("Mary Poppins".into()),
        }],
    );
    h.source.push("chat-g", ConversationKind::Group, "+15552223333", "lunch at noon?", 90);
    h.source.push("chat-g", ConversationKind::Group, ALICE, "@ai reply to @mary for me", 100);

    h.poll().await;

    let requests = h.provider.requests().await;
    let input = format!("{:?}", requests[0].input);
    assert!(input.contains("Target from @mary (Mary Poppins):"));
    assert!(input.contains("lunch at noon?"));
}

#[tokio::test]
async fn image_request_describes_recent_images() {
    let dir = tempfile::tempdir().unwrap();
    let image = write(&dir, "cat.png", b"\x89PNG fake");
    let h = harness();
    h.provider.add_completion("A cat on a sofa.").await;
    h.source.add_attachment("chat1", AttachmentKind::Image, 90, image);
    h.source.push("chat1", ConversationKind::Individual, ALICE, "@ai describe this photo", 100);

    h.poll().await;

    assert_eq!(h.sent_texts().await, vec!["A cat on a sofa.".to_string()]);
}

#[tokio::test]
async fn image_request_without_images_falls_back_to_chat() {
    let h = harness();
    h.provider.add_stream_text(&["No image here, but hi."]).await;
    h.source.push("chat1", ConversationKind::Individual, ALICE, "@ai describe this photo", 100);

    h.poll().await;

    assert_eq!(h.sent_texts().await, vec!["No image here, but hi.".to_string()]);
}

#[tokio::test]
async fn images_sent_after_the_trigger_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let image = write(&dir, "later.png", b"\x89PNG");
    let h = harness();
    h.source.add_attachment("chat1", AttachmentKind::Image, 150, image);
    h.source.push("chat1", ConversationKind::Individual, ALICE, "@ai describe the picture", 100);

    h.poll().await;

    let requests = h.provider.requests().await;
    assert!(
        requests[0]
            .input
            .iter()
            .all(|p| !matches!(p, tapback_core::types::InputPart::Image { .. }))
    );
}

#[tokio::test]
async fn document_request_summarizes_uploaded_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write(&dir, "report.pdf", b"%PDF-1.4");
    let h = harness();
    h.provider.add_upload(Ok("file_1")).await;
    h.provider.add_completion("Revenue is up.").await;
    h.source.add_attachment("chat1", AttachmentKind::Pdf, 90, pdf);
    h.source.push("chat1", ConversationKind::Individual, ALICE, "@ai summarize the pdf", 100);

    h.poll().await;

    assert_eq!(h.sent_texts().await, vec!["report.pdf:\nRevenue is up.".to_string()]);
}

#[tokio::test]
async fn forced_search_answers_without_the_model() {
    let mut settings = tapback_core::AiSettings {
        enable_search: true,
        ..Default::default()
    };
    settings.allowed_users = vec![ALICE.into()];
    let h = TestHarness::builder()
        .with_settings(settings)
        .with_search(MockSearch::with_answer("Rain expected this afternoon."))
        .build();
    h.source.push("chat1", ConversationKind::Individual, ALICE, "@ai what's the weather today", 100);

    h.poll().await;

    assert_eq!(h.provider.request_count().await, 0);
    assert_eq!(h.search.calls(), 1);
    let texts = h.sent_texts().await;
    assert!(texts[0].contains("Rain expected this afternoon."));
    assert!(texts[0].contains("https://example.com"));
}

#[tokio::test]
async fn allow_list_changes_apply_on_the_next_cycle() {
    let h = TestHarness::builder().build();
    h.source.push("chat1", ConversationKind::Individual, ALICE, "@ai hi", 100);
    h.poll().await;
    assert_eq!(h.sender.sent_count().await, 0);

    h.agent.set_allowed_users(&["+1 555 000 1111"]).unwrap();
    h.source.push("chat1", ConversationKind::Individual, ALICE, "@ai hi again", 101);
    h.poll().await;
    assert_eq!(h.sender.sent_count().await, 1);
}

fn write(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

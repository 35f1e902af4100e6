//! Property-based tests for the session state machine

use super::effect::Effect;
use super::event::Event;
use super::state::{Phase, SessionState, Ticket};
use super::transition::{transition, TransitionError, MIN_TREE_MESSAGES};
use crate::model::{Analysis, ChatResponse, Message, Role};
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::User), Just(Role::Assistant)]
}

fn arb_message() -> impl Strategy<Value = Message> {
    ("[a-z]{6}", arb_role(), "[a-zA-Z ?]{1,30}", 0i64..1_000).prop_map(
        |(id, role, content, timestamp)| Message {
            id,
            role,
            content,
            timestamp,
        },
    )
}

fn arb_analysis() -> impl Strategy<Value = Analysis> {
    (
        prop::collection::vec(arb_message(), 0..8),
        prop::option::of("graph TD;[A-Z ]{0,10}"),
    )
        .prop_map(|(messages, tree)| {
            let mut analysis = Analysis::new("analysis", "title", 0);
            for message in messages {
                analysis.push_message(message);
            }
            analysis.tree_artifact = tree;
            analysis
        })
}

/// Resting states only
fn arb_resting_state() -> impl Strategy<Value = SessionState> {
    prop_oneof![
        Just(SessionState::Idle),
        arb_analysis().prop_map(|analysis| SessionState::Active { analysis }),
        arb_analysis().prop_map(|analysis| SessionState::ArtifactReady { analysis }),
    ]
}

fn user_event(content: String, ticket: Ticket) -> Event {
    Event::UserMessage {
        message: Message::new(Role::User, content, 2_000),
        analysis_id: "fresh".to_string(),
        ticket,
    }
}

fn reply_event(ticket: Ticket, content: &str, diagram: Option<String>) -> Event {
    Event::ReplyReceived {
        ticket,
        response: ChatResponse {
            message: Message::new(Role::Assistant, content, 3_000),
            mermaid_code: diagram,
        },
        at: 3_000,
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn blank_input_never_changes_state(
        state in arb_resting_state(),
        blank in "[ \t\n]{0,6}",
        ticket in any::<u64>(),
    ) {
        let err = transition(&state, user_event(blank, ticket)).unwrap_err();
        prop_assert_eq!(err, TransitionError::EmptyMessage);
    }

    #[test]
    fn message_round_trip_appends_two_in_order(
        state in arb_resting_state(),
        text in "[a-zA-Z]{1,20}",
        ticket in any::<u64>(),
    ) {
        let before = state.messages().len();
        let phase_before = state.phase();

        let pending = transition(&state, user_event(text.clone(), ticket)).unwrap();
        prop_assert_eq!(pending.new_state.phase(), Phase::Pending);
        let calls = pending
            .effects
            .iter()
            .filter(|e| matches!(e, Effect::CallBackend { ticket: t, .. } if *t == ticket))
            .count();
        prop_assert_eq!(calls, 1);

        let done = transition(&pending.new_state, reply_event(ticket, "why?", None)).unwrap();
        let messages = done.new_state.messages();
        prop_assert_eq!(messages.len(), before + 2);
        prop_assert_eq!(messages[before].role, Role::User);
        prop_assert_eq!(&messages[before].content, &text);
        prop_assert_eq!(messages[before + 1].role, Role::Assistant);

        let expected = if phase_before == Phase::ArtifactReady {
            Phase::ArtifactReady
        } else {
            Phase::Active
        };
        prop_assert_eq!(done.new_state.phase(), expected);
    }

    #[test]
    fn short_dialogue_never_calls_backend(
        mut analysis in arb_analysis(),
        ticket in any::<u64>(),
    ) {
        analysis.messages.truncate(MIN_TREE_MESSAGES - 1);
        let state = SessionState::Active { analysis };
        let result = transition(&state, Event::TreeRequested { ticket });
        let is_insufficient = matches!(result, Err(TransitionError::InsufficientDialogue { .. }));
        prop_assert!(is_insufficient);
    }

    #[test]
    fn mismatched_ticket_is_stale(
        state in arb_resting_state(),
        text in "[a-z]{1,10}",
        ticket in 0u64..1_000,
        offset in 1u64..1_000,
    ) {
        let pending = transition(&state, user_event(text, ticket)).unwrap().new_state;
        let other = ticket + offset;
        let err = transition(&pending, reply_event(other, "late", None)).unwrap_err();
        prop_assert_eq!(err, TransitionError::StaleReply { ticket: other });
    }

    #[test]
    fn reset_always_idles(state in arb_resting_state(), text in "[a-z]{1,10}") {
        let pending = transition(&state, user_event(text, 1)).unwrap().new_state;
        for from in [state, pending] {
            let result = transition(&from, Event::Reset).unwrap();
            prop_assert_eq!(result.new_state, SessionState::Idle);
        }
    }

    #[test]
    fn artifact_is_persisted_only_when_present(
        mut analysis in arb_analysis(),
        extra in prop::collection::vec(arb_message(), MIN_TREE_MESSAGES..4),
        diagram in prop::option::of("graph TD;[A-Z]{1,5}"),
    ) {
        for message in extra {
            analysis.push_message(message);
        }
        analysis.tree_artifact = None;
        let state = SessionState::Active { analysis };

        let pending = transition(&state, Event::TreeRequested { ticket: 5 }).unwrap().new_state;
        let done = transition(&pending, reply_event(5, "done", diagram.clone())).unwrap();

        prop_assert_eq!(done.new_state.phase(), Phase::ArtifactReady);
        let persisted = done
            .effects
            .iter()
            .any(|e| matches!(e, Effect::PersistAnalysis { .. }));
        prop_assert_eq!(persisted, diagram.is_some());
        prop_assert_eq!(
            done.new_state.analysis().and_then(|a| a.tree_artifact.clone()),
            diagram
        );
    }

    #[test]
    fn updated_at_never_precedes_created_at(
        state in arb_resting_state(),
        text in "[a-z]{1,10}",
    ) {
        let pending = transition(&state, user_event(text, 9)).unwrap().new_state;
        let done = transition(&pending, reply_event(9, "ok", None)).unwrap().new_state;
        let analysis = done.analysis().unwrap();
        prop_assert!(analysis.updated_at >= analysis.created_at);
    }
}

//! Property-based tests for the event-stream wire format.
//!
//! Uses proptest to verify:
//! 1. Any command survives encode → decode.
//! 2. Arbitrary text never panics the event decoder.
//! 3. Any well-formed frame with an unknown `type` decodes as
//!    `Inbound::Unrecognized`, never as an error.
//! 4. Task events decode the same whether the task is wrapped or bare.
//! 5. `Task::display_cmp` orders by position, then id.

#![allow(clippy::unwrap_used, clippy::panic)]

use agileparty_proto::codec::{self, Inbound};
use agileparty_proto::command::Command;
use agileparty_proto::event::ServerEvent;
use agileparty_proto::room::VOTE_DECK;
use agileparty_proto::task::{Task, TaskId};
use proptest::prelude::*;

// --- Strategies ---

fn arb_task_id() -> impl Strategy<Value = TaskId> {
    "[a-z0-9-]{1,36}".prop_map(TaskId::new)
}

fn arb_text() -> impl Strategy<Value = String> {
    "\\PC{0,64}"
}

fn arb_task() -> impl Strategy<Value = Task> {
    (
        arb_task_id(),
        arb_text(),
        -5_i64..50,
        prop::option::of(prop::sample::select(VOTE_DECK.to_vec())),
    )
        .prop_map(|(id, headline, position, estimation)| {
            let task = Task::new(id.as_str(), headline, position);
            match estimation {
                Some(e) => task.with_estimation(e),
                None => task,
            }
        })
}

fn arb_command() -> impl Strategy<Value = Command> {
    prop_oneof![
        prop::sample::select(VOTE_DECK.to_vec()).prop_map(Command::vote),
        Just(Command::Reveal {}),
        Just(Command::Clear {}),
        arb_text().prop_map(|nickname| Command::UpdateNickname { nickname }),
        arb_text().prop_map(|description| Command::SetTask { description }),
        (arb_text(), prop::option::of(arb_text())).prop_map(|(headline, description)| {
            Command::CreateTask {
                headline,
                description,
                tracker_link: None,
            }
        }),
        (arb_task_id(), arb_text()).prop_map(|(id, headline)| Command::update_task(id, headline)),
        arb_task_id().prop_map(|task_id| Command::DeleteTask { task_id }),
        prop::collection::vec(arb_task_id(), 0..8)
            .prop_map(|task_ids| Command::ReorderTasks { task_ids }),
        arb_task_id().prop_map(|task_id| Command::SetActiveTask { task_id }),
    ]
}

// --- Properties ---

proptest! {
    #[test]
    fn command_round_trip(command in arb_command()) {
        let text = codec::encode_command(&command).unwrap();
        let decoded = codec::decode_command(&text).unwrap();
        prop_assert_eq!(decoded, command);
    }

    #[test]
    fn event_decoder_never_panics(text in "\\PC*") {
        let _ = codec::decode_event(&text);
    }

    #[test]
    fn unknown_types_are_unrecognized(kind in "[a-z_]{1,24}", n in any::<i64>()) {
        prop_assume!(!ServerEvent::is_known_type(&kind));
        let frame = serde_json::json!({"type": kind, "payload": {"n": n}}).to_string();
        prop_assert_eq!(codec::decode_event(&frame).unwrap(), Inbound::Unrecognized(kind));
    }

    #[test]
    fn wrapped_and_bare_task_payloads_agree(task in arb_task()) {
        let bare = serde_json::json!({"type": "task_created", "payload": task}).to_string();
        let wrapped =
            serde_json::json!({"type": "task_created", "payload": {"task": task}}).to_string();
        for frame in [bare, wrapped] {
            let Inbound::Event(ServerEvent::TaskCreated(payload)) =
                codec::decode_event(&frame).unwrap()
            else {
                panic!("not a task_created event: {frame}");
            };
            prop_assert_eq!(payload.into_task(), task.clone());
        }
    }

    #[test]
    fn display_order_is_position_then_id(mut tasks in prop::collection::vec(arb_task(), 0..20)) {
        tasks.sort_by(Task::display_cmp);
        for pair in tasks.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(
                a.position < b.position || (a.position == b.position && a.id <= b.id),
                "{:?} before {:?}", a, b
            );
        }
    }
}

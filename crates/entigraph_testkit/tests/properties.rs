//! Property tests over random operation sequences on the chat schema.

use entigraph_core::wire::{decode_entity, encode_entity};
use entigraph_core::{EntityId, WireEncoding};
use entigraph_testkit::prelude::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_invariants_hold_after_every_call(ops in prop::collection::vec(graph_op_strategy(), 1..40)) {
        init_tracing();
        let mut test_ctx = TestContext::chat();
        for op in &ops {
            let _ = apply_op(&mut test_ctx, op);
            let violations = check_invariants(&test_ctx);
            prop_assert!(violations.is_empty(), "after {:?}:\n{}", op, violations.join("\n"));
        }
    }

    #[test]
    fn prop_failed_calls_change_nothing(
        setup in prop::collection::vec(graph_op_strategy(), 0..30),
        ops in prop::collection::vec(graph_op_strategy(), 1..20),
    ) {
        let mut test_ctx = TestContext::chat();
        for op in &setup {
            let _ = apply_op(&mut test_ctx, op);
        }
        for op in &ops {
            let before = snapshot(&test_ctx);
            if apply_op(&mut test_ctx, op).is_err() {
                prop_assert_eq!(&snapshot(&test_ctx), &before, "{:?}", op);
            }
        }
    }

    #[test]
    fn prop_indexed_queries_equal_scans(
        ops in prop::collection::vec(graph_op_strategy(), 0..40),
        predicates in prop::collection::vec(message_predicate_strategy(), 1..6),
    ) {
        let mut test_ctx = TestContext::chat();
        for op in &ops {
            let _ = apply_op(&mut test_ctx, op);
        }
        let violations = query_fidelity_violations(&test_ctx, "Message", &predicates);
        prop_assert!(violations.is_empty(), "{}", violations.join("\n"));
    }

    #[test]
    fn prop_repeated_saves_are_idempotent(
        setup in prop::collection::vec(graph_op_strategy(), 0..30),
        entity in prop_oneof![user_strategy(), chat_strategy(), message_strategy()],
    ) {
        let mut test_ctx = TestContext::chat();
        for op in &setup {
            let _ = apply_op(&mut test_ctx, op);
        }
        let first = test_ctx.save(entity.clone()).is_ok();
        let once = snapshot(&test_ctx);
        let second = test_ctx.save(entity).is_ok();
        prop_assert_eq!(first, second);
        prop_assert_eq!(snapshot(&test_ctx), once);
    }

    #[test]
    fn prop_hard_delete_of_chat_cascades(
        ops in prop::collection::vec(graph_op_strategy(), 0..40),
        chat in pooled_id_strategy("c", 3),
    ) {
        let mut test_ctx = TestContext::chat();
        for op in &ops {
            let _ = apply_op(&mut test_ctx, op);
        }
        let messages = test_ctx.get_children("Chat", "messages", &chat);
        let attachments: Vec<EntityId> = messages
            .iter()
            .flat_map(|m| test_ctx.get_children("Message", "attachments", m))
            .collect();
        let existed = test_ctx.find("Chat", &chat).is_some();

        prop_assert_eq!(test_ctx.hard_delete("Chat", &chat).unwrap(), existed);
        if existed {
            for m in &messages {
                prop_assert!(test_ctx.find("Message", m).is_none(), "message {} survived", m);
            }
            for a in &attachments {
                prop_assert!(test_ctx.find("Attachment", a).is_none(), "attachment {} survived", a);
            }
            prop_assert!(test_ctx.get_children("Chat", "users", &chat).is_empty());
            prop_assert!(test_ctx.get_children("Chat", "messages", &chat).is_empty());
        }
        assert_invariants(&test_ctx);
    }

    #[test]
    fn prop_detach_touches_only_named_links(
        ops in prop::collection::vec(graph_op_strategy(), 0..40),
        chat in pooled_id_strategy("c", 3),
        users in id_list_strategy("u", 5),
    ) {
        let mut test_ctx = TestContext::chat();
        for op in &ops {
            let _ = apply_op(&mut test_ctx, op);
        }
        let before = snapshot(&test_ctx);
        let linked_before = test_ctx.get_children("Chat", "users", &chat);

        test_ctx.detach("Chat", &chat, "users", &users).unwrap();

        let after = snapshot(&test_ctx);
        prop_assert_eq!(&after.entities, &before.entities);
        prop_assert_eq!(&after.tombstones, &before.tombstones);
        let expected: Vec<EntityId> = linked_before.into_iter().filter(|u| !users.contains(u)).collect();
        prop_assert_eq!(test_ctx.get_children("Chat", "users", &chat), expected);
        for user in &users {
            prop_assert!(!test_ctx.get_children("User", "chats", user).contains(&chat));
        }
        assert_invariants(&test_ctx);
    }

    #[test]
    fn prop_explicit_wire_round_trip(entity in prop_oneof![user_strategy(), chat_strategy(), message_strategy()]) {
        let schema = chat_schema();
        let encoded = encode_entity(&entity, WireEncoding::ExplicitKeyed);
        let decoded = decode_entity(&schema, entity.type_name(), &encoded).unwrap();
        prop_assert_eq!(decoded, entity);
    }
}

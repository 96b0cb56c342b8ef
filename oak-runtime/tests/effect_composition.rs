//! Idempotence and associativity laws the effect algebra promises:
//! cancelling everything twice is as good as cancelling once, cancelling a
//! proxy twice is as good as cancelling it once, and a `Sequence` flattens
//! the same way no matter how its leaves are grouped.

use futures::stream::FuturesUnordered;
use oak_core::{Context, Effect, Proxy};
use proptest::prelude::*;
use std::sync::Arc;

#[tokio::test]
async fn cancelling_all_tasks_twice_is_idempotent() {
    let context = Context::new();
    for i in 0..3 {
        let handle = tokio::spawn(std::future::pending::<()>());
        context.register(
            format!("task-{i}").into(),
            context.fresh_uid(),
            Some(handle.abort_handle()),
            tokio_util::sync::CancellationToken::new(),
        );
    }
    assert_eq!(context.len(), 3);

    context.cancel_all();
    assert!(context.is_empty());

    // A second call has nothing left to do and must not panic.
    context.cancel_all();
    assert!(context.is_empty());
}

#[tokio::test]
async fn cancelling_a_proxy_twice_is_idempotent() {
    let proxy = Proxy::<i32>::buffered_default();
    let token = proxy.cancellation();

    proxy.cancel();
    assert!(token.is_cancelled());

    // Idempotent: a second cancel is a no-op, not a panic or a second
    // distinct cancellation.
    proxy.cancel();
    assert!(token.is_cancelled());
}

/// A minimal tree shape mirroring what a `Sequence` can nest: either a
/// single leaf event or a group of child trees, to any depth.
#[derive(Clone, Debug)]
enum Node {
    Leaf(i32),
    Group(Vec<Node>),
}

fn node_strategy() -> impl Strategy<Value = Node> {
    let leaf = any::<i32>().prop_map(Node::Leaf);
    leaf.prop_recursive(4, 64, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Node::Group)
    })
}

fn node_to_effect(node: &Node) -> Effect<i32, ()> {
    match node {
        Node::Leaf(value) => Effect::event(*value),
        Node::Group(children) => Effect::sequence(children.iter().map(node_to_effect)),
    }
}

fn node_leaves(node: &Node, out: &mut Vec<i32>) {
    match node {
        Node::Leaf(value) => out.push(*value),
        Node::Group(children) => {
            for child in children {
                node_leaves(child, out);
            }
        }
    }
}

/// Runs `effect` through the same interpreter the run loop uses, with no
/// transducer or proxy involved — only `Sequence`/`EmitEvent` ever appear
/// in the generated trees, so this never spawns a task.
fn run_effect_sync(effect: Effect<i32, ()>) -> Vec<i32> {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let proxy = Proxy::<i32>::buffered_default();
        let input = proxy.input();
        let context = Context::new();
        let env = Arc::new(());
        let mut inline_ops = FuturesUnordered::new();
        oak_runtime::execute_effect(effect, &env, &input, &context, &mut inline_ops)
            .await
            .expect("EmitEvent/Sequence never fail")
    })
}

proptest! {
    #[test]
    fn sequence_flattens_in_leaf_order_regardless_of_grouping(node in node_strategy()) {
        let mut expected = Vec::new();
        node_leaves(&node, &mut expected);

        let actual = run_effect_sync(node_to_effect(&node));

        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn a_followed_by_sequence_of_b_c_equals_flat_sequence_of_a_b_c(a in any::<i32>(), b in any::<i32>(), c in any::<i32>()) {
        let nested = Effect::sequence(vec![
            Effect::event(a),
            Effect::sequence(vec![Effect::event(b), Effect::event(c)]),
        ]);
        let flat = Effect::sequence(vec![Effect::event(a), Effect::event(b), Effect::event(c)]);

        prop_assert_eq!(run_effect_sync(nested), run_effect_sync(flat));
    }
}

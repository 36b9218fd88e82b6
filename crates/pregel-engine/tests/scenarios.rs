//! End-to-end scenarios exercising a full [`Pregel`] run rather than a
//! single module in isolation.

use pregel_channels::{AccumulatorChannel, Channel, LastValueChannel, TopicChannel};
use pregel_engine::{EngineError, Pregel, Process, RecursionLimitPolicy, Subscription, ValueShape};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn channels(entries: Vec<(&str, Box<dyn Channel>)>) -> HashMap<String, Box<dyn Channel>> {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[tokio::test]
async fn chat_room_echo() {
    let chans = channels(vec![
        ("input", Box::new(LastValueChannel::new())),
        ("output", Box::new(LastValueChannel::new())),
    ]);
    let processes = vec![Process::invoke("echo", "input", "output", |v| {
        Ok(json!(format!("{}!", v.as_str().unwrap_or_default())))
    })];
    let engine = Pregel::new(
        chans,
        processes,
        ValueShape::Single("input".to_string()),
        ValueShape::Single("output".to_string()),
    )
    .unwrap();

    let output = engine.invoke(json!("hello")).await.unwrap();
    assert_eq!(output, json!("hello!"));
}

#[tokio::test]
async fn two_step_pipeline() {
    let chans = channels(vec![
        ("a", Box::new(LastValueChannel::new())),
        ("b", Box::new(LastValueChannel::new())),
        ("c", Box::new(LastValueChannel::new())),
    ]);
    let processes = vec![
        Process::invoke("increment", "a", "b", |v| Ok(json!(v.as_i64().unwrap() + 1))),
        Process::invoke("double", "b", "c", |v| Ok(json!(v.as_i64().unwrap() * 2))),
    ];
    let engine = Pregel::new(
        chans,
        processes,
        ValueShape::Single("a".to_string()),
        ValueShape::Single("c".to_string()),
    )
    .unwrap()
    .with_recursion_limit(2);

    let output = engine.invoke(json!(3)).await.unwrap();
    assert_eq!(output, json!(8));
}

#[tokio::test]
async fn fan_out_batch_sums_into_an_accumulator() {
    // Exercises the planner/runner directly with three separate writes
    // to `items` in one step, matching "[1,2,3] as writes to items"
    // literally - `Pregel::invoke`'s public surface takes one driver
    // value per call, so reaching three discrete writes in a single
    // step means driving the lower-level pieces the same way the step
    // loop does internally.
    let templates = channels(vec![
        ("items", Box::new(TopicChannel::new())),
        ("out", Box::new(AccumulatorChannel::sum())),
    ]);
    let mut registry = pregel_engine::ChannelRegistry::open(&templates);
    let processes = vec![Process::batch("sum", "items", None, "out", |v| {
        let total: i64 = v.as_array().unwrap().iter().filter_map(Value::as_i64).sum();
        Ok(json!(total))
    })];

    let snapshot = Arc::new(registry.snapshot_values());
    let tasks = pregel_engine::planner::apply_writes_and_prepare_next_tasks(
        &processes,
        registry.channels_mut(),
        vec![
            ("items".to_string(), json!(1)),
            ("items".to_string(), json!(2)),
            ("items".to_string(), json!(3)),
        ],
    );
    assert_eq!(tasks.len(), 1);
    let writes = pregel_engine::runner::run_step(tasks, snapshot, 0, None).await.unwrap();
    assert_eq!(writes, vec![("out".to_string(), json!(6))]);

    pregel_engine::planner::apply_writes_and_prepare_next_tasks(&processes, registry.channels_mut(), writes);
    assert_eq!(registry.get("out").unwrap().get().unwrap(), json!(6));
}

#[tokio::test]
async fn timeout_raises_and_emits_nothing() {
    let chans = channels(vec![
        ("input", Box::new(LastValueChannel::new())),
        ("output", Box::new(LastValueChannel::new())),
    ]);
    let process = Process::Invoke {
        name: "sleeper".to_string(),
        subscription: Subscription::Raw("input".to_string()),
        writes_to: vec!["output".to_string()],
        executor: Arc::new(|v: Value, _ctx: pregel_engine::RunContext| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![("output".to_string(), v)])
        }),
    };
    let engine = Pregel::new(
        chans,
        vec![process],
        ValueShape::Single("input".to_string()),
        ValueShape::Single("output".to_string()),
    )
    .unwrap()
    .with_step_timeout(Duration::from_millis(100));

    let err = engine.invoke(json!("go")).await.unwrap_err();
    match err {
        EngineError::Timeout { step, .. } => assert_eq!(step, 0),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn first_failure_cancels_the_sleeping_peer() {
    let chans = channels(vec![
        ("input", Box::new(LastValueChannel::new())),
        ("a", Box::new(LastValueChannel::new())),
        ("b", Box::new(LastValueChannel::new())),
    ]);
    let failing = Process::invoke("failing", "input", "a", |_v| {
        Err(anyhow::anyhow!("deliberate failure"))
    });
    let sleeping = Process::Invoke {
        name: "sleeping".to_string(),
        subscription: Subscription::Raw("input".to_string()),
        writes_to: vec!["b".to_string()],
        executor: Arc::new(|v: Value, _ctx: pregel_engine::RunContext| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(vec![("b".to_string(), v)])
        }),
    };
    let engine = Pregel::new(
        chans,
        vec![failing, sleeping],
        ValueShape::Single("input".to_string()),
        ValueShape::Single("a".to_string()),
    )
    .unwrap();

    let started = std::time::Instant::now();
    let err = engine.invoke(json!(1)).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(1), "sleeping peer must be cancelled promptly");
    match err {
        EngineError::UserFailure { process, .. } => assert_eq!(process, "failing"),
        other => panic!("expected UserFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn unrouted_write_is_a_diagnostic_not_a_failure() {
    let chans = channels(vec![
        ("input", Box::new(LastValueChannel::new())),
        ("output", Box::new(LastValueChannel::new())),
    ]);
    let process = Process::Invoke {
        name: "scatter".to_string(),
        subscription: Subscription::Raw("input".to_string()),
        writes_to: vec!["output".to_string()],
        executor: Arc::new(|v: Value, _ctx: pregel_engine::RunContext| async move {
            Ok(vec![("ghost".to_string(), json!("stray")), ("output".to_string(), v)])
        }),
    };
    let engine = Pregel::new(
        chans,
        vec![process],
        ValueShape::Single("input".to_string()),
        ValueShape::Single("output".to_string()),
    )
    .unwrap();

    let output = engine.invoke(json!("ok")).await.unwrap();
    assert_eq!(output, json!("ok"));
}

/// Two processes that retrigger each other forever: `ping` copies `a` into
/// `b`, `pong` copies `b` back into `a`. Never reaches quiescence on its
/// own, so it only terminates via `recursion_limit`.
fn ping_pong_topology() -> (HashMap<String, Box<dyn Channel>>, Vec<Process>) {
    let chans = channels(vec![
        ("a", Box::new(LastValueChannel::new())),
        ("b", Box::new(LastValueChannel::new())),
    ]);
    let processes = vec![
        Process::invoke("ping", "a", "b", |v| Ok(v)),
        Process::invoke("pong", "b", "a", |v| Ok(v)),
    ];
    (chans, processes)
}

#[tokio::test]
async fn recursion_limit_under_silent_policy_stops_without_error() {
    let (chans, processes) = ping_pong_topology();
    let engine = Pregel::new(
        chans,
        processes,
        ValueShape::Single("a".to_string()),
        ValueShape::Single("a".to_string()),
    )
    .unwrap()
    .with_recursion_limit(5);

    let outputs = engine.transform(json!(0)).await.unwrap();
    // Bounded by recursion_limit, never by the topology reaching quiescence.
    assert!(outputs.len() <= 5);
}

#[tokio::test]
async fn recursion_limit_under_raise_policy_surfaces_exhaustion() {
    let (chans, processes) = ping_pong_topology();
    let engine = Pregel::new(
        chans,
        processes,
        ValueShape::Single("a".to_string()),
        ValueShape::Single("a".to_string()),
    )
    .unwrap()
    .with_recursion_limit(5)
    .with_recursion_limit_policy(RecursionLimitPolicy::Raise);

    let err = engine.invoke(json!(0)).await.unwrap_err();
    match err {
        EngineError::RecursionExhausted { limit } => assert_eq!(limit, 5),
        other => panic!("expected RecursionExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn zero_processes_enabled_after_seeding_halts_with_no_output() {
    // `join` subscribes to both `a` and `b`, keyed, but the seed write only
    // ever touches `a` - the process never becomes ready and the run halts
    // on its very first step with nothing emitted.
    let chans = channels(vec![
        ("a", Box::new(LastValueChannel::new())),
        ("b", Box::new(LastValueChannel::new())),
        ("out", Box::new(LastValueChannel::new())),
    ]);
    let mut subscription = HashMap::new();
    subscription.insert("x".to_string(), "a".to_string());
    subscription.insert("y".to_string(), "b".to_string());
    let process = Process::Invoke {
        name: "join".to_string(),
        subscription: Subscription::Record(subscription),
        writes_to: vec!["out".to_string()],
        executor: Arc::new(|v: Value, _ctx: pregel_engine::RunContext| async move { Ok(vec![("out".to_string(), v)]) }),
    };
    let engine = Pregel::new(
        chans,
        vec![process],
        ValueShape::Record(vec!["a".to_string(), "b".to_string()]),
        ValueShape::Single("out".to_string()),
    )
    .unwrap();

    let outputs = engine.transform(json!({"a": 1})).await.unwrap();
    assert!(outputs.is_empty());
}

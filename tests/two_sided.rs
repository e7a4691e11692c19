//! Two sides of one contract talking over a loopback pair.

use std::sync::Arc;

use bridge_rpc::schema::{define_side, MessageHandlers, SideConfig, SideRpc};
use bridge_rpc::{Contract, HandlerError, LoopbackTransport, MethodMap, RpcError, Schema, Side};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// A declares `ping` and emits `tick`; B declares `pong` and emits `tock`.
fn contract() -> Contract {
    Contract::new(
        Schema::new().with_request("ping").with_message("tick"),
        Schema::new().with_request("pong").with_message("tock"),
    )
}

struct Sides {
    a: SideRpc,
    b: SideRpc,
    a_heard: Arc<Mutex<Vec<(String, Value)>>>,
    b_heard: Arc<Mutex<Vec<(String, Value)>>>,
}

fn connect() -> Sides {
    let a_heard = Arc::new(Mutex::new(Vec::new()));
    let b_heard = Arc::new(Mutex::new(Vec::new()));

    let a = define_side(
        Side::A,
        &contract(),
        SideConfig::new()
            .requests(MethodMap::new().method("ping", |params: Value| async move {
                Ok::<_, HandlerError>(json!({"pinged": params}))
            }))
            .messages(MessageHandlers::new().on("tock", {
                let heard = a_heard.clone();
                move |payload: &Value| heard.lock().push(("tock".to_string(), payload.clone()))
            })),
    )
    .unwrap();

    let b = define_side(
        Side::B,
        &contract(),
        SideConfig::new()
            .requests(MethodMap::new().method("pong", |params: Value| async move {
                Ok::<_, HandlerError>(json!({"ponged": params}))
            }))
            .messages(MessageHandlers::new().on_any({
                let heard = b_heard.clone();
                move |name: &str, payload: &Value| heard.lock().push((name.to_string(), payload.clone()))
            })),
    )
    .unwrap();

    let (near, far) = LoopbackTransport::pair();
    a.set_transport(near);
    b.set_transport(far);

    Sides { a, b, a_heard, b_heard }
}

#[tokio::test]
async fn test_each_side_calls_the_others_requests() {
    let sides = connect();

    let from_b = sides.b.request("ping", json!(1)).await.unwrap();
    assert_eq!(from_b, json!({"pinged": 1}));

    let from_a = sides.a.request("pong", json!(2)).await.unwrap();
    assert_eq!(from_a, json!({"ponged": 2}));
}

#[tokio::test]
async fn test_each_side_emits_its_own_messages() {
    let sides = connect();

    sides.a.emit("tick", json!("t")).unwrap();
    sides.b.emit("tock", json!("k")).unwrap();

    assert_eq!(*sides.b_heard.lock(), vec![("tick".to_string(), json!("t"))]);
    assert_eq!(*sides.a_heard.lock(), vec![("tock".to_string(), json!("k"))]);
}

#[tokio::test]
async fn test_send_is_checked_like_emit() {
    let sides = connect();

    sides.b.send("tock", json!(3)).unwrap();
    assert_eq!(*sides.a_heard.lock(), vec![("tock".to_string(), json!(3))]);

    assert!(matches!(
        sides.b.send("tick", Value::Null),
        Err(RpcError::Undeclared { .. })
    ));
}

#[tokio::test]
async fn test_names_outside_the_contract_never_reach_the_wire() {
    let sides = connect();

    assert!(matches!(
        sides.a.call("ping", Value::Null),
        Err(RpcError::Undeclared { ref name, .. }) if name == "ping"
    ));
    assert!(matches!(
        sides.b.emit("tick", Value::Null),
        Err(RpcError::Undeclared { .. })
    ));
    assert!(sides.a_heard.lock().is_empty());
    assert!(sides.b_heard.lock().is_empty());
}

#[tokio::test]
async fn test_late_subscriber_runs_alongside_declared_handler() {
    let sides = connect();
    let late = Arc::new(Mutex::new(0));
    let counter = late.clone();
    sides.a.subscribe("tock", move |_: &Value| *counter.lock() += 1).unwrap();

    sides.b.emit("tock", Value::Null).unwrap();

    assert_eq!(*late.lock(), 1);
    assert_eq!(sides.a_heard.lock().len(), 1);
}

#[test]
fn test_schema_pairs_are_mirror_images() {
    let contract = contract();
    let a = contract.pair_for(Side::A);
    let b = contract.pair_for(Side::B);

    assert_eq!(a.local, b.remote);
    assert_eq!(a.remote, b.local);
    assert!(a.local.has_request("ping") && a.local.has_message("tock"));
    assert!(a.remote.has_request("pong") && a.remote.has_message("tick"));
}

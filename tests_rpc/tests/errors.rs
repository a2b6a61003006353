//! Error Propagation Integration Tests
//!
//! These tests validate how failures reach the caller:
//! - Every rejection is an InvocationError naming the procedure
//! - Missing procedures, handler faults and rejected deferreds
//! - Values that cannot be cloned in either direction

use frame_rpc::{
    Args, Cause, Deferred, ErrorDescription, InvocationError, InvocationOptions, Reply, RpcError,
};
use serde_json::json;
use tests_rpc::{FramePair, Unclonable};

fn invoke_child(pair: &FramePair, procedure: &str) -> InvocationError {
    let pending = pair.host.invoke(
        &pair.child.context(),
        None,
        procedure,
        (),
        InvocationOptions::new(),
    );
    pair.settle();
    pending
        .result()
        .expect("invocation should have settled")
        .expect_err("invocation should have failed")
}

#[test]
fn test_unregistered_procedure() {
    let pair = FramePair::new().unwrap();
    let err = invoke_child(&pair, "unregistered_function");

    assert_eq!(err.name(), "InvocationError");
    assert_eq!(err.procedure_name, "unregistered_function");
    assert_eq!(err.cause.name(), Some("ProcedureNotFoundError"));
    assert_eq!(
        err.cause.message(),
        "Remote procedure 'unregistered_function' not registered in remote RPC instance."
    );
}

#[test]
fn test_reregistering_with_none_unregisters() {
    let pair = FramePair::new().unwrap();
    pair.child
        .register("callmeX", Some(|_args: Args| Ok(Reply::value("child"))));

    let first = pair.host.invoke(
        &pair.child.context(),
        None,
        "callmeX",
        (),
        InvocationOptions::new(),
    );
    pair.settle();
    assert_eq!(first.result(), Some(Ok(json!("child"))));

    pair.child.register_handler("callmeX", None);
    let err = invoke_child(&pair, "callmeX");

    assert_eq!(err.name(), "InvocationError");
    assert_eq!(err.procedure_name, "callmeX");
    assert_eq!(err.cause.name(), Some("ProcedureNotFoundError"));
    assert_eq!(
        err.cause.message(),
        "Remote procedure 'callmeX' not registered in remote RPC instance."
    );
}

#[test]
fn test_handler_error_keeps_cause_chain() {
    let pair = FramePair::new().unwrap();
    pair.child
        .register("err", Some(|_args: Args| Err(Cause::error("Error", "err"))));

    let err = invoke_child(&pair, "err");

    assert_eq!(err.name(), "InvocationError");
    assert_eq!(err.cause.name(), Some("EvaluationError"));
    assert_eq!(err.cause.message(), "err");
    let thrown = err.cause.cause().expect("the thrown error");
    assert_eq!(thrown.name(), Some("Error"));
    assert_eq!(thrown.message(), "err");
}

#[test]
fn test_synchronous_raw_error_is_wrapped() {
    let pair = FramePair::new().unwrap();
    pair.child
        .register("boom", Some(|_args: Args| Err(Cause::value("boom"))));

    let err = invoke_child(&pair, "boom");

    assert_eq!(err.name(), "InvocationError");
    assert_eq!(err.cause.name(), Some("EvaluationError"));
    assert_eq!(err.cause.message(), "boom");
    assert_eq!(err.cause.cause(), Some(&Cause::value("boom")));
}

#[test]
fn test_thrown_error_keeps_its_own_cause() {
    let pair = FramePair::new().unwrap();
    pair.child.register(
        "err",
        Some(|_args: Args| {
            Err(Cause::from(ErrorDescription {
                name: "Error".to_string(),
                message: "outer".to_string(),
                cause: Some(json!({"name": "RangeError", "message": "root"})),
            }))
        }),
    );

    let err = invoke_child(&pair, "err");

    assert_eq!(err.cause.name(), Some("EvaluationError"));
    let thrown = err.cause.cause().expect("the thrown error");
    assert_eq!(thrown.name(), Some("Error"));
    assert_eq!(thrown.message(), "outer");
    let root = thrown.cause().expect("the thrown error's cause");
    assert_eq!(root.name(), Some("RangeError"));
    assert_eq!(root.message(), "root");
}

#[test]
fn test_relayed_failure_keeps_the_whole_chain() {
    let pair = FramePair::new().unwrap();
    let child = pair.child.clone();
    let host_context = pair.host.context();
    pair.child.register(
        "relay",
        Some(move |_args: Args| {
            let (deferred, resolver) = Deferred::pair();
            child
                .invoke(&host_context, None, "missing", (), InvocationOptions::new())
                .on_settle(move |result| {
                    resolver.settle_with(result);
                });
            Ok(Reply::deferred(deferred))
        }),
    );

    let err = invoke_child(&pair, "relay");

    assert_eq!(err.procedure_name, "relay");
    assert_eq!(err.cause.name(), Some("EvaluationError"));
    let relayed = err.cause.cause().expect("the relayed invocation error");
    assert_eq!(relayed.name(), Some("InvocationError"));
    let root = relayed.cause().expect("the original failure");
    assert_eq!(root.name(), Some("ProcedureNotFoundError"));
    assert_eq!(
        root.message(),
        "Remote procedure 'missing' not registered in remote RPC instance."
    );
}

#[test]
fn test_rejected_deferred_with_raw_value() {
    let pair = FramePair::new().unwrap();
    pair.child.register(
        "err",
        Some(|_args: Args| {
            Ok(Reply::deferred(Deferred::rejected(Cause::value(
                "rejectionReason",
            ))))
        }),
    );

    let err = invoke_child(&pair, "err");

    assert_eq!(err.name(), "InvocationError");
    assert_eq!(err.cause, Cause::value("rejectionReason"));
}

#[test]
fn test_rejected_deferred_with_error() {
    let pair = FramePair::new().unwrap();
    pair.child.register(
        "err",
        Some(|_args: Args| {
            Ok(Reply::deferred(Deferred::rejected(Cause::error(
                "RangeError",
                "too far",
            ))))
        }),
    );

    let err = invoke_child(&pair, "err");

    assert_eq!(err.cause.name(), Some("EvaluationError"));
    assert_eq!(err.cause.cause().and_then(Cause::name), Some("RangeError"));
}

#[test]
fn test_unserializable_response() {
    let pair = FramePair::new().unwrap();
    pair.child
        .register("err", Some(|_args: Args| Ok(Reply::value(&Unclonable))));

    let err = invoke_child(&pair, "err");

    assert_eq!(err.cause.name(), Some("SendMessageError"));
    assert_eq!(
        err.cause.cause().and_then(Cause::name),
        Some("DataCloneError")
    );
}

#[test]
fn test_unserializable_deferred_response() {
    let pair = FramePair::new().unwrap();
    pair.child.register(
        "err",
        Some(|_args: Args| Ok(Reply::deferred(Deferred::resolved(&Unclonable)))),
    );

    let err = invoke_child(&pair, "err");

    assert_eq!(err.cause.name(), Some("SendMessageError"));
}

#[test]
fn test_unserializable_request() {
    let pair = FramePair::new().unwrap();
    pair.child
        .register("callme", Some(|_args: Args| Ok(Reply::value(&true))));

    let pending = pair.host.invoke(
        &pair.child.context(),
        None,
        "callme",
        [Unclonable],
        InvocationOptions::new(),
    );

    // known before anything is sent
    let err = pending.result().unwrap().unwrap_err();
    assert_eq!(err.procedure_name, "callme");
    assert_eq!(err.cause.name(), Some("SendMessageError"));
    assert_eq!(
        err.cause.cause().and_then(Cause::name),
        Some("DataCloneError")
    );
    assert_eq!(pair.world.channel().stats().posted, 0);
}

#[test]
fn test_empty_procedure_name() {
    let pair = FramePair::new().unwrap();
    let pending = pair.host.invoke(
        &pair.child.context(),
        None,
        "",
        (),
        InvocationOptions::new(),
    );

    let err = pending.result().unwrap().unwrap_err();
    assert_eq!(err.cause.name(), Some(RpcError::TYPE));
    assert_eq!(
        err.cause.message(),
        "Procedure name must be a non-empty string."
    );
}

#[test]
fn test_invalid_arguments_reported_by_handler() {
    let pair = FramePair::new().unwrap();
    pair.child.register(
        "square",
        Some(|args: Args| {
            let n: i64 = args.arg(0)?;
            Ok(Reply::value(&(n * n)))
        }),
    );

    let pending = pair.host.invoke(
        &pair.child.context(),
        None,
        "square",
        json!(["four"]),
        InvocationOptions::new(),
    );
    pair.settle();

    let err = pending.result().unwrap().unwrap_err();
    assert_eq!(err.cause.name(), Some("EvaluationError"));
    assert_eq!(err.cause.cause().and_then(Cause::name), Some("TypeError"));
}

#[test]
fn test_failed_invocation_does_not_disturb_others() {
    let pair = FramePair::new().unwrap();
    pair.child
        .register("ok", Some(|_args: Args| Ok(Reply::value("fine"))));
    pair.child
        .register("err", Some(|_args: Args| Err(Cause::value(1))));

    let ok = pair.host.invoke(&pair.child.context(), None, "ok", (), InvocationOptions::new());
    let err = pair.host.invoke(&pair.child.context(), None, "err", (), InvocationOptions::new());
    pair.settle();

    assert_eq!(ok.result(), Some(Ok(json!("fine"))));
    let failure = err.result().unwrap().unwrap_err();
    assert_eq!(failure.cause.name(), Some("EvaluationError"));
    assert_eq!(failure.cause.cause(), Some(&Cause::value(1)));
    assert_eq!(pair.child.registered_procedures(), vec!["err", "ok"]);
}

#[test]
fn test_invocation_error_description() {
    let pair = FramePair::new().unwrap();
    let err = invoke_child(&pair, "missing");
    let description = err.describe();

    assert_eq!(description.name, "InvocationError");
    assert!(description.message.contains("missing"));
    assert_eq!(
        description.cause.unwrap()["name"],
        "ProcedureNotFoundError"
    );
}

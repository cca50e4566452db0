//! End-to-end pipeline behavior through `App` and `TestClient`.
//!
//! Each test owns its recorder; nothing is shared between tests.

use std::sync::Arc;

use http::StatusCode;
use parking_lot::Mutex;
use thiserror::Error;
use trellis::prelude::*;
use trellis_test::{TestClient, TestError};

#[derive(Debug, Error)]
#[error("boom")]
struct Boom;

#[derive(Debug, Error)]
#[error("recoverable")]
struct Recoverable;

type Log = Arc<Mutex<Vec<String>>>;

/// What a recording middleware does besides logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Act {
    Pass,
    FailRequest,
    FailResource,
    FailResponse,
    StatusResponse,
    CompleteRequest,
    CompleteResource,
}

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

fn recording(name: &str, log: &Log, act: Act, error: fn() -> HookError) -> Component {
    let (req_log, res_log, resp_log) = (Arc::clone(log), Arc::clone(log), Arc::clone(log));
    let (req_name, res_name, resp_name) = (name.to_string(), name.to_string(), name.to_string());

    Component::new(name)
        .process_request(RequestHook::blocking(move |_req, resp| {
            req_log.lock().push(format!("{req_name}.request"));
            match act {
                Act::FailRequest => Err(error()),
                Act::CompleteRequest => {
                    resp.set_complete(true);
                    Ok(())
                }
                _ => Ok(()),
            }
        }))
        .process_resource(ResourceHook::blocking(move |_req, resp, _resource, _params| {
            res_log.lock().push(format!("{res_name}.resource"));
            match act {
                Act::FailResource => Err(error()),
                Act::CompleteResource => {
                    resp.set_complete(true);
                    Ok(())
                }
                _ => Ok(()),
            }
        }))
        .process_response(ResponseHook::blocking(move |_req, _resp, _resource, ok| {
            resp_log.lock().push(format!("{resp_name}.response({ok})"));
            match act {
                Act::FailResponse => Err(error()),
                Act::StatusResponse => Err(HttpStatus::new(StatusCode::ACCEPTED).into()),
                _ => Ok(()),
            }
        }))
}

fn boom() -> HookError {
    HookError::app(Boom)
}

fn recoverable() -> HookError {
    HookError::app(Recoverable)
}

fn items(log: &Log, fail: bool) -> Resource {
    let log = Arc::clone(log);
    Resource::new("items").on_get(move |_req, resp, params| {
        log.lock().push("responder".to_string());
        if fail {
            return Err(HookError::app(Boom));
        }
        resp.set_text(format!("item {}", params.get("id").unwrap_or_default()));
        Ok(())
    })
}

/// Three recording middleware, `m0` to `m2`, with `acts[i]` applied to `mi`.
fn client(
    independent: bool,
    defaults: bool,
    acts: [Act; 3],
    error: fn() -> HookError,
    responder_fails: bool,
) -> (TestClient, Log) {
    let log = new_log();
    let mut builder = App::builder().independent_middleware(independent);
    if !defaults {
        builder = builder.without_default_handlers();
    }
    for (index, act) in acts.into_iter().enumerate() {
        builder = builder.middleware(recording(&format!("m{index}"), &log, act, error));
    }
    let mut app = builder.build().unwrap();
    app.add_route("/items/{id}", items(&log, responder_fails)).unwrap();
    (TestClient::new(app), log)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn test_response_hooks_run_in_reverse_order() {
    for independent in [true, false] {
        let (client, log) = client(independent, true, [Act::Pass; 3], boom, false);

        client
            .get("/items/7")
            .send()
            .await
            .assert_status(StatusCode::OK)
            .assert_body_eq("item 7");

        assert_eq!(
            entries(&log),
            strings(&[
                "m0.request",
                "m1.request",
                "m2.request",
                "m0.resource",
                "m1.resource",
                "m2.resource",
                "responder",
                "m2.response(true)",
                "m1.response(true)",
                "m0.response(true)",
            ])
        );
    }
}

#[tokio::test]
async fn test_complete_in_request_phase_skips_resource_and_responder() {
    let (client, log) = client(
        false,
        true,
        [Act::Pass, Act::CompleteRequest, Act::Pass],
        boom,
        false,
    );

    client.get("/items/1").send().await.assert_status(StatusCode::OK);

    assert_eq!(
        entries(&log),
        strings(&[
            "m0.request",
            "m1.request",
            "m2.response(true)",
            "m1.response(true)",
            "m0.response(true)",
        ])
    );
}

#[tokio::test]
async fn test_complete_in_resource_phase_skips_only_responder() {
    let (client, log) = client(
        false,
        true,
        [Act::CompleteResource, Act::Pass, Act::Pass],
        boom,
        false,
    );

    client.get("/items/1").send().await.assert_status(StatusCode::OK);

    assert_eq!(
        entries(&log),
        strings(&[
            "m0.request",
            "m1.request",
            "m2.request",
            "m0.resource",
            "m2.response(true)",
            "m1.response(true)",
            "m0.response(true)",
        ])
    );
}

struct UnwindCase {
    name: &'static str,
    acts: [Act; 3],
    responder_fails: bool,
    independent: &'static [&'static str],
    nested: &'static [&'static str],
}

const ALL_RESPONSES: &[&str] = &["m2.response(false)", "m1.response(false)", "m0.response(false)"];

#[tokio::test]
async fn test_unhandled_error_unwind_matrix() {
    let cases = [
        UnwindCase {
            name: "request phase of m1",
            acts: [Act::Pass, Act::FailRequest, Act::Pass],
            responder_fails: false,
            independent: ALL_RESPONSES,
            nested: &[],
        },
        UnwindCase {
            name: "request phase of m0",
            acts: [Act::FailRequest, Act::Pass, Act::Pass],
            responder_fails: false,
            independent: ALL_RESPONSES,
            nested: &[],
        },
        UnwindCase {
            name: "resource phase of m1",
            acts: [Act::Pass, Act::FailResource, Act::Pass],
            responder_fails: false,
            independent: ALL_RESPONSES,
            nested: &["m0.response(false)"],
        },
        UnwindCase {
            name: "resource phase of m2",
            acts: [Act::Pass, Act::Pass, Act::FailResource],
            responder_fails: false,
            independent: ALL_RESPONSES,
            nested: &["m1.response(false)", "m0.response(false)"],
        },
        UnwindCase {
            name: "resource phase of m0",
            acts: [Act::FailResource, Act::Pass, Act::Pass],
            responder_fails: false,
            independent: ALL_RESPONSES,
            nested: &[],
        },
        UnwindCase {
            name: "responder",
            acts: [Act::Pass; 3],
            responder_fails: true,
            independent: ALL_RESPONSES,
            nested: ALL_RESPONSES,
        },
    ];

    for case in &cases {
        for independent in [true, false] {
            let (client, log) = client(independent, false, case.acts, boom, case.responder_fails);

            let error = client.get("/items/1").try_send().await.unwrap_err();
            assert!(
                error.as_unhandled().is_some_and(|e| e.is::<Boom>()),
                "{}: expected Boom, got {error}",
                case.name
            );

            let expected = if independent { case.independent } else { case.nested };
            let responses: Vec<String> = entries(&log)
                .into_iter()
                .filter(|entry| entry.contains(".response"))
                .collect();
            assert_eq!(
                responses,
                strings(expected),
                "{} (independent = {independent})",
                case.name
            );
        }
    }
}

#[tokio::test]
async fn test_unmatched_route_unwinds_like_request_phase() {
    for (independent, expected) in [(true, ALL_RESPONSES), (false, &[][..])] {
        let (client, log) = client(independent, false, [Act::Pass; 3], boom, false);

        let error = client.get("/nowhere").try_send().await.unwrap_err();
        let unhandled = error.as_unhandled().unwrap();
        assert_eq!(
            unhandled.status(),
            Some(StatusCode::NOT_FOUND),
            "independent = {independent}"
        );

        let responses: Vec<String> = entries(&log)
            .into_iter()
            .filter(|entry| entry.contains(".response"))
            .collect();
        assert_eq!(responses, strings(expected));
    }
}

#[tokio::test]
async fn test_unhandled_error_becomes_500_at_transport_boundary() {
    let (client, _log) = client(true, false, [Act::Pass, Act::FailRequest, Act::Pass], boom, false);

    client
        .get("/items/1")
        .send()
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_json_field("title", &serde_json::json!("500 Internal Server Error"));
}

#[tokio::test]
async fn test_handled_request_error_runs_all_response_hooks() {
    for independent in [true, false] {
        let (client, log) = {
            let log = new_log();
            let mut app = App::builder()
                .independent_middleware(independent)
                .without_default_handlers()
                .middlewares([
                    recording("m0", &log, Act::Pass, recoverable),
                    recording("m1", &log, Act::FailRequest, recoverable),
                    recording("m2", &log, Act::Pass, recoverable),
                ])
                .build()
                .unwrap();
            app.add_route("/items/{id}", items(&log, false)).unwrap();
            app.add_error_handler::<Recoverable>(ErrorHandler::blocking(|_req, resp, _e, _p| {
                resp.set_status(StatusCode::SERVICE_UNAVAILABLE);
                resp.set_text("recovered");
                Ok(())
            }))
            .unwrap();
            (TestClient::new(app), log)
        };

        client
            .get("/items/1")
            .try_send()
            .await
            .unwrap()
            .assert_status(StatusCode::SERVICE_UNAVAILABLE)
            .assert_body_eq("recovered");

        assert_eq!(
            entries(&log),
            strings(&[
                "m0.request",
                "m1.request",
                "m2.response(false)",
                "m1.response(false)",
                "m0.response(false)",
            ]),
            "independent = {independent}"
        );
    }
}

#[tokio::test]
async fn test_final_status_in_response_phase_keeps_unwinding() {
    for independent in [true, false] {
        let (client, log) = client(
            independent,
            true,
            [Act::Pass, Act::StatusResponse, Act::Pass],
            boom,
            false,
        );

        client
            .get("/items/1")
            .try_send()
            .await
            .unwrap()
            .assert_status(StatusCode::ACCEPTED);

        let responses: Vec<String> = entries(&log)
            .into_iter()
            .filter(|entry| entry.contains(".response"))
            .collect();
        assert_eq!(
            responses,
            strings(&["m2.response(true)", "m1.response(true)", "m0.response(false)"])
        );
    }
}

#[tokio::test]
async fn test_unhandled_response_error_aborts_remaining_hooks() {
    for independent in [true, false] {
        let (client, log) = client(
            independent,
            false,
            [Act::Pass, Act::FailResponse, Act::Pass],
            boom,
            false,
        );

        let error = client.get("/items/1").try_send().await.unwrap_err();
        assert!(error.as_unhandled().unwrap().is::<Boom>());

        let responses: Vec<String> = entries(&log)
            .into_iter()
            .filter(|entry| entry.contains(".response"))
            .collect();
        assert_eq!(responses, strings(&["m2.response(true)", "m1.response(true)"]));
    }
}

#[tokio::test]
async fn test_request_hook_rewrites_path_before_routing() {
    let rewrite = Component::new("rewrite").process_request(RequestHook::blocking(|req, _resp| {
        if let Some(rest) = req.path().strip_prefix("/v1") {
            let rest = rest.to_string();
            req.set_path(rest);
        }
        Ok(())
    }));

    let mut app = App::builder().middleware(rewrite).build().unwrap();
    app.add_route("/items/{id}", items(&new_log(), false)).unwrap();

    TestClient::new(app)
        .get("/v1/items/9")
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_body_eq("item 9");
}

#[tokio::test]
async fn test_resource_hook_sees_resource_and_adds_params() {
    let tagger = Component::new("tagger").process_resource(ResourceHook::blocking(
        |_req, _resp, resource, params| {
            params.push("tag", resource.name().to_uppercase());
            Ok(())
        },
    ));

    let mut app = App::builder().middleware(tagger).build().unwrap();
    app.add_route(
        "/items/{id}",
        Resource::new("items").on_get(|_req, resp, params| {
            resp.set_text(format!(
                "{}:{}",
                params.get("id").unwrap_or_default(),
                params.get("tag").unwrap_or_default()
            ));
            Ok(())
        }),
    )
    .unwrap();

    TestClient::new(app)
        .get("/items/3")
        .send()
        .await
        .assert_body_eq("3:ITEMS");
}

#[tokio::test]
async fn test_awaitable_hooks_preserve_order() {
    let log = new_log();
    let (a, b) = (Arc::clone(&log), Arc::clone(&log));

    let component = Component::new("async")
        .process_request_async(RequestHook::awaitable(move |_req, _resp| {
            let log = Arc::clone(&a);
            Box::pin(async move {
                tokio::task::yield_now().await;
                log.lock().push("async.request".to_string());
                HookResult::Ok(())
            })
        }))
        .process_response_async(ResponseHook::awaitable(move |_req, _resp, _resource, ok| {
            let log = Arc::clone(&b);
            Box::pin(async move {
                tokio::task::yield_now().await;
                log.lock().push(format!("async.response({ok})"));
                HookResult::Ok(())
            })
        }));

    let mut app = App::builder().middleware(component).build().unwrap();
    app.add_route("/items/{id}", items(&log, false)).unwrap();

    TestClient::new(app)
        .get("/items/1")
        .send()
        .await
        .assert_status(StatusCode::OK);

    assert_eq!(
        entries(&log),
        strings(&["async.request", "responder", "async.response(true)"])
    );
}

#[test]
fn test_blocking_callable_in_async_slot_fails_at_registration() {
    let component = Component::new("liar")
        .process_request_async(RequestHook::blocking(|_req, _resp| Ok(())));

    let error = App::builder().middleware(component).build().unwrap_err();
    assert!(error.is_compatibility(), "{error}");

    let mut app = App::new();
    let component = Component::new("liar")
        .process_response_async(ResponseHook::blocking(|_req, _resp, _resource, _ok| Ok(())));
    let error = app.add_middleware(component).unwrap_err();
    assert!(error.is_compatibility(), "{error}");
    assert!(app.pipeline().is_empty());
}

#[test]
fn test_awaitable_hook_rejected_in_blocking_mode() {
    let component = Component::new("needs-loop").process_request(RequestHook::awaitable(
        |_req, _resp| Box::pin(async { HookResult::Ok(()) }),
    ));

    let error = App::builder()
        .execution(ExecutionMode::Blocking)
        .middleware(component)
        .build()
        .unwrap_err();
    assert!(error.is_compatibility(), "{error}");
}

#[test]
fn test_component_without_hooks_is_rejected() {
    let error = App::builder()
        .middleware(Component::new("empty"))
        .build()
        .unwrap_err();
    assert!(matches!(
        error,
        AppError::Middleware(MiddlewareError::NoHooks { ref name }) if name == "empty"
    ));
}

#[tokio::test]
async fn test_error_handler_lookup_order() {
    let mut app = App::new();
    app.add_route(
        "/recoverable",
        Resource::new("recoverable").on_get(|_req, _resp, _params| Err(HookError::app(Recoverable))),
    )
    .unwrap();
    app.add_route(
        "/boom",
        Resource::new("boom").on_get(|_req, _resp, _params| Err(HookError::app(Boom))),
    )
    .unwrap();

    app.add_catch_all_handler(ErrorHandler::blocking(|_req, resp, _e, _p| {
        resp.set_status(StatusCode::BAD_GATEWAY);
        Ok(())
    }))
    .unwrap();
    app.add_error_handler::<Recoverable>(ErrorHandler::blocking(|_req, resp, _e, _p| {
        resp.set_text("first");
        Ok(())
    }))
    .unwrap();
    app.add_error_handler::<Recoverable>(ErrorHandler::blocking(|_req, _resp, _e, _p| {
        Err(HttpStatus::new(StatusCode::CONFLICT).with_body("second").into())
    }))
    .unwrap();

    let client = TestClient::new(app);
    client
        .get("/recoverable")
        .send()
        .await
        .assert_status(StatusCode::CONFLICT)
        .assert_body_eq("second");
    client
        .get("/boom")
        .send()
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_failing_error_handler_is_unhandled() {
    let mut app = App::builder().without_default_handlers().build().unwrap();
    app.add_route(
        "/recoverable",
        Resource::new("recoverable").on_get(|_req, _resp, _params| Err(HookError::app(Recoverable))),
    )
    .unwrap();
    app.add_error_handler::<Recoverable>(ErrorHandler::blocking(|_req, _resp, _e, _p| {
        Err(HookError::app(Boom))
    }))
    .unwrap();

    let error = TestClient::new(app)
        .get("/recoverable")
        .try_send()
        .await
        .unwrap_err();
    assert!(matches!(error, TestError::Unhandled(ref e) if e.is::<Boom>()));
}

#[tokio::test]
async fn test_method_not_allowed_carries_allow_header() {
    let mut app = App::new();
    app.add_route("/items/{id}", items(&new_log(), false)).unwrap();

    TestClient::new(app)
        .delete("/items/1")
        .send()
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED)
        .assert_header("allow", "GET");
}

#[tokio::test]
async fn test_builtin_cors_answers_preflight_first() {
    let log = new_log();
    let mut config = TrellisConfig::default();
    config.app.cors_enable = true;
    config.app.cors_allow_origins = vec!["https://app.example.com".to_string()];

    let mut app = App::builder()
        .config(config)
        .middleware(recording("m0", &log, Act::Pass, boom))
        .build()
        .unwrap();
    app.add_route("/items/{id}", items(&log, false)).unwrap();
    assert_eq!(app.pipeline().names(), vec!["cors", "m0"]);

    let client = TestClient::new(app);
    client
        .options("/items/1")
        .origin("https://app.example.com")
        .header("Access-Control-Request-Method", "GET")
        .send()
        .await
        .assert_status(StatusCode::NO_CONTENT)
        .assert_header("access-control-allow-origin", "https://app.example.com");
    assert_eq!(entries(&log), strings(&["m0.response(true)"]));

    client
        .get("/items/1")
        .origin("https://app.example.com")
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_header("access-control-allow-origin", "https://app.example.com");

    client
        .get("/items/1")
        .origin("https://evil.example.com")
        .send()
        .await
        .assert_no_header("access-control-allow-origin");

    let mut app = App::builder()
        .config({
            let mut config = TrellisConfig::default();
            config.app.cors_enable = true;
            config
        })
        .build()
        .unwrap();
    let error = app
        .add_middleware(CorsMiddleware::permissive().into_component())
        .unwrap_err();
    assert!(matches!(
        error,
        AppError::Middleware(MiddlewareError::CorsConflict { .. })
    ));
}

//! End-to-end tests for the pipeline executor.
//!
//! Each test builds its own recorder instead of sharing global state.

use std::sync::Arc;

use http::{Method, StatusCode};
use parking_lot::Mutex;
use thiserror::Error;
use trellis_core::{
    ExecutionMode, HookError, HookResult, HttpError, HttpStatus, MiddlewareMode, Params, Request,
    RequestHook, Resource, ResourceHook, Responder, Response, ResponseHook,
};
use trellis_middleware::{Component, Dispatcher, ErrorHandlerRegistry, Pipeline, Route};

#[derive(Debug, Error)]
#[error("boom")]
struct Boom;

#[derive(Debug, Error)]
#[error("recoverable")]
struct Recoverable;

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fail {
    Nowhere,
    Request(usize),
    Resource(usize),
    Responder,
    Response(usize),
    Routing,
}

fn failure(handled: bool) -> HookError {
    if handled {
        HookError::app(Recoverable)
    } else {
        HookError::app(Boom)
    }
}

struct Fixture {
    resource: Arc<Resource>,
}

impl Dispatcher for Fixture {
    fn route(&self, req: &Request) -> Option<Route> {
        let id = req.path().strip_prefix("/items/")?;
        let mut params = Params::new();
        params.push("id", id);
        Some(Route {
            resource: Arc::clone(&self.resource),
            params,
            template: "/items/{id}".to_string(),
        })
    }
}

fn fixture(log: &Log, fail: Fail, handled: bool) -> Fixture {
    let log = Arc::clone(log);
    Fixture {
        resource: Arc::new(Resource::new("items").on_get(move |_req, resp, params| {
            log.lock().push("responder".to_string());
            if fail == Fail::Responder {
                return Err(failure(handled));
            }
            resp.set_text(format!("item {}", params.get("id").unwrap_or("?")));
            Ok(())
        })),
    }
}

fn recording(index: usize, log: &Log, fail: Fail, handled: bool) -> Component {
    let name = format!("m{index}");
    let (req_log, res_log, resp_log) = (Arc::clone(log), Arc::clone(log), Arc::clone(log));
    let (req_name, res_name, resp_name) = (name.clone(), name.clone(), name.clone());

    Component::new(name)
        .process_request(RequestHook::blocking(move |_req, _resp| {
            req_log.lock().push(format!("{req_name}.request"));
            if fail == Fail::Request(index) {
                return Err(failure(handled));
            }
            Ok(())
        }))
        .process_resource(ResourceHook::blocking(move |_req, _resp, _resource, _params| {
            res_log.lock().push(format!("{res_name}.resource"));
            if fail == Fail::Resource(index) {
                return Err(failure(handled));
            }
            Ok(())
        }))
        .process_response(ResponseHook::blocking(move |_req, _resp, _resource, ok| {
            resp_log.lock().push(format!("{resp_name}.response:{ok}"));
            if fail == Fail::Response(index) {
                return Err(failure(handled));
            }
            Ok(())
        }))
}

fn registry() -> ErrorHandlerRegistry {
    let mut errors = ErrorHandlerRegistry::new();
    errors.add::<Recoverable>(trellis_core::ErrorHandler::blocking(|_req, resp, _err, _params| {
        resp.set_status(StatusCode::IM_A_TEAPOT);
        Ok(())
    }));
    errors
}

struct Run {
    result: Result<(), HookError>,
    log: Vec<String>,
    response: Response,
}

impl Run {
    fn responses(&self) -> Vec<&str> {
        self.log
            .iter()
            .filter_map(|entry| entry.split_once(".response"))
            .map(|(name, _)| name)
            .collect()
    }
}

async fn run(mode: MiddlewareMode, fail: Fail, handled: bool) -> Run {
    let log: Log = Arc::default();
    let pipeline = Pipeline::builder()
        .middleware_mode(mode)
        .extend((0..3).map(|i| recording(i, &log, fail, handled)))
        .build()
        .unwrap();

    let path = if fail == Fail::Routing { "/missing" } else { "/items/7" };
    let mut req = Request::get(path);
    let mut response = Response::new();
    let result = pipeline
        .run(&mut req, &mut response, &fixture(&log, fail, handled), &registry())
        .await;

    let log = log.lock().clone();
    Run {
        result,
        log,
        response,
    }
}

#[tokio::test]
async fn test_happy_path_order() {
    let run = run(MiddlewareMode::Independent, Fail::Nowhere, false).await;

    assert!(run.result.is_ok());
    assert_eq!(
        run.log,
        vec![
            "m0.request",
            "m1.request",
            "m2.request",
            "m0.resource",
            "m1.resource",
            "m2.resource",
            "responder",
            "m2.response:true",
            "m1.response:true",
            "m0.response:true",
        ]
    );
    assert_eq!(run.response.text(), "item 7");
}

#[tokio::test]
async fn test_unwind_matrix_for_unhandled_errors() {
    use MiddlewareMode::{Independent, Nested};

    let cases: &[(MiddlewareMode, Fail, &[&str])] = &[
        (Independent, Fail::Request(1), &["m2", "m1", "m0"]),
        (Nested, Fail::Request(1), &[]),
        (Independent, Fail::Request(0), &["m2", "m1", "m0"]),
        (Nested, Fail::Request(0), &[]),
        (Independent, Fail::Routing, &["m2", "m1", "m0"]),
        (Nested, Fail::Routing, &[]),
        (Independent, Fail::Resource(1), &["m2", "m1", "m0"]),
        (Nested, Fail::Resource(1), &["m0"]),
        (Nested, Fail::Resource(0), &[]),
        (Nested, Fail::Resource(2), &["m1", "m0"]),
        (Independent, Fail::Responder, &["m2", "m1", "m0"]),
        (Nested, Fail::Responder, &["m2", "m1", "m0"]),
    ];

    for &(mode, fail, expected) in cases {
        let run = run(mode, fail, false).await;

        assert!(run.result.is_err(), "{mode:?} {fail:?}: error should surface");
        assert_eq!(run.responses(), expected, "{mode:?} {fail:?}");
        assert!(
            run.log.iter().all(|entry| !entry.ends_with(":true")),
            "{mode:?} {fail:?}: response hooks must see failure"
        );
    }
}

#[tokio::test]
async fn test_routing_failure_is_not_found() {
    let run = run(MiddlewareMode::Independent, Fail::Routing, false).await;

    match run.result {
        Err(HookError::Http(error)) => assert_eq!(error.status(), StatusCode::NOT_FOUND),
        other => panic!("expected 404, got {other:?}"),
    }
    assert!(!run.log.iter().any(|entry| entry.ends_with(".resource")));
    assert!(!run.log.contains(&"responder".to_string()));
}

#[tokio::test]
async fn test_handled_errors_run_every_response_hook() {
    for mode in [MiddlewareMode::Independent, MiddlewareMode::Nested] {
        for fail in [Fail::Request(1), Fail::Resource(1), Fail::Responder] {
            let run = run(mode, fail, true).await;

            assert!(run.result.is_ok(), "{mode:?} {fail:?}");
            assert_eq!(run.response.status(), StatusCode::IM_A_TEAPOT);
            assert_eq!(run.responses(), vec!["m2", "m1", "m0"], "{mode:?} {fail:?}");
            assert!(run.log.iter().all(|entry| !entry.ends_with(":true")));
        }
    }
}

#[tokio::test]
async fn test_request_failure_skips_later_hooks() {
    let run = run(MiddlewareMode::Independent, Fail::Request(1), true).await;

    assert!(!run.log.contains(&"m2.request".to_string()));
    assert!(!run.log.iter().any(|entry| entry.ends_with(".resource")));
    assert!(!run.log.contains(&"responder".to_string()));
}

#[tokio::test]
async fn test_unhandled_response_error_aborts_remaining_hooks() {
    for mode in [MiddlewareMode::Independent, MiddlewareMode::Nested] {
        let run = run(mode, Fail::Response(1), false).await;

        assert!(run.result.as_ref().unwrap_err().is::<Boom>());
        assert_eq!(run.responses(), vec!["m2", "m1"], "{mode:?}");
    }
}

#[tokio::test]
async fn test_handled_response_error_continues_with_failure_flag() {
    let run = run(MiddlewareMode::Independent, Fail::Response(1), true).await;

    assert!(run.result.is_ok());
    assert_eq!(
        run.log[run.log.len() - 3..],
        ["m2.response:true", "m1.response:true", "m0.response:false"]
    );
    assert_eq!(run.response.status(), StatusCode::IM_A_TEAPOT);
}

fn short_circuit_at(log: &Log, index: usize, phase: &'static str) -> Component {
    let (a, b) = (Arc::clone(log), Arc::clone(log));
    Component::new(format!("s{index}"))
        .process_request(RequestHook::blocking(move |req, resp| {
            a.lock().push(format!("s{index}.request"));
            if phase == "request" && req.path() == "/items/cached" {
                resp.set_text("cached");
                resp.set_complete(true);
            }
            Ok(())
        }))
        .process_resource(ResourceHook::blocking(move |_req, resp, _resource, _params| {
            b.lock().push(format!("s{index}.resource"));
            if phase == "resource" {
                resp.set_text("cached resource");
                resp.set_complete(true);
            }
            Ok(())
        }))
}

#[tokio::test]
async fn test_short_circuit_in_request_phase() {
    let log: Log = Arc::default();
    let pipeline = Pipeline::builder()
        .middleware(short_circuit_at(&log, 0, "request"))
        .middleware(short_circuit_at(&log, 1, "none"))
        .middleware(recording(2, &log, Fail::Nowhere, false))
        .build()
        .unwrap();

    let mut resp = Response::new();
    pipeline
        .run(
            &mut Request::get("/items/cached"),
            &mut resp,
            &fixture(&log, Fail::Nowhere, false),
            &registry(),
        )
        .await
        .unwrap();

    assert_eq!(resp.text(), "cached");
    assert_eq!(*log.lock(), vec!["s0.request", "m2.response:true"]);
}

#[tokio::test]
async fn test_short_circuit_in_resource_phase() {
    let log: Log = Arc::default();
    let pipeline = Pipeline::builder()
        .middleware(recording(0, &log, Fail::Nowhere, false))
        .middleware(short_circuit_at(&log, 1, "resource"))
        .middleware(recording(2, &log, Fail::Nowhere, false))
        .build()
        .unwrap();

    let mut resp = Response::new();
    pipeline
        .run(
            &mut Request::get("/items/1"),
            &mut resp,
            &fixture(&log, Fail::Nowhere, false),
            &registry(),
        )
        .await
        .unwrap();

    assert_eq!(resp.text(), "cached resource");
    assert_eq!(
        *log.lock(),
        vec![
            "m0.request",
            "s1.request",
            "m2.request",
            "m0.resource",
            "s1.resource",
            "m2.response:true",
            "m0.response:true",
        ]
    );
}

fn response_status(name: &str, status: u16, executions: &Log, as_error: bool) -> Component {
    let executions = Arc::clone(executions);
    let name = name.to_string();
    Component::new(name.clone()).process_response(ResponseHook::blocking(
        move |_req, _resp, _resource, ok| {
            executions.lock().push(format!("{name}:{ok}"));
            let code = StatusCode::from_u16(status).map_err(HookError::app)?;
            if as_error {
                Err(HttpError::new(code).into())
            } else {
                Err(HttpStatus::new(code).into())
            }
        },
    ))
}

fn response_counter(name: &str, executions: &Log) -> Component {
    let executions = Arc::clone(executions);
    let name = name.to_string();
    Component::new(name.clone()).process_response(ResponseHook::blocking(
        move |_req, _resp, _resource, ok| {
            executions.lock().push(format!("{name}:{ok}"));
            Ok(())
        },
    ))
}

#[tokio::test]
async fn test_response_phase_errors_compose_around_each_other() {
    let executions: Log = Arc::default();
    let pipeline = Pipeline::builder()
        .middleware(response_counter("p1", &executions))
        .middleware(response_status("raise_error", 748, &executions, true))
        .middleware(response_counter("p2", &executions))
        .middleware(response_status("raise_status", 201, &executions, false))
        .middleware(response_counter("p3", &executions))
        .build()
        .unwrap();

    let log: Log = Arc::default();
    let mut resp = Response::new();
    pipeline
        .run(
            &mut Request::get("/items/1"),
            &mut resp,
            &fixture(&log, Fail::Nowhere, false),
            &ErrorHandlerRegistry::with_defaults(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 748);
    let counted: Vec<_> = executions
        .lock()
        .iter()
        .filter(|entry| entry.starts_with('p'))
        .cloned()
        .collect();
    assert_eq!(counted, vec!["p3:true", "p2:false", "p1:false"]);
}

#[tokio::test]
async fn test_http_error_body_is_composed_before_response_hooks() {
    let seen: Arc<Mutex<Option<String>>> = Arc::default();
    let observer = {
        let seen = Arc::clone(&seen);
        Component::new("observer").process_response(ResponseHook::blocking(
            move |_req, resp, _resource, _ok| {
                *seen.lock() = Some(resp.text().into_owned());
                Ok(())
            },
        ))
    };
    let forbid = Component::new("forbid").process_request(RequestHook::blocking(|_req, _resp| {
        Err(HttpError::forbidden().into())
    }));

    let pipeline = Pipeline::builder()
        .middleware(observer)
        .middleware(forbid)
        .build()
        .unwrap();

    let log: Log = Arc::default();
    let mut resp = Response::new();
    pipeline
        .run(
            &mut Request::get("/items/1"),
            &mut resp,
            &fixture(&log, Fail::Nowhere, false),
            &ErrorHandlerRegistry::with_defaults(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = serde_json::from_str(seen.lock().as_deref().unwrap()).unwrap();
    assert_eq!(body["title"], "403 Forbidden");
}

#[tokio::test]
async fn test_resource_hook_params_reach_responder() {
    let pipeline = Pipeline::builder()
        .middleware(Component::new("adder").process_resource(ResourceHook::blocking(
            |_req, _resp, _resource, params| {
                params.insert("added", "true");
                Ok(())
            },
        )))
        .build()
        .unwrap();

    let resource = Arc::new(Resource::new("echo").on_get(|_req, resp, params| {
        resp.set_json(&params.iter().collect::<Vec<_>>())?;
        Ok(())
    }));
    let dispatcher = Fixture { resource };

    let mut resp = Response::new();
    pipeline
        .run(
            &mut Request::get("/items/22"),
            &mut resp,
            &dispatcher,
            &registry(),
        )
        .await
        .unwrap();

    let pairs: Vec<(String, String)> = resp.json().unwrap();
    assert_eq!(
        pairs,
        vec![
            ("id".to_string(), "22".to_string()),
            ("added".to_string(), "true".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_request_hook_rewrites_path_before_routing() {
    let pipeline = Pipeline::builder()
        .middleware(Component::new("base_path").process_request(RequestHook::blocking(
            |req, _resp| {
                if let Some(rest) = req.path().strip_prefix("/base_path") {
                    let rest = rest.to_string();
                    req.set_path(rest);
                }
                Ok(())
            },
        )))
        .build()
        .unwrap();

    let log: Log = Arc::default();
    let mut req = Request::get("/base_path/items/9");
    let mut resp = Response::new();
    pipeline
        .run(
            &mut req,
            &mut resp,
            &fixture(&log, Fail::Nowhere, false),
            &registry(),
        )
        .await
        .unwrap();

    assert_eq!(resp.text(), "item 9");
    assert_eq!(req.uri_template(), Some("/items/{id}"));
}

#[tokio::test]
async fn test_awaitable_hooks_keep_order_across_suspension() {
    let log: Log = Arc::default();
    let component = |name: &'static str| {
        let (a, b) = (Arc::clone(&log), Arc::clone(&log));
        Component::new(name)
            .process_request_async(RequestHook::awaitable(move |_req, _resp| {
                let a = Arc::clone(&a);
                Box::pin(async move {
                    tokio::task::yield_now().await;
                    a.lock().push(format!("{name}.request"));
                    HookResult::Ok(())
                })
            }))
            .process_response_async(ResponseHook::awaitable(move |_req, _resp, _resource, _ok| {
                let b = Arc::clone(&b);
                Box::pin(async move {
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                    b.lock().push(format!("{name}.response"));
                    HookResult::Ok(())
                })
            }))
    };

    let pipeline = Arc::new(
        Pipeline::builder()
            .middleware(component("a"))
            .middleware(component("b"))
            .build()
            .unwrap(),
    );

    let resource = Arc::new(Resource::new("async").on(
        Method::GET,
        Responder::awaitable(|_req, resp, _params| {
            Box::pin(async move {
                tokio::task::yield_now().await;
                resp.set_text("ok");
                HookResult::Ok(())
            })
        }),
    ));
    let dispatcher = Arc::new(Fixture { resource });

    let handle = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        let dispatcher = Arc::clone(&dispatcher);
        async move {
            let mut req = Request::get("/items/1");
            let mut resp = Response::new();
            pipeline
                .run(&mut req, &mut resp, dispatcher.as_ref(), &registry())
                .await
                .map(|()| resp.text().into_owned())
        }
    });

    assert_eq!(handle.await.unwrap().unwrap(), "ok");
    assert_eq!(
        *log.lock(),
        vec!["a.request", "b.request", "b.response", "a.response"]
    );
}

#[test]
fn test_blocking_app_rejects_awaitable_hooks() {
    let err = Pipeline::builder()
        .execution(ExecutionMode::Blocking)
        .middleware(Component::new("async").process_request(RequestHook::awaitable(
            |_req, _resp| Box::pin(async { HookResult::Ok(()) }),
        )))
        .build()
        .unwrap_err();
    assert!(err.is_compatibility());
}

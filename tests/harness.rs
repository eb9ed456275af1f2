//! Scenario suite: one middleware, one run, every completion signal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use drydock::{run, BoxError, Error, Next, Request, Response, Runner};
use http::StatusCode;

fn trace_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .init();
    });
}

// ── Middleware under test ─────────────────────────────────────────────────────

async fn advances(_req: Request, _res: Response, next: Next) -> Result<(), BoxError> {
    next.advance(None);
    Ok(())
}

async fn forwards_oops(_req: Request, _res: Response, next: Next) -> Result<(), BoxError> {
    next.advance(Some("oops".into()));
    Ok(())
}

async fn ends_response(_req: Request, res: Response, _next: Next) -> Result<(), BoxError> {
    res.end();
    Ok(())
}

async fn resolves_quietly(_req: Request, _res: Response, _next: Next) -> Result<(), BoxError> {
    Ok(())
}

async fn rejects(_req: Request, _res: Response, _next: Next) -> Result<(), BoxError> {
    Err("oops".into())
}

// ── Completion via the continuation ───────────────────────────────────────────

#[tokio::test]
async fn runs_the_middleware() {
    trace_init();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let outcome = run(move |_req: Request, _res: Response, next: Next| {
        let seen = Arc::clone(&seen);
        async move {
            seen.fetch_add(1, Ordering::SeqCst);
            next.advance(None);
            Ok(())
        }
    })
    .await
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn check_receives_a_clean_completion() {
    let checked = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&checked);

    Runner::new(advances)
        .check(move |error, _req, res| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert!(error.is_none());
            assert!(!res.ended());
            Ok(())
        })
        .run()
        .await
        .unwrap();

    assert_eq!(checked.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn forwards_errors_from_the_middleware() {
    let outcome = run(forwards_oops).await.unwrap();
    assert_eq!(outcome.error.unwrap().to_string(), "oops");
}

#[tokio::test]
async fn check_fires_at_completion_not_at_return() {
    let checked = Arc::new(AtomicUsize::new(0));
    let seen_by_check = Arc::clone(&checked);
    let seen_by_middleware = Arc::clone(&checked);

    Runner::new(move |_req: Request, _res: Response, next: Next| {
        let seen = Arc::clone(&seen_by_middleware);
        async move {
            next.advance(None);
            // Advancing completed the run, so the check has already fired
            // even though the middleware is still executing.
            assert_eq!(seen.load(Ordering::SeqCst), 1);
            Ok(())
        }
    })
    .check(move |_error, _req, _res| {
        seen_by_check.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .run()
    .await
    .unwrap();

    assert_eq!(checked.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn supports_async_middleware() {
    async fn slow(_req: Request, _res: Response, next: Next) -> Result<(), BoxError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        next.advance(None);
        Ok(())
    }

    let outcome = run(slow).await.unwrap();
    assert!(outcome.error.is_none());
}

// ── Setup phase ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn setup_sees_fresh_empty_fakes() {
    let outcome = Runner::new(advances)
        .setup(|req, res| {
            assert_eq!(req.method(), http::Method::GET);
            assert_eq!(req.body(), serde_json::json!({}));
            assert!(req.param("id").is_none());
            assert!(req.cookie("session").is_none());
            assert!(!res.ended());
            assert!(res.local("anything").is_none());
            Ok(())
        })
        .run()
        .await
        .unwrap();
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn setup_runs_before_the_middleware() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let in_setup = Arc::clone(&order);
    let in_middleware = Arc::clone(&order);

    Runner::new(move |_req: Request, _res: Response, next: Next| {
        let order = Arc::clone(&in_middleware);
        async move {
            order.lock().unwrap().push("middleware");
            next.advance(None);
            Ok(())
        }
    })
    .setup(move |_req, _res| {
        in_setup.lock().unwrap().push("setup");
        Ok(())
    })
    .run()
    .await
    .unwrap();

    assert_eq!(*order.lock().unwrap(), ["setup", "middleware"]);
}

#[tokio::test]
async fn setup_mutations_reach_the_middleware() {
    async fn greet(req: Request, res: Response, _next: Next) -> Result<(), BoxError> {
        let name = req.param("name").unwrap_or_else(|| "stranger".into());
        res.send(format!("hello {name}"));
        Ok(())
    }

    let outcome = Runner::new(greet)
        .setup(|req, _res| {
            req.update(|parts| {
                parts.params.insert("name".into(), "alice".into());
            });
            Ok(())
        })
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.response.body().as_deref(), Some(b"hello alice".as_slice()));
}

#[tokio::test]
async fn seeded_error_is_retained_when_middleware_only_resolves() {
    let outcome = Runner::new(resolves_quietly)
        .setup(|_req, _res| Err("seeded".into()))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.error.unwrap().to_string(), "seeded");
}

// ── Completion via the response ───────────────────────────────────────────────

#[tokio::test]
async fn completes_when_the_response_ends() {
    let outcome = run(ends_response).await.unwrap();
    assert!(outcome.error.is_none());
    assert!(outcome.response.ended());
}

#[tokio::test]
async fn chainable_response_methods_chain() {
    async fn created(_req: Request, res: Response, _next: Next) -> Result<(), BoxError> {
        res.status(StatusCode::CREATED).vary("accept").end();
        Ok(())
    }

    let outcome = run(created).await.unwrap();
    assert!(outcome.error.is_none());
    assert_eq!(outcome.response.status_code(), StatusCode::CREATED);
    assert_eq!(outcome.response.header("vary").as_deref(), Some("accept"));
}

#[tokio::test]
async fn json_terminates_and_records() {
    async fn replies(_req: Request, res: Response, _next: Next) -> Result<(), BoxError> {
        res.json(serde_json::json!({ "ok": true }));
        Ok(())
    }

    let outcome = run(replies).await.unwrap();
    assert!(outcome.response.ended());
    assert_eq!(
        outcome.response.header("content-type").as_deref(),
        Some("application/json")
    );
}

// ── Error-handling mode ───────────────────────────────────────────────────────

#[tokio::test]
async fn error_handling_mode_receives_the_setup_error() {
    let outcome = Runner::error_handling(
        |error: Option<BoxError>, _req: Request, _res: Response, next: Next| async move {
            assert_eq!(error.unwrap().to_string(), "oops");
            next.advance(None);
            Ok(())
        },
    )
    .setup(|_req, _res| Err("oops".into()))
    .run()
    .await
    .unwrap();

    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn error_handling_mode_without_a_seed_gets_none() {
    Runner::error_handling(
        |error: Option<BoxError>, _req: Request, _res: Response, next: Next| async move {
            assert!(error.is_none());
            next.advance(None);
            Ok(())
        },
    )
    .run()
    .await
    .unwrap();
}

// ── Contract violations and failures ──────────────────────────────────────────

#[tokio::test]
async fn double_advance_is_a_usage_error() {
    async fn eager(_req: Request, _res: Response, next: Next) -> Result<(), BoxError> {
        next.advance(None);
        next.advance(None);
        Ok(())
    }

    let failure = run(eager).await.unwrap_err();
    assert!(matches!(
        failure.downcast_ref::<Error>(),
        Some(Error::CalledMoreThanOnce)
    ));
    assert!(failure.to_string().contains("more than once"));
}

#[tokio::test]
async fn unhandled_rejection_is_wrapped_and_distinguishable() {
    use std::error::Error as _;

    let failure = run(rejects).await.unwrap_err();
    let wrapped = failure.downcast_ref::<Error>().expect("should be a drydock::Error");
    assert!(matches!(wrapped, Error::UnhandledRejection(_)));
    assert!(failure.to_string().contains("unhandled rejection"));
    assert_eq!(wrapped.source().unwrap().to_string(), "oops");
}

#[tokio::test]
async fn failing_check_error_propagates_unwrapped() {
    let failure = Runner::new(advances)
        .check(|_error, _req, _res| Err(Box::new(std::io::Error::other("expected a user")) as BoxError))
        .run()
        .await
        .unwrap_err();

    assert!(failure.downcast_ref::<Error>().is_none());
    assert!(failure.downcast_ref::<std::io::Error>().is_some());
    assert_eq!(failure.to_string(), "expected a user");
}

// ── Signal races: first one wins ──────────────────────────────────────────────

#[tokio::test]
async fn ending_the_response_after_advancing_is_ignored() {
    async fn both(_req: Request, res: Response, next: Next) -> Result<(), BoxError> {
        next.advance(Some("kept".into()));
        res.end();
        Ok(())
    }

    let outcome = run(both).await.unwrap();
    assert_eq!(outcome.error.unwrap().to_string(), "kept");
}

#[tokio::test]
async fn advancing_after_ending_the_response_is_not_a_usage_error() {
    async fn both(_req: Request, res: Response, next: Next) -> Result<(), BoxError> {
        res.end();
        next.advance(Some("late".into()));
        Ok(())
    }

    let outcome = run(both).await.unwrap();
    assert!(outcome.error.is_none());
    assert!(outcome.response.ended());
}

// ── Outcome ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn outcome_destructures_into_the_triple() {
    let (error, request, response) = run(advances).await.unwrap().into_parts();
    assert!(error.is_none());
    assert!(request.param("anything").is_none());
    assert!(!response.ended());
}

#[tokio::test]
async fn middleware_mutations_are_visible_in_the_outcome() {
    async fn stamps(req: Request, res: Response, next: Next) -> Result<(), BoxError> {
        req.update(|parts| {
            parts.route.insert("name".into(), serde_json::json!("stamp"));
        });
        res.update(|parts| {
            parts.locals.insert("stamped".into(), serde_json::json!(true));
        });
        next.advance(None);
        Ok(())
    }

    let outcome = run(stamps).await.unwrap();
    assert_eq!(outcome.response.local("stamped"), Some(serde_json::json!(true)));
    let route_name = outcome
        .request
        .update(|parts| parts.route.get("name").cloned());
    assert_eq!(route_name, Some(serde_json::json!("stamp")));
}

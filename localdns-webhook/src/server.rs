use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use localdns_webhook_core::review::ReviewHandler;
use log::{debug, error, info, warn};
use warp::{
    http::{header::CONTENT_TYPE, StatusCode},
    hyper::body::Bytes,
    reply::{self, Reply, Response},
    Filter, Rejection,
};

use crate::tls::TlsCredentials;

pub const MUTATE_PATH: &str = "mutate";
pub const HEALTH_PATH: &str = "healthz";

pub fn routes(
    handler: Arc<ReviewHandler>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    // path before method, so unknown paths reject with 404 rather than 405
    let mutate = warp::path(MUTATE_PATH)
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with_handler(handler))
        .map(serve_review);

    let health = warp::path(HEALTH_PATH)
        .and(warp::path::end())
        .and(warp::get())
        .map(|| "ok");

    mutate.or(health).with(warp::log("localdns_webhook::access"))
}

/// Serves the webhook over TLS until SIGINT or SIGTERM arrives, then stops
/// accepting connections and waits for in-flight reviews to finish.
pub async fn run(address: SocketAddr, handler: ReviewHandler, credentials: TlsCredentials) {
    let (bound, server) = warp::serve(routes(Arc::new(handler)))
        .tls()
        .cert(credentials.cert)
        .key(credentials.key)
        .bind_with_graceful_shutdown(address, shutdown_signal());

    info!("Webhook server listening on {bound}");
    server.await;
    info!("Webhook server stopped");
}

fn with_handler(
    handler: Arc<ReviewHandler>,
) -> impl Filter<Extract = (Arc<ReviewHandler>,), Error = Infallible> + Clone {
    warp::any().map(move || handler.clone())
}

fn serve_review(body: Bytes, handler: Arc<ReviewHandler>) -> Response {
    if body.is_empty() {
        warn!("Received an admission review with an empty body");
        return reply::with_status("empty body", StatusCode::BAD_REQUEST).into_response();
    }

    let review = handler.review(&body);

    match serde_json::to_vec(&review) {
        Ok(encoded) => {
            debug!("Writing admission response ({} bytes)", encoded.len());
            reply::with_header(encoded, CONTENT_TYPE, "application/json").into_response()
        }
        Err(err) => {
            error!("Couldn't encode the admission response! {err}");
            reply::with_status(
                format!("could not encode response: {err}"),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .into_response()
        }
    }
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Couldn't listen for SIGINT! {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Couldn't listen for SIGTERM! {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received SIGINT, draining in-flight requests..."),
        _ = terminate => info!("Received SIGTERM, draining in-flight requests..."),
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, sync::Arc};

    use localdns_webhook_core::{config::WebhookConfig, review::ReviewHandler};
    use serde_json::{json, Value};
    use warp::http::StatusCode;

    use super::routes;

    fn admission_review(annotations: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "apiVersion": "admission.k8s.io/v1beta1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "0df28fbd-5f5f-11e8-bc74-36e6bb280816",
                "kind": {"group": "", "version": "v1", "kind": "Pod"},
                "resource": {"group": "", "version": "v1", "resource": "pods"},
                "namespace": "default",
                "operation": "CREATE",
                "userInfo": {"username": "admin"},
                "object": {
                    "apiVersion": "v1",
                    "kind": "Pod",
                    "metadata": {"generateName": "web-", "annotations": annotations},
                    "spec": {"containers": [{"name": "web", "image": "nginx"}]},
                },
            },
        }))
        .unwrap()
    }

    async fn post_mutate(handler: ReviewHandler, body: Vec<u8>) -> (StatusCode, Vec<u8>) {
        let response = warp::test::request()
            .method("POST")
            .path("/mutate")
            .header("content-type", "application/json")
            .body(body)
            .reply(&routes(Arc::new(handler)))
            .await;

        (response.status(), response.body().to_vec())
    }

    #[tokio::test]
    async fn opted_in_pod_receives_a_json_patch() {
        let (status, body) = post_mutate(
            ReviewHandler::default(),
            admission_review(json!({"localdns-policy-webhook/inject": "yes"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);

        let review: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(review["kind"], "AdmissionReview");
        assert_eq!(review["response"]["uid"], "0df28fbd-5f5f-11e8-bc74-36e6bb280816");
        assert_eq!(review["response"]["allowed"], true);
        assert_eq!(review["response"]["patchType"], "JSONPatch");
        assert!(review["response"]["patch"].is_array());
    }

    #[tokio::test]
    async fn pod_without_opt_in_is_allowed_unchanged() {
        let (status, body) = post_mutate(
            ReviewHandler::default(),
            admission_review(json!({"localdns-policy-webhook/inject": "no"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);

        let review: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(review["response"]["allowed"], true);
        assert!(review["response"].get("patch").is_none());
        assert!(review["response"].get("patchType").is_none());
    }

    #[tokio::test]
    async fn ignored_namespaces_come_from_config() {
        let handler = ReviewHandler::new(WebhookConfig {
            ignored_namespaces: BTreeSet::from(["default".to_owned()]),
            ..Default::default()
        });

        let (_, body) = post_mutate(
            handler,
            admission_review(json!({"localdns-policy-webhook/inject": "yes"})),
        )
        .await;

        let review: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(review["response"]["allowed"], true);
        assert!(review["response"].get("patch").is_none());
    }

    #[tokio::test]
    async fn malformed_review_is_answered_with_an_error() {
        let (status, body) = post_mutate(ReviewHandler::default(), b"{\"kind\": 42".to_vec()).await;

        assert_eq!(status, StatusCode::OK);

        let review: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(review["response"]["allowed"], false);
        assert!(review["response"].get("patch").is_none());
    }

    #[tokio::test]
    async fn empty_body_is_a_bad_request() {
        let (status, body) = post_mutate(ReviewHandler::default(), Vec::new()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, b"empty body");
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let response = warp::test::request()
            .method("GET")
            .path("/healthz")
            .reply(&routes(Arc::new(ReviewHandler::default())))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&response.body()[..], b"ok");
    }

    #[tokio::test]
    async fn other_paths_are_not_served() {
        let response = warp::test::request()
            .method("POST")
            .path("/validate")
            .body("{}")
            .reply(&routes(Arc::new(ReviewHandler::default())))
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_get_path_is_not_found() {
        let response = warp::test::request()
            .method("GET")
            .path("/nope")
            .reply(&routes(Arc::new(ReviewHandler::default())))
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_method_on_mutate_is_not_allowed() {
        let response = warp::test::request()
            .method("PUT")
            .path("/mutate")
            .body("{}")
            .reply(&routes(Arc::new(ReviewHandler::default())))
            .await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}

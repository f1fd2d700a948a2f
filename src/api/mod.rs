// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

pub mod account;
pub mod admin;
pub mod blobs;
pub mod catalog;
pub mod deposits;
pub mod forms;
pub mod health;
pub mod purchases;
pub mod requests;
pub mod settings;

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    let v1_routes = Router::new()
        .route("/account", get(account::get_account))
        .route("/payment-methods", get(account::payment_methods))
        .route(
            "/deposits",
            get(deposits::list_deposits).post(deposits::submit_deposit),
        )
        .route("/catalog", get(catalog::list_items))
        .route("/catalog/{item_id}", get(catalog::get_item))
        .route("/catalog/{item_id}/purchase", post(purchases::purchase_item))
        .route("/catalog/{item_id}/download", get(purchases::download_item))
        .route("/purchases", get(purchases::list_purchases))
        .route(
            "/requests",
            get(requests::list_requests).post(requests::create_request),
        )
        .route("/settings", get(settings::list_settings))
        // Admin
        .route("/admin/stats", get(admin::get_stats))
        .route("/admin/audit/events", get(admin::query_audit_logs))
        .route(
            "/admin/deposits/{deposit_id}/approve",
            post(deposits::approve_deposit),
        )
        .route(
            "/admin/deposits/{deposit_id}/reject",
            post(deposits::reject_deposit),
        )
        .route(
            "/admin/deposits/{deposit_id}/reconcile",
            post(deposits::reconcile_deposit),
        )
        .route("/admin/catalog", post(catalog::create_item))
        .route(
            "/admin/catalog/{item_id}",
            put(catalog::update_item).delete(catalog::delete_item),
        )
        .route(
            "/admin/requests/{request_id}/status",
            put(requests::update_request_status),
        )
        .route("/admin/settings/{key}", put(settings::put_setting))
        .route("/admin/settings/qr/{method}", post(settings::upload_qr));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/blobs/{bucket}/{*name}", get(blobs::get_blob))
        .nest("/v1", v1_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        account::get_account,
        account::payment_methods,
        deposits::submit_deposit,
        deposits::list_deposits,
        deposits::approve_deposit,
        deposits::reject_deposit,
        deposits::reconcile_deposit,
        catalog::list_items,
        catalog::get_item,
        catalog::create_item,
        catalog::update_item,
        catalog::delete_item,
        purchases::purchase_item,
        purchases::list_purchases,
        purchases::download_item,
        requests::create_request,
        requests::list_requests,
        requests::update_request_status,
        settings::list_settings,
        settings::put_setting,
        settings::upload_qr,
        admin::get_stats,
        admin::query_audit_logs,
        blobs::get_blob
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::auth::Role,
            crate::storage::PaymentMethod,
            crate::storage::DepositStatus,
            crate::storage::RequestStatus,
            crate::storage::FeatureRequest,
            crate::storage::Setting,
            crate::storage::AuditEvent,
            crate::storage::AuditEventType,
            crate::services::PaymentInstruction,
            crate::services::MarketStats,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            account::AccountResponse,
            account::PaymentMethodsResponse,
            deposits::DepositForm,
            deposits::DepositResponse,
            deposits::DepositListResponse,
            catalog::CatalogItemForm,
            catalog::CatalogItemResponse,
            catalog::CatalogListResponse,
            catalog::DeleteItemResponse,
            purchases::PurchaseResponse,
            purchases::PurchaseReceipt,
            purchases::PurchaseListResponse,
            requests::CreateFeatureRequest,
            requests::UpdateRequestStatus,
            requests::FeatureRequestListResponse,
            settings::SettingsResponse,
            settings::PutSettingRequest,
            settings::PutSettingResponse,
            settings::QrForm,
            admin::StatsResponse,
            admin::AuditLogResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Account", description = "Coin balance and payment options"),
        (name = "Deposits", description = "Coin top-ups awaiting review"),
        (name = "Catalog", description = "Plugin and mod listings"),
        (name = "Purchases", description = "Buying and downloading items"),
        (name = "Requests", description = "Feature requests"),
        (name = "Settings", description = "Site settings"),
        (name = "Admin", description = "Marketplace administration"),
        (name = "Blobs", description = "Stored images and files")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::extractor::tests::dev_jwt;
    use crate::state::tests::test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "craftmarket-boundary";
    const FAR_FUTURE: i64 = 9999999999;

    fn bearer(user_id: &str, role: Option<&str>) -> String {
        format!("Bearer {}", dev_jwt(user_id, role, FAR_FUTURE))
    }

    fn admin() -> String {
        bearer("admin_1", Some("admin"))
    }

    fn player(user_id: &str) -> String {
        bearer(user_id, None)
    }

    struct Part<'a> {
        name: &'a str,
        file: Option<(&'a str, &'a str)>,
        data: &'a [u8],
    }

    fn text<'a>(name: &'a str, value: &'a str) -> Part<'a> {
        Part {
            name,
            file: None,
            data: value.as_bytes(),
        }
    }

    fn file<'a>(name: &'a str, file_name: &'a str, content_type: &'a str, data: &'a [u8]) -> Part<'a> {
        Part {
            name,
            file: Some((file_name, content_type)),
            data,
        }
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part.file {
                Some((file_name, content_type)) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                        part.name
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                ),
            }
            body.extend_from_slice(part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        json_response(send(app, request).await).await
    }

    async fn upload(
        app: &Router,
        method: Method,
        uri: &str,
        auth: &str,
        parts: &[Part<'_>],
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, auth)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        json_response(send(app, request).await).await
    }

    async fn json_response(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Path part of a URL the blob store produced.
    fn local_path(url: &str) -> &str {
        url.strip_prefix("http://localhost:8080").unwrap()
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _temp) = test_state();
        let app = router(state);
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn openapi_lists_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/v1/catalog/{item_id}/purchase"));
    }

    #[tokio::test]
    async fn health_is_public() {
        let (state, _temp) = test_state();
        let app = router(state);
        let (status, body) = call(&app, Method::GET, "/health/live", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn account_requires_token() {
        let (state, _temp) = test_state();
        let app = router(state);

        let (status, _) = call(&app, Method::GET, "/v1/account", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) =
            call(&app, Method::GET, "/v1/account", Some(&*player("user_1")), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["account_id"], "user_1");
        assert_eq!(body["balance"], 0);
    }

    #[tokio::test]
    async fn players_cannot_reach_admin_routes() {
        let (state, _temp) = test_state();
        let app = router(state);

        let (status, _) = call(&app, Method::GET, "/v1/admin/stats", Some(&*player("user_1")), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(&app, Method::GET, "/v1/admin/stats", Some(&*admin()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["catalog_items"], 0);
        assert_eq!(body["deposits"]["pending"], 0);
    }

    #[tokio::test]
    async fn deposit_purchase_download_flow() {
        let (state, _temp) = test_state();
        let app = router(state);
        let buyer = player("user_1");

        // Deposit 500 coins
        let (status, deposit) = upload(
            &app,
            Method::POST,
            "/v1/deposits",
            &buyer,
            &[
                text("amount", "500"),
                text("method", "easypaisa"),
                text("transaction_ref", "EP-7781"),
                file("screenshot", "proof.png", "image/png", b"png-bytes"),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{deposit}");
        assert_eq!(deposit["status"], "pending");
        let deposit_id = deposit["id"].as_str().unwrap().to_string();

        // The owner can open the screenshot through its signed link
        let screenshot = deposit["screenshot_url"].as_str().unwrap();
        let response = send(
            &app,
            Request::builder().uri(local_path(screenshot)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // List a 300 coin plugin
        let (status, item) = upload(
            &app,
            Method::POST,
            "/v1/admin/catalog",
            &admin(),
            &[
                text("title", "Skyblock Core"),
                text("description", "Island generator"),
                text("price_coins", "300"),
                text("version", "1.20.4"),
                text("platform", "paper"),
                file("logo", "logo.png", "image/png", b"logo"),
                file("files", "core.jar", "application/java-archive", b"jar-bytes"),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{item}");
        assert_eq!(item["download_method"], "upload");
        assert_eq!(item["file_count"], 1);
        let item_id = item["id"].as_str().unwrap().to_string();

        // Not enough coins yet
        let purchase_uri = format!("/v1/catalog/{item_id}/purchase");
        let (status, body) = call(&app, Method::POST, &purchase_uri, Some(&*buyer), None).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["required"], 300);
        assert_eq!(body["current"], 0);

        // Approve the deposit; a second approval is a conflict
        let approve_uri = format!("/v1/admin/deposits/{deposit_id}/approve");
        let (status, body) = call(&app, Method::POST, &approve_uri, Some(&*admin()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "approved");
        let (status, _) = call(&app, Method::POST, &approve_uri, Some(&*admin()), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Buy, then buying again is a duplicate
        let (status, receipt) = call(&app, Method::POST, &purchase_uri, Some(&*buyer), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(receipt["balance"], 200);
        let (status, body) = call(&app, Method::POST, &purchase_uri, Some(&*buyer), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error_code"], "duplicate_purchase");

        // Someone else cannot download
        let download_uri = format!("/v1/catalog/{item_id}/download");
        let (status, _) = call(&app, Method::GET, &download_uri, Some(&*player("user_2")), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // The buyer is redirected to a signed link that serves the file
        let response = send(
            &app,
            Request::builder()
                .uri(&download_uri)
                .header(header::AUTHORIZATION, &buyer)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();

        let response = send(
            &app,
            Request::builder().uri(local_path(&location)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"jar-bytes");

        let (status, body) = call(&app, Method::GET, "/v1/account", Some(&*buyer), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], 200);
    }

    #[tokio::test]
    async fn private_blobs_need_a_signature() {
        let (state, _temp) = test_state();
        let app = router(state);

        let (status, item) = upload(
            &app,
            Method::POST,
            "/v1/admin/catalog",
            &admin(),
            &[
                text("title", "Free Kit"),
                text("description", "Starter kit"),
                text("price_coins", "0"),
                text("version", "1.20"),
                text("platform", "spigot"),
                file("logo", "logo.png", "image/png", b"logo"),
                file("files", "kit.jar", "application/java-archive", b"kit"),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        // Logos are public
        let logo = item["logo_url"].as_str().unwrap();
        let response = send(
            &app,
            Request::builder().uri(local_path(logo)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        // Plugin files are not, and forged signatures fail
        let (status, _) = call(&app, Method::GET, "/blobs/plugin-files/kit.jar", None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(
            &app,
            Method::GET,
            "/blobs/plugin-files/kit.jar?expires=9999999999&signature=AAAA",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&app, Method::GET, "/blobs/nope/x.png", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn external_items_redirect_to_their_host() {
        let (state, _temp) = test_state();
        let app = router(state);

        let (status, item) = upload(
            &app,
            Method::POST,
            "/v1/admin/catalog",
            &admin(),
            &[
                text("title", "Worldedit Mirror"),
                text("description", "Hosted elsewhere"),
                text("price_coins", "0"),
                text("version", "7.3"),
                text("platform", "paper"),
                text("external_url", "https://cdn.example.com/we.jar"),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{item}");
        assert_eq!(item["download_method"], "external");
        assert!(item.get("external_url").is_none());
        let item_id = item["id"].as_str().unwrap();

        // An empty description clears it; absent fields stay as they were.
        let (status, updated) = upload(
            &app,
            Method::PUT,
            &format!("/v1/admin/catalog/{item_id}"),
            &admin(),
            &[text("description", "")],
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{updated}");
        assert_eq!(updated["description"], "");
        assert_eq!(updated["title"], "Worldedit Mirror");

        let buyer = player("user_9");
        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/v1/catalog/{item_id}/purchase"),
            Some(&*buyer),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let response = send(
            &app,
            Request::builder()
                .uri(format!("/v1/catalog/{item_id}/download"))
                .header(header::AUTHORIZATION, &buyer)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://cdn.example.com/we.jar"
        );
    }

    #[tokio::test]
    async fn feature_request_workflow() {
        let (state, _temp) = test_state();
        let app = router(state);
        let requester = player("user_5");

        let (status, request) = call(
            &app,
            Method::POST,
            "/v1/requests",
            Some(&*requester),
            Some(json!({
                "requester_name": "Steve",
                "requester_email": "steve@example.com",
                "target_name": "Claims",
                "platform": "paper",
                "supported_versions": ["1.20", "1.21"],
                "category": "protection",
                "description": "Land claims with trust lists",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{request}");
        let request_id = request["id"].as_str().unwrap();
        let status_uri = format!("/v1/admin/requests/{request_id}/status");

        let (status, body) = call(
            &app,
            Method::PUT,
            &status_uri,
            Some(&*admin()),
            Some(json!({ "status": "completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT, "{body}");

        let (status, body) = call(
            &app,
            Method::PUT,
            &status_uri,
            Some(&*admin()),
            Some(json!({ "status": "in_progress", "note": "Picked up" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["admin_note"], "Picked up");

        let (status, body) = call(&app, Method::GET, "/v1/requests", Some(&*requester), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["requests"][0]["status"], "in_progress");

        let (_, body) = call(&app, Method::GET, "/v1/requests", Some(&*player("user_6")), None).await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn settings_feed_payment_methods() {
        let (state, _temp) = test_state();
        let app = router(state);

        let (status, _) = call(
            &app,
            Method::PUT,
            "/v1/admin/settings/upi_id",
            Some(&*admin()),
            Some(json!({ "value": "market@upi" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = upload(
            &app,
            Method::POST,
            "/v1/admin/settings/qr/upi",
            &admin(),
            &[file("image", "qr.png", "image/png", b"qr")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) =
            call(&app, Method::GET, "/v1/payment-methods", Some(&*player("user_1")), None).await;
        assert_eq!(status, StatusCode::OK);
        let upi = body["methods"]
            .as_array()
            .unwrap()
            .iter()
            .find(|m| m["method"] == "upi")
            .unwrap();
        assert_eq!(upi["receiver"], "market@upi");
        assert!(upi["qr_url"].as_str().unwrap().contains("/blobs/payment-qr/"));

        let (status, _) = call(
            &app,
            Method::PUT,
            "/v1/admin/settings/Bad-Key",
            Some(&*admin()),
            Some(json!({ "value": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod common;

use actix_web::{test, web, App};
use aram_lobby_server::http;
use common::*;
use serde_json::Value;

#[actix_rt::test]
async fn healthz_reports_store_and_rooms() {
    let (registry, _) = registry_with(fast_settings());
    let (conn, _rx) = aram_lobby_server::connection::Connection::new();
    registry
        .join_room(create("lobby"), player("a", 1200, &[]), conn)
        .unwrap();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(registry))
            .configure(http::routes::init_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/healthz").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rooms"], 1);
}

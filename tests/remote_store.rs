use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fishwiki_rs::config::Config;
use fishwiki_rs::remote::events::{self, WeeklyEvent};
use fishwiki_rs::remote::settings::{self, GuideText, TackleRateRow, TackleRates};
use fishwiki_rs::remote::{DocumentStore, RemoteError};

fn store(server: &MockServer) -> DocumentStore {
    let mut config = Config::default().remote;
    config.enabled = true;
    config.base_url = format!("{}/v1/documents/", server.uri());
    DocumentStore::new(&config).unwrap()
}

#[tokio::test]
async fn guide_is_merged_not_replaced() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v1/documents/settings/guide"))
        .and(query_param("updateMask.fieldPaths", "content"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "p/settings/guide",
            "fields": {
                "content": { "stringValue": "New text" },
                "legacyField": { "stringValue": "kept by the store" }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    settings::save(&store(&server), &GuideText { content: "New text".into() }).await.unwrap();
}

#[tokio::test]
async fn tackle_rates_round_trip_through_the_typed_encoding() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/documents/settings/tackleRates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "p/settings/tackleRates",
            "fields": { "rows": { "arrayValue": { "values": [
                { "mapValue": { "fields": {
                    "tier": { "stringValue": "rod" },
                    "rates": { "mapValue": { "fields": {
                        "power": { "doubleValue": 1.5 },
                        "luck": { "integerValue": "2" }
                    } } }
                } } }
            ] } } }
        })))
        .mount(&server)
        .await;

    let rates: TackleRates = settings::load(&store(&server)).await.unwrap();
    assert_eq!(rates.rows.len(), 1);
    let row: &TackleRateRow = &rates.rows[0];
    assert_eq!(row.tier, "rod");
    assert_eq!(row.rates.get("power"), Some(&1.5));
    assert_eq!(row.rates.get("luck"), Some(&2.0));
}

#[tokio::test]
async fn failed_event_write_surfaces_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let event = WeeklyEvent { title: "Double drops".into(), rate_multiplier: 2.0, ..WeeklyEvent::default() };
    let err = events::save_event(&store(&server), &event).await.unwrap_err();
    assert!(matches!(err, RemoteError::Status { .. }));
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn settings_saved_from_json_are_validated_then_merged() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v1/documents/settings/foodCategories"))
        .and(query_param("updateMask.fieldPaths", "categories"))
        .and(body_partial_json(json!({ "fields": { "categories": { "mapValue": { "fields": {
            "l-001": { "stringValue": "main" }
        } } } } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "p/settings/foodCategories", "fields": {} })))
        .expect(1)
        .mount(&server)
        .await;
    let store = store(&server);

    settings::save_from_json(&store, "foodCategories", r#"{"categories":{"l-001":"main"}}"#).await.unwrap();

    // Rejected before any request is sent
    let bad_link = r#"{"links":[{"title":"Shop","url":"ftp://shop.example"}]}"#;
    assert!(matches!(settings::save_from_json(&store, "shopLinks", bad_link).await, Err(RemoteError::Invalid(_))));
    assert!(matches!(settings::save_from_json(&store, "weather", "{}").await, Err(RemoteError::Invalid(_))));
    assert!(matches!(settings::save_from_json(&store, "tackleRates", "not json").await, Err(RemoteError::Invalid(_))));
}

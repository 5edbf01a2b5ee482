//! Shared settings, one document each in the `settings` collection.

use futures_util::future::try_join4;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};
use url::Url;

use crate::engine::records::ItemType;
use crate::remote::client::{DocumentStore, RemoteError};

pub const SETTINGS_COLLECTION: &str = "settings";

pub trait SettingsDoc: Serialize + DeserializeOwned + Default {
    const DOC_ID: &'static str;

    fn validate(&self) -> Result<(), RemoteError> {
        Ok(())
    }
}

/// Reads a setting, falling back to its default when the document does not
/// exist yet.
pub async fn load<T: SettingsDoc>(store: &DocumentStore) -> Result<T, RemoteError> {
    match store.get_document(SETTINGS_COLLECTION, T::DOC_ID).await? {
        Some(doc) => serde_json::from_value(Value::Object(doc.fields))
            .map_err(|e| RemoteError::Malformed(format!("{}: {}", T::DOC_ID, e))),
        None => {
            debug!(doc = T::DOC_ID, "Setting not stored yet, using default");
            Ok(T::default())
        }
    }
}

/// Validates and merges a setting into its document.
pub async fn save<T: SettingsDoc>(store: &DocumentStore, setting: &T) -> Result<(), RemoteError> {
    setting.validate()?;
    let fields = match serde_json::to_value(setting) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return Err(RemoteError::Malformed(format!("{} is not an object", T::DOC_ID))),
        Err(e) => return Err(RemoteError::Malformed(format!("{}: {}", T::DOC_ID, e))),
    };
    store.merge_document(SETTINGS_COLLECTION, T::DOC_ID, &fields).await?;
    info!(doc = T::DOC_ID, "Setting saved");
    Ok(())
}

/// Every document id [`save_from_json`] accepts.
pub const DOC_IDS: [&str; 4] = [GuideText::DOC_ID, ShopLinks::DOC_ID, FoodCategories::DOC_ID, TackleRates::DOC_ID];

/// Parses `json` as the setting named `doc_id`, then validates and merges it.
pub async fn save_from_json(store: &DocumentStore, doc_id: &str, json: &str) -> Result<(), RemoteError> {
    if doc_id == GuideText::DOC_ID {
        save(store, &parse::<GuideText>(json)?).await
    } else if doc_id == ShopLinks::DOC_ID {
        save(store, &parse::<ShopLinks>(json)?).await
    } else if doc_id == FoodCategories::DOC_ID {
        save(store, &parse::<FoodCategories>(json)?).await
    } else if doc_id == TackleRates::DOC_ID {
        save(store, &parse::<TackleRates>(json)?).await
    } else {
        Err(RemoteError::Invalid(format!("unknown setting {}, expected one of {}", doc_id, DOC_IDS.join("/"))))
    }
}

fn parse<T: SettingsDoc>(json: &str) -> Result<T, RemoteError> {
    serde_json::from_str(json).map_err(|e| RemoteError::Invalid(format!("{}: {}", T::DOC_ID, e)))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GuideText {
    pub content: String,
}

impl SettingsDoc for GuideText {
    const DOC_ID: &'static str = "guide";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShopLink {
    pub title: String,
    pub url: String,
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShopLinks {
    pub links: Vec<ShopLink>,
}

impl SettingsDoc for ShopLinks {
    const DOC_ID: &'static str = "shopLinks";

    fn validate(&self) -> Result<(), RemoteError> {
        for link in &self.links {
            let parsed = Url::parse(&link.url).map_err(|e| RemoteError::Invalid(format!("{}: {}", link.url, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(RemoteError::Invalid(format!("{}: only http(s) links are allowed", link.url)));
            }
        }
        Ok(())
    }
}

/// Lunchbox item id to its food category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FoodCategories {
    pub categories: BTreeMap<String, String>,
}

impl SettingsDoc for FoodCategories {
    const DOC_ID: &'static str = "foodCategories";

    fn validate(&self) -> Result<(), RemoteError> {
        let allowed = ItemType::Lunchbox.categories();
        match self.categories.iter().find(|(_, c)| !allowed.contains(&c.as_str())) {
            Some((id, category)) => Err(RemoteError::Invalid(format!(
                "{} has category {}, expected one of {}",
                id,
                category,
                allowed.join("/")
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TackleRateRow {
    pub tier: String,
    pub rates: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TackleRates {
    pub rows: Vec<TackleRateRow>,
}

impl SettingsDoc for TackleRates {
    const DOC_ID: &'static str = "tackleRates";
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedSettings {
    pub guide: GuideText,
    pub shop_links: ShopLinks,
    pub food_categories: FoodCategories,
    pub tackle_rates: TackleRates,
}

impl SharedSettings {
    pub async fn load_all(store: &DocumentStore) -> Result<Self, RemoteError> {
        let (guide, shop_links, food_categories, tackle_rates) = try_join4(
            load::<GuideText>(store),
            load::<ShopLinks>(store),
            load::<FoodCategories>(store),
            load::<TackleRates>(store),
        )
        .await?;
        Ok(Self { guide, shop_links, food_categories, tackle_rates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store(server: &MockServer) -> DocumentStore {
        let mut config = Config::default().remote;
        config.base_url = server.uri();
        DocumentStore::new(&config).unwrap()
    }

    #[test]
    fn shop_links_must_be_web_urls() {
        let mut links = ShopLinks {
            links: vec![ShopLink { title: "Store".into(), url: "https://shop.example.com/item/1".into(), note: String::new() }],
        };
        assert!(links.validate().is_ok());

        links.links.push(ShopLink { title: "Bad".into(), url: "not a url".into(), note: String::new() });
        assert!(matches!(links.validate(), Err(RemoteError::Invalid(_))));

        links.links[1].url = "ftp://shop.example.com".into();
        assert!(matches!(links.validate(), Err(RemoteError::Invalid(_))));
    }

    #[test]
    fn food_categories_must_be_lunchbox_categories() {
        let mut food = FoodCategories::default();
        food.categories.insert("l-001".into(), "staple".into());
        assert!(food.validate().is_ok());
        food.categories.insert("l-002".into(), "rod".into());
        assert!(food.validate().is_err());
    }

    #[tokio::test]
    async fn missing_documents_load_as_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/settings/guide"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "x/settings/guide",
                "fields": { "content": { "stringValue": "Read the rules" } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let settings = SharedSettings::load_all(&store(&server).await).await.unwrap();
        assert_eq!(settings.guide.content, "Read the rules");
        assert_eq!(settings.shop_links, ShopLinks::default());
        assert!(settings.tackle_rates.rows.is_empty());
    }

    #[tokio::test]
    async fn invalid_settings_are_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let links = ShopLinks { links: vec![ShopLink { url: "nope".into(), ..ShopLink::default() }] };
        assert!(save(&store(&server).await, &links).await.is_err());
    }
}

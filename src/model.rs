//! CRM data as seen by the extension
//!
//! Records are immutable snapshots: sync replaces them wholesale and autofill receives a
//! cloned [`AutofillPayload`].

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// A listing as exported by the CRM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PropertyRecord {
    /// CRM identity; numeric ids are accepted and stored as strings
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Internal reference number shown to portals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// e.g. "apartment", "villa"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,

    /// "sale" or "rent"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,

    /// Built-up area in square feet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,

    /// Image URLs in display order
    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub amenities: BTreeSet<String>,
}

fn default_currency() -> String {
    "AED".to_string()
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
    })
}

impl PropertyRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            reference: None,
            property_type: None,
            purpose: None,
            address: None,
            city: None,
            community: None,
            price: None,
            currency: default_currency(),
            bedrooms: None,
            bathrooms: None,
            size: None,
            images: Vec::new(),
            amenities: BTreeSet::new(),
        }
    }

    /// Price without a trailing ".0" so numeric inputs accept it
    pub fn price_text(&self) -> Option<String> {
        self.price.map(format_number)
    }

    pub fn size_text(&self) -> Option<String> {
        self.size.map(format_number)
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Agency branding used by the popup and passed along to adapters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Theme {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    /// Agent contact line some portals require in the description footer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_line: Option<String>,
}

/// User-editable extension settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct Settings {
    /// CRM base URL, normalized on update
    pub base_url: String,
    /// Sync when the background process starts
    pub auto_sync: bool,
    /// Adapter key used when the page host is not recognised
    pub default_site: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auto_sync: true,
            default_site: None,
        }
    }
}

/// Partial settings update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_sync: Option<bool>,
    /// `Some(None)` (JSON `null`) clears the default site
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub default_site: Option<Option<String>>,
}

/// Maps a field that is present, `null` included, to `Some`; absent fields stay `None`
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl Settings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(base_url) = patch.base_url {
            self.base_url = crate::config::normalize_base_url(&base_url);
        }
        if let Some(auto_sync) = patch.auto_sync {
            self.auto_sync = auto_sync;
        }
        if let Some(default_site) = patch.default_site {
            self.default_site = default_site;
        }
    }
}

/// Everything an adapter needs to fill one listing form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct AutofillPayload {
    pub property: PropertyRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
}

impl AutofillPayload {
    pub fn new(property: PropertyRecord, theme: Option<Theme>) -> Self {
        Self { property, theme }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_patch_null_clears_default_site() {
        let mut settings = Settings {
            default_site: Some("bayut".into()),
            ..Default::default()
        };

        let untouched: SettingsPatch = serde_json::from_str(r#"{"auto_sync": false}"#).unwrap();
        assert_eq!(untouched.default_site, None);
        settings.apply(untouched);
        assert_eq!(settings.default_site.as_deref(), Some("bayut"));

        let cleared: SettingsPatch = serde_json::from_str(r#"{"default_site": null}"#).unwrap();
        assert_eq!(cleared.default_site, Some(None));
        assert_eq!(serde_json::to_string(&cleared).unwrap(), r#"{"default_site":null}"#);
        settings.apply(cleared);
        assert_eq!(settings.default_site, None);

        let set: SettingsPatch = serde_json::from_str(r#"{"default_site": "dubizzle"}"#).unwrap();
        settings.apply(set);
        assert_eq!(settings.default_site.as_deref(), Some("dubizzle"));
    }

    #[test]
    fn test_property_from_crm_json() {
        let json = serde_json::json!({
            "id": 42,
            "title": "Marina View 2BR",
            "price": 1850000.0,
            "bedrooms": 2,
            "bathrooms": 3,
            "size": 1240.5,
            "images": ["https://cdn.example.com/1.jpg", "https://cdn.example.com/2.jpg"],
            "amenities": ["Pool", "Gym", "Pool"]
        });

        let record: PropertyRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.currency, "AED");
        assert_eq!(record.images.len(), 2);
        assert_eq!(record.amenities.len(), 2);
        assert_eq!(record.price_text().as_deref(), Some("1850000"));
        assert_eq!(record.size_text().as_deref(), Some("1240.5"));
    }

    #[test]
    fn test_property_string_id() {
        let record: PropertyRecord = serde_json::from_value(serde_json::json!({"id": "p-7"})).unwrap();
        assert_eq!(record.id, "p-7");
        assert!(record.title.is_empty());
    }

    #[test]
    fn test_settings_patch() {
        let mut settings = Settings::default();
        settings.apply(SettingsPatch {
            base_url: Some("crm.example.com/".into()),
            ..Default::default()
        });
        assert_eq!(settings.base_url, "https://crm.example.com");
        assert!(settings.auto_sync);

        settings.apply(SettingsPatch {
            auto_sync: Some(false),
            default_site: Some(Some("bayut".into())),
            ..Default::default()
        });
        assert!(!settings.auto_sync);
        assert_eq!(settings.default_site.as_deref(), Some("bayut"));
        assert_eq!(settings.base_url, "https://crm.example.com");

        settings.apply(SettingsPatch {
            default_site: Some(None),
            ..Default::default()
        });
        assert!(settings.default_site.is_none());
    }
}

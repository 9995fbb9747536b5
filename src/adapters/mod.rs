//! Site adapters
//!
//! One adapter per supported listing portal. Adapters are stateless: everything they do
//! goes through [`PageDom`], and the only difference between them is the data in their
//! [`SiteProfile`] (selector vocabulary, control idioms, upload idiom, image platform).
//!
//! Filling is best-effort. Fields that cannot be found are reported as missing, image
//! problems become warnings, and a DOM failure aborts the run with
//! [`AutofillError::AdapterFailed`]. Writes already made are left on the page.

pub mod sites;

pub use sites::{ChoiceControl, SiteProfile};

use crate::config::EngineConfig;
use crate::dom::{self, NodeId, PageDom, Scope};
use crate::error::{AutofillError, Result};
use crate::images;
use crate::locator::{self, FieldType};
use crate::model::{AutofillPayload, PropertyRecord};
use crate::upload::{ImageFetcher, ImageSource, UploadExecutor};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Categorical fields go first: portals often reveal the rest of the form only after
/// purpose and type are chosen.
const FILL_ORDER: [FieldType; 12] = [
    FieldType::Purpose,
    FieldType::PropertyType,
    FieldType::Title,
    FieldType::Description,
    FieldType::Price,
    FieldType::Bedrooms,
    FieldType::Bathrooms,
    FieldType::Size,
    FieldType::City,
    FieldType::Community,
    FieldType::Address,
    FieldType::Reference,
];

const CHOICE_BUTTONS: &str = "button, [role='button'], [role='radio'], [role='tab'], label";

/// Supported listing portals, in registry order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SiteAdapter {
    Bayut,
    Dubizzle,
    PropertyFinder,
    JustProperty,
}

/// Collaborators shared by every adapter run
#[derive(Clone)]
pub struct AdapterContext {
    pub uploader: UploadExecutor,
    /// Pause after each field write
    pub field_delay: Duration,
}

impl AdapterContext {
    pub fn new(uploader: UploadExecutor, field_delay: Duration) -> Self {
        Self { uploader, field_delay }
    }

    pub fn from_config(fetcher: Arc<dyn ImageFetcher>, config: &EngineConfig) -> Self {
        Self::new(UploadExecutor::new(fetcher, config.upload.clone()), config.field_delay())
    }
}

/// What one adapter run did to the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutofillReport {
    pub site: String,
    pub filled_fields: Vec<FieldType>,
    /// Fields with a payload value but no matching control on the page
    pub missing_fields: Vec<FieldType>,
    pub amenities: Vec<String>,
    pub uploaded_count: usize,
    pub warnings: Vec<String>,
}

/// Whether `host` is `domain` or one of its subdomains
pub fn host_matches(host: &str, domain: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host == domain || host.strip_suffix(domain).is_some_and(|prefix| prefix.ends_with('.'))
}

/// Candidate values for a field, most preferred first; `None` when the record has none
fn field_values(payload: &AutofillPayload, field: FieldType) -> Option<Vec<String>> {
    let p: &PropertyRecord = &payload.property;
    let single = |v: Option<String>| v.filter(|s| !s.trim().is_empty()).map(|s| vec![s]);

    match field {
        FieldType::Title => single(Some(p.title.clone())),
        FieldType::Description => {
            let contact = payload.theme.as_ref().and_then(|t| t.contact_line.as_deref());
            single(p.description.clone().map(|d| match contact {
                Some(line) if !line.is_empty() && !d.contains(line) => format!("{}\n\n{}", d, line),
                _ => d,
            }))
        }
        FieldType::Price => single(p.price_text()),
        FieldType::Bedrooms => p.bedrooms.map(|n| match n {
            0 => vec!["0".to_string(), "Studio".to_string()],
            n => vec![n.to_string()],
        }),
        FieldType::Bathrooms => single(p.bathrooms.map(|n| n.to_string())),
        FieldType::Size => single(p.size_text()),
        FieldType::Address => single(p.address.clone()),
        FieldType::City => single(p.city.clone()),
        FieldType::Community => single(p.community.clone()),
        FieldType::Reference => single(p.reference.clone()),
        FieldType::PropertyType => single(p.property_type.clone()),
        FieldType::Purpose => p.purpose.as_deref().map(|purpose| {
            let purpose = purpose.trim().to_lowercase();
            match purpose.as_str() {
                "sale" | "sell" | "buy" => vec!["sale".into(), "for sale".into(), "buy".into()],
                "rent" | "lease" => vec!["rent".into(), "for rent".into(), "to rent".into()],
                _ => vec![purpose],
            }
        }),
    }
}

/// Write the first acceptable candidate to `node` and commit it.
/// Returns `false` when a `<select>` offers none of the candidates.
fn write_field<D: PageDom + ?Sized>(dom: &mut D, node: NodeId, candidates: &[String]) -> Result<bool> {
    let Some(primary) = candidates.first() else {
        return Ok(false);
    };

    if dom.tag_name(node)? == "select" {
        let mut chosen = false;
        for candidate in candidates {
            if dom.select_option(node, candidate)? {
                chosen = true;
                break;
            }
        }
        if !chosen {
            return Ok(false);
        }
    } else {
        dom.set_value(node, primary)?;
    }

    dom::commit(dom, node)?;
    Ok(true)
}

fn attr_equals<D: PageDom + ?Sized>(dom: &D, node: NodeId, name: &str, wanted: &str) -> bool {
    matches!(dom.attribute(node, name), Ok(Some(v)) if v.trim().eq_ignore_ascii_case(wanted))
}

impl SiteAdapter {
    pub const ALL: [SiteAdapter; 4] = [
        SiteAdapter::Bayut,
        SiteAdapter::Dubizzle,
        SiteAdapter::PropertyFinder,
        SiteAdapter::JustProperty,
    ];

    pub fn profile(&self) -> &'static SiteProfile {
        match self {
            SiteAdapter::Bayut => &sites::BAYUT,
            SiteAdapter::Dubizzle => &sites::DUBIZZLE,
            SiteAdapter::PropertyFinder => &sites::PROPERTY_FINDER,
            SiteAdapter::JustProperty => &sites::JUST_PROPERTY,
        }
    }

    pub fn key(&self) -> &'static str {
        self.profile().key
    }

    /// Whether the page at `location` belongs to this portal
    pub fn matches(&self, location: &str) -> bool {
        let Ok(url) = url::Url::parse(location) else {
            return false;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        url.host_str()
            .is_some_and(|host| self.profile().hosts.iter().any(|domain| host_matches(host, domain)))
    }

    /// Site selectors first, then the generic table for `field`
    pub fn locate_field<D: PageDom + ?Sized>(&self, dom: &D, field: FieldType) -> Option<NodeId> {
        let profile = self.profile();
        locator::locate_with(dom, profile.overrides_for(field), profile.search_shadow_dom)
            .or_else(|| locator::locate(dom, field, profile.search_shadow_dom))
    }

    fn failed(&self, step: impl std::fmt::Display, error: AutofillError) -> AutofillError {
        AutofillError::AdapterFailed {
            site: self.key().to_string(),
            reason: format!("{}: {}", step, error),
        }
    }

    /// Click the choice button whose text matches one of `candidates`
    fn click_choice<D: PageDom + ?Sized>(&self, dom: &mut D, candidates: &[String]) -> Result<bool> {
        let needles: Vec<&str> = candidates.iter().map(String::as_str).collect();
        let page: &D = dom;
        let scopes = dom::scopes(page, self.profile().search_shadow_dom);
        let button = dom::find_choice(page, &scopes, CHOICE_BUTTONS, &needles);

        match button {
            Some(button) => {
                dom.click(button)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn find_amenity<D: PageDom + ?Sized>(&self, dom: &D, amenity: &str) -> Option<NodeId> {
        for scope in dom::scopes(dom, self.profile().search_shadow_dom) {
            let checkbox = dom
                .query_all(scope, "input[type='checkbox']")
                .unwrap_or_default()
                .into_iter()
                .find(|&n| ["value", "name", "aria-label"].iter().any(|a| attr_equals(dom, n, a, amenity)));
            if checkbox.is_some() {
                return checkbox;
            }
            if let Some(label) = dom::find_by_text(dom, scope, "label", &[amenity]) {
                return Some(label);
            }
        }
        None
    }

    /// The checkbox a label controls through its `for` attribute, if resolvable
    fn label_target<D: PageDom + ?Sized>(&self, dom: &D, label: NodeId) -> Option<NodeId> {
        let for_id = dom.attribute(label, "for").ok().flatten()?;
        if for_id.contains(['\'', '\\']) {
            return None;
        }
        dom::scopes(dom, self.profile().search_shadow_dom)
            .into_iter()
            .find_map(|scope: Scope| dom.query(scope, &format!("[id='{}']", for_id)).ok().flatten())
    }

    /// Tick each amenity that has a matching checkbox or label; already-ticked boxes are
    /// left alone.
    fn tick_amenities<D: PageDom + ?Sized>(&self, dom: &mut D, amenities: &[String]) -> Result<Vec<String>> {
        let mut ticked = Vec::new();
        for amenity in amenities {
            let Some(node) = self.find_amenity(dom, amenity) else {
                log::debug!("[{}] no control for amenity '{}'", self.key(), amenity);
                continue;
            };

            let checkbox = if dom.tag_name(node)? == "label" {
                self.label_target(dom, node)
            } else {
                Some(node)
            };
            let already = match checkbox {
                Some(checkbox) => dom.is_checked(checkbox)?,
                None => false,
            };
            if !already {
                dom.click(node)?;
            }
            ticked.push(amenity.clone());
        }
        Ok(ticked)
    }

    /// Fill the listing form on `dom` from `payload`
    pub async fn apply<D: PageDom + ?Sized>(
        &self,
        dom: &mut D,
        payload: &AutofillPayload,
        ctx: &AdapterContext,
    ) -> Result<AutofillReport> {
        let profile = self.profile();
        let mut report = AutofillReport {
            site: self.key().to_string(),
            ..Default::default()
        };
        log::info!("[{}] filling listing {}", self.key(), payload.property.id);

        for field in FILL_ORDER {
            let Some(candidates) = field_values(payload, field) else {
                continue;
            };

            if profile.control_for(field) == ChoiceControl::ButtonText
                && self.click_choice(dom, &candidates).map_err(|e| self.failed(field, e))?
            {
                log::debug!("[{}] {} chosen by button", self.key(), field);
                report.filled_fields.push(field);
                tokio::time::sleep(ctx.field_delay).await;
                continue;
            }

            let Some(node) = self.locate_field(dom, field) else {
                log::debug!("[{}] no control for {}", self.key(), field);
                report.missing_fields.push(field);
                continue;
            };

            if write_field(dom, node, &candidates).map_err(|e| self.failed(field, e))? {
                report.filled_fields.push(field);
            } else {
                report
                    .warnings
                    .push(format!("No option matching '{}' for {}", candidates.join("' / '"), field));
                report.missing_fields.push(field);
            }
            tokio::time::sleep(ctx.field_delay).await;
        }

        let amenities: Vec<String> = payload.property.amenities.iter().cloned().collect();
        if !amenities.is_empty() {
            report.amenities = self
                .tick_amenities(dom, &amenities)
                .map_err(|e| self.failed("amenities", e))?;
        }

        if !payload.property.images.is_empty() {
            self.upload_images(dom, payload, ctx, &mut report).await;
        }

        log::info!(
            "[{}] filled {} fields, {} missing, {} images uploaded",
            self.key(),
            report.filled_fields.len(),
            report.missing_fields.len(),
            report.uploaded_count
        );
        Ok(report)
    }

    /// Download, validate and upload the payload images. Only files passing validation
    /// are uploaded; everything else ends up in the warnings.
    async fn upload_images<D: PageDom + ?Sized>(
        &self,
        dom: &mut D,
        payload: &AutofillPayload,
        ctx: &AdapterContext,
        report: &mut AutofillReport,
    ) {
        let profile = self.profile();
        let sources: Vec<ImageSource> = payload.property.images.iter().cloned().map(ImageSource::Url).collect();

        let (files, fetch_errors) = ctx.uploader.materialize(&sources).await;
        report.warnings.extend(fetch_errors);

        let validation = images::validate(&files, profile.image_platform);
        report.warnings.extend(validation.errors.iter().map(ToString::to_string));
        if validation.valid_files.is_empty() {
            report.warnings.push("No valid images to upload".to_string());
            return;
        }

        let valid: Vec<ImageSource> = validation.valid_files.into_iter().map(ImageSource::File).collect();
        let outcome = ctx.uploader.execute(dom, profile.upload_pattern, &valid).await;
        report.uploaded_count = outcome.uploaded_count;
        report.warnings.extend(outcome.errors);
    }
}

/// Fixed, ordered set of adapters
#[derive(Debug, Clone)]
pub struct AdapterRegistry {
    adapters: Vec<SiteAdapter>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self {
            adapters: SiteAdapter::ALL.to_vec(),
        }
    }
}

impl AdapterRegistry {
    pub fn new(adapters: Vec<SiteAdapter>) -> Self {
        Self { adapters }
    }

    pub fn adapters(&self) -> &[SiteAdapter] {
        &self.adapters
    }

    /// First adapter whose host pattern matches `location`
    pub fn resolve(&self, location: &str) -> Option<SiteAdapter> {
        self.adapters.iter().copied().find(|a| a.matches(location))
    }

    pub fn by_key(&self, key: &str) -> Option<SiteAdapter> {
        self.adapters.iter().copied().find(|a| a.key().eq_ignore_ascii_case(key.trim()))
    }

    /// Explicit key first, then the page location
    pub fn select(&self, key: Option<&str>, location: &str) -> Result<SiteAdapter> {
        match key {
            Some(key) => self
                .by_key(key)
                .ok_or_else(|| AutofillError::UnsupportedSite(key.to_string())),
            None => self
                .resolve(location)
                .ok_or_else(|| AutofillError::UnsupportedSite(location.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use crate::dom::{DomTree, ElementNode};
    use crate::images::{ImageFile, test_jpeg};
    use crate::model::Theme;
    use crate::upload::file_name_from_url;
    use async_trait::async_trait;

    /// Serves JPEGs whose side length is encoded in the URL (`.../600/a.jpg`)
    struct SizedFetcher;

    #[async_trait]
    impl ImageFetcher for SizedFetcher {
        async fn fetch(&self, url: &str) -> Result<ImageFile> {
            let side = url
                .split('/')
                .rev()
                .nth(1)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| AutofillError::FetchFailed {
                    url: url.to_string(),
                    reason: "404 Not Found".into(),
                })?;
            Ok(test_jpeg(&file_name_from_url(url), side, side))
        }
    }

    fn context() -> AdapterContext {
        let uploader = UploadExecutor::new(Arc::new(SizedFetcher), UploadConfig::default());
        AdapterContext::new(uploader, Duration::from_millis(150))
    }

    fn listing() -> AutofillPayload {
        let mut property = PropertyRecord::new("42", "Marina view 2BR");
        property.description = Some("Bright apartment.".into());
        property.price = Some(1_850_000.0);
        property.bedrooms = Some(0);
        property.purpose = Some("sale".into());
        property.property_type = Some("Apartment".into());
        property.amenities = ["Pool".to_string(), "Gym".to_string()].into();
        AutofillPayload::new(property, None)
    }

    #[test]
    fn test_resolve_by_host() {
        let registry = AdapterRegistry::default();
        assert_eq!(registry.resolve("https://www.bayut.com/post-ad"), Some(SiteAdapter::Bayut));
        assert_eq!(registry.resolve("https://bayut.com"), Some(SiteAdapter::Bayut));
        assert_eq!(registry.resolve("https://uae.dubizzle.com/place-ad"), Some(SiteAdapter::Dubizzle));
        assert_eq!(
            registry.resolve("https://expert.propertyfinder.ae/listings/new"),
            Some(SiteAdapter::PropertyFinder)
        );
        assert_eq!(registry.resolve("https://notbayut.com"), None);
        assert_eq!(registry.resolve("https://dubizzle.com.evil.io"), None);
        assert_eq!(registry.resolve("chrome://newtab"), None);
        assert_eq!(registry.resolve("not a url"), None);
    }

    #[test]
    fn test_select_by_key_or_location() {
        let registry = AdapterRegistry::default();
        assert_eq!(registry.by_key("JustProperty"), Some(SiteAdapter::JustProperty));
        assert_eq!(
            registry.select(Some("dubizzle"), "https://example.com").unwrap(),
            SiteAdapter::Dubizzle
        );
        assert!(matches!(
            registry.select(None, "https://example.com"),
            Err(AutofillError::UnsupportedSite(_))
        ));
        assert!(registry.select(Some("zillow"), "https://www.bayut.com").is_err());
    }

    #[test]
    fn test_registry_order_decides_ties() {
        let registry = AdapterRegistry::new(vec![SiteAdapter::JustProperty, SiteAdapter::Bayut]);
        assert_eq!(registry.adapters().len(), 2);
        assert_eq!(registry.resolve("https://www.bayut.com"), Some(SiteAdapter::Bayut));
        assert_eq!(registry.resolve("https://www.dubizzle.com"), None);
    }

    fn bayut_form() -> DomTree {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("button").with_attr("id", "rent").with_text("Rent"),
            ElementNode::new("button").with_attr("id", "sale").with_text("Sale"),
            ElementNode::new("button").with_attr("id", "apartment").with_text("Apartment"),
            ElementNode::input("text").with_attr("id", "title").with_attr("name", "title_en"),
            ElementNode::new("textarea").with_attr("id", "desc").with_attr("name", "description_en"),
            ElementNode::input("number").with_attr("id", "price").with_attr("name", "price"),
            ElementNode::new("select").with_attr("id", "beds").with_attr("name", "bedrooms").with_children(vec![
                ElementNode::new("option").with_attr("value", "studio").with_text("Studio"),
                ElementNode::new("option").with_attr("value", "1").with_text("1"),
            ]),
            ElementNode::new("label").with_children(vec![
                ElementNode::input("checkbox").with_attr("id", "pool"),
                ElementNode::new("span").with_text("Pool"),
            ]),
            ElementNode::input("checkbox").with_attr("id", "gym").with_attr("value", "gym").with_attr("checked", ""),
        ]);
        DomTree::new("https://www.bayut.com/post-ad", root)
    }

    #[tokio::test(start_paused = true)]
    async fn test_bayut_fills_fields_and_choices() {
        let mut dom = bayut_form();
        let mut payload = listing();
        payload.theme = Some(Theme {
            contact_line: Some("Call Axis Realty".into()),
            ..Default::default()
        });

        let report = SiteAdapter::Bayut.apply(&mut dom, &payload, &context()).await.unwrap();

        let title = dom.find_by_id("title").unwrap();
        assert_eq!(dom.value(title), "Marina view 2BR");
        assert_eq!(dom.events_for(title), vec!["input", "change", "blur"]);
        assert_eq!(dom.value(dom.find_by_id("price").unwrap()), "1850000");
        assert_eq!(dom.value(dom.find_by_id("beds").unwrap()), "studio");
        assert_eq!(
            dom.value(dom.find_by_id("desc").unwrap()),
            "Bright apartment.\n\nCall Axis Realty"
        );

        assert_eq!(dom.events_for(dom.find_by_id("sale").unwrap()), vec!["click"]);
        assert!(dom.events_for(dom.find_by_id("rent").unwrap()).is_empty());
        assert_eq!(dom.events_for(dom.find_by_id("apartment").unwrap()), vec!["click"]);

        assert_eq!(
            report.filled_fields,
            vec![
                FieldType::Purpose,
                FieldType::PropertyType,
                FieldType::Title,
                FieldType::Description,
                FieldType::Price,
                FieldType::Bedrooms,
            ]
        );
        assert!(report.missing_fields.is_empty());
        assert_eq!(report.site, "bayut");
    }

    #[tokio::test(start_paused = true)]
    async fn test_choice_buttons_match_whole_labels_first() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("button").with_attr("id", "parent").with_text("Parent listing"),
            ElementNode::new("button").with_attr("id", "current").with_text("Current offers"),
            ElementNode::new("button").with_attr("id", "rent").with_text("Rent"),
            ElementNode::new("button").with_attr("id", "sale").with_text("Sale"),
            ElementNode::input("text").with_attr("id", "title").with_attr("name", "title_en"),
        ]);
        let mut dom = DomTree::new("https://www.bayut.com/post-ad", root);
        let mut payload = listing();
        payload.property.purpose = Some("rent".into());

        SiteAdapter::Bayut.apply(&mut dom, &payload, &context()).await.unwrap();

        assert_eq!(dom.events_for(dom.find_by_id("rent").unwrap()), vec!["click"]);
        assert!(dom.events_for(dom.find_by_id("parent").unwrap()).is_empty());
        assert!(dom.events_for(dom.find_by_id("current").unwrap()).is_empty());
        assert!(dom.events_for(dom.find_by_id("sale").unwrap()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_amenities_are_ticked_once() {
        let mut dom = bayut_form();
        let report = SiteAdapter::Bayut.apply(&mut dom, &listing(), &context()).await.unwrap();

        assert!(dom.is_checked(dom.find_by_id("pool").unwrap()).unwrap());
        let gym = dom.find_by_id("gym").unwrap();
        assert!(dom.is_checked(gym).unwrap());
        assert!(dom.events_for(gym).is_empty());
        assert_eq!(report.amenities, vec!["Gym".to_string(), "Pool".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_select_is_reported_missing() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("select").with_attr("name", "purpose").with_children(vec![
                ElementNode::new("option").with_attr("value", "rent").with_text("Rent"),
            ]),
            ElementNode::input("text").with_attr("name", "title"),
        ]);
        let mut dom = DomTree::new("https://www.justproperty.com/list", root);
        let report = SiteAdapter::JustProperty.apply(&mut dom, &listing(), &context()).await.unwrap();

        assert!(report.missing_fields.contains(&FieldType::Purpose));
        assert!(report.missing_fields.contains(&FieldType::Price));
        assert_eq!(report.filled_fields, vec![FieldType::Title]);
        assert!(report.warnings[0].starts_with("No option matching 'sale'"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dubizzle_shadow_form_with_images() {
        let root = ElementNode::new("body").with_child(ElementNode::new("listing-form").with_shadow_root(vec![
            ElementNode::input("text").with_attr("id", "title").with_attr("name", "ad_title"),
            ElementNode::input("file").with_attr("id", "photos"),
        ]));
        let mut dom = DomTree::new("https://dubai.dubizzle.com/place-ad", root);
        let mut payload = listing();
        payload.property.images = vec![
            "https://cdn.example.com/600/a.jpg".into(),
            "https://cdn.example.com/600/b.jpg".into(),
            "https://cdn.example.com/300/small.jpg".into(),
            "https://cdn.example.com/600/c.jpg".into(),
            "https://cdn.example.com/missing/d.jpg".into(),
        ];

        let report = SiteAdapter::Dubizzle.apply(&mut dom, &payload, &context()).await.unwrap();

        assert_eq!(dom.value(dom.find_by_id("title").unwrap()), "Marina view 2BR");
        let photos = dom.find_by_id("photos").unwrap();
        assert_eq!(dom.files(photos), ["a.jpg", "b.jpg", "c.jpg"].map(String::from));
        assert_eq!(report.uploaded_count, 3);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings.iter().any(|w| w.contains("small.jpg")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_problems_are_not_fatal() {
        let root = ElementNode::new("body").with_child(ElementNode::input("text").with_attr("name", "listing[title]"));
        let mut dom = DomTree::new("https://www.propertyfinder.ae/new", root);
        let mut payload = listing();
        payload.property.images = vec!["https://cdn.example.com/1200/a.jpg".into()];

        let report = SiteAdapter::PropertyFinder.apply(&mut dom, &payload, &context()).await.unwrap();

        assert_eq!(report.uploaded_count, 0);
        assert!(report.warnings.iter().any(|w| w.contains("at least 5 required")));
        assert!(report.warnings.iter().any(|w| w == "No drop zone found"));
        assert!(report.filled_fields.contains(&FieldType::Title));
    }

    #[test]
    fn test_host_matches() {
        assert!(host_matches("www.bayut.com", "bayut.com"));
        assert!(host_matches("BAYUT.COM.", "bayut.com"));
        assert!(!host_matches("mybayut.com", "bayut.com"));
    }

    #[test]
    fn test_field_values() {
        let payload = listing();
        assert_eq!(
            field_values(&payload, FieldType::Bedrooms),
            Some(vec!["0".to_string(), "Studio".to_string()])
        );
        assert_eq!(field_values(&payload, FieldType::City), None);
        assert_eq!(field_values(&payload, FieldType::Purpose).unwrap()[0], "sale");
    }
}

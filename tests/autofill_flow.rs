//! Background → readiness handshake → content runtime → adapter, against an in-memory
//! listing page and a mock CRM.

use async_trait::async_trait;
use axis_autofill::config::ReadinessConfig;
use axis_autofill::{
    AdapterContext, AdapterRegistry, AutofillError, Background, ContentMessage, ContentResponse, ContentRuntime,
    DomTree, ElementNode, EngineConfig, ErrorCode, ExtensionContext, HttpImageFetcher, MemoryStorage, PageDom,
    Result, RuntimeMessage, SettingsPatch, TabHost, TabInfo,
};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A single tab showing `page`; the runtime only exists after injection
struct FixtureHost {
    url: String,
    page: Mutex<Option<DomTree>>,
    runtime: Mutex<Option<ContentRuntime<DomTree>>>,
    ctx: AdapterContext,
    /// Whether injection actually starts a runtime
    injectable: bool,
    injections: AtomicU32,
}

impl FixtureHost {
    fn new(page: DomTree, ctx: AdapterContext) -> Self {
        Self {
            url: page.location().unwrap_or_default(),
            page: Mutex::new(Some(page)),
            runtime: Mutex::new(None),
            ctx,
            injectable: true,
            injections: AtomicU32::new(0),
        }
    }

    async fn dom<R>(&self, f: impl FnOnce(&DomTree) -> R) -> R {
        let runtime = self.runtime.lock().await;
        match runtime.as_ref() {
            Some(runtime) => f(runtime.dom()),
            None => f(self.page.lock().await.as_ref().expect("page")),
        }
    }
}

#[async_trait]
impl TabHost for FixtureHost {
    async fn active_tab(&self) -> Result<TabInfo> {
        Ok(TabInfo::new("tab-1", self.url.clone()))
    }

    async fn inject_runtime(&self, _tab: &TabInfo) -> Result<()> {
        self.injections.fetch_add(1, Ordering::SeqCst);
        if !self.injectable {
            return Ok(());
        }
        let Some(page) = self.page.lock().await.take() else {
            return Ok(());
        };
        let mut runtime = ContentRuntime::new(page, AdapterRegistry::default(), self.ctx.clone());
        runtime.boot();
        *self.runtime.lock().await = Some(runtime);
        Ok(())
    }

    async fn send(&self, _tab: &TabInfo, message: ContentMessage) -> Result<ContentResponse> {
        let mut runtime = self.runtime.lock().await;
        match runtime.as_mut() {
            Some(runtime) => Ok(runtime.handle(message).await),
            None => Err(AutofillError::Communication(
                "Could not establish connection. Receiving end does not exist.".into(),
            )),
        }
    }
}

fn jpeg(side: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(side, side, image::Rgb([200, 180, 160]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Jpeg(80))
        .unwrap();
    bytes
}

fn justproperty_form() -> DomTree {
    let options = |values: &[&str]| {
        values
            .iter()
            .map(|v| ElementNode::new("option").with_attr("value", *v).with_text(*v))
            .collect::<Vec<_>>()
    };
    let root = ElementNode::new("body").with_child(ElementNode::new("form").with_children(vec![
        ElementNode::new("select").with_attr("id", "purpose").with_attr("name", "purpose").with_children(options(&["rent", "sale"])),
        ElementNode::new("select")
            .with_attr("id", "type")
            .with_attr("name", "property_type")
            .with_children(options(&["Apartment", "Villa"])),
        ElementNode::input("text").with_attr("id", "title").with_attr("name", "title"),
        ElementNode::new("textarea").with_attr("id", "description").with_attr("name", "description"),
        ElementNode::input("number").with_attr("id", "price").with_attr("name", "price"),
        ElementNode::new("select").with_attr("id", "beds").with_attr("name", "bedrooms").with_children(options(&["1", "2", "3"])),
        ElementNode::input("file").with_attr("id", "photos").with_attr("name", "photos").with_attr("multiple", ""),
    ]));
    DomTree::new("https://www.justproperty.com/en/listings/new", root)
}

fn engine_config() -> EngineConfig {
    EngineConfig {
        readiness: ReadinessConfig {
            ping_retries: 3,
            inject_settle_ms: 0,
            backoff_base_ms: 5,
            backoff_step_ms: 5,
            backoff_cap_ms: 20,
            ping_timeout_ms: 1000,
        },
        ..Default::default()
    }
}

async fn crm(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-1" })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/extension/theme/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "company_name": "Axis Realty",
            "contact_line": "Call Axis Realty on 800 2947"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/extension/properties/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 7,
                "title": "Palm villa with private beach",
                "description": "Five bedrooms on the frond.",
                "purpose": "sale",
                "property_type": "Villa",
                "price": 12500000.0,
                "bedrooms": 3,
                "images": [
                    format!("{}/img/front.jpg", server.uri()),
                    format!("{}/img/pool.jpg", server.uri()),
                    format!("{}/img/missing.jpg", server.uri())
                ]
            },
            { "id": 8, "title": "Studio in JVC" }
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/img/(front|pool)\.jpg$"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(jpeg(700)),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

fn adapter_context(config: &EngineConfig) -> AdapterContext {
    let fetcher = Arc::new(HttpImageFetcher::new(Duration::from_secs(5)).unwrap());
    AdapterContext::from_config(fetcher, config)
}

#[tokio::test]
async fn test_sync_select_and_autofill() {
    let server = MockServer::start().await;
    crm(&server).await;

    let config = engine_config();
    let host = Arc::new(FixtureHost::new(justproperty_form(), adapter_context(&config)));
    let ctx = Arc::new(ExtensionContext::new(Arc::new(MemoryStorage::new())));
    let background = Background::new(ctx, host.clone(), &config);

    let response = background
        .handle(RuntimeMessage::UpdateSettings {
            settings: SettingsPatch {
                base_url: Some(server.uri()),
                ..Default::default()
            },
        })
        .await;
    assert!(response.success);

    let response = background.handle(RuntimeMessage::SyncData).await;
    assert!(response.success, "{:?}", response.error);
    assert_eq!(response.message.as_deref(), Some("Synced 2 properties"));

    let response = background
        .handle(RuntimeMessage::SetSelectedProperty {
            property_id: Some("7".into()),
        })
        .await;
    assert!(response.success);

    let response = background.handle(RuntimeMessage::AutofillActiveTab { site: None }).await;
    assert!(response.success, "{:?}", response);
    assert_eq!(host.injections.load(Ordering::SeqCst), 1);

    let reply = response.autofill.expect("autofill reply");
    assert_eq!(reply.site.as_deref(), Some("justproperty"));
    assert_eq!(reply.uploaded_count, 2);
    assert!(reply.warnings.iter().any(|w| w.contains("missing.jpg")), "{:?}", reply.warnings);

    host.dom(|dom| {
        let value = |id: &str| dom.value(dom.find_by_id(id).unwrap()).to_string();
        assert_eq!(value("purpose"), "sale");
        assert_eq!(value("type"), "Villa");
        assert_eq!(value("title"), "Palm villa with private beach");
        assert_eq!(
            value("description"),
            "Five bedrooms on the frond.\n\nCall Axis Realty on 800 2947"
        );
        assert_eq!(value("price"), "12500000");
        assert_eq!(value("beds"), "3");
        assert_eq!(dom.files(dom.find_by_id("photos").unwrap()), ["front.jpg", "pool.jpg"]);
    })
    .await;

    // The runtime is now resident: a second request skips injection
    let response = background.handle(RuntimeMessage::AutofillActiveTab { site: None }).await;
    assert!(response.success);
    assert_eq!(host.injections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_runtime_that_never_answers() {
    let config = engine_config();
    let mut host = FixtureHost::new(justproperty_form(), adapter_context(&config));
    host.injectable = false;
    let host = Arc::new(host);

    let ctx = Arc::new(ExtensionContext::new(Arc::new(MemoryStorage::new())));
    ctx.update(|s| {
        s.replace_properties(vec![axis_autofill::PropertyRecord::new("1", "Loft")]);
        s.selected_property_id = Some("1".into());
    })
    .await
    .unwrap();

    let background = Background::new(ctx, host.clone(), &config);
    let response = background.handle(RuntimeMessage::AutofillActiveTab { site: None }).await;

    assert!(!response.success);
    assert_eq!(response.error_code(), Some(ErrorCode::ContentScriptNotReady));
    assert_eq!(
        response.message.as_deref(),
        Some("Content script not ready. Refresh the page and try again.")
    );
    assert_eq!(host.injections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_browser_internal_page_is_refused() {
    let config = engine_config();
    let mut page = justproperty_form();
    page.set_location("chrome://extensions");
    let host = Arc::new(FixtureHost::new(page, adapter_context(&config)));

    let ctx = Arc::new(ExtensionContext::new(Arc::new(MemoryStorage::new())));
    ctx.update(|s| {
        s.replace_properties(vec![axis_autofill::PropertyRecord::new("1", "Loft")]);
        s.selected_property_id = Some("1".into());
    })
    .await
    .unwrap();
    let background = Background::new(ctx, host.clone(), &config);

    let response = background.handle(RuntimeMessage::AutofillActiveTab { site: None }).await;
    assert_eq!(response.error_code(), Some(ErrorCode::UnsupportedSite));

    let response = background
        .handle(RuntimeMessage::AutofillActiveTab {
            site: Some("bayut".into()),
        })
        .await;
    assert_eq!(response.error_code(), Some(ErrorCode::ContentScriptNotReady));
    assert_eq!(host.injections.load(Ordering::SeqCst), 0);
}

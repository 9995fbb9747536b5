//! Semantic field location
//!
//! Each logical field has an ordered list of candidate selectors, most specific first.
//! The first selector that matches wins. With shadow search enabled, shadow roots of the
//! document are searched level by level, two levels deep.

use crate::dom::{NodeId, PageDom, Scope};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical form fields understood by every adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Title,
    Description,
    Price,
    Bedrooms,
    Bathrooms,
    Size,
    Address,
    City,
    Community,
    Reference,
    PropertyType,
    Purpose,
}

impl FieldType {
    pub const ALL: [FieldType; 12] = [
        FieldType::Title,
        FieldType::Description,
        FieldType::Price,
        FieldType::Bedrooms,
        FieldType::Bathrooms,
        FieldType::Size,
        FieldType::Address,
        FieldType::City,
        FieldType::Community,
        FieldType::Reference,
        FieldType::PropertyType,
        FieldType::Purpose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Title => "title",
            FieldType::Description => "description",
            FieldType::Price => "price",
            FieldType::Bedrooms => "bedrooms",
            FieldType::Bathrooms => "bathrooms",
            FieldType::Size => "size",
            FieldType::Address => "address",
            FieldType::City => "city",
            FieldType::Community => "community",
            FieldType::Reference => "reference",
            FieldType::PropertyType => "property_type",
            FieldType::Purpose => "purpose",
        }
    }

    /// Generic fallback selectors for this field
    pub fn selectors(&self) -> &'static [&'static str] {
        match self {
            FieldType::Title => &[
                "input[name='title']",
                "input#title",
                "input[name*='title' i]",
                "input[id*='title' i]",
                "input[placeholder*='title' i]",
                "input[aria-label*='title' i]",
            ],
            FieldType::Description => &[
                "textarea[name='description']",
                "textarea#description",
                "textarea[name*='desc' i]",
                "textarea[id*='desc' i]",
                "[contenteditable='true'][aria-label*='description' i]",
                "textarea[placeholder*='describe' i]",
                "textarea[aria-label*='description' i]",
            ],
            FieldType::Price => &[
                "input[name='price']",
                "input#price",
                "input[name*='price' i]",
                "input[id*='price' i]",
                "input[data-testid*='price' i]",
                "input[placeholder*='price' i]",
                "input[aria-label*='price' i]",
            ],
            FieldType::Bedrooms => &[
                "select[name='bedrooms']",
                "input[name='bedrooms']",
                "select[name*='bed' i]",
                "input[name*='bed' i]",
                "select[id*='bed' i]",
                "input[id*='bed' i]",
                "input[placeholder*='bedroom' i]",
                "[aria-label*='bedroom' i]",
            ],
            FieldType::Bathrooms => &[
                "select[name='bathrooms']",
                "input[name='bathrooms']",
                "select[name*='bath' i]",
                "input[name*='bath' i]",
                "select[id*='bath' i]",
                "input[id*='bath' i]",
                "input[placeholder*='bathroom' i]",
                "[aria-label*='bathroom' i]",
            ],
            FieldType::Size => &[
                "input[name='size']",
                "input[name='area']",
                "input[name*='size' i]",
                "input[name*='area' i]",
                "input[id*='size' i]",
                "input[placeholder*='sqft' i]",
                "input[placeholder*='area' i]",
                "input[aria-label*='size' i]",
            ],
            FieldType::Address => &[
                "input[name='address']",
                "input#address",
                "input[name*='address' i]",
                "input[autocomplete='street-address']",
                "input[placeholder*='address' i]",
                "input[aria-label*='address' i]",
            ],
            FieldType::City => &[
                "select[name='city']",
                "input[name='city']",
                "select[name*='city' i]",
                "input[name*='city' i]",
                "input[placeholder*='city' i]",
                "[aria-label*='city' i]",
            ],
            FieldType::Community => &[
                "input[name='community']",
                "input[name*='community' i]",
                "input[name*='location' i]",
                "input[placeholder*='community' i]",
                "input[placeholder*='location' i]",
                "input[aria-label*='location' i]",
            ],
            FieldType::Reference => &[
                "input[name='reference']",
                "input[name*='reference' i]",
                "input[name*='ref_no' i]",
                "input[id*='reference' i]",
                "input[placeholder*='reference' i]",
            ],
            FieldType::PropertyType => &[
                "select[name='property_type']",
                "select[name*='type' i]",
                "select[id*='type' i]",
                "[aria-label*='property type' i]",
            ],
            FieldType::Purpose => &[
                "select[name='purpose']",
                "select[name*='purpose' i]",
                "select[name*='category' i]",
                "[aria-label*='purpose' i]",
            ],
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn first_match<D: PageDom + ?Sized>(dom: &D, scope: Scope, selectors: &[&str]) -> Option<NodeId> {
    for selector in selectors {
        match dom.query(scope, selector) {
            Ok(Some(node)) => return Some(node),
            Ok(None) => {}
            Err(e) => log::debug!("Skipping selector '{}': {}", selector, e),
        }
    }
    None
}

/// Find the first element matching `selectors` in priority order.
///
/// The document is searched first. With `search_shadow_dom`, shadow roots attached to
/// document elements are searched next, then shadow roots nested one level inside those.
/// Deeper nesting is not searched. Never fails: unusable selectors are skipped.
pub fn locate_with<D: PageDom + ?Sized>(dom: &D, selectors: &[&str], search_shadow_dom: bool) -> Option<NodeId> {
    if let Some(node) = first_match(dom, Scope::Document, selectors) {
        return Some(node);
    }
    if !search_shadow_dom {
        return None;
    }

    let outer_hosts = dom.shadow_hosts(Scope::Document).unwrap_or_default();
    for &host in &outer_hosts {
        if let Some(node) = first_match(dom, Scope::Shadow(host), selectors) {
            log::trace!("Found element in shadow root of {}", host);
            return Some(node);
        }
    }

    for &host in &outer_hosts {
        let nested = dom.shadow_hosts(Scope::Shadow(host)).unwrap_or_default();
        for inner in nested {
            if let Some(node) = first_match(dom, Scope::Shadow(inner), selectors) {
                log::trace!("Found element in nested shadow root of {}", inner);
                return Some(node);
            }
        }
    }

    None
}

/// Resolve a logical field to an element using the generic selector table
pub fn locate<D: PageDom + ?Sized>(dom: &D, field: FieldType, search_shadow_dom: bool) -> Option<NodeId> {
    locate_with(dom, field.selectors(), search_shadow_dom)
}

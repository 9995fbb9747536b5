//! Page access for the autofill engine
//!
//! Adapters never touch a browser directly. Everything they do to a listing page goes
//! through [`PageDom`], a small capability interface:
//! - scoped queries (document or one shadow root) and shadow-host enumeration
//! - reads (tag, attributes, text, visibility)
//! - writes (value, option selection, clicks, file assignment)
//! - synthetic events so the host page's framework observes each write
//!
//! [`DomTree`] is an in-memory implementation used by tests and offline fixtures;
//! `browser::ChromePage` implements the same interface over a live tab.

pub mod element;
pub mod selector;
pub mod tree;

pub use element::ElementNode;
pub use selector::SelectorList;
pub use tree::{DomTree, Reaction};

use crate::error::Result;
use crate::images::ImageFile;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to an element of the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Tree scope a query runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The light DOM of the document
    Document,
    /// The shadow root attached to the given host element
    Shadow(NodeId),
}

/// Synthetic events dispatched after writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEvent {
    Input,
    Change,
    Blur,
}

impl DomEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomEvent::Input => "input",
            DomEvent::Change => "change",
            DomEvent::Blur => "blur",
        }
    }
}

/// Drag-and-drop event phases, dispatched in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Enter,
    Over,
    Drop,
}

impl DragKind {
    pub fn name(&self) -> &'static str {
        match self {
            DragKind::Enter => "dragenter",
            DragKind::Over => "dragover",
            DragKind::Drop => "drop",
        }
    }
}

/// Capability interface over a listing page.
///
/// Queries return `Err(AutofillError::InvalidSelector)` for selectors the page cannot
/// evaluate; callers that iterate fallback lists are expected to skip those.
pub trait PageDom: Send {
    /// Current page URL
    fn location(&self) -> Result<String>;

    /// First element in `scope` matching `selector`, in document order
    fn query(&self, scope: Scope, selector: &str) -> Result<Option<NodeId>>;

    /// All elements in `scope` matching `selector`, in document order
    fn query_all(&self, scope: Scope, selector: &str) -> Result<Vec<NodeId>>;

    /// Elements in `scope` that carry a shadow root, in document order
    fn shadow_hosts(&self, scope: Scope) -> Result<Vec<NodeId>>;

    /// Lowercase tag name
    fn tag_name(&self, node: NodeId) -> Result<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>>;

    /// Whitespace-normalized text content
    fn text(&self, node: NodeId) -> Result<String>;

    fn is_visible(&self, node: NodeId) -> Result<bool>;

    /// Checked state of a checkbox or radio
    fn is_checked(&self, node: NodeId) -> Result<bool>;

    /// Set the value of an input or textarea without dispatching events
    fn set_value(&mut self, node: NodeId, value: &str) -> Result<()>;

    /// Select the option of a `<select>` whose value or label matches `wanted`
    /// (case-insensitive). Returns whether an option was found.
    fn select_option(&mut self, node: NodeId, wanted: &str) -> Result<bool>;

    fn click(&mut self, node: NodeId) -> Result<()>;

    fn dispatch_event(&mut self, node: NodeId, event: DomEvent) -> Result<()>;

    /// Dispatch a drag event carrying a data-transfer payload built from `files`
    fn dispatch_drag(&mut self, node: NodeId, kind: DragKind, files: &[ImageFile]) -> Result<()>;

    /// Replace the file list of an `<input type="file">` without dispatching events
    fn assign_files(&mut self, node: NodeId, files: &[ImageFile]) -> Result<()>;
}

/// Dispatch the events reactive frameworks listen for after a programmatic write
pub fn commit<D: PageDom + ?Sized>(dom: &mut D, node: NodeId) -> Result<()> {
    dom.dispatch_event(node, DomEvent::Input)?;
    dom.dispatch_event(node, DomEvent::Change)?;
    dom.dispatch_event(node, DomEvent::Blur)?;
    Ok(())
}

/// First element matching `selector` whose text contains one of `needles`
/// (case-insensitive). Invalid selectors yield `None`.
pub fn find_by_text<D: PageDom + ?Sized>(
    dom: &D,
    scope: Scope,
    selector: &str,
    needles: &[&str],
) -> Option<NodeId> {
    let candidates = match dom.query_all(scope, selector) {
        Ok(nodes) => nodes,
        Err(e) => {
            log::debug!("Skipping text search over '{}': {}", selector, e);
            return None;
        }
    };

    candidates.into_iter().find(|&node| {
        let text = dom.text(node).unwrap_or_default().to_lowercase();
        !text.is_empty() && needles.iter().any(|needle| text.contains(&needle.to_lowercase()))
    })
}

/// Best element matching `selector` across `scopes` for the first matching needle.
/// Exact (trimmed, case-insensitive) text beats containment; earlier needles beat later ones.
pub fn find_choice<D: PageDom + ?Sized>(dom: &D, scopes: &[Scope], selector: &str, needles: &[&str]) -> Option<NodeId> {
    let labelled: Vec<(NodeId, String)> = scopes
        .iter()
        .flat_map(|&scope| match dom.query_all(scope, selector) {
            Ok(nodes) => nodes,
            Err(e) => {
                log::debug!("Skipping choice search over '{}': {}", selector, e);
                Vec::new()
            }
        })
        .map(|node| (node, dom.text(node).unwrap_or_default().trim().to_lowercase()))
        .filter(|(_, text)| !text.is_empty())
        .collect();
    let needles: Vec<String> = needles
        .iter()
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .collect();

    let exact = needles
        .iter()
        .find_map(|needle| labelled.iter().find(|(_, text)| text == needle));
    exact
        .or_else(|| {
            needles
                .iter()
                .find_map(|needle| labelled.iter().find(|(_, text)| text.contains(needle.as_str())))
        })
        .map(|(node, _)| *node)
}

/// The document scope, followed by each first-level shadow root when `include_shadow`
pub fn scopes<D: PageDom + ?Sized>(dom: &D, include_shadow: bool) -> Vec<Scope> {
    let mut scopes = vec![Scope::Document];
    if include_shadow {
        scopes.extend(dom.shadow_hosts(Scope::Document).unwrap_or_default().into_iter().map(Scope::Shadow));
    }
    scopes
}

/// Whether the element carries a `disabled` attribute
pub fn is_disabled<D: PageDom + ?Sized>(dom: &D, node: NodeId) -> bool {
    matches!(dom.attribute(node, "disabled"), Ok(Some(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> DomTree {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("button").with_text("Cancel"),
            ElementNode::new("button").with_attr("id", "add").with_text("  Add Photos "),
            ElementNode::new("input").with_attr("id", "name").with_attr("disabled", ""),
        ]);
        DomTree::new("https://www.bayut.com/post", root)
    }

    #[test]
    fn test_find_by_text_is_case_insensitive() {
        let dom = page();
        let found = find_by_text(&dom, Scope::Document, "button", &["add photo"]);
        assert_eq!(found, dom.find_by_id("add"));
    }

    #[test]
    fn test_find_by_text_invalid_selector() {
        let dom = page();
        assert_eq!(find_by_text(&dom, Scope::Document, "button:has(span)", &["add"]), None);
    }

    #[test]
    fn test_find_choice_prefers_exact_text_and_needle_order() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("button").with_attr("id", "parent").with_text("Parent company"),
            ElementNode::new("button").with_attr("id", "for-sale").with_text("For sale"),
            ElementNode::new("button").with_attr("id", "rent").with_text(" Rent "),
            ElementNode::new("button").with_attr("id", "sale").with_text("Sale"),
        ]);
        let dom = DomTree::new("https://www.bayut.com/post", root);
        let doc = [Scope::Document];

        assert_eq!(find_choice(&dom, &doc, "button", &["rent"]), dom.find_by_id("rent"));
        assert_eq!(find_choice(&dom, &doc, "button", &["sale", "for sale"]), dom.find_by_id("sale"));
        assert_eq!(find_choice(&dom, &doc, "button", &["for sale", "sale"]), dom.find_by_id("for-sale"));
        // Containment only when nothing matches exactly
        assert_eq!(find_choice(&dom, &doc, "button", &["company"]), dom.find_by_id("parent"));
        assert_eq!(find_choice(&dom, &doc, "button", &["lease"]), None);
    }

    #[test]
    fn test_commit_dispatches_input_change_blur() {
        let mut dom = page();
        let name = dom.find_by_id("name").unwrap();
        commit(&mut dom, name).unwrap();
        assert_eq!(dom.events_for(name), vec!["input", "change", "blur"]);
    }

    #[test]
    fn test_is_disabled() {
        let dom = page();
        assert!(is_disabled(&dom, dom.find_by_id("name").unwrap()));
        assert!(!is_disabled(&dom, dom.find_by_id("add").unwrap()));
    }
}

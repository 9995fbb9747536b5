use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declarative description of an element, used to build [`DomTree`](super::DomTree) fixtures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementNode {
    /// HTML tag name (e.g., "div", "button", "input")
    pub tag_name: String,

    /// Element attributes (e.g., id, class, name, placeholder)
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Own text content of the element
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,

    /// Light DOM children
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementNode>,

    /// Children of an attached shadow root, if the element hosts one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_root: Option<Vec<ElementNode>>,

    /// Whether the element renders (hidden inputs behind buttons set this to false)
    #[serde(default = "default_visible")]
    pub is_visible: bool,
}

fn default_visible() -> bool {
    true
}

impl ElementNode {
    /// Create a new visible ElementNode
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: HashMap::new(),
            text_content: None,
            children: Vec::new(),
            shadow_root: None,
            is_visible: true,
        }
    }

    /// Builder method: set attributes
    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Builder method: add one attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_attribute(key, value);
        self
    }

    /// Builder method: set text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    /// Builder method: set children
    pub fn with_children(mut self, children: Vec<ElementNode>) -> Self {
        self.children = children;
        self
    }

    /// Builder method: append one child
    pub fn with_child(mut self, child: ElementNode) -> Self {
        self.children.push(child);
        self
    }

    /// Builder method: attach a shadow root holding `children`
    pub fn with_shadow_root(mut self, children: Vec<ElementNode>) -> Self {
        self.shadow_root = Some(children);
        self
    }

    /// Builder method: set visibility
    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.is_visible = visible;
        self
    }

    /// Add a single attribute
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Add a child element
    pub fn add_child(&mut self, child: ElementNode) {
        self.children.push(child);
    }

    /// Get attribute value by key
    pub fn get_attribute(&self, key: &str) -> Option<&String> {
        self.attributes.get(key)
    }

    /// Check if element has a specific class
    pub fn has_class(&self, class_name: &str) -> bool {
        self.attributes
            .get("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class_name))
    }

    /// Get element ID
    pub fn id(&self) -> Option<&String> {
        self.attributes.get("id")
    }

    /// Check if element is a specific tag
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    /// Shorthand for a `<input>` with the given type
    pub fn input(input_type: &str) -> Self {
        Self::new("input").with_attr("type", input_type)
    }

    /// Number of elements in this subtree, shadow roots included
    pub fn count_elements(&self) -> usize {
        let shadow = self
            .shadow_root
            .as_ref()
            .map_or(0, |children| children.iter().map(ElementNode::count_elements).sum());
        1 + shadow + self.children.iter().map(ElementNode::count_elements).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_node_creation() {
        let mut attrs = HashMap::new();
        attrs.insert("id".to_string(), "price".to_string());
        attrs.insert("class".to_string(), "form-control numeric".to_string());

        let element = ElementNode::new("input")
            .with_attributes(attrs)
            .with_visibility(false);

        assert!(element.is_tag("INPUT"));
        assert_eq!(element.id(), Some(&"price".to_string()));
        assert!(element.has_class("numeric"));
        assert!(!element.has_class("form"));
        assert!(!element.is_visible);
    }

    #[test]
    fn test_shadow_root_counts() {
        let host = ElementNode::new("listing-form")
            .with_shadow_root(vec![ElementNode::input("text"), ElementNode::input("number")])
            .with_child(ElementNode::new("span"));

        assert_eq!(host.count_elements(), 4);
    }

    #[test]
    fn test_deserialize_defaults_visible() {
        let element: ElementNode = serde_json::from_str(r#"{"tag_name": "div"}"#).unwrap();
        assert!(element.is_visible);
        assert!(element.shadow_root.is_none());
    }
}

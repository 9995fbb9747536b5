use crate::dom::element::ElementNode;
use crate::dom::selector::{Matchable, SelectorList};
use crate::dom::{DomEvent, DragKind, NodeId, PageDom, Scope};
use crate::error::{AutofillError, Result};
use crate::images::ImageFile;
use std::collections::HashMap;

/// Scripted page behaviour, run when a click or a file change hits a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Make a hidden node visible
    Show(NodeId),
    /// Hide a node
    Hide(NodeId),
    /// Remove a node (and its subtree) from the page
    Detach(NodeId),
    /// Re-insert a previously detached node
    Attach(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Trigger {
    Click,
    Files,
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attributes: HashMap<String, String>,
    text: String,
    children: Vec<NodeId>,
    shadow_children: Option<Vec<NodeId>>,
    parent: Option<NodeId>,
    /// Host element for nodes at the top of a shadow root
    host: Option<NodeId>,
    visible: bool,
    attached: bool,
    value: String,
    checked: bool,
    files: Vec<String>,
}

/// In-memory page implementing [`PageDom`].
///
/// Built from an [`ElementNode`] description; records every event, click, drop and file
/// assignment so tests can assert on what an adapter did to the page.
#[derive(Debug, Clone)]
pub struct DomTree {
    url: String,
    nodes: Vec<Node>,
    root: NodeId,
    events: Vec<(NodeId, String)>,
    uploads: Vec<(NodeId, Vec<String>)>,
    drops: Vec<(NodeId, Vec<String>)>,
    reactions: HashMap<(NodeId, Trigger), Vec<Reaction>>,
}

#[derive(Clone, Copy)]
struct NodeRef<'a> {
    tree: &'a DomTree,
    id: NodeId,
}

impl<'a> Matchable for NodeRef<'a> {
    fn tag(&self) -> &str {
        &self.tree.nodes[self.id.0].tag
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.tree.nodes[self.id.0].attributes.get(name).map(String::as_str)
    }

    fn parent(&self) -> Option<Self> {
        self.tree.nodes[self.id.0].parent.map(|id| NodeRef { tree: self.tree, id })
    }
}

impl DomTree {
    /// Build a page at `url` whose document element is `root`
    pub fn new(url: impl Into<String>, root: ElementNode) -> Self {
        let mut tree = Self {
            url: url.into(),
            nodes: Vec::with_capacity(root.count_elements()),
            root: NodeId(0),
            events: Vec::new(),
            uploads: Vec::new(),
            drops: Vec::new(),
            reactions: HashMap::new(),
        };
        tree.root = tree.insert(root, None, None);
        tree
    }

    fn insert(&mut self, element: ElementNode, parent: Option<NodeId>, host: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let attributes: HashMap<String, String> = element
            .attributes
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        let value = attributes.get("value").cloned().unwrap_or_default();
        let checked = attributes.contains_key("checked");

        self.nodes.push(Node {
            tag: element.tag_name.to_lowercase(),
            attributes,
            text: element.text_content.unwrap_or_default(),
            children: Vec::new(),
            shadow_children: None,
            parent,
            host,
            visible: element.is_visible,
            attached: true,
            value,
            checked,
            files: Vec::new(),
        });

        if let Some(shadow) = element.shadow_root {
            let ids = shadow.into_iter().map(|child| self.insert(child, None, Some(id))).collect();
            self.nodes[id.0].shadow_children = Some(ids);
        }

        let children = element
            .children
            .into_iter()
            .map(|child| self.insert(child, Some(id), None))
            .collect();
        self.nodes[id.0].children = children;

        id
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        match self.nodes.get(id.0) {
            Some(node) if self.is_attached(id) => Ok(node),
            _ => Err(AutofillError::StaleNode(id.0)),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        if !self.is_attached(id) {
            return Err(AutofillError::StaleNode(id.0));
        }
        Ok(&mut self.nodes[id.0])
    }

    /// Attached means the node and all its ancestors (across shadow hosts) are attached
    fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            let Some(node) = self.nodes.get(c.0) else {
                return false;
            };
            if !node.attached {
                return false;
            }
            current = node.parent.or(node.host);
        }
        true
    }

    fn scope_roots(&self, scope: Scope) -> Result<Vec<NodeId>> {
        match scope {
            Scope::Document => Ok(vec![self.root]),
            Scope::Shadow(host) => Ok(self.node(host)?.shadow_children.clone().unwrap_or_default()),
        }
    }

    /// Attached nodes of a tree scope in document order, not entering shadow roots
    fn scope_nodes(&self, scope: Scope) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.scope_roots(scope)?.into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if !node.attached {
                continue;
            }
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(out)
    }

    fn run_reactions(&mut self, node: NodeId, trigger: Trigger) {
        let Some(reactions) = self.reactions.get(&(node, trigger)).cloned() else {
            return;
        };
        for reaction in reactions {
            match reaction {
                Reaction::Show(id) => self.nodes[id.0].visible = true,
                Reaction::Hide(id) => self.nodes[id.0].visible = false,
                Reaction::Detach(id) => self.nodes[id.0].attached = false,
                Reaction::Attach(id) => self.nodes[id.0].attached = true,
            }
        }
    }

    fn toggle(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.0];
        let is_radio = node.attributes.get("type").is_some_and(|t| t.eq_ignore_ascii_case("radio"));
        node.checked = is_radio || !node.checked;
    }

    fn is_checkable(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.0];
        node.tag == "input"
            && node
                .attributes
                .get("type")
                .is_some_and(|t| t.eq_ignore_ascii_case("checkbox") || t.eq_ignore_ascii_case("radio"))
    }

    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0].children.iter().rev().copied().collect();
        while let Some(c) = stack.pop() {
            if !self.nodes[c.0].attached {
                continue;
            }
            out.push(c);
            stack.extend(self.nodes[c.0].children.iter().rev().copied());
        }
        out
    }

    /// Register a scripted reaction to clicks on `node`
    pub fn on_click(&mut self, node: NodeId, reaction: Reaction) {
        self.reactions.entry((node, Trigger::Click)).or_default().push(reaction);
    }

    /// Register a scripted reaction to `change` events on a file input holding files
    pub fn on_files(&mut self, node: NodeId, reaction: Reaction) {
        self.reactions.entry((node, Trigger::Files)).or_default().push(reaction);
    }

    /// Find any node (light or shadow DOM, attached or not) by its `id` attribute
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.attributes.get("id").is_some_and(|v| v == id))
            .map(NodeId)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn value(&self, node: NodeId) -> &str {
        &self.nodes[node.0].value
    }

    /// File names currently assigned to an input
    pub fn files(&self, node: NodeId) -> &[String] {
        &self.nodes[node.0].files
    }

    /// Event names dispatched at `node`, in order
    pub fn events_for(&self, node: NodeId) -> Vec<&str> {
        self.events
            .iter()
            .filter(|(n, _)| *n == node)
            .map(|(_, name)| name.as_str())
            .collect()
    }

    /// Every file assignment: target input and file names
    pub fn upload_history(&self) -> &[(NodeId, Vec<String>)] {
        &self.uploads
    }

    /// Every completed drop: target zone and file names
    pub fn drop_history(&self) -> &[(NodeId, Vec<String>)] {
        &self.drops
    }

    pub fn set_location(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }
}

fn parse_selector(selector: &str) -> Result<SelectorList> {
    SelectorList::parse(selector).map_err(|e| {
        log::trace!("Rejected selector: {}", e);
        AutofillError::InvalidSelector(selector.to_string())
    })
}

impl PageDom for DomTree {
    fn location(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    fn query(&self, scope: Scope, selector: &str) -> Result<Option<NodeId>> {
        let list = parse_selector(selector)?;
        Ok(self
            .scope_nodes(scope)?
            .into_iter()
            .find(|&id| list.matches(NodeRef { tree: self, id })))
    }

    fn query_all(&self, scope: Scope, selector: &str) -> Result<Vec<NodeId>> {
        let list = parse_selector(selector)?;
        Ok(self
            .scope_nodes(scope)?
            .into_iter()
            .filter(|&id| list.matches(NodeRef { tree: self, id }))
            .collect())
    }

    fn shadow_hosts(&self, scope: Scope) -> Result<Vec<NodeId>> {
        Ok(self
            .scope_nodes(scope)?
            .into_iter()
            .filter(|id| self.nodes[id.0].shadow_children.is_some())
            .collect())
    }

    fn tag_name(&self, node: NodeId) -> Result<String> {
        Ok(self.node(node)?.tag.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>> {
        Ok(self.node(node)?.attributes.get(&name.to_lowercase()).cloned())
    }

    fn text(&self, node: NodeId) -> Result<String> {
        let own = &self.node(node)?.text;
        let parts = std::iter::once(own.as_str())
            .chain(self.descendants(node).into_iter().map(|d| self.nodes[d.0].text.as_str()));
        Ok(parts
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn is_visible(&self, node: NodeId) -> Result<bool> {
        self.node(node)?;
        let mut current = Some(node);
        while let Some(c) = current {
            let n = &self.nodes[c.0];
            if !n.visible {
                return Ok(false);
            }
            current = n.parent.or(n.host);
        }
        Ok(true)
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> Result<()> {
        self.node_mut(node)?.value = value.to_string();
        Ok(())
    }

    fn select_option(&mut self, node: NodeId, wanted: &str) -> Result<bool> {
        if self.node(node)?.tag != "select" {
            return Ok(false);
        }
        let wanted = wanted.trim();
        let options: Vec<(String, String)> = self
            .descendants(node)
            .into_iter()
            .filter(|o| self.nodes[o.0].tag == "option")
            .map(|o| {
                let opt = &self.nodes[o.0];
                let label = opt.text.trim().to_string();
                let value = opt.attributes.get("value").cloned().unwrap_or_else(|| label.clone());
                (value, label)
            })
            .collect();

        let chosen = options
            .iter()
            .find(|(value, _)| value.eq_ignore_ascii_case(wanted))
            .or_else(|| options.iter().find(|(_, label)| label.eq_ignore_ascii_case(wanted)));

        match chosen {
            Some((value, _)) => {
                self.nodes[node.0].value = value.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn is_checked(&self, node: NodeId) -> Result<bool> {
        Ok(self.node(node)?.checked)
    }

    fn click(&mut self, node: NodeId) -> Result<()> {
        self.node(node)?;
        self.events.push((node, "click".to_string()));

        if self.is_checkable(node) {
            self.toggle(node);
        } else if self.nodes[node.0].tag == "label" {
            let target = match self.nodes[node.0].attributes.get("for").cloned() {
                Some(for_id) => self.find_by_id(&for_id),
                None => self.descendants(node).into_iter().find(|&d| self.is_checkable(d)),
            };
            if let Some(target) = target.filter(|&t| self.is_checkable(t)) {
                self.toggle(target);
            }
        }

        self.run_reactions(node, Trigger::Click);
        Ok(())
    }

    fn dispatch_event(&mut self, node: NodeId, event: DomEvent) -> Result<()> {
        let has_files = !self.node(node)?.files.is_empty();
        self.events.push((node, event.name().to_string()));
        if event == DomEvent::Change && has_files {
            self.run_reactions(node, Trigger::Files);
        }
        Ok(())
    }

    fn dispatch_drag(&mut self, node: NodeId, kind: DragKind, files: &[ImageFile]) -> Result<()> {
        self.node(node)?;
        self.events.push((node, kind.name().to_string()));
        if kind == DragKind::Drop {
            self.drops.push((node, files.iter().map(|f| f.name.clone()).collect()));
        }
        Ok(())
    }

    fn assign_files(&mut self, node: NodeId, files: &[ImageFile]) -> Result<()> {
        let target = self.node(node)?;
        let is_file_input =
            target.tag == "input" && target.attributes.get("type").is_some_and(|t| t.eq_ignore_ascii_case("file"));
        if !is_file_input {
            return Err(AutofillError::ElementNotFound(format!("{} is not a file input", node)));
        }

        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        self.nodes[node.0].files = names.clone();
        self.uploads.push((node, names));
        Ok(())
    }
}

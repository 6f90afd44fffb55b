//! Structural edits on a parsed `scraper::Html` tree.
//!
//! Selections borrow the document immutably, so callers collect `NodeId`s
//! first and apply the edits below afterwards.

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Node, Selector};

/// Replaces the node with its children, preserving document order.
pub fn unwrap_node(document: &mut Html, id: NodeId) {
    let children = match document.tree.get(id) {
        Some(node) => node.children().map(|child| child.id()).collect::<Vec<_>>(),
        None => return,
    };
    let Some(mut node) = document.tree.get_mut(id) else {
        return;
    };
    if node.parent().is_none() {
        return;
    }
    for child in children {
        node.insert_id_before(child);
    }
    node.detach();
}

/// Detaches the node and its whole subtree.
pub fn remove_node(document: &mut Html, id: NodeId) {
    if let Some(mut node) = document.tree.get_mut(id) {
        node.detach();
    }
}

/// Matches only nodes still attached under the root element; detached
/// subtrees stay in the arena and must not be picked up again.
pub fn select_ids(document: &Html, selector: &Selector) -> Vec<NodeId> {
    document
        .root_element()
        .select(selector)
        .map(|element| element.id())
        .collect()
}

pub fn element_name(document: &Html, id: NodeId) -> Option<&str> {
    match document.tree.get(id)?.value() {
        Node::Element(element) => Some(element.name()),
        _ => None,
    }
}

pub fn attribute<'a>(document: &'a Html, id: NodeId, name: &str) -> Option<&'a str> {
    ElementRef::wrap(document.tree.get(id)?)?.value().attr(name)
}

/// Nearest preceding sibling element with the given tag name.
pub fn previous_sibling_named(document: &Html, id: NodeId, name: &str) -> Option<NodeId> {
    document
        .tree
        .get(id)?
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == name)
        .map(|element| element.id())
}

/// Nearest following sibling element with the given tag name.
pub fn next_sibling_named(document: &Html, id: NodeId, name: &str) -> Option<NodeId> {
    document
        .tree
        .get(id)?
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == name)
        .map(|element| element.id())
}

pub fn outer_html(document: &Html, id: NodeId) -> Option<String> {
    ElementRef::wrap(document.tree.get(id)?).map(|element| element.html())
}

pub fn text_content(document: &Html, id: NodeId) -> Option<String> {
    ElementRef::wrap(document.tree.get(id)?).map(|element| element.text().collect::<String>())
}

/// Compiles a selector that is known at build time.
pub(crate) fn selector(source: &str) -> Selector {
    match Selector::parse(source) {
        Ok(selector) => selector,
        Err(error) => panic!("invalid built-in selector `{source}`: {error}"),
    }
}

//! Rich-text document tree utilities.
//!
//! Documents arrive as parsed editor JSON: every node is an object with a
//! `type` tag, optional `attrs`, optional inline `text` and optional children
//! under `content`. Anything that is not an object at the root is treated as
//! an empty document, never as an error.

use std::collections::HashSet;
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const TEXT_NODE: &str = "text";
const HARD_BREAK_NODE: &str = "hardBreak";
const IMAGE_NODE: &str = "image";

type Node = Map<String, Value>;

/// The recognized attributes of an image node.
///
/// `file_path` is the storage path of the uploaded object and the only field
/// used to decide which stored objects are still referenced. `src` may be a
/// public or external URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

impl ImageAttrs {
    /// Project an `attrs` map onto the recognized fields. Non-string values
    /// count as absent.
    fn project(attrs: Option<&Node>) -> Self {
        let field = |key: &str| {
            attrs
                .and_then(|a| a.get(key))
                .and_then(Value::as_str)
                .map(str::to_owned)
        };

        Self {
            src: field("src"),
            file_path: field("filePath"),
            alt: field("alt"),
        }
    }
}

fn node_type(node: &Node) -> Option<&str> {
    node.get("type").and_then(Value::as_str)
}

fn node_attrs(node: &Node) -> Option<&Node> {
    node.get("attrs").and_then(Value::as_object)
}

/// Visit every node of the tree depth-first, parent before children and
/// children in document order. Returns the value the visitor broke with, if
/// any.
///
/// Uses an explicit stack so deeply nested input cannot exhaust the call stack.
fn walk<'a, B>(root: &'a Value, mut visit: impl FnMut(&'a Node) -> ControlFlow<B>) -> Option<B> {
    let mut stack: Vec<&'a Node> = match root.as_object() {
        Some(node) => vec![node],
        None => return None,
    };

    while let Some(node) = stack.pop() {
        if let ControlFlow::Break(found) = visit(node) {
            return Some(found);
        }

        if let Some(children) = node.get("content").and_then(Value::as_array) {
            stack.extend(children.iter().rev().filter_map(Value::as_object));
        }
    }

    None
}

/// Concatenate the text of every text node, with a newline for each hard
/// break.
pub fn extract_plain_text(root: &Value) -> String {
    let mut text = String::new();

    walk(root, |node| {
        match node_type(node) {
            Some(TEXT_NODE) => {
                if let Some(fragment) = node.get("text").and_then(Value::as_str) {
                    text.push_str(fragment);
                }
            }
            Some(HARD_BREAK_NODE) => text.push('\n'),
            _ => {}
        }
        ControlFlow::<()>::Continue(())
    });

    text
}

/// Attributes of the first image node in document order.
///
/// Stops at the first image; the rest of the tree is not visited.
pub fn find_first_image_attrs(root: &Value) -> Option<ImageAttrs> {
    walk(root, |node| {
        if node_type(node) == Some(IMAGE_NODE) {
            ControlFlow::Break(ImageAttrs::project(node_attrs(node)))
        } else {
            ControlFlow::Continue(())
        }
    })
}

/// Storage paths referenced by image nodes anywhere in the tree.
///
/// Only `filePath` values that are non-empty after trimming are collected,
/// in trimmed form, so a referenced object must be stored under the trimmed
/// name to be kept. `src` is ignored.
pub fn collect_image_file_paths(root: &Value) -> HashSet<String> {
    let mut paths = HashSet::new();

    walk(root, |node| {
        if node_type(node) == Some(IMAGE_NODE) {
            let file_path = node_attrs(node)
                .and_then(|attrs| attrs.get("filePath"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|path| !path.is_empty());

            if let Some(path) = file_path {
                paths.insert(path.to_string());
            }
        }
        ControlFlow::<()>::Continue(())
    });

    paths
}

/// Whether the document has no block content at all.
pub fn is_empty_document(root: &Value) -> bool {
    root.get("content")
        .and_then(Value::as_array)
        .is_none_or(|children| children.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image(src: Value, file_path: Value) -> Value {
        json!({ "type": "image", "attrs": { "src": src, "filePath": file_path, "alt": "diagram" } })
    }

    #[test]
    fn test_malformed_roots_are_empty() {
        let roots = [
            json!(null),
            json!(42),
            json!("doc"),
            json!(true),
            json!([{ "type": "text", "text": "x" }]),
        ];
        for root in roots {
            assert_eq!(extract_plain_text(&root), "");
            assert!(find_first_image_attrs(&root).is_none());
            assert!(collect_image_file_paths(&root).is_empty());
        }
    }

    #[test]
    fn test_extract_plain_text_with_hard_break() {
        let doc = json!({
            "type": "doc",
            "content": [
                { "type": "text", "text": "Hi" },
                { "type": "hardBreak" },
                { "type": "text", "text": "Bye" }
            ]
        });

        assert_eq!(extract_plain_text(&doc), "Hi\nBye");
    }

    #[test]
    fn test_extract_plain_text_nested_preorder() {
        let doc = json!({
            "type": "doc",
            "content": [
                { "type": "paragraph", "content": [
                    { "type": "text", "text": "One " },
                    { "type": "text", "text": "two" }
                ]},
                { "type": "paragraph", "content": [
                    { "type": "text", "text": "three" },
                    { "type": "image", "attrs": { "src": "x" } },
                    { "type": "text", "text": 7 }
                ]}
            ]
        });

        assert_eq!(extract_plain_text(&doc), "One twothree");
        assert_eq!(extract_plain_text(&json!({ "type": "doc" })), "");
    }

    #[test]
    fn test_find_first_image_returns_first_in_order() {
        let doc = json!({
            "type": "doc",
            "content": [
                { "type": "paragraph", "content": [
                    { "type": "text", "text": "intro" },
                    image(json!("https://cdn.example.com/a.png"), json!("blogs/1/a.png"))
                ]},
                image(json!("https://cdn.example.com/b.png"), json!("blogs/1/b.png"))
            ]
        });

        let attrs = find_first_image_attrs(&doc).unwrap();
        assert_eq!(attrs.src.as_deref(), Some("https://cdn.example.com/a.png"));
        assert_eq!(attrs.file_path.as_deref(), Some("blogs/1/a.png"));
        assert_eq!(attrs.alt.as_deref(), Some("diagram"));
    }

    #[test]
    fn test_find_first_image_ignores_non_string_attrs() {
        let doc = json!({
            "type": "doc",
            "content": [image(json!(12), json!({ "bucket": "x" }))]
        });

        let attrs = find_first_image_attrs(&doc).unwrap();
        assert_eq!(attrs.src, None);
        assert_eq!(attrs.file_path, None);
        assert_eq!(attrs.alt.as_deref(), Some("diagram"));

        let bare = json!({ "type": "doc", "content": [{ "type": "image" }] });
        assert_eq!(find_first_image_attrs(&bare), Some(ImageAttrs::default()));

        let none = json!({ "type": "doc", "content": [{ "type": "text", "text": "no images" }] });
        assert!(find_first_image_attrs(&none).is_none());
    }

    #[test]
    fn test_collect_file_paths_dedupes_and_skips_blank() {
        let doc = json!({
            "type": "doc",
            "content": [
                image(json!("https://cdn.example.com/a.png"), json!("blogs/1/a.png")),
                { "type": "paragraph", "content": [
                    image(json!("https://elsewhere.example.com/a.png"), json!("blogs/1/a.png"))
                ]},
                image(json!("https://cdn.example.com/c.png"), json!("   ")),
                image(json!("https://cdn.example.com/d.png"), json!(null)),
                { "type": "image" }
            ]
        });

        let paths = collect_image_file_paths(&doc);
        assert_eq!(paths.len(), 1);
        assert!(paths.contains("blogs/1/a.png"));
    }

    #[test]
    fn test_collect_file_paths_never_uses_src() {
        let doc = json!({
            "type": "doc",
            "content": [{ "type": "image", "attrs": { "src": "blogs/1/from-src.png" } }]
        });

        assert!(collect_image_file_paths(&doc).is_empty());
    }

    #[test]
    fn test_collect_file_paths_trims() {
        let doc = json!({
            "type": "doc",
            "content": [image(json!(null), json!("  blogs/1/a.png\n"))]
        });

        let paths = collect_image_file_paths(&doc);
        assert!(paths.contains("blogs/1/a.png"));
    }

    #[test]
    fn test_is_empty_document() {
        assert!(is_empty_document(&json!({ "type": "doc", "content": [] })));
        assert!(is_empty_document(&json!({ "type": "doc" })));
        assert!(is_empty_document(&json!(null)));
        let paragraph = json!({ "type": "doc", "content": [{ "type": "paragraph" }] });
        assert!(!is_empty_document(&paragraph));
    }
}

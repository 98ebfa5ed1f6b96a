//! Attribute snapshots.
//!
//! An [`AttributeSnapshot`] is the flattened, string-keyed view of one remote
//! object's observed state at a single point in time: the output of a SHOW or
//! DESCRIBE call serialized and flattened into dotted attribute paths.
//!
//! Internally the snapshot is a tree keyed by path segment; the dotted-string
//! form (`from_specification.0.path`, `columns.#`) is only the boundary
//! contract shared with the control plane's key convention. The `.#` suffix
//! resolves to the element count of a repeated block.
//!
//! Snapshots are immutable once built and discarded after evaluation.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde_json::Value;

/// A node in the snapshot tree.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Value(String),
    List(Vec<Node>),
    Object(BTreeMap<String, Node>),
}

/// Flattened observed state of one object instance.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSnapshot {
    root: Node,
}

impl AttributeSnapshot {
    /// An empty snapshot, for objects that could not be observed.
    pub fn empty() -> Self {
        Self {
            root: Node::Object(BTreeMap::new()),
        }
    }

    /// Builds a snapshot from dotted-path/value pairs.
    ///
    /// Numeric path segments are list indices; a `#` segment is the count
    /// entry for a repeated block and is accepted but not stored (counts are
    /// derived from the indexed entries, except that a `0` count materializes
    /// an empty list).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut builder = Builder::Object(BTreeMap::new());
        for (path, value) in pairs {
            let segments: Vec<&str> = path.as_ref().split('.').collect();
            builder.insert(&segments, value.into());
        }
        Self {
            root: builder.finalize(),
        }
    }

    /// Flattens a serialized model object into a snapshot.
    ///
    /// Nulls are treated as absent attributes, matching how the control plane
    /// reports unset optional fields. Scalars render in their canonical string
    /// form (`true`, `600`, `1.5`).
    pub fn from_json(value: &Value) -> Self {
        Self {
            root: Self::node_from_json(value).unwrap_or_else(|| Node::Object(BTreeMap::new())),
        }
    }

    fn node_from_json(value: &Value) -> Option<Node> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Node::Value(b.to_string())),
            Value::Number(n) => Some(Node::Value(n.to_string())),
            Value::String(s) => Some(Node::Value(s.clone())),
            Value::Array(items) => Some(Node::List(
                items.iter().filter_map(Self::node_from_json).collect(),
            )),
            Value::Object(fields) => Some(Node::Object(
                fields
                    .iter()
                    .filter_map(|(k, v)| Self::node_from_json(v).map(|n| (k.clone(), n)))
                    .collect(),
            )),
        }
    }

    /// Looks up a dotted attribute path.
    ///
    /// Returns `None` when the path does not resolve to a scalar value. A
    /// trailing `#` segment on a list path yields the element count.
    pub fn get(&self, path: &str) -> Option<Cow<'_, str>> {
        let mut node = &self.root;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            match node {
                Node::Object(fields) => {
                    node = fields.get(segment)?;
                }
                Node::List(items) => {
                    if segment == "#" {
                        // Counts are leaves; anything after `#` is malformed.
                        if segments.peek().is_some() {
                            return None;
                        }
                        return Some(Cow::Owned(items.len().to_string()));
                    }
                    let index: usize = segment.parse().ok()?;
                    node = items.get(index)?;
                }
                Node::Value(_) => return None,
            }
        }
        match node {
            Node::Value(v) => Some(Cow::Borrowed(v)),
            Node::List(_) | Node::Object(_) => None,
        }
    }

    /// True if the path resolves to a scalar value.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Renders the snapshot back into dotted-path pairs, including `.#`
    /// counts for repeated blocks. This is the boundary form; internal
    /// consumers should use [`AttributeSnapshot::get`].
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        Self::collect_pairs(&self.root, String::new(), &mut pairs);
        pairs
    }

    fn collect_pairs(node: &Node, prefix: String, pairs: &mut Vec<(String, String)>) {
        match node {
            Node::Value(v) => pairs.push((prefix, v.clone())),
            Node::List(items) => {
                pairs.push((join(&prefix, "#"), items.len().to_string()));
                for (index, item) in items.iter().enumerate() {
                    Self::collect_pairs(item, join(&prefix, &index.to_string()), pairs);
                }
            }
            Node::Object(fields) => {
                for (key, value) in fields {
                    Self::collect_pairs(value, join(&prefix, key), pairs);
                }
            }
        }
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// Intermediate tree used while ingesting dotted-path pairs. Children are
/// keyed by raw segment until the shape (list vs struct) is known.
enum Builder {
    Value(String),
    Object(BTreeMap<String, Builder>),
}

impl Builder {
    fn insert(&mut self, segments: &[&str], value: String) {
        match segments {
            [] => {}
            [leaf] => {
                if let Builder::Object(children) = self {
                    // `#` pairs only assert the count; indexed entries carry
                    // the data. Record the key so zero-length lists survive.
                    if *leaf == "#" {
                        children
                            .entry("#".to_string())
                            .or_insert_with(|| Builder::Value(value));
                    } else {
                        children.insert((*leaf).to_string(), Builder::Value(value));
                    }
                }
            }
            [head, rest @ ..] => {
                if let Builder::Object(children) = self {
                    let child = children
                        .entry((*head).to_string())
                        .or_insert_with(|| Builder::Object(BTreeMap::new()));
                    // A scalar can be shadowed by deeper paths; last write
                    // wins with the structured form.
                    if matches!(child, Builder::Value(_)) {
                        *child = Builder::Object(BTreeMap::new());
                    }
                    child.insert(rest, value);
                }
            }
        }
    }

    fn finalize(self) -> Node {
        match self {
            Builder::Value(v) => Node::Value(v),
            Builder::Object(children) => {
                let has_count_marker = children.contains_key("#");
                let data: Vec<(String, Builder)> =
                    children.into_iter().filter(|(k, _)| k != "#").collect();

                let all_numeric =
                    !data.is_empty() && data.iter().all(|(k, _)| k.parse::<usize>().is_ok());

                if all_numeric || (has_count_marker && data.is_empty()) {
                    let mut indexed: Vec<(usize, Builder)> = data
                        .into_iter()
                        .map(|(k, v)| (k.parse::<usize>().unwrap_or(0), v))
                        .collect();
                    indexed.sort_by_key(|(index, _)| *index);
                    Node::List(indexed.into_iter().map(|(_, v)| v.finalize()).collect())
                } else {
                    Node::Object(
                        data.into_iter()
                            .map(|(k, v)| (k, v.finalize()))
                            .collect(),
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_lookup_from_pairs() {
        let snapshot = AttributeSnapshot::from_pairs([("name", "LOADER"), ("comment", "")]);
        assert_eq!(snapshot.get("name").as_deref(), Some("LOADER"));
        assert_eq!(snapshot.get("comment").as_deref(), Some(""));
        assert_eq!(snapshot.get("missing_key"), None);
    }

    #[test]
    fn test_nested_paths_build_a_tree() {
        let snapshot = AttributeSnapshot::from_pairs([
            ("from_specification.0.path", "services/spec.yml"),
            ("from_specification.0.stage", "@stage"),
            ("from_specification.1.path", "services/other.yml"),
        ]);
        assert_eq!(
            snapshot.get("from_specification.0.path").as_deref(),
            Some("services/spec.yml")
        );
        assert_eq!(
            snapshot.get("from_specification.1.path").as_deref(),
            Some("services/other.yml")
        );
        assert_eq!(snapshot.get("from_specification.#").as_deref(), Some("2"));
        assert_eq!(snapshot.get("from_specification.2.path"), None);
    }

    #[test]
    fn test_count_pair_materializes_empty_list() {
        let snapshot = AttributeSnapshot::from_pairs([("grants.#", "0"), ("name", "X")]);
        assert_eq!(snapshot.get("grants.#").as_deref(), Some("0"));
        assert_eq!(snapshot.get("grants.0"), None);
    }

    #[test]
    fn test_from_json_flattens_scalars_and_lists() {
        let snapshot = AttributeSnapshot::from_json(&json!({
            "name": "EVENTS",
            "auto_suspend": 600,
            "auto_resume": true,
            "comment": null,
            "columns": [
                {"name": "ID", "data_type": "NUMBER(38,0)"},
                {"name": "PAYLOAD", "data_type": "VARCHAR"},
            ],
        }));

        assert_eq!(snapshot.get("name").as_deref(), Some("EVENTS"));
        assert_eq!(snapshot.get("auto_suspend").as_deref(), Some("600"));
        assert_eq!(snapshot.get("auto_resume").as_deref(), Some("true"));
        // nulls are absent, not empty strings
        assert_eq!(snapshot.get("comment"), None);
        assert_eq!(snapshot.get("columns.#").as_deref(), Some("2"));
        assert_eq!(snapshot.get("columns.1.name").as_deref(), Some("PAYLOAD"));
    }

    #[test]
    fn test_intermediate_nodes_are_not_values() {
        let snapshot = AttributeSnapshot::from_pairs([("columns.0.name", "ID")]);
        assert_eq!(snapshot.get("columns"), None);
        assert_eq!(snapshot.get("columns.0"), None);
        assert!(!snapshot.contains("columns.0.name.more"));
    }

    #[test]
    fn test_round_trip_through_pairs() {
        let snapshot = AttributeSnapshot::from_json(&json!({
            "name": "LOADER",
            "tags": ["a", "b"],
        }));
        let pairs = snapshot.to_pairs();
        let rebuilt = AttributeSnapshot::from_pairs(pairs);
        assert_eq!(rebuilt.get("name").as_deref(), Some("LOADER"));
        assert_eq!(rebuilt.get("tags.#").as_deref(), Some("2"));
        assert_eq!(rebuilt.get("tags.0").as_deref(), Some("a"));
        assert_eq!(rebuilt, snapshot);
    }
}

//! The record threaded through pipeline nodes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved payload key holding the de-duplicated list of artifact paths.
pub const ARTIFACTS_KEY: &str = "_artifacts";

/// Open-ended JSON object passed from node to node.
///
/// Each node receives the accumulated payload and returns a partial payload that is
/// shallow-merged on top of it with [`merge`](Payload::merge). The reserved
/// [`ARTIFACTS_KEY`] list is unioned rather than overwritten, so it never holds
/// duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a payload from a JSON value. Non-object values yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert or overwrite a top-level key.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Builder-style [`insert`](Payload::insert).
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a dotted path (`"writer.meta.words"`). Numeric segments index arrays.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first.trim())?;
        for seg in segments {
            let seg = seg.trim();
            current = match current {
                Value::Object(map) => map.get(seg)?,
                Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Shallow-merge `partial` on top of this payload.
    ///
    /// Keys absent from `partial` are preserved. `_artifacts` entries in `partial`
    /// are unioned into the accumulated list.
    pub fn merge(&mut self, partial: Payload) {
        for (key, value) in partial.0 {
            if key == ARTIFACTS_KEY {
                let paths: Vec<String> = match value {
                    Value::Array(items) => items
                        .into_iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect(),
                    Value::String(s) => vec![s],
                    _ => Vec::new(),
                };
                self.merge_artifacts(paths);
            } else {
                self.0.insert(key, value);
            }
        }
    }

    /// Non-mutating [`merge`](Payload::merge).
    pub fn merged(&self, partial: &Payload) -> Payload {
        let mut out = self.clone();
        out.merge(partial.clone());
        out
    }

    /// Append artifact paths to `_artifacts`, skipping any already present.
    pub fn merge_artifacts<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut current = self.artifacts();
        for path in paths {
            let path = path.into();
            if !current.contains(&path) {
                current.push(path);
            }
        }
        self.0.insert(
            ARTIFACTS_KEY.to_string(),
            Value::Array(current.into_iter().map(Value::String).collect()),
        );
    }

    /// The accumulated artifact paths, in first-seen order.
    pub fn artifacts(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        if let Some(Value::Array(items)) = self.0.get(ARTIFACTS_KEY) {
            for item in items {
                if let Some(s) = item.as_str() {
                    if !out.iter().any(|existing| existing == s) {
                        out.push(s.to_string());
                    }
                }
            }
        }
        out
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        payload.into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        Payload::from_value(value).unwrap()
    }

    #[test]
    fn merge_preserves_existing_keys() {
        let mut p = payload(json!({"title": "Demo", "keep": 1}));
        p.merge(payload(json!({"title": "Renamed", "added": true})));

        assert_eq!(p.get("title"), Some(&json!("Renamed")));
        assert_eq!(p.get("keep"), Some(&json!(1)));
        assert_eq!(p.get("added"), Some(&json!(true)));
    }

    #[test]
    fn merge_is_shallow() {
        let mut p = payload(json!({"writer": {"text": "a", "model": "m"}}));
        p.merge(payload(json!({"writer": {"text": "b"}})));
        assert_eq!(p.get("writer"), Some(&json!({"text": "b"})));
    }

    #[test]
    fn artifacts_are_unioned_not_overwritten() {
        let mut p = Payload::new();
        p.merge_artifacts(["writer/draft.md"]);
        p.merge(payload(json!({"_artifacts": ["uploader/manifest.json", "writer/draft.md"]})));

        assert_eq!(
            p.artifacts(),
            vec!["writer/draft.md".to_string(), "uploader/manifest.json".to_string()]
        );
    }

    #[test]
    fn remerging_identical_output_keeps_artifacts_unique() {
        let mut p = payload(json!({"title": "Demo"}));
        let out = payload(json!({"writer": {"text": "x"}, "_artifacts": ["writer/draft.md"]}));
        p.merge(out.clone());
        let once = p.clone();
        p.merge(out);

        assert_eq!(p, once);
        let arts = p.artifacts();
        let unique: std::collections::HashSet<_> = arts.iter().collect();
        assert_eq!(arts.len(), unique.len());
        assert_eq!(p.get(ARTIFACTS_KEY), Some(&json!(["writer/draft.md"])));
    }

    #[test]
    fn lookup_dotted_path() {
        let p = payload(json!({"review": {"status": "ok", "scores": [3, 9]}}));
        assert_eq!(p.lookup("review.status"), Some(&json!("ok")));
        assert_eq!(p.lookup("review.scores.1"), Some(&json!(9)));
        assert_eq!(p.lookup("review.missing"), None);
        assert_eq!(p.lookup("review.status.deeper"), None);
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(Payload::from_value(json!([1, 2])).is_none());
        assert!(Payload::from_value(json!("x")).is_none());
    }

    #[test]
    fn serializes_as_plain_object() {
        let p = Payload::new().with("title", json!("Demo"));
        assert_eq!(serde_json::to_value(&p).unwrap(), json!({"title": "Demo"}));
    }
}

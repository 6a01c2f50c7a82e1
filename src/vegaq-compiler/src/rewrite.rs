//! Spec graph rewriting
//!
//! Walks the `data` section of a Vega spec and replaces every data source
//! backed by a registered query expression - plus everything chained off it
//! through `source` links - with a single pushdown transform. The loop
//! restarts after each rewrite so derived sources resolve in dependency
//! order regardless of their position in the document; it stops at the
//! first full pass that changes nothing.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value as JsonValue};

use vegaq_shared::{Error, ExprRegistry, Result};

/// Name prefix marking a data source as registry-backed.
pub const DATA_NAME_PREFIX: &str = "polars:";

/// Transform type of an emitted pushdown instruction.
pub const PUSHDOWN_TRANSFORM: &str = "querypolars";

static DATA_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data\("(.+?)"\)"#).expect("valid data-reference pattern"));

/// The fixed fallback document substituted when rewriting fails.
pub fn empty_spec() -> JsonValue {
    json!({
        "$schema": "https://vega.github.io/schema/vega/v5.json",
        "description": "An empty vega v5 spec",
        "width": 500,
        "height": 200,
        "padding": 5,
        "autosize": "pad",
        "signals": [],
        "data": [],
        "scales": [],
        "projections": [],
        "axes": [],
        "legends": [],
        "marks": [],
    })
}

enum Step {
    /// Wrap a root data source in a pushdown instruction.
    Root {
        index: usize,
        name: String,
        key: String,
    },
    /// Record an already-rewritten root without touching the document.
    RecordRoot { index: usize, name: String },
    /// Fold a derived data source into its root's pushdown.
    Derived {
        index: usize,
        name: String,
        source: String,
    },
}

/// Rewrite a spec document so registry-backed data is fetched through
/// pushdown instructions.
pub fn rewrite_spec(
    registry: &ExprRegistry,
    spec: &JsonValue,
    root_span: &JsonValue,
) -> Result<JsonValue> {
    log::debug!("rewriting spec: {spec}");
    let mut doc = spec.clone();
    let mut chains: HashMap<String, Vec<JsonValue>> = HashMap::new();
    let mut roots: HashMap<String, String> = HashMap::new();

    loop {
        let Some(data) = doc.get("data").and_then(JsonValue::as_array) else {
            break;
        };

        let mut step = None;
        for (index, node) in data.iter().enumerate() {
            let name = node
                .get("name")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string();

            if let Some(key) = name.strip_prefix(DATA_NAME_PREFIX) {
                let key = key.to_string();
                if !roots.contains_key(&name) {
                    if is_pushdown(node) {
                        step = Some(Step::RecordRoot { index, name });
                        break;
                    }
                    if !registry.contains(&key) {
                        return Err(Error::UnknownExpression(name));
                    }
                    step = Some(Step::Root { index, name, key });
                    break;
                }
            }

            let source = node
                .get("source")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string();
            if !source.is_empty() && roots.contains_key(&source) {
                step = Some(Step::Derived {
                    index,
                    name,
                    source,
                });
                break;
            }
        }

        match step {
            None => break,
            Some(Step::RecordRoot { index, name }) => {
                let chain = embedded_chain(&doc["data"][index]);
                chains.insert(name.clone(), chain);
                roots.insert(name.clone(), name);
            }
            Some(Step::Root { index, name, key }) => {
                let span = root_span.clone();
                let node = doc["data"][index]
                    .as_object_mut()
                    .ok_or_else(|| Error::Rewrite(format!("data entry '{name}' is not an object")))?;
                let old_chain: Vec<JsonValue> = node
                    .get("transform")
                    .and_then(JsonValue::as_array)
                    .cloned()
                    .unwrap_or_default();
                let mut pushdown = json!({
                    "type": PUSHDOWN_TRANSFORM,
                    "name": key,
                    "span": span,
                });
                if !old_chain.is_empty() {
                    pushdown["transform"] = JsonValue::Array(old_chain.clone());
                    chains.insert(name.clone(), old_chain);
                }
                node.insert("transform".to_string(), json!([pushdown]));
                roots.insert(name.clone(), name);
            }
            Some(Step::Derived {
                index,
                name,
                source,
            }) => {
                let span = root_span.clone();
                let root_name = roots[&source].clone();
                let key = root_name
                    .strip_prefix(DATA_NAME_PREFIX)
                    .unwrap_or(&root_name)
                    .to_string();
                let source_chain = chains.get(&source).cloned().unwrap_or_default();

                let node = doc["data"][index]
                    .as_object_mut()
                    .ok_or_else(|| Error::Rewrite(format!("data entry '{name}' is not an object")))?;
                node.remove("source");

                let mut own_chain: Vec<JsonValue> = node
                    .get("transform")
                    .and_then(JsonValue::as_array)
                    .cloned()
                    .unwrap_or_default();
                // vega auto-resolves any "signal" key it sees instead of
                // passing it through to the transform
                for transform in &mut own_chain {
                    if let Some(obj) = transform.as_object_mut() {
                        if let Some(signal) = obj.remove("signal") {
                            obj.insert("signal_".to_string(), signal);
                        }
                    }
                }

                let mut merged = source_chain;
                merged.extend(own_chain);
                let dependencies = extract_used_data(&merged);
                let dependency_expr = format!(
                    "{{{}}}",
                    dependencies
                        .iter()
                        .map(|field| format!("{field}: data('{field}')"))
                        .collect::<Vec<_>>()
                        .join(", ")
                );

                let pushdown = json!({
                    "type": PUSHDOWN_TRANSFORM,
                    "name": key,
                    "span": span,
                    "data": dependency_expr,
                    "transform": merged.clone(),
                });
                node.insert("transform".to_string(), json!([pushdown]));
                roots.insert(name.clone(), root_name);
                chains.insert(name, merged);
            }
        }
    }

    let cleaned = cleanup_spec(&doc)?;
    log::debug!("rewritten spec: {cleaned}");
    Ok(cleaned)
}

/// Whether a data node already carries a single pushdown transform.
fn is_pushdown(node: &JsonValue) -> bool {
    node.get("transform")
        .and_then(JsonValue::as_array)
        .is_some_and(|chain| {
            chain.len() == 1
                && chain[0].get("type").and_then(JsonValue::as_str) == Some(PUSHDOWN_TRANSFORM)
        })
}

/// Transform chain embedded in an existing pushdown instruction.
fn embedded_chain(node: &JsonValue) -> Vec<JsonValue> {
    node.get("transform")
        .and_then(JsonValue::as_array)
        .and_then(|chain| chain.first())
        .and_then(|pushdown| pushdown.get("transform"))
        .and_then(JsonValue::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Data fields a transform chain depends on, via `data("...")` references.
fn extract_used_data(transforms: &[JsonValue]) -> BTreeSet<String> {
    let mut used = BTreeSet::new();
    for transform in transforms {
        collect_data_refs(transform, &mut used);
    }
    used
}

fn collect_data_refs(value: &JsonValue, used: &mut BTreeSet<String>) {
    match value {
        JsonValue::String(s) => {
            for capture in DATA_REF.captures_iter(s) {
                used.insert(capture[1].to_string());
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                collect_data_refs(item, used);
            }
        }
        JsonValue::Object(entries) => {
            for item in entries.values() {
                collect_data_refs(item, used);
            }
        }
        _ => {}
    }
}

/// Drop data sources no longer referenced anywhere else in the document.
///
/// Reference detection is substring containment over the serialized
/// document with the candidate removed; removal decisions are made against
/// the pre-removal document and applied together.
fn cleanup_spec(spec: &JsonValue) -> Result<JsonValue> {
    let Some(data) = spec.get("data").and_then(JsonValue::as_array) else {
        return Ok(spec.clone());
    };

    let mut keep = vec![true; data.len()];
    for (index, node) in data.iter().enumerate() {
        let name = node
            .get("name")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let mut without = spec.clone();
        if let Some(entries) = without.get_mut("data").and_then(JsonValue::as_array_mut) {
            entries.remove(index);
        }
        let serialized = serde_json::to_string(&without)?;
        if !serialized.contains(name) {
            keep[index] = false;
        }
    }

    let mut cleaned = spec.clone();
    if let Some(entries) = cleaned.get_mut("data").and_then(JsonValue::as_array_mut) {
        let mut index = 0;
        entries.retain(|_| {
            let kept = keep[index];
            index += 1;
            kept
        });
    }
    Ok(cleaned)
}

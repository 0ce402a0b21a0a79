//! Structured-data pillar: JSON-LD blocks and their Schema.org types.

use super::{PillarScore, SCHEMA_MAX};
use crate::config::SchemaScoring;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

pub const SCHEMA_BASE: f64 = 8.0;
/// Per unique type in the baseline formula.
pub const SCHEMA_TYPE_BONUS: f64 = 5.0;
/// Types worth more in `SchemaScoring::WeightedTypes`.
pub const HIGH_VALUE_TYPES: &[&str] = &["FAQPage", "HowTo", "Article", "Product", "Recipe"];
pub const HIGH_VALUE_BONUS: f64 = 5.0;
pub const STANDARD_BONUS: f64 = 3.0;

/// One JSON-LD item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaItem {
    /// `@type`; multiple types are joined with ", ".
    pub schema_type: String,
    /// Non-`@` keys present on the item.
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaAnalysis {
    pub blocks_found: usize,
    pub items: Vec<SchemaItem>,
    /// Script blocks that were not valid JSON.
    pub invalid_blocks: usize,
}

impl SchemaAnalysis {
    pub fn unique_types(&self) -> BTreeSet<&str> {
        self.items.iter().map(|i| i.schema_type.as_str()).collect()
    }
}

/// Collect JSON-LD items from `<script type="application/ld+json">` blocks.
///
/// Top-level arrays and `@graph` members each count as one item.
pub fn extract_json_ld(html: &str) -> SchemaAnalysis {
    let mut analysis = SchemaAnalysis::default();
    let Ok(selector) = Selector::parse("script") else {
        return analysis;
    };
    let document = Html::parse_document(html);

    for script in document.select(&selector) {
        let is_ld = script
            .value()
            .attr("type")
            .map(|t| t.trim().to_ascii_lowercase().starts_with("application/ld+json"))
            .unwrap_or(false);
        if !is_ld {
            continue;
        }
        let raw: String = script.text().collect();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => collect_items(&value, &mut analysis.items),
            Err(e) => {
                debug!(error = %e, "skipping invalid JSON-LD block");
                analysis.invalid_blocks += 1;
            }
        }
    }

    analysis.blocks_found = analysis.items.len();
    analysis
}

fn collect_items(value: &Value, out: &mut Vec<SchemaItem>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_items(v, out)),
        Value::Object(map) => {
            if let Some(Value::Array(graph)) = map.get("@graph") {
                graph.iter().for_each(|v| collect_items(v, out));
                if !map.contains_key("@type") {
                    return;
                }
            }
            let schema_type = match map.get("@type") {
                Some(Value::String(t)) => t.clone(),
                Some(Value::Array(ts)) => ts
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => "Unknown".to_string(),
            };
            let properties = map
                .keys()
                .filter(|k| !k.starts_with('@'))
                .cloned()
                .collect();
            out.push(SchemaItem {
                schema_type,
                properties,
            });
        }
        _ => {}
    }
}

pub fn schema_points(analysis: &SchemaAnalysis, mode: SchemaScoring) -> f64 {
    if analysis.blocks_found == 0 {
        return 0.0;
    }
    let types = analysis.unique_types();
    let raw = match mode {
        SchemaScoring::Baseline => SCHEMA_BASE + SCHEMA_TYPE_BONUS * types.len() as f64,
        SchemaScoring::WeightedTypes => {
            let high = types.iter().filter(|t| HIGH_VALUE_TYPES.contains(t)).count();
            let standard = types.len() - high;
            SCHEMA_BASE + HIGH_VALUE_BONUS * high as f64 + STANDARD_BONUS * standard as f64
        }
    };
    raw.min(SCHEMA_MAX)
}

pub fn score_schema(html: &str, mode: SchemaScoring) -> (PillarScore, SchemaAnalysis) {
    let analysis = extract_json_ld(html);
    let detail = if analysis.blocks_found == 0 {
        "no JSON-LD found".to_string()
    } else {
        let types: Vec<&str> = analysis.unique_types().into_iter().collect();
        format!(
            "{} JSON-LD block(s): {}",
            analysis.blocks_found,
            types.join(", ")
        )
    };
    let points = schema_points(&analysis, mode);
    (
        PillarScore::new("structured_data", points, SCHEMA_MAX, detail),
        analysis,
    )
}

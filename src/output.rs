//! Summary rendering for stdout.
use crate::store::Summary;
use anyhow::{Context, Result};

/// Render a summary as two-space indented JSON, keeping key order.
pub fn render_summary(summary: &Summary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("serialize import summary")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_indented_json_in_insertion_order() {
        let mut summary = Summary::new();
        summary.insert("status".to_string(), json!("success"));
        summary.insert("items".to_string(), json!({"b": 1, "a": [true]}));

        let rendered = render_summary(&summary).expect("render");

        assert_eq!(
            rendered,
            "{\n  \"status\": \"success\",\n  \"items\": {\n    \"b\": 1,\n    \"a\": [\n      true\n    ]\n  }\n}"
        );
    }

    #[test]
    fn empty_summary_is_an_empty_object() {
        assert_eq!(render_summary(&Summary::new()).expect("render"), "{}");
    }
}

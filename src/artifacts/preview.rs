//! Parsed artifact content returned by `GET /api/content/{filename}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of a tabular preview, keyed by column header.
pub type Row = Map<String, Value>;

/// Structured content of a previewable artifact.
///
/// The service sends either a string (narrative report) or an array of row
/// objects (tabular export) under the same `content` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Preview {
    Narrative(String),
    Tabular(Vec<Row>),
}

impl Preview {
    pub fn as_narrative(&self) -> Option<&str> {
        match self {
            Preview::Narrative(text) => Some(text),
            Preview::Tabular(_) => None,
        }
    }

    pub fn as_rows(&self) -> Option<&[Row]> {
        match self {
            Preview::Tabular(rows) => Some(rows),
            Preview::Narrative(_) => None,
        }
    }

    /// Column headers of a tabular preview, taken from its first row.
    pub fn columns(&self) -> Vec<&str> {
        self.as_rows()
            .and_then(|rows| rows.first())
            .map(|row| row.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Render a cell for plain-text display: strings unquoted, `null` empty.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Body {
        content: Preview,
    }

    #[test]
    fn string_content_is_narrative() {
        let body: Body =
            serde_json::from_str(r#"{"content": "Conversation Summary\n\nAgent greeted..."}"#)
                .expect("parse");
        assert!(body.content.as_narrative().is_some_and(|t| t.starts_with("Conversation")));
        assert!(body.content.columns().is_empty());
    }

    #[test]
    fn array_content_is_tabular() {
        let body: Body = serde_json::from_str(
            r#"{"content": [
                {"Criterion": "Greeting", "Rating": 4},
                {"Criterion": "Closing", "Rating": null}
            ]}"#,
        )
        .expect("parse");

        let rows = body.content.as_rows().expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(body.content.columns(), vec!["Criterion", "Rating"]);
        assert_eq!(cell_text(&rows[0]["Rating"]), "4");
        assert_eq!(cell_text(&rows[1]["Rating"]), "");
        assert_eq!(cell_text(&rows[1]["Criterion"]), "Closing");
    }

    #[test]
    fn empty_table_has_no_columns() {
        let body: Body = serde_json::from_str(r#"{"content": []}"#).expect("parse");
        assert_eq!(body.content.as_rows().map(<[Row]>::len), Some(0));
        assert!(body.content.columns().is_empty());
    }

    #[test]
    fn other_shapes_are_rejected() {
        assert!(serde_json::from_str::<Body>(r#"{"content": 42}"#).is_err());
        assert!(serde_json::from_str::<Body>(r#"{"content": [1, 2]}"#).is_err());
    }
}

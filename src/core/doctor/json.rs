use super::ResponseParser;
use crate::core::ent::{Status, StatusMap};
use crate::core::error::ParseError;
use serde::Deserialize;

/// Statuspage `summary.json`: a flat `components` list with a status token each.
pub struct StatuspageJson;

#[derive(Debug, Deserialize)]
struct Summary {
    components: Vec<Component>,
}

#[derive(Debug, Deserialize)]
struct Component {
    name: Option<String>,
    status: Option<String>,
}

impl ResponseParser for StatuspageJson {
    fn parse(&self, body: &str) -> Result<StatusMap, ParseError> {
        let summary: Summary =
            serde_json::from_str(body).map_err(|e| ParseError::new(e.to_string()))?;

        Ok(summary
            .components
            .into_iter()
            .filter_map(|c| {
                let name = c.name?.trim().to_string();
                if name.is_empty() {
                    return None;
                }
                let status = c
                    .status
                    .as_deref()
                    .map(Status::from_indicator)
                    .unwrap_or(Status::Undetermined);
                Some((name, status))
            })
            .collect())
    }
}

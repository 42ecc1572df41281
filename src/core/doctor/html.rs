//! Google Cloud style status page: a `.timeline` table, one row per product,
//! whose last bubble carries the severity class (`ok`, `medium`, `high`).

use super::ResponseParser;
use crate::core::ent::{Status, StatusMap};
use crate::core::error::ParseError;
use scraper::{Html, Selector};

pub struct HtmlTimeline;

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::new(e.to_string()))
}

impl ResponseParser for HtmlTimeline {
    fn parse(&self, body: &str) -> Result<StatusMap, ParseError> {
        let document = Html::parse_document(body);

        let timeline = selector(".timeline")?;
        if document.select(&timeline).next().is_none() {
            return Err(ParseError::new("no status timeline in page"));
        }

        let rows = selector(".timeline tr")?;
        let name_sel = selector(".service-status")?;
        let bubble = selector(".end-bubble")?;

        let mut statuses = StatusMap::new();
        for row in document.select(&rows) {
            let name = match row.select(&name_sel).next() {
                Some(el) => el.text().collect::<String>().trim().to_string(),
                None => continue,
            };
            if name.is_empty() {
                continue;
            }

            // First class on the bubble that means something wins.
            let status = row
                .select(&bubble)
                .next()
                .map(|el| {
                    el.value()
                        .classes()
                        .filter(|c| *c != "end-bubble")
                        .map(Status::from_indicator)
                        .find(|s| *s != Status::Undetermined)
                        .unwrap_or(Status::Undetermined)
                })
                .unwrap_or(Status::Undetermined);

            statuses.insert(name, status);
        }
        Ok(statuses)
    }
}

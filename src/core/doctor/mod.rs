//! Response parsers: one strategy per upstream wire format, each turning a
//! decoded body into a [`StatusMap`].
//!
//! Parsers are total over entries. A row or entry whose severity token is not
//! recognized is reported as [`Status::Undetermined`](crate::core::Status),
//! never dropped; only a body that is structurally unusable fails.

mod atom;
mod html;
mod json;

pub use atom::AtomFeed;
pub use html::HtmlTimeline;
pub use json::StatuspageJson;

use crate::core::ent::StatusMap;
use crate::core::error::ParseError;
use serde::{Deserialize, Serialize};

pub trait ResponseParser: Send + Sync {
    fn parse(&self, body: &str) -> Result<StatusMap, ParseError>;
}

/// Wire format of a family's endpoint. Chosen by configuration, never sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Html,
    Json,
    Atom,
}

impl Format {
    pub fn parser(&self) -> Box<dyn ResponseParser> {
        match self {
            Format::Html => Box::new(HtmlTimeline),
            Format::Json => Box::new(StatuspageJson),
            Format::Atom => Box::new(AtomFeed),
        }
    }
}

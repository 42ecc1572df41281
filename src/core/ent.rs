use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entity name to status, as reported by one family's upstream.
pub type StatusMap = HashMap<String, Status>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Good,
    Minor,
    Major,
    Undetermined,
}

impl Status {
    /// Display impact rank. Undetermined sits above good: unknown is not green.
    pub fn severity(&self) -> u8 {
        match self {
            Status::Good => 0,
            Status::Undetermined => 1,
            Status::Minor => 2,
            Status::Major => 3,
        }
    }

    /// Maps an upstream severity token (css class, json field, feed category)
    /// onto the taxonomy. Unknown tokens are undetermined, never an error.
    pub fn from_indicator(token: &str) -> Status {
        let token = token.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match token.as_str() {
            "ok" | "good" | "operational" | "normal" | "none" | "resolved" | "available" => {
                Status::Good
            }
            "medium" | "minor" | "degraded" | "degraded_performance" | "partial_outage"
            | "under_maintenance" | "maintenance" | "warning" | "disruption" => Status::Minor,
            "high" | "major" | "major_outage" | "outage" | "critical" | "down" => Status::Major,
            _ => Status::Undetermined,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Status::Good => "Normal Operations",
            Status::Minor => "Service Disruption",
            Status::Major => "Service Outage",
            Status::Undetermined => "Unrecognized status indicator",
        }
    }
}

impl PartialOrd for Status {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Status {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.severity().cmp(&other.severity())
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Good => "good",
            Status::Minor => "minor",
            Status::Major => "major",
            Status::Undetermined => "undetermined",
        };
        f.write_str(s)
    }
}

/// Current status and message of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub status: Status,
    pub message: String,
}

impl Default for Report {
    fn default() -> Self {
        Report {
            status: Status::Undetermined,
            message: String::new(),
        }
    }
}

/// A report tagged with the service it belongs to, as sent to the logger.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub name: String,
    pub family: String,
    pub status: Status,
    pub message: String,
}

#[derive(Debug)]
pub enum Event {
    Heartbeat(StatusReport),
    CheckAll,
}

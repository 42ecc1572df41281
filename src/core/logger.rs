use crate::core::ent::*;
use std::collections::{BTreeMap, HashMap};

/// Keeps the last report of every service and logs what changed.
pub struct Logger {
    services: HashMap<String, StatusReport>,
    notify_on_change: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub name: String,
    pub from: Status,
    pub to: Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub worst: Option<Status>,
    pub counts: BTreeMap<Status, usize>,
}

impl Logger {
    pub fn new(notify_on_change: bool) -> Logger {
        Logger {
            services: HashMap::new(),
            notify_on_change,
        }
    }

    pub fn log(&mut self, event: Event) {
        match event {
            Event::Heartbeat(report) => {
                self.record(report);
            }
            Event::CheckAll => {
                self.summarize();
            }
        };
    }

    /// Store `report`, returning the transition if the status moved.
    /// The first report of a service is not a transition.
    pub fn record(&mut self, report: StatusReport) -> Option<Transition> {
        tracing::debug!(
            service = %report.name,
            family = %report.family,
            status = %report.status,
            "recv heartbeat: {}",
            report.message
        );
        let previous = self.services.insert(report.name.clone(), report.clone())?;
        if previous.status == report.status {
            return None;
        }
        let transition = Transition {
            name: report.name,
            from: previous.status,
            to: report.status,
        };
        if self.notify_on_change {
            if transition.to > transition.from {
                tracing::warn!(
                    service = %transition.name,
                    "status changed {} -> {}: {}",
                    transition.from,
                    transition.to,
                    report.message
                );
            } else {
                tracing::info!(
                    service = %transition.name,
                    "status changed {} -> {}",
                    transition.from,
                    transition.to
                );
            }
        }
        Some(transition)
    }

    pub fn summarize(&self) -> Summary {
        let mut counts = BTreeMap::new();
        for report in self.services.values() {
            *counts.entry(report.status).or_insert(0) += 1;
        }
        let summary = Summary {
            worst: self.services.values().map(|r| r.status).max(),
            counts,
        };
        match summary.worst {
            Some(worst) => tracing::info!(
                services = self.services.len(),
                worst = %worst,
                "finished check all services {:?}",
                summary.counts
            ),
            None => tracing::info!("finished check all services: nothing reported yet"),
        }
        summary
    }
}

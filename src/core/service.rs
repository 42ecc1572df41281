use crate::core::collector::{Collector, FamilySnapshot};
use crate::core::ent::{Report, Status, StatusReport};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

/// One monitored entity, e.g. a single cloud product on a provider's page.
pub struct Service {
    name: String,
    collector: Arc<Collector>,
    report: Mutex<Report>,
}

impl Service {
    pub fn new(name: impl Into<String>, collector: Arc<Collector>) -> Service {
        Service {
            name: name.into(),
            collector,
            report: Mutex::new(Report::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        self.collector.url()
    }

    pub fn family(&self) -> &str {
        self.collector.name()
    }

    pub fn collector(&self) -> &Arc<Collector> {
        &self.collector
    }

    pub fn report(&self) -> Report {
        self.lock().clone()
    }

    pub fn status_report(&self) -> StatusReport {
        let report = self.report();
        StatusReport {
            name: self.name.clone(),
            family: self.family().to_string(),
            status: report.status,
            message: report.message,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Report> {
        self.report.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Request a fresh (or still-fresh cached) status. `callback` runs exactly
    /// once, after status and message are updated. Failures land in the
    /// report as `Undetermined` plus a diagnostic; nothing is returned.
    pub fn update_status<F>(self: &Arc<Self>, callback: F)
    where
        F: FnOnce(&Service) + Send + 'static,
    {
        let this = Arc::clone(self);
        self.collector.request_update(Box::new(move |snapshot: &FamilySnapshot| {
            this.apply(snapshot);
            callback(&this);
        }));
    }

    /// Async form of [`update_status`](Self::update_status).
    pub async fn refresh(self: &Arc<Self>) -> Report {
        let (tx, rx) = oneshot::channel();
        self.update_status(move |service| {
            let _ = tx.send(service.report());
        });
        match rx.await {
            Ok(report) => report,
            Err(_) => self.report(),
        }
    }

    fn apply(&self, snapshot: &FamilySnapshot) {
        let report = match snapshot.statuses.get(&self.name) {
            Some(status) => Report {
                status: *status,
                message: status.message().to_string(),
            },
            None => Report {
                status: Status::Undetermined,
                message: snapshot.last_error.clone().unwrap_or_default(),
            },
        };
        *self.lock() = report;
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("family", &self.family())
            .field("report", &self.report())
            .finish()
    }
}

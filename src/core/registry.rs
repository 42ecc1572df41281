use crate::core::collector::Collector;
use crate::core::doctor::Format;
use crate::core::fetcher::Fetcher;
use crate::core::service::Service;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// One upstream endpoint and the entities read from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilySpec {
    pub name: String,
    pub url: String,
    pub format: Format,
    pub entities: Vec<String>,
}

const GOOGLE_CLOUD: &[&str] = &[
    "Google App Engine",
    "Google Compute Engine",
    "Google Cloud Storage",
    "Google BigQuery",
    "Google Cloud Dataproc",
    "Google Cloud Datastore",
    "Google Cloud DNS",
    "Google Cloud Pub/Sub",
    "Google Cloud SQL",
    "Google Cloud Dataflow",
    "Google Container Engine",
    "Google Cloud Console",
    "Google Stackdriver",
    "Google Cloud Bigtable",
];

const GITHUB: &[&str] = &[
    "Git Operations",
    "API Requests",
    "Webhooks",
    "Issues",
    "Pull Requests",
    "Actions",
    "Packages",
    "Pages",
    "Codespaces",
];

pub fn default_families() -> Vec<FamilySpec> {
    let spec = |name: &str, url: &str, format: Format, entities: &[&str]| FamilySpec {
        name: name.to_string(),
        url: url.to_string(),
        format,
        entities: entities.iter().map(|e| e.to_string()).collect(),
    };
    vec![
        spec(
            "Google Cloud Platform",
            "https://status.cloud.google.com",
            Format::Html,
            GOOGLE_CLOUD,
        ),
        spec(
            "GitHub",
            "https://www.githubstatus.com/api/v2/summary.json",
            Format::Json,
            GITHUB,
        ),
    ]
}

/// Every monitored service, in catalog order, each wired to its family's
/// shared collector. Building one performs no I/O.
pub struct Registry {
    families: Vec<Arc<Collector>>,
    services: Vec<Arc<Service>>,
}

impl Registry {
    /// Service names are unique: an entity already registered by an earlier
    /// family is skipped with a warning, so the first declaration wins.
    pub fn new(specs: &[FamilySpec], fetcher: Arc<dyn Fetcher>, freshness: Duration) -> Registry {
        let mut families = Vec::with_capacity(specs.len());
        let mut services = Vec::new();
        let mut seen = HashSet::new();
        for spec in specs {
            let collector = Arc::new(Collector::new(
                &spec.name,
                &spec.url,
                spec.format,
                Arc::clone(&fetcher),
                freshness,
            ));
            for entity in &spec.entities {
                if !seen.insert(entity.as_str()) {
                    tracing::warn!("{} already registered, ignoring it in {}", entity, spec.name);
                    continue;
                }
                services.push(Arc::new(Service::new(entity, Arc::clone(&collector))));
            }
            families.push(collector);
        }
        Registry { families, services }
    }

    pub fn services(&self) -> &[Arc<Service>] {
        &self.services
    }

    pub fn families(&self) -> &[Arc<Collector>] {
        &self.families
    }

    pub fn service(&self, name: &str) -> Option<&Arc<Service>> {
        self.services.iter().find(|s| s.name() == name)
    }

    pub fn family_services<'a>(&'a self, family: &'a str) -> impl Iterator<Item = &'a Arc<Service>> {
        self.services.iter().filter(move |s| s.family() == family)
    }
}

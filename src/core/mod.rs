pub mod api;
pub mod collector;
pub mod doctor;
pub mod ent;
pub mod error;
pub mod fetcher;
pub mod logger;
pub mod registry;
pub mod service;
pub use api::listen;
pub use collector::{Collector, FamilySnapshot};
pub use doctor::{Format, ResponseParser};
pub use ent::*;
pub use error::{FetchError, ParseError};
pub use fetcher::{Fetcher, HttpFetcher};
pub use logger::*;
pub use registry::{default_families, FamilySpec, Registry};
pub use service::Service;

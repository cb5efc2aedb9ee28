//! Prepares TensorFlow training packs for submission to a cluster.
//!
//! A pack run folder holds a `Dockerfile`, a chart under
//! `charts/<pack_type>/values.yaml` and a Draft `draft.toml`.
//! [`PackConfigurator`] rewrites all three from user parameters and pulls the
//! training base image; [`get_pod_count`] reads back the replica count.

pub mod config;
pub mod configurator;
pub mod error;
pub mod k8s;
pub mod pack;
pub mod runtime;

pub use configurator::get_pod_count;
pub use configurator::PackConfigurator;
pub use configurator::UpdateReport;
pub use configurator::UpdateRequest;
pub use error::ConfigurationError;
pub use error::PackError;
pub use error::UpdateStep;

//! Read-only lookups.

pub mod classification;
pub mod graph;
pub mod pipeline_settings;
pub mod project;
pub mod team;

use crate::registry::ProviderRegistry;

pub fn register(registry: &mut ProviderRegistry) {
    project::register(registry);
    team::register(registry);
    graph::register(registry);
    classification::register(registry);
    pipeline_settings::register(registry);
}

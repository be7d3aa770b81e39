//! azdo-provider: lifecycle handlers for Azure DevOps resources.
//!
//! [`registry::Provider`] is the host-facing entry point. Resources live in
//! [`resources`], read-only lookups in [`datasources`], and the shared
//! permission engine in [`security`].

pub mod context;
pub mod datasources;
pub mod diagnostics;
pub mod registry;
pub mod resources;
pub mod security;

#[cfg(test)]
mod testing;

pub use context::ProviderContext;
pub use diagnostics::{Diagnostic, Severity};
pub use registry::{DataSource, PlanResult, Provider, ProviderRegistry, Resource};

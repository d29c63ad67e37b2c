// src/workflow/data.rs

//! Named context slots
//!
//! Each slot is a zero-sized marker type that fixes the name and the value
//! type stored under it, so `context.get::<Manifest>()` always yields a
//! `manifest::Manifest` and a typo is a compile error.

use crate::dependency::{Dependency, DependencyList};
use crate::manifest;
use crate::source;
use std::sync::Arc;

/// A typed entry in the context data map
pub trait DataSlot: 'static {
    const NAME: &'static str;
    type Value: Send + 'static;
}

macro_rules! data_slots {
    ($($(#[$doc:meta])* $slot:ident => $value:ty;)*) => {
        $(
            $(#[$doc])*
            pub struct $slot;

            impl DataSlot for $slot {
                const NAME: &'static str = stringify!($slot);
                type Value = $value;
            }
        )*
    };
}

/// A dependency that has been resolved to a concrete package version
#[derive(Debug, Clone, PartialEq)]
pub struct PackageToInstall {
    pub manifest: manifest::Manifest,
    pub installer: manifest::Installer,
}

data_slots! {
    /// Package id requested by the user
    Query => String;
    /// Version requested by the user, when pinned
    RequestedVersion => crate::version::Version;
    /// Manifest of the package being processed
    Manifest => manifest::Manifest;
    /// Installer selected from the manifest
    Installer => manifest::Installer;
    /// Dependencies declared for the current operation
    Dependencies => DependencyList;
    /// Source the package was found in
    PackageSource => Arc<dyn source::PackageSource>;
    /// Source consulted to resolve dependencies
    DependencySource => Arc<dyn source::PackageSource>;
    /// Every graph node, dependencies first, root excluded
    InstallationOrder => Vec<Dependency>;
    /// Dependencies that will actually be installed, in order
    PackagesToInstall => Vec<PackageToInstall>;
}

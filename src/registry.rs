//! One service handle per resolved region.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use thiserror::Error;

use crate::region::{Region, RegionSet};

/// Errors raised when addressing regions outside the registry.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RegistryError {
    /// Raised when a region has no registered client.
    #[error("region {0} is not configured; add it to the region list")]
    UnknownRegion(String),
}

/// Holds exactly one client per region, shared with fan-out tasks by `Arc`.
#[derive(Debug)]
pub struct ClientRegistry<S> {
    clients: HashMap<Region, Arc<S>>,
}

impl<S> Clone for ClientRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            clients: self.clients.clone(),
        }
    }
}

impl<S> ClientRegistry<S> {
    /// Builds one client per region using `factory`.
    ///
    /// The factory is invoked exactly once per region. Construction is
    /// expected to be local; no request is sent until a fan-out runs.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `factory`.
    pub fn build<E, F>(regions: &RegionSet, mut factory: F) -> Result<Self, E>
    where
        F: FnMut(&Region) -> Result<S, E>,
    {
        let mut clients = HashMap::with_capacity(regions.len());
        for region in regions {
            let client = factory(region)?;
            clients.insert(region.clone(), Arc::new(client));
        }
        Ok(Self { clients })
    }

    /// Returns the client for `region`.
    #[must_use]
    pub fn get(&self, region: &Region) -> Option<&Arc<S>> {
        self.clients.get(region)
    }

    /// Returns `true` when `region` has a client.
    #[must_use]
    pub fn contains(&self, region: &Region) -> bool {
        self.clients.contains_key(region)
    }

    /// Registered regions in lexical order.
    #[must_use]
    pub fn regions(&self) -> Vec<Region> {
        let mut regions: Vec<Region> = self.clients.keys().cloned().collect();
        regions.sort();
        regions
    }

    /// Number of registered regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` when no region is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Returns a registry restricted to `regions`, sharing the same clients.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownRegion`] for the first requested
    /// region without a client.
    pub fn subset(&self, regions: &BTreeSet<Region>) -> Result<Self, RegistryError> {
        let mut clients = HashMap::with_capacity(regions.len());
        for region in regions {
            let client = self
                .clients
                .get(region)
                .ok_or_else(|| RegistryError::UnknownRegion(region.to_string()))?;
            clients.insert(region.clone(), Arc::clone(client));
        }
        Ok(Self { clients })
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Region, &Arc<S>)> {
        self.clients.iter()
    }
}

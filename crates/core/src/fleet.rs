//! Read-only port and vessel reference sets for a planning run.

use std::{borrow::Cow, collections::HashMap};

use crate::models::{Port, Vessel};

/// Port and vessel reference data indexed by id.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    ports: HashMap<String, Port>,
    vessels: HashMap<String, Vessel>,
}

impl Fleet {
    /// Index the reference sets; later duplicates replace earlier ones.
    pub fn new(ports: impl IntoIterator<Item = Port>, vessels: impl IntoIterator<Item = Vessel>) -> Self {
        Self {
            ports: ports.into_iter().map(|port| (port.id.clone(), port)).collect(),
            vessels: vessels
                .into_iter()
                .map(|vessel| (vessel.id.clone(), vessel))
                .collect(),
        }
    }

    /// Port by id.
    pub fn port(&self, id: &str) -> Option<&Port> {
        self.ports.get(id)
    }

    /// Vessel by id.
    pub fn vessel(&self, id: &str) -> Option<&Vessel> {
        self.vessels.get(id)
    }

    /// Vessel by id, or a placeholder named after the id when it is unknown.
    pub fn vessel_or_placeholder(&self, id: &str) -> Cow<'_, Vessel> {
        match self.vessels.get(id) {
            Some(vessel) => Cow::Borrowed(vessel),
            None => Cow::Owned(Vessel::placeholder(id)),
        }
    }

    /// Whether the vessel can serve the river side of a transfer node.
    ///
    /// Unknown vessels are treated as sea-going.
    pub fn is_river_sea(&self, vessel_id: &str) -> bool {
        self.vessels
            .get(vessel_id)
            .map(Vessel::is_river_sea)
            .unwrap_or(false)
    }

    /// Number of known vessels.
    pub fn vessel_count(&self) -> usize {
        self.vessels.len()
    }

    /// Number of known ports.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }
}

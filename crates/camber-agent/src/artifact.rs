//! Versioned source artifact shared between the session and the compile
//! driver

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Where the current source text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Mode seed present at session start
    Seed,
    /// Written by the generation cycle streaming into the turn at `turn`
    Generated { turn: usize },
    /// Written by the user
    Manual,
}

#[derive(Debug, Clone)]
struct ArtifactState {
    source: String,
    version: u64,
    provenance: Provenance,
}

/// The single mutable source document plus the latest compiled mesh.
///
/// Every write bumps the version, even when the text is unchanged, so a
/// generation cycle always reaches a fresh compile outcome. The mesh from
/// the last successful compile persists across later failures.
pub struct ArtifactStore {
    state: Mutex<ArtifactState>,
    mesh: Mutex<Option<Vec<u8>>>,
    version_tx: watch::Sender<u64>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            state: Mutex::new(ArtifactState {
                source: String::new(),
                version: 0,
                provenance: Provenance::Seed,
            }),
            mesh: Mutex::new(None),
            version_tx,
        }
    }

    /// Overwrite the source, returning the new version
    pub fn write(&self, source: impl Into<String>, provenance: Provenance) -> u64 {
        let version = {
            let mut state = self.state.lock();
            state.source = source.into();
            state.version += 1;
            state.provenance = provenance;
            state.version
        };
        let _ = self.version_tx.send(version);
        version
    }

    /// Current source text and its version
    pub fn source(&self) -> (String, u64) {
        let state = self.state.lock();
        (state.source.clone(), state.version)
    }

    pub fn version(&self) -> u64 {
        self.state.lock().version
    }

    pub fn provenance(&self) -> Provenance {
        self.state.lock().provenance
    }

    /// Watch channel the compile driver observes for new versions
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    /// Record the mesh produced by a successful compile
    pub fn store_mesh(&self, mesh: Vec<u8>) {
        *self.mesh.lock() = Some(mesh);
    }

    /// Latest successfully compiled mesh, if any
    pub fn latest_mesh(&self) -> Option<Vec<u8>> {
        self.mesh.lock().clone()
    }

    pub fn has_mesh(&self) -> bool {
        self.mesh.lock().is_some()
    }
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

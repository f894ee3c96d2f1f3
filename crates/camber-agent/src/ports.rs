//! Capability ports the session depends on

use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Credential name the Gemini API key is stored under. The name is
/// historical and retained for config compatibility.
pub const API_KEY_NAME: &str = "openai_api_key";

/// Environment variable that overrides the stored credential at read time
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Key-value credential storage. The session reads the key before every
/// remote call, so edits take effect mid-session.
pub trait CredentialStore: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str) -> Result<()>;
}

/// In-memory credential store for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryCredentials {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(key: impl Into<String>) -> Self {
        let store = Self::default();
        store
            .values
            .lock()
            .insert(API_KEY_NAME.to_string(), key.into());
        store
    }
}

impl CredentialStore for MemoryCredentials {
    fn get(&self, name: &str) -> Option<String> {
        self.values.lock().get(name).cloned()
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}

/// View labels for the verification angles, in capture order
pub const ANGLE_LABELS: [&str; 4] = ["Perspective view", "Front view", "Top view", "Side view"];

/// A rendered snapshot of the compiled model, ready for the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// View label, e.g. "Front view"
    pub label: &'static str,
    /// PNG bytes, base64-encoded
    pub png_base64: String,
}

/// Rendering surface over the latest compiled mesh
pub trait RenderPort: Send + Sync {
    /// Single snapshot attached to generation requests. None when nothing
    /// has compiled yet.
    fn capture_snapshot(&self) -> Option<Snapshot>;

    /// The four verification angles. Empty when no mesh is available.
    fn capture_multi_angle(&self) -> Vec<Snapshot>;

    /// Write the latest compiled mesh as binary STL
    fn export_binary(&self, path: &Path) -> Result<PathBuf>;
}

/// Render port that never produces snapshots, for headless runs
pub struct NullRender;

impl RenderPort for NullRender {
    fn capture_snapshot(&self) -> Option<Snapshot> {
        None
    }

    fn capture_multi_angle(&self) -> Vec<Snapshot> {
        Vec::new()
    }

    fn export_binary(&self, _path: &Path) -> Result<PathBuf> {
        Err(crate::error::Error::render("no compiled model to export"))
    }
}

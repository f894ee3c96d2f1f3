//! Session orchestration for conversational OpenSCAD modeling: transcript
//! and artifact state, the debounced compile driver, generation and
//! verification adapters, and the retrying session loop that ties them
//! together.

pub mod artifact;
pub mod budget;
pub mod compile;
pub mod error;
pub mod events;
pub mod generate;
pub mod mode;
pub mod ports;
pub mod session;
pub mod transcript;
pub mod verify;

pub use artifact::{ArtifactStore, Provenance};
pub use budget::RetryBudget;
pub use compile::{CompileOutcome, CompileResult, Compiler};
pub use error::{Error, Result};
pub use events::{SessionEvent, SettleOutcome};
pub use mode::Mode;
pub use ports::{CredentialStore, RenderPort, Snapshot};
pub use session::{Session, SessionConfig};
pub use transcript::{ConversationTurn, Speaker, Transcript};

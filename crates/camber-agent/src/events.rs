//! Session event surface broadcast to observers

use crate::artifact::Provenance;
use crate::transcript::ConversationTurn;
use serde::{Deserialize, Serialize};

/// How a settled cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleOutcome {
    /// The request ran to completion (including unobservable passes where
    /// verification had nothing to look at)
    Ok,
    /// A retry budget ran out or the cycle was abandoned
    GaveUp,
}

/// Events published on the session bus. Everything user-visible flows
/// through here; frontends render them and tests assert on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A turn was appended to the transcript
    TurnAppended { index: usize, turn: ConversationTurn },
    /// A generation stream opened for the turn at `index`
    StreamStarted { index: usize },
    /// Reasoning delta for the streaming turn
    ReasoningDelta { index: usize, delta: String },
    /// Answer delta for the streaming turn
    AnswerDelta { index: usize, delta: String },
    /// The stream for `index` ended; the title summarizes its reasoning
    StreamFinished {
        index: usize,
        reasoning_title: Option<String>,
    },
    /// An existing turn's text was replaced (completion notice, verdict)
    TurnAmended { index: usize, text: String },
    /// The artifact was overwritten
    ArtifactChanged { version: u64, provenance: Provenance },
    /// A compile pass started for an artifact version
    CompileStarted { version: u64 },
    CompileSucceeded { version: u64 },
    CompileFailed { version: u64, diagnostic: String },
    /// Visual verification began
    VerificationStarted,
    /// The current cycle settled; the session is idle again
    Settled { outcome: SettleOutcome },
}

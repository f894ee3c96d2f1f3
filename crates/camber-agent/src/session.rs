//! The generate, compile, verify, retry loop behind a modeling session

use std::sync::Arc;

use camber_ai::stream::{MessageEvent, MessageEventStream};
use futures::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::artifact::{ArtifactStore, Provenance};
use crate::budget::RetryBudget;
use crate::compile::{self, CompileDriver, CompileOutcome, CompileResult, Compiler};
use crate::events::{SessionEvent, SettleOutcome};
use crate::generate::{Generator, build_context, strip_code_fences};
use crate::mode::Mode;
use crate::ports::{API_KEY_NAME, CredentialStore, RenderPort};
use crate::transcript::{Transcript, reasoning_title};
use crate::verify::{Verifier, verdict_passes};

/// Wait between a successful compile and snapshot capture, giving the
/// preview a settled frame
const SETTLE_DELAY: Duration = Duration::from_millis(500);

const EVENT_CHANNEL_CAPACITY: usize = 256;

const MISSING_KEY_NOTICE: &str =
    "Please set your Gemini API key (/key <value> or the GEMINI_API_KEY environment variable).";
const GENERATION_SUCCESS_NOTICE: &str = "✓ Code generated successfully";
const GENERATION_ERROR_NOTICE: &str = "Sorry, I encountered an error communicating with the API.";
const VERIFYING_NOTICE: &str = "🔍 Verifying model...";
const VERIFY_EXHAUSTED_NOTICE: &str = "⚠️ Could not automatically fix the issues after 2 attempts. Please try rephrasing your request or manually edit the code.";

fn compile_exhausted_notice(diagnostic: &str) -> String {
    format!("I tried to fix the code 3 times but failed. Error: {diagnostic}")
}

fn compile_repair_prompt(diagnostic: &str) -> String {
    format!(
        "The previous code failed to compile with error:\n{diagnostic}\n\nPlease fix the OpenSCAD code."
    )
}

fn verify_repair_notice(attempt: u32) -> String {
    format!("🔧 Attempting to fix the issues... (Attempt {attempt}/2)")
}

fn verify_repair_prompt(verdict: &str) -> String {
    format!(
        "The model has issues:\n{verdict}\n\nPlease regenerate the OpenSCAD code to fix these problems."
    )
}

/// Dependencies injected into a session
pub struct SessionConfig {
    pub mode: Mode,
    pub store: Arc<ArtifactStore>,
    pub generator: Arc<dyn Generator>,
    pub verifier: Arc<dyn Verifier>,
    pub compiler: Arc<dyn Compiler>,
    pub render: Arc<dyn RenderPort>,
    pub credentials: Arc<dyn CredentialStore>,
}

/// Where the cycle goes next. States the user observes are narrated on
/// the event bus; this drives the internal control flow.
enum Step {
    Generate,
    CompileCheck { version: u64 },
    Verify,
    Settle(SettleOutcome),
}

/// A modeling session: one transcript, one artifact, and the loop that
/// drives a user intent through generation, compilation, and visual
/// verification with bounded automatic repair.
///
/// `submit` and `manual_edit` run their whole cycle before returning, so
/// at most one intent is in flight at a time.
pub struct Session {
    mode: Mode,
    transcript: Transcript,
    store: Arc<ArtifactStore>,
    budget: RetryBudget,
    /// The original free-form request; corrective prompts never replace it
    last_user_request: Option<String>,
    /// Set when generated code lands, cleared once verification runs
    owes_visual_check: bool,
    generator: Arc<dyn Generator>,
    verifier: Arc<dyn Verifier>,
    render: Arc<dyn RenderPort>,
    credentials: Arc<dyn CredentialStore>,
    outcome_rx: watch::Receiver<Option<CompileOutcome>>,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
}

impl Session {
    /// Build a session: spawns the compile driver, seeds the greeting
    /// turn and the mode's initial code.
    pub fn new(config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let outcome_rx = CompileDriver::spawn(
            config.store.clone(),
            config.compiler,
            events.clone(),
            cancel.clone(),
        );

        let mut session = Self {
            mode: config.mode,
            transcript: Transcript::new(),
            store: config.store,
            budget: RetryBudget::new(),
            last_user_request: None,
            owes_visual_check: false,
            generator: config.generator,
            verifier: config.verifier,
            render: config.render,
            credentials: config.credentials,
            outcome_rx,
            events,
            cancel,
        };

        let greeting = session.transcript.push_agent(session.mode.greeting());
        session.emit_turn_appended(greeting);
        session.write_artifact(session.mode.seed_code(), Provenance::Seed);
        session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Current artifact text
    pub fn source(&self) -> String {
        self.store.source().0
    }

    /// Submit a new user intent and drive it until the session settles.
    /// Both retry budgets start fresh.
    pub async fn submit(&mut self, request: impl Into<String>) {
        let request = request.into();
        self.budget.reset();
        self.last_user_request = Some(request.clone());
        let index = self.transcript.push_user(request);
        self.emit_turn_appended(index);
        self.drive(Step::Generate).await;
    }

    /// Apply a user edit to the source and drive compilation (plus any
    /// bounded repair) until settled. Manual edits never trigger visual
    /// verification.
    pub async fn manual_edit(&mut self, source: impl Into<String>) {
        self.budget.reset();
        self.owes_visual_check = false;
        let version = self.write_artifact(source, Provenance::Manual);
        self.drive(Step::CompileCheck { version }).await;
    }

    async fn drive(&mut self, mut step: Step) {
        loop {
            step = match step {
                Step::Generate => self.generate_step().await,
                Step::CompileCheck { version } => self.compile_step(version).await,
                Step::Verify => self.verify_step().await,
                Step::Settle(outcome) => {
                    self.emit(SessionEvent::Settled { outcome });
                    return;
                }
            };
        }
    }

    /// One generation pass: open a streaming turn, send the transcript,
    /// accumulate deltas, then swap the raw code for the completion notice
    /// and hand the new artifact version to the compile check.
    async fn generate_step(&mut self) -> Step {
        let index = self.transcript.open_agent("");
        self.emit_turn_appended(index);

        // read the key fresh every pass so /key mid-session works
        let Some(api_key) = self.credentials.get(API_KEY_NAME) else {
            self.transcript.replace_open_text(MISSING_KEY_NOTICE);
            self.transcript.close_open();
            self.emit(SessionEvent::TurnAmended {
                index,
                text: MISSING_KEY_NOTICE.to_string(),
            });
            return Step::Settle(SettleOutcome::GaveUp);
        };

        let (source, _) = self.store.source();
        let snapshot = self.render.capture_snapshot();
        let context = build_context(
            self.mode,
            &source,
            &self.transcript.turns()[..index],
            snapshot.as_ref(),
        );

        let generator = self.generator.clone();
        match generator.stream(&api_key, context).await {
            Ok(stream) => self.consume_stream(index, stream).await,
            Err(e) => {
                tracing::warn!("generation request failed: {e}");
                self.fail_generation(index)
            }
        }
    }

    async fn consume_stream(&mut self, index: usize, mut stream: MessageEventStream) -> Step {
        self.emit(SessionEvent::StreamStarted { index });

        let mut failed = false;
        while let Some(event) = stream.next().await {
            match event {
                MessageEvent::Start { .. } => {}
                MessageEvent::ThinkingDelta { delta } => {
                    self.transcript.append_reasoning(&delta);
                    self.emit(SessionEvent::ReasoningDelta { index, delta });
                }
                MessageEvent::TextDelta { delta } => {
                    self.transcript.append_answer(&delta);
                    self.emit(SessionEvent::AnswerDelta { index, delta });
                }
                MessageEvent::Done { .. } => break,
                MessageEvent::Error { message } => {
                    tracing::warn!("generation stream failed: {message}");
                    failed = true;
                    break;
                }
            }
        }
        if failed {
            return self.fail_generation(index);
        }

        let turn = &self.transcript.turns()[index];
        let answer = turn.text.clone();
        let title = turn.reasoning.as_deref().map(reasoning_title);
        self.emit(SessionEvent::StreamFinished {
            index,
            reasoning_title: title,
        });

        // The stripped answer overwrites the artifact even when empty; the
        // compile diagnostic then says what went wrong.
        let code = strip_code_fences(&answer);
        let version = self.write_artifact(code, Provenance::Generated { turn: index });
        self.owes_visual_check = true;

        self.transcript.replace_open_text(GENERATION_SUCCESS_NOTICE);
        self.transcript.close_open();
        self.emit(SessionEvent::TurnAmended {
            index,
            text: GENERATION_SUCCESS_NOTICE.to_string(),
        });

        Step::CompileCheck { version }
    }

    fn fail_generation(&mut self, index: usize) -> Step {
        if self.transcript.turns()[index].text.is_empty() {
            self.transcript.replace_open_text(GENERATION_ERROR_NOTICE);
            self.transcript.close_open();
            self.emit(SessionEvent::TurnAmended {
                index,
                text: GENERATION_ERROR_NOTICE.to_string(),
            });
        } else {
            // keep whatever partial answer streamed in, apologize after it
            self.transcript.close_open();
            let apology = self.transcript.push_agent(GENERATION_ERROR_NOTICE);
            self.emit_turn_appended(apology);
        }
        Step::Settle(SettleOutcome::GaveUp)
    }

    /// Wait for the debounced compile of `version` (or newer) and decide
    /// what the outcome demands.
    async fn compile_step(&mut self, version: u64) -> Step {
        let Some(outcome) = compile::await_outcome(&mut self.outcome_rx, version).await else {
            // driver gone; only happens at shutdown
            return Step::Settle(SettleOutcome::GaveUp);
        };

        match outcome.result {
            CompileResult::Success { .. } => {
                self.budget.reset_compile();
                if self.owes_visual_check && self.last_user_request.is_some() {
                    Step::Verify
                } else {
                    Step::Settle(SettleOutcome::Ok)
                }
            }
            CompileResult::Failure { diagnostic } => {
                if self.budget.compile_exhausted() {
                    let index = self
                        .transcript
                        .push_agent(compile_exhausted_notice(&diagnostic));
                    self.emit_turn_appended(index);
                    return Step::Settle(SettleOutcome::GaveUp);
                }
                self.budget.consume_compile_retry();
                let index = self.transcript.push_user(compile_repair_prompt(&diagnostic));
                self.emit_turn_appended(index);
                Step::Generate
            }
        }
    }

    /// One visual verification round over the four-angle snapshots. When
    /// there is nothing to verify with (no key, no snapshots, a dead
    /// verifier) the verifying turn is closed as-is and the cycle settles
    /// as an unobservable pass.
    async fn verify_step(&mut self) -> Step {
        self.owes_visual_check = false;

        let index = self.transcript.open_agent(VERIFYING_NOTICE);
        self.emit_turn_appended(index);
        self.emit(SessionEvent::VerificationStarted);

        tokio::time::sleep(SETTLE_DELAY).await;

        let Some(api_key) = self.credentials.get(API_KEY_NAME) else {
            self.transcript.close_open();
            return Step::Settle(SettleOutcome::Ok);
        };

        let snapshots = self.render.capture_multi_angle();
        if snapshots.is_empty() {
            self.transcript.close_open();
            return Step::Settle(SettleOutcome::Ok);
        }

        // always the original request, never a corrective prompt
        let request = self.last_user_request.clone().unwrap_or_default();

        let verifier = self.verifier.clone();
        let verdict = match verifier.verify(&api_key, &request, &snapshots).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!("visual verification failed: {e}");
                self.transcript.close_open();
                return Step::Settle(SettleOutcome::Ok);
            }
        };

        self.transcript.replace_open_text(verdict.clone());
        self.transcript.close_open();
        self.emit(SessionEvent::TurnAmended {
            index,
            text: verdict.clone(),
        });

        if verdict_passes(&verdict) {
            self.budget.reset_verify();
            return Step::Settle(SettleOutcome::Ok);
        }

        if self.budget.verify_exhausted() {
            let notice = self.transcript.push_agent(VERIFY_EXHAUSTED_NOTICE);
            self.emit_turn_appended(notice);
            self.budget.reset_verify();
            return Step::Settle(SettleOutcome::GaveUp);
        }

        let attempt = self.budget.verify_retries() + 1;
        self.budget.consume_verify_retry();
        let notice = self.transcript.push_agent(verify_repair_notice(attempt));
        self.emit_turn_appended(notice);
        let prompt = self.transcript.push_user(verify_repair_prompt(&verdict));
        self.emit_turn_appended(prompt);
        Step::Generate
    }

    fn write_artifact(&mut self, source: impl Into<String>, provenance: Provenance) -> u64 {
        let version = self.store.write(source, provenance);
        self.emit(SessionEvent::ArtifactChanged {
            version,
            provenance,
        });
        version
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn emit_turn_appended(&self, index: usize) {
        if let Some(turn) = self.transcript.get(index) {
            self.emit(SessionEvent::TurnAppended {
                index,
                turn: turn.clone(),
            });
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

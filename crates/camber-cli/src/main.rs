//! camber - conversational OpenSCAD modeling CLI

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use camber_agent::artifact::ArtifactStore;
use camber_agent::generate::GeminiGenerator;
use camber_agent::ports::{API_KEY_ENV, API_KEY_NAME, CredentialStore, RenderPort};
use camber_agent::session::{Session, SessionConfig};
use camber_agent::verify::GeminiVerifier;
use camber_agent::{Mode, SessionEvent, Speaker};
use camber_scad::{OpenScadCompiler, SnapshotRenderer};
use clap::Parser;
use tokio::sync::broadcast;

use crate::commands::CommandResult;
use crate::config::{Config, FileCredentials};

/// camber - describe a part, get OpenSCAD code, a compiled mesh, and a
/// visual sanity check
#[derive(Parser, Debug)]
#[command(name = "camber")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: gemini-3-pro-preview)
    #[arg(short, long)]
    model: Option<String>,

    /// Generate robot modules with interlocking connectors
    #[arg(long)]
    robot: bool,

    /// Run a single request and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// OpenSCAD binary to invoke
    #[arg(long)]
    openscad_bin: Option<String>,

    /// Config file location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("camber=debug,camber_ai=debug,camber_agent=debug,camber_scad=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = Config::resolve_path(args.config.as_deref());

    // Initialize config and exit
    if args.init_config {
        let Some(path) = config_path else {
            eprintln!("Error: no config directory available");
            std::process::exit(1);
        };
        match Config::init(&path) {
            Ok(()) => println!("Config file created at: {}", path.display()),
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Load config file
    let cfg = config_path
        .as_deref()
        .map(Config::load_from)
        .unwrap_or_default();

    // Merge config with CLI args (CLI takes precedence)
    let mode = if args.robot || cfg.robot.unwrap_or(false) {
        Mode::Robot
    } else {
        Mode::General
    };

    let model = match args.model.or(cfg.model).as_deref() {
        Some(choice) => camber_ai::models::get_model(choice)
            .unwrap_or_else(|| camber_ai::models::custom(choice)),
        None => camber_ai::models::default_model(),
    };

    let credentials: Arc<dyn CredentialStore> = Arc::new(FileCredentials::new(config_path));

    // A missing key is not fatal: the session reports it per request and
    // /key can store one without restarting
    if credentials.get(API_KEY_NAME).is_none() {
        eprintln!("No Gemini API key found.");
        eprintln!("Set it with: export {}=your-key", API_KEY_ENV);
        eprintln!("Or store it from the prompt with: /key your-key");
        eprintln!();
    }

    let openscad_bin = args
        .openscad_bin
        .or(cfg.openscad_bin)
        .unwrap_or_else(|| "openscad".to_string());
    let mut compiler = OpenScadCompiler::new(openscad_bin);
    if mode.is_robot() {
        compiler = compiler.with_connector_library();
    }
    if let Some(secs) = cfg.compile_timeout_secs {
        compiler = compiler.with_timeout(Duration::from_secs(secs));
    }

    let store = Arc::new(ArtifactStore::new());
    let render: Arc<dyn RenderPort> = Arc::new(SnapshotRenderer::new(store.clone()));

    let mut session = Session::new(SessionConfig {
        mode,
        store,
        generator: Arc::new(GeminiGenerator::new(model.clone())),
        verifier: Arc::new(GeminiVerifier::new(model)),
        compiler: Arc::new(compiler),
        render: render.clone(),
        credentials: credentials.clone(),
    });

    // Non-interactive mode
    if let Some(request) = args.command {
        return run_command(&mut session, &request).await;
    }

    run_interactive(&mut session, render, credentials).await
}

async fn run_command(session: &mut Session, request: &str) -> anyhow::Result<()> {
    println!("camber> {}", request);
    println!();

    let receiver = session.subscribe();
    let is_tty = std::io::IsTerminal::is_terminal(&std::io::stdout());
    let handle = tokio::spawn(print_events(receiver, is_tty));

    session.submit(request).await;

    // Wait a bit for final events
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.abort();

    Ok(())
}

async fn run_interactive(
    session: &mut Session,
    render: Arc<dyn RenderPort>,
    credentials: Arc<dyn CredentialStore>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let is_tty = std::io::IsTerminal::is_terminal(&io::stdout());

    if let Some(greeting) = session.transcript().last() {
        println!("{}", greeting.text);
    }
    println!("({} mode; /help for commands)", session.mode());
    println!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        // Handle slash commands
        if let Some(result) = commands::execute_command(input, session.mode()) {
            match result {
                CommandResult::Message(msg) => {
                    println!("{}", msg);
                }
                CommandResult::ShowCode => {
                    println!("{}", session.source());
                }
                CommandResult::LoadFile(path) => match std::fs::read_to_string(&path) {
                    Ok(source) => {
                        let handle = tokio::spawn(print_events(session.subscribe(), is_tty));
                        session.manual_edit(source).await;
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        handle.abort();
                    }
                    Err(e) => {
                        println!("Could not read {}: {}", path.display(), e);
                    }
                },
                CommandResult::Export(path) => {
                    let target = path.unwrap_or_else(default_export_path);
                    match render.export_binary(&target) {
                        Ok(written) => println!("Saved {}", written.display()),
                        Err(e) => println!("Export failed: {}", e),
                    }
                }
                CommandResult::SetKey(key) => match credentials.set(API_KEY_NAME, &key) {
                    Ok(()) => println!("API key saved."),
                    Err(e) => println!("Could not save the key: {}", e),
                },
                CommandResult::Exit => {
                    break;
                }
                CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        println!();

        // Spawn event handler for this request
        let handle = tokio::spawn(print_events(session.subscribe(), is_tty));

        session.submit(input).await;

        // Wait for events to finish
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        println!();
    }

    Ok(())
}

/// Streams session events to stdout: reasoning dimmed, answers live,
/// compile and verification status in brackets
async fn print_events(mut events: broadcast::Receiver<SessionEvent>, is_tty: bool) {
    use std::io::Write;

    let mut in_reasoning = false;
    let mut streamed_answer = false;
    while let Ok(event) = events.recv().await {
        match event {
            SessionEvent::StreamStarted { .. } => {
                in_reasoning = false;
                streamed_answer = false;
            }
            SessionEvent::ReasoningDelta { delta, .. } => {
                if !is_tty {
                    continue;
                }
                if !in_reasoning {
                    print!("\x1b[2m");
                    in_reasoning = true;
                }
                print!("{}", delta);
                std::io::stdout().flush().ok();
            }
            SessionEvent::AnswerDelta { delta, .. } => {
                if in_reasoning {
                    println!("\x1b[0m");
                    in_reasoning = false;
                }
                streamed_answer = true;
                print!("{}", delta);
                std::io::stdout().flush().ok();
            }
            SessionEvent::StreamFinished {
                reasoning_title, ..
            } => {
                if in_reasoning {
                    print!("\x1b[0m");
                    in_reasoning = false;
                }
                if streamed_answer {
                    println!();
                }
                if is_tty {
                    if let Some(title) = reasoning_title {
                        println!("\x1b[2m[{}]\x1b[0m", title);
                    }
                }
            }
            SessionEvent::TurnAppended { turn, .. } => {
                if turn.speaker == Speaker::Agent && !turn.text.is_empty() {
                    println!("{}", turn.text);
                }
            }
            SessionEvent::TurnAmended { text, .. } => {
                println!("{}", text);
            }
            SessionEvent::CompileStarted { .. } => {
                println!("[compiling...]");
            }
            SessionEvent::CompileSucceeded { version } => {
                println!("[compiled v{}]", version);
            }
            SessionEvent::CompileFailed { diagnostic, .. } => {
                println!("[compile error] {}", diagnostic);
            }
            _ => {}
        }
    }
}

/// model_<unix-millis>.stl in the current directory
fn default_export_path() -> PathBuf {
    PathBuf::from(format!(
        "model_{}.stl",
        chrono::Utc::now().timestamp_millis()
    ))
}

//! Slash commands for interactive mode

mod mode;

pub use mode::ModeCommand;

use std::path::PathBuf;

use camber_agent::Mode;

/// Result of executing a slash command
pub enum CommandResult {
    /// Show a message to the user (not sent to the model)
    Message(String),
    /// Print the current artifact source
    ShowCode,
    /// Replace the artifact with a file's contents and recompile
    LoadFile(PathBuf),
    /// Save the compiled mesh, to the given path or a generated name
    Export(Option<PathBuf>),
    /// Store an API key in the config file
    SetKey(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, current_mode: Mode) -> Option<CommandResult> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let parts: Vec<&str> = input[1..].splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "code" | "c" => CommandResult::ShowCode,

        "load" | "l" => {
            if args.is_empty() {
                CommandResult::Message("Usage: /load <path>".to_string())
            } else {
                CommandResult::LoadFile(PathBuf::from(args))
            }
        }

        "export" | "e" => {
            if args.is_empty() {
                CommandResult::Export(None)
            } else {
                CommandResult::Export(Some(PathBuf::from(args)))
            }
        }

        "key" | "k" => {
            if args.is_empty() {
                CommandResult::Message("Usage: /key <api-key>".to_string())
            } else {
                CommandResult::SetKey(args.to_string())
            }
        }

        "mode" | "m" => ModeCommand::execute(args, current_mode),

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /code, /c            Print the current OpenSCAD source
  /load, /l <path>     Replace the source with a file's contents
  /export, /e [path]   Save the compiled model as binary STL
  /key, /k <value>     Store the Gemini API key in the config file
  /mode, /m            Show the session mode
  /quit, /exit, /q     Exit camber

Examples:
  /load revised.scad   Compile a hand-edited file
  /export turret.stl   Save the last compiled mesh
  /export              Save under a generated model_<timestamp>.stl name"#
        .to_string()
}

//! /mode command - show the session mode

use super::CommandResult;
use camber_agent::Mode;

pub struct ModeCommand;

impl ModeCommand {
    /// Execute /mode command - reports the mode; switching needs a restart
    /// because the greeting, seed code, and system prompt are per-session
    pub fn execute(args: &str, current_mode: Mode) -> CommandResult {
        if args.is_empty() {
            let detail = match current_mode {
                Mode::General => "free-form modeling",
                Mode::Robot => "robot modules with interlocking connectors",
            };
            CommandResult::Message(format!("Mode: {current_mode} ({detail})"))
        } else {
            CommandResult::Message(
                "The mode is fixed per session. Restart with --robot to switch.".to_string(),
            )
        }
    }
}

use std::collections::VecDeque;
use std::io::BufRead;

use engine::{InputAction, InputPoll, InputSnapshot, InputSource};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::gameplay::ChallengeResultSender;

/// One line of a play script.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ScriptCommand {
    /// Hold the given directions for a number of ticks.
    Move {
        directions: Vec<InputAction>,
        ticks: u32,
    },
    /// Press edge for one tick.
    Press(InputAction),
    Wait {
        ticks: u32,
    },
    /// A challenge result, as the challenge surface would post it.
    Result(Value),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("script line {line}: {reason} (usage: {usage})")]
pub(crate) struct ScriptError {
    line: usize,
    reason: String,
    usage: &'static str,
}

const MOVE_USAGE: &str = "move <up|down|left|right>[+...] <ticks>";
const WAIT_USAGE: &str = "wait <ticks>";
const RESULT_USAGE: &str = "result <json>";
const COMMAND_USAGE: &str = "move | press | up | down | wait | result | quit";

/// Parses one script line; blank lines and `#` comments yield `None`.
pub(crate) fn parse_script_line(
    line_number: usize,
    line: &str,
) -> Result<Option<ScriptCommand>, ScriptError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let error = |reason: String, usage: &'static str| ScriptError {
        line: line_number,
        reason,
        usage,
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "move" => {
            let args: Vec<&str> = rest.split_whitespace().collect();
            let [directions, ticks] = args.as_slice() else {
                return Err(error(
                    "expected <directions> <ticks>".to_string(),
                    MOVE_USAGE,
                ));
            };
            let directions = directions
                .split('+')
                .map(|name| {
                    parse_direction(name)
                        .ok_or_else(|| error(format!("unknown direction '{name}'"), MOVE_USAGE))
                })
                .collect::<Result<Vec<_>, _>>()?;
            ScriptCommand::Move {
                directions,
                ticks: parse_ticks(ticks).map_err(|reason| error(reason, MOVE_USAGE))?,
            }
        }
        "press" | "up" | "down" if !rest.is_empty() => {
            return Err(error("takes no arguments".to_string(), COMMAND_USAGE));
        }
        "press" => ScriptCommand::Press(InputAction::Action),
        "up" => ScriptCommand::Press(InputAction::MoveUp),
        "down" => ScriptCommand::Press(InputAction::MoveDown),
        "wait" => ScriptCommand::Wait {
            ticks: parse_ticks(rest).map_err(|reason| error(reason, WAIT_USAGE))?,
        },
        "result" => {
            let payload = serde_json::from_str::<Value>(rest)
                .map_err(|err| error(format!("invalid json: {err}"), RESULT_USAGE))?;
            ScriptCommand::Result(payload)
        }
        "quit" => ScriptCommand::Quit,
        other => {
            return Err(error(format!("unknown command '{other}'"), COMMAND_USAGE));
        }
    };
    Ok(Some(command))
}

fn parse_direction(name: &str) -> Option<InputAction> {
    match name.to_ascii_lowercase().as_str() {
        "up" => Some(InputAction::MoveUp),
        "down" => Some(InputAction::MoveDown),
        "left" => Some(InputAction::MoveLeft),
        "right" => Some(InputAction::MoveRight),
        _ => None,
    }
}

fn parse_ticks(raw: &str) -> Result<u32, String> {
    match raw.parse::<u32>() {
        Ok(ticks) if ticks > 0 => Ok(ticks),
        _ => Err(format!("invalid tick count '{raw}' (expected positive integer)")),
    }
}

/// Feeds the loop from a line script. Each tick consumes one queued poll; a new line is
/// read only when the queue is empty, so a blocking reader blocks the loop.
pub(crate) struct ScriptInput {
    lines: Box<dyn BufRead>,
    line_number: usize,
    queued: VecDeque<(InputPoll, u32)>,
    challenge_results: ChallengeResultSender,
    exhausted: bool,
}

impl ScriptInput {
    pub(crate) fn new(lines: Box<dyn BufRead>, challenge_results: ChallengeResultSender) -> Self {
        Self {
            lines,
            line_number: 0,
            queued: VecDeque::new(),
            challenge_results,
            exhausted: false,
        }
    }

    fn next_queued(&mut self) -> Option<InputPoll> {
        let (poll, remaining) = self.queued.front_mut()?;
        let poll = *poll;
        *remaining -= 1;
        if *remaining == 0 {
            self.queued.pop_front();
        }
        Some(poll)
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.lines.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                self.line_number += 1;
                Some(line)
            }
            Err(err) => {
                warn!(error = %err, line = self.line_number + 1, "script_read_failed");
                None
            }
        }
    }

    fn enqueue(&mut self, command: ScriptCommand) {
        match command {
            ScriptCommand::Move { directions, ticks } => {
                let snapshot = directions
                    .into_iter()
                    .fold(InputSnapshot::empty(), |snapshot, action| {
                        snapshot.with_action_down(action, true)
                    });
                self.queued.push_back((InputPoll::Frame(snapshot), ticks));
            }
            ScriptCommand::Press(action) => {
                let snapshot = InputSnapshot::empty()
                    .with_action_down(action, true)
                    .with_action_pressed(action);
                self.queued.push_back((InputPoll::Frame(snapshot), 1));
            }
            ScriptCommand::Wait { ticks } => {
                self.queued.push_back((InputPoll::Idle, ticks));
            }
            ScriptCommand::Result(payload) => {
                if !self.challenge_results.send(payload) {
                    warn!(line = self.line_number, "script_result_receiver_gone");
                }
            }
            ScriptCommand::Quit => {
                let snapshot = InputSnapshot::empty().with_quit_requested(true);
                self.queued.push_back((InputPoll::Frame(snapshot), 1));
            }
        }
    }
}

impl InputSource for ScriptInput {
    fn poll(&mut self) -> InputPoll {
        loop {
            if let Some(poll) = self.next_queued() {
                return poll;
            }
            if self.exhausted {
                return InputPoll::Closed;
            }
            let Some(line) = self.read_line() else {
                self.exhausted = true;
                info!(lines = self.line_number, "script_finished");
                continue;
            };
            match parse_script_line(self.line_number, &line) {
                Ok(Some(command)) => {
                    debug!(line = self.line_number, ?command, "script_command");
                    self.enqueue(command);
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "script_line_rejected"),
            }
        }
    }
}

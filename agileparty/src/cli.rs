//! Slash-command parser for the line-oriented client.

use agileparty_proto::command::Command;
use agileparty_proto::room::{VOTE_DECK, is_valid_vote};
use agileparty_proto::task::TaskId;

/// Shown for `/help` and after an input error.
pub const HELP: &str = "\
commands:
  /vote <value>          cast a vote (0 0.5 1 2 3 5 8 13 20 40 100 ?)
  /reveal                reveal the round
  /clear                 start a new round
  /nick <name>           change your display name
  /task <description>    set the room's task description
  /add <headline>        add a task to the backlog
  /edit <id> <headline>  rename a task
  /rm <id>               delete a task
  /active <id>           open a task for voting
  /order <id>...         reorder the backlog
  /reconnect             reconnect after giving up
  /quit                  leave the room";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Send this command to the room.
    Send(Command),
    /// Reopen the connection.
    Reconnect,
    /// Print [`HELP`].
    Help,
    /// Leave and exit.
    Quit,
}

/// Why a line could not be turned into an [`Input`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// The line does not start with `/`.
    #[error("commands start with '/', try /help")]
    NotACommand,

    /// The command name is not known.
    #[error("unknown command /{0}, try /help")]
    Unknown(String),

    /// A required argument is missing.
    #[error("usage: {0}")]
    MissingArgument(&'static str),

    /// The vote is not a card of the deck.
    #[error("'{0}' is not a card, pick one of {deck}", deck = VOTE_DECK.join(" "))]
    InvalidVote(String),
}

/// Parses one input line.
///
/// # Errors
///
/// Returns [`InputError`] for anything that should not be sent.
pub fn parse(line: &str) -> Result<Input, InputError> {
    let line = line.trim();
    let Some(body) = line.strip_prefix('/') else {
        return Err(InputError::NotACommand);
    };
    let (name, rest) = body
        .split_once(char::is_whitespace)
        .map_or((body, ""), |(name, rest)| (name, rest.trim()));

    let command = match name {
        "quit" | "exit" => return Ok(Input::Quit),
        "help" => return Ok(Input::Help),
        "reconnect" => return Ok(Input::Reconnect),
        "vote" => {
            let value = required(rest, "/vote <value>")?;
            if !is_valid_vote(value) {
                return Err(InputError::InvalidVote(value.to_string()));
            }
            Command::vote(value)
        }
        "reveal" => Command::Reveal {},
        "clear" => Command::Clear {},
        "nick" => Command::UpdateNickname {
            nickname: required(rest, "/nick <name>")?.to_string(),
        },
        "task" => Command::SetTask {
            description: required(rest, "/task <description>")?.to_string(),
        },
        "add" => Command::create_task(required(rest, "/add <headline>")?),
        "edit" => {
            let usage = "/edit <id> <headline>";
            let (id, headline) = required(rest, usage)?
                .split_once(char::is_whitespace)
                .ok_or(InputError::MissingArgument(usage))?;
            Command::update_task(id, required(headline.trim(), usage)?)
        }
        "rm" => Command::DeleteTask {
            task_id: TaskId::new(required(rest, "/rm <id>")?),
        },
        "active" => Command::SetActiveTask {
            task_id: TaskId::new(required(rest, "/active <id>")?),
        },
        "order" => Command::ReorderTasks {
            task_ids: required(rest, "/order <id>...")?
                .split_whitespace()
                .map(TaskId::from)
                .collect(),
        },
        other => return Err(InputError::Unknown(other.to_string())),
    };
    Ok(Input::Send(command))
}

fn required<'a>(arg: &'a str, usage: &'static str) -> Result<&'a str, InputError> {
    if arg.is_empty() {
        Err(InputError::MissingArgument(usage))
    } else {
        Ok(arg)
    }
}

//! Line-based room driver
//!
//! Parses stdin commands into room intents and renders room events.

use agora_core::{SessionState, Stance};
use agora_net::{Action, Applied, Dispatch, RoomEvent, SkipReason};

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Act(Action),
    Status,
    Leave,
    Help,
    Invalid(String),
}

pub fn parse_line(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let input = match word {
        "start" => Input::Act(Action::Start),
        "pause" => Input::Act(Action::Pause),
        "end" => Input::Act(Action::End),
        "vote-start" => Input::Act(Action::StartVoting),
        "vote" => match rest {
            "for" => Input::Act(Action::Vote(Stance::For)),
            "against" => Input::Act(Action::Vote(Stance::Against)),
            _ => Input::Invalid("usage: vote for|against".into()),
        },
        "say" => Input::Act(Action::SendChat(rest.to_string())),
        "argue" => Input::Act(Action::SubmitArgument(rest.to_string())),
        "status" => Input::Status,
        "leave" | "quit" => Input::Leave,
        "help" => Input::Help,
        other => Input::Invalid(format!("unknown command: {}", other)),
    };
    Some(input)
}

pub const HELP: &str = "commands: start | pause | end | vote-start | vote for|against | say <text> | argue <text> | status | leave";

/// Human-readable line for an event, if it deserves one
pub fn describe(event: &RoomEvent, state: &SessionState) -> Option<String> {
    let line = match event {
        RoomEvent::SnapshotLoaded => format!(
            "room {} \"{}\" [{}] {}",
            state.room_id(),
            state.session().topic,
            state.phase(),
            state.countdown().format()
        ),
        RoomEvent::Joined(me) => format!("joined as {} ({})", me.name, side_label(me.side.stance())),
        RoomEvent::Applied(applied) => describe_applied(applied, state)?,
        RoomEvent::Malformed(reason) => format!("! discarded message: {}", reason),
        RoomEvent::TimeExpired => "time is up".to_string(),
        RoomEvent::Dispatched {
            outcome: Dispatch::Skipped(reason),
            ..
        } => format!("! not sent: {}", skip_label(reason)),
        RoomEvent::Dispatched { .. } => return None,
        RoomEvent::Fatal(reason) => format!("could not enter room: {}", reason),
        RoomEvent::ChannelLost(reason) => format!("connection lost: {}", reason),
        RoomEvent::Left => "left room".to_string(),
    };
    Some(line)
}

fn describe_applied(applied: &Applied, state: &SessionState) -> Option<String> {
    let line = match applied {
        Applied::Roster { count } => format!("{} participant(s) present", count),
        Applied::Chat => {
            let event = state.chat().last()?;
            format!("[{}] {}: {}", event.format_timestamp(), event.sender, event.content)
        }
        Applied::Phase(_) => format!(
            "phase {} {} {}",
            state.phase(),
            state.countdown().format(),
            state.session().last_message
        ),
        Applied::Tally(tally) => format!("votes for {} / against {}", tally.for_count, tally.against_count),
        Applied::Argument => {
            let argument = state.arguments().last()?;
            let author = argument
                .participant_name
                .as_deref()
                .unwrap_or(&argument.participant_id);
            format!("<{}> {}: {}", argument.side, author, argument.text)
        }
    };
    Some(line)
}

/// Multi-line summary for the `status` command
pub fn summary(state: &SessionState) -> String {
    let mut out = format!(
        "{} | {} | {} | {}",
        state.room_id(),
        state.session().topic,
        state.phase(),
        state.countdown().format()
    );
    for p in state.roster() {
        let marker = if state.me().is_some_and(|me| me.id == p.id) { "*" } else { " " };
        out.push_str(&format!("\n {}{} ({})", marker, p.name, side_label(p.side.stance())));
    }
    let tally = state.tally();
    out.push_str(&format!("\n votes for {} / against {}", tally.for_count, tally.against_count));
    out
}

fn side_label(stance: Option<Stance>) -> &'static str {
    stance.map(|s| s.as_str()).unwrap_or("no side")
}

fn skip_label(reason: &SkipReason) -> String {
    match reason {
        SkipReason::NotConnected => "not connected".into(),
        SkipReason::MissingIdentity => "not joined yet".into(),
        SkipReason::NoSide => "you have no side".into(),
        SkipReason::EmptyContent => "nothing to send".into(),
        SkipReason::InvalidTransition { from, to } => format!("cannot go from {} to {}", from, to),
    }
}

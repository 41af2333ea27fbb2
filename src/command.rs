use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{digit1, hex_digit1, one_of, space0, space1},
    combinator::{all_consuming, map, map_res, opt, value},
    sequence::{preceded, tuple},
    IResult,
};

use crate::coordinator::queue::QueuedCommand;
use crate::coordinator::sequencer::DEFAULT_ERROR_PARAM;
use crate::fronius::packet::ERROR_MAGIC;

pub const HELP: &str = "Available commands: GetSWVersion, GetDevType, GetActiveInverters, \
                        ActivateError xx yy, debug 0|1|2, truncate, exit";

/// A line received from the monitoring server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ControlCommand {
    Exit,
    Ok,
    Truncate,
    Debug(u8),
    Help,
    Queue(QueuedCommand),
    Unknown(String),
}

impl ControlCommand {
    /// Commands are matched without regard to case. Anything unrecognised,
    /// including out of range parameters, comes back as `Unknown`.
    pub fn parse(text: &str) -> Self {
        let text = text.trim_end_matches(['\0', '\r', '\n']);

        match all_consuming(command)(text) {
            Ok((_, command)) => command,
            Err(_) => Self::Unknown(text.to_string()),
        }
    }
}

fn command(input: &str) -> IResult<&str, ControlCommand> {
    alt((
        value(ControlCommand::Exit, tag_no_case("exit")),
        value(ControlCommand::Ok, tag_no_case("ok")),
        value(ControlCommand::Truncate, tag_no_case("truncate")),
        value(ControlCommand::Help, tag_no_case("help")),
        debug_level,
        value(
            ControlCommand::Queue(QueuedCommand::GetVersion),
            tag_no_case("GetSWVersion"),
        ),
        value(
            ControlCommand::Queue(QueuedCommand::GetDeviceType),
            tag_no_case("GetDevType"),
        ),
        value(
            ControlCommand::Queue(QueuedCommand::GetActiveInverters),
            tag_no_case("GetActiveInverters"),
        ),
        activate_error,
    ))(input)
}

fn debug_level(input: &str) -> IResult<&str, ControlCommand> {
    map(
        preceded(tuple((tag_no_case("debug"), space1)), one_of("012")),
        |c: char| ControlCommand::Debug(c as u8 - b'0'),
    )(input)
}

fn decimal_u8(input: &str) -> IResult<&str, u8> {
    map_res(digit1, str::parse::<u8>)(input)
}

fn hex_u8(input: &str) -> IResult<&str, u8> {
    map_res(hex_digit1, |s| u8::from_str_radix(s, 16))(input)
}

// ActivateError [p1 decimal] [p2 hex]
fn activate_error(input: &str) -> IResult<&str, ControlCommand> {
    let (input, _) = tag_no_case("ActivateError")(input)?;
    let (input, p1) = opt(preceded(space0, decimal_u8))(input)?;
    let (input, p2) = match p1 {
        Some(_) => opt(preceded(space1, hex_u8))(input)?,
        None => (input, None),
    };
    let (input, _) = space0(input)?;

    let command = match (p1, p2) {
        (None, _) => QueuedCommand::ActivateError {
            p1: DEFAULT_ERROR_PARAM,
            p2: None,
        },
        (Some(p1), None) => QueuedCommand::ActivateError {
            p1,
            p2: Some(ERROR_MAGIC),
        },
        (Some(p1), Some(p2)) => QueuedCommand::ActivateError { p1, p2: Some(p2) },
    };

    Ok((input, ControlCommand::Queue(command)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_commands_ignore_case() {
        assert_eq!(ControlCommand::parse("EXIT"), ControlCommand::Exit);
        assert_eq!(ControlCommand::parse("Ok"), ControlCommand::Ok);
        assert_eq!(ControlCommand::parse("truncate"), ControlCommand::Truncate);
        assert_eq!(ControlCommand::parse("Help"), ControlCommand::Help);
        assert_eq!(
            ControlCommand::parse("getswversion"),
            ControlCommand::Queue(QueuedCommand::GetVersion)
        );
    }

    #[test]
    fn debug_levels() {
        assert_eq!(ControlCommand::parse("debug 2"), ControlCommand::Debug(2));
        assert_eq!(ControlCommand::parse("DEBUG 0"), ControlCommand::Debug(0));
        assert!(matches!(ControlCommand::parse("debug 3"), ControlCommand::Unknown(_)));
    }

    #[test]
    fn activate_error_params() {
        assert_eq!(
            ControlCommand::parse("ActivateError"),
            ControlCommand::Queue(QueuedCommand::ActivateError { p1: 2, p2: None })
        );
        assert_eq!(
            ControlCommand::parse("activateerror 17"),
            ControlCommand::Queue(QueuedCommand::ActivateError { p1: 17, p2: Some(0x55) })
        );
        assert_eq!(
            ControlCommand::parse("ActivateError 3 aa"),
            ControlCommand::Queue(QueuedCommand::ActivateError { p1: 3, p2: Some(0xaa) })
        );
    }

    #[test]
    fn bare_activate_error_is_flagged() {
        for text in ["ActivateError", "ActivateError  ", "ACTIVATEERROR\r\n"] {
            match ControlCommand::parse(text) {
                ControlCommand::Queue(queued) => assert!(queued.is_bare_activation(), "{}", text),
                other => panic!("{:?} parsed as {:?}", text, other),
            }
        }

        match ControlCommand::parse("ActivateError 4") {
            ControlCommand::Queue(queued) => assert!(!queued.is_bare_activation()),
            other => panic!("parsed as {:?}", other),
        }
    }

    #[test]
    fn out_of_range_param_is_unknown() {
        assert_eq!(
            ControlCommand::parse("ActivateError 300"),
            ControlCommand::Unknown("ActivateError 300".to_string())
        );
    }

    #[test]
    fn unknown_text() {
        assert_eq!(
            ControlCommand::parse("reboot now"),
            ControlCommand::Unknown("reboot now".to_string())
        );
    }
}

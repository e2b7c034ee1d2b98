//! Text Command Parser
//!
//! MilletDB speaks a line-oriented protocol: one command per line, fields
//! separated by whitespace. A `SET` value is the remainder of the line
//! after the key, so values may contain spaces; runs of whitespace only
//! collapse between the command word and the key.

use bytes::Bytes;
use thiserror::Error;

/// Errors produced while turning a line into a [`Command`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Blank or whitespace-only input.
    #[error("empty command")]
    Empty,

    /// The command word is not one we understand.
    #[error("unknown command '{0}'")]
    Unknown(String),

    /// A recognized command is missing required arguments.
    #[error("{0}")]
    MissingArguments(&'static str),

    /// EXPIRE was given a TTL that does not parse as an integer.
    #[error("invalid TTL value")]
    InvalidTtl,
}

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: Bytes, value: Bytes },
    Get { key: Bytes },
    Del { key: Bytes },
    Expire { key: Bytes, ttl_millis: i64 },
    Ping,
    Stats,
    Quit,
}

impl Command {
    /// Parses one protocol line. The command word is case-insensitive.
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(CommandError::Empty);
        }

        let (word, rest) = split_field(trimmed);
        match word.to_ascii_uppercase().as_str() {
            "SET" => {
                let (key, value) = split_field(rest);
                if key.is_empty() || value.is_empty() {
                    return Err(CommandError::MissingArguments(
                        "SET requires key and value",
                    ));
                }
                Ok(Command::Set {
                    key: Bytes::copy_from_slice(key.as_bytes()),
                    value: Bytes::copy_from_slice(value.as_bytes()),
                })
            }
            "GET" => {
                let key = require_single_field(rest, "GET requires key")?;
                Ok(Command::Get { key })
            }
            "DEL" => {
                let key = require_single_field(rest, "DEL requires key")?;
                Ok(Command::Del { key })
            }
            "EXPIRE" => {
                let (key, ttl) = split_field(rest);
                if key.is_empty() || ttl.is_empty() {
                    return Err(CommandError::MissingArguments(
                        "EXPIRE requires key and ttl",
                    ));
                }
                let ttl_millis: i64 = ttl.parse().map_err(|_| CommandError::InvalidTtl)?;
                Ok(Command::Expire {
                    key: Bytes::copy_from_slice(key.as_bytes()),
                    ttl_millis,
                })
            }
            "PING" => Ok(Command::Ping),
            "STATS" => Ok(Command::Stats),
            "QUIT" => Ok(Command::Quit),
            _ => Err(CommandError::Unknown(word.to_string())),
        }
    }
}

/// Splits off the first whitespace-delimited field, returning it and the
/// remainder with leading whitespace stripped.
fn split_field(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(pos) => (&input[..pos], input[pos..].trim_start()),
        None => (input, ""),
    }
}

fn require_single_field(
    rest: &str,
    missing: &'static str,
) -> Result<Bytes, CommandError> {
    let (field, _) = split_field(rest);
    if field.is_empty() {
        return Err(CommandError::MissingArguments(missing));
    }
    Ok(Bytes::copy_from_slice(field.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_parse_set() {
        assert_eq!(
            Command::parse("SET name pavan"),
            Ok(Command::Set {
                key: b("name"),
                value: b("pavan")
            })
        );
    }

    #[test]
    fn test_set_value_keeps_inner_spaces() {
        assert_eq!(
            Command::parse("SET greeting hello  world "),
            Ok(Command::Set {
                key: b("greeting"),
                value: b("hello  world")
            })
        );
    }

    #[test]
    fn test_command_word_is_case_insensitive() {
        assert_eq!(Command::parse("get k"), Ok(Command::Get { key: b("k") }));
        assert_eq!(Command::parse("PiNg"), Ok(Command::Ping));
        assert_eq!(Command::parse("stats"), Ok(Command::Stats));
        assert_eq!(Command::parse("quit"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_del_and_expire() {
        assert_eq!(Command::parse("DEL k"), Ok(Command::Del { key: b("k") }));
        assert_eq!(
            Command::parse("EXPIRE session 5000"),
            Ok(Command::Expire {
                key: b("session"),
                ttl_millis: 5000
            })
        );
        // Negative TTLs parse here; the store rejects them.
        assert_eq!(
            Command::parse("EXPIRE session -1"),
            Ok(Command::Expire {
                key: b("session"),
                ttl_millis: -1
            })
        );
    }

    #[test]
    fn test_extra_whitespace_between_fields() {
        assert_eq!(
            Command::parse("  SET   k   v"),
            Ok(Command::Set {
                key: b("k"),
                value: b("v")
            })
        );
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(Command::parse(""), Err(CommandError::Empty));
        assert_eq!(Command::parse("   \t "), Err(CommandError::Empty));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            Command::parse("FROB key"),
            Err(CommandError::Unknown("FROB".to_string()))
        );
    }

    #[test]
    fn test_missing_arguments() {
        assert!(matches!(
            Command::parse("SET onlykey"),
            Err(CommandError::MissingArguments(_))
        ));
        assert!(matches!(
            Command::parse("GET"),
            Err(CommandError::MissingArguments(_))
        ));
        assert!(matches!(
            Command::parse("DEL "),
            Err(CommandError::MissingArguments(_))
        ));
        assert!(matches!(
            Command::parse("EXPIRE key"),
            Err(CommandError::MissingArguments(_))
        ));
    }

    #[test]
    fn test_non_numeric_ttl() {
        assert_eq!(
            Command::parse("EXPIRE key soon"),
            Err(CommandError::InvalidTtl)
        );
    }
}

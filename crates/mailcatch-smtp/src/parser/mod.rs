//! SMTP command parser.

use crate::command::Command;
use crate::types::Address;

/// Parses a command line sent by the client.
///
/// The keyword is the first four characters, matched case-insensitively;
/// anything that does not start with a known keyword is
/// [`Command::Unknown`]. Parsing never fails, since an unknown command still
/// gets a reply.
#[must_use]
pub fn parse_command(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(keyword) = line.get(..4) else {
        return Command::Unknown(line.to_string());
    };
    let argument = &line[4..];

    match keyword.to_ascii_uppercase().as_str() {
        "QUIT" => Command::Quit,
        "EHLO" => Command::Ehlo {
            hostname: argument.trim().to_string(),
        },
        "HELO" => Command::Helo {
            hostname: argument.trim().to_string(),
        },
        "MAIL" => Command::MailFrom {
            from: Address::from_argument(argument),
        },
        "RCPT" => Command::RcptTo {
            to: Address::from_argument(argument),
        },
        "DATA" => Command::Data,
        _ => Command::Unknown(line.to_string()),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_helo() {
        assert_eq!(
            parse_command("HELO client\r\n"),
            Command::Helo {
                hostname: "client".to_string()
            }
        );
    }

    #[test]
    fn test_parse_ehlo_lowercase() {
        assert_eq!(
            parse_command("ehlo  mail.example.com \r\n"),
            Command::Ehlo {
                hostname: "mail.example.com".to_string()
            }
        );
    }

    #[test]
    fn test_parse_mail_from() {
        assert_eq!(
            parse_command("MAIL FROM:<a@x.com> SIZE=10\r\n"),
            Command::MailFrom {
                from: Address::new("a@x.com")
            }
        );
    }

    #[test]
    fn test_parse_rcpt_to() {
        assert_eq!(
            parse_command("rcpt to:<b@x.com>\r\n"),
            Command::RcptTo {
                to: Address::new("b@x.com")
            }
        );
    }

    #[test]
    fn test_parse_data_and_quit() {
        assert_eq!(parse_command("DATA\r\n"), Command::Data);
        assert_eq!(parse_command("quit\r\n"), Command::Quit);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            parse_command("NOOP\r\n"),
            Command::Unknown("NOOP".to_string())
        );
        assert_eq!(parse_command("HI\r\n"), Command::Unknown("HI".to_string()));
        assert_eq!(parse_command(""), Command::Unknown(String::new()));
    }

    #[test]
    fn test_parse_non_ascii_prefix() {
        assert_eq!(parse_command("é\r\n"), Command::Unknown("é".to_string()));
    }
}

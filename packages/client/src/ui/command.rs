//! Parsing of input lines into client commands.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/join [group]`: join the given group, or the current one
    Join(Option<String>),
    /// `/leave`
    Leave,
    /// `/name <user>`
    Name(String),
    /// `/reconnect`
    Reconnect,
    /// `/help`
    Help,
    /// `/quit`
    Quit,
    /// Any line that is not a command
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Usage: /name <user>")]
    MissingUserName,

    #[error("Unknown command: /{0} (type /help for the list)")]
    Unknown(String),
}

pub const HELP: &str = "\
Commands:
  /join [group]   join a group (the current one if omitted)
  /leave          leave the current group
  /name <user>    set your name
  /reconnect      retry a failed connection
  /help           show this help
  /quit           exit
Any other line is sent to the current group.
";

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let Some(command_line) = line.strip_prefix('/') else {
            return Ok(Self::Message(line.to_string()));
        };

        let (name, argument) = match command_line.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (command_line, ""),
        };
        let argument = (!argument.is_empty()).then(|| argument.to_string());

        match name {
            "join" => Ok(Self::Join(argument)),
            "leave" => Ok(Self::Leave),
            "name" => argument.map(Self::Name).ok_or(CommandError::MissingUserName),
            "reconnect" => Ok(Self::Reconnect),
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_line_as_message() {
        // テスト項目: スラッシュで始まらない行はメッセージとして扱われる
        // given (前提条件):
        let line = "hello there";

        // when (操作):
        let command = Command::parse(line);

        // then (期待する結果):
        assert_eq!(command, Ok(Command::Message("hello there".to_string())));
    }

    #[test]
    fn test_parse_join_with_and_without_group() {
        // テスト項目: /join はグループ名の有無どちらでも解釈される
        // given (前提条件) / when (操作) / then (期待する結果):
        assert_eq!(
            Command::parse("/join lobby"),
            Ok(Command::Join(Some("lobby".to_string())))
        );
        assert_eq!(Command::parse("/join"), Ok(Command::Join(None)));
    }

    #[test]
    fn test_parse_name_keeps_spaces() {
        // テスト項目: /name の引数は空白を含めてそのままユーザー名になる
        // given (前提条件):
        let line = "/name Alice Smith";

        // when (操作):
        let command = Command::parse(line);

        // then (期待する結果):
        assert_eq!(command, Ok(Command::Name("Alice Smith".to_string())));
        assert_eq!(Command::parse("/name"), Err(CommandError::MissingUserName));
    }

    #[test]
    fn test_parse_unknown_command() {
        // テスト項目: 未知のコマンドはエラーになる
        // given (前提条件):
        let line = "/dance";

        // when (操作):
        let command = Command::parse(line);

        // then (期待する結果):
        assert_eq!(command, Err(CommandError::Unknown("dance".to_string())));
    }

    #[test]
    fn test_parse_simple_commands() {
        // テスト項目: 引数のないコマンドが解釈される
        // given (前提条件) / when (操作) / then (期待する結果):
        assert_eq!(Command::parse("/leave"), Ok(Command::Leave));
        assert_eq!(Command::parse("/reconnect"), Ok(Command::Reconnect));
        assert_eq!(Command::parse("/help"), Ok(Command::Help));
        assert_eq!(Command::parse("/quit"), Ok(Command::Quit));
    }
}

//! Command-line interface handling
//!
//! `user-service` with no argument (or `serve`) starts the HTTP server;
//! `user-service migrate` applies the embedded migrations and exits.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Migrate,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown command {0:?}, expected `serve` or `migrate`")]
pub struct UnknownCommand(String);

/// Parse the arguments following the program name.
pub fn parse_command<I>(args: I) -> Result<Command, UnknownCommand>
where
    I: IntoIterator<Item = String>,
{
    match args.into_iter().next().as_deref() {
        None | Some("serve") => Ok(Command::Serve),
        Some("migrate") => Ok(Command::Migrate),
        Some(other) => Err(UnknownCommand(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(args(&[])).unwrap(), Command::Serve);
        assert_eq!(parse_command(args(&["serve"])).unwrap(), Command::Serve);
        assert_eq!(parse_command(args(&["migrate"])).unwrap(), Command::Migrate);
        assert!(parse_command(args(&["healthcheck"])).is_err());
    }
}

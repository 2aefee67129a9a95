/// Character that marks a structured command.
pub const COMMAND_PREFIX: char = '/';

/// A structured command: lower-case name without prefix, positional args in
/// token order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

impl ParsedCommand {
    /// Positional argument, if present. Argument 0 is an optional filter/mode
    /// string for most commands; absence means "no filter", never an error.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// All arguments re-joined, for commands taking free-form tail text.
    pub fn tail(&self) -> String {
        self.args.join(" ")
    }
}

/// Classify message text. `Some` for prefixed commands, `None` for free text.
///
/// The command token is matched case-insensitively and a `@botname` suffix
/// (group-chat addressing) is stripped.
pub fn parse_command(text: &str) -> Option<ParsedCommand> {
    let rest = text.strip_prefix(COMMAND_PREFIX)?;
    let mut tokens = rest.split_whitespace();
    let token = tokens.next()?;
    let name = token
        .split('@')
        .next()
        .unwrap_or(token)
        .to_lowercase();
    if name.is_empty() {
        return None;
    }
    Some(ParsedCommand {
        name,
        args: tokens.map(str::to_string).collect(),
    })
}

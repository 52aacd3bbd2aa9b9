/// A text command already stripped of its prefix and parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play(String),
    Queue,
    Loop,
    Volume(i64),
    Clear,
    Stop,
    Disconnect,
    Skip,
    Help,
    /// Known command with missing or malformed arguments; holds the usage line.
    Usage(&'static str),
}

/// Interpreta un mensaje como comando
///
/// Returns `None` for messages without the prefix or with an unknown command.
pub fn parse_command(content: &str, prefix: &str) -> Option<Command> {
    let rest = content.trim_start().strip_prefix(prefix)?;
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    let command = match name.to_lowercase().as_str() {
        "play" | "p" if args.is_empty() => Command::Usage("play <canción o URL>"),
        "play" | "p" => Command::Play(args.to_string()),
        "queue" | "q" => Command::Queue,
        "loop" => Command::Loop,
        "volume" | "vol" => match args.parse() {
            Ok(percent) => Command::Volume(percent),
            Err(_) => Command::Usage("volume <0-200>"),
        },
        "clear" => Command::Clear,
        "stop" => Command::Stop,
        "disconnect" | "dc" | "leave" => Command::Disconnect,
        "skip" | "s" => Command::Skip,
        "help" => Command::Help,
        _ => return None,
    };

    Some(command)
}

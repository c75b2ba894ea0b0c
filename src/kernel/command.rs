use std::fmt;

/// Positions strictly above this steer LEFT, strictly below its negation steer RIGHT.
pub const STEER_THRESHOLD: f64 = 0.5;

/// Steering correction sent back to the sensor, one per control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Left,
    Right,
    None,
}

impl Command {
    /// Wire symbol, without the trailing newline.
    pub fn symbol(self) -> &'static str {
        match self {
            Command::Left => "ESQUERDA",
            Command::Right => "DIREITA",
            Command::None => "NADA",
        }
    }

    /// Exact inverse of [`Command::symbol`]. Surrounding whitespace is ignored.
    pub fn from_symbol(text: &str) -> Option<Self> {
        match text.trim() {
            "ESQUERDA" => Some(Command::Left),
            "DIREITA" => Some(Command::Right),
            "NADA" => Some(Command::None),
            _ => None,
        }
    }

    /// Newline-terminated frame for the command stream.
    pub fn wire_line(self) -> String {
        format!("{}\n", self.symbol())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Pure decision policy. The boundary values themselves fall through to `None`.
pub fn decide(position: f64) -> Command {
    if position > STEER_THRESHOLD {
        Command::Left
    } else if position < -STEER_THRESHOLD {
        Command::Right
    } else {
        Command::None
    }
}

//! Command codes understood by the device.

/// A known command code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    /// Store the name of the program to start at next boot.
    LaunchNext = 0,
    /// Liveness probe.
    Heartbeat = 1,
    /// List a directory.
    ListDir = 4096,
    /// Read a whole file.
    ReadFile = 4097,
    /// Write a whole file (`path\0content`).
    WriteFile = 4098,
    /// Delete a file or empty directory.
    DeleteFile = 4099,
    /// Copy `source\0dest`.
    DuplicateFile = 4100,
    /// Rename `source\0dest`.
    MoveFile = 4101,
    /// Create a directory.
    MakeDir = 4102,
}

impl Command {
    pub const ALL: [Command; 9] = [
        Command::LaunchNext,
        Command::Heartbeat,
        Command::ListDir,
        Command::ReadFile,
        Command::WriteFile,
        Command::DeleteFile,
        Command::DuplicateFile,
        Command::MoveFile,
        Command::MakeDir,
    ];

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.code() == code)
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::LaunchNext => "LAUNCH_NEXT",
            Command::Heartbeat => "HEARTBEAT",
            Command::ListDir => "LIST_DIR",
            Command::ReadFile => "READ_FILE",
            Command::WriteFile => "WRITE_FILE",
            Command::DeleteFile => "DELETE_FILE",
            Command::DuplicateFile => "DUPLICATE_FILE",
            Command::MoveFile => "MOVE_FILE",
            Command::MakeDir => "MAKE_DIR",
        }
    }
}

impl From<Command> for u16 {
    fn from(command: Command) -> Self {
        command.code()
    }
}

/// Human-readable name for any command code.
pub fn command_name(code: u16) -> &'static str {
    Command::from_code(code).map_or("UNKNOWN", Command::name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_wire_table() {
        assert_eq!(Command::LaunchNext.code(), 0);
        assert_eq!(Command::Heartbeat.code(), 1);
        assert_eq!(Command::ListDir.code(), 4096);
        assert_eq!(Command::MakeDir.code(), 4102);
    }

    #[test]
    fn from_code_covers_every_command() {
        for command in Command::ALL {
            assert_eq!(Command::from_code(command.code()), Some(command));
        }
        assert_eq!(Command::from_code(2), None);
        assert_eq!(Command::from_code(9999), None);
    }

    #[test]
    fn unknown_codes_have_a_name() {
        assert_eq!(command_name(4098), "WRITE_FILE");
        assert_eq!(command_name(9999), "UNKNOWN");
    }
}

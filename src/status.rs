use std::fmt;
use std::process;

/// Result of a check, ordered by severity so the worst one can be picked with `max`.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Ok,
    Unknown,
    Warning,
    Critical,
}

impl Status {
    pub fn code(&self) -> i32 {
        match self {
            Status::Ok       => 0,
            Status::Warning  => 1,
            Status::Critical => 2,
            Status::Unknown  => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Ok       => "OK",
            Status::Warning  => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown  => "UNKNOWN",
        }
    }

    pub fn exit(self) -> ! {
        process::exit(self.code())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // pad so it lines up in per-filesystem output
        f.pad(self.label())
    }
}

use std::fmt;
use std::str::FromStr;

/// A single keepalive operation against the target collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Read,
    Write,
    Increment,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Increment => "increment",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the scheduler picks the operation for each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationMode {
    /// Coin flip between read and write
    #[default]
    Random,
    /// Write, read, write, read, ...
    Alternate,
    Read,
    Write,
    Increment,
}

impl OperationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Alternate => "alternate",
            Self::Read => "read",
            Self::Write => "write",
            Self::Increment => "increment",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "alternate" => Ok(Self::Alternate),
            "read" | "get" => Ok(Self::Read),
            "write" | "set" => Ok(Self::Write),
            "increment" | "incr" => Ok(Self::Increment),
            other => Err(format!("unknown operation mode '{}'", other)),
        }
    }
}

/// Which document id a read targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadTarget {
    /// The current counter value, i.e. the most recent write
    #[default]
    Latest,
    /// Uniformly chosen from `0..=counter`
    Random,
}

impl ReadTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for ReadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(Self::Latest),
            "random" => Ok(Self::Random),
            other => Err(format!("unknown read target '{}'", other)),
        }
    }
}

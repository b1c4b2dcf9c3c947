use std::{fmt, io};

/// An error returned when building a container from an invalid configuration.
#[derive(Debug)]
pub enum BuildError {
    /// The bucket capacity was zero.
    ZeroCapacity,

    /// The maximum number of concurrent writers was zero.
    ZeroWorkers,

    /// A writer thread could not be spawned.
    Spawn(io::Error),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::ZeroCapacity => write!(f, "capacity must be at least one bucket"),
            BuildError::ZeroWorkers => write!(f, "at least one writer is required"),
            BuildError::Spawn(err) => write!(f, "failed to spawn writer thread: {err}"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for BuildError {
    fn from(err: io::Error) -> Self {
        BuildError::Spawn(err)
    }
}

pub type RivetResult<T> = Result<T, RivetError>;

/// Generic error that contains all the different kinds of errors that may occur when using the API
#[derive(Debug, Clone)]
pub enum RivetError {
    StringError(String),
    /// A single descriptor reservation was larger than the pool's total capacity. This is a
    /// configuration error, the pool can never satisfy the request no matter how many times it
    /// rolls over.
    CapacityExceeded {
        required: u32,
        capacity: u32,
    },
    /// Building a pipeline object failed. The error is never cached, a later request with the
    /// same descriptor will try again.
    CompilationFailed(String),
    /// A descriptor table from a previous pool generation was used after the pool rolled over.
    /// Correct callers never see this, tables are re-reserved after every rollover.
    StaleHandle {
        table_generation: u64,
        pool_generation: u64,
    },
}

impl std::error::Error for RivetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl core::fmt::Display for RivetError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            RivetError::StringError(ref e) => e.fmt(fmt),
            RivetError::CapacityExceeded { required, capacity } => write!(
                fmt,
                "descriptor reservation of {} slots exceeds pool capacity of {} slots",
                required, capacity
            ),
            RivetError::CompilationFailed(ref e) => {
                write!(fmt, "pipeline compilation failed: {}", e)
            }
            RivetError::StaleHandle {
                table_generation,
                pool_generation,
            } => write!(
                fmt,
                "descriptor table from pool generation {} used at generation {}",
                table_generation, pool_generation
            ),
        }
    }
}

impl From<&str> for RivetError {
    fn from(str: &str) -> Self {
        RivetError::StringError(str.to_string())
    }
}

impl From<String> for RivetError {
    fn from(string: String) -> Self {
        RivetError::StringError(string)
    }
}

use core::fmt;

/// Names one of the four lifecycle operations a table is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Maps a value to a 64-bit hash.
    Hash,
    /// Produces an independent owned copy of a value.
    Copy,
    /// Decides whether two values are equivalent.
    Compare,
    /// Releases a value the table owns.
    Destroy,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hash => "hash",
            Self::Copy => "copy",
            Self::Compare => "compare",
            Self::Destroy => "destroy",
        })
    }
}

/// Returned when a set of lifecycle operations cannot be assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// The named operation was never supplied.
    MissingOperation(Operation),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOperation(op) => write!(f, "missing `{op}` operation"),
        }
    }
}

impl core::error::Error for BuildError {}

/// Reasons an insertion did not store the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    /// An equal value is already stored.
    Duplicate,
    /// Every slot on the value's probe sequence is occupied.
    Exhausted,
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate => f.write_str("an equal value is already present"),
            Self::Exhausted => f.write_str("no free slot on the probe sequence"),
        }
    }
}

impl core::error::Error for InsertError {}

/// Rejected load-factor configurations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// The initial capacity was zero, or too large to round up to a power of
    /// two.
    InitialCapacity(usize),
    /// The max load factor was outside `(0, 1]`.
    MaxLoadFactor(f64),
    /// The min load factor was negative or not below the max load factor.
    MinLoadFactor(f64),
    /// The growth factor was not a power of two of at least 2.
    GrowthFactor(usize),
    /// A shrink could leave the table at or above its max load factor.
    Thrash {
        /// Configured min load factor.
        min: f64,
        /// Configured max load factor.
        max: f64,
        /// Configured growth factor.
        growth: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitialCapacity(cap) => {
                write!(f, "initial capacity must be a non-zero usize power of two, got {cap}")
            }
            Self::MaxLoadFactor(max) => write!(f, "max load factor must be in (0, 1], got {max}"),
            Self::MinLoadFactor(min) => {
                write!(f, "min load factor must be in [0, max), got {min}")
            }
            Self::GrowthFactor(growth) => {
                write!(f, "growth factor must be a power of two >= 2, got {growth}")
            }
            Self::Thrash { min, max, growth } => write!(
                f,
                "min load factor {min} times growth factor {growth} must stay below max load factor {max}"
            ),
        }
    }
}

impl core::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn display_names_the_problem() {
        assert_eq!(
            BuildError::MissingOperation(Operation::Compare).to_string(),
            "missing `compare` operation"
        );
        assert_eq!(
            InsertError::Duplicate.to_string(),
            "an equal value is already present"
        );
        assert_eq!(
            ConfigError::GrowthFactor(3).to_string(),
            "growth factor must be a power of two >= 2, got 3"
        );
        assert!(
            ConfigError::Thrash {
                min: 0.5,
                max: 0.75,
                growth: 2,
            }
            .to_string()
            .contains("below max load factor 0.75")
        );
    }

    #[test]
    fn errors_are_std_errors() {
        fn assert_error<E: core::error::Error>(_: E) {}
        assert_error(InsertError::Exhausted);
        assert_error(BuildError::MissingOperation(Operation::Hash));
        assert_error(ConfigError::InitialCapacity(0));
    }
}

#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Resize policy for a [`HashTable`]: initial capacity, load factor bounds
/// and growth factor.
pub mod config;

/// Errors reported by table construction, configuration and insertion.
pub mod error;

/// An open-addressed hash table using quadratic probing with triangular
/// offsets.
///
/// The table never inspects values itself. Everything goes through the
/// [`ValueOps`] it was built with.
pub mod hash_table;

/// A hash set built on [`HashTable`] for values that are `Hash + Clone + Eq`.
pub mod hash_set;

/// The lifecycle operations a [`HashTable`] applies to its values.
pub mod ops;

mod slot;

pub use config::Config;
pub use error::BuildError;
pub use error::ConfigError;
pub use error::InsertError;
pub use hash_set::HashSet;
pub use hash_table::HashTable;
#[cfg(any(feature = "foldhash", feature = "std"))]
pub use ops::DefaultHashBuilder;
pub use ops::FnOps;
pub use ops::StdOps;
pub use ops::ValueOps;

use crate::error::ConfigError;

cfg_if::cfg_if! {
    if #[cfg(feature = "max-load-ninety")] {
        /// Load factor at or above which an insertion grows the table.
        pub const DEFAULT_MAX_LOAD_FACTOR: f64 = 0.9;
        /// Load factor at or below which an erase shrinks the table.
        pub const DEFAULT_MIN_LOAD_FACTOR: f64 = 0.25;
    } else if #[cfg(feature = "max-load-fifty")] {
        /// Load factor at or above which an insertion grows the table.
        pub const DEFAULT_MAX_LOAD_FACTOR: f64 = 0.5;
        /// Load factor at or below which an erase shrinks the table.
        pub const DEFAULT_MIN_LOAD_FACTOR: f64 = 0.125;
    } else {
        /// Load factor at or above which an insertion grows the table.
        pub const DEFAULT_MAX_LOAD_FACTOR: f64 = 0.75;
        /// Load factor at or below which an erase shrinks the table.
        pub const DEFAULT_MIN_LOAD_FACTOR: f64 = 0.25;
    }
}

/// Slot count a table starts with unless configured otherwise.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Factor the slot count is multiplied by on growth and divided by on shrink.
pub const DEFAULT_GROWTH_FACTOR: usize = 2;

/// The smallest slot count a table ever shrinks to.
pub const MIN_CAPACITY: usize = 1;

/// Resize policy for a [`HashTable`](crate::HashTable).
///
/// The defaults come from cargo features: `max-load-seventy-five` (the
/// default) uses 0.75/0.25, `max-load-fifty` uses 0.5/0.125 and
/// `max-load-ninety` uses 0.9/0.25.
///
/// # Examples
///
/// ```rust
/// use quad_hash::Config;
///
/// let config = Config::default()
///     .with_initial_capacity(64)
///     .with_max_load_factor(0.5)
///     .with_min_load_factor(0.125);
/// assert!(config.validate().is_ok());
///
/// let bad = Config::default().with_min_load_factor(0.9);
/// assert!(bad.validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    initial_capacity: usize,
    max_load_factor: f64,
    min_load_factor: f64,
    growth_factor: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            min_load_factor: DEFAULT_MIN_LOAD_FACTOR,
            growth_factor: DEFAULT_GROWTH_FACTOR,
        }
    }
}

impl Config {
    /// Sets the starting slot count. Rounded up to a power of two.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Sets the load factor that triggers growth after an insertion.
    pub fn with_max_load_factor(mut self, max: f64) -> Self {
        self.max_load_factor = max;
        self
    }

    /// Sets the load factor that triggers a shrink after an erase.
    pub fn with_min_load_factor(mut self, min: f64) -> Self {
        self.min_load_factor = min;
        self
    }

    /// Sets the resize multiplier. Must be a power of two.
    pub fn with_growth_factor(mut self, growth: usize) -> Self {
        self.growth_factor = growth;
        self
    }

    /// The slot count a new table starts with, after rounding.
    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
            .checked_next_power_of_two()
            .unwrap_or(self.initial_capacity)
            .max(MIN_CAPACITY)
    }

    /// Load factor at or above which the table grows.
    pub fn max_load_factor(&self) -> f64 {
        self.max_load_factor
    }

    /// Load factor at or below which the table shrinks.
    pub fn min_load_factor(&self) -> f64 {
        self.min_load_factor
    }

    /// Resize multiplier.
    pub fn growth_factor(&self) -> usize {
        self.growth_factor
    }

    /// The smallest number of values at which a table of `capacity` slots
    /// grows. One fewer is the fullest such a table gets.
    pub fn grow_threshold(&self, capacity: usize) -> usize {
        (capacity as f64 * self.max_load_factor).ceil() as usize
    }

    /// Checks that the policy keeps capacities powers of two and never lets a
    /// shrink produce a table that is already due to grow.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capacity == 0 || self.initial_capacity.checked_next_power_of_two().is_none()
        {
            return Err(ConfigError::InitialCapacity(self.initial_capacity));
        }
        if !(self.max_load_factor > 0.0 && self.max_load_factor <= 1.0) {
            return Err(ConfigError::MaxLoadFactor(self.max_load_factor));
        }
        if !(self.min_load_factor >= 0.0 && self.min_load_factor < self.max_load_factor) {
            return Err(ConfigError::MinLoadFactor(self.min_load_factor));
        }
        if self.growth_factor < 2 || !self.growth_factor.is_power_of_two() {
            return Err(ConfigError::GrowthFactor(self.growth_factor));
        }
        if self.min_load_factor * self.growth_factor as f64 >= self.max_load_factor {
            return Err(ConfigError::Thrash {
                min: self.min_load_factor,
                max: self.max_load_factor,
                growth: self.growth_factor,
            });
        }
        Ok(())
    }
}

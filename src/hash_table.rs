use alloc::vec::Vec;
use core::fmt::Debug;

use crate::config::Config;
use crate::config::MIN_CAPACITY;
use crate::error::ConfigError;
use crate::error::InsertError;
use crate::ops::ValueOps;
use crate::slot::Slot;

/// Slot index for probe `attempt` of a key hashing to `hash`.
///
/// Offsets are triangular numbers, so with a power-of-two slot count the
/// first `mask + 1` attempts visit every slot exactly once.
#[inline(always)]
fn probe_index(hash: u64, attempt: usize, mask: usize) -> usize {
    let offset = (attempt as u128 * (attempt as u128 + 1)) / 2;
    (hash as usize).wrapping_add(offset as usize) & mask
}

fn alloc_slots<V>(capacity: usize) -> Vec<Slot<V>> {
    debug_assert!(capacity.is_power_of_two());
    let mut slots = Vec::with_capacity(capacity);
    slots.resize_with(capacity, Slot::default);
    slots
}

/// First empty slot on the probe sequence for `hash`, with the attempt that
/// reached it.
#[inline]
fn find_vacant<V>(slots: &[Slot<V>], hash: u64) -> Option<(usize, usize)> {
    let mask = slots.len() - 1;
    (0..slots.len())
        .map(|attempt| (probe_index(hash, attempt, mask), attempt))
        .find(|&(index, _)| slots[index].is_empty())
}

/// Debug statistics for hash table analysis.
///
/// Requires the `stats` feature.
#[cfg(feature = "stats")]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of values currently in the table
    pub populated: usize,
    /// Number of slots
    pub capacity: usize,
    /// Slots that currently hold a value
    pub occupied_slots: usize,
    /// Slots that anchor at least one live value
    pub anchors: usize,
    /// Largest `anchor_count` of any slot
    pub max_anchor_count: usize,
    /// Largest probe span of any anchor
    pub max_probe_span: usize,
    /// Load factor (populated / capacity)
    pub load_factor: f64,
    /// Load factor that triggers growth
    pub max_load_factor: f64,
    /// Load factor that triggers a shrink
    pub min_load_factor: f64,
    /// Bytes used by the slot array
    pub total_bytes: usize,
}

#[cfg(feature = "stats")]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor, grow at {:.2}%, shrink at {:.2}%)",
            self.populated,
            self.capacity,
            self.load_factor * 100.0,
            self.max_load_factor * 100.0,
            self.min_load_factor * 100.0,
        );
        println!(
            "Anchors: {} live, deepest chain {} values, longest probe span {}",
            self.anchors, self.max_anchor_count, self.max_probe_span
        );
        println!("Total Allocated: {} bytes", self.total_bytes);
    }
}

/// Number of values placed at each probe attempt from their anchor.
///
/// Bin `d` counts values that sit `d` attempts past their anchor. Requires
/// the `stats` feature.
#[cfg(feature = "stats")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHistogram {
    /// Counts indexed by probe attempt.
    pub bins: Vec<usize>,
}

#[cfg(feature = "stats")]
impl ProbeHistogram {
    /// Total number of values counted.
    pub fn total(&self) -> usize {
        self.bins.iter().sum()
    }

    /// Pretty-prints the histogram horizontally using stdout.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = self.bins.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        println!("probe histogram ({} entries):", self.total());

        let make_bar = |count: usize| -> alloc::string::String {
            if count == 0 {
                return alloc::string::String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let mut bar = "█".repeat(units / 8);
            let partial = ['▏', '▎', '▍', '▌', '▋', '▊', '▉'];
            if units % 8 > 0 {
                bar.push(partial[units % 8 - 1]);
            }
            bar
        };

        for (attempt, &count) in self.bins.iter().enumerate() {
            println!("{:>3} | {} ({})", attempt, make_bar(count), count);
        }
    }
}

/// An open-addressing hash set with quadratic probing.
///
/// `HashTable<O>` stores opaque values of type `O::Value`. Everything it does
/// with a value goes through the [`ValueOps`] it was built with: values are
/// hashed and compared through it, caller values are copied into the table
/// through it, and values the table discards are handed to its `destroy`.
///
/// ## Layout
///
/// The table is a power-of-two array of slots. A value hashing to `h` probes
/// slots `(h + i(i+1)/2) & (capacity - 1)` for `i = 0, 1, 2, ...` and lands
/// in the first empty one. Slot `i = 0` is the value's *anchor*. Each anchor
/// counts the live values anchored on it and remembers how many attempts
/// reach all of them, so lookups stop after that many probes instead of
/// scanning for an empty slot. Erasing never needs tombstones.
///
/// ## Resizing
///
/// After an insertion the table doubles (by the configured growth factor)
/// once `len / capacity` reaches the max load factor, and after an erase it
/// shrinks once `len / capacity` drops to the min load factor. Capacity never
/// goes below 1.
///
/// ## Example
///
/// ```rust
/// use quad_hash::HashTable;
/// use quad_hash::ops::FnOps;
///
/// let ops = FnOps::new(
///     |s: &String| s.len() as u64,
///     |s: &String| s.clone(),
///     |a: &String, b: &String| a == b,
///     drop,
/// );
/// let mut table = HashTable::new(ops);
///
/// let alice = "alice".to_string();
/// assert!(table.insert(&alice));
/// assert!(!table.insert(&alice));
/// assert!(table.contains(&alice));
///
/// assert!(table.erase(&alice));
/// assert!(table.is_empty());
/// ```
pub struct HashTable<O: ValueOps> {
    slots: Vec<Slot<O::Value>>,
    populated: usize,
    config: Config,
    ops: O,
}

impl<O> Debug for HashTable<O>
where
    O: ValueOps + Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;
        use alloc::string::String;

        let slots = self
            .slots
            .chunks(16)
            .map(|row| {
                row.iter()
                    .map(|slot| {
                        let value = if slot.is_empty() { ".." } else { "##" };
                        if slot.anchor_count() == 0 {
                            format!("{value}     ")
                        } else {
                            format!("{value}{:02}x{:02}", slot.anchor_count(), slot.probe_span())
                        }
                    })
                    .collect::<Vec<String>>()
                    .join(", ")
            })
            .collect::<Vec<_>>();

        f.debug_struct("HashTable")
            .field(
                "slots",
                if self.is_empty() {
                    &"empty" as &dyn Debug
                } else {
                    &slots as &dyn Debug
                },
            )
            .field("populated", &self.populated)
            .field("capacity", &self.capacity())
            .field("load_factor", &self.load_factor())
            .field("config", &self.config)
            .field("ops", &self.ops)
            .finish()
    }
}

impl<O> Clone for HashTable<O>
where
    O: ValueOps + Clone,
{
    /// Copies every value through `ops.copy`. Slot placement and anchor
    /// bookkeeping are reproduced exactly.
    fn clone(&self) -> Self {
        let ops = self.ops.clone();
        let slots = self.slots.iter().map(|slot| slot.duplicate(&ops)).collect();
        Self {
            slots,
            populated: self.populated,
            config: self.config,
            ops,
        }
    }
}

impl<O: ValueOps> Drop for HashTable<O> {
    fn drop(&mut self) {
        if self.populated == 0 {
            return;
        }
        for slot in self.slots.iter_mut() {
            slot.clear(&self.ops);
        }
    }
}

impl<O: ValueOps> HashTable<O> {
    /// Creates an empty table with the default [`Config`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quad_hash::HashTable;
    /// use quad_hash::config::DEFAULT_INITIAL_CAPACITY;
    /// use quad_hash::ops::StdOps;
    ///
    /// let table: HashTable<StdOps<u64, quad_hash::DefaultHashBuilder>> =
    ///     HashTable::new(StdOps::default());
    /// assert_eq!(table.capacity(), DEFAULT_INITIAL_CAPACITY);
    /// assert!(table.is_empty());
    /// ```
    pub fn new(ops: O) -> Self {
        let config = Config::default();
        debug_assert!(config.validate().is_ok());
        Self::from_parts(ops, config)
    }

    /// Creates an empty table with a custom resize policy.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by [`Config::validate`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quad_hash::Config;
    /// use quad_hash::HashTable;
    /// use quad_hash::ops::StdOps;
    ///
    /// let config = Config::default().with_initial_capacity(100);
    /// let table: HashTable<StdOps<u64, quad_hash::DefaultHashBuilder>> =
    ///     HashTable::with_config(StdOps::default(), config).unwrap();
    /// assert_eq!(table.capacity(), 128);
    /// ```
    pub fn with_config(ops: O, config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(ops, config))
    }

    fn from_parts(ops: O, config: Config) -> Self {
        Self {
            slots: alloc_slots(config.initial_capacity()),
            populated: 0,
            config,
            ops,
        }
    }

    #[inline(always)]
    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    /// Returns the number of values in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if the table holds no values.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of slots. Always a power of two.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns `len / capacity`.
    pub fn load_factor(&self) -> f64 {
        self.populated as f64 / self.slots.len() as f64
    }

    /// Returns the resize policy this table was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the lifecycle operations this table was built with.
    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Returns `(anchor, index)` for a stored value equal to `value`, whose
    /// hash the caller already computed.
    fn find_index(&self, hash: u64, value: &O::Value) -> Option<(usize, usize)> {
        let mask = self.mask();
        let anchor = probe_index(hash, 0, mask);

        let anchor_slot = &self.slots[anchor];
        if anchor_slot.anchor_count() == 0 {
            return None;
        }

        (0..anchor_slot.probe_span())
            .map(|attempt| probe_index(hash, attempt, mask))
            .find(|&index| self.slots[index].matches(value, &self.ops))
            .map(|index| (anchor, index))
    }

    /// Returns `true` if the table holds a value equal to `value`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quad_hash::HashTable;
    /// use quad_hash::ops::StdOps;
    ///
    /// let mut table: HashTable<StdOps<u64, quad_hash::DefaultHashBuilder>> =
    ///     HashTable::new(StdOps::default());
    /// table.insert(&7);
    /// assert!(table.contains(&7));
    /// assert!(!table.contains(&8));
    /// ```
    pub fn contains(&self, value: &O::Value) -> bool {
        self.find_index(self.ops.hash(value), value).is_some()
    }

    /// Returns the stored value equal to `value`, if any.
    pub fn get(&self, value: &O::Value) -> Option<&O::Value> {
        self.find_index(self.ops.hash(value), value)
            .and_then(|(_, index)| self.slots[index].value())
    }

    /// Inserts a copy of `value`.
    ///
    /// Returns `false` if an equal value is already present or no slot on
    /// the probe sequence is free. Use [`try_insert`](Self::try_insert) to
    /// tell the two apart.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quad_hash::HashTable;
    /// use quad_hash::ops::StdOps;
    ///
    /// let mut table: HashTable<StdOps<String, quad_hash::DefaultHashBuilder>> =
    ///     HashTable::new(StdOps::default());
    /// let key = "key".to_string();
    /// assert!(table.insert(&key));
    /// assert!(!table.insert(&key));
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn insert(&mut self, value: &O::Value) -> bool {
        self.try_insert(value).is_ok()
    }

    /// Inserts a copy of `value`, reporting why it was not stored.
    ///
    /// The value is copied through `ops.copy` only once a free slot has been
    /// found.
    ///
    /// # Errors
    ///
    /// - [`InsertError::Duplicate`] if an equal value is already present.
    /// - [`InsertError::Exhausted`] if every slot on the probe sequence is
    ///   occupied.
    pub fn try_insert(&mut self, value: &O::Value) -> Result<(), InsertError> {
        let hash = self.ops.hash(value);
        if self.find_index(hash, value).is_some() {
            return Err(InsertError::Duplicate);
        }

        let (index, attempt) = find_vacant(&self.slots, hash).ok_or(InsertError::Exhausted)?;
        self.slots[index].set(value, &self.ops);
        self.commit_insert(hash, attempt);
        Ok(())
    }

    /// Inserts `value` itself, without copying it.
    ///
    /// # Errors
    ///
    /// Hands the value back alongside the reason it was not stored, see
    /// [`try_insert`](Self::try_insert).
    pub fn insert_owned(&mut self, value: O::Value) -> Result<(), (O::Value, InsertError)> {
        let hash = self.ops.hash(&value);
        if self.find_index(hash, &value).is_some() {
            return Err((value, InsertError::Duplicate));
        }

        let Some((index, attempt)) = find_vacant(&self.slots, hash) else {
            return Err((value, InsertError::Exhausted));
        };
        self.slots[index].transplant(value, &self.ops);
        self.commit_insert(hash, attempt);
        Ok(())
    }

    #[inline]
    fn commit_insert(&mut self, hash: u64, attempt: usize) {
        let anchor = probe_index(hash, 0, self.mask());
        self.slots[anchor].anchor(attempt);
        self.populated += 1;
        debug_assert!(self.populated <= self.capacity());

        if self.load_factor() >= self.config.max_load_factor() {
            if let Some(capacity) = self.capacity().checked_mul(self.config.growth_factor()) {
                self.resize(capacity);
            }
        }
    }

    /// Removes and destroys the value equal to `value`.
    ///
    /// Returns `false` if no such value is present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quad_hash::HashTable;
    /// use quad_hash::ops::StdOps;
    ///
    /// let mut table: HashTable<StdOps<u64, quad_hash::DefaultHashBuilder>> =
    ///     HashTable::new(StdOps::default());
    /// table.insert(&42);
    /// assert!(table.erase(&42));
    /// assert!(!table.erase(&42));
    /// assert!(table.is_empty());
    /// ```
    pub fn erase(&mut self, value: &O::Value) -> bool {
        let Some((anchor, index)) = self.find_index(self.ops.hash(value), value) else {
            return false;
        };
        self.slots[index].clear(&self.ops);
        self.commit_remove(anchor);
        true
    }

    /// Removes the value equal to `value` and returns it without destroying
    /// it.
    pub fn take(&mut self, value: &O::Value) -> Option<O::Value> {
        let (anchor, index) = self.find_index(self.ops.hash(value), value)?;
        let taken = self.slots[index].take();
        debug_assert!(taken.is_some());
        self.commit_remove(anchor);
        taken
    }

    #[inline]
    fn commit_remove(&mut self, anchor: usize) {
        self.slots[anchor].release();
        self.populated -= 1;

        if self.capacity() > MIN_CAPACITY && self.load_factor() <= self.config.min_load_factor() {
            let capacity = (self.capacity() / self.config.growth_factor()).max(MIN_CAPACITY);
            self.resize(capacity);
        }
    }

    /// Destroys every value. Capacity is unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quad_hash::HashTable;
    /// use quad_hash::ops::StdOps;
    ///
    /// let mut table: HashTable<StdOps<u64, quad_hash::DefaultHashBuilder>> =
    ///     HashTable::new(StdOps::default());
    /// for i in 0..5 {
    ///     table.insert(&i);
    /// }
    /// let capacity = table.capacity();
    ///
    /// table.clear();
    /// assert!(table.is_empty());
    /// assert_eq!(table.load_factor(), 0.0);
    /// assert_eq!(table.capacity(), capacity);
    /// ```
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.clear(&self.ops);
            slot.reset_anchor();
        }
        self.populated = 0;
    }

    /// Returns the value stored in slot `index`.
    ///
    /// `None` if `index` is out of range or the slot is empty. Meant for
    /// diagnostics and for callers walking raw slot indices; use
    /// [`iter`](Self::iter) to visit values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quad_hash::HashTable;
    /// use quad_hash::ops::FnOps;
    ///
    /// let ops = FnOps::new(|v: &u64| *v, |v: &u64| *v, |a: &u64, b: &u64| a == b, drop);
    /// let mut table = HashTable::new(ops);
    /// table.insert(&3);
    /// assert_eq!(table.value_at(3), Some(&3));
    /// assert_eq!(table.value_at(4), None);
    /// assert_eq!(table.value_at(table.capacity()), None);
    /// ```
    pub fn value_at(&self, index: usize) -> Option<&O::Value> {
        self.slots.get(index)?.value()
    }

    /// Returns an iterator over the stored values in slot order.
    ///
    /// The order changes whenever the table resizes.
    pub fn iter(&self) -> Iter<'_, O::Value> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.populated,
        }
    }

    #[cold]
    fn resize(&mut self, capacity: usize) {
        debug_assert!(capacity.is_power_of_two());
        debug_assert!(self.populated < capacity);

        let mut slots = alloc_slots(capacity);
        let mask = capacity - 1;

        // Every hash is computed before the first value leaves its slot, so a
        // panicking `hash` leaves the table as it was.
        let hashes: Vec<u64> = self
            .slots
            .iter()
            .filter_map(Slot::value)
            .map(|value| self.ops.hash(value))
            .collect();

        // Values are moved, never copied or destroyed.
        let moved = self.slots.iter_mut().filter_map(Slot::take);
        for (value, hash) in moved.zip(hashes) {
            let Some((index, attempt)) = find_vacant(&slots, hash) else {
                unreachable!("resized table has a free slot for every value");
            };
            slots[index].transplant(value, &self.ops);
            slots[probe_index(hash, 0, mask)].anchor(attempt);
        }

        self.slots = slots;
    }

    /// Returns detailed utilization statistics for debugging.
    ///
    /// Requires the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> DebugStats {
        let occupied_slots = self.slots.iter().filter(|slot| !slot.is_empty()).count();
        let anchors = self.slots.iter().filter(|slot| slot.anchor_count() > 0);

        DebugStats {
            populated: self.populated,
            capacity: self.capacity(),
            occupied_slots,
            anchors: anchors.clone().count(),
            max_anchor_count: anchors.clone().map(Slot::anchor_count).max().unwrap_or(0),
            max_probe_span: anchors.map(Slot::probe_span).max().unwrap_or(0),
            load_factor: self.load_factor(),
            max_load_factor: self.config.max_load_factor(),
            min_load_factor: self.config.min_load_factor(),
            total_bytes: self.slots.len() * core::mem::size_of::<Slot<O::Value>>(),
        }
    }

    /// Computes how far past its anchor each value sits.
    ///
    /// Requires the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn probe_histogram(&self) -> ProbeHistogram {
        let mask = self.mask();
        let widest = self.slots.iter().map(Slot::probe_span).max().unwrap_or(0);
        let mut bins = alloc::vec![0usize; widest];

        for (index, slot) in self.slots.iter().enumerate() {
            let Some(value) = slot.value() else {
                continue;
            };
            let hash = self.ops.hash(value);
            let span = self.slots[probe_index(hash, 0, mask)].probe_span();
            if let Some(attempt) = (0..span).find(|&a| probe_index(hash, a, mask) == index) {
                bins[attempt] += 1;
            }
        }

        ProbeHistogram { bins }
    }
}

/// An iterator over the values of a [`HashTable`].
///
/// Created by [`HashTable::iter`]. Yields values in slot order.
pub struct Iter<'a, V> {
    slots: core::slice::Iter<'a, Slot<V>>,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.slots.by_ref().find_map(Slot::value)?;
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<'a, O: ValueOps> IntoIterator for &'a HashTable<O> {
    type IntoIter = Iter<'a, O::Value>;
    type Item = &'a O::Value;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use core::cell::Cell;
    use core::hash::Hasher;

    use hashbrown::HashSet as ReferenceSet;
    use rand::Rng;
    use rand::SeedableRng;
    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use rand::rngs::SmallRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::ops::FnOps;

    fn config() -> Config {
        Config::default()
            .with_initial_capacity(16)
            .with_max_load_factor(0.75)
            .with_min_load_factor(0.25)
            .with_growth_factor(2)
    }

    fn table_with(
        hash: impl Fn(&u64) -> u64 + 'static,
    ) -> HashTable<impl ValueOps<Value = u64> + Debug> {
        let ops = FnOps::new(hash, |v: &u64| *v, |a: &u64, b: &u64| a == b, drop);
        HashTable::with_config(ops, config()).unwrap()
    }

    fn identity_table() -> HashTable<impl ValueOps<Value = u64> + Debug> {
        table_with(|v| *v)
    }

    fn sip_table() -> HashTable<impl ValueOps<Value = u64> + Debug> {
        let mut rng = OsRng;
        let (k0, k1) = (
            rng.try_next_u64().unwrap_or(0),
            rng.try_next_u64().unwrap_or(0),
        );
        table_with(move |v| {
            let mut h = SipHasher::new_with_keys(k0, k1);
            h.write_u64(*v);
            h.finish()
        })
    }

    struct Lifecycle {
        hashes: Cell<usize>,
        copies: Cell<usize>,
        destroys: Cell<usize>,
        // Hash calls allowed before `hash` panics.
        hash_fuse: Cell<usize>,
    }

    impl Default for Lifecycle {
        fn default() -> Self {
            Self {
                hashes: Cell::new(0),
                copies: Cell::new(0),
                destroys: Cell::new(0),
                hash_fuse: Cell::new(usize::MAX),
            }
        }
    }

    fn counting_table(
        counts: &Rc<Lifecycle>,
    ) -> HashTable<impl ValueOps<Value = String> + Clone + Debug> {
        let hashes = Rc::clone(counts);
        let copies = Rc::clone(counts);
        let destroys = Rc::clone(counts);
        let ops = FnOps::new(
            move |s: &String| {
                let fuse = hashes.hash_fuse.get();
                if fuse == 0 {
                    panic!("hash of {s:?} failed");
                }
                hashes.hash_fuse.set(fuse - 1);
                hashes.hashes.set(hashes.hashes.get() + 1);
                s.bytes().map(u64::from).sum()
            },
            move |s: &String| {
                copies.copies.set(copies.copies.get() + 1);
                s.clone()
            },
            |a: &String, b: &String| a == b,
            move |_s: String| destroys.destroys.set(destroys.destroys.get() + 1),
        );
        HashTable::with_config(ops, config()).unwrap()
    }

    fn assert_capacity_invariant<O: ValueOps>(table: &HashTable<O>) {
        assert!(table.capacity().is_power_of_two(), "{}", table.capacity());
        assert!(table.capacity() >= MIN_CAPACITY);
        assert!(table.len() <= table.capacity());
    }

    #[test]
    fn probe_sequence_covers_every_slot() {
        for capacity in [1usize, 2, 4, 8, 16, 64, 1024] {
            let mask = capacity - 1;
            for hash in [0u64, 1, 5, 0xDEAD_BEEF, u64::MAX] {
                let mut seen = vec![false; capacity];
                for attempt in 0..capacity {
                    seen[probe_index(hash, attempt, mask)] = true;
                }
                assert!(seen.iter().all(|&s| s), "capacity {capacity} hash {hash}");
            }
        }
    }

    #[test]
    fn probe_offsets_are_triangular() {
        let mask = 15;
        let offsets: Vec<usize> = (0..6).map(|i| probe_index(0, i, mask)).collect();
        assert_eq!(offsets, vec![0, 1, 3, 6, 10, 15]);
        assert_eq!(probe_index(5, 0, mask), 5);
        assert_eq!(probe_index(5, 2, mask), 8);
        assert_eq!(probe_index(14, 3, mask), 4);
    }

    #[test]
    fn insert_and_contains() {
        let mut table = sip_table();
        for k in 0..32u64 {
            assert!(table.insert(&k), "{:#?}", table);
            assert!(table.contains(&k), "{:#?}", table);
        }
        assert_eq!(table.len(), 32);
        for k in 0..32u64 {
            assert!(table.contains(&k));
            assert_eq!(table.get(&k), Some(&k));
        }
        assert!(!table.contains(&999));
        assert_eq!(table.get(&999), None);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut table = sip_table();
        assert_eq!(table.try_insert(&42), Ok(()));
        assert_eq!(table.try_insert(&42), Err(InsertError::Duplicate));
        assert!(!table.insert(&42));
        assert_eq!(table.len(), 1);

        assert_eq!(table.insert_owned(42), Err((42, InsertError::Duplicate)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn erase_then_contains_is_false() {
        let mut table = sip_table();
        for k in 0..8u64 {
            table.insert(&k);
        }
        for k in [0u64, 3, 7] {
            assert!(table.erase(&k));
            assert!(!table.contains(&k));
        }
        assert_eq!(table.len(), 5);
        assert!(!table.erase(&1000));
        assert!(!table.erase(&3));
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn colliding_keys_survive_middle_erase() {
        // All three share anchor 1.
        let mut table = table_with(|v| v & 3);
        for k in [5u64, 9, 13] {
            assert!(table.insert(&k));
        }
        for k in [5u64, 9, 13] {
            assert!(table.contains(&k), "{:#?}", table);
        }

        assert!(table.erase(&9));
        assert!(!table.contains(&9));
        assert!(table.contains(&5), "{:#?}", table);
        assert!(table.contains(&13), "{:#?}", table);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn value_displaced_by_other_anchors_is_found() {
        let mut table = identity_table();
        // 1 and 2 fill the first two slots of 17's chain (anchor 1), pushing
        // 17 to attempt 2 while its anchor only counts one value.
        for k in [1u64, 2, 17] {
            assert!(table.insert(&k));
        }
        assert_eq!(table.value_at(4), Some(&17));
        assert!(table.contains(&17), "{:#?}", table);
        assert!(table.erase(&17));
        assert!(!table.contains(&17));
    }

    #[test]
    fn deep_value_found_after_shallow_erases() {
        let mut table = identity_table();
        // Fillers off the chain keep the erases below from shrinking.
        for k in [8u64, 9, 11, 12, 13] {
            assert!(table.insert(&k));
        }
        for k in [0u64, 16, 3, 32] {
            assert!(table.insert(&k));
        }
        // 32 sits at attempt 3: slots 0, 1 and 3 are taken.
        assert_eq!(table.value_at(6), Some(&32));

        assert!(table.erase(&0));
        assert!(table.erase(&16));
        assert!(table.contains(&32), "{:#?}", table);
        assert!(table.contains(&3));

        // The freed slots are reused before the deep one.
        assert!(table.insert(&48));
        assert_eq!(table.value_at(0), Some(&48));
        assert!(table.contains(&32));
    }

    #[test]
    fn anchor_with_no_values_short_circuits() {
        let mut table = identity_table();
        table.insert(&1);
        // 17 shares anchor 1 and probes one slot; 2 has an unused anchor.
        assert!(!table.contains(&17));
        assert!(!table.contains(&2));
        assert_eq!(table.slots[2].anchor_count(), 0);
        assert_eq!(table.slots[1].anchor_count(), 1);
        assert_eq!(table.slots[1].probe_span(), 1);
    }

    #[test]
    fn grows_when_max_load_is_reached() {
        let mut table = sip_table();
        assert_eq!(table.capacity(), 16);
        for k in 0..11u64 {
            table.insert(&k);
        }
        assert_eq!(table.capacity(), 16);

        table.insert(&11);
        assert_eq!(table.capacity(), 32);
        table.insert(&12);
        assert_eq!(table.len(), 13);
        for k in 0..13u64 {
            assert!(table.contains(&k), "{:#?}", table);
        }
        assert!(table.load_factor() < 0.75);
    }

    #[test]
    fn shrinks_when_min_load_is_reached() {
        let mut table = sip_table();
        for k in 0..12u64 {
            table.insert(&k);
        }
        assert_eq!(table.capacity(), 32);

        // 9/32 > 0.25, 8/32 == 0.25 shrinks.
        for k in 0..3u64 {
            assert!(table.erase(&k));
        }
        assert_eq!(table.capacity(), 32);
        assert!(table.erase(&3));
        assert_eq!(table.capacity(), 16);
        assert_eq!(table.len(), 8);
        for k in 4..12u64 {
            assert!(table.contains(&k), "{:#?}", table);
        }
    }

    #[test]
    fn capacity_never_drops_below_one() {
        let mut table = sip_table();
        for _ in 0..3 {
            for k in 0..40u64 {
                table.insert(&k);
            }
            for k in 0..40u64 {
                assert!(table.erase(&k));
                assert_capacity_invariant(&table);
            }
        }
        assert!(table.is_empty());

        // One shrink per erase: repeated single insert/erase walks down to 1.
        for _ in 0..8 {
            table.insert(&7);
            table.erase(&7);
            assert_capacity_invariant(&table);
        }
        assert_eq!(table.capacity(), 1);

        assert!(table.insert(&1));
        assert_eq!(table.capacity(), 2);
        assert!(table.insert(&2));
        assert_eq!(table.capacity(), 4);
        assert!(table.contains(&1) && table.contains(&2));
    }

    #[test]
    fn clear_is_idempotent() {
        let mut table = sip_table();
        for k in 0..20u64 {
            table.insert(&k);
        }
        let capacity = table.capacity();

        table.clear();
        assert_eq!(table.len(), 0);
        assert_eq!(table.load_factor(), 0.0);
        assert_eq!(table.capacity(), capacity);
        assert!(table.slots.iter().all(|s| s.anchor_count() == 0 && s.probe_span() == 0));

        table.clear();
        assert_eq!(table.len(), 0);
        assert_eq!(table.capacity(), capacity);

        for k in 0..20u64 {
            assert!(!table.contains(&k));
            assert!(table.insert(&k));
        }
    }

    #[test]
    fn value_at_empty_and_occupied() {
        let mut table = identity_table();
        assert!(table.insert(&3));
        assert_eq!(table.value_at(3), Some(&3));
        assert_eq!(table.value_at(0), None);
        assert_eq!(table.value_at(table.capacity()), None);
        assert_eq!(table.value_at(usize::MAX), None);
    }

    #[test]
    fn iter_visits_every_value_once() {
        let mut table = sip_table();
        for k in 10..40u64 {
            table.insert(&k);
        }
        let iter = table.iter();
        assert_eq!(iter.len(), 30);
        let mut seen: Vec<u64> = iter.copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (10..40).collect::<Vec<_>>());
        assert_eq!((&table).into_iter().count(), 30);
    }

    #[test]
    fn take_returns_value_without_destroying() {
        let counts = Rc::new(Lifecycle::default());
        let mut table = counting_table(&counts);
        table.insert(&"keep".to_string());

        let taken = table.take(&"keep".to_string());
        assert_eq!(taken.as_deref(), Some("keep"));
        assert_eq!(counts.destroys.get(), 0);
        assert!(table.is_empty());
        assert_eq!(table.take(&"keep".to_string()), None);
    }

    #[test]
    fn lifecycle_copies_match_destroys() {
        let counts = Rc::new(Lifecycle::default());
        {
            let mut table = counting_table(&counts);
            for i in 0..100 {
                assert!(table.insert(&i.to_string()));
            }
            // The duplicate check runs before any copy.
            assert!(!table.insert(&"5".to_string()));
            assert_eq!(counts.copies.get(), 100);

            // Growth moved values without copying or destroying them.
            assert_eq!(counts.destroys.get(), 0);

            for i in 0..50 {
                assert!(table.erase(&i.to_string()));
            }
            assert_eq!(counts.destroys.get(), 50);

            table.clear();
            assert_eq!(counts.destroys.get(), 100);

            for i in 0..10 {
                table.insert(&i.to_string());
            }
            assert!(table.insert_owned("owned".to_string()).is_ok());
            assert_eq!(counts.copies.get(), 110);
        }
        assert_eq!(counts.destroys.get(), 111);
    }

    #[test]
    fn clone_copies_through_ops() {
        let counts = Rc::new(Lifecycle::default());
        let mut original = counting_table(&counts);
        for word in ["hello", "world", "rust", "clone"] {
            original.insert(&word.to_string());
        }
        let copies_before = counts.copies.get();

        let cloned = original.clone();
        assert_eq!(counts.copies.get(), copies_before + 4);
        assert_eq!(cloned.len(), 4);
        assert_eq!(cloned.capacity(), original.capacity());
        for word in ["hello", "world", "rust", "clone"] {
            assert!(cloned.contains(&word.to_string()));
        }

        original.erase(&"hello".to_string());
        assert!(!original.contains(&"hello".to_string()));
        assert!(cloned.contains(&"hello".to_string()));
    }

    #[test]
    fn rejects_invalid_config() {
        let ops = FnOps::new(|v: &u64| *v, |v: &u64| *v, |a: &u64, b: &u64| a == b, drop);
        let err = HashTable::with_config(ops, config().with_growth_factor(3)).unwrap_err();
        assert_eq!(err, ConfigError::GrowthFactor(3));
    }

    #[test]
    fn single_slot_table() {
        let ops = FnOps::new(|v: &u64| *v, |v: &u64| *v, |a: &u64, b: &u64| a == b, drop);
        let mut table = HashTable::with_config(ops, config().with_initial_capacity(1)).unwrap();
        assert_eq!(table.capacity(), 1);
        assert!(table.insert(&9));
        assert_eq!(table.capacity(), 2);
        assert!(table.contains(&9));
        assert!(table.erase(&9));
        assert_eq!(table.capacity(), 1);
        assert!(!table.contains(&9));
    }

    #[test]
    fn full_table_reports_exhausted() {
        // A real table grows long before this; fill every slot directly.
        let mut table = identity_table();
        for (index, slot) in table.slots.iter_mut().enumerate() {
            slot.transplant(index as u64 + 100, &table.ops);
        }
        table.populated = table.capacity();
        assert_eq!(table.try_insert(&1), Err(InsertError::Exhausted));
        assert_eq!(table.insert_owned(1), Err((1, InsertError::Exhausted)));
        table.clear();
        assert!(table.insert(&1));
    }

    #[test]
    fn all_values_on_one_anchor() {
        let mut table = table_with(|_| 0);
        for k in 0..200u64 {
            assert!(table.insert(&k));
        }
        for k in (0..200u64).step_by(3) {
            assert!(table.erase(&k));
        }
        for k in 0..200u64 {
            assert_eq!(table.contains(&k), k % 3 != 0, "{k}");
        }
        assert_capacity_invariant(&table);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn insert_many() {
        let mut table = sip_table();
        for k in 0..100_000u64 {
            assert!(table.insert(&k));
        }
        assert_eq!(table.len(), 100_000);
        for k in 0..100_000u64 {
            assert!(table.contains(&k));
        }
        assert!(table.load_factor() < 0.75);
    }

    fn check_against_reference<O>(mut table: HashTable<O>, seed: u64, key_space: u64)
    where
        O: ValueOps<Value = u64>,
    {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut reference = ReferenceSet::new();

        for _ in 0..5_000 {
            let key = rng.random_range(0..key_space);
            match rng.random_range(0..10) {
                0..=4 => {
                    assert_eq!(table.insert(&key), reference.insert(key), "insert {key}");
                    assert!(table.load_factor() < table.config().max_load_factor());
                }
                5..=7 => {
                    let capacity = table.capacity();
                    let erased = table.erase(&key);
                    assert_eq!(erased, reference.remove(&key), "erase {key}");
                    if erased && capacity > 1 && table.len() as f64 / capacity as f64 <= 0.25 {
                        assert_eq!(table.capacity(), capacity / 2);
                    }
                }
                8 => {
                    assert_eq!(table.contains(&key), reference.contains(&key), "contains {key}");
                }
                _ => {
                    if rng.random_range(0..50) == 0 {
                        table.clear();
                        reference.clear();
                    }
                }
            }
            assert_eq!(table.len(), reference.len());
            assert_capacity_invariant(&table);
        }

        for key in 0..key_space {
            assert_eq!(table.contains(&key), reference.contains(&key), "final {key}");
        }
        assert_eq!(table.iter().count(), reference.len());
    }

    #[test]
    fn random_operations_match_reference() {
        let seed = OsRng.try_next_u64().unwrap_or(0);
        check_against_reference(sip_table(), seed, 512);
    }

    #[test]
    fn random_operations_with_clustered_hashes() {
        let seed = OsRng.try_next_u64().unwrap_or(0);
        check_against_reference(table_with(|v| v % 7), seed, 256);
        check_against_reference(table_with(|v| v << 4), seed ^ 1, 256);
        check_against_reference(identity_table(), seed ^ 2, 64);
    }

    #[test]
    fn each_operation_hashes_once() {
        let counts = Rc::new(Lifecycle::default());
        let mut table = counting_table(&counts);

        assert!(table.insert(&"a".to_string()));
        assert_eq!(counts.hashes.get(), 1);
        assert!(!table.insert(&"a".to_string()));
        assert_eq!(counts.hashes.get(), 2);
        assert!(table.insert_owned("b".to_string()).is_ok());
        assert_eq!(counts.hashes.get(), 3);

        assert!(table.contains(&"a".to_string()));
        assert!(table.get(&"b".to_string()).is_some());
        assert_eq!(counts.hashes.get(), 5);

        // One hash for the erase, one for moving "b" when the table shrinks.
        assert!(table.erase(&"a".to_string()));
        assert_eq!(table.capacity(), 8);
        assert_eq!(counts.hashes.get(), 7);
    }

    #[test]
    fn resize_hashes_each_value_once() {
        let counts = Rc::new(Lifecycle::default());
        let mut table = counting_table(&counts);
        for i in 0..11 {
            table.insert(&i.to_string());
        }
        assert_eq!(counts.hashes.get(), 11);

        // The 12th insert grows the table and rehashes all 12 values.
        table.insert(&"11".to_string());
        assert_eq!(table.capacity(), 32);
        assert_eq!(counts.hashes.get(), 11 + 1 + 12);
    }

    #[test]
    #[cfg(feature = "std")]
    fn panicking_hash_during_resize_keeps_table_intact() {
        use std::panic::AssertUnwindSafe;
        use std::panic::catch_unwind;

        let counts = Rc::new(Lifecycle::default());
        {
            let mut table = counting_table(&counts);
            for i in 0..11 {
                table.insert(&i.to_string());
            }

            // The insert itself hashes once, then the resize fails midway.
            counts.hash_fuse.set(6);
            let grown = catch_unwind(AssertUnwindSafe(|| table.insert(&"11".to_string())));
            assert!(grown.is_err());
            counts.hash_fuse.set(usize::MAX);

            assert_eq!(counts.destroys.get(), 0);
            assert_eq!(table.capacity(), 16);
            assert_eq!(table.len(), 12);
            assert_eq!(table.iter().count(), 12);
            for i in 0..12 {
                assert!(table.contains(&i.to_string()), "{:#?}", table);
            }

            // The next insert retries the growth.
            assert!(table.insert(&"12".to_string()));
            assert_eq!(table.capacity(), 32);
            assert_eq!(table.len(), 13);
        }
        assert_eq!(counts.destroys.get(), counts.copies.get());
    }

    #[test]
    fn filling_to_one_below_grow_threshold_keeps_capacity() {
        for max in [0.5, 0.75, 0.9, 1.0] {
            let config = config().with_max_load_factor(max).with_min_load_factor(0.0);
            let threshold = config.grow_threshold(16);

            let ops = FnOps::new(|v: &u64| *v, |v: &u64| *v, |a: &u64, b: &u64| a == b, drop);
            let mut table = HashTable::with_config(ops, config).unwrap();
            for k in 0..threshold as u64 - 1 {
                assert!(table.insert(&k));
            }
            assert_eq!(table.capacity(), 16, "max {max}");
            assert!(table.load_factor() < max);

            assert!(table.insert(&1000));
            assert_eq!(table.capacity(), 32, "max {max}");
        }
    }

    #[test]
    fn debug_output_mentions_shape() {
        let mut table = identity_table();
        table.insert(&1);
        let rendered = alloc::format!("{:?}", table);
        assert!(rendered.contains("HashTable"));
        assert!(rendered.contains("populated: 1"));
        assert!(rendered.contains("##01x01"));
    }

    #[test]
    #[cfg(feature = "stats")]
    fn stats_and_histogram() {
        let mut table = identity_table();
        for k in [0u64, 16, 3, 32] {
            table.insert(&k);
        }
        let stats = table.debug_stats();
        assert_eq!(stats.populated, 4);
        assert_eq!(stats.capacity, 16);
        assert_eq!(stats.occupied_slots, 4);
        assert_eq!(stats.anchors, 2);
        assert_eq!(stats.max_anchor_count, 3);
        assert_eq!(stats.max_probe_span, 4);

        let histogram = table.probe_histogram();
        assert_eq!(histogram.bins, vec![2, 1, 0, 1]);
        assert_eq!(histogram.total(), 4);

        #[cfg(feature = "std")]
        {
            stats.print();
            histogram.print();
        }
    }
}

use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::marker::PhantomData;

use crate::error::BuildError;
use crate::error::Operation;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// Hasher builder used by [`StdOps`] and [`HashSet`](crate::HashSet)
        /// when none is named.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// Hasher builder used by [`StdOps`] and [`HashSet`](crate::HashSet)
        /// when none is named.
        pub type DefaultHashBuilder = std::hash::RandomState;
    }
}

/// The lifecycle operations a [`HashTable`](crate::HashTable) routes every
/// stored value through.
///
/// The table never looks inside a value. It hashes with [`hash`], decides
/// membership with [`compare`], takes its own copy of caller values with
/// [`copy`] and hands values back with [`destroy`] when it is done with them.
///
/// Implementations must keep `hash` consistent with `compare`: values that
/// compare equal must hash equal. `compare` must be an equivalence relation.
///
/// [`hash`]: ValueOps::hash
/// [`copy`]: ValueOps::copy
/// [`compare`]: ValueOps::compare
/// [`destroy`]: ValueOps::destroy
pub trait ValueOps {
    /// The opaque value type stored by the table.
    type Value;

    /// Hashes a value. Must be deterministic.
    fn hash(&self, value: &Self::Value) -> u64;

    /// Returns an independent deep copy of `value`.
    fn copy(&self, value: &Self::Value) -> Self::Value;

    /// Returns `true` if `a` and `b` are equivalent.
    fn compare(&self, a: &Self::Value, b: &Self::Value) -> bool;

    /// Releases a value the table owned. Defaults to dropping it.
    fn destroy(&self, value: Self::Value) {
        drop(value);
    }
}

/// [`ValueOps`] assembled from four closures.
///
/// Use this when the behavior is only known at runtime, or when values need
/// bespoke copy/teardown logic. `FnOps` is `Send`, `Sync` and `Clone`
/// exactly when all four closures are. With the default type parameters it
/// holds plain function pointers.
///
/// # Examples
///
/// ```rust
/// use quad_hash::HashTable;
/// use quad_hash::ops::FnOps;
///
/// let ops = FnOps::builder()
///     .hash(|v: &Vec<u8>| v.iter().map(|&b| b as u64).sum())
///     .copy(|v: &Vec<u8>| v.clone())
///     .compare(|a: &Vec<u8>, b: &Vec<u8>| a == b)
///     .destroy(drop)
///     .build()
///     .unwrap();
///
/// let mut table = HashTable::new(ops);
/// assert!(table.insert(&vec![1, 2, 3]));
/// assert!(table.contains(&vec![1, 2, 3]));
/// ```
pub struct FnOps<
    V,
    H = fn(&V) -> u64,
    C = fn(&V) -> V,
    K = fn(&V, &V) -> bool,
    D = fn(V),
> {
    hash: H,
    copy: C,
    compare: K,
    destroy: D,
    _value: PhantomData<fn(&V) -> V>,
}

impl<V, H, C, K, D> Clone for FnOps<V, H, C, K, D>
where
    H: Clone,
    C: Clone,
    K: Clone,
    D: Clone,
{
    fn clone(&self) -> Self {
        Self {
            hash: self.hash.clone(),
            copy: self.copy.clone(),
            compare: self.compare.clone(),
            destroy: self.destroy.clone(),
            _value: PhantomData,
        }
    }
}

impl<V, H, C, K, D> Debug for FnOps<V, H, C, K, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FnOps").finish_non_exhaustive()
    }
}

impl<V, H, C, K, D> FnOps<V, H, C, K, D>
where
    H: Fn(&V) -> u64,
    C: Fn(&V) -> V,
    K: Fn(&V, &V) -> bool,
    D: Fn(V),
{
    /// Builds the operations from closures that are all known to be present.
    pub fn new(hash: H, copy: C, compare: K, destroy: D) -> Self {
        Self {
            hash,
            copy,
            compare,
            destroy,
            _value: PhantomData,
        }
    }
}

impl<V> FnOps<V> {
    /// Starts a builder where each operation may be supplied separately.
    ///
    /// [`FnOpsBuilder::build`] fails if any of the four is missing.
    pub fn builder() -> FnOpsBuilder<V> {
        FnOpsBuilder {
            hash: None,
            copy: None,
            compare: None,
            destroy: None,
            _value: PhantomData,
        }
    }
}

impl<V, H, C, K, D> ValueOps for FnOps<V, H, C, K, D>
where
    H: Fn(&V) -> u64,
    C: Fn(&V) -> V,
    K: Fn(&V, &V) -> bool,
    D: Fn(V),
{
    type Value = V;

    #[inline]
    fn hash(&self, value: &V) -> u64 {
        (self.hash)(value)
    }

    #[inline]
    fn copy(&self, value: &V) -> V {
        (self.copy)(value)
    }

    #[inline]
    fn compare(&self, a: &V, b: &V) -> bool {
        (self.compare)(a, b)
    }

    #[inline]
    fn destroy(&self, value: V) {
        (self.destroy)(value)
    }
}

/// Collects the four lifecycle closures for [`FnOps`].
///
/// An operation that was never set keeps its function-pointer placeholder
/// type and makes [`build`](Self::build) fail.
pub struct FnOpsBuilder<
    V,
    H = fn(&V) -> u64,
    C = fn(&V) -> V,
    K = fn(&V, &V) -> bool,
    D = fn(V),
> {
    hash: Option<H>,
    copy: Option<C>,
    compare: Option<K>,
    destroy: Option<D>,
    _value: PhantomData<fn(&V) -> V>,
}

impl<V, H, C, K, D> Debug for FnOpsBuilder<V, H, C, K, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FnOpsBuilder")
            .field("hash", &self.hash.is_some())
            .field("copy", &self.copy.is_some())
            .field("compare", &self.compare.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

impl<V, H, C, K, D> FnOpsBuilder<V, H, C, K, D> {
    /// Sets the hash operation.
    pub fn hash<F>(self, f: F) -> FnOpsBuilder<V, F, C, K, D>
    where
        F: Fn(&V) -> u64,
    {
        FnOpsBuilder {
            hash: Some(f),
            copy: self.copy,
            compare: self.compare,
            destroy: self.destroy,
            _value: PhantomData,
        }
    }

    /// Sets the copy operation.
    pub fn copy<F>(self, f: F) -> FnOpsBuilder<V, H, F, K, D>
    where
        F: Fn(&V) -> V,
    {
        FnOpsBuilder {
            hash: self.hash,
            copy: Some(f),
            compare: self.compare,
            destroy: self.destroy,
            _value: PhantomData,
        }
    }

    /// Sets the compare operation.
    pub fn compare<F>(self, f: F) -> FnOpsBuilder<V, H, C, F, D>
    where
        F: Fn(&V, &V) -> bool,
    {
        FnOpsBuilder {
            hash: self.hash,
            copy: self.copy,
            compare: Some(f),
            destroy: self.destroy,
            _value: PhantomData,
        }
    }

    /// Sets the destroy operation.
    pub fn destroy<F>(self, f: F) -> FnOpsBuilder<V, H, C, K, F>
    where
        F: Fn(V),
    {
        FnOpsBuilder {
            hash: self.hash,
            copy: self.copy,
            compare: self.compare,
            destroy: Some(f),
            _value: PhantomData,
        }
    }
}

impl<V, H, C, K, D> FnOpsBuilder<V, H, C, K, D>
where
    H: Fn(&V) -> u64,
    C: Fn(&V) -> V,
    K: Fn(&V, &V) -> bool,
    D: Fn(V),
{
    /// Finishes the builder.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingOperation`] naming the first operation,
    /// in `hash`, `copy`, `compare`, `destroy` order, that was never set.
    pub fn build(self) -> Result<FnOps<V, H, C, K, D>, BuildError> {
        let missing = BuildError::MissingOperation;
        Ok(FnOps::new(
            self.hash.ok_or(missing(Operation::Hash))?,
            self.copy.ok_or(missing(Operation::Copy))?,
            self.compare.ok_or(missing(Operation::Compare))?,
            self.destroy.ok_or(missing(Operation::Destroy))?,
        ))
    }
}

/// [`ValueOps`] derived from `Hash + Clone + Eq` and a [`BuildHasher`].
///
/// This is what [`HashSet`](crate::HashSet) stores its values with.
pub struct StdOps<T, S> {
    hash_builder: S,
    _phantom: PhantomData<fn(&T) -> T>,
}

impl<T, S> StdOps<T, S> {
    /// Wraps a hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            hash_builder,
            _phantom: PhantomData,
        }
    }

    /// Returns the hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }
}

impl<T, S: Clone> Clone for StdOps<T, S> {
    fn clone(&self) -> Self {
        Self::with_hasher(self.hash_builder.clone())
    }
}

impl<T, S: Default> Default for StdOps<T, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<T, S> Debug for StdOps<T, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StdOps").finish_non_exhaustive()
    }
}

impl<T, S> ValueOps for StdOps<T, S>
where
    T: Hash + Eq + Clone,
    S: BuildHasher,
{
    type Value = T;

    #[inline]
    fn hash(&self, value: &T) -> u64 {
        self.hash_builder.hash_one(value)
    }

    #[inline]
    fn copy(&self, value: &T) -> T {
        value.clone()
    }

    #[inline]
    fn compare(&self, a: &T, b: &T) -> bool {
        a == b
    }
}

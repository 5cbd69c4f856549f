use crate::ops::ValueOps;

/// A single table cell.
///
/// A slot owns at most one value. Independently of what it holds, a slot is
/// also the *anchor* (probe step 0) for every key whose hash lands on it, and
/// keeps the bookkeeping for that chain:
///
/// - `anchor_count` is the number of live values anchored here.
/// - `probe_span` is how many probe attempts from here reach all of them.
///   Zero exactly when `anchor_count` is zero.
///
/// The lifecycle operations live on the table and are passed in.
#[derive(Debug)]
pub(crate) struct Slot<V> {
    value: Option<V>,
    anchor_count: usize,
    probe_span: usize,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            value: None,
            anchor_count: 0,
            probe_span: 0,
        }
    }
}

impl<V> Slot<V> {
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    #[inline]
    pub(crate) fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    #[inline]
    pub(crate) fn anchor_count(&self) -> usize {
        self.anchor_count
    }

    #[inline]
    pub(crate) fn probe_span(&self) -> usize {
        self.probe_span
    }

    /// Destroys whatever the slot held, then stores a copy of `value`.
    pub(crate) fn set<O>(&mut self, value: &V, ops: &O)
    where
        O: ValueOps<Value = V>,
    {
        self.clear(ops);
        self.value = Some(ops.copy(value));
    }

    /// Takes ownership of `value` without copying it, destroying whatever the
    /// slot held before.
    pub(crate) fn transplant<O>(&mut self, value: V, ops: &O)
    where
        O: ValueOps<Value = V>,
    {
        if let Some(old) = self.value.replace(value) {
            ops.destroy(old);
        }
    }

    /// A slot holding a copy of this slot's value and the same anchor
    /// bookkeeping.
    pub(crate) fn duplicate<O>(&self, ops: &O) -> Self
    where
        O: ValueOps<Value = V>,
    {
        Self {
            value: self.value.as_ref().map(|value| ops.copy(value)),
            anchor_count: self.anchor_count,
            probe_span: self.probe_span,
        }
    }

    /// Destroys the held value, if any. Anchor bookkeeping is untouched.
    pub(crate) fn clear<O>(&mut self, ops: &O)
    where
        O: ValueOps<Value = V>,
    {
        if let Some(old) = self.value.take() {
            ops.destroy(old);
        }
    }

    /// Moves the held value out without destroying it.
    #[inline]
    pub(crate) fn take(&mut self) -> Option<V> {
        self.value.take()
    }

    /// `false` for an empty slot, otherwise whatever `compare` says.
    #[inline]
    pub(crate) fn matches<O>(&self, value: &V, ops: &O) -> bool
    where
        O: ValueOps<Value = V>,
    {
        match &self.value {
            Some(held) => ops.compare(held, value),
            None => false,
        }
    }

    /// Records a value anchored here that was placed at probe `attempt`.
    #[inline]
    pub(crate) fn anchor(&mut self, attempt: usize) {
        self.anchor_count += 1;
        self.probe_span = self.probe_span.max(attempt + 1);
    }

    /// Records that a value anchored here left the table.
    #[inline]
    pub(crate) fn release(&mut self) {
        debug_assert!(self.anchor_count > 0);
        self.anchor_count -= 1;
        if self.anchor_count == 0 {
            self.probe_span = 0;
        }
    }

    /// Forgets all chains anchored here.
    #[inline]
    pub(crate) fn reset_anchor(&mut self) {
        self.anchor_count = 0;
        self.probe_span = 0;
    }
}

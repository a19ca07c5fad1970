//! Edit sessions: the only way to derive a new record version from an
//! existing one while leaving the original untouched.
//!
//! A session mutably borrows its origin for its whole lifetime, so a second
//! (nested or concurrent) session on the same record does not compile.

use std::ops::{Deref, DerefMut};

use super::Record;

/// Scratch copy of a record; mutations go to the copy until [`EditSession::commit`].
pub struct EditSession<'a> {
    origin: &'a mut Record,
    scratch: Record,
}

impl<'a> EditSession<'a> {
    pub(super) fn new(origin: &'a mut Record) -> Self {
        let scratch = origin.clone();
        Self { origin, scratch }
    }

    /// The record the session started from.
    pub fn origin(&self) -> &Record {
        self.origin
    }

    /// True when the scratch copy differs from the origin.
    pub fn has_changes(&self) -> bool {
        self.scratch != *self.origin
    }

    /// Materialize the edited record. The origin is unchanged.
    pub fn commit(self) -> Record {
        self.scratch
    }

    /// Write the edited record back over the origin.
    pub fn commit_in_place(self) {
        *self.origin = self.scratch;
    }
}

impl Deref for EditSession<'_> {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.scratch
    }
}

impl DerefMut for EditSession<'_> {
    fn deref_mut(&mut self) -> &mut Record {
        &mut self.scratch
    }
}

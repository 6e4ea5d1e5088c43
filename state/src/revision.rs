// Copyright 2018 Kodebox, Inc.
// This file is part of CodeChain.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The snapshot/revert stack (section 4.2). A revision pins a journal
//! length plus an opaque payload the caller wants restored on revert (e.g.
//! an aggregate-balance delta).

/// Extra, revision-scoped state to restore on revert, beyond what the
/// journal already undoes.
pub trait RevisionExtra: Clone {
    fn restore(&self, current: &Self) -> Self {
        current.clone()
    }
}

impl RevisionExtra for () {}

#[derive(Debug, Clone)]
pub struct Revision<E> {
    pub id: u64,
    pub journal_length: usize,
    pub extra: E,
}

/// A stack of revisions sorted by id, supporting binary-search revert to
/// any prior depth.
#[derive(Debug, Clone)]
pub struct Revisions<E> {
    next_id: u64,
    stack: Vec<Revision<E>>,
}

impl<E: Clone> Default for Revisions<E> {
    fn default() -> Self {
        Revisions {
            next_id: 0,
            stack: Vec::new(),
        }
    }
}

impl<E: Clone> Revisions<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures a revision at the current journal length, returning its id.
    pub fn snapshot(&mut self, journal_length: usize, extra: E) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.stack.push(Revision {
            id,
            journal_length,
            extra,
        });
        id
    }

    /// Binary-searches the revision stack for `id`. Fails fatally if
    /// absent: reverting to an unknown revision is a programmer error
    /// (section 7, category 3).
    pub fn revert_to(&mut self, id: u64) -> Revision<E> {
        let index = self
            .stack
            .binary_search_by_key(&id, |revision| revision.id)
            .unwrap_or_else(|_| panic!("revert_to_snapshot: unknown revision id {}", id));
        let revision = self.stack[index].clone();
        self.stack.truncate(index);
        revision
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn copy(&self) -> Revisions<E> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_to_truncates_above_and_including_target() {
        let mut revisions: Revisions<()> = Revisions::new();
        let s1 = revisions.snapshot(3, ());
        let _s2 = revisions.snapshot(7, ());
        let revision = revisions.revert_to(s1);
        assert_eq!(revision.journal_length, 3);
        assert!(revisions.is_empty());
    }

    #[test]
    fn nested_revert_is_order_independent() {
        let mut a: Revisions<()> = Revisions::new();
        let s1 = a.snapshot(1, ());
        let s2 = a.snapshot(2, ());
        let direct = a.revert_to(s1);

        let mut b: Revisions<()> = Revisions::new();
        let t1 = b.snapshot(1, ());
        let _t2 = b.snapshot(2, ());
        b.revert_to(s2);
        let via_s2 = b.revert_to(t1);

        assert_eq!(direct.journal_length, via_s2.journal_length);
    }

    #[test]
    #[should_panic]
    fn revert_to_unknown_id_panics() {
        let mut revisions: Revisions<()> = Revisions::new();
        revisions.snapshot(0, ());
        revisions.revert_to(999);
    }
}

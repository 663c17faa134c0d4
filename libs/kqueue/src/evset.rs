// Copyright (c) 2022 Huawei Technologies Co.,Ltd. All rights reserved.
//
// sysMaster is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan
// PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//         http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY
// KIND, EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO
// NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Lookup from a delivered kernel event back to its interest.
//!
//! The set only keeps weak references: the host owns the interests, and an
//! interest removes itself before it goes away.
use crate::{Event, FilterKind};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

#[derive(Debug)]
pub(crate) struct EventSet<U> {
    sets: [HashMap<usize, Weak<Event<U>>>; 4],
}

fn slot(kind: FilterKind) -> usize {
    match kind {
        FilterKind::Read => 0,
        FilterKind::Write => 1,
        FilterKind::Signal => 2,
        FilterKind::Timer => 3,
    }
}

impl<U> EventSet<U> {
    pub(crate) fn new() -> EventSet<U> {
        EventSet {
            sets: [
                HashMap::new(),
                HashMap::new(),
                HashMap::new(),
                HashMap::new(),
            ],
        }
    }

    pub(crate) fn get(&self, kind: FilterKind, ident: usize) -> Option<Rc<Event<U>>> {
        self.sets[slot(kind)].get(&ident).and_then(Weak::upgrade)
    }

    /// Returns false when another live interest holds the key.
    pub(crate) fn insert(&mut self, kind: FilterKind, ident: usize, event: Weak<Event<U>>) -> bool {
        let set = &mut self.sets[slot(kind)];
        if let Some(old) = set.get(&ident) {
            if old.strong_count() > 0 && !old.ptr_eq(&event) {
                return false;
            }
        }
        set.insert(ident, event);
        true
    }

    pub(crate) fn remove(&mut self, kind: FilterKind, ident: usize) -> bool {
        self.sets[slot(kind)].remove(&ident).is_some()
    }

    /// number of registrations across all kinds
    pub(crate) fn len(&self) -> usize {
        self.sets.iter().map(HashMap::len).sum()
    }
}

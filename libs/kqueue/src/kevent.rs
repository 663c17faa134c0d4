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

//! The kernel event descriptor exchanged with the poller
use crate::FilterKind;
use bitflags::bitflags;

bitflags! {
    /// Action and state flags of a kernel event, with the BSD bit values
    pub struct EvFlags: u16 {
        /// add the event to the queue
        const ADD = 0x0001;
        /// delete the event from the queue
        const DELETE = 0x0002;
        /// enable the event
        const ENABLE = 0x0004;
        /// disable the event without removing it
        const DISABLE = 0x0008;
        /// remove the event after its first occurrence
        const ONESHOT = 0x0010;
        /// reset the event state after it is retrieved
        const CLEAR = 0x0020;
        /// the event carries an error, errno is in data
        const ERROR = 0x4000;
        /// the underlying object reached end of file
        const EOF = 0x8000;
    }
}

impl EvFlags {
    /// the bits selecting level, edge or oneshot triggering
    pub const TRIGGER: EvFlags = EvFlags {
        bits: 0x0010 | 0x0020,
    };
}

/// A kernel event record without the user pointer.
///
/// `filter == 0` means no filter kind was assigned yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KEvent {
    /// fd, signal number or timer tag
    pub ident: usize,
    /// raw filter value
    pub filter: i16,
    /// action and state flags
    pub flags: EvFlags,
    /// filter specific flags
    pub fflags: u32,
    /// filter specific data
    pub data: i64,
}

impl KEvent {
    /// build an event descriptor
    pub fn new(ident: usize, kind: FilterKind, flags: EvFlags, fflags: u32, data: i64) -> KEvent {
        KEvent {
            ident,
            filter: kind.raw(),
            flags,
            fflags,
            data,
        }
    }

    /// the filter kind, none when untyped or unknown
    pub fn kind(&self) -> Option<FilterKind> {
        FilterKind::from_raw(self.filter)
    }

    /// the same event with other flags
    pub fn with_flags(&self, flags: EvFlags) -> KEvent {
        KEvent { flags, ..*self }
    }

    /// kernel dropped the registration after this occurrence
    pub fn is_oneshot(&self) -> bool {
        self.flags.contains(EvFlags::ONESHOT)
    }

    /// edge-triggered registration
    pub fn is_edge(&self) -> bool {
        self.flags.contains(EvFlags::CLEAR)
    }

    /// end of file reached
    pub fn is_eof(&self) -> bool {
        self.flags.contains(EvFlags::EOF)
    }

    /// error occurrence
    pub fn is_error(&self) -> bool {
        self.flags.contains(EvFlags::ERROR)
    }
}

impl Default for EvFlags {
    fn default() -> Self {
        EvFlags::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_untyped() {
        let ev = KEvent::default();
        assert_eq!(ev.kind(), None);
        assert!(ev.flags.is_empty());
    }

    #[test]
    fn test_markers() {
        let ev = KEvent::new(
            5,
            FilterKind::Read,
            EvFlags::CLEAR | EvFlags::EOF,
            0,
            0,
        );
        assert_eq!(ev.kind(), Some(FilterKind::Read));
        assert!(ev.is_edge());
        assert!(ev.is_eof());
        assert!(!ev.is_oneshot());
        assert!(!ev.is_error());

        let ev = ev.with_flags(EvFlags::ONESHOT);
        assert!(ev.is_oneshot());
        assert!(!ev.is_eof());
        assert_eq!(ev.ident, 5);
    }
}

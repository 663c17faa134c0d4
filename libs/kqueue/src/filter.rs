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

//! Filter kinds supported by the multiplexer, and the rules each one applies
//! to its identifier before anything reaches the kernel.
use crate::error::*;
use crate::KEvent;
use std::convert::TryFrom;
use std::fmt;

/// read-ready filter
pub const EVFILT_READ: i16 = -1;
/// write-ready filter
pub const EVFILT_WRITE: i16 = -2;
/// signal-pending filter
pub const EVFILT_SIGNAL: i16 = -6;
/// timer-elapsed filter
pub const EVFILT_TIMER: i16 = -7;

/// The category of condition being monitored
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
#[repr(i16)]
pub enum FilterKind {
    /// ident is a file descriptor, ready for reading
    Read = EVFILT_READ,
    /// ident is a file descriptor, ready for writing
    Write = EVFILT_WRITE,
    /// ident is a signal number
    Signal = EVFILT_SIGNAL,
    /// ident is an arbitrary tag, data is the period in milliseconds
    Timer = EVFILT_TIMER,
}

impl FilterKind {
    /// all supported kinds
    pub const ALL: [FilterKind; 4] = [
        FilterKind::Read,
        FilterKind::Write,
        FilterKind::Signal,
        FilterKind::Timer,
    ];

    /// the kind of a raw filter value
    pub fn from_raw(filter: i16) -> Option<FilterKind> {
        match filter {
            EVFILT_READ => Some(FilterKind::Read),
            EVFILT_WRITE => Some(FilterKind::Write),
            EVFILT_SIGNAL => Some(FilterKind::Signal),
            EVFILT_TIMER => Some(FilterKind::Timer),
            _ => None,
        }
    }

    /// the raw filter value
    pub fn raw(self) -> i16 {
        self as i16
    }

    /// short name
    pub fn name(self) -> &'static str {
        match self {
            FilterKind::Read => "read",
            FilterKind::Write => "write",
            FilterKind::Signal => "signal",
            FilterKind::Timer => "timer",
        }
    }

    /// Check the identifier and data of a registration descriptor.
    pub(crate) fn validate(self, ev: &KEvent) -> Result<()> {
        match self {
            FilterKind::Read | FilterKind::Write => {
                if ev.ident > libc::c_int::MAX as usize {
                    return Err(Error::InvalidIdent {
                        kind: self.name(),
                        ident: ev.ident as i64,
                    });
                }
            }
            FilterKind::Signal => {
                if ev.ident > libc::c_int::MAX as usize
                    || !basic::signal::is_valid_signal(ev.ident as libc::c_int)
                {
                    return Err(Error::UnsupportedSignal {
                        signo: ev.ident as i32,
                    });
                }
            }
            FilterKind::Timer => {
                if ev.data < 0 {
                    return Err(Error::InvalidDuration {
                        value: ev.data as f64 / 1000.0,
                    });
                }
            }
        }
        Ok(())
    }
}

impl TryFrom<i16> for FilterKind {
    type Error = Error;

    fn try_from(filter: i16) -> Result<Self> {
        FilterKind::from_raw(filter).ok_or(Error::InvalidFilter { filter })
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Convert a fd argument into an identifier.
pub(crate) fn fd_ident(kind: FilterKind, fd: i32) -> Result<usize> {
    if fd < 0 {
        return Err(Error::InvalidIdent {
            kind: kind.name(),
            ident: fd as i64,
        });
    }
    Ok(fd as usize)
}

/// Convert a signal number argument into an identifier.
pub(crate) fn signal_ident(signo: i32) -> Result<usize> {
    if !basic::signal::is_valid_signal(signo) {
        return Err(Error::UnsupportedSignal { signo });
    }
    Ok(signo as usize)
}

/// Convert a period in fractional seconds into whole milliseconds.
pub(crate) fn timer_data(sec: f64) -> Result<i64> {
    basic::time::sec_to_msec(sec).ok_or(Error::InvalidDuration { value: sec })
}

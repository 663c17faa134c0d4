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

//! Encapsulation of the kernel readiness interface
//!
//! On the BSDs and macOS the poller is a real kqueue. On Linux it is an
//! emulation on top of epoll, signalfd and timerfd that keeps the kqueue
//! contract: oneshot registrations disappear after their first occurrence,
//! hang-ups come back with the EOF flag, and deleting an unknown key fails
//! with ENOENT.

use crate::{EvFlags, KEvent, Result};
use basic::errno_util::errno_is_interrupted;
use std::fmt::Debug;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

/// syscall
#[macro_export]
macro_rules! syscall {
    ($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
        let res = unsafe { libc::$fn($($arg, )*) };
        if res < 0 {
            $crate::Result::Err($crate::Error::Syscall {
                syscall: stringify!($fn),
                errno: nix::errno::Errno::last() as i32,
                ret: res as i32,
            })
        } else {
            $crate::Result::Ok(res)
        }
    }};
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
pub(crate) mod kqueue;
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
use self::kqueue::Kqueue as Poller;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) mod epoll;
#[cfg(any(target_os = "linux", target_os = "android"))]
use self::epoll::Epoll as Poller;

#[cfg(test)]
pub(crate) mod mock;

/// The kernel side of the multiplexer
pub trait Kernel: Debug {
    /// Submit one change record, the flags carry ADD or DELETE.
    fn apply(&mut self, change: &KEvent) -> Result<()>;

    /// Wait for at most `max` occurred events and store them in `events`,
    /// `None` blocks until something happens.
    fn wait(
        &mut self,
        events: &mut Vec<KEvent>,
        max: usize,
        timeout: Option<Duration>,
    ) -> Result<usize>;

    /// the queue descriptor
    fn as_raw_fd(&self) -> RawFd;
}

/// Encapsulation of the kernel event queue
#[derive(Debug)]
pub struct Poll {
    poller: Box<dyn Kernel>,
}

impl Poll {
    /// create a new poller
    pub fn new() -> Result<Poll> {
        Ok(Poll {
            poller: Box::new(Poller::new()?),
        })
    }

    /// use the given kernel implementation
    pub fn with_kernel(kernel: Box<dyn Kernel>) -> Poll {
        Poll { poller: kernel }
    }

    /// poll the poller
    pub fn poll(
        &mut self,
        events: &mut Vec<KEvent>,
        max: usize,
        timeout: Option<Duration>,
    ) -> Result<usize> {
        self.poller.wait(events, max, timeout)
    }

    /// register the event to the poller, `event.flags` are sent along with ADD
    pub fn register(&mut self, event: &KEvent) -> Result<()> {
        self.submit(&event.with_flags(event.flags | EvFlags::ADD))
    }

    /// unregister the event from the poller
    pub fn unregister(&mut self, event: &KEvent) -> Result<()> {
        self.submit(&event.with_flags(EvFlags::DELETE))
    }

    fn submit(&mut self, change: &KEvent) -> Result<()> {
        loop {
            match self.poller.apply(change) {
                Err(e) if e.errno().map_or(false, errno_is_interrupted) => continue,
                r => return r,
            }
        }
    }
}

impl AsRawFd for Poll {
    fn as_raw_fd(&self) -> RawFd {
        self.poller.as_raw_fd()
    }
}

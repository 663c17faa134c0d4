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

use super::Kernel;
use crate::{syscall, Error, EvFlags, FilterKind, KEvent, Result};
use basic::time::duration_to_timespec;
use std::fmt;
use std::mem;
use std::os::unix::io::RawFd;
use std::ptr;
use std::time::Duration;

pub(crate) struct Kqueue {
    kq: RawFd,
    ready: Vec<libc::kevent>,
}

impl Kqueue {
    pub(crate) fn new() -> Result<Kqueue> {
        let kq = syscall!(kqueue())?;
        if let Err(e) = syscall!(fcntl(kq, libc::F_SETFD, libc::FD_CLOEXEC)) {
            let _ = syscall!(close(kq));
            return Err(e);
        }
        Ok(Kqueue {
            kq,
            ready: Vec::new(),
        })
    }
}

impl fmt::Debug for Kqueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kqueue")
            .field("kq", &self.kq)
            .field("ready", &self.ready.capacity())
            .finish()
    }
}

/* the EVFILT_* numbering differs between the BSDs */
fn to_raw(ev: &KEvent) -> Result<libc::kevent> {
    let filter = match ev.kind() {
        Some(FilterKind::Read) => libc::EVFILT_READ,
        Some(FilterKind::Write) => libc::EVFILT_WRITE,
        Some(FilterKind::Signal) => libc::EVFILT_SIGNAL,
        Some(FilterKind::Timer) => libc::EVFILT_TIMER,
        None => return Err(Error::syscall("kevent", libc::EINVAL)),
    };

    let mut kev: libc::kevent = unsafe { mem::zeroed() };
    kev.ident = ev.ident as _;
    kev.filter = filter;
    kev.flags = ev.flags.bits() as _;
    kev.fflags = ev.fflags as _;
    kev.data = ev.data as _;
    Ok(kev)
}

fn from_raw(kev: &libc::kevent) -> KEvent {
    let kind = match kev.filter {
        f if f == libc::EVFILT_READ => Some(FilterKind::Read),
        f if f == libc::EVFILT_WRITE => Some(FilterKind::Write),
        f if f == libc::EVFILT_SIGNAL => Some(FilterKind::Signal),
        f if f == libc::EVFILT_TIMER => Some(FilterKind::Timer),
        _ => None,
    };

    KEvent {
        ident: kev.ident as usize,
        /* unknown filters stay untyped and are skipped */
        filter: kind.map_or(0, FilterKind::raw),
        flags: EvFlags::from_bits_truncate(kev.flags as u16),
        fflags: kev.fflags as u32,
        data: kev.data as i64,
    }
}

impl Kernel for Kqueue {
    fn apply(&mut self, change: &KEvent) -> Result<()> {
        let kev = to_raw(change)?;
        syscall!(kevent(
            self.kq,
            &kev,
            1,
            ptr::null_mut(),
            0,
            ptr::null()
        ))
        .map(|_| ())
    }

    fn wait(
        &mut self,
        events: &mut Vec<KEvent>,
        max: usize,
        timeout: Option<Duration>,
    ) -> Result<usize> {
        let size = max.clamp(1, libc::c_int::MAX as usize);
        let ts = timeout.map(duration_to_timespec);
        let ts_ptr = ts
            .as_ref()
            .map_or(ptr::null(), |t| t as *const libc::timespec);
        self.ready.clear();
        self.ready.reserve(size);

        let n = syscall!(kevent(
            self.kq,
            ptr::null(),
            0,
            self.ready.as_mut_ptr(),
            size as _,
            ts_ptr
        ))?;
        unsafe {
            self.ready.set_len(n as usize);
        }

        events.clear();
        events.extend(self.ready.iter().map(from_raw));
        Ok(events.len())
    }

    fn as_raw_fd(&self) -> RawFd {
        self.kq
    }
}

impl Drop for Kqueue {
    fn drop(&mut self) {
        let _ = syscall!(close(self.kq));
    }
}

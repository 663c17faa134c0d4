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
use basic::time::{duration_to_msec_ceil, msec_to_timespec};
use libc::{epoll_event, EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD};
use nix::errno::Errno;
use std::collections::HashMap;
use std::fmt;
use std::mem::{self, MaybeUninit};
use std::os::unix::io::RawFd;
use std::ptr;
use std::time::Duration;

/// A registration as kqueue would hold it
#[derive(Debug, Clone, Copy)]
struct Interest {
    kind: FilterKind,
    ident: usize,
    flags: EvFlags,
}

impl Interest {
    fn key(&self) -> (i16, usize) {
        (self.kind.raw(), self.ident)
    }
}

/// One epoll entry. Read and write interests of a fd share the caller's
/// descriptor, signals and timers own a private signalfd or timerfd.
#[derive(Debug)]
struct Entry {
    fd: RawFd,
    owned: bool,
    interests: Vec<Interest>,
}

fn epoll_bits(interests: &[Interest]) -> u32 {
    let mut events = 0;
    for interest in interests {
        events |= match interest.kind {
            FilterKind::Read => libc::EPOLLIN | libc::EPOLLRDHUP,
            FilterKind::Write => libc::EPOLLOUT,
            FilterKind::Signal | FilterKind::Timer => libc::EPOLLIN,
        } as u32;
    }
    /* epoll keeps one trigger mode per entry, mixed modes fall back to level */
    if interests
        .iter()
        .all(|interest| interest.flags.contains(EvFlags::CLEAR))
    {
        events |= libc::EPOLLET as u32;
    }
    events
}

pub(crate) struct Epoll {
    epoll_fd: RawFd,
    keys: HashMap<(i16, usize), u64>,
    entries: HashMap<u64, Entry>,
    fds: HashMap<RawFd, u64>,
    next_token: u64,
    ready: Vec<epoll_event>,
}

impl Epoll {
    pub(crate) fn new() -> Result<Epoll> {
        syscall!(epoll_create1(EPOLL_CLOEXEC)).map(|ep| Epoll {
            epoll_fd: ep,
            keys: HashMap::new(),
            entries: HashMap::new(),
            fds: HashMap::new(),
            next_token: 0,
            ready: Vec::new(),
        })
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, events: u32, token: u64) -> Result<()> {
        let mut event = epoll_event { events, u64: token };
        syscall!(epoll_ctl(self.epoll_fd, op, fd, &mut event)).map(|_| ())
    }

    fn open_signal(signo: libc::c_int) -> Result<RawFd> {
        let mut mask = MaybeUninit::<libc::sigset_t>::zeroed();
        unsafe {
            libc::sigemptyset(mask.as_mut_ptr());
        }
        syscall!(sigaddset(mask.as_mut_ptr(), signo))?;

        /* blocked signals stay pending for the signalfd instead of being delivered */
        let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, mask.as_ptr(), ptr::null_mut()) };
        if rc != 0 {
            return Err(Error::syscall("pthread_sigmask", rc));
        }

        syscall!(signalfd(
            -1,
            mask.as_ptr(),
            libc::SFD_NONBLOCK | libc::SFD_CLOEXEC
        ))
    }

    fn open_timer(change: &KEvent) -> Result<RawFd> {
        let fd = syscall!(timerfd_create(
            libc::CLOCK_MONOTONIC,
            libc::TFD_NONBLOCK | libc::TFD_CLOEXEC
        ))?;

        /* a zero it_value disarms a timerfd, so a zero period fires after 1ns */
        let msec = change.data.max(0) as u64;
        let value = if msec == 0 {
            libc::timespec {
                tv_sec: 0,
                tv_nsec: 1,
            }
        } else {
            msec_to_timespec(msec)
        };
        let interval = if change.flags.contains(EvFlags::ONESHOT) {
            libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            }
        } else {
            value
        };
        let spec = libc::itimerspec {
            it_interval: interval,
            it_value: value,
        };

        if let Err(e) = syscall!(timerfd_settime(fd, 0, &spec, ptr::null_mut())) {
            let _ = syscall!(close(fd));
            return Err(e);
        }
        Ok(fd)
    }

    fn new_token(&mut self) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    /// Remove an epoll entry with all its interests.
    fn drop_entry(&mut self, token: u64) {
        if let Some(entry) = self.entries.remove(&token) {
            for interest in &entry.interests {
                self.keys.remove(&interest.key());
            }
            let _ = syscall!(epoll_ctl(
                self.epoll_fd,
                EPOLL_CTL_DEL,
                entry.fd,
                ptr::null_mut()
            ));
            if entry.owned {
                let _ = syscall!(close(entry.fd));
            } else {
                self.fds.remove(&entry.fd);
            }
        }
    }

    /// Remove one interest, its entry goes once nothing else uses it.
    fn remove(&mut self, key: (i16, usize)) -> bool {
        let token = match self.keys.remove(&key) {
            None => return false,
            Some(token) => token,
        };

        let (fd, left) = match self.entries.get_mut(&token) {
            None => return true,
            Some(entry) => {
                entry.interests.retain(|interest| interest.key() != key);
                (entry.fd, entry.interests.clone())
            }
        };
        if left.is_empty() {
            self.drop_entry(token);
        } else {
            let _ = self.ctl(EPOLL_CTL_MOD, fd, epoll_bits(&left), token);
        }
        true
    }

    fn add(&mut self, kind: FilterKind, change: &KEvent) -> Result<()> {
        let interest = Interest {
            kind,
            ident: change.ident,
            flags: change.flags & EvFlags::TRIGGER,
        };
        /* kqueue modifies an existing registration in place */
        self.remove(interest.key());

        match kind {
            FilterKind::Read | FilterKind::Write => self.add_fd(interest),
            FilterKind::Signal => {
                let fd = Self::open_signal(change.ident as libc::c_int)?;
                self.add_owned(interest, fd)
            }
            FilterKind::Timer => {
                let fd = Self::open_timer(change)?;
                self.add_owned(interest, fd)
            }
        }
    }

    fn add_owned(&mut self, interest: Interest, fd: RawFd) -> Result<()> {
        let token = self.new_token();
        if let Err(e) = self.ctl(EPOLL_CTL_ADD, fd, epoll_bits(&[interest]), token) {
            let _ = syscall!(close(fd));
            return Err(e);
        }

        self.keys.insert(interest.key(), token);
        self.entries.insert(
            token,
            Entry {
                fd,
                owned: true,
                interests: vec![interest],
            },
        );
        Ok(())
    }

    /// Watch the caller's fd itself, so closing it drops the registration
    /// and its peer sees the hang-up.
    fn add_fd(&mut self, interest: Interest) -> Result<()> {
        let fd = interest.ident as RawFd;
        if let Some(token) = self.fds.get(&fd).copied() {
            let mut interests = match self.entries.get(&token) {
                Some(entry) => entry.interests.clone(),
                None => Vec::new(),
            };
            interests.push(interest);

            match self.ctl(EPOLL_CTL_MOD, fd, epoll_bits(&interests), token) {
                Ok(()) => {
                    if let Some(entry) = self.entries.get_mut(&token) {
                        entry.interests = interests;
                    }
                    self.keys.insert(interest.key(), token);
                    return Ok(());
                }
                /* the fd was closed, epoll forgot it and the number was reused */
                Err(e) if e.is_errno(Errno::ENOENT) => self.drop_entry(token),
                Err(e) => return Err(e),
            }
        }

        let token = self.new_token();
        self.ctl(EPOLL_CTL_ADD, fd, epoll_bits(&[interest]), token)?;
        self.keys.insert(interest.key(), token);
        self.fds.insert(fd, token);
        self.entries.insert(
            token,
            Entry {
                fd,
                owned: false,
                interests: vec![interest],
            },
        );
        Ok(())
    }

    fn delete(&mut self, change: &KEvent) -> Result<()> {
        if self.remove((change.filter, change.ident)) {
            Ok(())
        } else {
            Err(Error::syscall("kevent", libc::ENOENT))
        }
    }

    /// Turn one epoll notification into kqueue style events, one per
    /// interest of the entry that it concerns.
    fn translate(&mut self, token: u64, bits: u32, events: &mut Vec<KEvent>) {
        let (fd, interests) = match self.entries.get(&token) {
            None => return,
            Some(entry) => (entry.fd, entry.interests.clone()),
        };

        let has = |mask: libc::c_int| bits & mask as u32 != 0;
        for interest in interests {
            let mut kev = KEvent::new(interest.ident, interest.kind, interest.flags, 0, 0);
            match interest.kind {
                FilterKind::Read => {
                    if !has(libc::EPOLLIN | libc::EPOLLRDHUP | libc::EPOLLHUP | libc::EPOLLERR) {
                        continue;
                    }
                    kev.data = readable_bytes(fd);
                    if has(libc::EPOLLRDHUP | libc::EPOLLHUP | libc::EPOLLERR) {
                        kev.flags |= EvFlags::EOF;
                    }
                    if has(libc::EPOLLERR) {
                        kev.fflags = socket_error(fd);
                    }
                }
                FilterKind::Write => {
                    if !has(libc::EPOLLOUT | libc::EPOLLHUP | libc::EPOLLERR) {
                        continue;
                    }
                    if has(libc::EPOLLHUP | libc::EPOLLERR) {
                        kev.flags |= EvFlags::EOF;
                    }
                }
                /* another reader got there first, the registration stays armed */
                FilterKind::Signal => {
                    kev.data = drain_signals(fd);
                    if kev.data == 0 {
                        continue;
                    }
                }
                FilterKind::Timer => {
                    kev.data = timer_expirations(fd);
                    if kev.data == 0 {
                        continue;
                    }
                }
            }

            /* the kernel drops a oneshot registration once it fired */
            if interest.flags.contains(EvFlags::ONESHOT) {
                self.remove(interest.key());
            }
            events.push(kev);
        }
    }
}

impl fmt::Debug for Epoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Epoll")
            .field("epoll_fd", &self.epoll_fd)
            .field("entries", &self.entries)
            .field("ready", &self.ready.capacity())
            .finish()
    }
}

fn readable_bytes(fd: RawFd) -> i64 {
    let mut n: libc::c_int = 0;
    if unsafe { libc::ioctl(fd, libc::FIONREAD, &mut n as *mut libc::c_int) } < 0 {
        return 0;
    }
    n as i64
}

fn socket_error(fd: RawFd) -> u32 {
    let mut err: libc::c_int = 0;
    let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            &mut err as *mut libc::c_int as *mut libc::c_void,
            &mut len,
        )
    };
    if rc < 0 {
        return 0;
    }
    err as u32
}

fn drain_signals(fd: RawFd) -> i64 {
    let mut count = 0;
    let mut info = MaybeUninit::<libc::signalfd_siginfo>::zeroed();
    let size = mem::size_of::<libc::signalfd_siginfo>();
    loop {
        let n = unsafe { libc::read(fd, info.as_mut_ptr() as *mut libc::c_void, size) };
        if n != size as isize {
            break;
        }
        count += 1;
    }
    count
}

fn timer_expirations(fd: RawFd) -> i64 {
    let mut expirations: u64 = 0;
    let size = mem::size_of::<u64>();
    let n = unsafe {
        libc::read(
            fd,
            &mut expirations as *mut u64 as *mut libc::c_void,
            size,
        )
    };
    if n != size as isize {
        return 0;
    }
    expirations as i64
}

impl Kernel for Epoll {
    fn apply(&mut self, change: &KEvent) -> Result<()> {
        let kind = match change.kind() {
            Some(kind) => kind,
            None => return Err(Error::syscall("kevent", libc::EINVAL)),
        };

        if change.flags.contains(EvFlags::DELETE) {
            self.delete(change)
        } else if change.flags.contains(EvFlags::ADD) {
            self.add(kind, change)
        } else {
            Err(Error::syscall("kevent", libc::EINVAL))
        }
    }

    fn wait(
        &mut self,
        events: &mut Vec<KEvent>,
        max: usize,
        timeout: Option<Duration>,
    ) -> Result<usize> {
        let size = max.clamp(1, libc::c_int::MAX as usize);
        let timeout = timeout.map_or(-1, duration_to_msec_ceil);
        events.clear();

        loop {
            self.ready.clear();
            self.ready.reserve(size);
            let n_ready = syscall!(epoll_wait(
                self.epoll_fd,
                self.ready.as_mut_ptr(),
                size as libc::c_int,
                timeout,
            ))?;
            unsafe {
                self.ready.set_len(n_ready as usize);
            }

            let ready = mem::take(&mut self.ready);
            for event in ready.iter() {
                self.translate(event.u64, event.events, events);
            }
            self.ready = ready;

            /* an infinite wait only returns with something to report */
            if !events.is_empty() || timeout >= 0 {
                return Ok(events.len());
            }
        }
    }

    fn as_raw_fd(&self) -> RawFd {
        self.epoll_fd
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        for entry in self.entries.values().filter(|entry| entry.owned) {
            let _ = syscall!(close(entry.fd));
        }
        let _ = syscall!(close(self.epoll_fd));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pipe() -> (RawFd, RawFd) {
        nix::unistd::pipe().unwrap()
    }

    #[test]
    fn epoll_read_level() {
        let mut ep = Epoll::new().unwrap();
        let (r, w) = pipe();
        let ev = KEvent::new(r as usize, FilterKind::Read, EvFlags::ADD, 0, 0);
        ep.apply(&ev).unwrap();

        let mut events = Vec::new();
        assert_eq!(
            ep.wait(&mut events, 1, Some(Duration::from_millis(10)))
                .unwrap(),
            0
        );

        nix::unistd::write(w, b"abc").unwrap();
        for _ in 0..2 {
            assert_eq!(ep.wait(&mut events, 1, None).unwrap(), 1);
            assert_eq!(events[0].ident, r as usize);
            assert_eq!(events[0].kind(), Some(FilterKind::Read));
            assert_eq!(events[0].data, 3);
            assert!(!events[0].is_eof());
        }

        ep.apply(&ev.with_flags(EvFlags::DELETE)).unwrap();
        let err = ep.apply(&ev.with_flags(EvFlags::DELETE)).unwrap_err();
        assert_eq!(err.errno(), Some(libc::ENOENT));

        let _ = nix::unistd::close(r);
        let _ = nix::unistd::close(w);
    }

    #[test]
    fn epoll_oneshot_is_dropped() {
        let mut ep = Epoll::new().unwrap();
        let (r, w) = pipe();
        let ev = KEvent::new(
            w as usize,
            FilterKind::Write,
            EvFlags::ADD | EvFlags::ONESHOT,
            0,
            0,
        );
        ep.apply(&ev).unwrap();

        let mut events = Vec::new();
        assert_eq!(ep.wait(&mut events, 1, None).unwrap(), 1);
        assert!(events[0].is_oneshot());
        assert!(ep.keys.is_empty());
        assert!(ep.entries.is_empty());
        assert!(ep.fds.is_empty());

        let err = ep.apply(&ev.with_flags(EvFlags::DELETE)).unwrap_err();
        assert_eq!(err.errno(), Some(libc::ENOENT));

        let _ = nix::unistd::close(r);
        let _ = nix::unistd::close(w);
    }

    #[test]
    fn epoll_hangup_is_eof() {
        let mut ep = Epoll::new().unwrap();
        let (r, w) = pipe();
        let ev = KEvent::new(r as usize, FilterKind::Read, EvFlags::ADD, 0, 0);
        ep.apply(&ev).unwrap();
        nix::unistd::close(w).unwrap();

        let mut events = Vec::new();
        assert_eq!(ep.wait(&mut events, 1, None).unwrap(), 1);
        assert!(events[0].is_eof());
        let _ = nix::unistd::close(r);
    }

    #[test]
    fn epoll_timer_counts_expirations() {
        let mut ep = Epoll::new().unwrap();
        let ev = KEvent::new(7, FilterKind::Timer, EvFlags::ADD, 0, 5);
        ep.apply(&ev).unwrap();

        let mut events = Vec::new();
        assert_eq!(ep.wait(&mut events, 1, None).unwrap(), 1);
        assert_eq!(events[0].ident, 7);
        assert!(events[0].data >= 1);
        ep.apply(&ev.with_flags(EvFlags::DELETE)).unwrap();
    }

    #[test]
    fn epoll_bad_fd() {
        let mut ep = Epoll::new().unwrap();
        let ev = KEvent::new(100_000, FilterKind::Read, EvFlags::ADD, 0, 0);
        let err = ep.apply(&ev).unwrap_err();
        assert_eq!(err.errno(), Some(libc::EBADF));
        assert!(ep.keys.is_empty());
    }

    fn socketpair() -> (RawFd, RawFd) {
        let mut fds = [0; 2];
        let rc = unsafe {
            libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr())
        };
        assert_eq!(rc, 0);
        (fds[0], fds[1])
    }

    #[test]
    fn epoll_read_write_share_fd() {
        let mut ep = Epoll::new().unwrap();
        let (a, b) = socketpair();
        let read = KEvent::new(a as usize, FilterKind::Read, EvFlags::ADD, 0, 0);
        let write = KEvent::new(a as usize, FilterKind::Write, EvFlags::ADD, 0, 0);
        ep.apply(&read).unwrap();
        ep.apply(&write).unwrap();
        assert_eq!(ep.entries.len(), 1);

        let mut events = Vec::new();
        assert_eq!(ep.wait(&mut events, 2, None).unwrap(), 1);
        assert_eq!(events[0].kind(), Some(FilterKind::Write));

        nix::unistd::write(b, b"x").unwrap();
        assert_eq!(ep.wait(&mut events, 2, None).unwrap(), 2);
        let readable = events
            .iter()
            .find(|ev| ev.kind() == Some(FilterKind::Read))
            .unwrap();
        assert_eq!(readable.data, 1);

        ep.apply(&read.with_flags(EvFlags::DELETE)).unwrap();
        assert_eq!(ep.wait(&mut events, 2, None).unwrap(), 1);
        assert_eq!(events[0].kind(), Some(FilterKind::Write));

        ep.apply(&write.with_flags(EvFlags::DELETE)).unwrap();
        assert!(ep.entries.is_empty());
        assert!(ep.fds.is_empty());
        let _ = nix::unistd::close(a);
        let _ = nix::unistd::close(b);
    }

    #[test]
    fn epoll_closed_writer_hangs_up_reader() {
        let mut ep = Epoll::new().unwrap();
        let (r, w) = pipe();
        let write = KEvent::new(w as usize, FilterKind::Write, EvFlags::ADD | EvFlags::CLEAR, 0, 0);
        ep.apply(&write).unwrap();
        ep.apply(&KEvent::new(r as usize, FilterKind::Read, EvFlags::ADD, 0, 0))
            .unwrap();

        let mut events = Vec::new();
        assert_eq!(ep.wait(&mut events, 2, None).unwrap(), 1);
        assert_eq!(events[0].kind(), Some(FilterKind::Write));

        nix::unistd::close(w).unwrap();
        assert_eq!(
            ep.wait(&mut events, 2, Some(Duration::from_millis(200)))
                .unwrap(),
            1
        );
        assert_eq!(events[0].ident, r as usize);
        assert!(events[0].is_eof());

        /* epoll dropped the closed fd on its own, the delete still succeeds */
        ep.apply(&write.with_flags(EvFlags::DELETE)).unwrap();
        let _ = nix::unistd::close(r);
    }

    #[test]
    fn epoll_empty_timer_read_keeps_oneshot() {
        let mut ep = Epoll::new().unwrap();
        let ev = KEvent::new(
            8,
            FilterKind::Timer,
            EvFlags::ADD | EvFlags::ONESHOT,
            0,
            20,
        );
        ep.apply(&ev).unwrap();
        let token = ep.keys[&(FilterKind::Timer.raw(), 8)];

        /* readiness reported, but nothing to read yet */
        let mut events = Vec::new();
        ep.translate(token, libc::EPOLLIN as u32, &mut events);
        assert!(events.is_empty());
        assert!(ep.keys.contains_key(&(FilterKind::Timer.raw(), 8)));

        assert_eq!(ep.wait(&mut events, 1, None).unwrap(), 1);
        assert!(events[0].is_oneshot());
        assert!(ep.entries.is_empty());
    }
}

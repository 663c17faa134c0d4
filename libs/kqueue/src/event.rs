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

//! A monitored kernel condition and its registration state machine
use crate::error::*;
use crate::filter::{fd_ident, signal_ident, timer_data};
use crate::{EvFlags, FilterKind, KEvent, Kqueue};
use std::cell::RefCell;
use std::fmt;
use std::os::unix::io::RawFd;
use std::rc::Rc;

/// Outcome of a state changing call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// the state changed
    Done,
    /// nothing to do, the interest was already in that state
    Already,
}

/// Structured view of a kernel event descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct EventInfo<U> {
    /// fd, signal number or timer tag
    pub ident: usize,
    /// raw filter value
    pub filter: i16,
    /// flags without the action, trigger and state bits
    pub flags: EvFlags,
    /// filter specific flags
    pub fflags: u32,
    /// filter specific data
    pub data: i64,
    /// the payload of the interest
    pub udata: Option<U>,
    /// edge-triggered
    pub edge: bool,
    /// oneshot
    pub oneshot: bool,
    /// end of file
    pub eof: bool,
    /// errno carried by an error occurrence
    pub error: Option<i32>,
}

impl<U> EventInfo<U> {
    fn new(kev: &KEvent, udata: Option<U>) -> EventInfo<U> {
        let stripped = EvFlags::ADD | EvFlags::TRIGGER | EvFlags::EOF | EvFlags::ERROR;
        EventInfo {
            ident: kev.ident,
            filter: kev.filter,
            flags: kev.flags - stripped,
            fflags: kev.fflags,
            data: kev.data,
            udata,
            edge: kev.is_edge(),
            oneshot: kev.is_oneshot(),
            eof: kev.is_eof(),
            error: kev.is_error().then(|| kev.data as i32),
        }
    }
}

/// An interest: one (filter kind, ident) pair watched through its owning
/// [`Kqueue`].
///
/// The host keeps the interest alive while it is enabled, the multiplexer
/// only indexes it. Dropping an enabled interest unwatches it.
#[derive(Debug)]
pub struct Event<U> {
    inner: RefCell<EventInner<U>>,
}

#[derive(Debug)]
struct EventInner<U> {
    kq: Rc<Kqueue<U>>,
    enabled: bool,
    registered: KEvent,
    occurred: KEvent,
    udata: Option<U>,
}

impl<U> Event<U> {
    pub(crate) fn new(kq: Rc<Kqueue<U>>) -> Rc<Event<U>> {
        Rc::new(Event {
            inner: RefCell::new(EventInner {
                kq,
                enabled: false,
                registered: KEvent::default(),
                occurred: KEvent::default(),
                udata: None,
            }),
        })
    }

    /// Register the interest with its owner.
    ///
    /// An interest that is already enabled is left alone. A different
    /// interest holding the same key makes the call fail with
    /// [`Error::AlreadyRegistered`].
    pub fn watch(self: &Rc<Self>) -> Result<Status> {
        let mut inner = self.inner.borrow_mut();
        if inner.enabled {
            return Ok(Status::Already);
        }

        let kind = FilterKind::try_from(inner.registered.filter)?;
        kind.validate(&inner.registered)?;
        inner.kq.register(&inner.registered, Rc::downgrade(self))?;
        inner.enabled = true;
        Ok(Status::Done)
    }

    /// Remove the registration, the kernel side may already be gone.
    pub fn unwatch(&self) -> Result<Status> {
        let mut inner = self.inner.borrow_mut();
        if !inner.enabled {
            return Ok(Status::Already);
        }

        inner.kq.unregister(&inner.registered)?;
        inner.enabled = false;
        Ok(Status::Done)
    }

    /// Move the interest to `kq`, or re-register it under the current owner
    /// with `None`. An enabled interest is watched again afterwards.
    pub fn renew(self: &Rc<Self>, kq: Option<Rc<Kqueue<U>>>) -> Result<Status> {
        let status = self.unwatch()?;
        if let Some(kq) = kq {
            self.inner.borrow_mut().kq = kq;
        }

        match status {
            Status::Done => self.watch(),
            Status::Already => Ok(Status::Done),
        }
    }

    /// Unwatch and return to the untyped state, the owner is kept.
    pub fn revert(&self) -> Result<()> {
        self.unwatch()?;
        let mut inner = self.inner.borrow_mut();
        inner.registered = KEvent::default();
        inner.occurred = KEvent::default();
        inner.udata = None;
        Ok(())
    }

    fn set_trigger(&self, trigger: EvFlags) -> Result<Status> {
        let mut inner = self.inner.borrow_mut();
        if inner.enabled {
            return Err(Error::Busy);
        }
        if inner.registered.flags & EvFlags::TRIGGER == trigger {
            return Ok(Status::Already);
        }

        inner.registered.flags.remove(EvFlags::TRIGGER);
        inner.registered.flags.insert(trigger);
        Ok(Status::Done)
    }

    /// level-triggered from the next watch on
    pub fn as_level(&self) -> Result<Status> {
        self.set_trigger(EvFlags::empty())
    }

    /// edge-triggered from the next watch on
    pub fn as_edge(&self) -> Result<Status> {
        self.set_trigger(EvFlags::CLEAR)
    }

    /// oneshot from the next watch on
    pub fn as_oneshot(&self) -> Result<Status> {
        self.set_trigger(EvFlags::ONESHOT)
    }

    /// is level-triggered
    pub fn is_level(&self) -> bool {
        !self
            .inner
            .borrow()
            .registered
            .flags
            .intersects(EvFlags::TRIGGER)
    }

    /// is edge-triggered
    pub fn is_edge(&self) -> bool {
        self.inner.borrow().registered.is_edge()
    }

    /// is oneshot
    pub fn is_oneshot(&self) -> bool {
        self.inner.borrow().registered.is_oneshot()
    }

    fn as_typed(
        self: &Rc<Self>,
        kind: FilterKind,
        ident: usize,
        data: i64,
        udata: Option<U>,
    ) -> Result<Status> {
        {
            let mut inner = self.inner.borrow_mut();
            if let Some(typed) = inner.registered.kind() {
                return Err(Error::Typed { kind: typed.name() });
            }
            let trigger = inner.registered.flags & EvFlags::TRIGGER;
            inner.registered = KEvent::new(ident, kind, trigger, 0, data);
            inner.udata = udata;
        }

        self.watch().map_err(|e| {
            let mut inner = self.inner.borrow_mut();
            let trigger = inner.registered.flags & EvFlags::TRIGGER;
            inner.registered = KEvent::default().with_flags(trigger);
            inner.udata = None;
            e
        })
    }

    /// Watch `fd` for reading.
    pub fn as_read(self: &Rc<Self>, fd: RawFd, udata: Option<U>) -> Result<Status> {
        let ident = fd_ident(FilterKind::Read, fd)?;
        self.as_typed(FilterKind::Read, ident, 0, udata)
    }

    /// Watch `fd` for writing.
    pub fn as_write(self: &Rc<Self>, fd: RawFd, udata: Option<U>) -> Result<Status> {
        let ident = fd_ident(FilterKind::Write, fd)?;
        self.as_typed(FilterKind::Write, ident, 0, udata)
    }

    /// Watch the delivery of `signo`.
    pub fn as_signal(self: &Rc<Self>, signo: i32, udata: Option<U>) -> Result<Status> {
        let ident = signal_ident(signo)?;
        self.as_typed(FilterKind::Signal, ident, 0, udata)
    }

    /// Watch a timer tagged `ident` that fires every `sec` seconds,
    /// truncated to whole milliseconds.
    pub fn as_timer(self: &Rc<Self>, ident: usize, sec: f64, udata: Option<U>) -> Result<Status> {
        let msec = timer_data(sec)?;
        self.as_typed(FilterKind::Timer, ident, msec, udata)
    }

    /// Apply what an occurrence implies for the registration: the kernel
    /// already dropped a oneshot one, error and EOF need an explicit delete.
    pub(crate) fn settle(&self, kev: &KEvent) -> Result<()> {
        if kev.is_oneshot() {
            let mut inner = self.inner.borrow_mut();
            if inner.enabled {
                inner.kq.forget(&inner.registered);
                inner.enabled = false;
            }
            return Ok(());
        }

        if kev.is_error() || kev.is_eof() {
            self.unwatch()?;
        }
        Ok(())
    }

    pub(crate) fn deliver(&self, kev: &KEvent) -> Result<()> {
        self.inner.borrow_mut().occurred = *kev;
        self.settle(kev)
    }

    /// fd, signal number or timer tag
    pub fn ident(&self) -> usize {
        self.inner.borrow().registered.ident
    }

    /// filter kind, none while untyped
    pub fn filter(&self) -> Option<FilterKind> {
        self.inner.borrow().registered.kind()
    }

    /// registered with the kernel
    pub fn is_enabled(&self) -> bool {
        self.inner.borrow().enabled
    }

    /// the last occurrence reported end of file
    pub fn is_eof(&self) -> bool {
        self.inner.borrow().occurred.is_eof()
    }

    /// replace the payload, the old one is returned
    pub fn set_udata(&self, udata: Option<U>) -> Option<U> {
        std::mem::replace(&mut self.inner.borrow_mut().udata, udata)
    }

    /// take the payload out
    pub fn take_udata(&self) -> Option<U> {
        self.inner.borrow_mut().udata.take()
    }

    /// the owning multiplexer
    pub fn kqueue(&self) -> Rc<Kqueue<U>> {
        self.inner.borrow().kq.clone()
    }
}

impl<U: Clone> Event<U> {
    /// a copy of the payload
    pub fn udata(&self) -> Option<U> {
        self.inner.borrow().udata.clone()
    }

    /// the descriptor sent to the kernel on watch
    pub fn registered(&self) -> EventInfo<U> {
        let inner = self.inner.borrow();
        EventInfo::new(&inner.registered, inner.udata.clone())
    }

    /// the descriptor of the last occurrence
    pub fn occurred(&self) -> EventInfo<U> {
        let inner = self.inner.borrow();
        EventInfo::new(&inner.occurred, inner.udata.clone())
    }
}

impl<U> fmt::Display for Event<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.inner.try_borrow() {
            Ok(inner) => inner.registered.kind().map_or("event", FilterKind::name),
            Err(_) => "event",
        };
        write!(f, "kqueue.{}: {:p}", name, self)
    }
}

impl<U> Drop for Event<U> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.enabled {
            inner.kq.release(&inner.registered);
            inner.enabled = false;
        }
    }
}

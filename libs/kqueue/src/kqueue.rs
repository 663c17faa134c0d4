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

//! The multiplexer: the kernel queue, the event index and the pending batch
use crate::error::*;
use crate::evset::EventSet;
use crate::{Event, EventInfo, FilterKind, KEvent, Poll};
use basic::errno_util::{errno_is_benign_wait, errno_is_gone};
use basic::time::msec_to_timeout;
use std::cell::RefCell;
use std::fmt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::{Rc, Weak};

/// One occurred event handed out by [`Kqueue::consume`]
#[derive(Debug)]
pub struct Occurrence<U> {
    /// the interest the event was resolved to
    pub event: Rc<Event<U>>,
    /// what the kernel reported, with the payload current at delivery
    pub info: EventInfo<U>,
}

/// Kqueue multiplexer
#[derive(Debug)]
pub struct Kqueue<U> {
    data: RefCell<KqueueData<U>>,
}

impl<U> Kqueue<U> {
    /// create a multiplexer on the platform queue
    pub fn new() -> Result<Rc<Kqueue<U>>> {
        Ok(Kqueue::with_poll(Poll::new()?))
    }

    /// create a multiplexer on the given poller
    pub fn with_poll(poll: Poll) -> Rc<Kqueue<U>> {
        Rc::new(Kqueue {
            data: RefCell::new(KqueueData::new(poll)),
        })
    }

    /// create a detached interest bound to this multiplexer
    pub fn new_event(self: &Rc<Self>) -> Rc<Event<U>> {
        Event::new(self.clone())
    }

    /// number of enabled interests
    pub fn len(&self) -> usize {
        self.data.borrow().evset.len()
    }

    /// no interest is enabled
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until a registered interest is ready or `msec` elapses, and
    /// return the size of the new batch.
    ///
    /// `msec <= 0` blocks until something happens. Without any enabled
    /// interest the call returns 0 at once.
    ///
    /// Events left over from the previous batch are settled first; when the
    /// unwatch of a leftover error or end-of-file fails, that error is
    /// returned and the kernel is not waited on.
    pub fn wait(&self, msec: i64) -> Result<usize> {
        self.flush()?;

        let mut data = self.data.borrow_mut();
        let data = &mut *data;
        data.batch.clear();
        data.cur = 0;

        let nreg = data.evset.len();
        if nreg == 0 {
            return Ok(0);
        }
        if data.batch.capacity() < nreg {
            data.batch.reserve(nreg);
        }

        match data.poll.poll(&mut data.batch, nreg, msec_to_timeout(msec)) {
            Ok(n) => Ok(n),
            Err(e) if e.errno().map_or(false, errno_is_benign_wait) => {
                log::debug!("kqueue: wait interrupted: {}", e);
                data.batch.clear();
                Ok(0)
            }
            Err(e) => {
                data.batch.clear();
                Err(e)
            }
        }
    }

    /// Hand back the next occurred event of the current batch, `None` once
    /// the batch is exhausted.
    ///
    /// Oneshot occurrences disable their interest; error and end-of-file
    /// occurrences unwatch it, and a failure of that unwatch is returned.
    pub fn consume(&self) -> Result<Option<Occurrence<U>>>
    where
        U: Clone,
    {
        while let Some((kev, event)) = self.next_pending() {
            let event = match event {
                Some(event) => event,
                None => {
                    log::debug!(
                        "kqueue: skip event without interest, filter: {}, ident: {}",
                        kev.filter,
                        kev.ident
                    );
                    continue;
                }
            };

            event.deliver(&kev)?;
            let info = event.occurred();
            return Ok(Some(Occurrence { event, info }));
        }
        Ok(None)
    }

    /// Drop what is left of the previous batch, keeping the index in line
    /// with the kernel. Every leftover is settled, the first failure is
    /// returned.
    fn flush(&self) -> Result<()> {
        let mut first = None;
        while let Some((kev, event)) = self.next_pending() {
            if let Some(event) = event {
                if let Err(e) = event.settle(&kev) {
                    log::debug!("kqueue: failed to settle leftover event {}: {}", event, e);
                    first.get_or_insert(e);
                }
            }
        }

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn next_pending(&self) -> Option<(KEvent, Option<Rc<Event<U>>>)> {
        let mut data = self.data.borrow_mut();
        let kev = *data.batch.get(data.cur)?;
        data.cur += 1;
        let event = kev
            .kind()
            .and_then(|kind| data.evset.get(kind, kev.ident));
        Some((kev, event))
    }

    /// Index the interest, then add it to the kernel. The index entry is
    /// rolled back when the kernel refuses.
    pub(crate) fn register(&self, kev: &KEvent, event: Weak<Event<U>>) -> Result<()> {
        let kind = FilterKind::try_from(kev.filter)?;
        let mut data = self.data.borrow_mut();
        if !data.evset.insert(kind, kev.ident, event) {
            return Err(Error::AlreadyRegistered);
        }

        if let Err(e) = data.poll.register(kev) {
            data.evset.remove(kind, kev.ident);
            return Err(e);
        }
        log::debug!("kqueue: watch {} {}, flags: {:?}", kind, kev.ident, kev.flags);
        Ok(())
    }

    /// Delete the registration from the kernel and the index. A
    /// registration the kernel already dropped counts as deleted.
    pub(crate) fn unregister(&self, kev: &KEvent) -> Result<()> {
        let mut data = self.data.borrow_mut();
        data.unregister(kev)
    }

    /// Remove the index entry of a registration the kernel dropped itself.
    pub(crate) fn forget(&self, kev: &KEvent) {
        if let Some(kind) = kev.kind() {
            let mut data = self.data.borrow_mut();
            data.evset.remove(kind, kev.ident);
            data.drop_pending(kev);
        }
    }

    /// unregister from a destructor, never panics
    pub(crate) fn release(&self, kev: &KEvent) {
        let mut data = match self.data.try_borrow_mut() {
            Ok(data) => data,
            Err(_) => {
                log::warn!("kqueue: busy, leaking registration of {}", kev.ident);
                return;
            }
        };

        if let Err(e) = data.unregister(kev) {
            log::warn!("kqueue: failed to unwatch dropped event {}: {}", kev.ident, e);
            if let Some(kind) = kev.kind() {
                data.evset.remove(kind, kev.ident);
            }
        }
    }
}

impl<U> AsRawFd for Kqueue<U> {
    fn as_raw_fd(&self) -> RawFd {
        self.data.borrow().poll.as_raw_fd()
    }
}

impl<U> fmt::Display for Kqueue<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kqueue: {:p}", self)
    }
}

#[derive(Debug)]
struct KqueueData<U> {
    poll: Poll,
    evset: EventSet<U>,
    batch: Vec<KEvent>,
    cur: usize,
}

impl<U> KqueueData<U> {
    fn new(poll: Poll) -> KqueueData<U> {
        KqueueData {
            poll,
            evset: EventSet::new(),
            batch: Vec::new(),
            cur: 0,
        }
    }

    fn unregister(&mut self, kev: &KEvent) -> Result<()> {
        let kind = FilterKind::try_from(kev.filter)?;
        match self.poll.unregister(kev) {
            Ok(_) => {}
            Err(e) if e.errno().map_or(false, errno_is_gone) => {
                log::debug!("kqueue: {} {} already gone: {}", kind, kev.ident, e);
            }
            Err(e) => return Err(e),
        }

        if !self.evset.remove(kind, kev.ident) {
            log::debug!("kqueue: {} {} was not indexed", kind, kev.ident);
        }
        self.drop_pending(kev);
        log::debug!("kqueue: unwatch {} {}", kind, kev.ident);
        Ok(())
    }

    /// Pending events of a removed registration must not reach a later
    /// registration of the same key.
    fn drop_pending(&mut self, kev: &KEvent) {
        let cur = self.cur;
        let mut i = 0;
        self.batch.retain(|p| {
            let keep = i < cur || p.filter != kev.filter || p.ident != kev.ident;
            i += 1;
            keep
        });
    }
}

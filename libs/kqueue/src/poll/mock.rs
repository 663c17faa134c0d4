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

//! A scripted kernel for unit tests: it keeps its own registration table,
//! counts wait calls and hands out prepared batches.
use super::Kernel;
use crate::{Error, EvFlags, KEvent, Result};
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Default)]
pub(crate) struct MockState {
    /// every change record submitted, failed ones included
    pub(crate) applied: Vec<KEvent>,
    /// registrations the kernel currently holds
    pub(crate) registered: HashSet<(i16, usize)>,
    /// number of wait calls that reached the kernel
    pub(crate) waits: usize,
    /// the buffer size passed to the last wait call
    pub(crate) last_max: usize,
    /// the timeout passed to the last wait call
    pub(crate) last_timeout: Option<Duration>,
    apply_errors: VecDeque<i32>,
    batches: VecDeque<std::result::Result<Vec<KEvent>, i32>>,
}

impl MockState {
    /// make the next apply call fail with errno
    pub(crate) fn fail_apply(&mut self, errno: i32) {
        self.apply_errors.push_back(errno);
    }

    /// the next wait call reports these events
    pub(crate) fn push_batch(&mut self, events: Vec<KEvent>) {
        self.batches.push_back(Ok(events));
    }

    /// the next wait call fails with errno
    pub(crate) fn fail_wait(&mut self, errno: i32) {
        self.batches.push_back(Err(errno));
    }

    /// drop a registration behind the multiplexer's back
    pub(crate) fn forget(&mut self, filter: i16, ident: usize) {
        self.registered.remove(&(filter, ident));
    }

    pub(crate) fn holds(&self, filter: i16, ident: usize) -> bool {
        self.registered.contains(&(filter, ident))
    }
}

#[derive(Debug)]
pub(crate) struct MockKernel {
    state: Rc<RefCell<MockState>>,
}

impl MockKernel {
    pub(crate) fn new() -> (MockKernel, Rc<RefCell<MockState>>) {
        let state = Rc::new(RefCell::new(MockState::default()));
        (
            MockKernel {
                state: state.clone(),
            },
            state,
        )
    }
}

impl Kernel for MockKernel {
    fn apply(&mut self, change: &KEvent) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.applied.push(*change);
        if let Some(errno) = state.apply_errors.pop_front() {
            return Err(Error::syscall("kevent", errno));
        }

        let key = (change.filter, change.ident);
        if change.flags.contains(EvFlags::ADD) {
            state.registered.insert(key);
        } else if change.flags.contains(EvFlags::DELETE) && !state.registered.remove(&key) {
            return Err(Error::syscall("kevent", libc::ENOENT));
        }
        Ok(())
    }

    fn wait(
        &mut self,
        events: &mut Vec<KEvent>,
        max: usize,
        timeout: Option<Duration>,
    ) -> Result<usize> {
        let mut state = self.state.borrow_mut();
        state.waits += 1;
        state.last_max = max;
        state.last_timeout = timeout;
        events.clear();

        match state.batches.pop_front() {
            None => Ok(0),
            Some(Err(errno)) => Err(Error::syscall("kevent", errno)),
            Some(Ok(batch)) => {
                for ev in batch.into_iter().take(max) {
                    if ev.is_oneshot() {
                        state.registered.remove(&(ev.filter, ev.ident));
                    }
                    events.push(ev);
                }
                Ok(events.len())
            }
        }
    }

    fn as_raw_fd(&self) -> RawFd {
        -1
    }
}

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

//! # A readiness-event multiplexer with kqueue semantics
//!
//! Watch file descriptors for reading or writing, signal deliveries and
//! timers through one kernel queue.
//!
//! An [`Event`] is one interest, bound to the [`Kqueue`] that created it.
//! Interests are level-triggered unless turned into edge-triggered or
//! oneshot ones before they are watched. [`Kqueue::wait`] collects a batch
//! of occurred events and [`Kqueue::consume`] hands them back one by one;
//! oneshot, error and end-of-file occurrences disable their interest on the
//! way.
//!
//! # Example:
//! ```rust
//! use kqueue::{Kqueue, Status};
//!
//! let (r, w) = nix::unistd::pipe().unwrap();
//! let kq: std::rc::Rc<Kqueue<&str>> = Kqueue::new().unwrap();
//!
//! let ev = kq.new_event();
//! ev.as_edge().unwrap();
//! assert_eq!(ev.as_read(r, Some("pipe")).unwrap(), Status::Done);
//!
//! nix::unistd::write(w, b"hello").unwrap();
//! assert_eq!(kq.wait(1000).unwrap(), 1);
//!
//! let occurrence = kq.consume().unwrap().unwrap();
//! assert_eq!(occurrence.info.ident, r as usize);
//! assert_eq!(occurrence.info.udata, Some("pipe"));
//! assert!(occurrence.info.edge);
//! assert!(kq.consume().unwrap().is_none());
//!
//! ev.unwatch().unwrap();
//! # nix::unistd::close(r).unwrap();
//! # nix::unistd::close(w).unwrap();
//! ```
//!
pub mod error;
mod event;
mod evset;
pub mod filter;
mod kevent;
mod kqueue;
pub mod poll;

pub use crate::event::{Event, EventInfo, Status};
pub use crate::filter::{FilterKind, EVFILT_READ, EVFILT_SIGNAL, EVFILT_TIMER, EVFILT_WRITE};
pub use crate::kevent::{EvFlags, KEvent};
pub use crate::kqueue::{Kqueue, Occurrence};
pub use crate::poll::{Kernel, Poll};
pub use error::*;

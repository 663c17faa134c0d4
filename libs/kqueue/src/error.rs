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

//! Error define
use nix::errno::Errno;
use snafu::prelude::*;

/// Kqueue Error
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[non_exhaustive]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("Error(kqueue): Got an error: {:?}", source))]
    Io { source: std::io::Error },
    #[snafu(display("Error(kqueue): Nix error: {}", source))]
    Nix { source: nix::Error },
    #[snafu(display(
        "Error(kqueue): {} (ret={}, errno={}) for syscall: {}",
        strerror(errno),
        ret,
        errno,
        syscall
    ))]
    Syscall {
        syscall: &'static str,
        ret: i32,
        errno: i32,
    },
    #[snafu(display("Error(kqueue): event is already registered."))]
    AlreadyRegistered,
    #[snafu(display("Error(kqueue): event is in use."))]
    Busy,
    #[snafu(display("Error(kqueue): unsupported event filter: {}.", filter))]
    InvalidFilter { filter: i16 },
    #[snafu(display("Error(kqueue): event is already typed as {}.", kind))]
    Typed { kind: &'static str },
    #[snafu(display("Error(kqueue): invalid {} ident: {}.", kind, ident))]
    InvalidIdent { kind: &'static str, ident: i64 },
    #[snafu(display("Error(kqueue): invalid timer duration: {}.", value))]
    InvalidDuration { value: f64 },
    #[snafu(display("Error(kqueue): unsupported signal: {}.", signo))]
    UnsupportedSignal { signo: i32 },
}

impl Error {
    /// build a kernel error from the errno value of a failed syscall
    pub fn syscall(syscall: &'static str, errno: i32) -> Error {
        Error::Syscall {
            syscall,
            ret: -1,
            errno,
        }
    }

    /// the errno carried by a kernel error
    pub fn errno(&self) -> Option<i32> {
        match self {
            Error::Syscall { errno, .. } => Some(*errno),
            Error::Nix { source } => Some(*source as i32),
            Error::Io { source } => source.raw_os_error(),
            _ => None,
        }
    }

    /// whether the kernel reported the errno
    pub fn is_errno(&self, errno: Errno) -> bool {
        self.errno() == Some(errno as i32)
    }
}

/* the platform strerror text, without the "(os error N)" suffix std appends */
fn strerror(errno: &i32) -> String {
    let msg = std::io::Error::from_raw_os_error(*errno).to_string();
    match msg.rfind(" (os error ") {
        Some(end) => msg[..end].to_string(),
        None => msg,
    }
}

/// new Result
pub type Result<T, E = Error> = std::result::Result<T, E>;

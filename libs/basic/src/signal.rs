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

//! The set of signals known to the platform

use once_cell::sync::Lazy;
use std::mem::MaybeUninit;

/// Filled once on first use, read-only afterwards.
static ALL_SIGNALS: Lazy<libc::sigset_t> = Lazy::new(|| {
    let mut set = MaybeUninit::<libc::sigset_t>::zeroed();
    unsafe {
        if libc::sigfillset(set.as_mut_ptr()) == -1 {
            log::error!(
                "sigfillset failed: {}, no signal is considered valid",
                nix::errno::Errno::last()
            );
            libc::sigemptyset(set.as_mut_ptr());
        }
        set.assume_init()
    }
});

/// all signals known to the platform
pub fn all_signals() -> &'static libc::sigset_t {
    &ALL_SIGNALS
}

/// whether signo names a signal known to the platform
pub fn is_valid_signal(signo: libc::c_int) -> bool {
    if signo <= 0 {
        return false;
    }
    unsafe { libc::sigismember(all_signals(), signo) == 1 }
}

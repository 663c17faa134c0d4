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

//! Time units and conversions between them
use std::time::Duration;

/// MSec per Sec
pub const MSEC_PER_SEC: u64 = 1000;
/// USec per Sec
pub const USEC_PER_SEC: u64 = 1000000;
/// USec per MSec
pub const USEC_PER_MSEC: u64 = 1000;
/// NSec per Sec
pub const NSEC_PER_SEC: u64 = 1000000000;
/// NSec per MSec
pub const NSEC_PER_MSEC: u64 = 1000000;
/// NSec per USec
pub const NSEC_PER_USEC: u64 = 1000;

/// Convert fractional seconds into whole milliseconds, truncating.
///
/// Negative, NaN and out of range values give None.
pub fn sec_to_msec(sec: f64) -> Option<i64> {
    if !sec.is_finite() || sec < 0.0 {
        return None;
    }
    let msec = sec * MSEC_PER_SEC as f64;
    if msec >= i64::MAX as f64 {
        return None;
    }
    Some(msec as i64)
}

/// Wait timeout in milliseconds, where `msec <= 0` means forever.
pub fn msec_to_timeout(msec: i64) -> Option<Duration> {
    if msec <= 0 {
        None
    } else {
        Some(Duration::from_millis(msec as u64))
    }
}

/// Convert a duration into a timespec
pub fn duration_to_timespec(d: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: d.as_secs() as libc::time_t,
        tv_nsec: d.subsec_nanos() as libc::c_long,
    }
}

/// Convert milliseconds into a timespec
pub fn msec_to_timespec(msec: u64) -> libc::timespec {
    libc::timespec {
        tv_sec: (msec / MSEC_PER_SEC) as libc::time_t,
        tv_nsec: ((msec % MSEC_PER_SEC) * NSEC_PER_MSEC) as libc::c_long,
    }
}

/// Convert a duration into an epoll style millisecond timeout, rounding up
/// so that a short timeout never turns into a busy poll.
pub fn duration_to_msec_ceil(d: Duration) -> i32 {
    let nsec = d.as_nanos();
    let msec = (nsec + NSEC_PER_MSEC as u128 - 1) / NSEC_PER_MSEC as u128;
    if msec > i32::MAX as u128 {
        i32::MAX
    } else {
        msec as i32
    }
}

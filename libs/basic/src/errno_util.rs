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

//! utility for checking errno
//!

/// the call was interrupted and can simply be issued again
pub fn errno_is_interrupted(errno: i32) -> bool {
    errno == libc::EINTR
}

/// two errno for "the registration is already gone on the kernel side"
pub fn errno_is_gone(errno: i32) -> bool {
    matches!(errno, libc::ENOENT | libc::EBADF)
}

/// two errno a wait call may report without anything being wrong
pub fn errno_is_benign_wait(errno: i32) -> bool {
    matches!(errno, libc::EINTR | libc::ENOENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_classes() {
        assert!(errno_is_interrupted(libc::EINTR));
        assert!(!errno_is_interrupted(libc::EAGAIN));

        assert!(errno_is_gone(libc::ENOENT));
        assert!(errno_is_gone(libc::EBADF));
        assert!(!errno_is_gone(libc::EINTR));

        assert!(errno_is_benign_wait(libc::EINTR));
        assert!(errno_is_benign_wait(libc::ENOENT));
        assert!(!errno_is_benign_wait(libc::EBADF));
    }
}

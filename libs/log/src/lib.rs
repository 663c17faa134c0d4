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

//! Logging for the kqueue workspace: the `log` facade plus a console /
//! syslog backend installed once per process.
pub mod logger;

/// reexport log::Log
pub use log::max_level;
pub use log::set_max_level;
pub use log::Log;
pub use log::{debug, error, info, log_enabled, trace, warn};
pub use log::{Level, LevelFilter};
pub use log::{Metadata, Record};

pub use logger::init_log;

/// Split a comma separated target list such as `"console,syslog"`.
pub fn parse_targets(target: &str) -> Vec<&str> {
    target
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Initialize the logger from a comma separated target list.
pub fn init_log_with_target(name: &str, level: crate::Level, target: &str) {
    init_log(name, level, parse_targets(target));
}

#[cfg(test)]
mod tests {
    use crate::{init_log_with_target, parse_targets, Level};

    #[test]
    fn test_parse_targets() {
        assert_eq!(parse_targets("console"), vec!["console"]);
        assert_eq!(parse_targets(" console , syslog,"), vec!["console", "syslog"]);
        assert!(parse_targets("").is_empty());
    }

    #[test]
    fn test_init_log_with_target() {
        init_log_with_target("test", Level::Debug, "console");
        crate::error!("hello, error!");
        crate::debug!("hello debug!");
    }
}

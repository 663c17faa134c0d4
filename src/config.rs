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
//
#![allow(non_snake_case)]

use confique::Config;
use std::str::FromStr;

pub const KQWATCH_CONFIG: &str = "/etc/kqwatch/kqwatch.toml";
const TIMEOUT_MSEC_DEFAULT: i64 = 1000;

/// How new interests are triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    Level,
    Edge,
    Oneshot,
}

impl FromStr for WatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "level" => Ok(WatchMode::Level),
            "edge" => Ok(WatchMode::Edge),
            "oneshot" => Ok(WatchMode::Oneshot),
            _ => Err(format!("unknown watch mode: {}", s)),
        }
    }
}

#[derive(Config, Debug)]
pub struct KqwatchConfig {
    #[config(nested)]
    pub Log: LogConfig,
    #[config(nested)]
    pub Poll: PollConfig,
}

#[derive(Config, Debug)]
pub struct LogConfig {
    #[config(default = "info")]
    pub Level: String,
    #[config(default = "console")]
    pub Target: String,
}

#[derive(Config, Debug)]
pub struct PollConfig {
    #[config(default = 1000)] // TIMEOUT_MSEC_DEFAULT
    pub TimeoutMsec: i64,
    #[config(default = "level")]
    pub Mode: String,
}

impl KqwatchConfig {
    pub fn new(file: Option<&str>) -> KqwatchConfig {
        let builder = KqwatchConfig::builder().env();
        let kqwatch_config = builder.file(file.unwrap_or(KQWATCH_CONFIG));
        match kqwatch_config.load() {
            Ok(v) => v,
            Err(_) => KqwatchConfig::default(),
        }
    }
}

impl Default for KqwatchConfig {
    fn default() -> Self {
        Self {
            Log: LogConfig::default(),
            Poll: PollConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            Level: "info".to_string(),
            Target: "console".to_string(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            TimeoutMsec: TIMEOUT_MSEC_DEFAULT,
            Mode: "level".to_string(),
        }
    }
}

impl LogConfig {
    /// the configured level, info when it does not parse
    pub fn level(&self) -> log::Level {
        log::Level::from_str(&self.Level).unwrap_or(log::Level::Info)
    }
}

impl PollConfig {
    pub fn mode(&self) -> WatchMode {
        match self.Mode.parse() {
            Ok(mode) => mode,
            Err(e) => {
                log::warn!("{}, watching level-triggered", e);
                WatchMode::Level
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn load() {
        let mut file = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        file.push("config/kqwatch.toml");
        let config = KqwatchConfig::new(file.to_str());
        println!("{config:?}");
        assert_eq!(config.Poll.TimeoutMsec, 1000);
        assert_eq!(config.Poll.mode(), WatchMode::Level);
        assert_eq!(log::parse_targets(&config.Log.Target), vec!["console"]);
    }

    #[test]
    fn load_missing_file() {
        let config = KqwatchConfig::new(Some("/nonexistent/kqwatch.toml"));
        assert_eq!(config.Poll.TimeoutMsec, TIMEOUT_MSEC_DEFAULT);
        assert_eq!(config.Log.level(), log::Level::Info);
    }

    #[test]
    fn parse_values() {
        assert_eq!("Edge".parse::<WatchMode>().unwrap(), WatchMode::Edge);
        assert!("sometimes".parse::<WatchMode>().is_err());

        let log_config = LogConfig {
            Level: "debug".to_string(),
            Target: "console, syslog".to_string(),
        };
        assert_eq!(log_config.level(), log::Level::Debug);
        assert_eq!(
            log::parse_targets(&log_config.Target),
            vec!["console", "syslog"]
        );

        let poll = PollConfig {
            TimeoutMsec: 0,
            Mode: "bogus".to_string(),
        };
        assert_eq!(poll.mode(), WatchMode::Level);
    }
}

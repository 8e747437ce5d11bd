//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Crymap.
//
// Crymap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Crymap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Crymap. If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::support::error::Error;

/// The configuration for the mail store.
///
/// This is stored in a TOML file, conventionally `mailstore.toml` next to the
/// rest of the server configuration. Every section is optional.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct StoreConfig {
    /// How the mailbox hierarchy is shaped and what it starts with.
    #[serde(default)]
    pub namespace: NamespaceConfig,

    /// Where log output goes.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// The hierarchy delimiter.
    ///
    /// Mailbox names may never contain this character.
    pub delimiter: char,

    /// The name of the inbox, which always exists.
    pub inbox: String,

    /// Mailboxes to create when the namespace is instantiated.
    ///
    /// Names are full hierarchical names; missing intermediate mailboxes are
    /// created as non-selectable placeholders.
    pub provision: Vec<ProvisionConfig>,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        NamespaceConfig {
            delimiter: '/',
            inbox: "INBOX".to_owned(),
            provision: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProvisionConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub selectable: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// The level for the built-in stderr logger.
    ///
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`. Ignored if
    /// `config_file` is set.
    pub level: String,

    /// If set, a log4rs TOML configuration file which takes over logging
    /// entirely.
    pub config_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_owned(),
            config_file: None,
        }
    }
}

impl LoggingConfig {
    /// Return the configured level, or `None` if it is not a valid level
    /// name.
    pub fn level_filter(&self) -> Option<log::LevelFilter> {
        self.level.parse().ok()
    }
}

impl StoreConfig {
    /// Parse the configuration from TOML text.
    pub fn parse(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    /// Load the configuration from the given file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

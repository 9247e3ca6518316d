// Copyright 2024 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Toolkit configuration.
//!
//! Settings are kept in a thread-local [`config::Config`] store so that a
//! host application can load a TOML or JSON settings file once and have
//! every component pick up the values. Components take a [`Settings`]
//! snapshot at construction; changing settings afterwards does not affect
//! already-built components.

use std::cell::RefCell;

use config::{Config, FileFormat};
use serde_derive::{Deserialize, Serialize};

use crate::{Error, Result};

thread_local!(
    static SETTINGS: RefCell<Config> =
        RefCell::new(Config::try_from(&Settings::default()).unwrap_or_default());
);

// Trait used to validate user input so that configurations loaded from files
// are structurally sound before any component sees them.
pub(crate) trait SettingsValidate {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Settings for chain building and validation.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Core {
    /// Maximum trust-chain depth. Bounds the chain walk instead of a
    /// timeout, which also guards against cyclic issuer references.
    ///
    /// Defaults to 8; accepted range is 1..=16.
    pub max_chain_depth: usize,
}

impl Default for Core {
    fn default() -> Self {
        Self { max_chain_depth: 8 }
    }
}

impl SettingsValidate for Core {
    fn validate(&self) -> Result<()> {
        if !(1..=16).contains(&self.max_chain_depth) {
            return Err(Error::InvalidConfiguration(format!(
                "core.max_chain_depth must be in 1..=16, got {}",
                self.max_chain_depth
            )));
        }
        Ok(())
    }
}

/// Availability policy for revocation checking when the issuer's CRL cannot
/// be consulted.
///
/// Fail-open is a deliberate availability-over-security tradeoff: a border
/// system that cannot reach a CRL still has to process passports. The
/// policy is configurable so that deployments which prefer to reject on
/// uncertainty can do so; neither policy ever reports such a certificate as
/// *revoked*.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationPolicy {
    /// Treat an unreachable CRL as "assumed clean" (the default).
    #[default]
    FailOpen,

    /// Classify the certificate as invalid when revocation cannot be
    /// determined.
    FailClosed,
}

/// Settings for revocation checking.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Revocation {
    /// What to do when the issuer's CRL cannot be consulted.
    pub policy: RevocationPolicy,

    /// Upper bound on a single CRL fetch, in milliseconds.
    pub fetch_timeout_ms: u64,
}

impl Default for Revocation {
    fn default() -> Self {
        Self {
            policy: RevocationPolicy::FailOpen,
            fetch_timeout_ms: 5000,
        }
    }
}

impl SettingsValidate for Revocation {
    fn validate(&self) -> Result<()> {
        if self.fetch_timeout_ms == 0 {
            return Err(Error::InvalidConfiguration(
                "revocation.fetch_timeout_ms must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the batch distribution pipeline.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Distribution {
    /// Maximum number of objects per dispatched chunk.
    pub chunk_size: usize,

    /// Number of chunks that may upload concurrently.
    pub worker_threads: usize,

    /// Lower bound of the progress window this pipeline reports into.
    /// Validation owns everything below it; distribution scales its own
    /// completion into `progress_floor..=100`.
    pub progress_floor: u8,
}

impl Default for Distribution {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            worker_threads: 4,
            progress_floor: 90,
        }
    }
}

impl SettingsValidate for Distribution {
    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfiguration(
                "distribution.chunk_size must be nonzero".to_string(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(Error::InvalidConfiguration(
                "distribution.worker_threads must be nonzero".to_string(),
            ));
        }
        if self.progress_floor >= 100 {
            return Err(Error::InvalidConfiguration(format!(
                "distribution.progress_floor must be below 100, got {}",
                self.progress_floor
            )));
        }
        Ok(())
    }
}

/// Settings for the `pkd` toolkit.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Chain building and validation settings.
    pub core: Core,

    /// Revocation checking settings.
    pub revocation: Revocation,

    /// Distribution pipeline settings.
    pub distribution: Distribution,
}

impl Settings {
    /// Returns the current thread-local settings snapshot.
    pub fn current() -> Self {
        SETTINGS.with(|settings| {
            settings
                .borrow()
                .clone()
                .try_deserialize()
                .unwrap_or_default()
        })
    }

    /// Loads settings from a string in the given format ("toml" or "json")
    /// and installs them as the thread-local settings.
    pub fn from_string(settings_str: &str, format: &str) -> Result<Self> {
        let file_format = match format {
            "toml" => FileFormat::Toml,
            "json" => FileFormat::Json,
            _ => return Err(Error::BadParam(format!("unsupported format: {format}"))),
        };

        let config = Config::builder()
            .add_source(config::File::from_str(settings_str, file_format))
            .build()?;

        let settings: Settings = config.clone().try_deserialize()?;
        settings.validate()?;

        SETTINGS.with(|s| s.replace(config));
        Ok(settings)
    }

    /// Loads settings from a TOML string. See [`Settings::from_string`].
    pub fn from_toml(toml: &str) -> Result<Self> {
        Self::from_string(toml, "toml")
    }

    /// Restores the built-in default settings.
    pub fn reset() {
        SETTINGS.with(|settings| {
            settings.replace(Config::try_from(&Settings::default()).unwrap_or_default())
        });
    }
}

impl SettingsValidate for Settings {
    fn validate(&self) -> Result<()> {
        self.core.validate()?;
        self.revocation.validate()?;
        self.distribution.validate()
    }
}

/// Returns a single settings value by dotted path (e.g.
/// `"core.max_chain_depth"`).
pub fn get_settings_value<'de, T: serde::de::Deserialize<'de>>(value_path: &str) -> Result<T> {
    SETTINGS.with(|settings| settings.borrow().get::<T>(value_path).map_err(Error::from))
}

/// Overrides a single settings value by dotted path.
///
/// The updated settings are validated as a whole before they are installed;
/// a value that fails validation leaves the current settings unchanged.
pub fn update_settings_value<T: Into<config::Value>>(value_path: &str, value: T) -> Result<()> {
    SETTINGS.with(|settings| {
        let updated = Config::builder()
            .add_source(settings.borrow().clone())
            .set_override(value_path, value)?
            .build()?;

        let parsed: Settings = updated.clone().try_deserialize()?;
        parsed.validate()?;

        settings.replace(updated);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.core.max_chain_depth, 8);
        assert_eq!(settings.distribution.chunk_size, 100);
        assert_eq!(settings.revocation.policy, RevocationPolicy::FailOpen);
    }

    #[test]
    fn toml_overrides_are_installed_thread_locally() {
        let settings = Settings::from_toml(
            r#"
            [core]
            max_chain_depth = 5

            [revocation]
            policy = "fail_closed"
            fetch_timeout_ms = 250

            [distribution]
            chunk_size = 10
            worker_threads = 2
            progress_floor = 80
            "#,
        )
        .unwrap();

        assert_eq!(settings.core.max_chain_depth, 5);
        assert_eq!(Settings::current().distribution.chunk_size, 10);
        assert_eq!(
            Settings::current().revocation.policy,
            RevocationPolicy::FailClosed
        );

        Settings::reset();
        assert_eq!(Settings::current().core.max_chain_depth, 8);
    }

    #[test]
    fn single_values_can_be_read_and_overridden() {
        Settings::reset();

        let depth: usize = get_settings_value("core.max_chain_depth").unwrap();
        assert_eq!(depth, 8);

        update_settings_value("distribution.chunk_size", 25).unwrap();
        assert_eq!(Settings::current().distribution.chunk_size, 25);

        // An override that fails validation is not installed.
        assert!(update_settings_value("core.max_chain_depth", 0).is_err());
        assert_eq!(Settings::current().core.max_chain_depth, 8);

        Settings::reset();
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(Settings::from_toml("[core]\nmax_chain_depth = 0").is_err());
        assert!(Settings::from_toml("[distribution]\nchunk_size = 0").is_err());
        Settings::reset();
    }
}

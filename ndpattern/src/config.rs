/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Configuration for pattern construction.
//!
//! Settings can be read from environment variables or YAML files, and
//! a process-wide copy lives in [`global`]. Tests that change the
//! global configuration should hold [`global::lock`] and use its
//! override guards.

use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

const BULK_MIN_SIZE_BYTES_ENV: &str = "NDPATTERN_BULK_MIN_SIZE_BYTES";
const ELEMENT_SIZE_BYTES_ENV: &str = "NDPATTERN_ELEMENT_SIZE_BYTES";

const DEFAULT_BULK_MIN_SIZE_BYTES: usize = 0;
const DEFAULT_ELEMENT_SIZE_BYTES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum size in bytes of a unit's block for bulk transfers to
    /// pay off. When non-zero, team arrangement avoids splitting data
    /// into blocks smaller than this. Zero disables the check.
    bulk_min_size_bytes: usize,
    /// Element size assumed when estimating block sizes in bytes.
    element_size_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bulk_min_size_bytes: DEFAULT_BULK_MIN_SIZE_BYTES,
            element_size_bytes: DEFAULT_ELEMENT_SIZE_BYTES,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var(BULK_MIN_SIZE_BYTES_ENV) {
            if let Ok(parsed) = val.parse::<usize>() {
                config.bulk_min_size_bytes = parsed;
            }
        }

        if let Ok(val) = env::var(ELEMENT_SIZE_BYTES_ENV) {
            if let Ok(parsed) = val.parse::<usize>() {
                config.element_size_bytes = parsed;
            }
        }

        config
    }

    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Take every setting of `other` that differs from the default.
    pub fn merge(&mut self, other: &Self) {
        if other.bulk_min_size_bytes != DEFAULT_BULK_MIN_SIZE_BYTES {
            self.bulk_min_size_bytes = other.bulk_min_size_bytes;
        }
        if other.element_size_bytes != DEFAULT_ELEMENT_SIZE_BYTES {
            self.element_size_bytes = other.element_size_bytes;
        }
    }

    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), anyhow::Error> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn bulk_min_size_bytes(&self) -> usize {
        self.bulk_min_size_bytes
    }

    pub fn element_size_bytes(&self) -> usize {
        self.element_size_bytes
    }

    pub fn set_bulk_min_size_bytes(&mut self, value: usize) {
        self.bulk_min_size_bytes = value;
    }

    pub fn set_element_size_bytes(&mut self, value: usize) {
        self.element_size_bytes = value;
    }
}

pub mod global {
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::LazyLock;
    use std::sync::RwLock;

    use super::Config;

    static CONFIG: LazyLock<Arc<RwLock<Config>>> =
        LazyLock::new(|| Arc::new(RwLock::new(Config::from_env())));

    /// Serialize access to the global configuration. Hold the returned
    /// lock for the duration of any test that overrides settings.
    pub fn lock() -> ConfigLock {
        static MUTEX: LazyLock<std::sync::Mutex<()>> = LazyLock::new(|| std::sync::Mutex::new(()));
        ConfigLock {
            _guard: MUTEX.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }

    pub fn init_from_env() {
        let config = Config::from_env();
        *CONFIG.write().unwrap() = config;
    }

    pub fn init_from_yaml<P: AsRef<Path>>(path: P) -> Result<(), anyhow::Error> {
        let config = Config::from_yaml(path)?;
        *CONFIG.write().unwrap() = config;
        Ok(())
    }

    pub fn get() -> Arc<RwLock<Config>> {
        CONFIG.clone()
    }

    /// A copy of the current global configuration.
    pub fn snapshot() -> Config {
        CONFIG.read().unwrap().clone()
    }

    pub fn bulk_min_size_bytes() -> usize {
        CONFIG.read().unwrap().bulk_min_size_bytes()
    }

    pub fn element_size_bytes() -> usize {
        CONFIG.read().unwrap().element_size_bytes()
    }

    pub fn reset_to_defaults() {
        *CONFIG.write().unwrap() = Config::default();
    }

    pub struct ConfigLock {
        _guard: std::sync::MutexGuard<'static, ()>,
    }

    impl ConfigLock {
        /// Replace the global configuration until the returned guard is
        /// dropped.
        pub fn override_with(&self, config: Config) -> ConfigGuard<'_> {
            let orig = std::mem::replace(&mut *CONFIG.write().unwrap(), config);
            ConfigGuard {
                orig: Some(orig),
                _lock: self,
            }
        }

        /// Override only the bulk transfer threshold.
        pub fn override_bulk_min_size_bytes(&self, value: usize) -> ConfigGuard<'_> {
            let mut config = snapshot();
            config.set_bulk_min_size_bytes(value);
            self.override_with(config)
        }
    }

    pub struct ConfigGuard<'a> {
        orig: Option<Config>,
        _lock: &'a ConfigLock,
    }

    impl Drop for ConfigGuard<'_> {
        fn drop(&mut self) {
            if let Some(orig) = self.orig.take() {
                *CONFIG.write().unwrap() = orig;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bulk_min_size_bytes(), 0);
        assert_eq!(config.element_size_bytes(), 8);
    }

    #[test]
    fn test_from_env() {
        let _lock = global::lock();
        // SAFETY: environment access is serialized by the config lock.
        unsafe { std::env::set_var(BULK_MIN_SIZE_BYTES_ENV, "4096") };

        let config = Config::from_env();
        assert_eq!(config.bulk_min_size_bytes(), 4096);
        assert_eq!(config.element_size_bytes(), 8);

        // SAFETY: environment access is serialized by the config lock.
        unsafe { std::env::remove_var(BULK_MIN_SIZE_BYTES_ENV) };
    }

    #[test]
    fn test_merge() {
        let mut config1 = Config::default();
        let mut config2 = Config::default();
        config2.set_element_size_bytes(4);

        config1.set_bulk_min_size_bytes(1024);
        config1.merge(&config2);

        assert_eq!(config1.bulk_min_size_bytes(), 1024);
        assert_eq!(config1.element_size_bytes(), 4);
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ndpattern.yaml");
        let mut config = Config::default();
        config.set_bulk_min_size_bytes(65536);
        config.to_yaml(&path).unwrap();
        assert_eq!(Config::from_yaml(&path).unwrap(), config);

        // Missing keys fall back to defaults.
        std::fs::write(&path, "element_size_bytes: 2\n").unwrap();
        let partial = Config::from_yaml(&path).unwrap();
        assert_eq!(partial.element_size_bytes(), 2);
        assert_eq!(partial.bulk_min_size_bytes(), 0);
    }

    #[test]
    fn test_global_overrides() {
        let config = global::lock();
        global::reset_to_defaults();

        assert_eq!(global::bulk_min_size_bytes(), 0);
        {
            let _guard = config.override_bulk_min_size_bytes(2048);
            assert_eq!(global::bulk_min_size_bytes(), 2048);
            assert_eq!(global::element_size_bytes(), 8);
        }
        assert_eq!(global::bulk_min_size_bytes(), 0);
    }
}

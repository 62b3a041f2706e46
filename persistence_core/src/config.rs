//! Configuration surface (spec.md §6.4). A single record loaded once at
//! startup and shared (cheaply cloneable) with every component.

use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

fn default_max_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub id: String,
    pub root_path: Utf8PathBuf,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_rotation_threshold_bytes() -> u64 {
    // 1 GiB: large enough that typical block-blob/message workloads never
    // rotate mid-burst, small enough that a single extent file stays
    // manageable for the reader to open and seek within.
    1024 * 1024 * 1024
}

fn default_idle_timeout() -> Duration {
    // An open extent file that has taken no appends for this long is
    // rotated out even though it never hit the size threshold, so a
    // destination doesn't keep file handles open indefinitely for a
    // slot that has gone quiet.
    Duration::from_secs(120)
}

fn default_autosave_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_gc_interval() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_gc_unmodified_window() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_list_limit() -> usize {
    5000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the extent metadata catalog's single persisted document.
    pub extent_catalog_path: Utf8PathBuf,
    /// Path to the per-account service properties document.
    pub account_db_path: Utf8PathBuf,
    pub destinations: Vec<DestinationConfig>,

    #[serde(
        default = "default_rotation_threshold_bytes",
        rename = "rotation_threshold_bytes"
    )]
    pub rotation_threshold_bytes: u64,

    #[serde(
        with = "humantime_serde",
        default = "default_idle_timeout",
        rename = "idle_timeout"
    )]
    pub idle_timeout: Duration,

    #[serde(
        with = "humantime_serde",
        default = "default_autosave_interval",
        rename = "autosave_interval"
    )]
    pub autosave_interval: Duration,

    #[serde(
        with = "humantime_serde",
        default = "default_gc_interval",
        rename = "gc_interval"
    )]
    pub gc_interval: Duration,

    #[serde(
        with = "humantime_serde",
        default = "default_gc_unmodified_window",
        rename = "gc_unmodified_window"
    )]
    pub gc_unmodified_window: Duration,

    #[serde(default = "default_list_limit")]
    pub default_list_limit: usize,
}

impl StoreConfig {
    #[cfg(any(test, feature = "testing"))]
    pub fn for_testing(root: &camino::Utf8Path) -> Self {
        Self {
            extent_catalog_path: root.join("extent_catalog.json"),
            account_db_path: root.join("accounts.json"),
            destinations: vec![DestinationConfig {
                id: "default".to_string(),
                root_path: root.join("data"),
                max_concurrency: 4,
            }],
            rotation_threshold_bytes: default_rotation_threshold_bytes(),
            idle_timeout: default_idle_timeout(),
            autosave_interval: default_autosave_interval(),
            gc_interval: default_gc_interval(),
            gc_unmodified_window: default_gc_unmodified_window(),
            default_list_limit: default_list_limit(),
        }
    }
}

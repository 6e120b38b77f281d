use std::collections::BTreeMap;

use tracing::{debug, warn};

/// Operating system and architecture of the build host, in OCI naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    pub fn host() -> Self {
        Self::new(
            oci_os(std::env::consts::OS),
            oci_arch(std::env::consts::ARCH),
        )
    }
}

fn oci_os(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn oci_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "loongarch64" => "loong64",
        other => other,
    }
}

/// Values substituted for `$NAME` references in cache-mount options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildArgs {
    values: BTreeMap<String, String>,
}

impl BuildArgs {
    /// Seeds `BUILDOS`/`BUILDARCH` from `platform`, applies `overrides`
    /// (`NAME=VALUE[,NAME=VALUE...]`, later entries win), then sets
    /// `BUILDPLATFORM` to `platform` unless an override already set it.
    /// Overriding `BUILDOS` or `BUILDARCH` does not change `BUILDPLATFORM`.
    pub fn new<S: AsRef<str>>(platform: &Platform, overrides: &[S]) -> Self {
        let mut values = BTreeMap::new();
        values.insert("BUILDOS".to_string(), platform.os.clone());
        values.insert("BUILDARCH".to_string(), platform.arch.clone());

        for batch in overrides {
            for pair in batch.as_ref().split(',') {
                let Some((name, value)) = pair.split_once('=') else {
                    debug!(pair, "ignoring build arg without '='");
                    continue;
                };
                if name.is_empty() {
                    warn!(pair, "ignoring build arg with empty name");
                    continue;
                }
                values.insert(name.to_string(), value.to_string());
            }
        }

        values
            .entry("BUILDPLATFORM".to_string())
            .or_insert_with(|| format!("{}/{}", platform.os, platform.arch));

        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Replaces every `$NAME` in `input` with its value.
    ///
    /// Longer names go first (ties by name) so `$FOOBAR` is not rewritten
    /// through a shorter `$FOO`.
    pub fn substitute(&self, input: &str) -> String {
        let mut ordered: Vec<_> = self.values.iter().collect();
        ordered.sort_by(|(left, _), (right, _)| {
            right.len().cmp(&left.len()).then_with(|| left.cmp(right))
        });

        let mut out = input.to_string();
        for (name, value) in ordered {
            out = out.replace(&format!("${name}"), value);
        }
        out
    }
}

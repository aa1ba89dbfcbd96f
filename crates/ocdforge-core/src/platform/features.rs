use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::key::{PerPlatform, TargetPlatform};

/// Explicit state of an optional native feature on one platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureState {
    Enabled,
    Disabled,
    /// The feature has no meaning on this operating system (parallel ports
    /// on macOS, sysfs GPIO outside Linux).
    NotApplicable,
}

impl FeatureState {
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureState::Enabled => "enabled",
            FeatureState::Disabled => "disabled",
            FeatureState::NotApplicable => "n/a",
        }
    }

    /// Configure switch for this state. Anything not enabled is passed as an
    /// explicit `--disable-*` so configure never probes it on its own.
    pub fn configure_switch(self, feature: &str) -> String {
        match self {
            FeatureState::Enabled => format!("--enable-{}", feature),
            FeatureState::Disabled | FeatureState::NotApplicable => {
                format!("--disable-{}", feature)
            }
        }
    }
}

impl fmt::Display for FeatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureRow {
    pub name: &'static str,
    pub states: PerPlatform<FeatureState>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedFeature {
    pub name: String,
    pub state: FeatureState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureTable {
    rows: &'static [FeatureRow],
}

impl FeatureTable {
    pub const fn new(rows: &'static [FeatureRow]) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &'static [FeatureRow] {
        self.rows
    }

    pub fn resolve(&self, platform: TargetPlatform) -> Vec<ResolvedFeature> {
        self.rows
            .iter()
            .map(|row| ResolvedFeature {
                name: row.name.to_string(),
                state: *row.states.get(platform),
            })
            .collect()
    }

    pub fn state(&self, feature: &str, platform: TargetPlatform) -> Option<FeatureState> {
        self.rows
            .iter()
            .find(|row| row.name == feature)
            .map(|row| *row.states.get(platform))
    }

    pub fn configure_args(&self, platform: TargetPlatform) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.states.get(platform).configure_switch(row.name))
            .collect()
    }

    pub fn validate(&self) -> Result<(), FeatureError> {
        let mut seen = HashSet::new();
        for row in self.rows {
            if !is_valid_feature_name(row.name) {
                return Err(FeatureError::InvalidName(row.name.to_string()));
            }
            if !seen.insert(row.name) {
                return Err(FeatureError::Duplicate(row.name.to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("feature '{0}' is listed more than once")]
    Duplicate(String),
    #[error("feature name '{0}' is not a valid configure switch")]
    InvalidName(String),
}

fn is_valid_feature_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
}

use FeatureState::{Disabled as D, Enabled as E, NotApplicable as NA};

const fn row(
    name: &'static str,
    linux: FeatureState,
    darwin: FeatureState,
    win32: FeatureState,
) -> FeatureRow {
    FeatureRow {
        name,
        states: PerPlatform::new(linux, darwin, win32),
    }
}

static OPENOCD_FEATURES: &[FeatureRow] = &[
    row("internal-jimtcl", E, E, E),
    row("internal-libjaylink", E, E, E),
    row("aice", E, E, E),
    row("armjtagew", E, E, E),
    row("at91rm9200", D, NA, NA),
    row("bcm2835gpio", D, NA, NA),
    row("buspirate", E, E, NA),
    row("cmsis-dap", E, E, E),
    row("dummy", E, E, E),
    row("ep93xx", D, NA, NA),
    row("ftdi", E, E, E),
    row("gw16012", E, NA, E),
    row("imx_gpio", D, NA, NA),
    row("jlink", E, E, E),
    row("jtag_vpi", E, E, E),
    row("kitprog", E, E, E),
    row("oocd_trace", D, D, D),
    row("opendous", E, E, E),
    row("openjtag", E, E, E),
    row("osbdm", E, E, E),
    row("parport", E, NA, E),
    row("parport-ppdev", E, NA, NA),
    row("parport-giveio", NA, NA, E),
    row("presto", E, E, E),
    row("remote-bitbang", E, E, E),
    row("rlink", E, E, E),
    row("stlink", E, E, E),
    row("sysfsgpio", E, NA, NA),
    row("ti-icdi", E, E, E),
    row("ulink", E, E, E),
    row("usb-blaster", E, E, E),
    row("usb_blaster_2", E, E, E),
    row("usbprog", E, E, E),
    row("vsllink", E, E, E),
    row("xds110", E, E, E),
    row("zy1000", D, D, D),
    row("zy1000-master", D, D, D),
    row("minidriver-dummy", D, D, D),
    row("doxygen-html", D, D, D),
    row("werror", D, D, D),
];

pub const OPENOCD_FEATURE_TABLE: FeatureTable = FeatureTable::new(OPENOCD_FEATURES);

//! Option tables, preferences and the resource database.
//!
//! An effect describes its tunables twice: an [`OptionTable`] mapping
//! command-line style switches to resource names, and a list of default
//! lines (`"*delay: 20000"`). At setup the driver merges, in order, the
//! built-in defaults, the effect's default lines and the host
//! [`Preferences`] into one [`Resources`] database. Effects read it through
//! the typed getters; nothing writes to it afterwards.

use crate::color::{self, Pixel};
use crate::errors::BridgeError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Defaults every effect starts from.
const DEFAULT_DEFAULTS: &[(&str, &str)] = &[
    ("background", "black"),
    ("foreground", "white"),
    ("doFPS", "false"),
    ("fpsTop", "false"),
    ("ignoreRotation", "false"),
    ("doubleBuffer", "false"),
    ("texFontCacheSize", "30"),
];

/// How a switch takes its value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArgKind {
    /// The switch alone sets the resource to this value (`-fps` -> `true`).
    NoArg(String),
    /// The value is the next argument (`-delay 20000`).
    SepArg,
}

/// One row of an option table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub switch: String,
    pub resource: String,
    pub kind: ArgKind,
}

impl OptionSpec {
    pub fn flag(switch: &str, resource: &str, value: &str) -> Self {
        Self { switch: switch.to_string(), resource: resource.to_string(), kind: ArgKind::NoArg(value.to_string()) }
    }

    pub fn arg(switch: &str, resource: &str) -> Self {
        Self { switch: switch.to_string(), resource: resource.to_string(), kind: ArgKind::SepArg }
    }
}

/// Ordered switch table in the classic X resource-option convention.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionTable {
    options: Vec<OptionSpec>,
}

impl OptionTable {
    pub fn new(options: Vec<OptionSpec>) -> Self {
        Self { options }
    }

    /// Switches every effect understands.
    pub fn standard() -> Self {
        Self::new(vec![
            OptionSpec::flag("-fps", "doFPS", "true"),
            OptionSpec::flag("-no-fps", "doFPS", "false"),
            OptionSpec::arg("-bg", "background"),
            OptionSpec::arg("-background", "background"),
            OptionSpec::arg("-fg", "foreground"),
            OptionSpec::arg("-foreground", "foreground"),
            OptionSpec::flag("-ignore-rotation", "ignoreRotation", "true"),
            OptionSpec::flag("-no-ignore-rotation", "ignoreRotation", "false"),
        ])
    }

    /// This table followed by the standard switches it does not already define.
    pub fn with_standard(mut self) -> Self {
        for spec in Self::standard().options {
            if self.find(&spec.switch).is_none() {
                self.options.push(spec);
            }
        }
        self
    }

    pub fn push(&mut self, spec: OptionSpec) {
        self.options.push(spec);
    }

    pub fn find(&self, switch: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.switch == switch)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionSpec> {
        self.options.iter()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Parses switches into preferences keyed by resource name.
    pub fn parse_args(&self, args: &[&str]) -> Result<Preferences, BridgeError> {
        let mut prefs = Preferences::new();
        let mut it = args.iter();
        while let Some(arg) = it.next() {
            let spec = self
                .find(arg)
                .ok_or_else(|| BridgeError::InvalidConfig(format!("unrecognised option {arg:?}")))?;
            match &spec.kind {
                ArgKind::NoArg(value) => prefs.set(&spec.resource, value.as_str()),
                ArgKind::SepArg => {
                    let value = it
                        .next()
                        .ok_or_else(|| BridgeError::InvalidConfig(format!("option {arg} needs a value")))?;
                    prefs.set(&spec.resource, *value);
                }
            }
        }
        Ok(prefs)
    }
}

/// A single preference value as stored by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for PrefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefValue::Bool(b) => write!(f, "{b}"),
            PrefValue::Int(i) => write!(f, "{i}"),
            PrefValue::Float(x) => write!(f, "{x}"),
            PrefValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for PrefValue {
    fn from(b: bool) -> Self {
        PrefValue::Bool(b)
    }
}

impl From<i64> for PrefValue {
    fn from(i: i64) -> Self {
        PrefValue::Int(i)
    }
}

impl From<f64> for PrefValue {
    fn from(x: f64) -> Self {
        PrefValue::Float(x)
    }
}

impl From<&str> for PrefValue {
    fn from(s: &str) -> Self {
        PrefValue::String(s.to_string())
    }
}

impl From<String> for PrefValue {
    fn from(s: String) -> Self {
        PrefValue::String(s)
    }
}

/// Host preferences. Keys are either plain resource names or namespaced
/// as `<effect>_<resource>`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences {
    values: BTreeMap<String, PrefValue>,
}

impl Preferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<PrefValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PrefValue> {
        self.values.get(key)
    }

    /// Copies every entry of `other` over this one.
    pub fn merge(&mut self, other: Preferences) {
        self.values.extend(other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(json).map_err(|e| BridgeError::InvalidConfig(format!("preferences: {e}")))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Splits a default line such as `"*delay:  20000"` into key and value.
fn parse_default_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start_matches(['.', '*', ' ', '\t']);
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

/// The merged resource database for one effect instance.
#[derive(Clone, Debug)]
pub struct Resources {
    progname: String,
    values: BTreeMap<String, String>,
}

impl Resources {
    /// Merges built-in defaults, the effect's default lines and `prefs`, later sources winning.
    pub fn load(progname: &str, defaults: &[String], prefs: &Preferences) -> Self {
        let mut values = BTreeMap::new();
        for (key, value) in DEFAULT_DEFAULTS {
            values.insert((*key).to_string(), (*value).to_string());
        }
        for line in defaults {
            match parse_default_line(line) {
                Some((key, value)) => {
                    values.insert(key.to_string(), value.to_string());
                }
                None => warn!("{progname}: ignoring malformed default {line:?}"),
            }
        }

        let prefix = format!("{progname}_");
        // Plain keys first so a namespaced key always wins.
        for (key, value) in prefs.values.iter().filter(|(k, _)| !k.starts_with(&prefix)) {
            values.insert(key.clone(), value.to_string());
        }
        for (key, value) in prefs.values.iter() {
            if let Some(name) = key.strip_prefix(&prefix) {
                values.insert(name.to_string(), value.to_string());
            }
        }

        Self { progname: progname.to_string(), values }
    }

    pub fn progname(&self) -> &str {
        &self.progname
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// `true`, `yes`, `on` and `1` are true; anything else is false.
    pub fn get_boolean(&self, name: &str) -> bool {
        let Some(value) = self.get_string(name) else {
            return false;
        };
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => true,
            "false" | "no" | "off" | "0" | "" => false,
            other => {
                warn!("{}: {name} must be boolean, not {other:?}", self.progname);
                false
            }
        }
    }

    /// Missing or malformed values read as 0.
    pub fn get_integer(&self, name: &str) -> i64 {
        let Some(value) = self.get_string(name) else {
            return 0;
        };
        let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16).ok(),
            None => value.parse::<i64>().ok(),
        };
        parsed.unwrap_or_else(|| {
            warn!("{}: {name} must be an integer, not {value:?}", self.progname);
            0
        })
    }

    /// Missing or malformed values read as 0.0.
    pub fn get_float(&self, name: &str) -> f64 {
        let Some(value) = self.get_string(name) else {
            return 0.0;
        };
        value.parse::<f64>().unwrap_or_else(|_| {
            warn!("{}: {name} must be a number, not {value:?}", self.progname);
            0.0
        })
    }

    /// A colour resource as a pixel. Unparseable colours fall back to black.
    pub fn get_pixel(&self, name: &str) -> Pixel {
        let value = self.get_string(name).unwrap_or("black");
        match color::parse_color(value) {
            Some(c) => color::alloc_color(c),
            None => {
                warn!("{}: can't parse colour {name}: {value:?}", self.progname);
                color::BLACK_PIXEL
            }
        }
    }
}

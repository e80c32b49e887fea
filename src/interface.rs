//! Network interface selection for throughput metrics
//!
//! Sample logs list every interface on the host. Exactly one of them carries
//! the benchmark traffic, and which one depends on how the host was
//! provisioned, so the selection rule is configuration rather than code.

use crate::event::InterfaceCounters;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How to pick the measured interface out of a `NETWORK` sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InterfaceRule {
    /// The listing must hold exactly two interfaces and the second one's
    /// name must start with `prefix` (loopback first, wired second).
    SecondOfTwo { prefix: String },
    /// Exactly one interface with this name.
    Named(String),
    /// Exactly one interface whose name starts with this prefix.
    Prefix(String),
}

impl Default for InterfaceRule {
    fn default() -> Self {
        InterfaceRule::SecondOfTwo {
            prefix: "eth".to_string(),
        }
    }
}

impl InterfaceRule {
    /// Select the measured interface, or describe why the listing does not
    /// have the expected shape.
    pub fn select<'a>(
        &self,
        interfaces: &'a [InterfaceCounters],
    ) -> Result<&'a InterfaceCounters, String> {
        match self {
            InterfaceRule::SecondOfTwo { prefix } => match interfaces {
                [_, second] if second.name.starts_with(prefix.as_str()) => Ok(second),
                _ => Err(format!(
                    "expected exactly two interfaces with the second starting with {:?}, got [{}]",
                    prefix,
                    names(interfaces)
                )),
            },
            InterfaceRule::Named(name) => single(interfaces, |i| i.name == *name)
                .ok_or_else(|| {
                    format!(
                        "expected exactly one interface named {:?}, got [{}]",
                        name,
                        names(interfaces)
                    )
                }),
            InterfaceRule::Prefix(prefix) => {
                single(interfaces, |i| i.name.starts_with(prefix.as_str())).ok_or_else(|| {
                    format!(
                        "expected exactly one interface starting with {:?}, got [{}]",
                        prefix,
                        names(interfaces)
                    )
                })
            }
        }
    }
}

fn single<'a>(
    interfaces: &'a [InterfaceCounters],
    pred: impl Fn(&InterfaceCounters) -> bool,
) -> Option<&'a InterfaceCounters> {
    let mut matches = interfaces.iter().filter(|i| pred(i));
    match (matches.next(), matches.next()) {
        (Some(found), None) => Some(found),
        _ => None,
    }
}

fn names(interfaces: &[InterfaceCounters]) -> String {
    interfaces
        .iter()
        .map(|i| i.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for InterfaceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceRule::SecondOfTwo { prefix } => write!(f, "second-of-two:{}", prefix),
            InterfaceRule::Named(name) => write!(f, "name:{}", name),
            InterfaceRule::Prefix(prefix) => write!(f, "prefix:{}", prefix),
        }
    }
}

impl FromStr for InterfaceRule {
    type Err = String;

    /// Parse `second-of-two:<prefix>`, `name:<iface>` or `prefix:<p>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid interface rule {:?} (expected KIND:VALUE)", s))?;
        if value.is_empty() {
            return Err(format!("interface rule {:?} has an empty value", s));
        }
        match kind {
            "second-of-two" => Ok(InterfaceRule::SecondOfTwo {
                prefix: value.to_string(),
            }),
            "name" => Ok(InterfaceRule::Named(value.to_string())),
            "prefix" => Ok(InterfaceRule::Prefix(value.to_string())),
            other => Err(format!(
                "unknown interface rule kind {:?} (expected second-of-two, name or prefix)",
                other
            )),
        }
    }
}

impl TryFrom<String> for InterfaceRule {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InterfaceRule> for String {
    fn from(rule: InterfaceRule) -> Self {
        rule.to_string()
    }
}

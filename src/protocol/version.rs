//! API version and handshake compatibility

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content key carrying the client's API version in a handshake
pub const API_HEADER_NAME: &str = "TfApiVersion";

/// Version of the wire protocol this service speaks
pub const API_VERSION: ApiVersion = ApiVersion::new(1, 2, 0);

/// Version of this service build
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ApiVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Accepts `major.minor`, `major.minor.patch` and a trailing fourth
/// component, which is ignored
impl FromStr for ApiVersion {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || crate::Error::Protocol(format!("invalid API version \"{}\"", s));

        let parts = s
            .trim()
            .split('.')
            .map(|part| part.parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        match parts.as_slice() {
            [major, minor] => Ok(Self::new(*major, *minor, 0)),
            [major, minor, patch] | [major, minor, patch, _] => Ok(Self::new(*major, *minor, *patch)),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for ApiVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ApiVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Compatibility {
    Compatible,
    ClientOutdated,
    ServiceOutdated,
}

impl Compatibility {
    /// Major and minor must match exactly. Within a minor version the
    /// service serves any client patch up to its own.
    pub fn check(client: ApiVersion, service: ApiVersion) -> Self {
        use std::cmp::Ordering::*;

        match (client.major.cmp(&service.major), client.minor.cmp(&service.minor)) {
            (Less, _) => Compatibility::ClientOutdated,
            (Greater, _) => Compatibility::ServiceOutdated,
            (Equal, Less) => Compatibility::ClientOutdated,
            (Equal, Greater) => Compatibility::ServiceOutdated,
            (Equal, Equal) if client.patch > service.patch => Compatibility::ServiceOutdated,
            (Equal, Equal) => Compatibility::Compatible,
        }
    }

    pub fn is_compatible(&self) -> bool {
        *self == Compatibility::Compatible
    }

    /// Handshake response text for this outcome
    pub fn message(&self) -> &'static str {
        match self {
            Compatibility::Compatible => "Handshake Successful.",
            Compatibility::ClientOutdated => "Handshake Failed: Client is outdated relative to Service.",
            Compatibility::ServiceOutdated => "Handshake Failed: Service is outdated relative to Client.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> ApiVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!(v("1.2.0"), ApiVersion::new(1, 2, 0));
        assert_eq!(v("1.2"), ApiVersion::new(1, 2, 0));
        assert_eq!(v(" 3.4.5.6 "), ApiVersion::new(3, 4, 5));
        assert!("1".parse::<ApiVersion>().is_err());
        assert!("one.two".parse::<ApiVersion>().is_err());
        assert!("".parse::<ApiVersion>().is_err());
    }

    #[test]
    fn test_compatibility_table() {
        let service = v("1.2.0");
        assert_eq!(Compatibility::check(v("1.1.0"), service), Compatibility::ClientOutdated);
        assert_eq!(Compatibility::check(v("1.3.0"), service), Compatibility::ServiceOutdated);
        assert_eq!(Compatibility::check(v("1.2.0"), service), Compatibility::Compatible);
        assert_eq!(Compatibility::check(v("1.2.5"), service), Compatibility::ServiceOutdated);
        assert_eq!(Compatibility::check(v("0.9.9"), service), Compatibility::ClientOutdated);
        assert_eq!(Compatibility::check(v("2.0.0"), service), Compatibility::ServiceOutdated);
    }

    #[test]
    fn test_lower_client_patch_is_compatible() {
        assert!(Compatibility::check(v("1.2.0"), v("1.2.3")).is_compatible());
    }

    #[test]
    fn test_serde_as_string() {
        assert_eq!(serde_json::to_string(&API_VERSION).unwrap(), "\"1.2.0\"");
    }
}

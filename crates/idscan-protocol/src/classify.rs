//! Device classification
//!
//! Maps a decoded identification response onto a registered device kind.
//! The kind set is open: callers can register kinds beyond the defaults.

use std::fmt;

use tracing::debug;

use crate::error::ClassifyError;
use crate::ident::IdentificationResponse;

/// Kinds known out of the box
pub const DEFAULT_KINDS: [&str; 3] = ["I2C", "PWM", "ADC"];

/// A registered device kind (e.g. `I2C`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DeviceKind(String);

impl DeviceKind {
    /// Create a kind from its wire token
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Wire token for this kind
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceKind {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Result of classifying a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Registered kind
    pub kind: DeviceKind,
    /// Instance index reported by the device
    pub index: u32,
}

/// Classifier over a registered kind set
#[derive(Debug, Clone)]
pub struct DeviceClassifier {
    kinds: Vec<DeviceKind>,
}

impl DeviceClassifier {
    /// Create a classifier with the default kinds
    pub fn new() -> Self {
        Self::with_kinds(DEFAULT_KINDS)
    }

    /// Create a classifier with an explicit kind set, in display order
    pub fn with_kinds<I, K>(kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<DeviceKind>,
    {
        let mut classifier = Self { kinds: Vec::new() };
        for kind in kinds {
            classifier.register(kind);
        }
        classifier
    }

    /// Register an additional kind
    ///
    /// Returns `false` if the kind was already registered.
    pub fn register(&mut self, kind: impl Into<DeviceKind>) -> bool {
        let kind = kind.into();
        if self.kinds.contains(&kind) {
            return false;
        }
        self.kinds.push(kind);
        true
    }

    /// Registered kinds in registration order
    pub fn kinds(&self) -> &[DeviceKind] {
        &self.kinds
    }

    /// Look up a registered kind by wire token
    pub fn lookup(&self, token: &str) -> Option<&DeviceKind> {
        self.kinds.iter().find(|k| k.as_str() == token)
    }

    /// Classify a decoded response
    ///
    /// Kind matching is exact and case-sensitive. Unknown kinds are an error,
    /// never silently dropped.
    pub fn classify(
        &self,
        response: &IdentificationResponse,
    ) -> Result<Classification, ClassifyError> {
        match self.lookup(&response.kind) {
            Some(kind) => Ok(Classification {
                kind: kind.clone(),
                index: response.index,
            }),
            None => {
                debug!("Unrecognized device kind {:?}", response.kind);
                Err(ClassifyError::UnknownKind(response.kind.clone()))
            }
        }
    }
}

impl Default for DeviceClassifier {
    fn default() -> Self {
        Self::new()
    }
}

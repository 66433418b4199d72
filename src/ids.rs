//! Identifiers exchanged with the back end.
//!
//! Image ids are URIs of the form `<scheme>:<locator>`, the scheme selecting
//! the image loader (`dicomfile:/data/ct/0001.dcm`,
//! `wadouri:https://host/image-000001.dcm`). Volume ids follow the same shape
//! with the volume loader scheme and a volume name.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ViewerError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId {
    scheme: String,
    locator: String,
}

impl ImageId {
    pub fn new(scheme: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            locator: locator.into(),
        }
    }

    /// Image id for a DICOM file on the local file system.
    pub fn from_path(scheme: &str, path: &Path) -> Self {
        Self::new(scheme, path.to_string_lossy())
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.locator)
    }
}

impl FromStr for ImageId {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, locator) = split_scheme(s)?;
        Ok(Self::new(scheme, locator))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeId {
    scheme: String,
    name: String,
}

impl VolumeId {
    pub fn new(scheme: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            name: name.into(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.name)
    }
}

impl FromStr for VolumeId {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, name) = split_scheme(s)?;
        Ok(Self::new(scheme, name))
    }
}

fn split_scheme(s: &str) -> Result<(&str, &str), ViewerError> {
    match s.split_once(':') {
        Some((scheme, rest)) if !scheme.is_empty() && !rest.is_empty() => Ok((scheme, rest)),
        _ => Err(ViewerError::InvalidId(s.to_owned())),
    }
}

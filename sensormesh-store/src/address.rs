//! Store addresses: `/sensormesh/<id>/<name>`.
//!
//! The id is derived from the name alone, so every peer that opens the same
//! name lands on the same address and the same backing file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::error::StoreError;

const PREFIX: &str = "/sensormesh/";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreAddress {
    id: String,
    name: String,
}

impl StoreAddress {
    /// Address of the store called `name`.
    pub fn for_name(name: &str) -> Result<Self, StoreError> {
        validate_name(name)?;
        Ok(Self {
            id: derive_id(name),
            name: name.to_string(),
        })
    }

    /// True when `input` looks like an address rather than a bare name.
    pub fn is_address(input: &str) -> bool {
        input.starts_with('/')
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<root>/<id>/<name>.jsonl`
    pub fn file_path(&self, root: &Path) -> PathBuf {
        root.join(&self.id).join(format!("{}.jsonl", self.name))
    }
}

impl FromStr for StoreAddress {
    type Err = StoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| StoreError::InvalidAddress {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let rest = input
            .strip_prefix(PREFIX)
            .ok_or_else(|| invalid("expected /sensormesh/<id>/<name>"))?;
        let (id, name) = rest
            .split_once('/')
            .ok_or_else(|| invalid("expected /sensormesh/<id>/<name>"))?;
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("id must be hexadecimal"));
        }
        validate_name(name).map_err(|_| invalid("name must be non-empty without '/'"))?;
        if derive_id(name) != id.to_ascii_lowercase() {
            return Err(invalid("id does not match store name"));
        }

        Ok(Self {
            id: id.to_ascii_lowercase(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for StoreAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}/{}", self.id, self.name)
    }
}

fn derive_id(name: &str) -> String {
    let digest = Sha256::digest(format!("sensormesh/log/{name}").as_bytes());
    hex::encode(digest)[..32].to_string()
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name == "."
        || name == ".."
        || name.chars().any(char::is_control)
    {
        return Err(StoreError::InvalidAddress {
            input: name.to_string(),
            reason: "store names must be non-empty path-safe strings".to_string(),
        });
    }
    Ok(())
}

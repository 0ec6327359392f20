//an address is `base[:s1:s2:...]`, its level is the number of segments and level 1 is the root
//the parent drops the second segment: base:3:2:1 -> base:2:1 -> base:1 -> base -> (none)

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("malformed request path: {0}")]
    InvalidPath(String),
}

//dot free, colon delimited, no empty segments
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShardAddress(String);

impl ShardAddress {
    pub fn new(address: impl Into<String>) -> Result<Self, AddressError> {
        let address = address.into();
        let malformed = address.contains('.')
            || address.contains('/')
            || address.split(':').any(str::is_empty);
        if malformed {
            return Err(AddressError::InvalidPath(address));
        }
        Ok(ShardAddress(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }

    pub fn level(&self) -> usize {
        self.0.split(':').count()
    }

    pub fn is_root(&self) -> bool {
        self.level() == 1
    }

    //None for a root
    pub fn parent(&self) -> Option<ShardAddress> {
        let parent = parent_of(&self.0);
        if parent.is_empty() {
            None
        } else {
            Some(ShardAddress(parent))
        }
    }
}

impl fmt::Display for ShardAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ShardAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ShardAddress::new(value)
    }
}

impl From<ShardAddress> for String {
    fn from(address: ShardAddress) -> Self {
        address.0
    }
}

//empty string when `address` is a root
pub fn parent_of(address: &str) -> String {
    let parts: Vec<&str> = address.split(':').collect();
    match parts.len() {
        n if n > 2 => format!("{}:{}", parts[0], parts[2..].join(":")),
        2 => parts[0].to_string(),
        _ => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathDetails {
    pub id: String,
    pub address: ShardAddress,
    //empty for the root
    pub parent_address: String,
    //empty when the request targets the whole shard
    pub key: String,
    pub level: usize,
}

//  /<address>[/<key>]
pub fn parse_shard_path(path: &str) -> Result<PathDetails, AddressError> {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() < 2 || parts[1].is_empty() {
        return Err(AddressError::InvalidPath(path.to_string()));
    }

    let address = ShardAddress::new(parts[1])
        .map_err(|_| AddressError::InvalidPath(path.to_string()))?;
    let key = parts.get(2).copied().unwrap_or_default().to_string();

    Ok(PathDetails {
        id: address.base().to_string(),
        parent_address: parent_of(address.as_str()),
        level: address.level(),
        address,
        key,
    })
}

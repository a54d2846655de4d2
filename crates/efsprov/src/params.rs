//! Validation of loosely-typed request parameters.
//!
//! Everything here runs before any remote call so a bad request fails fast
//! with [`ProvError::InvalidArgument`].

use std::collections::HashMap;

use efsprov_common::{ProvError, ProvResult};

use crate::identity::{DEFAULT_GID_MAX, DEFAULT_GID_MIN, GidAllocator, IdentityLease};
use crate::types::{BASE_PATH, DIRECTORY_PERMS, FS_ID, GID, GID_MAX, GID_MIN, UID};

/// Permission bits used when `directoryPerms` is absent or malformed.
pub const DEFAULT_DIRECTORY_MODE: u32 = 0o755;

/// The `fileSystemId` parameter, which must be present and not blank.
///
/// # Errors
///
/// Returns [`ProvError::InvalidArgument`] when missing or blank.
pub fn file_system_id(params: &HashMap<String, String>) -> ProvResult<String> {
    match params.get(FS_ID) {
        Some(value) if value.trim().is_empty() => Err(ProvError::invalid_argument(format!(
            "Parameter {FS_ID} cannot be empty"
        ))),
        Some(value) => Ok(value.clone()),
        None => Err(ProvError::invalid_argument(format!(
            "Missing {FS_ID} parameter"
        ))),
    }
}

/// The `basePath` parameter, empty meaning the file system root.
#[must_use]
pub fn base_path(params: &HashMap<String, String>) -> &str {
    params.get(BASE_PATH).map_or("", String::as_str)
}

/// Permission bits parsed from the octal `directoryPerms` parameter.
///
/// Malformed values fall back to [`DEFAULT_DIRECTORY_MODE`].
#[must_use]
pub fn directory_mode(params: &HashMap<String, String>) -> u32 {
    params
        .get(DIRECTORY_PERMS)
        .and_then(|value| u32::from_str_radix(value, 8).ok())
        .unwrap_or(DEFAULT_DIRECTORY_MODE)
}

/// Owner identity requested for a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityParams {
    /// Explicit uid, if supplied.
    pub uid: Option<u32>,
    /// Explicit gid, if supplied.
    pub gid: Option<u32>,
    /// Lower bound of the allocatable range.
    pub gid_min: u32,
    /// Upper bound of the allocatable range.
    pub gid_max: u32,
}

impl IdentityParams {
    /// Validate `uid`, `gid`, `gidRangeStart` and `gidRangeEnd`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvError::InvalidArgument`] for unparsable or negative ids,
    /// a non-positive range start, a range bound supplied without the other,
    /// or a range end not above the start.
    pub fn from_parameters(params: &HashMap<String, String>) -> ProvResult<Self> {
        let uid = parse_id(params, UID)?;
        let gid = parse_id(params, GID)?;

        let gid_min = match params.get(GID_MIN) {
            Some(value) => {
                let min = parse_int(GID_MIN, value)?;
                if min <= 0 {
                    return Err(ProvError::invalid_argument(format!(
                        "{GID_MIN} must be greater than 0"
                    )));
                }
                Some(to_u32(GID_MIN, min)?)
            }
            None => None,
        };

        let gid_max = match (params.get(GID_MAX), gid_min) {
            (Some(_), None) => {
                return Err(ProvError::invalid_argument(format!(
                    "Missing {GID_MIN} parameter"
                )));
            }
            (Some(value), Some(min)) => {
                let max = parse_int(GID_MAX, value)?;
                if max <= i64::from(min) {
                    return Err(ProvError::invalid_argument(format!(
                        "{GID_MAX} must be greater than {GID_MIN}"
                    )));
                }
                Some(to_u32(GID_MAX, max)?)
            }
            (None, Some(_)) => {
                return Err(ProvError::invalid_argument(format!(
                    "Missing {GID_MAX} parameter"
                )));
            }
            (None, None) => None,
        };

        Ok(Self {
            uid,
            gid,
            gid_min: gid_min.unwrap_or(DEFAULT_GID_MIN),
            gid_max: gid_max.unwrap_or(DEFAULT_GID_MAX),
        })
    }

    /// Whether an identity must be drawn from the allocator.
    #[must_use]
    pub const fn needs_allocation(&self) -> bool {
        self.uid.is_none() || self.gid.is_none()
    }

    /// Fill missing ids from the allocator.
    ///
    /// One integer is drawn when either id is missing and used for every
    /// missing id.
    ///
    /// # Errors
    ///
    /// Returns [`ProvError::RangeExhausted`] when the range is full.
    pub fn resolve<'a>(
        &self,
        allocator: &'a GidAllocator,
        file_system_id: &str,
    ) -> ProvResult<ResolvedIdentity<'a>> {
        let lease = if self.needs_allocation() {
            Some(allocator.lease(file_system_id, self.gid_min, self.gid_max)?)
        } else {
            None
        };
        let allocated = lease.as_ref().map(IdentityLease::id);

        Ok(ResolvedIdentity {
            uid: self.uid.or(allocated).unwrap_or_default(),
            gid: self.gid.or(allocated).unwrap_or_default(),
            lease,
        })
    }
}

/// Concrete owner ids for one provision call.
///
/// Holds the allocator lease, if any; dropping without [`commit`] returns
/// the allocated id.
///
/// [`commit`]: ResolvedIdentity::commit
#[derive(Debug)]
pub struct ResolvedIdentity<'a> {
    /// Owner uid.
    pub uid: u32,
    /// Owner gid.
    pub gid: u32,
    lease: Option<IdentityLease<'a>>,
}

impl ResolvedIdentity<'_> {
    /// The allocated id, if one was drawn.
    #[must_use]
    pub fn allocated(&self) -> Option<u32> {
        self.lease.as_ref().map(IdentityLease::id)
    }

    /// Keep the allocated id, if any.
    pub fn commit(self) {
        if let Some(lease) = self.lease {
            lease.keep();
        }
    }
}

fn parse_int(key: &str, value: &str) -> ProvResult<i64> {
    value.trim().parse::<i64>().map_err(|e| {
        ProvError::invalid_argument(format!("Failed to parse invalid {key}: {e}"))
    })
}

fn to_u32(key: &str, value: i64) -> ProvResult<u32> {
    u32::try_from(value).map_err(|_| {
        ProvError::invalid_argument(format!("{key} must not exceed {}", u32::MAX))
    })
}

fn parse_id(params: &HashMap<String, String>, key: &str) -> ProvResult<Option<u32>> {
    let Some(value) = params.get(key) else {
        return Ok(None);
    };
    let id = parse_int(key, value)?;
    if id < 0 {
        return Err(ProvError::invalid_argument(format!(
            "{key} must be greater or equal than 0"
        )));
    }
    to_u32(key, id).map(Some)
}

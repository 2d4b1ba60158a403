//! One-shot privilege reduction, run after the listening socket is bound.

use nix::unistd::{self, Gid, Group, Uid, User};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error("unknown group '{0}'")]
    UnknownGroup(String),
    #[error("unknown user '{0}'")]
    UnknownUser(String),
    #[error("cannot look up '{name}': {source}")]
    Lookup {
        name: String,
        #[source]
        source: nix::Error,
    },
    #[error("cannot switch to group {gid}: {source}")]
    SetGroup {
        gid: Gid,
        #[source]
        source: nix::Error,
    },
    #[error("cannot switch to user {uid}: {source}")]
    SetUser {
        uid: Uid,
        #[source]
        source: nix::Error,
    },
}

/// Effective identity of the running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: Uid,
    pub gid: Gid,
    pub user_name: Option<String>,
    pub group_name: Option<String>,
}

impl Identity {
    /// True when either the effective user or group is the superuser's.
    pub fn is_privileged(&self) -> bool {
        self.uid.is_root() || self.gid.as_raw() == 0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user {} ({}), group {} ({})",
            self.user_name.as_deref().unwrap_or("?"),
            self.uid,
            self.group_name.as_deref().unwrap_or("?"),
            self.gid
        )
    }
}

pub fn current_identity() -> Identity {
    let uid = unistd::geteuid();
    let gid = unistd::getegid();
    Identity {
        uid,
        gid,
        user_name: User::from_uid(uid).ok().flatten().map(|u| u.name),
        group_name: Group::from_gid(gid).ok().flatten().map(|g| g.name),
    }
}

/// Switch to the configured group, then the configured user, and report the
/// identity the process ends up with. Either step failing aborts the drop.
pub fn drop_privileges(
    user: Option<&str>,
    group: Option<&str>,
) -> Result<Identity, PrivilegeError> {
    if let Some(name) = group {
        let gid = resolve_group(name)?;
        reset_supplementary_groups(gid);
        unistd::setgid(gid).map_err(|source| PrivilegeError::SetGroup { gid, source })?;
        log::info!("Switched group to {name} ({gid})");
    }

    if let Some(name) = user {
        let uid = resolve_user(name)?;
        unistd::setuid(uid).map_err(|source| PrivilegeError::SetUser { uid, source })?;
        log::info!("Switched user to {name} ({uid})");
    }

    Ok(current_identity())
}

#[cfg(any(target_os = "linux", target_os = "freebsd", target_os = "netbsd", target_os = "openbsd"))]
fn reset_supplementary_groups(gid: Gid) {
    // Only root may do this; the setgid that follows is what decides success.
    if let Err(e) = unistd::setgroups(&[gid]) {
        log::debug!("Could not reset supplementary groups: {e}");
    }
}

#[cfg(not(any(target_os = "linux", target_os = "freebsd", target_os = "netbsd", target_os = "openbsd")))]
fn reset_supplementary_groups(_gid: Gid) {}

/// Resolve a group name, accepting a numeric gid when no such name exists.
pub fn resolve_group(name: &str) -> Result<Gid, PrivilegeError> {
    match Group::from_name(name) {
        Ok(Some(group)) => Ok(group.gid),
        Ok(None) => name
            .parse::<u32>()
            .map(Gid::from_raw)
            .map_err(|_| PrivilegeError::UnknownGroup(name.to_string())),
        Err(source) => Err(PrivilegeError::Lookup {
            name: name.to_string(),
            source,
        }),
    }
}

/// Resolve a user name, accepting a numeric uid when no such name exists.
pub fn resolve_user(name: &str) -> Result<Uid, PrivilegeError> {
    match User::from_name(name) {
        Ok(Some(user)) => Ok(user.uid),
        Ok(None) => name
            .parse::<u32>()
            .map(Uid::from_raw)
            .map_err(|_| PrivilegeError::UnknownUser(name.to_string())),
        Err(source) => Err(PrivilegeError::Lookup {
            name: name.to_string(),
            source,
        }),
    }
}

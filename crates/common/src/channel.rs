// Channel naming for the realtime broadcast layer.
//
// A channel is a logical broadcast scope keyed by resource kind and id:
// `workspace:<uuid>` carries workspace- and page-tree-level events,
// `page:<uuid>` carries block- and comment-level events within one page,
// `user:<uuid>:notifications` carries direct notifications for one user.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A typed channel name. The wire format is the string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelName {
    Workspace(Uuid),
    Page(Uuid),
    UserNotifications(Uuid),
}

impl ChannelName {
    pub fn workspace(id: Uuid) -> Self {
        Self::Workspace(id)
    }

    pub fn page(id: Uuid) -> Self {
        Self::Page(id)
    }

    pub fn user_notifications(id: Uuid) -> Self {
        Self::UserNotifications(id)
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workspace(id) => write!(f, "workspace:{id}"),
            Self::Page(id) => write!(f, "page:{id}"),
            Self::UserNotifications(id) => write!(f, "user:{id}:notifications"),
        }
    }
}

/// Error returned when a channel string does not match any known scheme.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid channel name `{0}`")]
pub struct InvalidChannelName(pub String);

impl FromStr for ChannelName {
    type Err = InvalidChannelName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidChannelName(s.to_string());

        let mut parts = s.split(':');
        let kind = parts.next().ok_or_else(invalid)?;
        let id = parts.next().and_then(|raw| Uuid::parse_str(raw).ok()).ok_or_else(invalid)?;

        match (kind, parts.next(), parts.next()) {
            ("workspace", None, _) => Ok(Self::Workspace(id)),
            ("page", None, _) => Ok(Self::Page(id)),
            ("user", Some("notifications"), None) => Ok(Self::UserNotifications(id)),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for ChannelName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChannelName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

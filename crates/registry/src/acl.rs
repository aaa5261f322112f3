// Channel access control and token verification.
//
// Channel rules: `workspace:<id>` and `page:<id>` require an active
// membership in the owning workspace; `user:<id>:notifications` is
// private to that user. A denied subscribe is answered with an error
// frame, never a disconnect.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use cahier_common::channel::ChannelName;

/// Maps bearer tokens to users. In-memory for now; a production deploy
/// would swap in verification against the auth service here.
#[derive(Debug, Clone, Default)]
pub enum TokenStore {
    #[default]
    Deny,
    Memory(Arc<RwLock<HashMap<String, Uuid>>>),
}

impl TokenStore {
    pub fn in_memory() -> Self {
        Self::Memory(Arc::new(RwLock::new(HashMap::new())))
    }

    pub async fn verify(&self, token: &str) -> Option<Uuid> {
        match self {
            Self::Deny => None,
            Self::Memory(tokens) => tokens.read().await.get(token).copied(),
        }
    }

    pub async fn issue(&self, token: impl Into<String>, user_id: Uuid) {
        if let Self::Memory(tokens) = self {
            tokens.write().await.insert(token.into(), user_id);
        }
    }
}

/// Workspace membership lookup backing channel authorization.
#[derive(Debug, Clone, Default)]
pub enum ChannelAcl {
    /// Deny everything; placeholder until a directory is attached.
    #[default]
    Deny,
    Memory(Arc<RwLock<MembershipDirectory>>),
}

#[derive(Debug, Default)]
pub struct MembershipDirectory {
    /// workspace -> members
    members: HashMap<Uuid, HashSet<Uuid>>,
    /// page -> owning workspace
    page_workspaces: HashMap<Uuid, Uuid>,
}

impl ChannelAcl {
    pub fn in_memory() -> Self {
        Self::Memory(Arc::new(RwLock::new(MembershipDirectory::default())))
    }

    pub async fn add_member(&self, workspace_id: Uuid, user_id: Uuid) {
        if let Self::Memory(directory) = self {
            directory.write().await.members.entry(workspace_id).or_default().insert(user_id);
        }
    }

    pub async fn add_page(&self, page_id: Uuid, workspace_id: Uuid) {
        if let Self::Memory(directory) = self {
            directory.write().await.page_workspaces.insert(page_id, workspace_id);
        }
    }

    /// Whether `user_id` may subscribe to or publish on `channel`.
    pub async fn allows(&self, user_id: Uuid, channel: ChannelName) -> bool {
        match self {
            Self::Deny => false,
            Self::Memory(directory) => {
                let directory = directory.read().await;
                match channel {
                    ChannelName::Workspace(workspace_id) => {
                        directory.is_member(workspace_id, user_id)
                    }
                    ChannelName::Page(page_id) => directory
                        .page_workspaces
                        .get(&page_id)
                        .is_some_and(|workspace_id| directory.is_member(*workspace_id, user_id)),
                    ChannelName::UserNotifications(owner_id) => owner_id == user_id,
                }
            }
        }
    }
}

impl MembershipDirectory {
    fn is_member(&self, workspace_id: Uuid, user_id: Uuid) -> bool {
        self.members.get(&workspace_id).is_some_and(|members| members.contains(&user_id))
    }
}

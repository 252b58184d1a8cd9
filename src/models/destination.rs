use serde::{Deserialize, Serialize};
use std::fmt;

/// A configured delivery target for price-drop notifications.
///
/// Threaded destinations scope delivery to a sub-conversation inside a chat;
/// flat destinations deliver to the chat root. Modelled as a tagged union so
/// a threaded destination can never carry a missing thread id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotificationDestination {
    Flat { chat_id: i64 },
    Threaded { chat_id: i64, thread_id: i64 },
}

impl NotificationDestination {
    pub fn chat_id(&self) -> i64 {
        match self {
            Self::Flat { chat_id } | Self::Threaded { chat_id, .. } => *chat_id,
        }
    }

    pub fn thread_id(&self) -> Option<i64> {
        match self {
            Self::Flat { .. } => None,
            Self::Threaded { thread_id, .. } => Some(*thread_id),
        }
    }

    pub fn is_threaded(&self) -> bool {
        matches!(self, Self::Threaded { .. })
    }
}

impl fmt::Display for NotificationDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat { chat_id } => write!(f, "chat {chat_id}"),
            Self::Threaded { chat_id, thread_id } => {
                write!(f, "chat {chat_id} thread {thread_id}")
            }
        }
    }
}

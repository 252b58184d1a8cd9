use async_trait::async_trait;

use crate::models::NotificationDestination;
use crate::Result;

/// Notification transport collaborator. The core never sees the wire
/// protocol; it hands over a destination and rendered text.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, destination: &NotificationDestination, text: &str) -> Result<()>;
}

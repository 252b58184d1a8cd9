use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info};

use crate::models::{NotificationDestination, PriceChangeEvent, TrackedProduct};
use crate::notify::message;
use crate::notify::transport::NotificationTransport;

#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub destination: NotificationDestination,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }
}

/// Delivers one event to every destination. A failing destination is
/// recorded and skipped over, never short-circuiting the rest. Destinations
/// are independent, so deliveries run concurrently; the report keeps the
/// input order.
pub struct NotificationFanout {
    transport: Arc<dyn NotificationTransport>,
}

impl NotificationFanout {
    pub fn new(transport: Arc<dyn NotificationTransport>) -> Self {
        Self { transport }
    }

    pub async fn notify(
        &self,
        product: &TrackedProduct,
        event: &PriceChangeEvent,
        destinations: &[NotificationDestination],
    ) -> DeliveryReport {
        let text = message::render(product, event);

        let attempts = destinations.iter().map(|destination| {
            let text = &text;
            async move {
                match self.transport.send(destination, text).await {
                    Ok(()) => DeliveryOutcome {
                        destination: destination.clone(),
                        success: true,
                        error: None,
                    },
                    Err(e) => {
                        error!(%destination, error = %e, "notification delivery failed");
                        DeliveryOutcome {
                            destination: destination.clone(),
                            success: false,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
        });

        let report = DeliveryReport {
            outcomes: join_all(attempts).await,
        };
        info!(
            product_id = %event.product_id,
            delivered = report.delivered(),
            failed = report.failed(),
            "fanout complete"
        );
        report
    }
}

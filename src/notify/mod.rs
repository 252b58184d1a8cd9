pub mod fanout;
pub mod message;
pub mod telegram;
pub mod transport;

pub use fanout::{DeliveryOutcome, DeliveryReport, NotificationFanout};
pub use telegram::TelegramTransport;
pub use transport::NotificationTransport;

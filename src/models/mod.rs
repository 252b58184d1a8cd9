use uuid::Uuid;

pub mod destination;
pub mod event;
pub mod observation;
pub mod product;

// Re-exports for convenience
pub use destination::*;
pub use event::*;
pub use observation::*;
pub use product::*;

// Helper function to generate product ids in the format stored in the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub mod de;
mod messages;
mod models;
mod time_slot;
pub mod validation;

pub use messages::*;
pub use models::*;
pub use time_slot::*;
pub use validation::is_valid_plate;

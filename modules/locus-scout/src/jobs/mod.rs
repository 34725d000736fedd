pub mod controller;
pub mod progress;
pub mod store;

pub use controller::{ControllerSettings, JobController, MAX_BATCH_SIZE, MAX_LIST_LIMIT};
pub use progress::Stage;
pub use store::{JobSlot, JobStore};

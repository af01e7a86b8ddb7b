pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{error_mapper, HttpError};
pub use routes::{build_router, serve};
pub use state::{AppState, HealthInfo};

pub mod handlers;
pub mod response;
pub mod server;

pub use response::ApiResponse;
pub use server::ApiServer;

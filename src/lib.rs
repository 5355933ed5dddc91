pub mod app;
pub mod assemble;
pub mod cache;
pub mod config;
pub mod exception;
pub mod param;
pub mod render;
pub mod request;
pub mod response;
pub mod router;
pub mod scripts;
pub mod store;
pub mod view;

pub use app::AppInstance;
pub use cache::RenderCache;
pub use exception::{Exception, RenderError};
pub use render::{render_ssr, RenderOutcome};
pub use request::Request;
pub use response::Response;

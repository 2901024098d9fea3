pub mod content;
pub mod public;
pub mod refresh;
pub mod webhook;



#[cfg(test)]
mod webhook_http_tests;

pub use content::configure_content_routes;
pub use public::configure_public_routes;
pub use refresh::configure_refresh_routes;
pub use webhook::configure_webhook_routes;

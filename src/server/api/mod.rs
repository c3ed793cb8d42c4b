pub mod admin_controller;
pub mod extract_controller;
pub mod health_controller;
pub mod proxy_controller;

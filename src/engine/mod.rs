pub mod assignment;
pub mod dispatcher;
pub mod handlers;
pub mod publisher;
pub mod telemetry;

pub mod assignment;
pub mod delivery;
pub mod driving;
pub mod event;
pub mod location;
pub mod robot;
pub mod route;
pub mod telemetry;

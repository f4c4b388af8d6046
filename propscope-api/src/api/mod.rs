//! HTTP API handlers for propscope-api

pub mod callback;
pub mod floorplan;
pub mod health;
pub mod results;
pub mod simulate;
pub mod stream;
pub mod trigger;
pub mod ui;

pub use callback::callback_routes;
pub use floorplan::floorplan_routes;
pub use health::health_routes;
pub use results::result_routes;
pub use simulate::simulate_routes;
pub use stream::stream_routes;
pub use trigger::trigger_routes;
pub use ui::ui_routes;

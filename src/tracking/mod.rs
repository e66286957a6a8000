pub mod direction;
pub mod rain;
pub mod wind;
pub mod window;

pub use direction::{DirectionTable, VoltageDivider};
pub use rain::RainTracker;
pub use wind::WindTracker;

//! Domain types for ticktape

pub mod bar;
pub mod fill;
pub mod ids;
pub mod order;
pub mod position;
pub mod trade;

pub use bar::{BarQuote, EquitySnapshot, Tick};
pub use fill::Fill;
pub use ids::{IdGen, OrderId};
pub use order::{Order, OrderSide, OrderStatus};
pub use position::Position;
pub use trade::TradeRecord;

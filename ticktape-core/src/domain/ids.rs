use serde::{Deserialize, Serialize};
use std::fmt;

/// Order ID, unique within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O-{}", self.0)
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Sequential ID generator owned by a single backtest loop.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next_order: u64,
}

impl IdGen {
    pub fn new() -> Self {
        Self { next_order: 1 }
    }

    pub fn next_order_id(&mut self) -> OrderId {
        if self.next_order == 0 {
            self.next_order = 1;
        }
        let id = OrderId(self.next_order);
        self.next_order += 1;
        id
    }
}

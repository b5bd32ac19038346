use serde::{Deserialize, Serialize};

/// Status of an order.
///
/// Statuses are free-form strings. Only cancellation has meaning to the
/// order workflow, so it gets its own variant; every other value is carried
/// as an open string. Open statuses can move to any other status; a
/// cancelled order never reopens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    /// The order was cancelled and its stock returned.
    Cancelled,

    /// Any other status label.
    Open(String),
}

impl OrderStatus {
    /// Label persisted for cancelled orders.
    pub const CANCELLED: &'static str = "Cancelled";

    /// Conventional label for a freshly placed order.
    pub const PENDING: &'static str = "Pending";

    /// Returns the conventional initial status.
    pub fn pending() -> Self {
        Self::Open(Self::PENDING.to_string())
    }

    /// Returns true for the cancelled variant.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }

    /// Returns the status label.
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Cancelled => Self::CANCELLED,
            OrderStatus::Open(label) => label,
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::pending()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for OrderStatus {
    fn from(label: String) -> Self {
        if label == Self::CANCELLED {
            OrderStatus::Cancelled
        } else {
            OrderStatus::Open(label)
        }
    }
}

impl From<&str> for OrderStatus {
    fn from(label: &str) -> Self {
        Self::from(label.to_string())
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Cancelled => OrderStatus::CANCELLED.to_string(),
            OrderStatus::Open(label) => label,
        }
    }
}

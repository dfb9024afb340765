use std::fmt;

use serde_json::Value;

type Supplier = Box<dyn Fn() -> Value + Send + Sync>;

/// A read-only value produced by a callback on every read.
///
/// The callback may return anything convertible to a JSON value; exporters
/// that need a number skip gauges whose current value is not numeric.
pub struct Gauge {
    supplier: Supplier,
}

impl Gauge {
    pub fn new<F, T>(supplier: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        Self {
            supplier: Box::new(move || supplier().into()),
        }
    }

    pub fn value(&self) -> Value {
        (self.supplier)()
    }

    /// Current value as a float, `None` when it is not a number.
    pub fn numeric_value(&self) -> Option<f64> {
        self.value().as_f64()
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge").finish_non_exhaustive()
    }
}

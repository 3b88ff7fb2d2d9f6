use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Last-written integer value.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Last-written floating-point value, kept as `f64` bits so reads and
/// writes stay lock-free.
#[derive(Debug)]
pub struct Gauge64 {
    bits: AtomicU64,
}

impl Gauge64 {
    pub fn new() -> Self {
        Self {
            bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn update(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for Gauge64 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_keeps_last_value() {
        let g = Gauge::new();
        assert_eq!(g.value(), 0);
        g.update(47);
        g.update(-3);
        assert_eq!(g.value(), -3);
    }

    #[test]
    fn gauge64_keeps_last_value() {
        let g = Gauge64::new();
        assert_eq!(g.value(), 0.0);
        g.update(47.5);
        assert_eq!(g.value(), 47.5);
    }
}

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

// ============================================================================
// Metrics Module - Prometheus metrics for the client stores
// ============================================================================
//
// Tracks:
// - Store operations and failures, labelled by store and operation
// - Orders placed/cancelled and the distribution of order totals
// - Swallowed side-effect failures (notifications)
// - Fetch responses discarded as stale
//
// Each Metrics value owns its own registry, so several contexts (and tests)
// can coexist in one process. `render()` gives the text exposition format.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Store Metrics
    pub store_operations: IntCounterVec,
    pub store_failures: IntCounterVec,
    pub stale_responses: IntCounterVec,

    // Order Metrics
    pub orders_placed: IntCounter,
    pub orders_cancelled: IntCounter,
    pub order_total: Histogram,

    // Side Effects
    pub side_effect_failures: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Store Metrics
        let store_operations = IntCounterVec::new(
            Opts::new("store_operations_total", "Store operations that completed successfully"),
            &["store", "operation"],
        )?;
        registry.register(Box::new(store_operations.clone()))?;

        let store_failures = IntCounterVec::new(
            Opts::new("store_failures_total", "Store operations that returned an error"),
            &["store", "operation"],
        )?;
        registry.register(Box::new(store_failures.clone()))?;

        let stale_responses = IntCounterVec::new(
            Opts::new("stale_responses_total", "Fetch responses discarded because a newer one was applied"),
            &["store"],
        )?;
        registry.register(Box::new(stale_responses.clone()))?;

        // Order Metrics
        let orders_placed = IntCounter::new("orders_placed_total", "Orders placed")?;
        registry.register(Box::new(orders_placed.clone()))?;

        let orders_cancelled = IntCounter::new("orders_cancelled_total", "Orders cancelled")?;
        registry.register(Box::new(orders_cancelled.clone()))?;

        let order_total = Histogram::with_opts(
            HistogramOpts::new("order_total_amount", "Total amount of placed orders")
                .buckets(vec![100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]),
        )?;
        registry.register(Box::new(order_total.clone()))?;

        // Side Effects
        let side_effect_failures = IntCounterVec::new(
            Opts::new("side_effect_failures_total", "Best-effort side effects that failed and were logged"),
            &["side_effect"],
        )?;
        registry.register(Box::new(side_effect_failures.clone()))?;

        Ok(Self {
            registry,
            store_operations,
            store_failures,
            stale_responses,
            orders_placed,
            orders_cancelled,
            order_total,
            side_effect_failures,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record the outcome of one store operation
    pub fn record_operation(&self, store: &str, operation: &str, success: bool) {
        if success {
            self.store_operations.with_label_values(&[store, operation]).inc();
        } else {
            self.store_failures.with_label_values(&[store, operation]).inc();
        }
    }

    pub fn record_stale_response(&self, store: &str) {
        self.stale_responses.with_label_values(&[store]).inc();
    }

    pub fn record_order_placed(&self, total_amount: f64) {
        self.orders_placed.inc();
        self.order_total.observe(total_amount);
    }

    pub fn record_order_cancelled(&self) {
        self.orders_cancelled.inc();
    }

    pub fn record_side_effect_failure(&self, side_effect: &str) {
        self.side_effect_failures.with_label_values(&[side_effect]).inc();
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_order_cancelled();
        assert!(metrics.registry.gather().len() > 0);
    }

    #[test]
    fn test_record_operation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_operation("address", "add", true);
        metrics.record_operation("address", "add", true);
        metrics.record_operation("address", "delete", false);

        let gathered = metrics.registry.gather();
        let ops = gathered.iter().find(|m| m.name() == "store_operations_total").unwrap();
        assert_eq!(ops.metric[0].counter.value, Some(2.0));

        let failures = gathered.iter().find(|m| m.name() == "store_failures_total").unwrap();
        assert_eq!(failures.metric.len(), 1);
    }

    #[test]
    fn test_render_includes_order_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_order_placed(450.0);
        metrics.record_side_effect_failure("order_placed_notification");

        let text = metrics.render().unwrap();
        assert!(text.contains("orders_placed_total 1"));
        assert!(text.contains("order_total_amount_sum 450"));
        assert!(text.contains("side_effect_failures_total{side_effect=\"order_placed_notification\"} 1"));
    }
}

#![no_main]

use libfuzzer_sys::fuzz_target;
use waybill_types::{BookingReport, DispatchSummary, Order};

fuzz_target!(|data: &[u8]| {
    // Try to parse as JSON and verify serialization roundtrips
    if let Ok(json_str) = std::str::from_utf8(data) {
        // Test Order roundtrip
        if let Ok(order) = serde_json::from_str::<Order>(json_str) {
            if let Ok(roundtripped) = serde_json::to_string(&order) {
                if let Ok(parsed) = serde_json::from_str::<Order>(&roundtripped) {
                    assert_eq!(order.order_id, parsed.order_id);
                    assert_eq!(order.shipping_status, parsed.shipping_status);
                }
            }
        }

        // Test DispatchSummary roundtrip
        if let Ok(summary) = serde_json::from_str::<DispatchSummary>(json_str) {
            if let Ok(roundtripped) = serde_json::to_string(&summary) {
                if let Ok(parsed) = serde_json::from_str::<DispatchSummary>(&roundtripped) {
                    assert_eq!(summary.run_id, parsed.run_id);
                    assert_eq!(summary.counts(), parsed.counts());
                }
            }
        }

        // Test BookingReport roundtrip
        if let Ok(report) = serde_json::from_str::<BookingReport>(json_str) {
            if let Ok(roundtripped) = serde_json::to_string(&report) {
                if let Ok(parsed) = serde_json::from_str::<BookingReport>(&roundtripped) {
                    assert_eq!(report.results.total, parsed.results.total);
                }
            }
        }
    }
});

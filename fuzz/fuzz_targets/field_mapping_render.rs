#![no_main]

use libfuzzer_sys::fuzz_target;
use waybill_portal::{FieldMapping, SenderProfile, ShipmentFields};

fuzz_target!(|data: &[u8]| {
    // Arbitrary mapping tables must validate or fail cleanly, and a
    // valid mapping must render without panicking.
    if let Ok(json_str) = std::str::from_utf8(data) {
        if let Ok(mapping) = serde_json::from_str::<FieldMapping>(json_str) {
            let fields = ShipmentFields {
                sender: SenderProfile::default(),
                receiver_name: "r".to_string(),
                receiver_contact: "c".to_string(),
                receiver_address: "a".to_string(),
                receiver_province: "p".to_string(),
                receiver_city: "c".to_string(),
                receiver_barangay: "b".to_string(),
                package_size: "Small".to_string(),
                item_category: "General".to_string(),
                weight_kg: 1.0,
                quantity: 1,
                payment_type: "Prepaid".to_string(),
            };
            let _ = mapping.validate();
            let _ = mapping.render(&fields);
        }
    }
});

//! Storefront order placement.
//!
//! The non-presentation half of the storefront: look the product up,
//! validate the requested quantity against stock, submit the order to
//! the store, and hand the caller off to the payment initiator. The
//! store itself decrements stock on creation.

use waybill_store::{OrderStore, StoreClient, StoreError};
use waybill_types::{NewOrder, PaymentMethod};

use crate::config::PaymentSection;
use crate::payment::{self, PaymentHandoff};

/// Why an order could not be placed.
#[derive(Debug, thiserror::Error)]
pub enum StorefrontError {
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error("only {available} left in stock (requested {requested})")]
    OutOfStock { requested: u32, available: u32 },
    #[error("payment hand-off failed: {0}")]
    Payment(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Customer input collected by the order form.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub product_id: String,
    pub quantity: u32,
    pub customer_name: String,
    pub email: String,
    pub contact: String,
    pub province: String,
    pub city: String,
    pub barangay: String,
    pub address_details: String,
    pub payment_method: PaymentMethod,
}

/// A created order plus everything the customer needs next.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: String,
    pub product_name: String,
    pub amount: f64,
    pub payment: PaymentHandoff,
}

/// Validate and submit an order, returning the store-assigned id and
/// the payment hand-off.
pub fn place_order(
    store: &StoreClient,
    request: &PlaceOrder,
    payment_config: &PaymentSection,
) -> Result<PlacedOrder, StorefrontError> {
    if request.quantity == 0 {
        return Err(StorefrontError::ZeroQuantity);
    }

    let product = store.get_product(&request.product_id)?;
    if product.stock < request.quantity {
        return Err(StorefrontError::OutOfStock {
            requested: request.quantity,
            available: product.stock,
        });
    }

    // Package metadata comes from the product, not the customer.
    let new_order = NewOrder {
        product_id: request.product_id.clone(),
        quantity: request.quantity,
        customer_name: request.customer_name.clone(),
        email: request.email.clone(),
        contact: request.contact.clone(),
        province: request.province.clone(),
        city: request.city.clone(),
        barangay: request.barangay.clone(),
        address_details: request.address_details.clone(),
        package_size: product.size.clone(),
        item_category: product.category.clone(),
        payment_method: request.payment_method,
    };

    let order_id = store.create_order(&new_order)?;
    let amount = product.price * f64::from(request.quantity);
    let payment = payment::handoff(request.payment_method, amount, &order_id, payment_config)
        .map_err(|err| StorefrontError::Payment(format!("{err:#}")))?;

    Ok(PlacedOrder {
        order_id,
        product_name: product.name,
        amount,
        payment,
    })
}

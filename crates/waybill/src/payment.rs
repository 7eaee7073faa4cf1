//! Payment initiator.
//!
//! Starts the external checkout flow for an order; never confirms
//! payment. Maya orders get a checkout redirect URL, gcash orders get
//! the shop's static payment reference for manual reconciliation.
//! Also builds the order-link QR image URLs printed on product cards.

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::config::PaymentSection;
use waybill_types::PaymentMethod;

/// QR image endpoint for order links.
pub const QR_CHART_API: &str = "https://chart.googleapis.com/chart";

/// How the customer proceeds to pay after the order is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentHandoff {
    /// Redirect to the external checkout.
    MayaCheckout { url: String },
    /// Show the static QR reference; payment is reconciled manually.
    GcashQr { reference: String },
}

/// Build the hand-off for a freshly created order.
pub fn handoff(
    method: PaymentMethod,
    amount: f64,
    order_id: &str,
    config: &PaymentSection,
) -> Result<PaymentHandoff> {
    match method {
        PaymentMethod::Maya => Ok(PaymentHandoff::MayaCheckout {
            url: maya_checkout_url(
                &config.maya_checkout_base,
                &config.maya_public_key,
                amount,
                order_id,
            )?,
        }),
        PaymentMethod::Gcash => Ok(PaymentHandoff::GcashQr {
            reference: config.gcash_reference.clone(),
        }),
    }
}

/// The checkout redirect URL for a maya order.
pub fn maya_checkout_url(
    base: &str,
    public_key: &str,
    amount: f64,
    order_id: &str,
) -> Result<String> {
    let url = Url::parse_with_params(
        base,
        &[
            ("public_key", public_key),
            ("amount", &amount.to_string()),
            ("order_id", order_id),
        ],
    )
    .with_context(|| format!("invalid checkout base URL: {base}"))?;
    Ok(url.into())
}

/// QR image URL encoding the storefront order link for a product.
pub fn product_order_qr_url(storefront_base: &str, product_id: &str) -> Result<String> {
    let order_url = format!(
        "{}/order?id={product_id}",
        storefront_base.trim_end_matches('/')
    );
    let url = Url::parse_with_params(
        QR_CHART_API,
        &[("chs", "200x200"), ("cht", "qr"), ("chl", &order_url)],
    )
    .context("invalid QR chart URL")?;
    Ok(url.into())
}

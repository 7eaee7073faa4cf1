//! Order store client for waybill.
//!
//! The order store is a spreadsheet-backed web API with a single
//! endpoint; every operation is an action-tagged request (`getOrders`,
//! `createOrder`, `updateOrderStatus`, ...). Reads go out as GET query
//! parameters, mutations as JSON POST bodies. Admin-mutating actions
//! carry a bearer token which the store verifies server-side; the
//! client never compares tokens locally.
//!
//! All failures surface as the typed [`StoreError`] taxonomy, never as
//! unstructured strings.
//!
//! # Example
//!
//! ```no_run
//! use waybill_store::{OrderStore, StoreClient};
//! use waybill_types::OrderFilter;
//!
//! let store = StoreClient::new("https://script.example.com/exec");
//! let ready = store.list_orders(&OrderFilter::ready_to_ship()).unwrap();
//! println!("{} orders ready to ship", ready.len());
//! ```

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use waybill_types::{
    AddressEntry, AddressLevel, BookingReport, NewOrder, Order, OrderFilter, Product, StatusUpdate,
};

/// Default timeout for store requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent sent with every store request.
pub const USER_AGENT: &str = concat!("waybill/", env!("CARGO_PKG_VERSION"));

/// Typed failure taxonomy for the order store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced order or product does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The admin token is missing or was rejected by the store.
    #[error("admin token missing or rejected by the order store")]
    Unauthorized,
    /// The store could not be reached or answered with a server error.
    #[error("order store unavailable: {0}")]
    Unavailable(String),
    /// The store answered, but not with the shape this client expects.
    #[error("malformed response from the order store: {0}")]
    Malformed(String),
}

impl StoreError {
    /// Whether a retry against the same store could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// The order store operations the dispatcher and storefront depend on.
///
/// `StoreClient` is the HTTP implementation; tests substitute in-memory
/// fakes at this seam.
pub trait OrderStore {
    /// Orders matching the given server-side filters.
    fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;

    /// A single order by id.
    fn get_order(&self, order_id: &str) -> Result<Order, StoreError>;

    /// Create an order; the store assigns and returns the order id.
    fn create_order(&self, order: &NewOrder) -> Result<String, StoreError>;

    /// Apply a partial status write to one order. Admin-gated.
    fn update_order_status(&self, order_id: &str, update: &StatusUpdate)
    -> Result<(), StoreError>;

    /// Record a dispatch run's batch report for audit/history.
    fn record_batch_result(&self, report: &BookingReport) -> Result<(), StoreError>;
}

/// Blocking HTTP client for the store's action endpoint.
#[derive(Debug, Clone)]
pub struct StoreClient {
    base_url: String,
    admin_token: Option<String>,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateOrderAck {
    #[serde(rename = "orderId")]
    order_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionAck {
    message: Option<String>,
    error: Option<String>,
}

impl StoreClient {
    /// Create a client for the given endpoint URL.
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with an explicit request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_token: None,
            client,
        }
    }

    /// Attach the admin token used for mutating actions.
    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.filter(|t| !t.is_empty());
        self
    }

    /// The configured endpoint URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether an admin token is configured.
    pub fn has_admin_token(&self) -> bool {
        self.admin_token.is_some()
    }

    /// All catalog products.
    pub fn get_products(&self) -> Result<Vec<Product>, StoreError> {
        self.get_data(&[("action", "getProducts".to_string())])
    }

    /// A single product by id.
    pub fn get_product(&self, product_id: &str) -> Result<Product, StoreError> {
        self.get_data(&[
            ("action", "getProduct".to_string()),
            ("id", product_id.to_string()),
        ])
        .map_err(|err| err.with_subject(product_id))
    }

    /// Address entries for one hierarchy level, optionally scoped to a
    /// parent entry.
    pub fn get_address(
        &self,
        level: AddressLevel,
        parent_id: Option<&str>,
    ) -> Result<Vec<AddressEntry>, StoreError> {
        let mut params = vec![
            ("action", "getAddress".to_string()),
            ("level", level.to_string()),
        ];
        if let Some(parent) = parent_id {
            params.push(("parentId", parent.to_string()));
        }
        self.get_data(&params)
    }

    /// Ask the store to schedule a courier booking run for the given
    /// orders. Admin-gated; returns the store's acknowledgement text.
    pub fn trigger_booking(&self, order_ids: &[String]) -> Result<String, StoreError> {
        let body = json!({
            "action": "triggerJtBooking",
            "orderIds": order_ids,
            "token": self.require_token()?,
        });
        let ack: ActionAck = self.post_action(&body)?;
        if let Some(error) = ack.error {
            return Err(classify_store_error(&error));
        }
        Ok(ack
            .message
            .unwrap_or_else(|| "booking run triggered".to_string()))
    }

    fn require_token(&self) -> Result<&str, StoreError> {
        self.admin_token.as_deref().ok_or(StoreError::Unauthorized)
    }

    fn get_data<T: DeserializeOwned>(&self, params: &[(&str, String)]) -> Result<T, StoreError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .send()
            .map_err(transport_error)?;
        let envelope: Envelope<T> = parse_response(response)?;

        if let Some(error) = envelope.error {
            return Err(classify_store_error(&error));
        }
        envelope
            .data
            .ok_or_else(|| StoreError::Malformed("response carries no data field".to_string()))
    }

    fn post_action<T: DeserializeOwned>(&self, body: &Value) -> Result<T, StoreError> {
        let response = self
            .client
            .post(&self.base_url)
            .json(body)
            .send()
            .map_err(transport_error)?;
        parse_response(response)
    }
}

impl OrderStore for StoreClient {
    fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let mut params = vec![("action", "getOrders".to_string())];
        if let Some(payment) = filter.payment_status {
            params.push(("paymentStatus", payment.to_string()));
        }
        if let Some(shipping) = filter.shipping_status {
            params.push(("shippingStatus", shipping.to_string()));
        }
        if let Some(search) = &filter.search {
            params.push(("search", search.clone()));
        }
        self.get_data(&params)
    }

    fn get_order(&self, order_id: &str) -> Result<Order, StoreError> {
        self.get_data(&[
            ("action", "getOrder".to_string()),
            ("orderId", order_id.to_string()),
        ])
        .map_err(|err| err.with_subject(order_id))
    }

    fn create_order(&self, order: &NewOrder) -> Result<String, StoreError> {
        let mut body = serde_json::to_value(order)
            .map_err(|err| StoreError::Malformed(format!("unserializable order: {err}")))?;
        body["action"] = json!("createOrder");

        let ack: CreateOrderAck = self.post_action(&body)?;
        if let Some(error) = ack.error {
            return Err(classify_store_error(&error));
        }
        ack.order_id.ok_or_else(|| {
            StoreError::Malformed("createOrder response carries no orderId".to_string())
        })
    }

    fn update_order_status(
        &self,
        order_id: &str,
        update: &StatusUpdate,
    ) -> Result<(), StoreError> {
        let body = json!({
            "action": "updateOrderStatus",
            "orderId": order_id,
            "status": update,
            "token": self.require_token()?,
        });
        let ack: ActionAck = self.post_action(&body)?;
        if let Some(error) = ack.error {
            return Err(classify_store_error(&error).with_subject(order_id));
        }
        Ok(())
    }

    fn record_batch_result(&self, report: &BookingReport) -> Result<(), StoreError> {
        let mut body = serde_json::to_value(report)
            .map_err(|err| StoreError::Malformed(format!("unserializable report: {err}")))?;
        body["action"] = json!("jtCallback");

        let ack: ActionAck = self.post_action(&body)?;
        if let Some(error) = ack.error {
            return Err(classify_store_error(&error));
        }
        Ok(())
    }
}

impl StoreError {
    /// Attach the looked-up id to a bare `NotFound`.
    fn with_subject(self, subject: &str) -> Self {
        match self {
            StoreError::NotFound(detail) if detail.is_empty() => {
                StoreError::NotFound(subject.to_string())
            }
            other => other,
        }
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Unavailable("request timed out".to_string())
    } else {
        StoreError::Unavailable(err.to_string())
    }
}

fn parse_response<T: DeserializeOwned>(
    response: reqwest::blocking::Response,
) -> Result<T, StoreError> {
    match response.status() {
        status if status.is_success() => response
            .json()
            .map_err(|err| StoreError::Malformed(err.to_string())),
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            Err(StoreError::Unauthorized)
        }
        reqwest::StatusCode::NOT_FOUND => Err(StoreError::NotFound(String::new())),
        status => Err(StoreError::Unavailable(format!(
            "unexpected status code: {status}"
        ))),
    }
}

/// Classify an error string from the store's response envelope.
///
/// The store reports failures as free-text `error` fields; this folds
/// the known spellings into the typed taxonomy.
fn classify_store_error(message: &str) -> StoreError {
    let lower = message.to_lowercase();
    if lower.contains("not found") || lower.contains("404") {
        StoreError::NotFound(String::new())
    } else if lower.contains("unauthorized")
        || lower.contains("forbidden")
        || lower.contains("invalid token")
        || lower.contains("401")
        || lower.contains("403")
    {
        StoreError::Unauthorized
    } else {
        StoreError::Unavailable(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;
    use std::thread;

    use waybill_types::{PaymentMethod, ShippingStatus};

    struct Captured {
        method: String,
        url: String,
        body: String,
    }

    /// Serve `responses` in order from an ephemeral HTTP server,
    /// capturing each request for later assertions.
    fn spawn_store(
        responses: Vec<(u16, String)>,
    ) -> (String, thread::JoinHandle<Vec<Captured>>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind");
        let base_url = format!("http://{}", server.server_addr());
        let handle = thread::spawn(move || {
            let mut captured = Vec::new();
            for (status, body) in responses {
                let mut request = server.recv().expect("request");
                let mut request_body = String::new();
                request
                    .as_reader()
                    .read_to_string(&mut request_body)
                    .expect("read body");
                captured.push(Captured {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    body: request_body,
                });

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("header");
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(tiny_http::StatusCode(status))
                    .with_header(header);
                request.respond(response).expect("respond");
            }
            captured
        });
        (base_url, handle)
    }

    fn order_json(id: &str, status: &str) -> String {
        format!(
            r#"{{"OrderID":"{id}","ProductID":"PROD-1","ProductName":"Tote","Quantity":1,
                "CustomerName":"Ana Reyes","Contact":"0917","Province":"Laguna","City":"Calamba",
                "Barangay":"Real","AddressDetails":"123 St","PaymentMethod":"gcash",
                "PaymentStatus":"Paid","ShippingStatus":"{status}","Price":150.0}}"#
        )
    }

    #[test]
    fn get_order_sends_action_and_parses_envelope() {
        let body = format!("{{\"data\":{}}}", order_json("ORD-7", "Ready to Ship"));
        let (url, handle) = spawn_store(vec![(200, body)]);

        let store = StoreClient::new(&url);
        let order = store.get_order("ORD-7").expect("order");
        assert_eq!(order.order_id, "ORD-7");
        assert_eq!(order.shipping_status, ShippingStatus::ReadyToShip);
        assert_eq!(order.payment_method, PaymentMethod::Gcash);

        let captured = handle.join().expect("join");
        assert_eq!(captured[0].method, "GET");
        assert!(captured[0].url.contains("action=getOrder"));
        assert!(captured[0].url.contains("orderId=ORD-7"));
    }

    #[test]
    fn list_orders_encodes_filters() {
        let (url, handle) = spawn_store(vec![(200, "{\"data\":[]}".to_string())]);

        let store = StoreClient::new(&url);
        let orders = store
            .list_orders(&OrderFilter::ready_to_ship())
            .expect("orders");
        assert!(orders.is_empty());

        let captured = handle.join().expect("join");
        assert!(captured[0].url.contains("action=getOrders"));
        assert!(captured[0].url.contains("shippingStatus=Ready%20to%20Ship"));
    }

    #[test]
    fn envelope_error_strings_are_classified() {
        let (url, handle) = spawn_store(vec![
            (200, "{\"error\":\"Order not found\"}".to_string()),
            (200, "{\"error\":\"invalid token\"}".to_string()),
            (200, "{\"error\":\"quota exceeded\"}".to_string()),
        ]);

        let store = StoreClient::new(&url);
        assert!(matches!(
            store.get_order("ORD-1"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.get_order("ORD-1"),
            Err(StoreError::Unauthorized)
        ));
        assert!(matches!(
            store.get_order("ORD-1"),
            Err(StoreError::Unavailable(_))
        ));
        handle.join().expect("join");
    }

    #[test]
    fn http_statuses_map_to_typed_errors() {
        let (url, handle) = spawn_store(vec![
            (404, "{}".to_string()),
            (401, "{}".to_string()),
            (503, "{}".to_string()),
        ]);

        let store = StoreClient::new(&url);
        assert!(matches!(
            store.get_order("ORD-9"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.get_order("ORD-9"),
            Err(StoreError::Unauthorized)
        ));
        let err = store.get_order("ORD-9").expect_err("unavailable");
        assert!(err.is_transient());
        handle.join().expect("join");
    }

    #[test]
    fn create_order_posts_fields_and_returns_id() {
        let (url, handle) = spawn_store(vec![(200, "{\"orderId\":\"ORD-42\"}".to_string())]);

        let store = StoreClient::new(&url);
        let new_order = NewOrder {
            product_id: "PROD-1".to_string(),
            quantity: 2,
            customer_name: "Ana Reyes".to_string(),
            email: "ana@example.com".to_string(),
            contact: "0917".to_string(),
            province: "Laguna".to_string(),
            city: "Calamba".to_string(),
            barangay: "Real".to_string(),
            address_details: "123 St".to_string(),
            package_size: "Small".to_string(),
            item_category: "Apparel".to_string(),
            payment_method: PaymentMethod::Maya,
        };
        let order_id = store.create_order(&new_order).expect("order id");
        assert_eq!(order_id, "ORD-42");

        let captured = handle.join().expect("join");
        assert_eq!(captured[0].method, "POST");
        let body: serde_json::Value = serde_json::from_str(&captured[0].body).expect("json");
        assert_eq!(body["action"], "createOrder");
        assert_eq!(body["productId"], "PROD-1");
        assert_eq!(body["paymentMethod"], "maya");
    }

    #[test]
    fn update_order_status_requires_a_token() {
        let store = StoreClient::new("http://127.0.0.1:9"); // never reached
        let err = store
            .update_order_status("ORD-1", &StatusUpdate::shipped("JT1"))
            .expect_err("no token");
        assert!(matches!(err, StoreError::Unauthorized));
    }

    #[test]
    fn update_order_status_sends_partial_status_and_token() {
        let (url, handle) = spawn_store(vec![(200, "{\"message\":\"ok\"}".to_string())]);

        let store = StoreClient::new(&url).with_admin_token(Some("sekrit".to_string()));
        store
            .update_order_status("ORD-1", &StatusUpdate::shipped("JT123456"))
            .expect("update");

        let captured = handle.join().expect("join");
        let body: serde_json::Value = serde_json::from_str(&captured[0].body).expect("json");
        assert_eq!(body["action"], "updateOrderStatus");
        assert_eq!(body["orderId"], "ORD-1");
        assert_eq!(body["token"], "sekrit");
        assert_eq!(body["status"]["ShippingStatus"], "Shipped");
        assert_eq!(body["status"]["TrackingNumber"], "JT123456");
        assert!(body["status"].get("PaymentStatus").is_none());
    }

    #[test]
    fn record_batch_result_posts_jt_callback() {
        use chrono::Utc;
        use waybill_types::{BookedOrder, BookingResults};

        let (url, handle) = spawn_store(vec![(200, "{}".to_string())]);

        let store = StoreClient::new(&url);
        let report = BookingReport {
            results: BookingResults {
                success: vec![BookedOrder {
                    order_id: "ORD-1".to_string(),
                    tracking_number: "JT123456".to_string(),
                }],
                failed: vec![],
                indeterminate: vec![],
                total: 1,
            },
            timestamp: Utc::now(),
            signature: None,
        };
        store.record_batch_result(&report).expect("callback");

        let captured = handle.join().expect("join");
        let body: serde_json::Value = serde_json::from_str(&captured[0].body).expect("json");
        assert_eq!(body["action"], "jtCallback");
        assert_eq!(body["results"]["success"][0]["trackingNumber"], "JT123456");
        assert_eq!(body["results"]["total"], 1);
    }

    #[test]
    fn trigger_booking_returns_store_message() {
        let (url, handle) = spawn_store(vec![(
            200,
            "{\"message\":\"queued 2 orders\"}".to_string(),
        )]);

        let store = StoreClient::new(&url).with_admin_token(Some("sekrit".to_string()));
        let message = store
            .trigger_booking(&["ORD-1".to_string(), "ORD-2".to_string()])
            .expect("trigger");
        assert_eq!(message, "queued 2 orders");

        let captured = handle.join().expect("join");
        let body: serde_json::Value = serde_json::from_str(&captured[0].body).expect("json");
        assert_eq!(body["action"], "triggerJtBooking");
        assert_eq!(body["orderIds"][0], "ORD-1");
    }

    #[test]
    fn get_address_scopes_to_parent() {
        let (url, handle) = spawn_store(vec![(
            200,
            "{\"data\":[{\"id\":\"laguna\",\"name\":\"Laguna\"}]}".to_string(),
        )]);

        let store = StoreClient::new(&url);
        let entries = store
            .get_address(AddressLevel::City, Some("laguna"))
            .expect("entries");
        assert_eq!(entries[0].name, "Laguna");

        let captured = handle.join().expect("join");
        assert!(captured[0].url.contains("level=city"));
        assert!(captured[0].url.contains("parentId=laguna"));
    }
}

//! In-memory fakes for the store and portal seams, shared by the unit
//! and property tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};

use waybill_portal::{
    AuthError, PortalAdapter, PortalCredentials, SenderProfile, Session, ShipmentFields,
    SubmissionError, SubmitResult,
};
use waybill_store::{OrderStore, StoreError};
use waybill_types::{
    BookingReport, NewOrder, Order, OrderFilter, PaymentMethod, PaymentStatus, ShippingStatus,
    StatusUpdate,
};

pub fn sender() -> SenderProfile {
    SenderProfile {
        name: "Bayanihan Goods".to_string(),
        contact: "+639123456789".to_string(),
        address: "Unit 4, Maginhawa St".to_string(),
        province: "Metro Manila".to_string(),
        city: "Quezon City".to_string(),
        barangay: "Teachers Village".to_string(),
    }
}

pub fn credentials() -> PortalCredentials {
    PortalCredentials {
        username: "shop".to_string(),
        password: "pw".to_string(),
    }
}

pub fn ready_order(order_id: &str) -> Order {
    Order {
        order_id: order_id.to_string(),
        product_id: "PROD-001".to_string(),
        product_name: "Canvas Tote".to_string(),
        quantity: 1,
        customer_name: "Ana Reyes".to_string(),
        email: "ana@example.com".to_string(),
        contact: "09171234567".to_string(),
        province: "Laguna".to_string(),
        city: "Calamba".to_string(),
        barangay: "Real".to_string(),
        address_details: "123 Rizal St".to_string(),
        package_size: "Small".to_string(),
        item_category: "Apparel".to_string(),
        payment_method: PaymentMethod::Gcash,
        payment_status: PaymentStatus::Paid,
        shipping_status: ShippingStatus::ReadyToShip,
        tracking_number: None,
        price: 150.0,
        date: "2026-07-21".to_string(),
    }
}

/// In-memory order store capturing every mutation.
pub struct MemoryStore {
    orders: RefCell<Vec<Order>>,
    updates: RefCell<Vec<(String, StatusUpdate)>>,
    reports: RefCell<Vec<BookingReport>>,
    failing_update_ids: HashSet<String>,
    update_attempts: Cell<u32>,
    unavailable: bool,
    next_id: Cell<u32>,
}

impl MemoryStore {
    pub fn with_orders(orders: Vec<Order>) -> Self {
        Self {
            orders: RefCell::new(orders),
            updates: RefCell::new(Vec::new()),
            reports: RefCell::new(Vec::new()),
            failing_update_ids: HashSet::new(),
            update_attempts: Cell::new(0),
            unavailable: false,
            next_id: Cell::new(1),
        }
    }

    /// A store whose every operation fails with `Unavailable`.
    pub fn unavailable() -> Self {
        let mut store = Self::with_orders(Vec::new());
        store.unavailable = true;
        store
    }

    /// Make status updates for the given order fail transiently.
    pub fn failing_updates_for(mut self, order_id: &str) -> Self {
        self.failing_update_ids.insert(order_id.to_string());
        self
    }

    pub fn updates(&self) -> Vec<(String, StatusUpdate)> {
        self.updates.borrow().clone()
    }

    pub fn reports(&self) -> Vec<BookingReport> {
        self.reports.borrow().clone()
    }

    pub fn update_attempts(&self) -> u32 {
        self.update_attempts.get()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

impl OrderStore for MemoryStore {
    fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        self.check_available()?;
        Ok(self
            .orders
            .borrow()
            .iter()
            .filter(|order| {
                filter
                    .payment_status
                    .is_none_or(|status| order.payment_status == status)
                    && filter
                        .shipping_status
                        .is_none_or(|status| order.shipping_status == status)
                    && filter.search.as_deref().is_none_or(|needle| {
                        order.order_id.contains(needle) || order.customer_name.contains(needle)
                    })
            })
            .cloned()
            .collect())
    }

    fn get_order(&self, order_id: &str) -> Result<Order, StoreError> {
        self.check_available()?;
        self.orders
            .borrow()
            .iter()
            .find(|order| order.order_id == order_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(order_id.to_string()))
    }

    fn create_order(&self, order: &NewOrder) -> Result<String, StoreError> {
        self.check_available()?;
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let order_id = format!("ORD-NEW-{id}");
        self.orders.borrow_mut().push(Order {
            order_id: order_id.clone(),
            product_id: order.product_id.clone(),
            product_name: String::new(),
            quantity: order.quantity,
            customer_name: order.customer_name.clone(),
            email: order.email.clone(),
            contact: order.contact.clone(),
            province: order.province.clone(),
            city: order.city.clone(),
            barangay: order.barangay.clone(),
            address_details: order.address_details.clone(),
            package_size: order.package_size.clone(),
            item_category: order.item_category.clone(),
            payment_method: order.payment_method,
            payment_status: PaymentStatus::Pending,
            shipping_status: ShippingStatus::Pending,
            tracking_number: None,
            price: 0.0,
            date: String::new(),
        });
        Ok(order_id)
    }

    fn update_order_status(
        &self,
        order_id: &str,
        update: &StatusUpdate,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        self.update_attempts.set(self.update_attempts.get() + 1);
        if self.failing_update_ids.contains(order_id) {
            return Err(StoreError::Unavailable("store write failed".to_string()));
        }
        self.updates
            .borrow_mut()
            .push((order_id.to_string(), update.clone()));
        Ok(())
    }

    fn record_batch_result(&self, report: &BookingReport) -> Result<(), StoreError> {
        self.check_available()?;
        self.reports.borrow_mut().push(report.clone());
        Ok(())
    }
}

/// Portal fake driven by scripted per-call results. Unscripted calls
/// succeed with generated values.
pub struct ScriptedPortal {
    auth_script: RefCell<VecDeque<Result<(), AuthError>>>,
    submit_script: RefCell<VecDeque<Result<SubmitResult, SubmissionError>>>,
    auth_calls: Cell<usize>,
    submit_calls: Cell<usize>,
    closed: Cell<usize>,
}

impl ScriptedPortal {
    pub fn new() -> Self {
        Self {
            auth_script: RefCell::new(VecDeque::new()),
            submit_script: RefCell::new(VecDeque::new()),
            auth_calls: Cell::new(0),
            submit_calls: Cell::new(0),
            closed: Cell::new(0),
        }
    }

    pub fn auth(self, result: Result<(), AuthError>) -> Self {
        self.auth_script.borrow_mut().push_back(result);
        self
    }

    pub fn submit(self, result: Result<SubmitResult, SubmissionError>) -> Self {
        self.submit_script.borrow_mut().push_back(result);
        self
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.get()
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.get()
    }

    pub fn closed_sessions(&self) -> usize {
        self.closed.get()
    }
}

impl PortalAdapter for ScriptedPortal {
    fn authenticate(&self, _credentials: &PortalCredentials) -> Result<Session, AuthError> {
        let call = self.auth_calls.get() + 1;
        self.auth_calls.set(call);
        match self.auth_script.borrow_mut().pop_front() {
            Some(Ok(())) | None => Ok(Session::new(format!("sess-{call}"))),
            Some(Err(err)) => Err(err),
        }
    }

    fn submit_shipment(
        &self,
        _session: &Session,
        _fields: &ShipmentFields,
    ) -> Result<SubmitResult, SubmissionError> {
        let call = self.submit_calls.get() + 1;
        self.submit_calls.set(call);
        match self.submit_script.borrow_mut().pop_front() {
            Some(result) => result,
            None => Ok(SubmitResult::Booked {
                tracking_number: format!("JT-AUTO-{call}"),
            }),
        }
    }

    fn close(&self, _session: Session) {
        self.closed.set(self.closed.get() + 1);
    }
}

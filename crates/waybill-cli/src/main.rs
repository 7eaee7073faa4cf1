use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use waybill::config::{self, WaybillConfig};
use waybill::engine::{self, DispatchOptions, Reporter};
use waybill::payment::{self, PaymentHandoff};
use waybill::portal::HttpPortal;
use waybill::report;
use waybill::store::{OrderStore, StoreClient};
use waybill::storefront::{self, PlaceOrder};
use waybill::types::{
    Order, OrderFilter, OrderSelector, PaymentMethod, PaymentStatus, ShippingStatus, StatusUpdate,
};

mod progress;

use progress::{CliReporter, DispatchReporter};

#[derive(Parser, Debug)]
#[command(name = "waybill", version)]
#[command(about = "Order lifecycle and courier booking dispatch for the storefront")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = config::CONFIG_FILE)]
    config: PathBuf,

    /// Override the order store endpoint URL.
    #[arg(long)]
    store_url: Option<String>,

    /// Override the order store request timeout (e.g. 10s, 500ms).
    #[arg(long)]
    store_timeout: Option<String>,

    /// Override the state directory for audit events and summaries.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Book courier shipments for ready-to-ship orders.
    ///
    /// Exits non-zero only when the run cannot start at all
    /// (unreachable store, missing configuration). Individual order
    /// failures are reported in the printed summary; the exit code
    /// stays zero.
    Dispatch(DispatchArgs),
    /// Admin console: list, inspect, and transition orders.
    #[command(subcommand)]
    Orders(OrdersCmd),
    /// Catalog helpers.
    #[command(subcommand)]
    Products(ProductsCmd),
    /// Place a storefront order and print the payment hand-off.
    Place(PlaceArgs),
    /// Print configuration and connectivity diagnostics.
    Doctor,
}

#[derive(Args, Debug)]
struct DispatchArgs {
    /// Order id to dispatch (repeatable).
    #[arg(long = "order-id", value_name = "ID", conflicts_with = "all_ready")]
    order_ids: Vec<String>,

    /// Dispatch every order with ShippingStatus = Ready to Ship.
    #[arg(long)]
    all_ready: bool,

    /// Skip the batch callback to the store.
    #[arg(long)]
    no_callback: bool,
}

#[derive(Subcommand, Debug)]
enum OrdersCmd {
    /// List orders, optionally filtered.
    List(FilterArgs),
    /// Show one order in full.
    Show { order_id: String },
    /// Mark orders as paid.
    MarkPaid {
        #[arg(required = true)]
        order_ids: Vec<String>,
    },
    /// Mark orders as ready to ship.
    MarkReady {
        #[arg(required = true)]
        order_ids: Vec<String>,
    },
    /// Mark one order as shipped with its tracking number.
    MarkShipped {
        order_id: String,
        #[arg(long)]
        tracking: String,
    },
    /// Export orders as CSV on stdout.
    Export(FilterArgs),
    /// Ask the store to schedule a booking run for the given orders.
    RequestBooking {
        #[arg(required = true)]
        order_ids: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ProductsCmd {
    /// List catalog products.
    List,
    /// Print the order-link QR image URL for a product.
    Qr { product_id: String },
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Filter by payment status (pending|paid).
    #[arg(long, value_parser = parse_payment_status)]
    payment_status: Option<PaymentStatus>,

    /// Filter by shipping status (pending|ready-to-ship|shipped).
    #[arg(long, value_parser = parse_shipping_status)]
    shipping_status: Option<ShippingStatus>,

    /// Match against order id or customer name.
    #[arg(long)]
    search: Option<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> OrderFilter {
        OrderFilter {
            payment_status: self.payment_status,
            shipping_status: self.shipping_status,
            search: self.search.clone(),
        }
    }
}

#[derive(Args, Debug)]
struct PlaceArgs {
    #[arg(long)]
    product: String,
    #[arg(long, default_value_t = 1)]
    quantity: u32,
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    contact: String,
    #[arg(long)]
    province: String,
    #[arg(long)]
    city: String,
    #[arg(long)]
    barangay: String,
    #[arg(long)]
    address: String,
    /// Payment method (maya|gcash).
    #[arg(long, default_value = "maya", value_parser = parse_payment_method)]
    payment: PaymentMethod,
}

fn parse_payment_status(s: &str) -> Result<PaymentStatus, String> {
    s.parse()
}

fn parse_shipping_status(s: &str) -> Result<ShippingStatus, String> {
    s.parse()
}

fn parse_payment_method(s: &str) -> Result<PaymentMethod, String> {
    s.parse()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = WaybillConfig::load_file(&cli.config)?;
    if let Some(url) = &cli.store_url {
        config.store.url = url.clone();
    }
    if let Some(timeout) = &cli.store_timeout {
        config.store.timeout = parse_duration(timeout)?;
    }
    if let Some(dir) = &cli.state_dir {
        config.dispatch.state_dir = dir.clone();
    }

    match cli.cmd {
        Commands::Dispatch(args) => run_dispatch(&config, &args),
        Commands::Orders(cmd) => run_orders(&config, &cmd),
        Commands::Products(cmd) => run_products(&config, &cmd),
        Commands::Place(args) => run_place(&config, &args),
        Commands::Doctor => run_doctor(&config),
    }
}

fn parse_duration(s: &str) -> Result<Duration> {
    humantime::parse_duration(s).with_context(|| format!("invalid duration: {s}"))
}

fn store_client(config: &WaybillConfig) -> Result<StoreClient> {
    let url = config.require_store_url()?;
    Ok(StoreClient::with_timeout(url, config.store.timeout)
        .with_admin_token(config::resolve_admin_token()))
}

fn run_dispatch(config: &WaybillConfig, args: &DispatchArgs) -> Result<()> {
    let selector = if args.all_ready {
        OrderSelector::AllReadyToShip
    } else {
        match args.order_ids.len() {
            0 => bail!("nothing selected; pass --order-id or --all-ready"),
            1 => OrderSelector::Single(args.order_ids[0].clone()),
            _ => OrderSelector::Many(args.order_ids.clone()),
        }
    };

    let store = store_client(config)?;
    let credentials = config.portal_credentials()?;
    let portal = HttpPortal::with_timeout(&config.portal.base_url, config.portal.timeout)
        .with_mapping(config.field_mapping()?);

    let admin_token = config::resolve_admin_token();
    let opts = DispatchOptions {
        state_dir: config.dispatch.state_dir.clone(),
        store_update_retry: config.dispatch.store_update_retry,
        send_callback: config.dispatch.callback && !args.no_callback,
        callback_secret: if config.dispatch.sign_callback {
            admin_token
        } else {
            None
        },
    };

    let mut reporter = DispatchReporter::new();
    let summary = engine::run_dispatch(
        &store,
        &portal,
        &credentials,
        &config.sender,
        &selector,
        &opts,
        &mut reporter,
    )?;
    reporter.finish();

    print!("{}", report::render_summary(&summary));
    println!(
        "summary: {}",
        report::summary_path(&opts.state_dir).display()
    );

    // Per-order failures are in the summary, not the exit code.
    Ok(())
}

fn run_orders(config: &WaybillConfig, cmd: &OrdersCmd) -> Result<()> {
    let store = store_client(config)?;
    let mut reporter = CliReporter;

    match cmd {
        OrdersCmd::List(filters) => {
            let orders = store.list_orders(&filters.to_filter())?;
            if orders.is_empty() {
                println!("no orders found");
                return Ok(());
            }
            for order in &orders {
                print_order_row(order);
            }
        }
        OrdersCmd::Show { order_id } => {
            let order = store.get_order(order_id)?;
            print_order_full(&order);
        }
        OrdersCmd::MarkPaid { order_ids } => {
            let update = StatusUpdate {
                payment_status: Some(PaymentStatus::Paid),
                ..StatusUpdate::default()
            };
            apply_updates(&store, order_ids, &update, "marked paid", &mut reporter);
        }
        OrdersCmd::MarkReady { order_ids } => {
            let update = StatusUpdate {
                shipping_status: Some(ShippingStatus::ReadyToShip),
                ..StatusUpdate::default()
            };
            apply_updates(&store, order_ids, &update, "marked ready to ship", &mut reporter);
        }
        OrdersCmd::MarkShipped { order_id, tracking } => {
            if tracking.trim().is_empty() {
                bail!("an order can only be marked shipped with a tracking number");
            }
            let update = StatusUpdate::shipped(tracking.trim());
            apply_updates(
                &store,
                std::slice::from_ref(order_id),
                &update,
                "marked shipped",
                &mut reporter,
            );
        }
        OrdersCmd::Export(filters) => {
            let orders = store.list_orders(&filters.to_filter())?;
            print!("{}", report::orders_csv(&orders));
        }
        OrdersCmd::RequestBooking { order_ids } => {
            let message = store
                .trigger_booking(order_ids)
                .context("booking request rejected by the store")?;
            println!("{message}");
        }
    }
    Ok(())
}

/// Apply one status write to each order, warning (not aborting) on
/// per-order failures. The admin console never dies on a single bad
/// update.
fn apply_updates(
    store: &StoreClient,
    order_ids: &[String],
    update: &StatusUpdate,
    verb: &str,
    reporter: &mut dyn Reporter,
) {
    let mut applied = 0;
    for order_id in order_ids {
        match store.update_order_status(order_id, update) {
            Ok(()) => {
                reporter.info(&format!("{order_id}: {verb}"));
                applied += 1;
            }
            Err(err) => reporter.warn(&format!("{order_id}: {err}")),
        }
    }
    println!("{applied}/{} order(s) {verb}", order_ids.len());
}

fn run_products(config: &WaybillConfig, cmd: &ProductsCmd) -> Result<()> {
    match cmd {
        ProductsCmd::List => {
            let store = store_client(config)?;
            for product in store.get_products()? {
                println!(
                    "{:<12} {:<28} ₱{:<8} stock {:<4} {} / {}",
                    product.product_id,
                    product.name,
                    product.price,
                    product.stock,
                    product.category,
                    product.size,
                );
            }
        }
        ProductsCmd::Qr { product_id } => {
            if config.storefront.base_url.is_empty() {
                bail!(
                    "no storefront URL configured; set [storefront] base_url in {}",
                    config::CONFIG_FILE
                );
            }
            let url = payment::product_order_qr_url(&config.storefront.base_url, product_id)?;
            println!("{url}");
        }
    }
    Ok(())
}

fn run_place(config: &WaybillConfig, args: &PlaceArgs) -> Result<()> {
    let store = store_client(config)?;
    let request = PlaceOrder {
        product_id: args.product.clone(),
        quantity: args.quantity,
        customer_name: args.name.clone(),
        email: args.email.clone(),
        contact: args.contact.clone(),
        province: args.province.clone(),
        city: args.city.clone(),
        barangay: args.barangay.clone(),
        address_details: args.address.clone(),
        payment_method: args.payment,
    };

    let placed = storefront::place_order(&store, &request, &config.payment)?;
    println!("order created: {}", placed.order_id);
    println!("{} x{} = ₱{}", placed.product_name, args.quantity, placed.amount);
    match &placed.payment {
        PaymentHandoff::MayaCheckout { url } => {
            println!("continue to checkout: {url}");
        }
        PaymentHandoff::GcashQr { reference } => {
            println!("pay via the gcash QR reference: {reference}");
            println!("payment is reconciled manually; the order stays Pending until then");
        }
    }
    Ok(())
}

fn run_doctor(config: &WaybillConfig) -> Result<()> {
    let mut reporter = CliReporter;

    println!("store_url: {}", or_unset(&config.store.url));
    println!("admin_token_detected: {}", config::resolve_admin_token().is_some());
    println!("portal_url: {}", or_unset(&config.portal.base_url));
    println!("portal_username: {}", or_unset(&config.portal.username));
    println!(
        "portal_password_detected: {}",
        std::env::var(config::PORTAL_PASSWORD_ENV).is_ok_and(|v| !v.trim().is_empty())
    );
    println!("field_mapping: {}", config.field_mapping()?.version);
    println!("sender: {}", or_unset(&config.sender.name));
    println!("state_dir: {}", config.dispatch.state_dir.display());
    println!();

    if config.store.url.is_empty() {
        reporter.warn("store is not configured; most commands will refuse to run");
        return Ok(());
    }
    match store_client(config)?.get_products() {
        Ok(products) => println!("store: reachable ({} product(s))", products.len()),
        Err(err) => reporter.warn(&format!("store: unreachable: {err}")),
    }
    Ok(())
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() { "<unset>" } else { value }
}

fn print_order_row(order: &Order) {
    let tracking = order.tracking_number.as_deref().unwrap_or("-");
    println!(
        "{:<12} {:<20} {:<22} x{:<3} ₱{:<8} {:<8} {:<14} {}",
        order.order_id,
        order.customer_name,
        order.product_name,
        order.quantity,
        order.amount(),
        order.payment_status,
        order.shipping_status,
        tracking,
    );
}

fn print_order_full(order: &Order) {
    println!("order:    {}", order.order_id);
    println!("date:     {}", order.date);
    println!("product:  {} ({}) x{}", order.product_name, order.product_id, order.quantity);
    println!("amount:   ₱{}", order.amount());
    println!("customer: {}", order.customer_name);
    println!("email:    {}", order.email);
    println!("contact:  {}", order.contact);
    println!(
        "address:  {}, {}, {}, {}",
        order.address_details, order.barangay, order.city, order.province
    );
    println!("payment:  {} ({})", order.payment_status, order.payment_method);
    println!("shipping: {}", order.shipping_status);
    if let Some(tracking) = &order.tracking_number {
        println!("tracking: {tracking}");
    }
}

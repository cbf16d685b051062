//! # Seed Data Generator
//!
//! Populates a database with a demo shop for development.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database (bolsita.toml / BOLSITA_* env)
//! cargo run -p bolsita-db --bin seed
//!
//! # Custom product count, database file and owner
//! cargo run -p bolsita-db --bin seed -- --count 200 --db ./bolsita_dev.db --owner demo
//! ```
//!
//! ## Generated Data
//! - Products across a few grocery families, each in several sizes
//! - Income and expense categories
//! - A handful of multi-item sales and plain expenses
//! - One receivable and one payable debt, the receivable partly paid
//! - A business profile

use std::env;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bolsita_core::sale::{Cart, Discount};
use bolsita_core::{
    DebtDirection, EntryDraft, EntryKind, Money, NewDebt, NewProduct, OwnerId, PaymentMethod,
    UserProfile,
};
use bolsita_db::config::BackendKind;
use bolsita_db::{AppConfig, Database};

/// Product families for realistic test data
const FAMILIES: &[(&str, &[&str])] = &[
    (
        "Bebidas",
        &[
            "Coca-Cola",
            "Agua Cristal",
            "Jugo de Naranja",
            "Café Listo",
            "Té Helado",
        ],
    ),
    (
        "Snacks",
        &["Papas Fritas", "Galletas María", "Chocolate", "Maní Salado", "Chicles"],
    ),
    (
        "Abarrotes",
        &["Arroz", "Frijoles", "Azúcar", "Aceite", "Harina de Maíz", "Pasta"],
    ),
    ("Lácteos", &["Leche", "Queso Fresco", "Crema", "Yogur"]),
];

/// Size variants with price addons (cents)
const SIZES: &[(&str, i64)] = &[("Pequeño", 0), ("Mediano", 75), ("Grande", 150)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bolsita_db=debug")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count = 40usize;
    let mut db_path: Option<String> = None;
    let mut owner = "demo".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(40);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--owner" | "-o" => {
                if i + 1 < args.len() {
                    owner = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Mi Bolsita Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 40)");
                println!("  -d, --db <PATH>    SQLite file (default: from bolsita.toml)");
                println!("  -o, --owner <ID>   Owner id to seed (default: demo)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = AppConfig::load_or_default(None);
    if let Some(path) = db_path {
        config.database.backend = BackendKind::Sqlite;
        config.database.path = path.into();
    }

    info!(
        backend = %config.database.backend,
        path = %config.database.path.display(),
        owner = %owner,
        "Seeding database"
    );

    let db = Database::new(config.to_db_config()).await?;
    let shop = db.owner(OwnerId::new(owner));

    let existing = shop.products().list().await?;
    if !existing.is_empty() {
        warn!(
            products = existing.len(),
            "Owner already has products, skipping seed to avoid duplicates"
        );
        return Ok(());
    }

    // Products
    let rows = generate_products(count);
    let start = std::time::Instant::now();
    let imported = shop.products().import(rows).await?;
    info!(imported, elapsed = ?start.elapsed(), "Products created");

    // Categories
    let categories = shop.categories();
    let sales_category = categories.create("Ventas", EntryKind::Income).await?;
    let rent = categories.create("Renta", EntryKind::Expense).await?;
    let supplies = categories.create("Proveedores", EntryKind::Expense).await?;

    // Sales
    let products = shop.products().list().await?;
    let mut sold = 0;
    for (n, window) in products.chunks(3).take(5).enumerate() {
        let items = window.iter().map(|p| (p, 1 + (n as i64 % 2)));
        let cart = match Cart::from_items(items) {
            Ok(cart) => cart,
            Err(e) => {
                warn!(error = %e, "Skipping demo sale");
                continue;
            }
        };
        let method = PaymentMethod::ALL[n % PaymentMethod::ALL.len()];
        let discount = if n == 2 { Discount::Percentage(500) } else { Discount::None };

        match shop
            .sales()
            .record_multi_item_sale(&cart, Some(sales_category.id.clone()), method, discount)
            .await
        {
            Ok(_) => sold += 1,
            Err(e) => warn!(error = %e, "Demo sale rejected"),
        }
    }
    info!(sales = sold, "Sales recorded");

    // Expenses
    for (concept, cents, category) in [
        ("Renta del local", 25_000, &rent),
        ("Compra de mercadería", 12_550, &supplies),
    ] {
        shop.ledger()
            .create(EntryDraft {
                kind: EntryKind::Expense,
                amount: Money::from_cents(cents),
                concept: concept.to_string(),
                category_id: Some(category.id.clone()),
            })
            .await?;
    }

    // Debts
    let debts = shop.debts();
    let receivable = debts
        .create(NewDebt {
            direction: DebtDirection::Receivable,
            person_name: "Doña Carmen".to_string(),
            initial_amount: Money::from_cents(4_500),
            concept: "Fiado de la semana".to_string(),
            due_date: Some(Utc::now() + Duration::days(3)),
        })
        .await?;
    debts.apply_payment(&receivable.id, Money::from_cents(1_500)).await?;

    debts
        .create(NewDebt {
            direction: DebtDirection::Payable,
            person_name: "Distribuidora El Sol".to_string(),
            initial_amount: Money::from_cents(30_000),
            concept: "Pedido de bebidas".to_string(),
            due_date: Some(Utc::now() + Duration::days(10)),
        })
        .await?;

    // Profile
    shop.profile()
        .update(UserProfile {
            business_name: Some("Tienda Demo".to_string()),
            business_address: Some("Calle Principal #123".to_string()),
            business_phone: Some("2222-3333".to_string()),
            receipt_counter: None,
        })
        .await?;

    info!("Seed complete");
    db.close().await;
    Ok(())
}

/// Builds `count` product rows cycling through families and sizes.
fn generate_products(count: usize) -> Vec<NewProduct> {
    FAMILIES
        .iter()
        .flat_map(|(_, names)| names.iter())
        .flat_map(|name| SIZES.iter().map(move |size| (name, size)))
        .enumerate()
        .take(count)
        .map(|(seed, (name, (size, addon)))| {
            // $0.99 - $8.99 base plus the size addon
            let price = 99 + ((seed * 37) % 800) as i64 + addon;
            // Cost is 55-75% of price
            let cost = price * (55 + (seed % 21) as i64) / 100;

            NewProduct {
                name: format!("{} {}", name, size),
                cost_price: Money::from_cents(cost),
                sale_price: Money::from_cents(price),
                stock: (seed % 25) as i64,
                barcode: Some(format!("750{:010}", seed)),
            }
        })
        .collect()
}

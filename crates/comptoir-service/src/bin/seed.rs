//! # Seed Data Generator
//!
//! Populates a Comptoir database with demo data for development.
//!
//! ## Usage
//! ```bash
//! # 20 customers (default)
//! cargo run -p comptoir-service --bin seed
//!
//! # Custom amount and database path
//! cargo run -p comptoir-service --bin seed -- --count 200 --db ./data/comptoir.db
//! ```
//!
//! ## Generated Data
//! - `USER` and `ADMIN` roles, one permission per CRM/catalog action
//! - Users `admin` and `demo` (password `comptoir-demo`)
//! - A two-level category tree with products under each leaf
//! - Customers with a default address and two contacts, the first primary

use std::env;
use std::time::Instant;

use comptoir_core::{
    AddressInput, CategoryInput, ContactInput, ContactPriority, CustomerInput, NewUser,
    PermissionInput, ProductInput,
};
use comptoir_service::{init_tracing, AppConfig, Comptoir};

/// Root category, then its children with product names.
const CATALOG: &[(&str, &[(&str, &[&str])])] = &[
    (
        "Boissons",
        &[
            ("Sodas", &["Cola", "Limonade", "Tonic", "Orangina"]),
            ("Eaux", &["Eau plate", "Eau gazeuse", "Eau aromatisée"]),
            ("Jus", &["Jus d'orange", "Jus de pomme", "Nectar abricot"]),
        ],
    ),
    (
        "Épicerie",
        &[
            ("Pâtes", &["Spaghetti", "Penne", "Tagliatelle"]),
            ("Conserves", &["Petits pois", "Ratatouille", "Thon"]),
        ],
    ),
    (
        "Services",
        &[("Livraison", &["Livraison standard", "Livraison express"])],
    ),
];

const COMPANIES: &[&str] = &[
    "Boulangerie", "Brasserie", "Épicerie", "Pharmacie", "Librairie", "Fromagerie", "Garage",
    "Fleuriste",
];

const CITIES: &[(&str, &str)] = &[
    ("75001", "Paris"),
    ("69002", "Lyon"),
    ("13001", "Marseille"),
    ("31000", "Toulouse"),
    ("44000", "Nantes"),
    ("33000", "Bordeaux"),
];

const FIRST_NAMES: &[&str] = &["Jean", "Marie", "Pierre", "Sophie", "Luc", "Claire", "Paul", "Julie"];
const LAST_NAMES: &[&str] = &["Martin", "Bernard", "Dubois", "Thomas", "Robert", "Richard", "Petit"];

/// VAT rates in basis points
const VAT_RATES: &[u32] = &[550, 1000, 2000];

const DEMO_PASSWORD: &str = "comptoir-demo";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut config = AppConfig::load()?;
    let mut count: usize = 20;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(20);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Comptoir Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of customers to generate (default: 20)");
                println!("  -d, --db <PATH>    Database file path (default: ./comptoir.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    init_tracing(&config);

    println!("Comptoir Seed Data Generator");
    println!("============================");
    println!("Database:  {}", config.database_path.display());
    println!("Customers: {}", count);
    println!();

    let app = Comptoir::open(&config).await?;
    println!("✓ Connected to database, migrations applied");

    let existing = app.users.count_users().await?;
    if existing > 0 {
        println!("⚠ Database already has {} users", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = Instant::now();

    seed_access(&app).await?;
    println!("✓ Roles, permissions and users created");

    let products = seed_catalog(&app).await?;
    println!("✓ Catalog created ({} products)", products);

    for n in 0..count {
        seed_customer(&app, n).await?;
        if (n + 1) % 50 == 0 {
            println!("  Generated {} customers...", n + 1);
        }
    }
    println!("✓ Generated {} customers in {:?}", count, start.elapsed());

    let counts = app.customers.counts().await?;
    let contacts = app.contacts.counts().await?;
    println!();
    println!("  Customers: {} ({} active)", counts.total, counts.active);
    println!("  Contacts:  {}", contacts.total);
    println!();
    println!("✓ Seed complete!");

    app.close().await;
    Ok(())
}

async fn seed_access(app: &Comptoir) -> Result<(), Box<dyn std::error::Error>> {
    app.users
        .create_role("USER", Some("Standard account".to_string()))
        .await?;
    app.users
        .create_role("ADMIN", Some("Full access".to_string()))
        .await?;

    for module in ["CATALOG", "CRM"] {
        for action in ["READ", "WRITE"] {
            let name = format!("{module}_{action}");
            app.users
                .create_permission(PermissionInput {
                    name: name.clone(),
                    module: module.to_string(),
                    action: action.to_string(),
                    resource: None,
                })
                .await?;
            app.users.grant_permission("ADMIN", &name).await?;
            if action == "READ" {
                app.users.grant_permission("USER", &name).await?;
            }
        }
    }

    for username in ["admin", "demo"] {
        let user = app
            .users
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{username}@comptoir.local"),
                password: DEMO_PASSWORD.to_string(),
                first_name: None,
                last_name: None,
            })
            .await?;
        if username == "admin" {
            app.users.assign_role(&user.id, "ADMIN").await?;
        }
    }
    Ok(())
}

async fn seed_catalog(app: &Comptoir) -> Result<usize, Box<dyn std::error::Error>> {
    let mut created = 0;
    for (root_name, children) in CATALOG {
        let root = app.categories.create(CategoryInput::named(*root_name)).await?;
        for (child_name, products) in children.iter() {
            let child = app
                .categories
                .create(CategoryInput::named(*child_name).under(&root.id))
                .await?;
            for name in products.iter() {
                app.products.create(generate_product(name, &child.id, created)).await?;
                created += 1;
            }
        }
    }
    Ok(created)
}

/// Product with a deterministic price, VAT rate and stock level.
fn generate_product(name: &str, category_id: &str, seed: usize) -> ProductInput {
    let price_cents = 99 + ((seed * 37) % 900) as i64;
    let mut product = ProductInput::new(name, category_id, price_cents);
    product.sku = Some(format!("SKU-{:05}", seed + 1));
    product.cost_price_cents = Some(price_cents * (55 + (seed % 20) as i64) / 100);
    product.vat_rate_bps = VAT_RATES[seed % VAT_RATES.len()];
    if !name.starts_with("Livraison") {
        product.stock_managed = true;
        product.stock_quantity = (seed % 40) as i32;
        product.min_stock_level = 5;
        product.max_stock_level = 100;
    }
    product
}

async fn seed_customer(app: &Comptoir, n: usize) -> Result<(), Box<dyn std::error::Error>> {
    let (zip_code, city) = CITIES[n % CITIES.len()];
    let company = format!("{} {} {}", COMPANIES[n % COMPANIES.len()], city, n + 1);

    let customer = app
        .customers
        .create(CustomerInput {
            email: Some(format!("contact{}@client.example", n + 1)),
            addresses: vec![
                AddressInput::new(format!("{} rue de la République", n + 1), zip_code, city).as_default(),
            ],
            ..CustomerInput::new(company)
        })
        .await?;

    for k in 0..2 {
        let first = FIRST_NAMES[(n + k) % FIRST_NAMES.len()];
        let last = LAST_NAMES[(n * 3 + k) % LAST_NAMES.len()];
        let mut contact = ContactInput::new(&customer.id, first);
        contact.last_name = Some(last.to_string());
        contact.email = Some(format!(
            "{}.{}.{}@client.example",
            first.to_lowercase(),
            last.to_lowercase(),
            n * 2 + k
        ));
        if k == 0 {
            contact = contact.primary();
            contact.is_decision_maker = true;
            contact.job_title = Some("Gérant".to_string());
            contact.priority = ContactPriority::High;
        }
        app.contacts.create(contact).await?;
    }
    Ok(())
}

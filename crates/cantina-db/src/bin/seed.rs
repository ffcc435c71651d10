//! # Seed Data Generator
//!
//! Populates a database with a demo cantina for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p cantina-db --bin seed
//!
//! # Specify database path and number of families
//! cargo run -p cantina-db --bin seed -- --db ./data/cantina.db --families 40
//! ```
//!
//! ## Generated Data
//! - Operators: `admin`, `cajero1`, `cajero2` and one guardian per family
//! - Stations: `CAJA-1`, `CAJA-2`
//! - Payment methods: the built-ins plus `transferencia` and `pos` (3.5%)
//! - Catalog: snacks, drinks and lunches, some without stock control
//! - Children: one or two per family, each with a card and a balance

use std::env;

use cantina_core::{Money, UserRole};
use cantina_db::{
    Database, DbConfig, NewChild, NewOperator, NewPaymentMethod, NewProduct,
};

/// (category, [(code, name, price, cost, stock or None for unlimited)])
#[allow(clippy::type_complexity)]
const CATALOG: &[(&str, &[(&str, &str, i64, i64, Option<i64>)])] = &[
    (
        "Snacks",
        &[
            ("EMP-01", "Empanada de carne", 5_000, 3_000, Some(40)),
            ("EMP-02", "Empanada de pollo", 5_000, 2_800, Some(40)),
            ("CHI-01", "Chipa", 3_000, 1_500, Some(60)),
            ("MBJ-01", "Mbejú", 4_000, 2_000, Some(25)),
            ("SAN-01", "Sándwich de jamón y queso", 7_000, 4_000, Some(20)),
            ("GAL-01", "Galletitas", 3_500, 2_000, Some(50)),
            ("ALF-01", "Alfajor", 4_000, 2_200, Some(30)),
        ],
    ),
    (
        "Bebidas",
        &[
            ("AGUA", "Agua mineral 500ml", 2_500, 1_200, Some(80)),
            ("JUG-01", "Jugo de naranja", 3_000, 1_500, Some(30)),
            ("GAS-01", "Gaseosa 500ml", 5_000, 3_000, Some(48)),
            ("COC-01", "Cocido con leche", 3_000, 800, None),
            ("TER-01", "Tereré", 2_000, 500, None),
        ],
    ),
    (
        "Almuerzos",
        &[
            ("ALM-01", "Menú del día", 18_000, 10_000, None),
            ("ALM-02", "Milanesa con puré", 20_000, 12_000, None),
            ("ENS-01", "Ensalada de frutas", 8_000, 4_500, Some(12)),
        ],
    ),
];

const FIRST_NAMES: &[&str] = &[
    "Lucía", "Mateo", "Sofía", "Santiago", "Valentina", "Benjamín", "Camila", "Thiago",
    "Martina", "Joaquín", "Isabella", "Lautaro",
];

const LAST_NAMES: &[&str] = &[
    "Benítez", "González", "Martínez", "Giménez", "Ramírez", "Acosta", "Duarte", "Villalba",
    "Ortiz", "Cáceres",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut families: usize = 20;
    let mut db_path = String::from("./cantina_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--families" | "-f" => {
                if i + 1 < args.len() {
                    families = args[i + 1].parse().unwrap_or(20);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Cantina POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -f, --families <N>  Number of families to generate (default: 20)");
                println!("  -d, --db <PATH>     Database file path (default: ./cantina_dev.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Cantina POS Seed Data Generator");
    println!("==================================");
    println!("Database: {}", db_path);
    println!("Families: {}", families);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Staff
    let families_repo = db.families();
    let admin = families_repo
        .create_operator(staff("admin", "Administración", UserRole::Administrator))
        .await?;
    let cashier = families_repo
        .create_operator(staff("cajero1", "Ana Cajera", UserRole::Cashier))
        .await?;
    families_repo
        .create_operator(staff("cajero2", "Pedro Cajero", UserRole::Cashier))
        .await?;
    println!("✓ Staff created");

    // Stations and methods
    let stations = db.stations();
    stations.create_station("CAJA-1", "Caja principal", Some("Patio central")).await?;
    stations.create_station("CAJA-2", "Caja comedor", Some("Comedor")).await?;
    stations.assign_cashier("CAJA-1", &cashier).await?;
    stations
        .create_payment_method(NewPaymentMethod {
            code: "transferencia".to_string(),
            name: "Transferencia bancaria".to_string(),
            commission_bps: 0,
            issues_invoice: true,
            sort_order: 2,
        })
        .await?;
    stations
        .create_payment_method(NewPaymentMethod {
            code: "pos".to_string(),
            name: "Tarjeta de débito/crédito".to_string(),
            commission_bps: 350,
            issues_invoice: true,
            sort_order: 3,
        })
        .await?;
    println!("✓ Stations and payment methods created");

    // Catalog
    let products = db.products();
    let mut product_count = 0;
    for (category_name, items) in CATALOG {
        let category = products.create_category(category_name, None).await?;
        for (code, name, price, cost, stock) in items.iter() {
            let mut new = NewProduct::new(*code, *name, Money::from_guaranies(*price));
            new.category_id = Some(category.id.clone());
            new.cost = Money::from_guaranies(*cost);
            match stock {
                Some(stock) => {
                    new.initial_stock = *stock;
                    new.min_stock = (*stock / 5).max(3);
                    new.max_stock = stock * 3;
                }
                None => new.requires_stock = false,
            }
            if let Err(e) = products.insert(new, Some(&admin.id)).await {
                eprintln!("Failed to insert {}: {}", code, e);
                continue;
            }
            product_count += 1;
        }
    }
    println!("✓ {} products in {} categories", product_count, CATALOG.len());

    // Families
    let cards = db.cards();
    let mut children = 0;
    for f in 0..families {
        let last = LAST_NAMES[f % LAST_NAMES.len()];
        let guardian = families_repo
            .create_operator(NewOperator {
                username: format!("familia{:03}", f + 1),
                full_name: format!("Familia {}", last),
                role: UserRole::Guardian,
                phone: Some(format!("+5959{:08}", 81_000_000 + f)),
                national_id: None,
            })
            .await?;

        let kids = 1 + f % 2;
        for k in 0..kids {
            let first = FIRST_NAMES[(f * 2 + k) % FIRST_NAMES.len()];
            let child = families_repo
                .create_child(NewChild {
                    guardian_id: guardian.id.clone(),
                    full_name: format!("{} {}", first, last),
                    grade: Some(format!("{}° grado", 1 + (f + k) % 9)),
                    section: Some(if k == 0 { "A" } else { "B" }.to_string()),
                })
                .await?;

            cards.assign_card(&child.id, None, None, &guardian).await?;
            let amount = Money::from_guaranies(10_000 * (1 + ((f + k) % 10) as i64));
            cards
                .recharge(&child.id, amount, &guardian, Some("Carga inicial"))
                .await?;
            if f % 5 == 0 {
                families_repo
                    .set_overdraft(&child.id, true, Money::from_guaranies(15_000))
                    .await?;
            }
            children += 1;
        }
    }
    println!("✓ {} families, {} children with cards", families, children);

    println!();
    println!("Verifying search...");
    let hits = products.search("empa", 10).await?;
    println!("  Search 'empa': {} results", hits.len());
    let hits = families_repo.search_cards("5555", 10).await?;
    println!("  Search '5555': {} cards", hits.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn staff(username: &str, full_name: &str, role: UserRole) -> NewOperator {
    NewOperator {
        username: username.to_string(),
        full_name: full_name.to_string(),
        role,
        phone: None,
        national_id: None,
    }
}

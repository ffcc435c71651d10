//! Several registers hitting one database file at once.
//!
//! Uses a real WAL file in a temp dir so the pool holds more than one
//! connection and the guarded updates race for real.

use std::time::Duration;

use cantina_core::tender::Tender;
use cantina_core::{CoreError, InvoiceKind, Money, Operator, UserRole};
use cantina_db::{
    CheckoutLine, CheckoutRequest, CustomerInfo, Database, DbConfig, DbError, NewChild,
    NewOperator, NewProduct,
};
use tempfile::TempDir;

struct Cantina {
    _dir: TempDir,
    db: Database,
    admin: Operator,
    cashier: Operator,
    guardian: Operator,
}

async fn cantina() -> Cantina {
    let dir = TempDir::new().unwrap();
    let config = DbConfig::new(dir.path().join("cantina.db"))
        .max_connections(8)
        .busy_timeout(Duration::from_secs(30));
    let db = Database::new(config).await.unwrap();

    let families = db.families();
    let make = |username: &str, role| NewOperator {
        username: username.to_string(),
        full_name: username.to_string(),
        role,
        phone: None,
        national_id: None,
    };
    let admin = families.create_operator(make("admin", UserRole::Administrator)).await.unwrap();
    let cashier = families.create_operator(make("cajera", UserRole::Cashier)).await.unwrap();
    let guardian = families.create_operator(make("papa", UserRole::Guardian)).await.unwrap();

    let products = db.products();
    let mut emp = NewProduct::new("EMP-01", "Empanada", Money::from_guaranies(5_000));
    emp.initial_stock = 100;
    products.insert(emp, Some(&admin.id)).await.unwrap();
    let mut jugo = NewProduct::new("JUG-01", "Jugo", Money::from_guaranies(3_000));
    jugo.initial_stock = 3;
    products.insert(jugo, Some(&admin.id)).await.unwrap();

    db.stations()
        .create_station("CAJA-1", "Caja principal", None)
        .await
        .unwrap();
    db.stations().assign_cashier("CAJA-1", &cashier).await.unwrap();

    Cantina {
        _dir: dir,
        db,
        admin,
        cashier,
        guardian,
    }
}

impl Cantina {
    async fn funded_child(&self, name: &str, guaranies: i64) -> String {
        let child = self
            .db
            .families()
            .create_child(NewChild {
                guardian_id: self.guardian.id.clone(),
                full_name: name.to_string(),
                grade: None,
                section: None,
            })
            .await
            .unwrap();
        self.db
            .cards()
            .assign_card(&child.id, None, None, &self.guardian)
            .await
            .unwrap();
        self.db
            .cards()
            .recharge(&child.id, Money::from_guaranies(guaranies), &self.cashier, None)
            .await
            .unwrap();
        child.id
    }

    fn request(&self, code: &str, child_id: Option<&str>, tender: Tender) -> CheckoutRequest {
        CheckoutRequest {
            station_code: "CAJA-1".to_string(),
            cashier_id: self.cashier.id.clone(),
            child_id: child_id.map(str::to_string),
            customer_name: None,
            lines: vec![CheckoutLine::new(code, 1)],
            tender,
            invoice: None,
            note: None,
        }
    }
}

async fn run_all(db: &Database, requests: Vec<CheckoutRequest>) -> (usize, Vec<DbError>) {
    let handles: Vec<_> = requests
        .into_iter()
        .map(|request| {
            let db = db.clone();
            tokio::spawn(async move { db.checkout(request).await })
        })
        .collect();

    let mut ok = 0;
    let mut errors = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => errors.push(e),
        }
    }
    (ok, errors)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_card_purchases_never_overspend() {
    let c = cantina().await;
    let child_id = c.funded_child("Sofía", 20_000).await;

    let requests = (0..10)
        .map(|_| c.request("EMP-01", Some(&child_id), Tender::Card))
        .collect();
    let (ok, errors) = run_all(&c.db, requests).await;

    assert_eq!(ok, 4);
    assert_eq!(errors.len(), 6);
    assert!(errors.iter().all(|e| matches!(
        e,
        DbError::Core(CoreError::InsufficientBalance { .. })
    )));

    let child = c.db.families().get_child(&child_id).await.unwrap().unwrap();
    assert_eq!(child.balance_cents, 0);
    assert!(c.db.cards().ledger_is_consistent(&child_id).await.unwrap());

    let sales = c.db.sales().list_for_child(&child_id, 50).await.unwrap();
    assert_eq!(sales.len(), 4);
    let emp = c.db.products().get_by_code("EMP-01").await.unwrap().unwrap();
    assert_eq!(emp.stock, 96);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_purchases_stop_at_the_overdraft_floor() {
    let c = cantina().await;
    let child_id = c.funded_child("Mateo", 20_000).await;
    c.db.families()
        .set_overdraft(&child_id, true, Money::from_guaranies(10_000))
        .await
        .unwrap();

    let requests = (0..10)
        .map(|_| c.request("EMP-01", Some(&child_id), Tender::Card))
        .collect();
    let (ok, _) = run_all(&c.db, requests).await;

    assert_eq!(ok, 6);
    let child = c.db.families().get_child(&child_id).await.unwrap().unwrap();
    assert_eq!(child.balance_cents, Money::from_guaranies(-10_000).cents());
    assert!(c.db.cards().ledger_is_consistent(&child_id).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stock_decrements_never_go_negative() {
    let c = cantina().await;

    let requests = (0..8)
        .map(|_| {
            c.request(
                "JUG-01",
                None,
                Tender::Cash {
                    received: Money::from_guaranies(5_000),
                },
            )
        })
        .collect();
    let (ok, errors) = run_all(&c.db, requests).await;

    assert_eq!(ok, 3);
    assert!(errors
        .iter()
        .all(|e| matches!(e, DbError::Core(CoreError::InsufficientStock { .. }))));
    let jugo = c.db.products().get_by_code("JUG-01").await.unwrap().unwrap();
    assert_eq!(jugo.stock, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_invoices_get_gap_free_numbers() {
    let c = cantina().await;

    let mut sale_ids = Vec::new();
    for _ in 0..8 {
        let receipt = c
            .db
            .checkout(c.request(
                "EMP-01",
                None,
                Tender::Cash {
                    received: Money::from_guaranies(5_000),
                },
            ))
            .await
            .unwrap();
        sale_ids.push(receipt.sale.id);
    }

    let handles: Vec<_> = sale_ids
        .into_iter()
        .map(|sale_id| {
            let db = c.db.clone();
            let cashier = c.cashier.clone();
            tokio::spawn(async move {
                db.invoices()
                    .generate(&sale_id, InvoiceKind::Receipt, CustomerInfo::default(), &cashier)
                    .await
            })
        })
        .collect();

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap().unwrap().number);
    }
    numbers.sort();

    let expected: Vec<String> = (1..=8).map(|n| format!("BOL-{n:06}")).collect();
    assert_eq!(numbers, expected);

    let config = c.db.invoices().billing_config().await.unwrap();
    assert_eq!(config.next_receipt_number, 9);
    assert_eq!(config.next_invoice_number, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn recharges_racing_purchases_keep_the_ledger_consistent() {
    let c = cantina().await;
    let child_id = c.funded_child("Camila", 10_000).await;

    let mut handles = Vec::new();
    for i in 0..12 {
        let db = c.db.clone();
        if i % 3 == 0 {
            let child_id = child_id.clone();
            let admin = c.admin.clone();
            handles.push(tokio::spawn(async move {
                db.cards()
                    .recharge(&child_id, Money::from_guaranies(5_000), &admin, None)
                    .await
                    .map(|_| ())
            }));
        } else {
            let request = c.request("EMP-01", Some(&child_id), Tender::Card);
            handles.push(tokio::spawn(async move { db.checkout(request).await.map(|_| ()) }));
        }
    }
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) | Err(DbError::Core(CoreError::InsufficientBalance { .. })) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    let child = c.db.families().get_child(&child_id).await.unwrap().unwrap();
    assert!(child.balance_cents >= 0);
    assert!(c.db.cards().ledger_is_consistent(&child_id).await.unwrap());
}

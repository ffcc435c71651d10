//! End-to-end runs of the `cantina` binary against a temp database.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use cantina_core::{Money, UserRole};
use cantina_db::{Database, DbConfig, NewChild, NewOperator, NewProduct};
use predicates::prelude::*;
use tempfile::TempDir;

struct Demo {
    dir: TempDir,
    card: String,
}

impl Demo {
    fn db_path(&self) -> PathBuf {
        self.dir.path().join("cantina.db")
    }

    fn cantina(&self, operator: Option<&str>) -> Command {
        let mut cmd = Command::cargo_bin("cantina").unwrap();
        cmd.current_dir(self.dir.path())
            .env_remove("CANTINA_OPERATOR")
            .env_remove("CANTINA_DATABASE_PATH")
            .env_remove("CANTINA_STATION_CODE")
            .env("RUST_LOG", "error")
            .arg("--db")
            .arg(self.db_path());
        if let Some(operator) = operator {
            cmd.arg("--operator").arg(operator);
        }
        cmd
    }
}

async fn populate(path: &Path) -> String {
    let db = Database::new(DbConfig::new(path)).await.unwrap();
    let families = db.families();
    let staff = |username: &str, role| NewOperator {
        username: username.to_string(),
        full_name: username.to_string(),
        role,
        phone: None,
        national_id: None,
    };
    families.create_operator(staff("admin", UserRole::Administrator)).await.unwrap();
    let cashier = families.create_operator(staff("cajera", UserRole::Cashier)).await.unwrap();
    let guardian = families.create_operator(staff("mama", UserRole::Guardian)).await.unwrap();

    let mut emp = NewProduct::new("EMP-01", "Empanada de carne", Money::from_guaranies(5_000));
    emp.initial_stock = 10;
    db.products().insert(emp, None).await.unwrap();

    db.stations().create_station("CAJA-1", "Caja principal", None).await.unwrap();
    db.stations().assign_cashier("CAJA-1", &cashier).await.unwrap();

    let child = families
        .create_child(NewChild {
            guardian_id: guardian.id.clone(),
            full_name: "Lucía Benítez".to_string(),
            grade: None,
            section: None,
        })
        .await
        .unwrap();
    let child = db.cards().assign_card(&child.id, None, None, &guardian).await.unwrap();
    db.cards()
        .recharge(&child.id, Money::from_guaranies(8_000), &guardian, None)
        .await
        .unwrap();

    db.close().await;
    child.card_number.unwrap()
}

fn demo() -> Demo {
    let dir = TempDir::new().unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let card = runtime.block_on(populate(&dir.path().join("cantina.db")));
    Demo { dir, card }
}

#[test]
fn migrate_reports_a_healthy_schema() {
    let dir = TempDir::new().unwrap();
    Command::cargo_bin("cantina")
        .unwrap()
        .current_dir(dir.path())
        .env("RUST_LOG", "error")
        .args(["--db", "fresh.db", "migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""healthy": true"#));
}

#[test]
fn search_product_finds_by_name() {
    let demo = demo();
    demo.cantina(None)
        .args(["search-product", "empa"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EMP-01"));
}

#[test]
fn card_sale_then_insufficient_balance() {
    let demo = demo();

    demo.cantina(Some("cajera"))
        .args(["sell", "--card", &demo.card, "--item", "EMP-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""balance_after": 300000"#))
        .stdout(predicate::str::contains(r#""store": "Cantina Escolar""#));

    demo.cantina(Some("cajera"))
        .args(["sell", "--card", &demo.card, "--item", "EMP-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(r#""code":"INSUFFICIENT_BALANCE""#));
}

#[test]
fn commands_without_operator_fail_with_config_error() {
    let demo = demo();
    demo.cantina(None)
        .args(["recharge", "--card", &demo.card, "--amount", "5000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(r#""code":"CONFIG_ERROR""#));
}

#[test]
fn guardians_cannot_read_sales_reports() {
    let demo = demo();
    demo.cantina(Some("mama"))
        .args(["report", "best-sellers"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(r#""code":"FORBIDDEN""#));
}

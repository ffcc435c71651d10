//! Shared fixture for the repository tests.

use cantina_core::{CashierStation, Child, Money, Operator, UserRole};

use crate::pool::{Database, DbConfig};
use crate::repository::family::{NewChild, NewOperator};
use crate::repository::product::NewProduct;

/// A cantina with one register, three operators and a funded card.
///
/// Catalog:
/// - `EMP-01` Empanada de carne, Gs. 5.000 (cost 3.000), stock 10, min 3
/// - `JUG-01` Jugo de naranja, Gs. 3.000 (cost 1.500), stock 4, min 5
/// - `AGUA` Agua mineral, Gs. 2.500, no stock control
pub(crate) struct Fixture {
    pub db: Database,
    pub admin: Operator,
    pub cashier: Operator,
    pub guardian: Operator,
    /// Card assigned, balance Gs. 20.000, no overdraft.
    pub child: Child,
    /// `CAJA-1`, cashier attached.
    pub station: CashierStation,
}

impl Fixture {
    /// Another child of the fixture guardian, without a card.
    pub async fn new_child(&self, name: &str) -> Child {
        self.db
            .families()
            .create_child(NewChild {
                guardian_id: self.guardian.id.clone(),
                full_name: name.to_string(),
                grade: Some("3er grado".to_string()),
                section: Some("A".to_string()),
            })
            .await
            .unwrap()
    }
}

pub(crate) async fn operator(db: &Database, username: &str, role: UserRole) -> Operator {
    db.families()
        .create_operator(NewOperator {
            username: username.to_string(),
            full_name: format!("{username} de prueba"),
            role,
            phone: None,
            national_id: None,
        })
        .await
        .unwrap()
}

pub(crate) async fn fixture() -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let admin = operator(&db, "admin", UserRole::Administrator).await;
    let cashier = operator(&db, "cajera", UserRole::Cashier).await;
    let guardian = operator(&db, "mama", UserRole::Guardian).await;

    let products = db.products();
    let mut emp = NewProduct::new("EMP-01", "Empanada de carne", Money::from_guaranies(5_000));
    emp.cost = Money::from_guaranies(3_000);
    emp.initial_stock = 10;
    emp.min_stock = 3;
    products.insert(emp, Some(&admin.id)).await.unwrap();

    let mut jugo = NewProduct::new("JUG-01", "Jugo de naranja", Money::from_guaranies(3_000));
    jugo.cost = Money::from_guaranies(1_500);
    jugo.initial_stock = 4;
    jugo.min_stock = 5;
    products.insert(jugo, Some(&admin.id)).await.unwrap();

    let mut agua = NewProduct::new("AGUA", "Agua mineral", Money::from_guaranies(2_500));
    agua.requires_stock = false;
    products.insert(agua, Some(&admin.id)).await.unwrap();

    let stations = db.stations();
    stations.create_station("CAJA-1", "Caja principal", Some("Patio")).await.unwrap();
    let station = stations.assign_cashier("CAJA-1", &cashier).await.unwrap();

    let child = db
        .families()
        .create_child(NewChild {
            guardian_id: guardian.id.clone(),
            full_name: "Lucía Benítez".to_string(),
            grade: Some("5to grado".to_string()),
            section: Some("B".to_string()),
        })
        .await
        .unwrap();
    db.cards()
        .assign_card(&child.id, None, None, &guardian)
        .await
        .unwrap();
    db.cards()
        .recharge(&child.id, Money::from_guaranies(20_000), &cashier, None)
        .await
        .unwrap();
    let child = db.families().get_child(&child.id).await.unwrap().unwrap();

    Fixture {
        db,
        admin,
        cashier,
        guardian,
        child,
        station,
    }
}

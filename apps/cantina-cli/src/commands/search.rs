//! Register lookups.

use cantina_core::inventory::margin_percent;
use cantina_core::{Child, Money, Product};
use serde::Serialize;

use super::{output, CommandResult, Session};

/// What the register shows for a card hit. The security code stays hidden.
#[derive(Debug, Serialize)]
struct CardHit {
    child_id: String,
    full_name: String,
    grade: Option<String>,
    section: Option<String>,
    card: String,
    masked: String,
    balance: Money,
    available: Money,
}

impl From<Child> for CardHit {
    fn from(child: Child) -> Self {
        CardHit {
            card: child.formatted_card_number().unwrap_or_default(),
            masked: child.masked_card_number().unwrap_or_default(),
            balance: child.balance(),
            available: child.balance_policy().available(),
            child_id: child.id,
            full_name: child.full_name,
            grade: child.grade,
            section: child.section,
        }
    }
}

pub async fn search_card(session: &Session, query: &str, limit: u32) -> CommandResult {
    let hits: Vec<CardHit> = session
        .db
        .families()
        .search_cards(query, limit)
        .await?
        .into_iter()
        .map(CardHit::from)
        .collect();
    output(&hits)
}

#[derive(Debug, Serialize)]
struct ProductHit {
    label: String,
    margin_percent: Option<f64>,
    #[serde(flatten)]
    product: Product,
}

pub async fn search_product(session: &Session, query: &str, limit: u32) -> CommandResult {
    let hits: Vec<ProductHit> = session
        .db
        .products()
        .search(query, limit)
        .await?
        .into_iter()
        .map(|product| ProductHit {
            label: product.search_label(),
            margin_percent: margin_percent(product.cost(), product.price()),
            product,
        })
        .collect();
    output(&hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_card_hit_hides_the_security_code() {
        let now = Utc::now();
        let child = Child {
            id: "c1".to_string(),
            guardian_id: "g1".to_string(),
            full_name: "Ana Benítez".to_string(),
            grade: None,
            section: None,
            card_number: Some("5555123456789012".to_string()),
            security_code: Some("4821".to_string()),
            card_active: true,
            card_assigned_at: Some(now),
            balance_cents: Money::from_guaranies(12_000).cents(),
            allow_negative: false,
            negative_limit_cents: 0,
            active: true,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&CardHit::from(child)).unwrap();
        assert!(json.contains("5555-****-****-9012"));
        assert!(!json.contains("4821"));
        assert!(!json.contains("security_code"));
    }
}

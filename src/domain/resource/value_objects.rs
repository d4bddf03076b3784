use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Resource Value Objects
// ============================================================================

/// Saved pickup/delivery address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: Uuid,
    pub label: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub is_default: bool,
}

/// Address as entered by the user, before the backend assigns an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAddress {
    pub label: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub is_default: bool,
}

impl Address {
    /// One-line rendering used in order summaries
    pub fn one_line(&self) -> String {
        format!("{}, {}, {} {}", self.street, self.city, self.state, self.zip_code)
    }
}

/// Kind of saved payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    Card,
    Paypal,
    ApplePay,
    GooglePay,
}

impl PaymentMethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodKind::Card => "card",
            PaymentMethodKind::Paypal => "paypal",
            PaymentMethodKind::ApplePay => "apple_pay",
            PaymentMethodKind::GooglePay => "google_pay",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "card" => Some(PaymentMethodKind::Card),
            "paypal" => Some(PaymentMethodKind::Paypal),
            "apple_pay" => Some(PaymentMethodKind::ApplePay),
            "google_pay" => Some(PaymentMethodKind::GooglePay),
            _ => None,
        }
    }
}

/// Card expiry month/year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardExpiry {
    pub month: u8,
    pub year: u16,
}

impl std::fmt::Display for CardExpiry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}/{:02}", self.month, self.year % 100)
    }
}

/// Saved payment method. Opaque reference; nothing here can charge it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub kind: PaymentMethodKind,
    pub last_four: Option<String>,
    pub card_brand: Option<String>,
    pub expiry: Option<CardExpiry>,
    pub is_default: bool,
}

/// Payment method as entered by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPaymentMethod {
    pub kind: PaymentMethodKind,
    pub last_four: Option<String>,
    pub card_brand: Option<String>,
    pub expiry: Option<CardExpiry>,
    pub is_default: bool,
}

impl PaymentMethod {
    /// Display label, e.g. "Visa •••• 4242" or "PayPal"
    pub fn display_name(&self) -> String {
        match (self.kind, &self.last_four) {
            (PaymentMethodKind::Card, Some(last_four)) => {
                let brand = self.card_brand.as_deref().unwrap_or("Card");
                format!("{} •••• {}", brand, last_four)
            }
            (PaymentMethodKind::Card, None) => "Card".to_string(),
            (PaymentMethodKind::Paypal, _) => "PayPal".to_string(),
            (PaymentMethodKind::ApplePay, _) => "Apple Pay".to_string(),
            (PaymentMethodKind::GooglePay, _) => "Google Pay".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_kind_wire_names() {
        for kind in [
            PaymentMethodKind::Card,
            PaymentMethodKind::Paypal,
            PaymentMethodKind::ApplePay,
            PaymentMethodKind::GooglePay,
        ] {
            assert_eq!(PaymentMethodKind::parse(kind.as_str()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(PaymentMethodKind::parse("bitcoin"), None);
    }

    #[test]
    fn test_display_name() {
        let card = PaymentMethod {
            id: Uuid::new_v4(),
            kind: PaymentMethodKind::Card,
            last_four: Some("4242".to_string()),
            card_brand: Some("Visa".to_string()),
            expiry: Some(CardExpiry { month: 3, year: 2028 }),
            is_default: true,
        };
        assert_eq!(card.display_name(), "Visa •••• 4242");
        assert_eq!(card.expiry.unwrap().to_string(), "03/28");

        let wallet = PaymentMethod {
            kind: PaymentMethodKind::GooglePay,
            last_four: None,
            card_brand: None,
            expiry: None,
            ..card
        };
        assert_eq!(wallet.display_name(), "Google Pay");
    }
}

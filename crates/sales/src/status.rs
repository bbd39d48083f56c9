use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tillpoint_core::DomainError;

/// Sale lifecycle. Only completed sales hold stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    #[default]
    Completed,
    Pending,
    Cancelled,
}

impl SaleStatus {
    pub const ALL: [SaleStatus; 3] = [SaleStatus::Completed, SaleStatus::Pending, SaleStatus::Cancelled];

    /// Status requested at checkout. Anything other than `pending` completes the sale.
    pub fn for_checkout(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("pending") => SaleStatus::Pending,
            _ => SaleStatus::Completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::Pending => "pending",
            SaleStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SaleStatus::Completed => "Completed",
            SaleStatus::Pending => "Pending",
            SaleStatus::Cancelled => "Cancelled",
        }
    }

    pub fn holds_stock(self) -> bool {
        matches!(self, SaleStatus::Completed)
    }
}

impl core::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" => Ok(SaleStatus::Completed),
            "pending" => Ok(SaleStatus::Pending),
            "cancelled" => Ok(SaleStatus::Cancelled),
            _ => Err(DomainError::validation("Invalid status")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    MobileMoney,
    BankTransfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::MobileMoney,
        PaymentMethod::BankTransfer,
    ];

    pub fn parse_or_cash(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::MobileMoney => "Mobile Money",
            PaymentMethod::BankTransfer => "Bank Transfer",
        }
    }
}

impl core::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::validation(format!("unknown payment method '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_status_falls_back_to_completed() {
        assert_eq!(SaleStatus::for_checkout(Some("pending")), SaleStatus::Pending);
        assert_eq!(SaleStatus::for_checkout(Some(" PENDING ")), SaleStatus::Pending);
        assert_eq!(SaleStatus::for_checkout(Some("cancelled")), SaleStatus::Completed);
        assert_eq!(SaleStatus::for_checkout(Some("layaway")), SaleStatus::Completed);
        assert_eq!(SaleStatus::for_checkout(None), SaleStatus::Completed);
    }

    #[test]
    fn explicit_status_parse_is_strict() {
        assert_eq!("Cancelled".parse::<SaleStatus>().unwrap(), SaleStatus::Cancelled);
        assert!("refunded".parse::<SaleStatus>().is_err());
    }

    #[test]
    fn payment_method_falls_back_to_cash() {
        assert_eq!(PaymentMethod::parse_or_cash(Some("mobile_money")), PaymentMethod::MobileMoney);
        assert_eq!(PaymentMethod::parse_or_cash(Some("bitcoin")), PaymentMethod::Cash);
        assert_eq!(PaymentMethod::parse_or_cash(None), PaymentMethod::Cash);
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&PaymentMethod::BankTransfer).unwrap();
        assert_eq!(json, "\"bank_transfer\"");
        let status: SaleStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(status, SaleStatus::Pending);
    }
}

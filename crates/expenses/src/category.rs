use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tillpoint_core::DomainError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Rent,
    Utilities,
    Supplies,
    Inventory,
    Maintenance,
    Marketing,
    Transportation,
    Insurance,
    Professional,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 10] = [
        ExpenseCategory::Rent,
        ExpenseCategory::Utilities,
        ExpenseCategory::Supplies,
        ExpenseCategory::Inventory,
        ExpenseCategory::Maintenance,
        ExpenseCategory::Marketing,
        ExpenseCategory::Transportation,
        ExpenseCategory::Insurance,
        ExpenseCategory::Professional,
        ExpenseCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExpenseCategory::Rent => "rent",
            ExpenseCategory::Utilities => "utilities",
            ExpenseCategory::Supplies => "supplies",
            ExpenseCategory::Inventory => "inventory",
            ExpenseCategory::Maintenance => "maintenance",
            ExpenseCategory::Marketing => "marketing",
            ExpenseCategory::Transportation => "transportation",
            ExpenseCategory::Insurance => "insurance",
            ExpenseCategory::Professional => "professional",
            ExpenseCategory::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExpenseCategory::Rent => "Rent",
            ExpenseCategory::Utilities => "Utilities",
            ExpenseCategory::Supplies => "Office Supplies",
            ExpenseCategory::Inventory => "Inventory Purchase",
            ExpenseCategory::Maintenance => "Maintenance & Repairs",
            ExpenseCategory::Marketing => "Marketing & Advertising",
            ExpenseCategory::Transportation => "Transportation",
            ExpenseCategory::Insurance => "Insurance",
            ExpenseCategory::Professional => "Professional Services",
            ExpenseCategory::Other => "Other",
        }
    }
}

impl core::fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExpenseCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::validation("invalid expense category"))
    }
}

//! Fixed product categories.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tillpoint_core::DomainError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Electronics,
    Clothing,
    Food,
    Beauty,
    Books,
    Home,
    Sports,
    Automotive,
    Toys,
    Health,
    Jewelry,
    Music,
    Pets,
    Office,
    Tools,
    Other,
}

impl Category {
    pub const ALL: [Category; 16] = [
        Category::Electronics,
        Category::Clothing,
        Category::Food,
        Category::Beauty,
        Category::Books,
        Category::Home,
        Category::Sports,
        Category::Automotive,
        Category::Toys,
        Category::Health,
        Category::Jewelry,
        Category::Music,
        Category::Pets,
        Category::Office,
        Category::Tools,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Electronics => "electronics",
            Category::Clothing => "clothing",
            Category::Food => "food",
            Category::Beauty => "beauty",
            Category::Books => "books",
            Category::Home => "home",
            Category::Sports => "sports",
            Category::Automotive => "automotive",
            Category::Toys => "toys",
            Category::Health => "health",
            Category::Jewelry => "jewelry",
            Category::Music => "music",
            Category::Pets => "pets",
            Category::Office => "office",
            Category::Tools => "tools",
            Category::Other => "other",
        }
    }

    /// First three letters, uppercased: `Electronics` → `ELE`.
    pub fn sku_prefix(self) -> String {
        self.as_str()[..3].to_ascii_uppercase()
    }
}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| DomainError::validation(format!("invalid category '{}'", s.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_three_upper_letters() {
        assert_eq!(Category::Electronics.sku_prefix(), "ELE");
        assert_eq!(Category::Pets.sku_prefix(), "PET");
        for c in Category::ALL {
            assert_eq!(c.sku_prefix().len(), 3);
        }
    }

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!(" Food ".parse::<Category>().unwrap(), Category::Food);
        assert!("groceries".parse::<Category>().is_err());
    }
}

//! Yearly invoice numbering: `INV2025000042`.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tillpoint_core::DomainError;

const PREFIX: &str = "INV";
const MAX_SEQUENCE: u32 = 999_999;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvoiceNumber {
    year: i32,
    sequence: u32,
}

impl InvoiceNumber {
    pub fn new(year: i32, sequence: u32) -> Result<Self, DomainError> {
        if !(1000..=9999).contains(&year) {
            return Err(DomainError::validation(format!("invoice year {year} out of range")));
        }
        if sequence == 0 || sequence > MAX_SEQUENCE {
            return Err(DomainError::validation(format!(
                "invoice sequence {sequence} out of range"
            )));
        }
        Ok(Self { year, sequence })
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn sequence(self) -> u32 {
        self.sequence
    }

    /// Next number for `year`, one past the highest already issued that year.
    ///
    /// Numbers from other years are ignored, so the sequence restarts at 1 every January.
    pub fn next_for<I>(year: i32, issued: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = InvoiceNumber>,
    {
        let highest = issued
            .into_iter()
            .filter(|n| n.year == year)
            .map(|n| n.sequence)
            .max()
            .unwrap_or(0);
        Self::new(year, highest + 1)
    }
}

impl core::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{PREFIX}{:04}{:06}", self.year, self.sequence)
    }
}

impl FromStr for InvoiceNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::validation(format!("malformed invoice number '{s}'"));
        let digits = s.strip_prefix(PREFIX).ok_or_else(invalid)?;
        if digits.len() != 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = digits[..4].parse().map_err(|_| invalid())?;
        let sequence = digits[4..].parse().map_err(|_| invalid())?;
        Self::new(year, sequence)
    }
}

impl Serialize for InvoiceNumber {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InvoiceNumber {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(s: &str) -> InvoiceNumber {
        s.parse().unwrap()
    }

    #[test]
    fn formats_with_padding() {
        assert_eq!(InvoiceNumber::new(2025, 42).unwrap().to_string(), "INV2025000042");
    }

    #[test]
    fn first_invoice_of_the_year_is_one() {
        let next = InvoiceNumber::next_for(2025, []).unwrap();
        assert_eq!(next.to_string(), "INV2025000001");
    }

    #[test]
    fn sequence_resets_per_year() {
        let issued = [inv("INV2024000317"), inv("INV2025000003"), inv("INV2025000001")];
        assert_eq!(InvoiceNumber::next_for(2025, issued).unwrap().sequence(), 4);
        assert_eq!(InvoiceNumber::next_for(2026, issued).unwrap().sequence(), 1);
    }

    #[test]
    fn rejects_malformed_text() {
        for bad in ["", "INV", "INV2025", "INV20250000AB", "XYZ2025000001", "INV2025000000"] {
            assert!(bad.parse::<InvoiceNumber>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn serializes_as_string() {
        let n = InvoiceNumber::new(2025, 7).unwrap();
        assert_eq!(serde_json::to_string(&n).unwrap(), "\"INV2025000007\"");
        let back: InvoiceNumber = serde_json::from_str("\"INV2025000007\"").unwrap();
        assert_eq!(back, n);
    }

    #[test]
    fn sequence_exhaustion_is_an_error() {
        let full = [InvoiceNumber::new(2025, 999_999).unwrap()];
        assert!(InvoiceNumber::next_for(2025, full).is_err());
    }
}

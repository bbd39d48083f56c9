//! Stock-keeping unit codes: category prefix plus a four-digit sequence.

use std::collections::HashSet;

use crate::category::Category;

/// Next free SKU for `category`, given every SKU already in the catalog.
///
/// The sequence continues from the highest numeric suffix under the same prefix;
/// suffixes that are not plain digits are ignored. If the candidate is taken
/// (say a hand-entered code) the number keeps climbing until it is free.
pub fn generate_sku<'a, I>(category: Category, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = category.sku_prefix();
    let taken: HashSet<&str> = existing.into_iter().collect();

    let highest = taken
        .iter()
        .filter_map(|sku| sku.strip_prefix(prefix.as_str()))
        .filter(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|rest| rest.parse::<u64>().ok())
        .max()
        .unwrap_or(0);

    let mut next = highest + 1;
    loop {
        let candidate = format!("{prefix}{next:04}");
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        next += 1;
    }
}

//! Fixed-size pages over an already ordered list.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based.
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub pages: usize,
}

impl<T> Page<T> {
    /// Cut page `page` out of `all`. Page 0 is read as page 1; a page past the
    /// end is empty but keeps the totals.
    pub fn of(all: Vec<T>, page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let page = page.max(1);
        let total = all.len();
        let items = all
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();
        Self {
            items,
            page,
            per_page,
            total,
            pages: total.div_ceil(per_page),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn slices_and_counts() {
        let p = Page::of((1..=45).collect::<Vec<_>>(), 3, 20);
        assert_eq!(p.items, vec![41, 42, 43, 44, 45]);
        assert_eq!(p.total, 45);
        assert_eq!(p.pages, 3);

        let first = Page::of((1..=45).collect::<Vec<_>>(), 0, 20);
        assert_eq!(first.page, 1);
        assert_eq!(first.items.len(), 20);

        let beyond = Page::of(vec![1, 2], 5, 20);
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.pages, 1);
    }

    proptest! {
        #[test]
        fn pages_partition_the_list(total in 0usize..200, per_page in 1usize..30) {
            let all: Vec<usize> = (0..total).collect();
            let pages = Page::of(all.clone(), 1, per_page).pages;
            let mut seen = Vec::new();
            for n in 1..=pages {
                let page = Page::of(all.clone(), n, per_page);
                prop_assert!(page.items.len() <= per_page);
                seen.extend(page.items);
            }
            prop_assert_eq!(seen, all);
        }
    }
}

//! Read-only reports over the projections.
//!
//! Every report takes an explicit [`DateRange`] (or `today`) so the numbers are
//! reproducible in tests. Dates are UTC calendar days; both ends are inclusive.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::Serialize;

use tillpoint_auth::{Role, UserId};
use tillpoint_core::money::percentage;
use tillpoint_core::{DomainError, DomainResult, Money, TenantId};
use tillpoint_expenses::ExpenseCategory;
use tillpoint_products::{Category, ProductId, UnitType};
use tillpoint_sales::{PaymentMethod, SaleStatus};

use crate::projections::{
    ExpenseFilter, ProductReadModel, Projections, SaleFilter, SaleReadModel,
};

pub const TOP_PRODUCTS: usize = 10;
pub const RECENT_SALES: usize = 5;
pub const LOW_STOCK_ROWS: usize = 10;
/// Default look-back of the expense summary, in days before today.
pub const EXPENSE_SUMMARY_DAYS: u64 = 30;

/// Monthly rows are added to the profit report past this many days.
const MONTHLY_AFTER_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> DomainResult<Self> {
        if start > end {
            return Err(DomainError::validation(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days` days before `today`, plus today.
    pub fn last_days(today: NaiveDate, days: u64) -> Self {
        let start = today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN);
        Self { start, end: today }
    }

    /// First of the month up to `today`.
    pub fn month_to_date(today: NaiveDate) -> Self {
        Self {
            start: today.with_day(1).unwrap_or(today),
            end: today,
        }
    }

    /// Resolve optional query bounds, falling back to the last `default_days`.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
        default_days: u64,
    ) -> DomainResult<Self> {
        let end = end.unwrap_or(today);
        match start {
            Some(start) => Self::new(start, end),
            None => Ok(Self::last_days(end, default_days)),
        }
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    fn sale_filter(&self, status: Option<SaleStatus>, clerk_id: Option<UserId>) -> SaleFilter {
        SaleFilter {
            status,
            clerk_id,
            from: Some(midnight(self.start)),
            until: self.end.succ_opt().map(midnight),
        }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn bump(acc: &mut Money, by: Money) {
    *acc = acc.checked_add(by).unwrap_or(Money::from_minor(u64::MAX));
}

// ---------------------------------------------------------------------------
// Sales summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSales {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u64,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClerkSales {
    pub clerk_id: UserId,
    pub username: String,
    pub total_sales: usize,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub total_sales: usize,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesSummary {
    pub range: DateRange,
    pub total_sales: usize,
    pub total_revenue: Money,
    pub average_sale: Money,
    pub top_products: Vec<ProductSales>,
    pub clerk_performance: Vec<ClerkSales>,
    pub daily: Vec<DailySales>,
}

// ---------------------------------------------------------------------------
// Breakdown and profits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitTypeSales {
    pub unit_type: UnitType,
    pub lines: usize,
    pub quantity: u64,
    pub revenue: Money,
    pub profit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentMethodSales {
    pub method: PaymentMethod,
    pub count: usize,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesBreakdown {
    pub range: DateRange,
    pub total_sales: usize,
    pub total_revenue: Money,
    pub by_unit_type: Vec<UnitTypeSales>,
    pub by_payment_method: Vec<PaymentMethodSales>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodProfit {
    /// `YYYY-MM-DD` for daily rows, `YYYY-MM` for monthly rows.
    pub period: String,
    pub revenue: Money,
    pub profit: i64,
    pub sales_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductProfit {
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub quantity: u64,
    pub revenue: Money,
    pub profit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitReport {
    pub range: DateRange,
    pub sales_count: usize,
    pub total_revenue: Money,
    pub total_profit: i64,
    pub total_cost: i64,
    /// Profit as a percentage of revenue.
    pub margin: f64,
    pub daily: Vec<PeriodProfit>,
    pub top_products: Vec<ProductProfit>,
    pub by_unit_type: Vec<UnitTypeSales>,
    /// Empty unless the range spans more than thirty days.
    pub monthly: Vec<PeriodProfit>,
}

// ---------------------------------------------------------------------------
// Catalog, expenses, dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStock {
    pub category: Category,
    pub products: usize,
    pub packs: f64,
    pub value: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogStats {
    pub product_count: usize,
    pub in_stock_count: usize,
    pub low_stock_count: usize,
    pub out_of_stock_count: usize,
    pub total_packs: f64,
    pub stock_value: Money,
    pub retail_value: Money,
    pub potential_profit: i64,
    pub by_category: Vec<CategoryStock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseCategoryTotal {
    pub category: ExpenseCategory,
    pub label: &'static str,
    pub count: usize,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyExpense {
    pub date: NaiveDate,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseSummary {
    pub range: DateRange,
    pub count: usize,
    pub total: Money,
    pub days_in_period: i64,
    pub daily_average: Money,
    pub by_category: Vec<ExpenseCategoryTotal>,
    pub daily: Vec<DailyExpense>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub today: NaiveDate,
    pub today_sales_count: usize,
    pub today_revenue: Money,
    pub recent_sales: Vec<SaleReadModel>,
    pub low_stock: Vec<ProductReadModel>,
    /// Present for managers and admins only.
    pub catalog: Option<CatalogStats>,
}

/// Report queries for one set of projections.
#[derive(Debug, Clone, Copy)]
pub struct Reports<'a> {
    projections: &'a Projections,
}

impl<'a> Reports<'a> {
    pub fn new(projections: &'a Projections) -> Self {
        Self { projections }
    }

    fn sales_in(&self, tenant_id: TenantId, range: DateRange, status: Option<SaleStatus>, clerk_id: Option<UserId>) -> Vec<SaleReadModel> {
        self.projections
            .sales
            .list(tenant_id, &range.sale_filter(status, clerk_id))
    }

    /// Every sale in the range regardless of status, optionally for one clerk.
    pub fn sales_summary(&self, tenant_id: TenantId, range: DateRange, clerk_id: Option<UserId>) -> SalesSummary {
        let sales = self.sales_in(tenant_id, range, None, clerk_id);

        let total_revenue: Money = sales.iter().map(|s| s.total).sum();
        let average_sale = total_revenue.split(sales.len() as u64);

        let mut products: HashMap<ProductId, ProductSales> = HashMap::new();
        let mut clerks: HashMap<UserId, ClerkSales> = HashMap::new();
        let mut daily: BTreeMap<NaiveDate, DailySales> = BTreeMap::new();

        for sale in &sales {
            for line in &sale.lines {
                let row = products.entry(line.product_id).or_insert_with(|| ProductSales {
                    product_id: line.product_id,
                    name: line.product_name.clone(),
                    quantity: 0,
                    revenue: Money::ZERO,
                });
                row.quantity += line.quantity;
                bump(&mut row.revenue, line.line_total);
            }

            let clerk = clerks.entry(sale.clerk_id).or_insert_with(|| ClerkSales {
                clerk_id: sale.clerk_id,
                username: sale.clerk_username.clone(),
                total_sales: 0,
                revenue: Money::ZERO,
            });
            clerk.total_sales += 1;
            bump(&mut clerk.revenue, sale.total);

            let date = sale.sale_date.date_naive();
            let day = daily.entry(date).or_insert(DailySales {
                date,
                total_sales: 0,
                revenue: Money::ZERO,
            });
            day.total_sales += 1;
            bump(&mut day.revenue, sale.total);
        }

        let mut top_products: Vec<_> = products.into_values().collect();
        top_products.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));
        top_products.truncate(TOP_PRODUCTS);

        let mut clerk_performance: Vec<_> = clerks.into_values().collect();
        clerk_performance.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.username.cmp(&b.username)));

        SalesSummary {
            range,
            total_sales: sales.len(),
            total_revenue,
            average_sale,
            top_products,
            clerk_performance,
            daily: daily.into_values().collect(),
        }
    }

    /// Completed sales grouped by unit type and by payment method.
    pub fn sales_breakdown(&self, tenant_id: TenantId, range: DateRange) -> SalesBreakdown {
        let sales = self.sales_in(tenant_id, range, Some(SaleStatus::Completed), None);

        let mut methods: BTreeMap<PaymentMethod, PaymentMethodSales> = BTreeMap::new();
        for sale in &sales {
            let row = methods.entry(sale.payment.method).or_insert(PaymentMethodSales {
                method: sale.payment.method,
                count: 0,
                total: Money::ZERO,
            });
            row.count += 1;
            bump(&mut row.total, sale.total);
        }

        SalesBreakdown {
            range,
            total_sales: sales.len(),
            total_revenue: sales.iter().map(|s| s.total).sum(),
            by_unit_type: by_unit_type(&sales),
            by_payment_method: methods.into_values().collect(),
        }
    }

    /// Revenue, profit and margin over completed sales.
    pub fn profits(&self, tenant_id: TenantId, range: DateRange) -> ProfitReport {
        let sales = self.sales_in(tenant_id, range, Some(SaleStatus::Completed), None);

        let total_revenue: Money = sales.iter().map(|s| s.total).sum();
        let total_profit: i64 = sales.iter().map(|s| s.total_profit).sum();
        let total_cost = total_revenue.minor() as i64 - total_profit;

        let mut products: HashMap<ProductId, ProductProfit> = HashMap::new();
        for line in sales.iter().flat_map(|s| s.lines.iter()) {
            let row = products.entry(line.product_id).or_insert_with(|| ProductProfit {
                product_id: line.product_id,
                name: line.product_name.clone(),
                sku: line.sku.clone(),
                quantity: 0,
                revenue: Money::ZERO,
                profit: 0,
            });
            row.quantity += line.quantity;
            bump(&mut row.revenue, line.line_total);
            row.profit += line.line_profit;
        }
        let mut top_products: Vec<_> = products.into_values().collect();
        top_products.sort_by(|a, b| b.profit.cmp(&a.profit).then_with(|| a.name.cmp(&b.name)));
        top_products.truncate(TOP_PRODUCTS);

        let daily = group_profit(&sales, |d| d.format("%Y-%m-%d").to_string());
        let monthly = if range.days() - 1 > MONTHLY_AFTER_DAYS {
            group_profit(&sales, |d| d.format("%Y-%m").to_string())
        } else {
            Vec::new()
        };

        ProfitReport {
            range,
            sales_count: sales.len(),
            total_revenue,
            total_profit,
            total_cost,
            margin: percentage(total_profit, total_revenue.minor()),
            daily,
            top_products,
            by_unit_type: by_unit_type(&sales),
            monthly,
        }
    }

    /// Stock value and counts over the whole catalog.
    pub fn catalog_stats(&self, tenant_id: TenantId) -> CatalogStats {
        let products = self.projections.products.list(tenant_id);

        let stock_value: Money = products.iter().map(ProductReadModel::stock_value).sum();
        let retail_value: Money = products.iter().map(ProductReadModel::retail_value).sum();

        let mut categories: BTreeMap<Category, CategoryStock> = BTreeMap::new();
        for p in &products {
            let row = categories.entry(p.category).or_insert(CategoryStock {
                category: p.category,
                products: 0,
                packs: 0.0,
                value: Money::ZERO,
            });
            row.products += 1;
            row.packs += p.stock.packs();
            bump(&mut row.value, p.stock_value());
        }

        CatalogStats {
            product_count: products.len(),
            in_stock_count: products.iter().filter(|p| !p.stock.is_out()).count(),
            low_stock_count: products.iter().filter(|p| p.stock.is_low()).count(),
            out_of_stock_count: products.iter().filter(|p| p.stock.is_out()).count(),
            total_packs: products.iter().map(|p| p.stock.packs()).sum(),
            stock_value,
            retail_value,
            potential_profit: retail_value.signed_diff(stock_value),
            by_category: categories.into_values().collect(),
        }
    }

    pub fn expense_summary(&self, tenant_id: TenantId, range: DateRange) -> ExpenseSummary {
        let expenses = self.projections.expenses.list(
            tenant_id,
            &ExpenseFilter {
                from: Some(range.start),
                to: Some(range.end),
                category: None,
            },
        );

        let total: Money = expenses.iter().map(|e| e.amount).sum();
        let days_in_period = range.days();

        let mut categories: BTreeMap<ExpenseCategory, ExpenseCategoryTotal> = BTreeMap::new();
        let mut daily: BTreeMap<NaiveDate, Money> = BTreeMap::new();
        for e in &expenses {
            let row = categories.entry(e.category).or_insert(ExpenseCategoryTotal {
                category: e.category,
                label: e.category.label(),
                count: 0,
                amount: Money::ZERO,
            });
            row.count += 1;
            bump(&mut row.amount, e.amount);
            bump(daily.entry(e.date).or_insert(Money::ZERO), e.amount);
        }

        let mut by_category: Vec<_> = categories.into_values().collect();
        by_category.sort_by(|a, b| b.amount.cmp(&a.amount));

        ExpenseSummary {
            range,
            count: expenses.len(),
            total,
            days_in_period,
            daily_average: total.split(days_in_period as u64),
            by_category,
            daily: daily
                .into_iter()
                .map(|(date, amount)| DailyExpense { date, amount })
                .collect(),
        }
    }

    pub fn dashboard(&self, tenant_id: TenantId, today: NaiveDate, role: Role) -> Dashboard {
        let today_range = DateRange { start: today, end: today };
        let todays = self.sales_in(tenant_id, today_range, Some(SaleStatus::Completed), None);

        let mut recent_sales = self.projections.sales.list(
            tenant_id,
            &SaleFilter {
                status: Some(SaleStatus::Completed),
                ..SaleFilter::default()
            },
        );
        recent_sales.truncate(RECENT_SALES);

        Dashboard {
            today,
            today_sales_count: todays.len(),
            today_revenue: todays.iter().map(|s| s.total).sum(),
            recent_sales,
            low_stock: self.projections.products.low_stock(tenant_id, LOW_STOCK_ROWS),
            catalog: role.is_manager().then(|| self.catalog_stats(tenant_id)),
        }
    }
}

fn by_unit_type(sales: &[SaleReadModel]) -> Vec<UnitTypeSales> {
    let mut rows: BTreeMap<UnitType, UnitTypeSales> = BTreeMap::new();
    for line in sales.iter().flat_map(|s| s.lines.iter()) {
        let row = rows.entry(line.unit_type).or_insert(UnitTypeSales {
            unit_type: line.unit_type,
            lines: 0,
            quantity: 0,
            revenue: Money::ZERO,
            profit: 0,
        });
        row.lines += 1;
        row.quantity += line.quantity;
        bump(&mut row.revenue, line.line_total);
        row.profit += line.line_profit;
    }
    rows.into_values().collect()
}

fn group_profit(sales: &[SaleReadModel], key: impl Fn(NaiveDate) -> String) -> Vec<PeriodProfit> {
    let mut rows: BTreeMap<String, PeriodProfit> = BTreeMap::new();
    for sale in sales {
        let period = key(sale.sale_date.date_naive());
        let row = rows.entry(period.clone()).or_insert(PeriodProfit {
            period,
            revenue: Money::ZERO,
            profit: 0,
            sales_count: 0,
        });
        bump(&mut row.revenue, sale.total);
        row.profit += sale.total_profit;
        row.sales_count += 1;
    }
    rows.into_values().collect()
}

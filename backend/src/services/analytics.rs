//! Read-only analytics over committed sales and batches
//!
//! The aggregations are plain functions over fetched rows so the same input
//! always yields the same report; [`AnalyticsService`] only picks the time
//! windows and fetches the rows.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{margin_percent, DateRange};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{BatchLine, LedgerStore, SaleLine};

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const MAX_WINDOW_DAYS: i64 = 365;
pub const DEFAULT_PERFORMER_LIMIT: usize = 10;
pub const DEFAULT_SEARCH_LIMIT: usize = 100;

/// Trailing window used to estimate daily sales velocity
pub const VELOCITY_WINDOW_DAYS: i64 = 30;
/// Assumed boxes per day for products with no recent sales
pub const DEFAULT_DAILY_SALES: Decimal = Decimal::from_parts(2, 0, 0, false, 0);
/// Days-until-stockout reported when nothing is selling
pub const STOCKOUT_SENTINEL: Decimal = Decimal::from_parts(999, 0, 0, false, 0);
/// Batches below this many boxes are listed as low stock in the weekly report
pub const LOW_STOCK_BOXES: i32 = 5;

const TREND_THRESHOLD: Decimal = Decimal::from_parts(5, 0, 0, false, 0);
const CRITICAL_DAYS: Decimal = Decimal::from_parts(3, 0, 0, false, 0);
const WARNING_DAYS: Decimal = Decimal::from_parts(7, 0, 0, false, 0);
const CURRENCY: &str = "PKR";
const UNCATEGORIZED: &str = "Uncategorized";

// ============================================================================
// Shared accumulation
// ============================================================================

// Rows written outside the API may hold amounts the validators reject;
// sums saturate rather than panic.
fn line_revenue(line: &SaleLine) -> Decimal {
    Decimal::from(line.boxes_sold).saturating_mul(line.selling_price_per_box)
}

fn line_cost(line: &SaleLine) -> Decimal {
    Decimal::from(line.boxes_sold).saturating_mul(line.cost_per_box)
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Totals {
    revenue: Decimal,
    cost: Decimal,
    boxes: i64,
    transactions: u64,
}

impl Totals {
    fn add(&mut self, line: &SaleLine) {
        self.revenue = self.revenue.saturating_add(line_revenue(line));
        self.cost = self.cost.saturating_add(line_cost(line));
        self.boxes += line.boxes_sold as i64;
        self.transactions += 1;
    }

    fn of(lines: &[SaleLine]) -> Self {
        let mut totals = Totals::default();
        lines.iter().for_each(|l| totals.add(l));
        totals
    }

    fn profit(&self) -> Decimal {
        self.revenue - self.cost
    }

    fn margin(&self) -> Decimal {
        margin_percent(self.profit(), self.revenue)
    }
}

/// Percentage change from `previous` to `current`, one decimal place;
/// zero when there is nothing to compare against.
fn percent_change(current: Decimal, previous: Decimal) -> Decimal {
    if previous <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (current - previous)
        .checked_div(previous)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map_or(Decimal::MAX, |pct| pct.round_dp(1))
}

/// Per-product revenue, cost and profit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductProfit {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub category: Option<String>,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub margin: Decimal,
    pub boxes_sold: i64,
}

fn group_by_product(lines: &[SaleLine]) -> Vec<ProductProfit> {
    let mut groups: BTreeMap<Uuid, (&SaleLine, Totals)> = BTreeMap::new();
    for line in lines {
        groups
            .entry(line.product_id)
            .or_insert_with(|| (line, Totals::default()))
            .1
            .add(line);
    }

    groups
        .into_values()
        .map(|(first, totals)| ProductProfit {
            product_id: first.product_id,
            product_name: first.product_name.clone(),
            sku: first.sku.clone(),
            category: first.category.clone(),
            revenue: totals.revenue,
            cost: totals.cost,
            profit: totals.profit(),
            margin: totals.margin(),
            boxes_sold: totals.boxes,
        })
        .collect()
}

// ============================================================================
// Profit
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitReport {
    pub period_days: i64,
    pub total_revenue: Decimal,
    pub total_cost: Decimal,
    pub total_profit: Decimal,
    pub profit_margin: Decimal,
    pub product_count: usize,
    pub average_profit_per_product: Decimal,
    /// Most profitable first
    pub products: Vec<ProductProfit>,
}

pub fn profit_report(lines: &[SaleLine], period_days: i64) -> ProfitReport {
    let totals = Totals::of(lines);
    let mut products = group_by_product(lines);
    products.sort_by(|a, b| {
        b.profit
            .cmp(&a.profit)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });

    let average_profit_per_product = if products.is_empty() {
        Decimal::ZERO
    } else {
        (totals.profit() / Decimal::from(products.len())).round_dp(2)
    };

    ProfitReport {
        period_days,
        total_revenue: totals.revenue,
        total_cost: totals.cost,
        total_profit: totals.profit(),
        profit_margin: totals.margin(),
        product_count: products.len(),
        average_profit_per_product,
        products,
    }
}

// ============================================================================
// Top performers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn classify(percent: Decimal) -> Self {
        if percent > TREND_THRESHOLD {
            Trend::Up
        } else if percent < -TREND_THRESHOLD {
            Trend::Down
        } else {
            Trend::Flat
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Performer {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub category: String,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub margin: Decimal,
    pub boxes_sold: i64,
    pub avg_price_per_box: Decimal,
    pub trend: Trend,
    /// Revenue change against the preceding window of equal length
    pub trend_percent: Decimal,
}

/// Metrics per product for the current window, with trend against `previous`.
/// Ordered by revenue, highest first.
pub fn performers(current: &[SaleLine], previous: &[SaleLine]) -> Vec<Performer> {
    let mut previous_revenue: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for line in previous {
        let prior = previous_revenue.entry(line.product_id).or_default();
        *prior = prior.saturating_add(line_revenue(line));
    }

    let mut rows: Vec<Performer> = group_by_product(current)
        .into_iter()
        .map(|p| {
            let prior = previous_revenue
                .get(&p.product_id)
                .copied()
                .unwrap_or_default();
            let trend_percent = percent_change(p.revenue, prior);
            let avg_price_per_box = if p.boxes_sold > 0 {
                (p.revenue / Decimal::from(p.boxes_sold)).round_dp(2)
            } else {
                Decimal::ZERO
            };
            Performer {
                product_id: p.product_id,
                product_name: p.product_name,
                sku: p.sku,
                category: p.category.unwrap_or_else(|| UNCATEGORIZED.to_string()),
                revenue: p.revenue,
                cost: p.cost,
                profit: p.profit,
                margin: p.margin,
                boxes_sold: p.boxes_sold,
                avg_price_per_box,
                trend: Trend::classify(trend_percent),
                trend_percent,
            }
        })
        .collect();

    sort_performers(&mut rows, SortBy::Revenue);
    rows
}

/// Ranking key for performers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Revenue,
    Profit,
    Margin,
    Volume,
}

impl FromStr for SortBy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "revenue" => Ok(SortBy::Revenue),
            "profit" => Ok(SortBy::Profit),
            "margin" => Ok(SortBy::Margin),
            "volume" => Ok(SortBy::Volume),
            _ => Err(AppError::validation(
                "sort_by",
                "sort_by must be one of: revenue, profit, margin, volume",
            )),
        }
    }
}

fn sort_performers(rows: &mut [Performer], by: SortBy) {
    rows.sort_by(|a, b| {
        let primary = match by {
            SortBy::Revenue => b.revenue.cmp(&a.revenue),
            SortBy::Profit => b.profit.cmp(&a.profit),
            SortBy::Margin => b.margin.cmp(&a.margin),
            SortBy::Volume => b.boxes_sold.cmp(&a.boxes_sold),
        };
        primary.then_with(|| a.product_name.cmp(&b.product_name))
    });
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformersReport {
    pub period_days: i64,
    pub total_products: usize,
    pub by_revenue: Vec<Performer>,
    pub by_profit: Vec<Performer>,
    pub by_margin: Vec<Performer>,
    pub by_volume: Vec<Performer>,
}

pub fn rank_performers(rows: &[Performer], limit: usize, period_days: i64) -> PerformersReport {
    let ranked = |by: SortBy| {
        let mut sorted = rows.to_vec();
        sort_performers(&mut sorted, by);
        sorted.truncate(limit);
        sorted
    };

    PerformersReport {
        period_days,
        total_products: rows.len(),
        by_revenue: ranked(SortBy::Revenue),
        by_profit: ranked(SortBy::Profit),
        by_margin: ranked(SortBy::Margin),
        by_volume: ranked(SortBy::Volume),
    }
}

/// Filter performers by a case-insensitive query over name, SKU and category
pub fn search_performers(
    rows: &[Performer],
    query: Option<&str>,
    by: SortBy,
    limit: usize,
) -> Vec<Performer> {
    let needle = query.map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty());
    let mut matched: Vec<Performer> = rows
        .iter()
        .filter(|p| {
            needle.as_deref().map_or(true, |q| {
                p.product_name.to_lowercase().contains(q)
                    || p.sku.to_lowercase().contains(q)
                    || p.category.to_lowercase().contains(q)
            })
        })
        .cloned()
        .collect();

    sort_performers(&mut matched, by);
    matched.truncate(limit);
    matched
}

// ============================================================================
// Stock alerts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn from_days(days_until_stockout: Decimal) -> Self {
        if days_until_stockout <= CRITICAL_DAYS {
            Severity::Critical
        } else if days_until_stockout <= WARNING_DAYS {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockAlert {
    pub batch_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub batch_number: Option<String>,
    pub boxes_remaining: i32,
    pub avg_daily_sales: Decimal,
    pub days_until_stockout: Decimal,
    pub severity: Severity,
    pub recommended_reorder: i64,
    pub recommendation: String,
    pub supplier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockAlertReport {
    pub alerts: Vec<StockAlert>,
    pub total_alerts: usize,
    pub critical_count: usize,
    pub warning_count: usize,
}

/// Division leaves noise in the last of the 28 digits; projections are
/// compared at this scale
const PROJECTION_DP: u32 = 10;

/// Average boxes sold per day over the velocity window, unrounded
pub fn average_daily_sales(boxes_in_window: i64) -> Decimal {
    if boxes_in_window <= 0 {
        return DEFAULT_DAILY_SALES;
    }
    Decimal::from(boxes_in_window) / Decimal::from(VELOCITY_WINDOW_DAYS)
}

/// Days of stock left at `avg_daily`, unrounded
pub fn days_until_stockout(remaining: i32, avg_daily: Decimal) -> Decimal {
    if avg_daily <= Decimal::ZERO {
        return STOCKOUT_SENTINEL;
    }
    (Decimal::from(remaining) / avg_daily).round_dp(PROJECTION_DP)
}

/// Boxes to order to cover the velocity window
pub fn recommended_reorder(avg_daily: Decimal) -> i64 {
    (avg_daily * Decimal::from(VELOCITY_WINDOW_DAYS))
        .round_dp(PROJECTION_DP)
        .ceil()
        .to_i64()
        .unwrap_or(0)
}

/// Alerts for active batches likely to run out within a week.
///
/// `trailing` holds the sales of the last [`VELOCITY_WINDOW_DAYS`] days.
pub fn stock_alerts(batches: &[BatchLine], trailing: &[SaleLine]) -> StockAlertReport {
    let mut sold: BTreeMap<Uuid, i64> = BTreeMap::new();
    for line in trailing {
        *sold.entry(line.product_id).or_default() += line.boxes_sold as i64;
    }

    let mut alerts: Vec<StockAlert> = batches
        .iter()
        .filter(|l| l.batch.boxes_remaining > 0)
        .filter_map(|l| {
            let batch = &l.batch;
            let avg = average_daily_sales(sold.get(&batch.product_id).copied().unwrap_or(0));
            let days = days_until_stockout(batch.boxes_remaining, avg);
            let severity = Severity::from_days(days);
            if severity == Severity::Info {
                return None;
            }
            let reorder = recommended_reorder(avg);
            let recommendation = match severity {
                Severity::Critical => format!("URGENT: Order {} boxes immediately", reorder),
                _ => format!("Order {} boxes soon", reorder),
            };
            Some(StockAlert {
                batch_id: batch.id,
                product_id: batch.product_id,
                product_name: l.product_name.clone(),
                sku: l.sku.clone(),
                batch_number: batch.batch_number.clone(),
                boxes_remaining: batch.boxes_remaining,
                avg_daily_sales: avg.round_dp(2),
                days_until_stockout: days.round_dp(1),
                severity,
                recommended_reorder: reorder,
                recommendation,
                supplier: batch
                    .supplier_name
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
            })
        })
        .collect();

    alerts.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| a.days_until_stockout.cmp(&b.days_until_stockout))
            .then_with(|| a.product_name.cmp(&b.product_name))
    });

    StockAlertReport {
        total_alerts: alerts.len(),
        critical_count: alerts
            .iter()
            .filter(|a| a.severity == Severity::Critical)
            .count(),
        warning_count: alerts
            .iter()
            .filter(|a| a.severity == Severity::Warning)
            .count(),
        alerts,
    }
}

// ============================================================================
// Weekly report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopProduct {
    pub name: String,
    pub revenue: Decimal,
    pub profit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyReport {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_revenue: Decimal,
    pub total_profit: Decimal,
    pub profit_margin: Decimal,
    pub total_boxes_sold: i64,
    pub previous_week_revenue: Decimal,
    pub revenue_change: Decimal,
    pub top_products: Vec<TopProduct>,
    pub low_stock_products: Vec<String>,
    pub narrative: String,
}

pub fn weekly_report(
    current: &[SaleLine],
    previous: &[SaleLine],
    active: &[BatchLine],
    period: (DateTime<Utc>, DateTime<Utc>),
) -> WeeklyReport {
    let totals = Totals::of(current);
    let previous_revenue = Totals::of(previous).revenue;

    let mut products = group_by_product(current);
    products.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    let top_products: Vec<TopProduct> = products
        .into_iter()
        .take(3)
        .map(|p| TopProduct {
            name: p.product_name,
            revenue: p.revenue,
            profit: p.profit,
        })
        .collect();

    let mut low_stock_products: Vec<String> = Vec::new();
    for line in active.iter().filter(|l| l.batch.boxes_remaining < LOW_STOCK_BOXES) {
        if !low_stock_products.contains(&line.product_name) {
            low_stock_products.push(line.product_name.clone());
        }
    }

    let mut report = WeeklyReport {
        period_start: period.0,
        period_end: period.1,
        total_revenue: totals.revenue,
        total_profit: totals.profit(),
        profit_margin: totals.margin(),
        total_boxes_sold: totals.boxes,
        previous_week_revenue: previous_revenue,
        revenue_change: percent_change(totals.revenue, previous_revenue),
        top_products,
        low_stock_products,
        narrative: String::new(),
    };
    report.narrative = narrate(&report);
    report
}

fn narrate(report: &WeeklyReport) -> String {
    let mut parts = Vec::new();

    if report.revenue_change > Decimal::ZERO {
        parts.push(format!(
            "Strong week! Revenue grew by {}% compared to last week, reaching {} {}.",
            report.revenue_change, CURRENCY, report.total_revenue
        ));
    } else if report.revenue_change < Decimal::ZERO {
        parts.push(format!(
            "Revenue declined by {}% this week. Consider reviewing your pricing or marketing strategy.",
            report.revenue_change.abs()
        ));
    } else {
        parts.push(format!(
            "Revenue remained stable at {} {} this week.",
            CURRENCY, report.total_revenue
        ));
    }

    parts.push(format!(
        "Profit margin stands at {}%, with total profit of {} {}.",
        report.profit_margin.round_dp(1),
        CURRENCY,
        report.total_profit
    ));

    if let Some(top) = report.top_products.first() {
        parts.push(format!(
            "Your top performing product is \"{}\" with {} {} in revenue.",
            top.name, CURRENCY, top.revenue
        ));
    }

    if report.total_boxes_sold > 0 {
        parts.push(format!("You sold {} boxes this week.", report.total_boxes_sold));
    }

    if !report.low_stock_products.is_empty() {
        let names: Vec<&str> = report
            .low_stock_products
            .iter()
            .take(3)
            .map(String::as_str)
            .collect();
        parts.push(format!(
            "Low stock alert: {} are running low. Consider reordering soon.",
            names.join(", ")
        ));
    }

    parts.join(" ")
}

// ============================================================================
// Sales analytics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesSummary {
    pub total_revenue: Decimal,
    pub total_cost: Decimal,
    pub total_profit: Decimal,
    pub profit_margin: Decimal,
    pub total_boxes_sold: i64,
    pub total_transactions: u64,
    pub average_price_per_box: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub profit: Decimal,
    pub boxes_sold: i64,
    pub transactions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySales {
    pub category: String,
    pub revenue: Decimal,
    pub profit: Decimal,
    pub boxes_sold: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesAnalytics {
    pub summary: SalesSummary,
    /// Oldest day first
    pub daily: Vec<DailySales>,
    pub top_products: Vec<ProductProfit>,
    pub top_categories: Vec<CategorySales>,
}

pub fn sales_analytics(lines: &[SaleLine]) -> SalesAnalytics {
    let totals = Totals::of(lines);

    let mut by_day: BTreeMap<NaiveDate, Totals> = BTreeMap::new();
    let mut by_category: BTreeMap<String, Totals> = BTreeMap::new();
    for line in lines {
        by_day
            .entry(line.created_at.date_naive())
            .or_default()
            .add(line);
        by_category
            .entry(
                line.category
                    .clone()
                    .unwrap_or_else(|| UNCATEGORIZED.to_string()),
            )
            .or_default()
            .add(line);
    }

    let mut top_products = group_by_product(lines);
    top_products.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    top_products.truncate(10);

    let mut top_categories: Vec<CategorySales> = by_category
        .into_iter()
        .map(|(category, t)| CategorySales {
            category,
            revenue: t.revenue,
            profit: t.profit(),
            boxes_sold: t.boxes,
        })
        .collect();
    top_categories.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    top_categories.truncate(10);

    SalesAnalytics {
        summary: SalesSummary {
            total_revenue: totals.revenue,
            total_cost: totals.cost,
            total_profit: totals.profit(),
            profit_margin: totals.margin(),
            total_boxes_sold: totals.boxes,
            total_transactions: totals.transactions,
            average_price_per_box: if totals.boxes > 0 {
                (totals.revenue / Decimal::from(totals.boxes)).round_dp(2)
            } else {
                Decimal::ZERO
            },
        },
        daily: by_day
            .into_iter()
            .map(|(date, t)| DailySales {
                date,
                revenue: t.revenue,
                profit: t.profit(),
                boxes_sold: t.boxes,
                transactions: t.transactions,
            })
            .collect(),
        top_products,
        top_categories,
    }
}

// ============================================================================
// Service
// ============================================================================

/// Query parameters shared by the windowed analytics endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowQuery {
    pub days: Option<i64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub sort_by: Option<String>,
    pub days: Option<i64>,
    pub limit: Option<usize>,
}

/// Trailing window `[now - days, now]` and the equal window before it, whose
/// upper bound stops just short of the current window's start.
pub fn windows(now: DateTime<Utc>, days: i64) -> (DateRange, DateRange) {
    let start = now - Duration::days(days);
    let current = DateRange::between(start, now);
    let previous = DateRange::between(
        start - Duration::days(days),
        start - Duration::microseconds(1),
    );
    (current, previous)
}

fn window_days(days: Option<i64>) -> AppResult<i64> {
    let days = days.unwrap_or(DEFAULT_WINDOW_DAYS);
    if !(1..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(AppError::validation(
            "days",
            format!("days must be between 1 and {}", MAX_WINDOW_DAYS),
        ));
    }
    Ok(days)
}

fn result_limit(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).clamp(1, DEFAULT_SEARCH_LIMIT)
}

/// Analytics service
#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn LedgerStore>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn profit(&self, owner: Uuid, query: WindowQuery) -> AppResult<ProfitReport> {
        let days = window_days(query.days)?;
        let (current, _) = windows(Utc::now(), days);
        let lines = self.store.sale_lines(owner, &current).await?;
        Ok(profit_report(&lines, days))
    }

    async fn performer_rows(&self, owner: Uuid, days: i64) -> AppResult<Vec<Performer>> {
        let (current, previous) = windows(Utc::now(), days);
        let current = self.store.sale_lines(owner, &current).await?;
        let previous = self.store.sale_lines(owner, &previous).await?;
        Ok(performers(&current, &previous))
    }

    pub async fn performers(&self, owner: Uuid, query: WindowQuery) -> AppResult<PerformersReport> {
        let days = window_days(query.days)?;
        let limit = result_limit(query.limit, DEFAULT_PERFORMER_LIMIT);
        let rows = self.performer_rows(owner, days).await?;
        Ok(rank_performers(&rows, limit, days))
    }

    pub async fn search(&self, owner: Uuid, query: SearchQuery) -> AppResult<Vec<Performer>> {
        let days = window_days(query.days)?;
        let by = query
            .sort_by
            .as_deref()
            .map(SortBy::from_str)
            .transpose()?
            .unwrap_or_default();
        let limit = result_limit(query.limit, DEFAULT_SEARCH_LIMIT);
        let rows = self.performer_rows(owner, days).await?;
        Ok(search_performers(&rows, query.q.as_deref(), by, limit))
    }

    pub async fn stock_alerts(&self, owner: Uuid) -> AppResult<StockAlertReport> {
        let (trailing, _) = windows(Utc::now(), VELOCITY_WINDOW_DAYS);
        let batches = self.store.active_batches(owner).await?;
        let sales = self.store.sale_lines(owner, &trailing).await?;
        Ok(stock_alerts(&batches, &sales))
    }

    pub async fn weekly_report(&self, owner: Uuid) -> AppResult<WeeklyReport> {
        let now = Utc::now();
        let (current, previous) = windows(now, 7);
        let this_week = self.store.sale_lines(owner, &current).await?;
        let last_week = self.store.sale_lines(owner, &previous).await?;
        let active = self.store.active_batches(owner).await?;
        Ok(weekly_report(
            &this_week,
            &last_week,
            &active,
            (now - Duration::days(7), now),
        ))
    }

    pub async fn sales(
        &self,
        owner: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> AppResult<SalesAnalytics> {
        let range = super::ledger::date_range(from, to)?;
        let lines = self.store.sale_lines(owner, &range).await?;
        Ok(sales_analytics(&lines))
    }
}

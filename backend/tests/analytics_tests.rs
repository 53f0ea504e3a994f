//! Analytics read-model tests
//!
//! Tests for the aggregations over sales and batches including:
//! - Profit and margin formulas
//! - Performer trends and rankings
//! - Stock-out projections and alert severity
//! - Weekly report narrative and daily sales breakdown
//! - Idempotent aggregation

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use profitbox_backend::error::AppError;
use profitbox_backend::services::analytics::*;
use profitbox_backend::services::catalog::{CatalogService, CreateProductInput};
use profitbox_backend::services::ledger::{CreateBatchInput, LedgerService, RecordSaleInput};
use profitbox_backend::store::{BatchLine, MemoryStore, SaleLine};
use shared::{AlertStatus, BatchStatus, StockBatch};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap()
}

struct Item {
    id: Uuid,
    name: &'static str,
    sku: &'static str,
    category: Option<&'static str>,
}

impl Item {
    fn new(name: &'static str, sku: &'static str, category: Option<&'static str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            sku,
            category,
        }
    }

    fn line(&self, boxes: i32, price: &str, cost: &str, when: DateTime<Utc>) -> SaleLine {
        SaleLine {
            sale_id: Uuid::new_v4(),
            product_id: self.id,
            product_name: self.name.to_string(),
            sku: self.sku.to_string(),
            category: self.category.map(str::to_string),
            boxes_sold: boxes,
            selling_price_per_box: dec(price),
            cost_per_box: dec(cost),
            created_at: when,
        }
    }

    fn batch(&self, remaining: i32) -> BatchLine {
        BatchLine {
            batch: StockBatch {
                id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
                product_id: self.id,
                batch_number: Some(format!("{}-B1", self.sku)),
                boxes_purchased: remaining.max(1),
                boxes_remaining: remaining,
                quantity_per_box: dec("1"),
                unit_per_box: "box".to_string(),
                cost_per_box: dec("10"),
                supplier_name: None,
                reorder_level: 0,
                critical_level: 0,
                alert_status: AlertStatus::Healthy,
                status: if remaining > 0 {
                    BatchStatus::Active
                } else {
                    BatchStatus::Depleted
                },
                created_at: at(1),
            },
            product_name: self.name.to_string(),
            sku: self.sku.to_string(),
            category: self.category.map(str::to_string),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_profit_report_formulas() {
        let jam = Item::new("Jam", "JAM-1", Some("Preserves"));
        let tea = Item::new("Tea", "TEA-1", None);
        let lines = vec![
            jam.line(3, "150", "100", at(5)),
            tea.line(2, "50", "60", at(6)),
        ];

        let report = profit_report(&lines, 30);
        assert_eq!(report.period_days, 30);
        assert_eq!(report.total_revenue, dec("550"));
        assert_eq!(report.total_cost, dec("420"));
        assert_eq!(report.total_profit, dec("130"));
        assert_eq!(report.profit_margin, dec("23.64"));
        assert_eq!(report.product_count, 2);
        assert_eq!(report.average_profit_per_product, dec("65"));

        assert_eq!(report.products[0].product_name, "Jam");
        assert_eq!(report.products[0].profit, dec("150"));
        assert_eq!(report.products[0].margin, dec("33.33"));
        assert_eq!(report.products[1].profit, dec("-20"));
        assert_eq!(report.products[1].margin, dec("-20"));
    }

    #[test]
    fn test_profit_report_without_sales() {
        let report = profit_report(&[], 7);
        assert_eq!(report.total_revenue, Decimal::ZERO);
        assert_eq!(report.profit_margin, Decimal::ZERO);
        assert_eq!(report.average_profit_per_product, Decimal::ZERO);
        assert!(report.products.is_empty());
    }

    #[test]
    fn test_performer_trends() {
        let jam = Item::new("Jam", "JAM-1", Some("Preserves"));
        let tea = Item::new("Tea", "TEA-1", None);
        let oil = Item::new("Oil", "OIL-1", Some("Pantry"));
        let current = vec![
            jam.line(3, "150", "100", at(20)),
            tea.line(2, "50", "40", at(20)),
            oil.line(1, "80", "60", at(21)),
        ];
        let previous = vec![
            jam.line(4, "100", "100", at(5)),
            tea.line(1, "110", "40", at(6)),
        ];

        let rows = performers(&current, &previous);
        assert_eq!(rows.len(), 3);

        let jam_row = rows.iter().find(|r| r.sku == "JAM-1").unwrap();
        assert_eq!(jam_row.trend_percent, dec("12.5"));
        assert_eq!(jam_row.trend, Trend::Up);
        assert_eq!(jam_row.avg_price_per_box, dec("150"));

        let tea_row = rows.iter().find(|r| r.sku == "TEA-1").unwrap();
        assert_eq!(tea_row.trend_percent, dec("-9.1"));
        assert_eq!(tea_row.trend, Trend::Down);
        assert_eq!(tea_row.category, "Uncategorized");

        let oil_row = rows.iter().find(|r| r.sku == "OIL-1").unwrap();
        assert_eq!(oil_row.trend_percent, Decimal::ZERO);
        assert_eq!(oil_row.trend, Trend::Flat);

        // Ordered by revenue
        assert_eq!(rows[0].sku, "JAM-1");
    }

    #[test]
    fn test_trend_thresholds() {
        assert_eq!(Trend::classify(dec("5")), Trend::Flat);
        assert_eq!(Trend::classify(dec("5.1")), Trend::Up);
        assert_eq!(Trend::classify(dec("-5")), Trend::Flat);
        assert_eq!(Trend::classify(dec("-5.1")), Trend::Down);
    }

    #[test]
    fn test_rankings_and_search() {
        let jam = Item::new("Jam", "JAM-1", Some("Preserves"));
        let tea = Item::new("Tea", "TEA-1", Some("Drinks"));
        let current = vec![
            jam.line(1, "300", "100", at(20)),
            tea.line(10, "20", "19", at(20)),
        ];
        let rows = performers(&current, &[]);

        let report = rank_performers(&rows, 1, 30);
        assert_eq!(report.total_products, 2);
        assert_eq!(report.by_revenue[0].sku, "JAM-1");
        assert_eq!(report.by_profit[0].sku, "JAM-1");
        assert_eq!(report.by_margin[0].sku, "JAM-1");
        assert_eq!(report.by_volume[0].sku, "TEA-1");
        assert_eq!(report.by_volume.len(), 1);

        let drinks = search_performers(&rows, Some("DRINK"), SortBy::Revenue, 100);
        assert_eq!(drinks.len(), 1);
        assert_eq!(drinks[0].sku, "TEA-1");

        let by_volume = search_performers(&rows, Some("  "), SortBy::Volume, 100);
        assert_eq!(by_volume[0].sku, "TEA-1");
        assert_eq!(by_volume.len(), 2);

        assert_eq!(SortBy::from_str("margin").unwrap(), SortBy::Margin);
        assert!(matches!(
            SortBy::from_str("price"),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn test_stockout_projection() {
        assert_eq!(average_daily_sales(0), dec("2"));
        assert_eq!(average_daily_sales(45), dec("1.5"));
        assert_eq!(days_until_stockout(3, dec("1.5")), dec("2"));
        assert_eq!(days_until_stockout(3, Decimal::ZERO), dec("999"));
        assert_eq!(recommended_reorder(dec("1.5")), 45);
        assert_eq!(recommended_reorder(dec("0.07")), 3);
        assert_eq!(recommended_reorder(average_daily_sales(50)), 50);
        assert_eq!(recommended_reorder(average_daily_sales(0)), 60);
        assert_eq!(Severity::from_days(dec("3")), Severity::Critical);
        assert_eq!(Severity::from_days(dec("7")), Severity::Warning);
        assert_eq!(Severity::from_days(dec("7.1")), Severity::Info);
    }

    #[test]
    fn test_oversized_stored_rows_do_not_panic() {
        let tea = Item::new("Tea", "TEA-1", None);
        let mut huge = tea.line(2, "1", "1", at(5));
        huge.selling_price_per_box = Decimal::MAX;
        let lines = vec![huge, tea.line(1, "10", "5", at(6))];

        let report = profit_report(&lines, 30);
        assert_eq!(report.total_revenue, Decimal::MAX);
        assert_eq!(report.products.len(), 1);

        let rows = performers(&lines, &[tea.line(1, "10", "5", at(1))]);
        assert_eq!(rows[0].revenue, Decimal::MAX);
    }

    #[test]
    fn test_stockout_bands_use_unrounded_days() {
        // 99 boxes in 30 days leaves 10 boxes for 3.03 days
        let days = days_until_stockout(10, average_daily_sales(99));
        assert!(days > dec("3"));
        assert_eq!(Severity::from_days(days), Severity::Warning);

        // 100 boxes in 30 days leaves 10 boxes for exactly 3 days
        let days = days_until_stockout(10, average_daily_sales(100));
        assert_eq!(days, dec("3"));
        assert_eq!(Severity::from_days(days), Severity::Critical);
    }

    #[test]
    fn test_stock_alert_rounds_only_reported_figures() {
        let jam = Item::new("Jam", "JAM-1", None);
        let trailing = vec![jam.line(50, "10", "5", at(10))];

        let report = stock_alerts(&[jam.batch(3)], &trailing);
        let alert = &report.alerts[0];
        assert_eq!(alert.avg_daily_sales, dec("1.67"));
        assert_eq!(alert.days_until_stockout, dec("1.8"));
        assert_eq!(alert.recommended_reorder, 50);
        assert_eq!(alert.severity, Severity::Critical);
    }

    #[test]
    fn test_stock_alerts() {
        let jam = Item::new("Jam", "JAM-1", None);
        let tea = Item::new("Tea", "TEA-1", None);
        let oil = Item::new("Oil", "OIL-1", None);
        let rice = Item::new("Rice", "RICE-1", None);

        let batches = vec![
            tea.batch(10),
            jam.batch(3),
            oil.batch(100),
            rice.batch(0),
        ];
        let trailing = vec![jam.line(45, "10", "5", at(10))];

        let report = stock_alerts(&batches, &trailing);
        assert_eq!(report.total_alerts, 2);
        assert_eq!(report.critical_count, 1);
        assert_eq!(report.warning_count, 1);

        let first = &report.alerts[0];
        assert_eq!(first.sku, "JAM-1");
        assert_eq!(first.severity, Severity::Critical);
        assert_eq!(first.days_until_stockout, dec("2"));
        assert_eq!(first.recommended_reorder, 45);
        assert_eq!(first.recommendation, "URGENT: Order 45 boxes immediately");
        assert_eq!(first.supplier, "Unknown");

        // No history falls back to two boxes a day
        let second = &report.alerts[1];
        assert_eq!(second.sku, "TEA-1");
        assert_eq!(second.avg_daily_sales, dec("2"));
        assert_eq!(second.days_until_stockout, dec("5"));
        assert_eq!(second.severity, Severity::Warning);
        assert_eq!(second.recommendation, "Order 60 boxes soon");
    }

    #[test]
    fn test_weekly_report() {
        let jam = Item::new("Jam", "JAM-1", None);
        let tea = Item::new("Tea", "TEA-1", None);
        let current = vec![
            jam.line(3, "150", "100", at(20)),
            tea.line(2, "50", "60", at(21)),
        ];
        let previous = vec![jam.line(4, "100", "100", at(12))];
        let active = vec![jam.batch(3), tea.batch(20), jam.batch(1)];

        let report = weekly_report(&current, &previous, &active, (at(15), at(22)));
        assert_eq!(report.total_revenue, dec("550"));
        assert_eq!(report.total_profit, dec("130"));
        assert_eq!(report.total_boxes_sold, 5);
        assert_eq!(report.previous_week_revenue, dec("400"));
        assert_eq!(report.revenue_change, dec("37.5"));
        assert_eq!(report.top_products.len(), 2);
        assert_eq!(report.top_products[0].name, "Jam");
        assert_eq!(report.low_stock_products, vec!["Jam"]);

        assert!(report
            .narrative
            .starts_with("Strong week! Revenue grew by 37.5% compared to last week"));
        assert!(report.narrative.contains("\"Jam\""));
        assert!(report.narrative.contains("You sold 5 boxes this week."));
        assert!(report.narrative.contains("Low stock alert: Jam are running low."));
    }

    #[test]
    fn test_weekly_report_without_history() {
        let report = weekly_report(&[], &[], &[], (at(15), at(22)));
        assert_eq!(report.revenue_change, Decimal::ZERO);
        assert!(report.narrative.starts_with("Revenue remained stable"));
        assert!(report.top_products.is_empty());
    }

    #[test]
    fn test_sales_analytics_breakdown() {
        let jam = Item::new("Jam", "JAM-1", Some("Preserves"));
        let tea = Item::new("Tea", "TEA-1", None);
        let lines = vec![
            jam.line(2, "150", "100", at(5)),
            tea.line(1, "40", "20", at(5)),
            jam.line(1, "150", "100", at(6)),
        ];

        let analytics = sales_analytics(&lines);
        assert_eq!(analytics.summary.total_revenue, dec("490"));
        assert_eq!(analytics.summary.total_profit, dec("170"));
        assert_eq!(analytics.summary.total_transactions, 3);
        assert_eq!(analytics.summary.total_boxes_sold, 4);
        assert_eq!(analytics.summary.average_price_per_box, dec("122.5"));

        assert_eq!(analytics.daily.len(), 2);
        assert_eq!(analytics.daily[0].date, at(5).date_naive());
        assert_eq!(analytics.daily[0].transactions, 2);
        assert_eq!(analytics.daily[1].revenue, dec("150"));

        assert_eq!(analytics.top_products[0].product_name, "Jam");
        assert_eq!(analytics.top_categories[0].category, "Preserves");
        assert_eq!(analytics.top_categories[1].category, "Uncategorized");
    }

    #[test]
    fn test_windows_do_not_overlap() {
        let now = at(30);
        let (current, previous) = windows(now, 7);
        assert_eq!(current.from, Some(now - Duration::days(7)));
        assert_eq!(current.to, Some(now));
        assert_eq!(previous.from, Some(now - Duration::days(14)));
        assert!(previous.to.unwrap() < current.from.unwrap());
        assert!(!previous.contains(now - Duration::days(7)));
    }
}

// ============================================================================
// Service Tests
// ============================================================================

#[cfg(test)]
mod service_tests {
    use super::*;

    async fn seeded() -> (AnalyticsService, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let product = CatalogService::new(store.clone())
            .create(
                owner,
                CreateProductInput {
                    sku: "JAM-1".into(),
                    name: "Jam".into(),
                    category: Some("Preserves".into()),
                    description: None,
                    unit_type: "count".into(),
                    base_unit: "bottle".into(),
                    default_supplier: None,
                },
            )
            .await
            .unwrap();

        let ledger = LedgerService::new(store.clone());
        let batch = ledger
            .create_batch(
                owner,
                CreateBatchInput {
                    product_id: product.id,
                    batch_number: None,
                    boxes_purchased: 10,
                    quantity_per_box: dec("12"),
                    unit_per_box: "bottle".into(),
                    cost_per_box: dec("100"),
                    supplier_name: Some("Acme".into()),
                    reorder_level: Some(5),
                    critical_level: Some(2),
                },
            )
            .await
            .unwrap();
        ledger
            .apply_sale(
                owner,
                RecordSaleInput {
                    product_id: product.id,
                    batch_id: batch.id,
                    boxes_sold: 6,
                    selling_price_per_box: dec("150"),
                    customer_name: None,
                    notes: None,
                },
            )
            .await
            .unwrap();

        (AnalyticsService::new(store), owner)
    }

    #[tokio::test]
    async fn test_profit_over_recent_sales() {
        let (service, owner) = seeded().await;
        let report = service.profit(owner, WindowQuery::default()).await.unwrap();
        assert_eq!(report.period_days, 30);
        assert_eq!(report.total_revenue, dec("900"));
        assert_eq!(report.total_profit, dec("300"));

        let other = service
            .profit(Uuid::new_v4(), WindowQuery::default())
            .await
            .unwrap();
        assert_eq!(other.product_count, 0);
    }

    #[tokio::test]
    async fn test_window_bounds_are_validated() {
        let (service, owner) = seeded().await;
        for days in [0, 366] {
            let err = service
                .profit(
                    owner,
                    WindowQuery {
                        days: Some(days),
                        limit: None,
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation { ref field, .. } if field == "days"));
        }
    }

    #[tokio::test]
    async fn test_search_rejects_unknown_sort() {
        let (service, owner) = seeded().await;
        let err = service
            .search(
                owner,
                SearchQuery {
                    sort_by: Some("price".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "sort_by"));

        let found = service
            .search(
                owner,
                SearchQuery {
                    q: Some("jam".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_stock_alerts_and_weekly_report_from_store() {
        let (service, owner) = seeded().await;

        // 4 left, 6 sold over 30 days: 0.2 a day, 20 days of stock
        let alerts = service.stock_alerts(owner).await.unwrap();
        assert_eq!(alerts.total_alerts, 0);

        let weekly = service.weekly_report(owner).await.unwrap();
        assert_eq!(weekly.total_revenue, dec("900"));
        assert_eq!(weekly.low_stock_products, vec!["Jam"]);

        let sales = service.sales(owner, None, None).await.unwrap();
        assert_eq!(sales.summary.total_transactions, 1);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn lines_strategy() -> impl Strategy<Value = Vec<(usize, i32, u32, u32, u32)>> {
        prop::collection::vec((0usize..4, 1i32..50, 1u32..50_000, 1u32..50_000, 1u32..28), 0..30)
    }

    fn build(items: &[Item], raw: &[(usize, i32, u32, u32, u32)]) -> Vec<SaleLine> {
        raw.iter()
            .map(|(i, boxes, price, cost, day)| SaleLine {
                selling_price_per_box: Decimal::new(*price as i64, 2),
                cost_per_box: Decimal::new(*cost as i64, 2),
                ..items[*i].line(*boxes, "1", "1", at(*day))
            })
            .collect()
    }

    fn items() -> Vec<Item> {
        vec![
            Item::new("Jam", "JAM-1", Some("Preserves")),
            Item::new("Tea", "TEA-1", Some("Drinks")),
            Item::new("Oil", "OIL-1", None),
            Item::new("Rice", "RICE-1", Some("Grains")),
        ]
    }

    proptest! {
        /// Aggregating the same rows twice, in any order, gives the same result
        #[test]
        fn prop_aggregation_is_idempotent(raw in lines_strategy()) {
            let items = items();
            let lines = build(&items, &raw);
            let mut reversed = lines.clone();
            reversed.reverse();

            prop_assert_eq!(profit_report(&lines, 30), profit_report(&lines, 30));
            prop_assert_eq!(profit_report(&lines, 30), profit_report(&reversed, 30));
            prop_assert_eq!(sales_analytics(&lines).summary, sales_analytics(&reversed).summary);
            prop_assert_eq!(performers(&lines, &[]), performers(&reversed, &[]));
        }

        /// Per-product figures add up to the totals
        #[test]
        fn prop_product_profits_sum_to_total(raw in lines_strategy()) {
            let items = items();
            let report = profit_report(&build(&items, &raw), 30);

            let revenue: Decimal = report.products.iter().map(|p| p.revenue).sum();
            let profit: Decimal = report.products.iter().map(|p| p.profit).sum();
            prop_assert_eq!(revenue, report.total_revenue);
            prop_assert_eq!(profit, report.total_profit);
            prop_assert_eq!(report.total_profit, report.total_revenue - report.total_cost);
        }

        /// Stock-out days never go negative and follow the severity bands
        #[test]
        fn prop_severity_matches_days(remaining in 1i32..500, boxes in 0i64..2000) {
            let avg = average_daily_sales(boxes);
            let days = days_until_stockout(remaining, avg);
            prop_assert!(days >= Decimal::ZERO);
            let expected = if days <= dec("3") {
                Severity::Critical
            } else if days <= dec("7") {
                Severity::Warning
            } else {
                Severity::Info
            };
            prop_assert_eq!(Severity::from_days(days), expected);
        }
    }
}

//! CSV bulk ingestion for products, stock batches and sales
//!
//! Uploads are validated in full before anything is written. Product and
//! batch uploads insert all rows or none. Sales go through the ledger one row
//! at a time, since each row is its own compensating write.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{normalize_sku, Product, StockBatch};
use uuid::Uuid;

use super::catalog::{build_product, CatalogService, CreateProductInput};
use super::ledger::{build_batch, CreateBatchInput, LedgerService, RecordSaleInput};
use crate::error::{AppError, AppResult, RowIssue};
use crate::store::{LedgerStore, StoreError};

/// Most data rows accepted in one file
pub const MAX_UPLOAD_ROWS: usize = 100;

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub const STOCK_TEMPLATE: &str = "\
sku,boxes_purchased,quantity_per_box,unit_per_box,cost_per_box,batch_number,boxes_remaining,supplier_name,reorder_level,critical_level
TEA-001,20,12,piece,450.00,B-2024-01,,Acme Traders,5,2
";

pub const PRODUCT_TEMPLATE: &str = "\
sku,name,unit_type,base_unit,category,description,default_supplier
TEA-001,Green Tea,count,box,Beverages,Loose leaf green tea,Acme Traders
";

pub const SALES_TEMPLATE: &str = "\
product_id,batch_id,boxes_sold,selling_price_per_box,customer_name,notes
";

const STOCK_COLUMNS: &[&str] = &[
    "sku",
    "boxes_purchased",
    "quantity_per_box",
    "unit_per_box",
    "cost_per_box",
];
const PRODUCT_COLUMNS: &[&str] = &["sku", "name", "unit_type", "base_unit"];
const SALES_COLUMNS: &[&str] = &["product_id", "batch_id", "boxes_sold", "selling_price_per_box"];

// ============================================================================
// CSV reading
// ============================================================================

/// `Boxes Purchased ` becomes `boxes_purchased`
fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Parse a CSV upload into typed rows paired with their line numbers
fn read_rows<T>(data: &[u8], required: &[&str]) -> AppResult<Vec<(usize, T)>>
where
    T: for<'de> Deserialize<'de>,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers: csv::StringRecord = reader
        .headers()
        .map_err(|e| AppError::ValidationError(format!("Could not read CSV header: {}", e)))?
        .iter()
        .map(normalize_header)
        .collect();

    let missing: Vec<&str> = required
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(AppError::ValidationError(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mut rows = Vec::new();
    let mut issues = Vec::new();
    for record in reader.records() {
        if rows.len() + issues.len() >= MAX_UPLOAD_ROWS {
            return Err(AppError::ValidationError(format!(
                "At most {} rows can be uploaded at once",
                MAX_UPLOAD_ROWS
            )));
        }
        let record = record.map_err(|e| {
            let at = e
                .position()
                .map(|p| format!(" at line {}", p.line()))
                .unwrap_or_default();
            AppError::ValidationError(format!("Malformed CSV{}: {}", at, e))
        })?;
        // Quoted fields may span lines; report where the record starts
        let line = record
            .position()
            .map_or(rows.len() + issues.len() + 2, |p| p.line() as usize);
        if record.iter().all(str::is_empty) {
            continue;
        }
        match record.deserialize::<T>(Some(&headers)) {
            Ok(row) => rows.push((line, row)),
            Err(e) => issues.push(RowIssue {
                row: line,
                field: "row".to_string(),
                message: e.to_string(),
            }),
        }
    }

    if !issues.is_empty() {
        return Err(AppError::InvalidRows(issues));
    }
    if rows.is_empty() {
        return Err(AppError::ValidationError("The file has no data rows".into()));
    }
    Ok(rows)
}

/// Collects field problems for one row while converting its cells
struct RowParser<'a> {
    line: usize,
    issues: &'a mut Vec<RowIssue>,
}

impl<'a> RowParser<'a> {
    fn new(line: usize, issues: &'a mut Vec<RowIssue>) -> Self {
        Self { line, issues }
    }

    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.issues.push(RowIssue {
            row: self.line,
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn required(&mut self, field: &str, value: Option<String>) -> Option<String> {
        match value.filter(|v| !v.is_empty()) {
            Some(v) => Some(v),
            None => {
                self.fail(field, "Required");
                None
            }
        }
    }

    fn parse<T: FromStr>(&mut self, field: &str, value: Option<String>, what: &str) -> Option<T> {
        let raw = value.filter(|v| !v.is_empty())?;
        match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                self.fail(field, format!("'{}' is not {}", raw, what));
                None
            }
        }
    }

    fn required_parse<T: FromStr>(
        &mut self,
        field: &str,
        value: Option<String>,
        what: &str,
    ) -> Option<T> {
        let raw = self.required(field, value)?;
        self.parse(field, Some(raw), what)
    }
}

fn row_error(line: usize, err: AppError) -> RowIssue {
    match err {
        AppError::Validation { field, message } => RowIssue {
            row: line,
            field,
            message,
        },
        other => RowIssue {
            row: line,
            field: "row".to_string(),
            message: other.to_string(),
        },
    }
}

// ============================================================================
// Stock batches
// ============================================================================

#[derive(Debug, Deserialize)]
struct StockCsvRow {
    sku: Option<String>,
    boxes_purchased: Option<String>,
    quantity_per_box: Option<String>,
    unit_per_box: Option<String>,
    cost_per_box: Option<String>,
    batch_number: Option<String>,
    boxes_remaining: Option<String>,
    supplier_name: Option<String>,
    reorder_level: Option<String>,
    critical_level: Option<String>,
}

struct ParsedStockRow {
    line: usize,
    sku: String,
    input: CreateBatchInput,
    boxes_remaining: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockUploadResult {
    pub created: usize,
    pub batches: Vec<StockBatch>,
}

fn parse_stock_rows(rows: Vec<(usize, StockCsvRow)>) -> AppResult<Vec<ParsedStockRow>> {
    let mut issues = Vec::new();
    let mut parsed = Vec::new();

    for (line, row) in rows {
        let mut p = RowParser::new(line, &mut issues);
        let sku = p
            .required("sku", row.sku)
            .and_then(|s| normalize_sku(&s).ok());
        let boxes_purchased: Option<i32> =
            p.required_parse("boxes_purchased", row.boxes_purchased, "a whole number");
        let quantity_per_box: Option<Decimal> =
            p.required_parse("quantity_per_box", row.quantity_per_box, "a number");
        let unit_per_box = p.required("unit_per_box", row.unit_per_box);
        let cost_per_box: Option<Decimal> =
            p.required_parse("cost_per_box", row.cost_per_box, "a number");
        let boxes_remaining: Option<i32> =
            p.parse("boxes_remaining", row.boxes_remaining, "a whole number");
        let reorder_level: Option<i32> =
            p.parse("reorder_level", row.reorder_level, "a whole number");
        let critical_level: Option<i32> =
            p.parse("critical_level", row.critical_level, "a whole number");

        if let (
            Some(sku),
            Some(boxes_purchased),
            Some(quantity_per_box),
            Some(unit_per_box),
            Some(cost_per_box),
        ) = (sku, boxes_purchased, quantity_per_box, unit_per_box, cost_per_box)
        {
            parsed.push(ParsedStockRow {
                line,
                sku,
                input: CreateBatchInput {
                    product_id: Uuid::nil(),
                    batch_number: row.batch_number,
                    boxes_purchased,
                    quantity_per_box,
                    unit_per_box,
                    cost_per_box,
                    supplier_name: row.supplier_name,
                    reorder_level,
                    critical_level,
                },
                boxes_remaining,
            });
        }
    }

    if !issues.is_empty() {
        return Err(AppError::InvalidRows(issues));
    }
    Ok(parsed)
}

/// Build batches for rows whose SKUs resolved to products
fn resolve_batches(
    owner: Uuid,
    rows: Vec<ParsedStockRow>,
    products: &[Product],
) -> AppResult<Vec<StockBatch>> {
    let missing: BTreeSet<String> = rows
        .iter()
        .filter(|r| !products.iter().any(|p| p.sku == r.sku))
        .map(|r| r.sku.clone())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::MissingSkus(missing.into_iter().collect()));
    }

    let mut issues = Vec::new();
    let mut batches = Vec::new();
    for mut row in rows {
        if let Some(product) = products.iter().find(|p| p.sku == row.sku) {
            row.input.product_id = product.id;
        }
        match build_batch(owner, &row.input, row.boxes_remaining) {
            Ok(batch) => batches.push(batch),
            Err(err) => issues.push(row_error(row.line, err)),
        }
    }

    if !issues.is_empty() {
        return Err(AppError::InvalidRows(issues));
    }
    Ok(batches)
}

// ============================================================================
// Products
// ============================================================================

#[derive(Debug, Deserialize)]
struct ProductCsvRow {
    sku: Option<String>,
    name: Option<String>,
    unit_type: Option<String>,
    base_unit: Option<String>,
    category: Option<String>,
    description: Option<String>,
    default_supplier: Option<String>,
}

fn parse_product_rows(owner: Uuid, rows: Vec<(usize, ProductCsvRow)>) -> AppResult<Vec<Product>> {
    let mut issues = Vec::new();
    let mut products: Vec<Product> = Vec::new();

    for (line, row) in rows {
        let input = CreateProductInput {
            sku: row.sku.unwrap_or_default(),
            name: row.name.unwrap_or_default(),
            category: row.category,
            description: row.description,
            unit_type: row.unit_type.unwrap_or_default(),
            base_unit: row.base_unit.unwrap_or_default(),
            default_supplier: row.default_supplier,
        };
        match build_product(owner, &input) {
            Ok(product) if products.iter().any(|p| p.sku == product.sku) => {
                issues.push(RowIssue {
                    row: line,
                    field: "sku".to_string(),
                    message: format!("SKU {} appears more than once in the file", product.sku),
                });
            }
            Ok(product) => products.push(product),
            Err(err) => issues.push(row_error(line, err)),
        }
    }

    if !issues.is_empty() {
        return Err(AppError::InvalidRows(issues));
    }
    Ok(products)
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductUploadResult {
    pub created: usize,
    pub products: Vec<Product>,
}

// ============================================================================
// Sales
// ============================================================================

#[derive(Debug, Deserialize)]
struct SaleCsvRow {
    product_id: Option<String>,
    batch_id: Option<String>,
    boxes_sold: Option<String>,
    selling_price_per_box: Option<String>,
    customer_name: Option<String>,
    notes: Option<String>,
}

/// Outcome of one uploaded sale row
#[derive(Debug, Clone, Serialize)]
pub struct SaleRowOutcome {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesUploadResult {
    pub succeeded: usize,
    pub failed: usize,
    pub rows: Vec<SaleRowOutcome>,
}

fn parse_sale_row(line: usize, row: SaleCsvRow) -> Result<RecordSaleInput, Vec<RowIssue>> {
    let mut issues = Vec::new();
    let mut p = RowParser::new(line, &mut issues);
    let product_id: Option<Uuid> = p.required_parse("product_id", row.product_id, "a valid id");
    let batch_id: Option<Uuid> = p.required_parse("batch_id", row.batch_id, "a valid id");
    let boxes_sold: Option<i32> = p.required_parse("boxes_sold", row.boxes_sold, "a whole number");
    let price: Option<Decimal> =
        p.required_parse("selling_price_per_box", row.selling_price_per_box, "a number");

    match (product_id, batch_id, boxes_sold, price) {
        (Some(product_id), Some(batch_id), Some(boxes_sold), Some(selling_price_per_box)) => {
            Ok(RecordSaleInput {
                product_id,
                batch_id,
                boxes_sold,
                selling_price_per_box,
                customer_name: row.customer_name,
                notes: row.notes,
            })
        }
        _ => Err(issues),
    }
}

// ============================================================================
// Service
// ============================================================================

/// Bulk upload service
#[derive(Clone)]
pub struct BulkUploadService {
    catalog: CatalogService,
    ledger: LedgerService,
    store: Arc<dyn LedgerStore>,
}

impl BulkUploadService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            ledger: LedgerService::new(store.clone()),
            store,
        }
    }

    /// Import stock batches; every SKU must belong to one of the owner's products
    pub async fn upload_stock(&self, owner: Uuid, data: &[u8]) -> AppResult<StockUploadResult> {
        let rows = read_rows::<StockCsvRow>(data, STOCK_COLUMNS)?;
        let parsed = parse_stock_rows(rows)?;

        let skus: Vec<String> = parsed
            .iter()
            .map(|r| r.sku.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let products = self.store.find_products_by_sku(owner, &skus).await?;
        let batches = resolve_batches(owner, parsed, &products)?;

        self.store
            .insert_batches(&batches)
            .await
            .map_err(|err| match err {
                StoreError::ForeignKeyViolation(_) => AppError::NotFound("Product".into()),
                other => other.into(),
            })?;

        tracing::info!(count = batches.len(), "Stock batches imported");
        Ok(StockUploadResult {
            created: batches.len(),
            batches,
        })
    }

    /// Import products; duplicate SKUs reject the whole file
    pub async fn upload_products(&self, owner: Uuid, data: &[u8]) -> AppResult<ProductUploadResult> {
        let rows = read_rows::<ProductCsvRow>(data, PRODUCT_COLUMNS)?;
        let products = parse_product_rows(owner, rows)?;
        let products = self.catalog.insert_all(products).await?;
        Ok(ProductUploadResult {
            created: products.len(),
            products,
        })
    }

    /// Record each sale row in file order; rows succeed or fail independently
    pub async fn upload_sales(&self, owner: Uuid, data: &[u8]) -> AppResult<SalesUploadResult> {
        let rows = read_rows::<SaleCsvRow>(data, SALES_COLUMNS)?;
        let mut outcomes = Vec::with_capacity(rows.len());

        for (line, row) in rows {
            let outcome = match parse_sale_row(line, row) {
                Ok(input) => match self.ledger.apply_sale(owner, input).await {
                    Ok(receipt) => SaleRowOutcome {
                        row: line,
                        sale_id: Some(receipt.sale.id),
                        error: None,
                    },
                    Err(err @ AppError::CompensationFailure { .. }) => return Err(err),
                    Err(err) => SaleRowOutcome {
                        row: line,
                        sale_id: None,
                        error: Some(err.to_string()),
                    },
                },
                Err(issues) => SaleRowOutcome {
                    row: line,
                    sale_id: None,
                    error: Some(
                        issues
                            .iter()
                            .map(|i| format!("{}: {}", i.field, i.message))
                            .collect::<Vec<_>>()
                            .join("; "),
                    ),
                },
            };
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.sale_id.is_some()).count();
        tracing::info!(succeeded, failed = outcomes.len() - succeeded, "Sales imported");
        Ok(SalesUploadResult {
            succeeded,
            failed: outcomes.len() - succeeded,
            rows: outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header(" Boxes Purchased "), "boxes_purchased");
        assert_eq!(normalize_header("SKU"), "sku");
    }

    #[test]
    fn test_missing_columns_rejected() {
        let csv = b"sku,boxes_purchased\nA,1\n";
        let err = read_rows::<StockCsvRow>(csv, STOCK_COLUMNS).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("quantity_per_box")));
    }

    #[test]
    fn test_row_limit() {
        let mut csv = String::from("sku,name,unit_type,base_unit\n");
        for i in 0..=MAX_UPLOAD_ROWS {
            csv.push_str(&format!("S{},Name,count,box\n", i));
        }
        assert!(read_rows::<ProductCsvRow>(csv.as_bytes(), PRODUCT_COLUMNS).is_err());
    }

    #[test]
    fn test_templates_parse() {
        let rows = read_rows::<StockCsvRow>(STOCK_TEMPLATE.as_bytes(), STOCK_COLUMNS).unwrap();
        let parsed = parse_stock_rows(rows).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].sku, "TEA-001");
        assert_eq!(parsed[0].input.reorder_level, Some(5));
        assert_eq!(parsed[0].boxes_remaining, None);

        let rows = read_rows::<ProductCsvRow>(PRODUCT_TEMPLATE.as_bytes(), PRODUCT_COLUMNS).unwrap();
        assert_eq!(parse_product_rows(Uuid::new_v4(), rows).unwrap().len(), 1);
    }

    #[test]
    fn test_stock_row_issues_carry_line_numbers() {
        let csv = b"sku,boxes_purchased,quantity_per_box,unit_per_box,cost_per_box\n\
                    A,10,1,kg,5\n\
                    B,ten,1,kg,5\n";
        let rows = read_rows::<StockCsvRow>(csv, STOCK_COLUMNS).unwrap();
        match parse_stock_rows(rows) {
            Err(AppError::InvalidRows(issues)) => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].row, 3);
                assert_eq!(issues[0].field, "boxes_purchased");
            }
            other => panic!("expected row issues, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_duplicate_sku_in_product_file() {
        let csv = b"sku,name,unit_type,base_unit\nabc,One,count,box\nABC,Two,count,box\n";
        let rows = read_rows::<ProductCsvRow>(csv, PRODUCT_COLUMNS).unwrap();
        let err = parse_product_rows(Uuid::new_v4(), rows).unwrap_err();
        assert!(matches!(err, AppError::InvalidRows(issues) if issues[0].row == 3));
    }
}

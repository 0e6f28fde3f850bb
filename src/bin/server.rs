use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use cut_sheet_optimizer::config::{DEFAULT_KERF, OUTPUT_STEM, OptimizerConfig};
use cut_sheet_optimizer::loader::load_workbook;
use cut_sheet_optimizer::optimizer::Optimizer;
use cut_sheet_optimizer::stock::StockLengthTable;
use cut_sheet_optimizer::types::{CutSheet, CutSheetRow, DemandRecord, SkippedGroup};
use cut_sheet_optimizer::writer::write_cut_sheet;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

type AppState = Arc<StockLengthTable>;
type ApiError = (StatusCode, String);

#[derive(Deserialize, Serialize)]
struct OptimizeRequest {
    demand: Vec<DemandRecord>,
    #[serde(default = "default_kerf")]
    kerf: f64,
}

fn default_kerf() -> f64 {
    DEFAULT_KERF
}

#[derive(Serialize)]
struct OptimizeResponse {
    rows: Vec<CutSheetRow>,
    skipped: Vec<SkippedGroup>,
    dropped_records: usize,
    stick_count: usize,
    total_drop: f64,
    waste_percent: f64,
}

fn bad_request(e: impl ToString) -> ApiError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

fn run(
    stock: &StockLengthTable,
    kerf: f64,
    demand: &[DemandRecord],
) -> Result<CutSheet, ApiError> {
    let config = OptimizerConfig::with_kerf(kerf).map_err(bad_request)?;
    Optimizer::new(stock, config)
        .optimize_all(demand)
        .map_err(bad_request)
}

/// Keeps the records that validate; the rest are logged and counted.
fn partition_valid(records: Vec<DemandRecord>) -> (Vec<DemandRecord>, usize) {
    let mut valid = Vec::with_capacity(records.len());
    let mut dropped = 0;
    for record in records {
        match record.validated() {
            Ok(record) => valid.push(record),
            Err(e) => {
                tracing::warn!(error = %e, "demand record dropped");
                dropped += 1;
            }
        }
    }
    (valid, dropped)
}

fn is_workbook_name(name: &str) -> bool {
    let name = name.to_lowercase();
    name.ends_with(".xlsx") || name.ends_with(".xlsm")
}

/// Attachment header for `name`, with characters that would break the
/// quoted filename removed.
fn content_disposition(name: &str) -> String {
    let clean: String = name
        .chars()
        .filter(|c| (c.is_ascii_graphic() || *c == ' ') && !matches!(c, '"' | '\\'))
        .collect();
    let clean = match clean.trim() {
        "" => format!("{OUTPUT_STEM}.xlsx"),
        s => s.to_string(),
    };
    format!("attachment; filename=\"{clean}\"")
}

async fn optimize(
    State(stock): State<AppState>,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, ApiError> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /optimize"
    );

    let (demand, dropped_records) = partition_valid(req.demand);
    let sheet = run(&stock, req.kerf, &demand)?;

    Ok(Json(OptimizeResponse {
        dropped_records,
        stick_count: sheet.stick_count(),
        total_drop: sheet.total_drop(),
        waste_percent: sheet.waste_percent(),
        rows: sheet.rows,
        skipped: sheet.skipped,
    }))
}

/// Multipart upload: `file` (the workbook), optional `kerf` and
/// `return_name`. Responds with the cut sheet workbook as an attachment.
async fn optimize_workbook(
    State(stock): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload = None;
    let mut kerf = DEFAULT_KERF;
    let mut return_name = format!("{OUTPUT_STEM}.xlsx");

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(bad_request)?;
                upload = Some((filename, data));
            }
            "kerf" => {
                let text = field.text().await.map_err(bad_request)?;
                kerf = text
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| bad_request(format!("invalid kerf '{text}'")))?;
            }
            "return_name" => return_name = field.text().await.map_err(bad_request)?,
            _ => {}
        }
    }

    let (filename, data) = upload.ok_or_else(|| bad_request("missing 'file' field"))?;
    if !is_workbook_name(&filename) {
        return Err(bad_request(format!(
            "'{filename}' is not an .xlsx or .xlsm workbook"
        )));
    }
    tracing::info!(file = %filename, bytes = data.len(), kerf, "POST /optimize/workbook");

    let demand = load_workbook(Cursor::new(data)).map_err(bad_request)?;
    let sheet = run(&stock, kerf, &demand)?;
    let xlsx = write_cut_sheet(&sheet.rows)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&return_name)),
        ],
        xlsx,
    ))
}

fn app(stock: AppState) -> Router {
    Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/optimize", post(optimize))
        .route("/optimize/workbook", post(optimize_workbook))
        .with_state(stock)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[tokio::main]
async fn main() {
    let _sentry = sentry::init(sentry::ClientOptions {
        release: sentry::release_name!(),
        ..Default::default()
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let stock: AppState = match std::env::var("STOCK_TABLE") {
        Ok(path) => Arc::new(
            StockLengthTable::from_json_file(Path::new(&path)).expect("failed to load STOCK_TABLE"),
        ),
        Err(_) => Arc::new(StockLengthTable::standard()),
    };
    tracing::info!(entries = stock.len(), "stock table ready");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app(stock)).await.unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use calamine::{Data, Reader, Xlsx};
    use tower::ServiceExt;

    const BOUNDARY: &str = "cutsheetboundary";

    fn standard_app() -> Router {
        app(Arc::new(StockLengthTable::standard()))
    }

    /// `(field name, file name, content)` parts as a multipart body.
    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            let disposition = match filename {
                Some(f) => format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                ),
                None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"),
            };
            body.extend_from_slice(format!("--{BOUNDARY}\r\n{disposition}").as_bytes());
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/optimize/workbook")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    fn demand_workbook() -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Rods_Straight_1").unwrap();
        for (col, h) in ["Diameter_in", "Material", "Qty", "Length"].iter().enumerate() {
            sheet.write_string(0, 52 + col as u16, *h).unwrap();
        }
        sheet.write_number(1, 52, 0.375).unwrap();
        sheet.write_string(1, 53, "C").unwrap();
        sheet.write_number(1, 54, 3.0).unwrap();
        sheet.write_number(1, 55, 71.6875).unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_is_workbook_name() {
        assert!(is_workbook_name("demand.xlsx"));
        assert!(is_workbook_name("Fab Summary.XLSM"));
        assert!(!is_workbook_name("demand.csv"));
        assert!(!is_workbook_name("xlsx"));
        assert!(!is_workbook_name(""));
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("Job_42.xlsx"),
            "attachment; filename=\"Job_42.xlsx\""
        );
        assert_eq!(
            content_disposition("a\"b\r\n.xlsx"),
            "attachment; filename=\"ab.xlsx\""
        );
        assert_eq!(
            content_disposition("\n"),
            "attachment; filename=\"Cut_sheet.xlsx\""
        );
    }

    #[test]
    fn test_partition_valid() {
        let good = DemandRecord::new("t", "C", 0.5, 10.0, 2).unwrap();
        let mut zero_qty = good.clone();
        zero_qty.quantity = 0;
        let mut blank = good.clone();
        blank.material = "n/a".to_string();

        let (valid, dropped) = partition_valid(vec![zero_qty, good.clone(), blank]);
        assert_eq!(valid, vec![good]);
        assert_eq!(dropped, 2);
    }

    #[tokio::test]
    async fn test_workbook_upload() {
        let workbook = demand_workbook();
        let req = upload(&[
            ("file", Some("fab_summary.xlsx"), workbook.as_slice()),
            ("kerf", None, b"0.125".as_slice()),
            ("return_name", None, b"Job_42.xlsx".as_slice()),
        ]);
        let res = standard_app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], XLSX_MIME);
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Job_42.xlsx\""
        );

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let mut sheet: Xlsx<_> = Xlsx::new(Cursor::new(body)).unwrap();
        let range = sheet.worksheet_range("Sheet1").unwrap();
        assert_eq!(
            range.get_value((1, 4)),
            Some(&Data::String("71 11/16, 71 11/16, 71 11/16".to_string()))
        );
        assert_eq!(range.get_value((1, 6)), Some(&Data::Float(23.9375)));
    }

    #[tokio::test]
    async fn test_workbook_upload_defaults() {
        let workbook = demand_workbook();
        let res = standard_app()
            .oneshot(upload(&[("file", Some("demand.xlsm"), workbook.as_slice())]))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Cut_sheet.xlsx\""
        );
    }

    #[tokio::test]
    async fn test_upload_rejected() {
        let workbook = demand_workbook();
        let cases: [&[(&str, Option<&str>, &[u8])]; 3] = [
            &[("file", Some("demand.csv"), b"Diameter,Material\n".as_slice())],
            &[("kerf", None, b"0.125".as_slice())],
            &[
                ("file", Some("demand.xlsx"), workbook.as_slice()),
                ("kerf", None, b"thin".as_slice()),
            ],
        ];
        for parts in cases {
            let res = standard_app().oneshot(upload(parts)).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_json_drops_invalid_records() {
        let body = serde_json::json!({
            "demand": [
                {"group_tab": "t", "material": "C", "diameter": 0.375, "length": 71.6875, "quantity": 3},
                {"group_tab": "t", "material": "C", "diameter": 0.375, "length": 10.0, "quantity": 0},
            ]
        });
        let req = Request::builder()
            .method("POST")
            .uri("/optimize")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let res = standard_app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["dropped_records"], 1);
        assert_eq!(json["stick_count"], 1);
        assert_eq!(json["rows"][0]["piece_count"], 3);
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let req = Request::builder()
            .uri("/up")
            .header(header::ORIGIN, "http://shop.example")
            .body(Body::empty())
            .unwrap();
        let res = standard_app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}

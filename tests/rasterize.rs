//! Rasterisation tests on PDFs generated in memory.
//!
//! These need a pdfium shared library. When none can be bound (see
//! `PDFIUM_LIB_PATH`), each test prints SKIP and returns.
//!
//! Run with:
//!   PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test rasterize -- --nocapture

use invoice_extract::pipeline::render::bind_pdfium;
use invoice_extract::{
    rasterize, rasterize_blocking, ChatRequest, ColorDepth, ExtractError, ExtractionClient,
    ExtractionConfig, ProviderError, RenderOptions, VisionProvider,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test if no pdfium library can be bound.
macro_rules! skip_unless_pdfium {
    () => {{
        init_tracing();
        if let Err(e) = bind_pdfium() {
            println!("SKIP: pdfium unavailable: {e}");
            return;
        }
    }};
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a PDF with one page per entry of `widths` (points), each 144pt tall
/// with a filled square in the lower-left corner.
fn build_pdf(widths: &[u32]) -> Vec<u8> {
    let n = widths.len();
    let mut objects: Vec<String> = Vec::new();

    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        n
    ));
    for (i, w) in widths.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {w} 144] /Contents {} 0 R >>",
            4 + 2 * i
        ));
        let content = "0 0 0 rg 10 10 40 40 re f";
        objects.push(format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }

    let xref_at = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for off in &offsets {
        xref.push_str(&format!("{off:010} 00000 n \n"));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    ));
    pdf.extend_from_slice(xref.as_bytes());
    pdf
}

fn at_72_dpi() -> RenderOptions {
    RenderOptions {
        dpi: 72,
        ..RenderOptions::default()
    }
}

struct CountingProvider {
    calls: AtomicUsize,
    images: AtomicUsize,
}

impl VisionProvider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.images.store(request.images().count(), Ordering::SeqCst);
        Ok(r#"{"receiver_name":"Acme","supplier_name":"Globex","invoice_total":10.5,"invoice_date":"2024/01/31"}"#.into())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn generated_pdf_has_valid_header_and_trailer() {
    let pdf = build_pdf(&[100, 200]);
    assert!(pdf.starts_with(b"%PDF-1.4"));
    assert!(pdf.ends_with(b"%%EOF\n"));
}

#[test]
fn three_page_document_yields_three_pages_in_order() {
    skip_unless_pdfium!();

    let pages = rasterize_blocking(&build_pdf(&[144, 216, 288]), &at_72_dpi()).unwrap();

    assert_eq!(pages.len(), 3);
    let indices: Vec<usize> = pages.iter().map(|p| p.index()).collect();
    assert_eq!(indices, [0, 1, 2]);

    // Page width is the page's identity: 2, 3 and 4 inches at 72 DPI.
    for (page, expected) in pages.iter().zip([144u32, 216, 288]) {
        assert!(
            page.width().abs_diff(expected) <= 1,
            "page {} width {} != {expected}",
            page.index(),
            page.width()
        );
        assert!(page.height().abs_diff(144) <= 1);
    }
}

#[test]
fn single_page_document_yields_one_page() {
    skip_unless_pdfium!();

    let pages = rasterize_blocking(&build_pdf(&[200]), &at_72_dpi()).unwrap();
    assert_eq!(pages.len(), 1);
    assert_ne!(pages[0].color_depth(), ColorDepth::Monochrome);
}

#[test]
fn longest_edge_is_capped() {
    skip_unless_pdfium!();

    let options = RenderOptions {
        dpi: 400,
        max_rendered_pixels: 300,
        password: None,
    };
    let pages = rasterize_blocking(&build_pdf(&[288, 144]), &options).unwrap();
    for page in &pages {
        assert!(page.width() <= 300 && page.height() <= 300, "{}x{}", page.width(), page.height());
    }
}

#[test]
fn corrupt_pdf_is_rasterization_error() {
    skip_unless_pdfium!();

    let err = rasterize_blocking(b"%PDF-1.4\nthis is not really a pdf", &at_72_dpi()).unwrap_err();
    assert!(matches!(err, ExtractError::Rasterization { .. }), "got: {err:?}");
}

#[tokio::test]
async fn async_rasterize_matches_blocking() {
    skip_unless_pdfium!();

    let pdf = build_pdf(&[144, 288]);
    let a = rasterize(&pdf, &at_72_dpi()).await.unwrap();
    let b = rasterize_blocking(&pdf, &at_72_dpi()).unwrap();
    let dims = |pages: &[invoice_extract::PageImage]| {
        pages.iter().map(|p| (p.width(), p.height())).collect::<Vec<_>>()
    };
    assert_eq!(dims(&a), dims(&b));
}

#[tokio::test]
async fn extract_pdf_sends_every_page_once() {
    skip_unless_pdfium!();

    let config = ExtractionConfig::builder()
        .dpi(72)
        .monochrome(true)
        .build()
        .unwrap();
    let client = ExtractionClient::new(
        config,
        CountingProvider {
            calls: AtomicUsize::new(0),
            images: AtomicUsize::new(0),
        },
    );

    let result = client.extract_pdf(&build_pdf(&[144, 216, 288])).await.unwrap();

    assert_eq!(result.invoice_total, 10.5);
    assert_eq!(client.provider().calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.provider().images.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn extract_pdf_rejects_non_pdf_before_provider_call() {
    let client = ExtractionClient::new(
        ExtractionConfig::default(),
        CountingProvider {
            calls: AtomicUsize::new(0),
            images: AtomicUsize::new(0),
        },
    );

    let err = client.extract_pdf(b"PK\x03\x04 zip archive").await.unwrap_err();

    assert!(matches!(err, ExtractError::Rasterization { .. }), "got: {err:?}");
    assert_eq!(client.provider().calls.load(Ordering::SeqCst), 0);
}

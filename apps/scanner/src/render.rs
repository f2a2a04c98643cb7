//! Plain-text rendering of a [`ScannerView`].

use std::fmt::Write as _;

use scan_core::{ScanResult, ScanStatus, ScannerView};

pub const CONFIDENCE_BAR_WIDTH: usize = 24;

pub fn render_view(view: &ScannerView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", status_line(view));

    match view.status() {
        ScanStatus::Idle => {
            let _ = writeln!(out, "  No data yet. Drop a .bin LiDAR file or enter its path.");
        }
        ScanStatus::Scanning => {
            let filename = view.snapshot.filename.as_deref().unwrap_or("file");
            let _ = writeln!(out, "  Uploading {filename} ...");
        }
        ScanStatus::Settled => {
            if let Some(result) = view.result() {
                render_result(&mut out, result, view.is_positive_class());
            } else if let Some(error) = view.error() {
                let _ = writeln!(out, "  ERROR ({}): {}", error.kind.label(), error.message);
            } else if view.snapshot.cancelled {
                let _ = writeln!(out, "  Scan cancelled.");
            }
        }
    }
    out
}

fn status_line(view: &ScannerView) -> String {
    let mut line = match view.status() {
        ScanStatus::Scanning => "[*] PROCESSING".to_string(),
        ScanStatus::Idle | ScanStatus::Settled => "[ ] READY".to_string(),
    };
    if view.drag_active {
        line.push_str("  (release to scan)");
    }
    line
}

fn render_result(out: &mut String, result: &ScanResult, positive: bool) {
    let _ = writeln!(out, "  Latency    {}", format_latency(result.processing_latency_ms));
    let _ = writeln!(out, "  Raw        {}", group_thousands(result.original_points));
    let _ = writeln!(out, "  Processed  {}", group_thousands(result.processed_points));
    let _ = writeln!(out, "  Source     {}", result.filename);
    if let Some(backend) = &result.backend {
        let _ = writeln!(out, "  Backend    {backend}");
    }

    let prediction = if positive {
        format!(">> {} <<", result.prediction)
    } else {
        result.prediction.clone()
    };
    let _ = writeln!(out, "  Prediction {prediction}");
    let _ = writeln!(
        out,
        "  Confidence {} {}",
        result.confidence,
        confidence_bar(result.confidence.as_str(), CONFIDENCE_BAR_WIDTH)
    );
}

pub fn format_latency(ms: f64) -> String {
    format!("{ms}ms")
}

pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Filled cells for a confidence string such as `"97.3%"`.
pub fn confidence_fill(confidence: &str, width: usize) -> usize {
    let percent = confidence
        .trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .map(|p| p.clamp(0.0, 100.0))
        .unwrap_or(0.0);
    ((percent / 100.0) * width as f64).round() as usize
}

fn confidence_bar(confidence: &str, width: usize) -> String {
    let filled = confidence_fill(confidence, width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

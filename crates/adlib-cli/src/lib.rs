use std::fmt::Write as _;
use std::path::Path;

use adlib_core::models::{CacheStats, CachedMedia, EvictionReport, MediaKind};
use adlib_infra::{init_telemetry, TelemetryOptions};

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Initialize tracing for the CLI. Defaults to warnings so command output stays readable.
pub fn init_tracing() {
    let options = TelemetryOptions::new("adlib-cli").with_default_filter("warn");
    if let Err(e) = init_telemetry(&options) {
        eprintln!("Warning: failed to initialize tracing: {}", e);
    }
}

pub fn render_stats_table(stats: &CacheStats, cache_dir: &Path) -> String {
    let images = stats.kind(MediaKind::Image);
    let videos = stats.kind(MediaKind::Video);
    let mut out = String::new();

    let _ = writeln!(out, "\n=== Media Cache Statistics ===\n");
    let _ = writeln!(out, "Cache directory: {}", cache_dir.display());
    let _ = writeln!(out, "\nTotal Media: {}", stats.count);
    let _ = writeln!(
        out,
        "Total Size: {:.2} MB ({:.2} GB, {} bytes)",
        stats.total_size_mb, stats.total_size_gb, stats.total_bytes
    );
    let _ = writeln!(out, "Analyzed:    {}", stats.count_with_analysis);
    let _ = writeln!(out, "Brands:      {}", stats.distinct_brand_count);

    let _ = writeln!(out, "\n--- By Kind ---");
    let _ = writeln!(
        out,
        "Images:    {:>6} files, {:>12.2} MB",
        images.count,
        adlib_core::models::bytes_to_mb(images.total_bytes)
    );
    let _ = writeln!(
        out,
        "Videos:    {:>6} files, {:>12.2} MB",
        videos.count,
        adlib_core::models::bytes_to_mb(videos.total_bytes)
    );

    out
}

pub fn render_media_table(records: &[CachedMedia]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<6} {:<20} {:>10} {:<9} {:<24} URL",
        "KIND", "BRAND", "SIZE", "ANALYZED", "COLORS"
    );
    for record in records {
        let _ = writeln!(
            out,
            "{:<6} {:<20} {:>10} {:<9} {:<24} {}",
            record.media_kind,
            truncate_string(record.brand_name.as_deref().unwrap_or("-"), 20),
            record.file_size_bytes,
            if record.has_analysis() { "yes" } else { "no" },
            truncate_string(record.dominant_colors.as_deref().unwrap_or("-"), 24),
            record.source_url
        );
    }
    let _ = writeln!(out, "\n{} result(s)", records.len());
    out
}

pub fn render_eviction(report: &EvictionReport) -> String {
    let mut out = String::new();
    if let Some(days) = report.max_age_days {
        let _ = writeln!(out, "Removed media downloaded {} or more days ago", days);
    }
    let _ = writeln!(
        out,
        "Removed: {} file(s), {:.2} MB freed",
        report.removed_count, report.freed_mb
    );
    let _ = writeln!(
        out,
        "Remaining: {} file(s), {:.2} MB",
        report.remaining_count, report.remaining_mb
    );
    if report.failed_file_deletes > 0 {
        let _ = writeln!(
            out,
            "Warning: {} file(s) could not be deleted",
            report.failed_file_deletes
        );
    }
    out
}

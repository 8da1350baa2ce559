use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Five-glyph rating strip, filled stars first. Ratings above 5 are clamped.
pub fn star_glyphs(rating: u8) -> String {
    let filled = usize::from(rating.min(5));
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

/// Day-first date in the display offset, e.g. `06/03/2026`.
pub fn format_display_date(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%d/%m/%Y").to_string()
}

pub fn display_offset(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix())
}

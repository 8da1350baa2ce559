use regex::Regex;
use std::sync::OnceLock;

fn id_pattern() -> &'static Regex {
    static ID: OnceLock<Regex> = OnceLock::new();
    ID.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("static id pattern"))
}

/// Upstream ids are opaque, but they end up in URL paths, so only plain
/// tokens are forwarded.
pub fn validate_id(id: &str) -> bool {
    id_pattern().is_match(id)
}

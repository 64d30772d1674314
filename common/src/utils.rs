// common/src/utils.rs
use regex::Regex;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Setup tracing for the client. `RUST_LOG` wins; otherwise production only
/// reports warnings and errors.
pub fn setup_tracing(production: bool) {
    let default_level = if production { "warn" } else { "debug" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        tracing::warn!("Tracing subscriber already installed: {}", e);
    }
}

fn marker_pattern() -> &'static Regex {
    static MARKERS: OnceLock<Regex> = OnceLock::new();
    MARKERS.get_or_init(|| {
        Regex::new(r"(%\[[^\]]*\]%)+").expect("marker pattern is a valid regex")
    })
}

/// Remove the `%[token]%` artifacts the backend leaves in answers
pub fn strip_markers(text: &str) -> String {
    marker_pattern().replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_single_marker() {
        assert_eq!(strip_markers("hi %[x1]%"), "hi ");
    }

    #[test]
    fn test_strip_consecutive_markers() {
        assert_eq!(strip_markers("a%[1]%%[doc-2]%b"), "ab");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(strip_markers("100% [sure]"), "100% [sure]");
    }
}

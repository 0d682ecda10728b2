use std::env;
use std::sync::OnceLock;

/// Output element count below which the engine fills planes on the calling thread.
pub(crate) const DEFAULT_PARALLEL_MIN_ELEMENTS: usize = 32 * 1024;

static D2S_PARALLEL_MIN_ELEMENTS: OnceLock<usize> = OnceLock::new();

fn parse_usize(value: &str) -> Option<usize> {
    let normalized = value.trim().replace('_', "");
    normalized.parse().ok()
}

pub(crate) fn parallel_min_elements() -> usize {
    *D2S_PARALLEL_MIN_ELEMENTS.get_or_init(|| match env::var("D2S_PARALLEL_MIN_ELEMENTS") {
        Ok(value) if !value.trim().is_empty() => {
            parse_usize(&value).unwrap_or(DEFAULT_PARALLEL_MIN_ELEMENTS)
        }
        _ => DEFAULT_PARALLEL_MIN_ELEMENTS,
    })
}

pub(crate) fn log_format() -> Option<String> {
    env::var("D2S_LOG_FORMAT")
        .ok()
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_usize_accepts_digit_separators() {
        assert_eq!(parse_usize(" 65_536 "), Some(65536));
        assert_eq!(parse_usize("many"), None);
    }
}

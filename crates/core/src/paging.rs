//! Pagination clamping shared by all list endpoints.

/// Default page size when the caller omits `limit`.
pub const DEFAULT_LIMIT: i64 = 50;

/// Hard cap on page size.
pub const MAX_LIMIT: i64 = 100;

/// Clamp an optional limit to `1..=MAX_LIMIT`, defaulting to [`DEFAULT_LIMIT`].
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Clamp an optional offset to be non-negative, defaulting to 0.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_absent() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_offset(None), 0);
    }

    #[test]
    fn limit_is_capped() {
        assert_eq!(clamp_limit(Some(10_000)), MAX_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-5)), 1);
    }

    #[test]
    fn negative_offset_clamps_to_zero() {
        assert_eq!(clamp_offset(Some(-1)), 0);
        assert_eq!(clamp_offset(Some(25)), 25);
    }
}

//! Error numbers the futex paths distinguish.
//!
//! The kernel reports futex outcomes through these three values; everything
//! else is folded into "woke up" by the callers.

/// Interrupted by a signal; the wait should be retried.
pub const EINTR: i32 = 4;
/// The futex word did not match the expected value.
pub const EAGAIN: i32 = 11;
/// A timed wait reached its deadline.
pub const ETIMEDOUT: i32 = 110;

/// Returns the message for one of the errno values above.
#[must_use]
pub fn message(errnum: i32) -> &'static str {
    match errnum {
        0 => "Success",
        EINTR => "Interrupted system call",
        EAGAIN => "Resource temporarily unavailable",
        ETIMEDOUT => "Connection timed out",
        _ => "Unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_values_match_linux() {
        assert_eq!(EINTR, 4);
        assert_eq!(EAGAIN, 11);
        assert_eq!(ETIMEDOUT, 110);
    }

    #[test]
    fn messages_are_distinct() {
        assert_ne!(message(EINTR), message(EAGAIN));
        assert_ne!(message(EAGAIN), message(ETIMEDOUT));
        assert_eq!(message(-1), "Unknown error");
    }
}

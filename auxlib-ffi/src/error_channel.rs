//! Process-wide last-error message.
//!
//! A fixed buffer the host can hold a pointer into. Every write replaces the
//! previous message; messages longer than the bound are cut at a character
//! boundary so the stored text stays valid UTF-8. The buffer is always
//! NUL-terminated.

use std::ffi::c_char;

/// Buffer size, terminator included.
pub const MAX_ERR_MSG_LEN: usize = 1000;

#[derive(Debug)]
pub struct ErrorChannel {
    buf: [u8; MAX_ERR_MSG_LEN],
    len: usize,
}

impl Default for ErrorChannel {
    fn default() -> Self {
        Self { buf: [0; MAX_ERR_MSG_LEN], len: 0 }
    }
}

impl ErrorChannel {
    /// Replace the stored message. An empty message is stored as the
    /// generic fallback so a failure never leaves the channel blank.
    pub fn set(&mut self, msg: &str) {
        let msg = if msg.is_empty() { crate::error::UNKNOWN_ERROR } else { msg };
        let mut n = msg.len().min(MAX_ERR_MSG_LEN - 1);
        while !msg.is_char_boundary(n) {
            n -= 1;
        }
        // interior NULs would hide the rest from C
        let bytes = &msg.as_bytes()[..n];
        let n = bytes.iter().position(|&b| b == 0).unwrap_or(n);
        self.buf[..n].copy_from_slice(&bytes[..n]);
        self.buf[n] = 0;
        self.len = n;
    }

    pub fn message(&self) -> &str {
        // set() only ever stores whole characters
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }

    /// NUL-terminated view for C. Stable for the channel's lifetime.
    #[inline]
    pub fn as_ptr(&self) -> *const c_char {
        self.buf.as_ptr().cast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    fn c_view(ch: &ErrorChannel) -> &CStr {
        unsafe { CStr::from_ptr(ch.as_ptr()) }
    }

    #[test]
    fn starts_empty_and_terminated() {
        let ch = ErrorChannel::default();
        assert_eq!(ch.message(), "");
        assert_eq!(c_view(&ch).to_bytes(), b"");
    }

    #[test]
    fn last_write_wins() {
        let mut ch = ErrorChannel::default();
        ch.set("a much longer first message");
        ch.set("short");
        assert_eq!(ch.message(), "short");
        assert_eq!(c_view(&ch).to_str().unwrap(), "short");
    }

    #[test]
    fn long_messages_are_bounded_on_char_boundaries() {
        let mut ch = ErrorChannel::default();
        ch.set(&"é".repeat(800));
        assert!(ch.message().len() <= MAX_ERR_MSG_LEN - 1);
        assert_eq!(ch.message().len() % 2, 0);
        assert_eq!(c_view(&ch).to_bytes().len(), ch.message().len());
    }

    #[test]
    fn empty_and_nul_messages() {
        let mut ch = ErrorChannel::default();
        ch.set("");
        assert_eq!(ch.message(), crate::error::UNKNOWN_ERROR);
        ch.set("before\0after");
        assert_eq!(ch.message(), "before");
    }
}

//! Terminal capability detection

/// Detects whether coloured output should be enabled on stdout.
pub fn supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

//! Application configuration.
//!
//! Plain values, fixed at build time. No files, no environment lookups: the
//! embedding binary decides where settings come from and hands them over.

/// Settings the kernel reads while dispatching.
#[derive(Clone, Debug)]
pub struct Config {
    /// Render failures with their message and cause chain instead of a
    /// generic page.
    pub debug: bool,
    /// Port used when redirecting to http.
    pub http_port: u16,
    /// Port used when redirecting to https.
    pub https_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self { debug: false, http_port: 80, https_port: 443 }
    }
}

impl Config {
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    pub fn https_port(mut self, port: u16) -> Self {
        self.https_port = port;
        self
    }
}

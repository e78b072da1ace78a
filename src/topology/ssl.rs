//! SSL context used by TLS health checkers.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SslContext {
    pub password: Option<String>,
    pub ca_file: Option<String>,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
}

/// The settable fields of an [`SslContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslField {
    Password,
    CaFile,
    CertFile,
    KeyFile,
}

impl SslField {
    /// Name used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            SslField::Password => "password",
            SslField::CaFile => "cafile",
            SslField::CertFile => "certfile",
            SslField::KeyFile => "keyfile",
        }
    }
}

impl SslContext {
    pub fn field_mut(&mut self, field: SslField) -> &mut Option<String> {
        match field {
            SslField::Password => &mut self.password,
            SslField::CaFile => &mut self.ca_file,
            SslField::CertFile => &mut self.cert_file,
            SslField::KeyFile => &mut self.key_file,
        }
    }
}

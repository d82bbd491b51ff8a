//! TLS negotiation ordering for the two supported TDS handshake shapes.

/// Which side of the handshake TLS happens on.
///
/// TDS 7.x negotiates encryption inside a cleartext PRELOGIN exchange and
/// only then upgrades the socket to TLS. TDS 8.0 strict mode requires TLS
/// to be established before any TDS traffic, including PRELOGIN itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsNegotiationMode {
    /// PRELOGIN is sent in cleartext (or negotiates encryption), then TLS
    /// is layered on for LOGIN7 and everything after.
    PreLoginFirst,
    /// TLS is established immediately after the TCP connect; PRELOGIN and
    /// LOGIN7 are both sent over the encrypted channel.
    TlsFirst,
}

impl TlsNegotiationMode {
    /// Derive the negotiation mode from a connection's strict-mode setting.
    ///
    /// `strict_mode` corresponds to `TlsConfig::strict_mode` / the
    /// TDS 8.0 `Encrypt=strict` connection option.
    #[must_use]
    pub fn from_encrypt_mode(strict_mode: bool) -> Self {
        if strict_mode {
            Self::TlsFirst
        } else {
            Self::PreLoginFirst
        }
    }

    /// Whether TLS must be established before any TDS traffic is sent.
    #[must_use]
    pub fn is_tls_first(&self) -> bool {
        matches!(self, Self::TlsFirst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_mode_is_tls_first() {
        assert!(TlsNegotiationMode::from_encrypt_mode(true).is_tls_first());
    }

    #[test]
    fn non_strict_mode_is_prelogin_first() {
        assert!(!TlsNegotiationMode::from_encrypt_mode(false).is_tls_first());
    }
}

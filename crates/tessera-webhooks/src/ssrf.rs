//! SSRF protection for webhook destinations: scheme/hostname allowlisting
//! plus async DNS resolution with non-global IP blocking, so a webhook URL
//! can never be used to probe internal infrastructure.

use std::net::IpAddr;
use std::time::Duration;

use url::Url;

#[derive(Debug, Clone)]
pub struct SsrfGuardConfig {
    pub require_https: bool,
    pub allowed_domains: Vec<String>,
    pub dns_timeout: Duration,
}

impl Default for SsrfGuardConfig {
    fn default() -> Self {
        Self {
            require_https: false,
            allowed_domains: Vec::new(),
            dns_timeout: Duration::from_secs(5),
        }
    }
}

/// `Ok(())` means the URL is safe to deliver to (or at worst, DNS
/// resolution failed in a way the HTTP client will surface more clearly
/// later — a `gaierror`-equivalent is logged, not treated as invalid).
/// `Err(reason)` means the URL must not be used.
pub async fn validate_webhook_url(url: &str, config: &SsrfGuardConfig) -> Result<(), String> {
    let parsed = Url::parse(url).map_err(|e| format!("invalid URL: {e}"))?;

    if config.require_https && parsed.scheme() != "https" {
        return Err("webhook URL must use HTTPS in production".to_string());
    }
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(format!("invalid URL scheme: {}", parsed.scheme()));
    }
    let Some(hostname) = parsed.host_str() else {
        return Err("webhook URL must have a hostname".to_string());
    };

    if !config.allowed_domains.is_empty() {
        let hostname_lower = hostname.to_ascii_lowercase();
        let hostname_lower = hostname_lower.trim_end_matches('.');
        let allowed = config
            .allowed_domains
            .iter()
            .map(|d| d.to_ascii_lowercase())
            .any(|d| {
                let d = d.trim_end_matches('.').to_string();
                hostname_lower == d || hostname_lower.ends_with(&format!(".{d}"))
            });
        if !allowed {
            return Err("webhook URL hostname is not in allowlist".to_string());
        }
    }

    let port = parsed.port().unwrap_or(if parsed.scheme() == "https" { 443 } else { 80 });
    let lookup = tokio::time::timeout(
        config.dns_timeout,
        tokio::net::lookup_host(format!("{hostname}:{port}")),
    )
    .await;

    match lookup {
        Ok(Ok(addrs)) => {
            for addr in addrs {
                if is_blocked_ip(addr.ip()) {
                    tracing::warn!(%url, ip = %addr.ip(), "webhook URL resolves to non-global IP");
                    return Err("webhook URL resolves to blocked IP range".to_string());
                }
            }
            Ok(())
        }
        Ok(Err(e)) => {
            // Resolution failure, not a timeout: log and allow through, the
            // real connection attempt will fail with a clearer error.
            tracing::warn!(%url, error = %e, "could not resolve webhook hostname");
            Ok(())
        }
        Err(_) => Err("DNS resolution timed out".to_string()),
    }
}

fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 0x40 // 100.64.0.0/10
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // unique local fc00::/7
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // link-local fe80::/10
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_private_and_loopback_v4() {
        assert!(is_blocked_ip("127.0.0.1".parse().unwrap()));
        assert!(is_blocked_ip("10.0.0.5".parse().unwrap()));
        assert!(is_blocked_ip("192.168.1.1".parse().unwrap()));
        assert!(is_blocked_ip("169.254.1.1".parse().unwrap()));
        assert!(!is_blocked_ip("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn blocks_unique_local_and_link_local_v6() {
        assert!(is_blocked_ip("::1".parse().unwrap()));
        assert!(is_blocked_ip("fc00::1".parse().unwrap()));
        assert!(is_blocked_ip("fe80::1".parse().unwrap()));
        assert!(!is_blocked_ip("2001:4860:4860::8888".parse().unwrap()));
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let result = validate_webhook_url("ftp://example.com", &SsrfGuardConfig::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn https_required_in_production_rejects_http() {
        let config = SsrfGuardConfig {
            require_https: true,
            ..Default::default()
        };
        let result = validate_webhook_url("http://example.com/hook", &config).await;
        assert!(result.is_err());
    }
}

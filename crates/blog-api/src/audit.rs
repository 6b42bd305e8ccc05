//! Security audit logging for authentication events
//!
//! All audit events are logged at INFO level with the "audit" target so they
//! can be filtered and routed separately from application logs, e.g.
//! `RUST_LOG=audit=info`.
//!
//! Author: hephaex@gmail.com

use crate::state::AppState;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, Extensions, HeaderMap},
};
use blog_core::UserId;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::info;

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    RegistrationSuccess {
        user_id: UserId,
        username: String,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    RegistrationFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    LoginSuccess {
        user_id: UserId,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// `reason` is internal only; the client gets the same 401 either way
    LoginFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Missing, malformed, expired or forged bearer token
    InvalidToken {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Authenticated caller tried to mutate a resource they do not own
    AccessDenied {
        user_id: UserId,
        owner_id: UserId,
        resource: String,
    },
}

/// Request metadata attached to audit events
///
/// The IP is the TCP peer unless that peer is a trusted proxy, in which case
/// the forwarding headers are believed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn resolve(headers: &HeaderMap, peer: Option<IpAddr>, trusted_proxies: &[IpAddr]) -> Self {
        let ip = match peer {
            Some(peer) if trusted_proxies.contains(&peer) => {
                Some(forwarded_client_ip(headers, trusted_proxies).unwrap_or(peer))
            }
            other => other,
        };

        Self {
            ip_address: ip.map(|ip| ip.to_string()),
            user_agent: extract_user_agent(headers),
        }
    }

    /// Resolve from a request's headers and its `ConnectInfo`, if any
    pub fn from_request(
        headers: &HeaderMap,
        extensions: &Extensions,
        trusted_proxies: &[IpAddr],
    ) -> Self {
        let peer = extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Self::resolve(headers, peer, trusted_proxies)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::from_request(
            &parts.headers,
            &parts.extensions,
            &state.config.server.trusted_proxies,
        ))
    }
}

/// Log a security audit event with structured fields
///
/// The whole event is also serialized to JSON in the `event` field for log
/// aggregators.
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::RegistrationSuccess {
            user_id,
            email,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                event = %event_json,
                user_id = %user_id,
                email = %email,
                ip_address = ?ip_address,
                "Registration successful"
            );
        }
        AuditEvent::RegistrationFailure {
            email,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = ?ip_address,
                "Registration failed"
            );
        }
        AuditEvent::LoginSuccess {
            user_id,
            email,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                event = %event_json,
                user_id = %user_id,
                email = %email,
                ip_address = ?ip_address,
                "Login successful"
            );
        }
        AuditEvent::LoginFailure {
            email,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = ?ip_address,
                "Login failed"
            );
        }
        AuditEvent::InvalidToken {
            reason, ip_address, ..
        } => {
            info!(
                target: "audit",
                event = %event_json,
                reason = %reason,
                ip_address = ?ip_address,
                "Invalid token"
            );
        }
        AuditEvent::AccessDenied {
            user_id,
            owner_id,
            resource,
        } => {
            info!(
                target: "audit",
                event = %event_json,
                user_id = %user_id,
                owner_id = %owner_id,
                resource = %resource,
                "Access denied"
            );
        }
    }
}

/// Client address as reported by a trusted proxy
///
/// Walks `X-Forwarded-For` from the nearest hop and returns the first address
/// that is not itself a trusted proxy. Falls back to `X-Real-IP`.
fn forwarded_client_ip(headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> Option<IpAddr> {
    let hops: Vec<IpAddr> = headers
        .get("x-forwarded-for")
        .and_then(|xff| xff.to_str().ok())
        .map(|xff| xff.split(',').filter_map(|hop| hop.trim().parse().ok()).collect())
        .unwrap_or_default();

    if let Some(first) = hops.first() {
        let client = hops
            .iter()
            .rev()
            .find(|hop| !trusted_proxies.contains(*hop))
            .unwrap_or(first);
        return Some(*client);
    }

    headers
        .get("x-real-ip")
        .and_then(|ip| ip.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok())
}

/// Extract user agent from request headers
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::sync::Mutex;
    use tracing_subscriber::fmt::MakeWriter;

    /// Collects formatted log output for assertions
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl CapturedLogs {
        fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    fn capture(f: impl FnOnce()) -> Vec<serde_json::Value> {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(logs.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        logs.lines()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn forwarded(xff: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(xff));
        headers
    }

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::LoginFailure {
            email: "a@x.com".to_string(),
            reason: "unknown email".to_string(),
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: None,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"login_failure\""));
        assert!(json.contains("unknown email"));
    }

    #[test]
    fn test_audit_log_uses_audit_target() {
        let lines = capture(|| {
            audit_log(&AuditEvent::InvalidToken {
                reason: "Token has expired".to_string(),
                ip_address: Some("203.0.113.7".to_string()),
                user_agent: None,
            });
        });

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["target"], "audit");
        assert_eq!(lines[0]["level"], "INFO");
        assert_eq!(lines[0]["fields"]["reason"], "Token has expired");

        let event: serde_json::Value =
            serde_json::from_str(lines[0]["fields"]["event"].as_str().unwrap()).unwrap();
        assert_eq!(event["event_type"], "invalid_token");
        assert_eq!(event["ip_address"], "203.0.113.7");
    }

    #[test]
    fn test_access_denied_is_logged() {
        let lines = capture(|| {
            audit_log(&AuditEvent::AccessDenied {
                user_id: 2,
                owner_id: 1,
                resource: "post:1".to_string(),
            });
        });

        assert_eq!(lines[0]["target"], "audit");
        assert_eq!(lines[0]["fields"]["message"], "Access denied");
        assert_eq!(lines[0]["fields"]["resource"], "post:1");
    }

    #[test]
    fn test_untrusted_peer_cannot_spoof_forwarded_for() {
        let headers = forwarded("6.6.6.6");

        let info = ClientInfo::resolve(&headers, Some(ip("198.51.100.20")), &[ip("127.0.0.1")]);
        assert_eq!(info.ip_address.as_deref(), Some("198.51.100.20"));
    }

    #[test]
    fn test_trusted_proxy_forwarded_for() {
        let trusted = [ip("127.0.0.1"), ip("10.0.0.2")];

        // Client-supplied entries left of the first untrusted hop are ignored
        let headers = forwarded("6.6.6.6, 203.0.113.1, 10.0.0.2");
        let info = ClientInfo::resolve(&headers, Some(ip("127.0.0.1")), &trusted);
        assert_eq!(info.ip_address.as_deref(), Some("203.0.113.1"));

        let headers = forwarded("10.0.0.2");
        let info = ClientInfo::resolve(&headers, Some(ip("127.0.0.1")), &trusted);
        assert_eq!(info.ip_address.as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn test_trusted_proxy_without_usable_headers() {
        let trusted = [ip("127.0.0.1")];

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.4"));
        let info = ClientInfo::resolve(&headers, Some(ip("127.0.0.1")), &trusted);
        assert_eq!(info.ip_address.as_deref(), Some("192.0.2.4"));

        let headers = forwarded("not-an-ip");
        let info = ClientInfo::resolve(&headers, Some(ip("127.0.0.1")), &trusted);
        assert_eq!(info.ip_address.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_client_info_from_request_extensions() {
        let mut headers = forwarded("6.6.6.6");
        headers.insert(
            axum::http::header::USER_AGENT,
            HeaderValue::from_static("curl/8.0"),
        );
        let mut extensions = Extensions::new();

        let info = ClientInfo::from_request(&headers, &extensions, &[ip("127.0.0.1")]);
        assert_eq!(info.ip_address, None);
        assert_eq!(info.user_agent.as_deref(), Some("curl/8.0"));

        extensions.insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 9], 40000))));
        let info = ClientInfo::from_request(&headers, &extensions, &[ip("127.0.0.1")]);
        assert_eq!(info.ip_address.as_deref(), Some("192.0.2.9"));
    }
}

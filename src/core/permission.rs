//! Permission arbitration - Decide hardware-capability requests from sessions

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Capability class requested by a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    AudioCapture,
    VideoCapture,
    AudioVideoCapture,
    /// Anything the arbiter does not handle (geolocation, notifications, ...)
    Other,
}

impl Capability {
    pub fn is_media(&self) -> bool {
        !matches!(self, Self::Other)
    }

    /// Human-readable object of "wants to access ..."
    pub fn description(&self) -> &'static str {
        match self {
            Self::AudioCapture => "the microphone",
            Self::VideoCapture => "the camera",
            Self::AudioVideoCapture => "the camera and the microphone",
            Self::Other => "an unsupported device",
        }
    }
}

/// Outcome for a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionDecision {
    Grant,
    Deny,
}

impl From<bool> for PermissionDecision {
    fn from(granted: bool) -> Self {
        if granted {
            Self::Grant
        } else {
            Self::Deny
        }
    }
}

/// A permission event raised by a session's rendering context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequest {
    pub origin: String,
    pub capability: Capability,
}

/// Synchronous yes/no question to the user.
///
/// Returns `None` when no answer can be obtained (window closed, prompt
/// channel gone); the arbiter treats that as a refusal.
pub trait PromptProvider: Send + Sync {
    fn ask(&self, title: &str, message: &str) -> Option<bool>;
}

/// Handling of media requests from origins outside the trusted domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UntrustedMediaPolicy {
    #[default]
    Ask,
    Deny,
}

impl UntrustedMediaPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ask => "Ask",
            Self::Deny => "Deny",
        }
    }
}

/// Which origins are trusted and what to do with the rest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustPolicy {
    pub trusted_domains: Vec<String>,
    pub untrusted_media: UntrustedMediaPolicy,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            trusted_domains: vec!["whatsapp.com".to_string()],
            untrusted_media: UntrustedMediaPolicy::Ask,
        }
    }
}

impl TrustPolicy {
    /// True when the origin's host is a trusted domain or one of its subdomains
    pub fn is_trusted(&self, origin: &str) -> bool {
        let host = origin_host(origin);
        if host.is_empty() {
            return false;
        }
        self.trusted_domains.iter().any(|domain| {
            let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
            !domain.is_empty()
                && (host == domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|rest| rest.ends_with('.')))
        })
    }
}

/// Lowercased host part of an origin or URL
fn origin_host(origin: &str) -> String {
    let rest = origin
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(origin);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority
        .rsplit_once('@')
        .map(|(_, host)| host)
        .unwrap_or(authority);
    let host = match host_port.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => host_port,
    };
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Decide a single request.
///
/// Non-media capabilities are denied and media from a trusted origin is
/// granted, both without consulting `prompt`. Everything else is put to the
/// user; no answer means deny.
pub fn decide(
    origin: &str,
    capability: Capability,
    is_trusted_domain: bool,
    session_label: &str,
    prompt: &dyn PromptProvider,
) -> PermissionDecision {
    if !capability.is_media() {
        debug!("Denying unhandled capability request from {}", origin);
        return PermissionDecision::Deny;
    }

    if is_trusted_domain {
        info!(
            "Auto-granting {:?} for {} in session '{}'",
            capability, origin, session_label
        );
        return PermissionDecision::Grant;
    }

    let message = format!(
        "The session '{}' wants to access {}.\n\nRequested by: {}\n\nDo you allow it?",
        session_label,
        capability.description(),
        origin
    );
    let decision = match prompt.ask("Access Request", &message) {
        Some(answer) => PermissionDecision::from(answer),
        None => {
            info!("Permission prompt unavailable, denying {:?} for {}", capability, origin);
            PermissionDecision::Deny
        }
    };

    info!(
        "User decision for {:?} from {} in session '{}': {:?}",
        capability, origin, session_label, decision
    );
    decision
}

/// Stateless arbiter applying a trust policy to session requests
#[derive(Debug, Clone, Default)]
pub struct PermissionArbiter {
    policy: TrustPolicy,
}

impl PermissionArbiter {
    pub fn new(policy: TrustPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    pub fn evaluate(
        &self,
        request: &PermissionRequest,
        session_label: &str,
        prompt: &dyn PromptProvider,
    ) -> PermissionDecision {
        let trusted = self.policy.is_trusted(&request.origin);

        if !trusted
            && request.capability.is_media()
            && self.policy.untrusted_media == UntrustedMediaPolicy::Deny
        {
            info!(
                "Denying {:?} for untrusted origin {} without asking",
                request.capability, request.origin
            );
            return PermissionDecision::Deny;
        }

        decide(
            &request.origin,
            request.capability,
            trusted,
            session_label,
            prompt,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedPrompt {
        answer: Option<bool>,
        calls: AtomicUsize,
        last_message: Mutex<String>,
    }

    impl ScriptedPrompt {
        fn new(answer: Option<bool>) -> Self {
            Self {
                answer,
                calls: AtomicUsize::new(0),
                last_message: Mutex::new(String::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PromptProvider for ScriptedPrompt {
        fn ask(&self, _title: &str, message: &str) -> Option<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_message.lock().unwrap() = message.to_string();
            self.answer
        }
    }

    #[test]
    fn test_trusted_media_granted_without_prompt() {
        let prompt = ScriptedPrompt::new(Some(false));
        let decision = decide(
            "web.service.example",
            Capability::AudioCapture,
            true,
            "Suporte",
            &prompt,
        );
        assert_eq!(decision, PermissionDecision::Grant);
        assert_eq!(prompt.calls(), 0);
    }

    #[test]
    fn test_untrusted_media_follows_user_answer() {
        let yes = ScriptedPrompt::new(Some(true));
        assert_eq!(
            decide("evil.example", Capability::VideoCapture, false, "Vendas", &yes),
            PermissionDecision::Grant
        );
        assert_eq!(yes.calls(), 1);
        let message = yes.last_message.lock().unwrap().clone();
        assert!(message.contains("'Vendas'"));
        assert!(message.contains("the camera"));

        let no = ScriptedPrompt::new(Some(false));
        assert_eq!(
            decide("evil.example", Capability::VideoCapture, false, "Vendas", &no),
            PermissionDecision::Deny
        );
    }

    #[test]
    fn test_unreachable_prompt_fails_closed() {
        let gone = ScriptedPrompt::new(None);
        assert_eq!(
            decide("evil.example", Capability::AudioVideoCapture, false, "X", &gone),
            PermissionDecision::Deny
        );
        assert_eq!(gone.calls(), 1);
    }

    #[test]
    fn test_other_capability_always_denied() {
        let prompt = ScriptedPrompt::new(Some(true));
        for trusted in [true, false] {
            assert_eq!(
                decide("web.whatsapp.com", Capability::Other, trusted, "X", &prompt),
                PermissionDecision::Deny
            );
        }
        assert_eq!(prompt.calls(), 0);
    }

    #[test]
    fn test_repeated_requests_are_not_cached() {
        let prompt = ScriptedPrompt::new(Some(true));
        let arbiter = PermissionArbiter::default();
        let request = PermissionRequest {
            origin: "https://meet.example.org".to_string(),
            capability: Capability::AudioCapture,
        };
        arbiter.evaluate(&request, "A", &prompt);
        arbiter.evaluate(&request, "A", &prompt);
        assert_eq!(prompt.calls(), 2);
    }

    #[test]
    fn test_trust_matching() {
        let policy = TrustPolicy::default();
        assert!(policy.is_trusted("https://web.whatsapp.com"));
        assert!(policy.is_trusted("https://web.whatsapp.com:443/path"));
        assert!(policy.is_trusted("whatsapp.com"));
        assert!(policy.is_trusted("HTTPS://Web.WhatsApp.com/"));
        assert!(!policy.is_trusted("https://notwhatsapp.com"));
        assert!(!policy.is_trusted("https://whatsapp.com.evil.example"));
        assert!(!policy.is_trusted("https://whatsapp.com@evil.example"));
        assert!(!policy.is_trusted(""));
    }

    #[test]
    fn test_deny_policy_skips_prompt() {
        let prompt = ScriptedPrompt::new(Some(true));
        let arbiter = PermissionArbiter::new(TrustPolicy {
            untrusted_media: UntrustedMediaPolicy::Deny,
            ..TrustPolicy::default()
        });

        let untrusted = PermissionRequest {
            origin: "https://evil.example".to_string(),
            capability: Capability::AudioCapture,
        };
        assert_eq!(arbiter.evaluate(&untrusted, "A", &prompt), PermissionDecision::Deny);

        let trusted = PermissionRequest {
            origin: "https://web.whatsapp.com".to_string(),
            capability: Capability::AudioCapture,
        };
        assert_eq!(arbiter.evaluate(&trusted, "A", &prompt), PermissionDecision::Grant);
        assert_eq!(prompt.calls(), 0);
    }
}

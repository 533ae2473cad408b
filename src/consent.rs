/// User-consent check gating recording and playback.
///
/// The prompt itself (OS dialog, settings lookup) lives outside this
/// crate; the session only awaits the answer.
#[async_trait::async_trait]
pub trait ConsentGate: Send + Sync {
    /// Ask for recording permission. `false` leaves session state
    /// unchanged.
    async fn request_consent(&self) -> bool;
}

/// Consent gate that always grants. For demos and tests.
pub struct AlwaysConsent;

#[async_trait::async_trait]
impl ConsentGate for AlwaysConsent {
    async fn request_consent(&self) -> bool {
        true
    }
}

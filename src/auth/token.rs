//! Cached bearer tokens and the process-wide cache they live in.

// std
use std::sync::OnceLock;
// self
use crate::{_prelude::*, auth::Secret};

/// Tokens are treated as expired this long before the reported expiry.
pub const EXPIRY_SKEW: Duration = Duration::seconds(60);

/// Lifecycle status of a cached token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is usable.
	Active,
	/// Token is inside the expiry skew window or past its expiry.
	Expired,
}

/// Bearer token issued by an identity endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerToken {
	/// Access token secret; callers must avoid logging it.
	pub access_token: Secret,
	/// Instant the token was stored.
	pub issued_at: OffsetDateTime,
	/// Expiry reported by the identity endpoint, when it reported one.
	pub expires_at: Option<OffsetDateTime>,
}
impl BearerToken {
	/// Creates a token issued now without a known expiry.
	pub fn new(access_token: impl Into<Secret>) -> Self {
		Self { access_token: access_token.into(), issued_at: OffsetDateTime::now_utc(), expires_at: None }
	}

	/// Sets the expiry relative to [`Self::issued_at`].
	///
	/// A lifetime that runs past the representable calendar leaves the expiry unknown.
	pub fn expires_in(mut self, ttl: Duration) -> Self {
		self.expires_at = self.issued_at.checked_add(ttl);

		self
	}

	/// Sets an absolute expiry.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		match self.expires_at {
			Some(expires_at) if instant >= skewed(expires_at) => TokenStatus::Expired,
			_ => TokenStatus::Active,
		}
	}

	/// Returns `true` if the token is usable at the provided instant.
	pub fn is_active_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Active)
	}

	/// Formats the `Authorization` header value.
	pub fn header_value(&self) -> String {
		format!("Bearer {}", self.access_token.expose())
	}
}
impl Debug for BearerToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BearerToken")
			.field("access_token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Moves an expiry earlier by [`EXPIRY_SKEW`], saturating at the earliest instant.
pub(crate) fn skewed(expires_at: OffsetDateTime) -> OffsetDateTime {
	expires_at.checked_sub(EXPIRY_SKEW).unwrap_or(expires_at)
}

/// Single-slot token cache with a renewal guard.
///
/// Renewals take [`TokenCache::renewal_guard`] and re-check the slot through
/// [`TokenCache::replaced_since`] so concurrent callers that hit a 401 with the same stale token
/// trigger one upstream exchange.
#[derive(Debug, Default)]
pub struct TokenCache {
	current: RwLock<Option<BearerToken>>,
	renewal: AsyncMutex<()>,
}
impl TokenCache {
	/// Returns the cache shared by every client in the process.
	pub fn shared() -> Arc<TokenCache> {
		static SHARED: OnceLock<Arc<TokenCache>> = OnceLock::new();

		SHARED.get_or_init(Default::default).clone()
	}

	/// Returns the cached token regardless of its expiry.
	pub fn current(&self) -> Option<BearerToken> {
		self.current.read().clone()
	}

	/// Returns the cached token if it is still usable at `now`.
	pub fn usable_at(&self, now: OffsetDateTime) -> Option<BearerToken> {
		self.current.read().as_ref().filter(|token| token.is_active_at(now)).cloned()
	}

	/// Stores a freshly issued token.
	pub fn store(&self, token: BearerToken) {
		*self.current.write() = Some(token);
	}

	/// Drops the cached token.
	pub fn invalidate(&self) {
		self.current.write().take();
	}

	/// Returns true when the slot no longer holds `stale`.
	pub fn replaced_since(&self, stale: Option<&Secret>) -> bool {
		let guard = self.current.read();

		match (guard.as_ref().map(|token| &token.access_token), stale) {
			(Some(current), Some(stale)) => current != stale,
			(Some(_), None) => true,
			(None, _) => false,
		}
	}

	pub(crate) fn renewal_guard(&self) -> &AsyncMutex<()> {
		&self.renewal
	}
}

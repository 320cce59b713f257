//! Optional observability helpers for coordinator operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_coordinator.op` with the `op` and
//!   `stage` (call site) fields, plus warning events for self-healed failures.
//! - Enable `metrics` to increment the `oauth2_coordinator_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Coordinator operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Cache-first token lookup.
	TokenLookup,
	/// Lock-arbitrated token refresh.
	Refresh,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::TokenLookup => "token_lookup",
			OpKind::Refresh => "refresh",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a coordinator operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Emits a warning event for a swallowed or self-healed failure (when tracing is enabled).
///
/// Used at the boundaries the error-propagation policy declares silent: corrupted cache values,
/// background refresh failures, and lock release failures.
pub(crate) fn record_warning(op: OpKind, subject: &str, detail: &dyn Display) {
	#[cfg(feature = "tracing")]
	::tracing::warn!(op = op.as_str(), subject, detail = %detail, "oauth2_coordinator.warning");

	#[cfg(not(feature = "tracing"))]
	let _ = (op, subject, detail);
}

// self
use crate::{
	_prelude::*,
	obs::{FlowKind, FlowOutcome},
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_popup_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Maps a component result onto its terminal [`FlowOutcome`].
///
/// Cancellation is counted apart from failures so dashboards can tell abandoned popups
/// from broken handshakes.
pub fn outcome_of<T>(result: &Result<T>) -> FlowOutcome {
	match result {
		Ok(_) => FlowOutcome::Success,
		Err(Error::Handshake(HandshakeError::Cancelled)) => FlowOutcome::Cancelled,
		Err(_) => FlowOutcome::Failure,
	}
}

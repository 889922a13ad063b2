// crates.io
use tracing::{Instrument, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::OpKind};

/// A span builder used by governed operations.
#[derive(Clone, Debug)]
pub struct LookupSpan {
	span: tracing::Span,
}
impl LookupSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(op: OpKind, stage: &'static str) -> Self {
		Self { span: tracing::info_span!("mastery_lookup.op", op = op.as_str(), stage) }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}

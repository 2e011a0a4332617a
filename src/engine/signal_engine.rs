use super::dispatcher::DispatchHandle;
use crate::models::{Candle, SignalCandidate};
use crate::sinks::SinkEvent;
use crate::strategy::{ConfluenceScorer, Strategy};

/// Evaluates closed candles and hands results to the sinks
///
/// The live pipeline and the replay driver share this type, so both run the
/// exact same evaluation.
pub struct SignalEngine<S: Strategy = ConfluenceScorer> {
    strategy: S,
    dispatch: Option<DispatchHandle>,
}

impl<S: Strategy> SignalEngine<S> {
    pub fn new(strategy: S, dispatch: DispatchHandle) -> Self {
        Self {
            strategy,
            dispatch: Some(dispatch),
        }
    }

    /// Engine without sinks, used by replay
    pub fn detached(strategy: S) -> Self {
        Self {
            strategy,
            dispatch: None,
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Pure evaluation of the latest candle in `history`
    pub fn evaluate(&self, history: &[Candle]) -> Option<SignalCandidate> {
        self.strategy.evaluate(history)
    }

    /// Forward a closed candle to the sinks
    pub fn record_candle(&self, candle: &Candle) {
        if let Some(dispatch) = &self.dispatch {
            dispatch.emit(SinkEvent::CandleClosed(candle.clone()));
        }
    }

    /// Evaluate after a candle closed and emit the signal, if any
    pub fn on_candle_closed(&self, instrument: &str, history: &[Candle]) -> Option<SignalCandidate> {
        let signal = self.evaluate(history)?;

        tracing::info!(
            instrument = %instrument,
            direction = %signal.direction,
            confluences = signal.confluence_count,
            probability = signal.probability,
            entry = %signal.entry_minute,
            "Signal generated"
        );

        if let Some(dispatch) = &self.dispatch {
            dispatch.emit(SinkEvent::Signal(signal.clone()));
        }

        Some(signal)
    }
}

use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use synthflow_core::types::FlowEvent;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// How long the reader thread blocks in `poll` before checking whether the
/// loop is still listening.
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Events that drive the TUI loop.
pub enum TuiEvent {
    Key(KeyEvent),
    /// Terminal size changed; the view refits on the next draw.
    Resize,
    /// A run transition from the EventBus.
    Flow(FlowEvent),
    /// Tick timer for the spinner and clock.
    Tick,
}

impl TuiEvent {
    /// Terminal input the loop cares about; everything else is dropped.
    fn from_terminal(event: CrosstermEvent) -> Option<Self> {
        match event {
            CrosstermEvent::Key(key) => Some(TuiEvent::Key(key)),
            CrosstermEvent::Resize(_, _) => Some(TuiEvent::Resize),
            _ => None,
        }
    }
}

/// Merged event loop: terminal input + EventBus + tick timer.
///
/// Terminal input is read by one long-lived thread and queued, so a key
/// pressed while another branch wins the `select!` is delivered on a later
/// call instead of being lost.
pub struct EventLoop {
    input_rx: mpsc::UnboundedReceiver<TuiEvent>,
    flow_rx: broadcast::Receiver<FlowEvent>,
    tick_interval: Duration,
}

impl EventLoop {
    pub fn new(flow_rx: broadcast::Receiver<FlowEvent>, tick_interval: Duration) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || read_terminal(input_tx));
        Self::with_input(input_rx, flow_rx, tick_interval)
    }

    /// Build a loop over an existing input queue.
    pub fn with_input(
        input_rx: mpsc::UnboundedReceiver<TuiEvent>,
        flow_rx: broadcast::Receiver<FlowEvent>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            input_rx,
            flow_rx,
            tick_interval,
        }
    }

    /// Wait for the next event from any source.
    pub async fn next(&mut self) -> Option<TuiEvent> {
        let tick_sleep = tokio::time::sleep(self.tick_interval);

        tokio::select! {
            biased;
            Some(input) = self.input_rx.recv() => Some(input),
            result = self.flow_rx.recv() => {
                match result {
                    Ok(evt) => Some(TuiEvent::Flow(evt)),
                    Err(broadcast::error::RecvError::Lagged(_)) => Some(TuiEvent::Tick),
                    Err(_) => None,
                }
            }
            _ = tick_sleep => {
                Some(TuiEvent::Tick)
            }
        }
    }
}

/// Forward terminal input until the loop drops its receiver.
fn read_terminal(tx: mpsc::UnboundedSender<TuiEvent>) {
    while !tx.is_closed() {
        match event::poll(INPUT_POLL) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(e) => {
                debug!(error = %e, "Terminal poll failed, input reader exiting");
                return;
            }
        }
        let event = match event::read() {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "Terminal read failed, input reader exiting");
                return;
            }
        };
        if let Some(input) = TuiEvent::from_terminal(event) {
            if tx.send(input).is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};
    use synthflow_core::types::RunId;

    fn key(c: char) -> TuiEvent {
        TuiEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
    }

    #[tokio::test]
    async fn test_queued_keys_survive_flow_events() {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (flow_tx, flow_rx) = broadcast::channel(16);
        let mut events = EventLoop::with_input(input_rx, flow_rx, Duration::from_secs(60));

        flow_tx
            .send(FlowEvent::StartIgnored {
                run_id: RunId::new(),
            })
            .unwrap();
        input_tx.send(key('s')).unwrap();
        input_tx.send(key('r')).unwrap();

        let mut keys = Vec::new();
        let mut flows = 0;
        for _ in 0..3 {
            match events.next().await {
                Some(TuiEvent::Key(k)) => keys.push(k.code),
                Some(TuiEvent::Flow(_)) => flows += 1,
                _ => panic!("unexpected event"),
            }
        }
        assert_eq!(keys, vec![KeyCode::Char('s'), KeyCode::Char('r')]);
        assert_eq!(flows, 1);
    }

    #[test]
    fn test_terminal_events_translated() {
        assert!(matches!(
            TuiEvent::from_terminal(CrosstermEvent::Resize(80, 24)),
            Some(TuiEvent::Resize)
        ));
        assert!(matches!(
            TuiEvent::from_terminal(CrosstermEvent::FocusGained),
            None
        ));
        let press = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert!(matches!(
            TuiEvent::from_terminal(CrosstermEvent::Key(press)),
            Some(TuiEvent::Key(k)) if k.code == KeyCode::Enter
        ));
    }
}

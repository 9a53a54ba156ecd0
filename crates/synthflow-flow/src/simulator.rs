use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use synthflow_core::event::EventBus;
use synthflow_core::types::{FlowEvent, NodeStatus, RunId};

use crate::state::{FlowState, SharedFlow};

/// Run cursor plus running flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionProgress {
    /// Index of the next node to process; equals the node count when done.
    pub cursor: usize,
    pub running: bool,
}

// Transitions are plain methods on FlowState so they can be exercised
// without a runtime. The async driver below only paces them.
impl FlowState {
    /// Reset every node to pending and start a run at cursor 0.
    ///
    /// Returns false, changing nothing, when a run is already active.
    pub fn begin_run(&mut self) -> bool {
        if self.progress.running {
            return false;
        }
        for node in &mut self.nodes {
            node.status = NodeStatus::Pending;
        }
        self.progress = ExecutionProgress {
            cursor: 0,
            running: true,
        };
        self.generation += 1;
        true
    }

    /// Mark the node under the cursor in progress.
    ///
    /// Returns None once the cursor has passed the last node, which also
    /// ends the run.
    pub fn enter_step(&mut self) -> Option<usize> {
        if !self.progress.running {
            return None;
        }
        let step = self.progress.cursor;
        match self.nodes.get_mut(step) {
            Some(node) => {
                node.status = NodeStatus::InProgress;
                Some(step)
            }
            None => {
                self.progress.running = false;
                None
            }
        }
    }

    /// Complete the in-progress node under the cursor and advance.
    pub fn finish_step(&mut self) -> Option<usize> {
        if !self.progress.running {
            return None;
        }
        let step = self.progress.cursor;
        let node = self.nodes.get_mut(step)?;
        if node.status != NodeStatus::InProgress {
            return None;
        }
        node.status = NodeStatus::Completed;
        self.progress.cursor += 1;
        if self.progress.cursor >= self.nodes.len() {
            self.progress.running = false;
        }
        Some(step)
    }

    /// End the active run early. The in-flight node goes back to pending.
    pub fn halt(&mut self) -> Option<usize> {
        if !self.progress.running {
            return None;
        }
        let step = self.progress.cursor;
        if let Some(node) = self.nodes.get_mut(step) {
            if node.status == NodeStatus::InProgress {
                node.status = NodeStatus::Pending;
            }
        }
        self.progress.running = false;
        self.generation += 1;
        Some(step)
    }

    /// Halt, then return every node to pending with the cursor at zero.
    pub fn reset_run(&mut self) {
        self.halt();
        for node in &mut self.nodes {
            node.status = NodeStatus::Pending;
        }
        self.progress = ExecutionProgress::default();
    }
}

/// Cancellable handle on the task that paces a run.
struct TickTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TickTimer {
    /// Cancel the token so a tick mid-flight bails out, then abort the task
    /// in case it is parked outside the `select!`.
    fn cancel(&self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

struct ActiveRun {
    run_id: RunId,
    timer: TickTimer,
}

/// Walks the node list in order, one node per tick.
///
/// Each tick marks the node under the cursor in progress, waits
/// `step_delay`, then marks it completed. Edges are ignored: order is list
/// order. A pending tick is cancelled on [`stop`](Self::stop),
/// [`reset`](Self::reset) and drop, so nothing mutates the flow after
/// teardown.
pub struct ExecutionSimulator {
    flow: SharedFlow,
    event_bus: Arc<EventBus>,
    step_delay: Duration,
    current: Option<ActiveRun>,
}

impl ExecutionSimulator {
    pub fn new(flow: SharedFlow, event_bus: Arc<EventBus>, step_delay: Duration) -> Self {
        Self {
            flow,
            event_bus,
            step_delay,
            current: None,
        }
    }

    /// Start a run. A no-op returning false while a run is active.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(&mut self) -> bool {
        let started = {
            let mut state = self.flow.lock();
            if state.begin_run() {
                Some((state.nodes.len(), state.generation))
            } else {
                None
            }
        };

        let Some((total_steps, generation)) = started else {
            let run_id = self
                .current
                .as_ref()
                .map(|run| run.run_id.clone())
                .unwrap_or_default();
            info!(run_id = %run_id, "Run already in progress, start ignored");
            self.event_bus.publish(FlowEvent::StartIgnored { run_id });
            return false;
        };

        if let Some(previous) = self.current.take() {
            previous.timer.cancel();
        }

        let run_id = RunId::new();
        info!(run_id = %run_id, total_steps, "Run started");
        self.event_bus.publish(FlowEvent::RunStarted {
            run_id: run_id.clone(),
            total_steps,
        });

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(drive_run(
            self.flow.clone(),
            self.event_bus.clone(),
            self.step_delay,
            cancel.clone(),
            run_id.clone(),
            generation,
        ));
        self.current = Some(ActiveRun {
            run_id,
            timer: TickTimer { cancel, handle },
        });
        true
    }

    /// Stop the active run, cancelling its pending tick.
    ///
    /// Returns false when nothing was running.
    pub fn stop(&mut self) -> bool {
        let halted = self.flow.lock().halt();
        let Some(active) = self.current.take() else {
            return halted.is_some();
        };
        active.timer.cancel();
        match halted {
            Some(step) => {
                info!(run_id = %active.run_id, step, "Run stopped");
                self.event_bus.publish(FlowEvent::RunStopped {
                    run_id: active.run_id,
                    step,
                });
                true
            }
            None => false,
        }
    }

    /// Stop any run and return every node to pending.
    pub fn reset(&mut self) {
        self.stop();
        self.flow.lock().reset_run();
        debug!("Flow reset");
    }

    pub fn is_running(&self) -> bool {
        self.flow.lock().progress.running
    }

    pub fn progress(&self) -> ExecutionProgress {
        self.flow.lock().progress
    }

    /// Id of the most recent run, if any.
    pub fn run_id(&self) -> Option<&RunId> {
        self.current.as_ref().map(|run| &run.run_id)
    }
}

impl Drop for ExecutionSimulator {
    fn drop(&mut self) {
        if let Some(active) = self.current.take() {
            active.timer.cancel();
            self.flow.lock().halt();
        }
    }
}

/// Pace one run until it finishes or its token is cancelled.
async fn drive_run(
    flow: SharedFlow,
    bus: Arc<EventBus>,
    delay: Duration,
    cancel: CancellationToken,
    run_id: RunId,
    generation: u64,
) {
    loop {
        let entered = {
            let mut state = flow.lock();
            if cancel.is_cancelled() || state.generation != generation {
                return;
            }
            match state.enter_step() {
                Some(step) => Ok((step, state.nodes[step].id.clone())),
                None => Err(state.nodes.len()),
            }
        };

        let (step, node_id) = match entered {
            Ok(entered) => entered,
            Err(total_steps) => {
                info!(run_id = %run_id, total_steps, "Run finished");
                bus.publish(FlowEvent::RunFinished {
                    run_id,
                    total_steps,
                });
                return;
            }
        };

        debug!(run_id = %run_id, step, node_id = %node_id, "Step started");
        bus.publish(FlowEvent::StepStarted {
            run_id: run_id.clone(),
            step,
            node_id: node_id.clone(),
        });

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                debug!(run_id = %run_id, step, "Pending tick cancelled");
                return;
            }
        }

        let (done, total_steps) = {
            let mut state = flow.lock();
            if cancel.is_cancelled() || state.generation != generation {
                return;
            }
            if state.finish_step().is_none() {
                return;
            }
            (!state.progress.running, state.nodes.len())
        };

        debug!(run_id = %run_id, step, node_id = %node_id, "Step completed");
        bus.publish(FlowEvent::StepCompleted {
            run_id: run_id.clone(),
            step,
            node_id,
        });

        if done {
            info!(run_id = %run_id, total_steps, "Run finished");
            bus.publish(FlowEvent::RunFinished {
                run_id,
                total_steps,
            });
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FlowDefinition, FlowEdge, FlowNode};
    use crate::layout::LayoutOptions;
    use synthflow_core::config::LayoutDirection;
    use synthflow_core::types::NodeCategory;
    use tokio::sync::broadcast;

    const DELAY: Duration = Duration::from_millis(500);

    fn flow_of(ids: &[&str], edges: &[(&str, &str)]) -> FlowDefinition {
        FlowDefinition::new(
            ids.iter()
                .map(|id| FlowNode::new(*id, id.to_uppercase(), NodeCategory::Action))
                .collect(),
            edges.iter().map(|(s, t)| FlowEdge::new(*s, *t)).collect(),
        )
    }

    fn nine_nodes() -> FlowDefinition {
        let ids = ["n0", "n1", "n2", "n3", "n4", "n5", "n6", "n7", "n8"];
        let edges: Vec<(&str, &str)> = ids.windows(2).map(|w| (w[0], w[1])).collect();
        flow_of(&ids, &edges)
    }

    fn setup(def: &FlowDefinition) -> (SharedFlow, broadcast::Receiver<FlowEvent>, ExecutionSimulator) {
        let flow = FlowState::from_definition(def).into_shared();
        let bus = Arc::new(EventBus::default());
        let rx = bus.subscribe();
        let sim = ExecutionSimulator::new(flow.clone(), bus, DELAY);
        (flow, rx, sim)
    }

    /// Receive events until the run ends, snapshotting statuses at each one.
    async fn collect_run(
        rx: &mut broadcast::Receiver<FlowEvent>,
        flow: &SharedFlow,
    ) -> Vec<(FlowEvent, Vec<NodeStatus>)> {
        let mut seen = Vec::new();
        loop {
            let event = rx.recv().await.expect("event stream open");
            let terminal = event.is_terminal();
            seen.push((event, flow.lock().statuses()));
            if terminal {
                return seen;
            }
        }
    }

    fn completion_order(events: &[(FlowEvent, Vec<NodeStatus>)]) -> Vec<String> {
        events
            .iter()
            .filter_map(|(e, _)| match e {
                FlowEvent::StepCompleted { node_id, .. } => Some(node_id.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_transitions_without_runtime() {
        let mut state = FlowState::from_definition(&flow_of(&["a", "b"], &[]));
        assert!(state.begin_run());
        assert_eq!(state.progress, ExecutionProgress { cursor: 0, running: true });

        assert_eq!(state.enter_step(), Some(0));
        assert_eq!(state.nodes[0].status, NodeStatus::InProgress);
        assert_eq!(state.finish_step(), Some(0));
        assert_eq!(state.nodes[0].status, NodeStatus::Completed);
        assert_eq!(state.progress.cursor, 1);

        assert_eq!(state.enter_step(), Some(1));
        assert_eq!(state.finish_step(), Some(1));
        assert_eq!(state.progress, ExecutionProgress { cursor: 2, running: false });
        assert_eq!(state.enter_step(), None);
    }

    #[test]
    fn test_finish_requires_in_progress() {
        let mut state = FlowState::from_definition(&flow_of(&["a"], &[]));
        state.begin_run();
        assert_eq!(state.finish_step(), None);
        assert_eq!(state.nodes[0].status, NodeStatus::Pending);
        assert_eq!(state.progress.cursor, 0);
    }

    #[test]
    fn test_begin_run_rejected_while_running() {
        let mut state = FlowState::from_definition(&flow_of(&["a", "b"], &[]));
        state.begin_run();
        state.enter_step();
        state.finish_step();
        assert!(!state.begin_run());
        assert_eq!(state.progress.cursor, 1);
        assert_eq!(state.nodes[0].status, NodeStatus::Completed);
    }

    #[test]
    fn test_halt_returns_in_flight_node_to_pending() {
        let mut state = FlowState::from_definition(&flow_of(&["a", "b"], &[]));
        state.begin_run();
        state.enter_step();
        assert_eq!(state.halt(), Some(0));
        assert!(!state.progress.running);
        assert_eq!(state.count_status(NodeStatus::InProgress), 0);
        assert_eq!(state.halt(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nine_node_run_lr_completes_every_node() {
        let mut def = nine_nodes();
        let opts = LayoutOptions::default().with_direction(LayoutDirection::LeftToRight);
        crate::layout::layout_flow(&mut def.nodes, &def.edges, &opts);
        let (flow, mut rx, mut sim) = setup(&def);

        assert!(sim.start());
        let events = collect_run(&mut rx, &flow).await;

        assert!(matches!(events.last(), Some((FlowEvent::RunFinished { total_steps: 9, .. }, _))));
        let state = flow.snapshot();
        assert_eq!(state.progress, ExecutionProgress { cursor: 9, running: false });
        assert_eq!(state.nodes[0].status, NodeStatus::Completed);
        assert_eq!(state.nodes[8].status, NodeStatus::Completed);
        assert_eq!(state.count_status(NodeStatus::Pending), 0);
        assert_eq!(state.count_status(NodeStatus::InProgress), 0);
        assert!(!sim.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_node_passes_through_in_progress() {
        let (flow, mut rx, mut sim) = setup(&nine_nodes());
        sim.start();
        let events = collect_run(&mut rx, &flow).await;

        let mut expected_step = 0;
        let mut awaiting_completion = false;
        for (event, statuses) in &events {
            match event {
                FlowEvent::StepStarted { step, .. } => {
                    assert!(!awaiting_completion);
                    assert_eq!(*step, expected_step);
                    assert_eq!(statuses[*step], NodeStatus::InProgress);
                    awaiting_completion = true;
                }
                FlowEvent::StepCompleted { step, .. } => {
                    assert!(awaiting_completion, "step {} completed without starting", step);
                    assert_eq!(*step, expected_step);
                    assert_eq!(statuses[*step], NodeStatus::Completed);
                    awaiting_completion = false;
                    expected_step += 1;
                }
                _ => {}
            }
        }
        assert_eq!(expected_step, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_node_in_progress() {
        let (flow, mut rx, mut sim) = setup(&nine_nodes());
        sim.start();
        let events = collect_run(&mut rx, &flow).await;
        for (_, statuses) in &events {
            let active = statuses.iter().filter(|s| **s == NodeStatus::InProgress).count();
            assert!(active <= 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_resets_before_first_step() {
        // The shipped pipeline starts with a completed input and in-progress output.
        let (flow, mut rx, mut sim) = setup(&crate::data::symphony_pipeline());
        let before = flow.snapshot();
        assert!(before.count_status(NodeStatus::Pending) < before.nodes.len());

        sim.start();
        let state = flow.snapshot();
        assert!(state.nodes.iter().all(|n| n.status == NodeStatus::Pending));

        match rx.recv().await.unwrap() {
            FlowEvent::RunStarted { total_steps, .. } => assert_eq!(total_steps, state.nodes.len()),
            other => panic!("expected RunStarted, got {:?}", other),
        }
        match rx.recv().await.unwrap() {
            FlowEvent::StepStarted { step: 0, node_id, .. } => assert_eq!(node_id, "input"),
            other => panic!("expected first StepStarted, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_yields_single_run() {
        let (flow, mut rx, mut sim) = setup(&nine_nodes());
        assert!(sim.start());
        assert!(!sim.start());
        let events = collect_run(&mut rx, &flow).await;

        let count = |pred: fn(&FlowEvent) -> bool| events.iter().filter(|(e, _)| pred(e)).count();
        assert_eq!(count(|e| matches!(e, FlowEvent::RunStarted { .. })), 1);
        assert_eq!(count(|e| matches!(e, FlowEvent::StartIgnored { .. })), 1);
        assert_eq!(count(|e| matches!(e, FlowEvent::StepStarted { .. })), 9);
        assert_eq!(count(|e| matches!(e, FlowEvent::StepCompleted { .. })), 9);

        let run_id = sim.run_id().cloned().unwrap();
        assert!(events.iter().all(|(e, _)| *e.run_id() == run_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_mid_run_does_not_reset() {
        let (flow, mut rx, mut sim) = setup(&nine_nodes());
        sim.start();
        loop {
            if let FlowEvent::StepCompleted { step: 2, .. } = rx.recv().await.unwrap() {
                break;
            }
        }
        assert!(!sim.start());
        let state = flow.snapshot();
        assert!(state.progress.cursor >= 3);
        assert_eq!(state.nodes[2].status, NodeStatus::Completed);

        let rest = collect_run(&mut rx, &flow).await;
        let started = rest
            .iter()
            .filter(|(e, _)| matches!(e, FlowEvent::StepStarted { .. }))
            .count();
        assert_eq!(started, 6);
        assert_eq!(flow.lock().count_status(NodeStatus::Completed), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_follows_list_not_edges() {
        // Edges say a→b→c, the list says a, c, b.
        let def = flow_of(&["a", "c", "b"], &[("a", "b"), ("b", "c")]);
        let (flow, mut rx, mut sim) = setup(&def);
        sim.start();
        let events = collect_run(&mut rx, &flow).await;
        assert_eq!(completion_order(&events), vec!["a", "c", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_pacing() {
        let (_flow, mut rx, mut sim) = setup(&flow_of(&["a", "b"], &[]));
        sim.start();
        let mut started_at = None;
        loop {
            match rx.recv().await.unwrap() {
                FlowEvent::StepStarted { .. } => started_at = Some(tokio::time::Instant::now()),
                FlowEvent::StepCompleted { .. } => {
                    let elapsed = started_at.take().unwrap().elapsed();
                    assert_eq!(elapsed, DELAY);
                }
                FlowEvent::RunFinished { .. } => break,
                _ => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_tick() {
        let (flow, mut rx, mut sim) = setup(&nine_nodes());
        sim.start();
        loop {
            if let FlowEvent::StepStarted { step: 1, .. } = rx.recv().await.unwrap() {
                break;
            }
        }
        assert!(sim.stop());
        assert!(!sim.stop());

        tokio::time::sleep(DELAY * 10).await;
        match rx.try_recv() {
            Ok(FlowEvent::RunStopped { step, .. }) => assert_eq!(step, 1),
            other => panic!("expected RunStopped, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());

        let state = flow.snapshot();
        assert!(!state.progress.running);
        assert_eq!(state.nodes[0].status, NodeStatus::Completed);
        assert_eq!(state.count_status(NodeStatus::Pending), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_pacing_task() {
        let (_flow, _rx, mut sim) = setup(&nine_nodes());
        sim.start();
        let active = sim.current.take().unwrap();
        active.timer.cancel();

        let result = active.timer.handle.await;
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let (flow, mut rx, mut sim) = setup(&nine_nodes());
        sim.start();
        loop {
            if let FlowEvent::StepStarted { step: 0, .. } = rx.recv().await.unwrap() {
                break;
            }
        }
        drop(sim);

        tokio::time::sleep(DELAY * 10).await;
        assert!(rx.try_recv().is_err());
        let state = flow.snapshot();
        assert!(!state.progress.running);
        assert_eq!(state.count_status(NodeStatus::Completed), 0);
        assert_eq!(state.count_status(NodeStatus::InProgress), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_returns_all_pending() {
        let (flow, mut rx, mut sim) = setup(&nine_nodes());
        sim.start();
        loop {
            if let FlowEvent::StepCompleted { step: 3, .. } = rx.recv().await.unwrap() {
                break;
            }
        }
        sim.reset();
        let state = flow.snapshot();
        assert_eq!(state.progress, ExecutionProgress::default());
        assert_eq!(state.count_status(NodeStatus::Pending), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_finish() {
        let (flow, mut rx, mut sim) = setup(&flow_of(&["a", "b"], &[]));
        sim.start();
        collect_run(&mut rx, &flow).await;
        let first = sim.run_id().cloned().unwrap();

        assert!(sim.start());
        let second = sim.run_id().cloned().unwrap();
        assert_ne!(first, second);
        let events = collect_run(&mut rx, &flow).await;
        assert_eq!(completion_order(&events), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_flow_finishes_immediately() {
        let (flow, mut rx, mut sim) = setup(&FlowDefinition::default());
        assert!(sim.start());
        let events = collect_run(&mut rx, &flow).await;
        assert!(matches!(events.last(), Some((FlowEvent::RunFinished { total_steps: 0, .. }, _))));
        assert!(!sim.is_running());
    }
}

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use crossterm::event::KeyEventKind;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::debug;

use synthflow_core::config::AppConfig;
use synthflow_core::event::EventBus;
use synthflow_core::types::{FlowEvent, NodeCategory};
use synthflow_flow::{Bounds, ExecutionSimulator, LayoutOptions, SharedFlow};

use crate::event::{EventLoop, TuiEvent};
use crate::input::{InputAction, InputHandler};
use crate::ui;
use crate::view::Viewport;

pub const MIN_BPM: u16 = 40;
pub const MAX_BPM: u16 = 200;
pub const DEFAULT_BPM: u16 = 120;
const BPM_STEP: u16 = 5;

/// Lines kept in the execution log panel.
const LOG_CAPACITY: usize = 100;

/// Application state.
pub struct App {
    pub flow: SharedFlow,
    /// Registered only after the initial layout; the start trigger stays
    /// disabled until then.
    simulator: Option<ExecutionSimulator>,
    pub layout: LayoutOptions,
    pub viewport: Viewport,
    pub input: InputHandler,
    /// Index into the node list.
    pub selected: Option<usize>,
    /// Ids of collapsed nodes; nodes start expanded.
    pub collapsed: HashSet<String>,
    pub show_banner: bool,
    pub show_minimap: bool,
    pub show_score: bool,
    pub show_log: bool,
    /// When false, pan, zoom and selection are locked.
    pub interactive: bool,
    pub show_advanced: bool,
    /// Category chosen in the create-node selector.
    pub category: NodeCategory,
    pub bpm: u16,
    pub log: VecDeque<String>,
    pub tick_count: usize,
    /// Inner size of the graph pane as of the last draw.
    pub graph_size: (u16, u16),
    pub needs_fit: bool,
}

impl App {
    /// Lay out the flow once and build the view state around it.
    pub fn new(flow: SharedFlow, config: &AppConfig) -> Self {
        let layout = LayoutOptions::from(&config.layout);
        let stats = flow.lock().relayout(&layout);
        debug!(
            ranks = stats.ranks,
            crossings = stats.crossings,
            reversed = stats.reversed_edges,
            "Initial layout"
        );

        Self {
            flow,
            simulator: None,
            layout,
            viewport: Viewport::default(),
            input: InputHandler::new(),
            selected: None,
            collapsed: HashSet::new(),
            show_banner: config.tui.show_banner,
            show_minimap: config.tui.show_minimap,
            show_score: false,
            show_log: false,
            interactive: true,
            show_advanced: false,
            category: NodeCategory::Agent,
            bpm: DEFAULT_BPM,
            log: VecDeque::with_capacity(LOG_CAPACITY),
            tick_count: 0,
            graph_size: (0, 0),
            needs_fit: true,
        }
    }

    /// Register the run handle that the start trigger relays to.
    pub fn attach_simulator(&mut self, simulator: ExecutionSimulator) {
        self.simulator = Some(simulator);
    }

    pub fn is_running(&self) -> bool {
        self.flow.lock().progress.running
    }

    /// Whether the start trigger is enabled.
    pub fn can_start(&self) -> bool {
        self.simulator.is_some() && !self.is_running()
    }

    pub fn request_start(&mut self) -> bool {
        if !self.can_start() {
            return false;
        }
        match self.simulator.as_mut() {
            Some(sim) => sim.start(),
            None => false,
        }
    }

    /// Box around every node at the configured node size.
    pub fn bounds(&self) -> Bounds {
        let state = self.flow.lock();
        Bounds::of(&state.nodes, self.layout.node_width, self.layout.node_height)
    }

    pub fn fit_view(&mut self) {
        let bounds = self.bounds().padded(self.layout.node_height);
        let (cols, rows) = self.graph_size;
        self.viewport.fit(&bounds, cols, rows);
        self.needs_fit = false;
    }

    pub fn is_expanded(&self, node_id: &str) -> bool {
        !self.collapsed.contains(node_id)
    }

    fn node_count(&self) -> usize {
        self.flow.lock().nodes.len()
    }

    fn select_step(&mut self, forward: bool) {
        let n = self.node_count();
        if n == 0 {
            self.selected = None;
            return;
        }
        self.selected = Some(match (self.selected, forward) {
            (None, true) => 0,
            (None, false) => n - 1,
            (Some(i), true) => (i + 1) % n,
            (Some(i), false) => (i + n - 1) % n,
        });
    }

    fn toggle_expand(&mut self) {
        let Some(id) = self
            .selected
            .and_then(|i| self.flow.lock().nodes.get(i).map(|n| n.id.clone()))
        else {
            return;
        };
        if !self.collapsed.remove(&id) {
            self.collapsed.insert(id);
        }
    }

    /// Apply an input action. Returns false when the app should quit.
    pub fn apply(&mut self, action: InputAction) -> bool {
        let locked = !self.interactive;
        match action {
            InputAction::Quit => return false,
            InputAction::StartRun => {
                self.request_start();
            }
            InputAction::Pan(..)
            | InputAction::ZoomIn
            | InputAction::ZoomOut
            | InputAction::FitView
            | InputAction::SelectNext
            | InputAction::SelectPrev
            | InputAction::ToggleExpand
                if locked => {}
            InputAction::Pan(cols, rows) => self.viewport.pan(cols, rows),
            InputAction::ZoomIn => self.viewport.zoom_in(),
            InputAction::ZoomOut => self.viewport.zoom_out(),
            InputAction::FitView => self.fit_view(),
            InputAction::SelectNext => self.select_step(true),
            InputAction::SelectPrev => self.select_step(false),
            InputAction::ToggleExpand => self.toggle_expand(),
            InputAction::ToggleMinimap => self.show_minimap = !self.show_minimap,
            InputAction::ToggleScore => self.show_score = !self.show_score,
            InputAction::ToggleLog => self.show_log = !self.show_log,
            InputAction::ToggleInteractive => {
                // The lock control is hidden while a run is in progress.
                if !self.is_running() {
                    self.interactive = !self.interactive;
                }
            }
            InputAction::CycleCategory => self.category = self.category.next(),
            InputAction::BpmUp => self.bpm = (self.bpm + BPM_STEP).min(MAX_BPM),
            InputAction::BpmDown => self.bpm = self.bpm.saturating_sub(BPM_STEP).max(MIN_BPM),
            InputAction::ToggleAdvanced => self.show_advanced = !self.show_advanced,
            InputAction::AddNode(label) => {
                // Node creation is visual only; the graph is left untouched.
                self.push_log(format!(
                    "New {} node \"{}\" is not added to the flow",
                    self.category, label
                ));
            }
            InputAction::None => {}
        }
        true
    }

    /// Record a run transition in the log panel.
    pub fn handle_flow_event(&mut self, event: &FlowEvent) {
        let line = match event {
            FlowEvent::RunStarted {
                run_id,
                total_steps,
            } => format!("Run {} started ({} steps)", run_id.short(), total_steps),
            FlowEvent::StepStarted { step, node_id, .. } => {
                let label = self
                    .flow
                    .lock()
                    .node(node_id)
                    .map(|n| n.label.clone())
                    .unwrap_or_else(|| node_id.clone());
                format!("#{} {} in progress", step + 1, label)
            }
            FlowEvent::StepCompleted { step, node_id, .. } => {
                format!("#{} {} completed", step + 1, node_id)
            }
            FlowEvent::RunFinished { run_id, .. } => format!("Run {} finished", run_id.short()),
            FlowEvent::RunStopped { run_id, step } => {
                format!("Run {} stopped at step {}", run_id.short(), step + 1)
            }
            FlowEvent::StartIgnored { .. } => "Run already in progress".to_string(),
        };
        self.push_log(line);
    }

    fn push_log(&mut self, text: String) {
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log
            .push_back(format!("[{}] {}", Local::now().format("%H:%M:%S"), text));
    }
}

/// Main app loop.
pub async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    config: &AppConfig,
    flow: SharedFlow,
    event_bus: Arc<EventBus>,
) -> anyhow::Result<()> {
    let mut app = App::new(flow.clone(), config);
    let mut events = EventLoop::new(
        event_bus.subscribe(),
        Duration::from_millis(config.tui.tick_ms),
    );
    app.attach_simulator(ExecutionSimulator::new(
        flow,
        event_bus,
        Duration::from_millis(config.simulator.step_delay_ms),
    ));

    loop {
        terminal.draw(|f| ui::draw(f, &mut app))?;

        if let Some(event) = events.next().await {
            match event {
                TuiEvent::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    let action = app.input.handle_key(key);
                    if !app.apply(action) {
                        break;
                    }
                }
                TuiEvent::Flow(event) => app.handle_flow_event(&event),
                TuiEvent::Tick => app.tick_count += 1,
                TuiEvent::Resize => app.needs_fit = true,
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthflow_core::types::{NodeStatus, RunId};
    use synthflow_flow::{symphony_pipeline, FlowState};

    fn app() -> App {
        let flow = FlowState::from_definition(&symphony_pipeline()).into_shared();
        App::new(flow, &AppConfig::default())
    }

    fn attach(app: &mut App) {
        let sim = ExecutionSimulator::new(
            app.flow.clone(),
            Arc::new(EventBus::default()),
            Duration::from_millis(500),
        );
        app.attach_simulator(sim);
    }

    #[test]
    fn test_new_lays_out_flow() {
        let app = app();
        let state = app.flow.snapshot();
        let first = state.node("input").unwrap().position;
        let last = state.node("output").unwrap().position;
        assert!(last.x > first.x);
        assert!(app.bounds().width() > app.layout.node_width);
    }

    #[test]
    fn test_start_disabled_without_simulator() {
        let mut app = app();
        assert!(!app.can_start());
        assert!(app.apply(InputAction::StartRun));
        assert!(!app.is_running());
    }

    #[tokio::test]
    async fn test_start_relays_to_simulator_once() {
        let mut app = app();
        attach(&mut app);
        assert!(app.can_start());
        assert!(app.request_start());
        assert!(app.is_running());
        assert!(!app.can_start());
        assert!(!app.request_start());
        assert_eq!(app.flow.lock().count_status(NodeStatus::Completed), 0);
    }

    #[tokio::test]
    async fn test_lock_toggle_hidden_while_running() {
        let mut app = app();
        attach(&mut app);
        app.request_start();
        app.apply(InputAction::ToggleInteractive);
        assert!(app.interactive);
    }

    #[test]
    fn test_locked_view_ignores_navigation() {
        let mut app = app();
        app.apply(InputAction::ToggleInteractive);
        assert!(!app.interactive);

        let before = app.viewport;
        app.apply(InputAction::Pan(4.0, 0.0));
        app.apply(InputAction::ZoomIn);
        app.apply(InputAction::SelectNext);
        assert_eq!(app.viewport, before);
        assert_eq!(app.selected, None);

        // Panels still toggle while locked.
        app.apply(InputAction::ToggleScore);
        assert!(app.show_score);
    }

    #[test]
    fn test_selection_wraps_and_expand_toggles() {
        let mut app = app();
        app.apply(InputAction::SelectPrev);
        let last = app.flow.lock().nodes.len() - 1;
        assert_eq!(app.selected, Some(last));
        app.apply(InputAction::SelectNext);
        assert_eq!(app.selected, Some(0));

        assert!(app.is_expanded("input"));
        app.apply(InputAction::ToggleExpand);
        assert!(!app.is_expanded("input"));
        app.apply(InputAction::ToggleExpand);
        assert!(app.is_expanded("input"));
    }

    #[test]
    fn test_bpm_clamped() {
        let mut app = app();
        for _ in 0..100 {
            app.apply(InputAction::BpmUp);
        }
        assert_eq!(app.bpm, MAX_BPM);
        for _ in 0..100 {
            app.apply(InputAction::BpmDown);
        }
        assert_eq!(app.bpm, MIN_BPM);
    }

    #[test]
    fn test_add_node_is_visual_only() {
        let mut app = app();
        let before = app.flow.lock().nodes.len();
        app.apply(InputAction::CycleCategory);
        assert_eq!(app.category, NodeCategory::Action);
        app.apply(InputAction::AddNode("Oboe".into()));
        assert_eq!(app.flow.lock().nodes.len(), before);
        assert!(app.log.back().unwrap().contains("Oboe"));
    }

    #[test]
    fn test_flow_events_logged_with_labels() {
        let mut app = app();
        let run_id = RunId::new();
        app.handle_flow_event(&FlowEvent::StepStarted {
            run_id: run_id.clone(),
            step: 1,
            node_id: "conductor".into(),
        });
        assert!(app.log.back().unwrap().ends_with("#2 Conductor in progress"));

        for _ in 0..LOG_CAPACITY + 5 {
            app.handle_flow_event(&FlowEvent::StartIgnored {
                run_id: run_id.clone(),
            });
        }
        assert_eq!(app.log.len(), LOG_CAPACITY);
    }

    #[test]
    fn test_quit_stops_loop() {
        let mut app = app();
        assert!(!app.apply(InputAction::Quit));
    }
}

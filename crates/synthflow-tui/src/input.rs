use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Actions produced by key input handling.
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    /// Request a simulated run.
    StartRun,
    Quit,
    /// Pan by (columns, rows).
    Pan(f64, f64),
    ZoomIn,
    ZoomOut,
    FitView,
    ToggleMinimap,
    SelectNext,
    SelectPrev,
    /// Expand or collapse the selected node.
    ToggleExpand,
    ToggleScore,
    ToggleLog,
    /// Lock or unlock pan, zoom and selection.
    ToggleInteractive,
    CycleCategory,
    BpmUp,
    BpmDown,
    ToggleAdvanced,
    /// Submit the create-node form.
    AddNode(String),
    /// No-op (key was handled internally).
    None,
}

/// Whether keys drive the graph or the create-node label field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    EditLabel,
}

/// Key handler owning the create-node label buffer.
pub struct InputHandler {
    pub buffer: String,
    /// Cursor position in chars.
    pub cursor: usize,
    pub mode: InputMode,
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl InputHandler {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            mode: InputMode::Normal,
        }
    }

    /// Handle a key event, returning an action.
    pub fn handle_key(&mut self, key: KeyEvent) -> InputAction {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return InputAction::Quit;
        }
        match self.mode {
            InputMode::Normal => self.handle_normal(key),
            InputMode::EditLabel => self.handle_edit(key),
        }
    }

    fn handle_normal(&mut self, key: KeyEvent) -> InputAction {
        match key.code {
            KeyCode::Char('s') | KeyCode::Enter => InputAction::StartRun,
            KeyCode::Char('q') | KeyCode::Esc => InputAction::Quit,
            KeyCode::Left => InputAction::Pan(-4.0, 0.0),
            KeyCode::Right => InputAction::Pan(4.0, 0.0),
            KeyCode::Up => InputAction::Pan(0.0, -2.0),
            KeyCode::Down => InputAction::Pan(0.0, 2.0),
            KeyCode::Char('+') | KeyCode::Char('=') => InputAction::ZoomIn,
            KeyCode::Char('-') => InputAction::ZoomOut,
            KeyCode::Char('f') => InputAction::FitView,
            KeyCode::Char('m') => InputAction::ToggleMinimap,
            KeyCode::Tab => InputAction::SelectNext,
            KeyCode::BackTab => InputAction::SelectPrev,
            KeyCode::Char(' ') => InputAction::ToggleExpand,
            KeyCode::Char('p') => InputAction::ToggleScore,
            KeyCode::Char('i') => InputAction::ToggleLog,
            KeyCode::Char('x') => InputAction::ToggleInteractive,
            KeyCode::Char('c') => InputAction::CycleCategory,
            KeyCode::Char(']') => InputAction::BpmUp,
            KeyCode::Char('[') => InputAction::BpmDown,
            KeyCode::Char('v') => InputAction::ToggleAdvanced,
            KeyCode::Char('n') => {
                self.mode = InputMode::EditLabel;
                InputAction::None
            }
            _ => InputAction::None,
        }
    }

    fn handle_edit(&mut self, key: KeyEvent) -> InputAction {
        match key.code {
            KeyCode::Esc => {
                self.mode = InputMode::Normal;
                InputAction::None
            }
            KeyCode::Enter => {
                self.mode = InputMode::Normal;
                let label = self.buffer.trim().to_string();
                self.buffer.clear();
                self.cursor = 0;
                if label.is_empty() {
                    InputAction::None
                } else {
                    InputAction::AddNode(label)
                }
            }
            KeyCode::Char(c) => {
                let at = self.byte_index();
                self.buffer.insert(at, c);
                self.cursor += 1;
                InputAction::None
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_index();
                    self.buffer.remove(at);
                }
                InputAction::None
            }
            KeyCode::Delete => {
                if self.cursor < self.buffer.chars().count() {
                    let at = self.byte_index();
                    self.buffer.remove(at);
                }
                InputAction::None
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                InputAction::None
            }
            KeyCode::Right => {
                if self.cursor < self.buffer.chars().count() {
                    self.cursor += 1;
                }
                InputAction::None
            }
            KeyCode::Home => {
                self.cursor = 0;
                InputAction::None
            }
            KeyCode::End => {
                self.cursor = self.buffer.chars().count();
                InputAction::None
            }
            _ => InputAction::None,
        }
    }

    fn byte_index(&self) -> usize {
        self.buffer
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.buffer.len())
    }
}

//! Fixed lookup tables for node styling. Indexed by enum position so the
//! renderer never branches on category or status.

use ratatui::style::Color;

use synthflow_core::types::{NodeCategory, NodeStatus};
use synthflow_flow::ToolRef;

/// How one node category is drawn.
#[derive(Debug, Clone, Copy)]
pub struct CategoryStyle {
    pub color: Color,
    /// Glyph in the node header.
    pub glyph: &'static str,
    /// Icon and label used by the create-node selector.
    pub menu_icon: &'static str,
    pub menu_label: &'static str,
}

const CATEGORY_STYLES: [CategoryStyle; NodeCategory::ALL.len()] = [
    CategoryStyle {
        color: Color::Rgb(0x34, 0x98, 0xdb),
        glyph: "◉",
        menu_icon: "🤖",
        menu_label: "AI Agent",
    },
    CategoryStyle {
        color: Color::Rgb(0x2e, 0xcc, 0x71),
        glyph: "⚙",
        menu_icon: "⚡",
        menu_label: "Action",
    },
    CategoryStyle {
        color: Color::Rgb(0xe6, 0x7e, 0x22),
        glyph: "ℹ",
        menu_icon: "📊",
        menu_label: "State",
    },
    CategoryStyle {
        color: Color::Rgb(0xf1, 0xc4, 0x0f),
        glyph: "→",
        menu_icon: "📥",
        menu_label: "Input",
    },
    CategoryStyle {
        color: Color::Rgb(0x9b, 0x59, 0xb6),
        glyph: "←",
        menu_icon: "📤",
        menu_label: "Output",
    },
    CategoryStyle {
        color: Color::Rgb(0xe9, 0x1e, 0x63),
        glyph: "✦",
        menu_icon: "💭",
        menu_label: "Reflect",
    },
];

pub fn category_style(category: NodeCategory) -> &'static CategoryStyle {
    &CATEGORY_STYLES[category.index()]
}

/// Frames cycled while a node is in progress.
pub const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Static glyph per status; `None` means animated.
const STATUS_GLYPHS: [Option<&str>; NodeStatus::ALL.len()] = [Some("○"), None, Some("✔")];

const STATUS_COLORS: [Color; NodeStatus::ALL.len()] = [Color::DarkGray, Color::Yellow, Color::Green];

/// Status icon for the given animation tick.
pub fn status_icon(status: NodeStatus, tick: usize) -> &'static str {
    STATUS_GLYPHS[status.index()].unwrap_or(SPINNER[(tick / 2) % SPINNER.len()])
}

pub fn status_color(status: NodeStatus) -> Color {
    STATUS_COLORS[status.index()]
}

/// Fallback icons keyed by lowercase tool name.
const TOOL_ICONS: &[(&str, &str)] = &[
    ("openai", "🔮"),
    ("serpapi", "🔍"),
    ("memory", "💾"),
    ("vectordb", "📚"),
];

const DEFAULT_TOOL_ICON: &str = "🔧";

/// The tool's own icon, else the table entry for its name, else a wrench.
pub fn tool_icon(tool: &ToolRef) -> &str {
    if let Some(icon) = tool.icon.as_deref() {
        return icon;
    }
    let name = tool.name.to_lowercase();
    TOOL_ICONS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, icon)| *icon)
        .unwrap_or(DEFAULT_TOOL_ICON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_colors_match_palette() {
        assert_eq!(category_style(NodeCategory::Agent).color, Color::Rgb(0x34, 0x98, 0xdb));
        assert_eq!(category_style(NodeCategory::Reflect).color, Color::Rgb(0xe9, 0x1e, 0x63));
        assert_eq!(category_style(NodeCategory::Input).menu_icon, "📥");
    }

    #[test]
    fn test_in_progress_spins_others_static() {
        assert_eq!(status_icon(NodeStatus::Pending, 0), status_icon(NodeStatus::Pending, 7));
        assert_eq!(status_icon(NodeStatus::Completed, 3), "✔");
        assert_ne!(status_icon(NodeStatus::InProgress, 0), status_icon(NodeStatus::InProgress, 2));
        assert_eq!(status_icon(NodeStatus::InProgress, 0), status_icon(NodeStatus::InProgress, 20));
    }

    #[test]
    fn test_tool_icon_fallbacks() {
        assert_eq!(tool_icon(&ToolRef::new("OpenAI")), "🔮");
        assert_eq!(tool_icon(&ToolRef::new("SerpAPI")), "🔍");
        assert_eq!(tool_icon(&ToolRef::new("VectorDB").with_icon("📚")), "📚");
        assert_eq!(tool_icon(&ToolRef::new("RAG").with_icon("🔍")), "🔍");
        assert_eq!(tool_icon(&ToolRef::new("Music Theory Library")), "🔧");
    }
}

use std::sync::OnceLock;

use chrono::Local;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Line as CanvasLine, Rectangle};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;
use tui_banner::Banner;

use synthflow_core::config::LayoutDirection;
use synthflow_core::types::{NodeCategory, NodeStatus};
use synthflow_flow::{Bounds, FlowNode, FlowState};

use crate::app::{App, MAX_BPM, MIN_BPM};
use crate::input::InputMode;
use crate::theme::{category_style, status_color, status_icon, tool_icon, SPINNER};

/// Sample score lines shown in the preview panel.
const SCORE_PREVIEW: [&str; 3] = [
    "C4 - D4 - E4 - G4",
    "A3 - B3 - C4 - E4",
    "F4 - E4 - D4 - C4",
];

const SIDE_PANEL_WIDTH: u16 = 36;
const MINIMAP_SIZE: (u16, u16) = (28, 9);
const BPM_SLIDER_CELLS: usize = 16;

/// Cached banner, rendered once.
struct BannerCache {
    lines: Vec<String>,
    width: u16,
    height: u16,
}

fn cached_banner() -> &'static BannerCache {
    static CACHE: OnceLock<BannerCache> = OnceLock::new();
    CACHE.get_or_init(|| {
        let text = Banner::new("SYNTHFLOW")
            .map(|b| b.style(tui_banner::Style::NeonCyber).render())
            .unwrap_or_else(|_| String::from("SYNTHFLOW"));
        let lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
        let width = lines
            .iter()
            .map(|l| l.chars().count() as u16)
            .max()
            .unwrap_or(9);
        let height = lines.len() as u16;
        BannerCache {
            lines,
            width,
            height,
        }
    })
}

/// Draw the TUI layout.
pub fn draw(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let banner = cached_banner();

    // Full art only when the graph keeps at least 12 rows.
    let min_body_rows: u16 = 12;
    let banner_height = if !app.show_banner || area.height < min_body_rows + 3 {
        0
    } else if area.width >= banner.width + 2 && area.height >= banner.height + 1 + min_body_rows {
        banner.height + 1
    } else {
        2
    };

    let mut constraints = Vec::with_capacity(3);
    if banner_height > 0 {
        constraints.push(Constraint::Length(banner_height));
    }
    constraints.push(Constraint::Min(1));
    constraints.push(Constraint::Length(1));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let (body, status) = if banner_height > 0 {
        draw_banner(f, chunks[0], banner_height);
        (chunks[1], chunks[2])
    } else {
        (chunks[0], chunks[1])
    };

    let side_width = SIDE_PANEL_WIDTH.min(body.width / 3);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(side_width), Constraint::Min(1)])
        .split(body);

    let graph_block = Block::default().borders(Borders::ALL).title(" Flow ");
    let graph_inner = graph_block.inner(columns[1]);
    app.graph_size = (graph_inner.width, graph_inner.height);
    if app.needs_fit {
        app.fit_view();
    }

    let state = app.flow.snapshot();
    draw_side_panel(f, app, &state, columns[0]);
    draw_graph(f, app, &state, graph_block, columns[1]);
    if app.show_minimap {
        draw_minimap(f, app, &state, graph_inner);
    }
    draw_status_bar(f, app, &state, status);
}

fn draw_banner(f: &mut Frame, area: Rect, banner_height: u16) {
    let banner = cached_banner();

    let lines: Vec<Line> = if banner_height > 2 && area.width >= banner.width {
        banner
            .lines
            .iter()
            .map(|l| Line::from(Span::styled(l.clone(), Style::default().fg(Color::Magenta))))
            .collect()
    } else {
        vec![Line::from(vec![
            Span::styled(
                " SYNTHFLOW",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "  AI symphony composition pipeline",
                Style::default().fg(Color::DarkGray),
            ),
        ])]
    };

    let widget = Paragraph::new(lines).block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(widget, area);
}

fn draw_side_panel(f: &mut Frame, app: &App, state: &FlowState, area: Rect) {
    if area.width == 0 {
        return;
    }

    let create_rows = NodeCategory::ALL.len() as u16 + if app.show_advanced { 6 } else { 5 };
    let mut constraints = vec![
        Constraint::Length(6),
        Constraint::Length(create_rows),
    ];
    if app.show_score {
        constraints.push(Constraint::Length(SCORE_PREVIEW.len() as u16 + 2));
    }
    if app.show_log {
        constraints.push(Constraint::Min(6));
    }
    constraints.push(Constraint::Min(5));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut next = 0;
    let mut take = || {
        let rect = chunks[next];
        next += 1;
        rect
    };

    draw_controls(f, app, state, take());
    draw_create_node(f, app, take());
    if app.show_score {
        draw_score(f, take());
    }
    if app.show_log {
        draw_log(f, app, state, take());
    }
    draw_details(f, app, state, take());
}

fn toggle_span(key: &str, label: &str, on: bool) -> Vec<Span<'static>> {
    let style = if on {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    vec![
        Span::styled(format!("[{}] ", key), Style::default().fg(Color::DarkGray)),
        Span::styled(format!("{}  ", label), style),
    ]
}

fn draw_controls(f: &mut Frame, app: &App, state: &FlowState, area: Rect) {
    let trigger = if state.progress.running {
        Line::from(Span::styled(
            format!("{} Processing...", SPINNER[(app.tick_count / 2) % SPINNER.len()]),
            Style::default().fg(Color::Yellow),
        ))
    } else if app.can_start() {
        Line::from(vec![
            Span::styled("[s] ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                "▶ Start Execution",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
        ])
    } else {
        Line::from(Span::styled(
            "▶ Start Execution",
            Style::default().fg(Color::DarkGray),
        ))
    };

    let mut panels = toggle_span("p", "♪ Score", app.show_score);
    panels.extend(toggle_span("i", "ⓘ Log", app.show_log));

    let mut view = toggle_span("m", "Minimap", app.show_minimap);
    if !state.progress.running {
        let lock = if app.interactive { "Unlocked" } else { "Locked" };
        view.extend(toggle_span("x", lock, !app.interactive));
    }

    let filled = usize::from(app.bpm - MIN_BPM) * BPM_SLIDER_CELLS / usize::from(MAX_BPM - MIN_BPM);
    let bpm = Line::from(vec![
        Span::styled("[[ ]] ", Style::default().fg(Color::DarkGray)),
        Span::raw(format!("BPM {:>3} ", app.bpm)),
        Span::styled("█".repeat(filled), Style::default().fg(Color::Magenta)),
        Span::styled(
            "─".repeat(BPM_SLIDER_CELLS - filled),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let widget = Paragraph::new(vec![trigger, Line::from(panels), Line::from(view), bpm])
        .block(Block::default().borders(Borders::ALL).title(" Controls "));
    f.render_widget(widget, area);
}

fn draw_create_node(f: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = NodeCategory::ALL
        .iter()
        .map(|&category| {
            let style = category_style(category);
            let chosen = category == app.category;
            let marker = if chosen { "▸ " } else { "  " };
            let text_style = if chosen {
                Style::default().fg(style.color).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(vec![
                Span::styled(marker, Style::default().fg(style.color)),
                Span::raw(format!("{} ", style.menu_icon)),
                Span::styled(style.menu_label, text_style),
            ])
        })
        .collect();

    let editing = app.input.mode == InputMode::EditLabel;
    let field_style = if editing {
        Style::default().fg(Color::White).add_modifier(Modifier::UNDERLINED)
    } else {
        Style::default().fg(Color::Gray)
    };
    lines.push(Line::from(vec![
        Span::styled("Label: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.input.buffer.clone(), field_style),
    ]));
    lines.push(Line::from(Span::styled(
        "[c] type  [n] label  [Enter] add",
        Style::default().fg(Color::DarkGray),
    )));
    lines.push(Line::from(toggle_span("v", "Advanced", app.show_advanced)));
    if app.show_advanced {
        lines.push(Line::from(Span::styled(
            "  No advanced settings available",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Create Node "));
    f.render_widget(widget, area);

    if editing {
        let label_row = area.y + 1 + NodeCategory::ALL.len() as u16;
        let cursor_x = area.x
            + 1
            + display_width("Label: ")
            + cursor_offset(&app.input.buffer, app.input.cursor);
        f.set_cursor_position((
            cursor_x.min(area.x + area.width.saturating_sub(2)),
            label_row,
        ));
    }
}

/// Terminal columns `text` occupies.
fn display_width(text: &str) -> u16 {
    u16::try_from(Span::raw(text).width()).unwrap_or(u16::MAX)
}

/// Columns between the start of `buffer` and a cursor `cursor` chars in.
fn cursor_offset(buffer: &str, cursor: usize) -> u16 {
    let prefix: String = buffer.chars().take(cursor).collect();
    display_width(&prefix)
}

fn draw_score(f: &mut Frame, area: Rect) {
    let lines: Vec<Line> = SCORE_PREVIEW
        .iter()
        .map(|l| Line::from(Span::styled(*l, Style::default().fg(Color::Magenta))))
        .collect();
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Score Preview "));
    f.render_widget(widget, area);
}

fn draw_log(f: &mut Frame, app: &App, state: &FlowState, area: Rect) {
    let (status, color) = if state.progress.running {
        ("Running", Color::Yellow)
    } else {
        ("Idle", Color::Green)
    };
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::DarkGray)),
            Span::styled(status, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(vec![
            Span::styled("Last updated: ", Style::default().fg(Color::DarkGray)),
            Span::raw(Local::now().format("%H:%M:%S").to_string()),
        ]),
    ];

    let room = usize::from(area.height.saturating_sub(2)).saturating_sub(lines.len());
    let skip = app.log.len().saturating_sub(room);
    lines.extend(
        app.log
            .iter()
            .skip(skip)
            .map(|l| Line::from(Span::styled(l.clone(), Style::default().fg(Color::Gray)))),
    );

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Execution Log "));
    f.render_widget(widget, area);
}

fn draw_details(f: &mut Frame, app: &App, state: &FlowState, area: Rect) {
    let Some(node) = app.selected.and_then(|i| state.nodes.get(i)) else {
        let hint = Paragraph::new(Span::styled(
            "Tab to select a node",
            Style::default().fg(Color::DarkGray),
        ))
        .block(Block::default().borders(Borders::ALL).title(" Node "));
        f.render_widget(hint, area);
        return;
    };

    let style = category_style(node.category);
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(Span::styled(
            node.label.clone(),
            Style::default().fg(style.color).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("id: ", dim),
            Span::raw(node.id.clone()),
        ]),
        Line::from(vec![
            Span::styled("category: ", dim),
            Span::raw(style.menu_label),
        ]),
        Line::from(vec![
            Span::styled("status: ", dim),
            Span::styled(
                format!("{} {}", status_icon(node.status, app.tick_count), node.status),
                Style::default().fg(status_color(node.status)),
            ),
        ]),
    ];
    if let Some(ts) = &node.timestamp {
        lines.push(Line::from(vec![Span::styled("updated: ", dim), Span::raw(ts.clone())]));
    }

    if app.is_expanded(&node.id) {
        for param in &node.params {
            let kind = param
                .kind
                .as_deref()
                .map(|k| format!(" ({})", k))
                .unwrap_or_default();
            lines.push(Line::from(vec![
                Span::styled(format!("{}: ", param.key), Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(format!("{}{}", param.value, kind)),
            ]));
        }
        for tool in &node.tools {
            let version = tool
                .version
                .as_deref()
                .map(|v| format!(" v{}", v))
                .unwrap_or_default();
            lines.push(Line::from(format!("{} {}{}", tool_icon(tool), tool.name, version)));
        }
        if let Some(exec) = &node.execution {
            lines.push(Line::from(Span::styled(
                format!(
                    "attempts {} | last {} | {}",
                    exec.attempts, exec.last_attempt, exec.duration
                ),
                dim,
            )));
        }
    } else {
        lines.push(Line::from(Span::styled("(collapsed, Space to expand)", dim)));
    }

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Node "))
        .wrap(Wrap { trim: true });
    f.render_widget(widget, area);
}

/// Anchor points where an edge leaves `source` and enters `target`.
fn edge_anchors(
    source: &FlowNode,
    target: &FlowNode,
    direction: LayoutDirection,
    w: f64,
    h: f64,
) -> ((f64, f64), (f64, f64)) {
    match direction {
        LayoutDirection::LeftToRight => (
            (source.position.x + w, source.position.y + h / 2.0),
            (target.position.x, target.position.y + h / 2.0),
        ),
        LayoutDirection::TopToBottom => (
            (source.position.x + w / 2.0, source.position.y + h),
            (target.position.x + w / 2.0, target.position.y),
        ),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(max - 1).collect();
    out.push('…');
    out
}

fn draw_graph(f: &mut Frame, app: &App, state: &FlowState, block: Block, area: Rect) {
    let (cols, rows) = app.graph_size;
    let (x_bounds, y_bounds) = app.viewport.canvas_bounds(cols, rows);
    let (w, h) = (app.layout.node_width, app.layout.node_height);
    let direction = app.layout.direction;
    let label_cols = app.viewport.cols_for(w).saturating_sub(2);
    let box_rows = app.viewport.rows_for(h);
    let arrow = match direction {
        LayoutDirection::LeftToRight => "▸",
        LayoutDirection::TopToBottom => "▾",
    };

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            for edge in &state.edges {
                let (Some(source), Some(target)) = (state.node(&edge.source), state.node(&edge.target))
                else {
                    continue;
                };
                let ((x1, y1), (x2, y2)) = edge_anchors(source, target, direction, w, h);
                let color = if source.status == NodeStatus::Completed
                    && target.status != NodeStatus::Pending
                {
                    Color::Green
                } else {
                    Color::DarkGray
                };
                ctx.draw(&CanvasLine {
                    x1,
                    y1: -y1,
                    x2,
                    y2: -y2,
                    color,
                });
                ctx.print(x2, -y2, Span::styled(arrow, Style::default().fg(color)));
            }

            ctx.layer();

            for (i, node) in state.nodes.iter().enumerate() {
                let style = category_style(node.category);
                let selected = app.selected == Some(i);
                ctx.draw(&Rectangle {
                    x: node.position.x,
                    y: -(node.position.y + h),
                    width: w,
                    height: h,
                    color: if selected { Color::White } else { style.color },
                });
            }

            ctx.layer();

            for node in &state.nodes {
                let style = category_style(node.category);
                let expanded = app.is_expanded(&node.id);
                let fold = if expanded { "▾" } else { "▸" };
                let header = format!(
                    "{} {} {}",
                    style.glyph,
                    status_icon(node.status, app.tick_count),
                    node.label
                );
                let x = node.position.x + w * 0.06;
                ctx.print(
                    x,
                    -(node.position.y + h * 0.3),
                    Line::from(vec![
                        Span::styled(
                            truncate(&header, label_cols.saturating_sub(2)),
                            Style::default().fg(style.color).add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(format!(" {}", fold), Style::default().fg(Color::DarkGray)),
                    ]),
                );
                if expanded && box_rows >= 3 && !node.tools.is_empty() {
                    let icons: Vec<&str> = node.tools.iter().map(tool_icon).collect();
                    ctx.print(
                        x,
                        -(node.position.y + h * 0.7),
                        Span::raw(truncate(&icons.join(" "), label_cols)),
                    );
                }
            }
        });

    f.render_widget(canvas, area);
}

fn draw_minimap(f: &mut Frame, app: &App, state: &FlowState, graph: Rect) {
    let (mw, mh) = MINIMAP_SIZE;
    if graph.width < mw * 2 || graph.height < mh * 2 {
        return;
    }
    let rect = Rect {
        x: graph.x + graph.width - mw,
        y: graph.y + graph.height - mh,
        width: mw,
        height: mh,
    };

    let (w, h) = (app.layout.node_width, app.layout.node_height);
    let bounds: Bounds = Bounds::of(&state.nodes, w, h).padded(h);
    let ([vx0, vx1], [vy0, vy1]) = app.viewport.canvas_bounds(app.graph_size.0, app.graph_size.1);

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(" Map "))
        .marker(Marker::Braille)
        .x_bounds([bounds.min_x, bounds.max_x])
        .y_bounds([-bounds.max_y, -bounds.min_y])
        .paint(|ctx| {
            for node in &state.nodes {
                ctx.draw(&Rectangle {
                    x: node.position.x,
                    y: -(node.position.y + h),
                    width: w,
                    height: h,
                    color: category_style(node.category).color,
                });
            }
            ctx.draw(&Rectangle {
                x: vx0,
                y: vy0,
                width: vx1 - vx0,
                height: vy1 - vy0,
                color: Color::White,
            });
        });

    f.render_widget(Clear, rect);
    f.render_widget(canvas, rect);
}

fn draw_status_bar(f: &mut Frame, app: &App, state: &FlowState, area: Rect) {
    let status_text = if state.progress.running {
        let spinner = SPINNER[(app.tick_count / 2) % SPINNER.len()];
        let current = state
            .nodes
            .get(state.progress.cursor)
            .map(|n| n.label.as_str())
            .unwrap_or("");
        format!(
            " {} Running step {}/{} [{}]",
            spinner,
            (state.progress.cursor + 1).min(state.nodes.len()),
            state.nodes.len(),
            current
        )
    } else {
        format!(
            " {} nodes, {} edges | {} completed | zoom {:.2}x | s start  arrows pan  +/- zoom  f fit  q quit",
            state.nodes.len(),
            state.edges.len(),
            state.count_status(NodeStatus::Completed),
            app.viewport.zoom
        )
    };

    let status =
        Paragraph::new(status_text).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(status, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("Conductor", 20), "Conductor");
        assert_eq!(truncate("GENERATE_SCORES", 6), "GENER…");
        assert_eq!(truncate("é✔é✔", 3), "é✔…");
        assert_eq!(truncate("abc", 0), "");
    }

    #[test]
    fn test_cursor_offset_uses_display_width() {
        assert_eq!(cursor_offset("Violin", 3), 3);
        // Wide glyphs take two columns each.
        assert_eq!(cursor_offset("🎻 solo", 1), 2);
        assert_eq!(cursor_offset("音楽ab", 3), 5);
        assert_eq!(cursor_offset("é", 1), 1);
        assert_eq!(cursor_offset("abc", 10), 3);
    }

    #[test]
    fn test_edge_anchors_follow_direction() {
        use synthflow_core::types::Position;
        let mut a = FlowNode::new("a", "A", NodeCategory::Input);
        let mut b = FlowNode::new("b", "B", NodeCategory::Output);
        a.position = Position::new(0.0, 0.0);
        b.position = Position::new(250.0, 0.0);

        let (from, to) = edge_anchors(&a, &b, LayoutDirection::LeftToRight, 150.0, 50.0);
        assert_eq!(from, (150.0, 25.0));
        assert_eq!(to, (250.0, 25.0));

        b.position = Position::new(0.0, 150.0);
        let (from, to) = edge_anchors(&a, &b, LayoutDirection::TopToBottom, 150.0, 50.0);
        assert_eq!(from, (75.0, 50.0));
        assert_eq!(to, (75.0, 150.0));
    }
}

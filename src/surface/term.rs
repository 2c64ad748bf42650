use std::{collections::HashMap, io::Write};

use crossterm::{
    cursor, event, execute, queue,
    style::{self, Attribute, Color, ContentStyle},
    terminal,
};
use futures::{Stream, StreamExt as _};
use unicode_width::UnicodeWidthStr as _;

use super::{Handle, Input, MouseButton, Section, Slot, Surface};

const ROOT_GAP: u16 = 2;

#[derive(Debug, Default)]
struct Node {
    parent: Option<Handle>,
    text: String,
    classes: Vec<String>,
    children: Vec<Handle>,
}

#[derive(Debug)]
struct Segment {
    text: String,
    style: ContentStyle,
    handle: Handle,
    /// Space inserted before this segment.
    gap: u16,
}

/// Draws the bar as a single terminal line, e.g. inside a panel terminal.
pub struct TermSurface<W: Write> {
    out: W,
    nodes: HashMap<Handle, Node>,
    sections: HashMap<Section, Vec<Handle>>,
    next_id: u64,
    width: u16,
    spans: Vec<(u16, u16, Handle)>,
    dirty: bool,
    owns_terminal: bool,
}

impl TermSurface<std::io::Stdout> {
    /// Takes over the terminal: raw mode, hidden cursor, mouse capture. Restored on drop.
    pub fn stdout() -> anyhow::Result<Self> {
        let mut out = std::io::stdout();
        terminal::enable_raw_mode()?;
        execute!(
            out,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            event::EnableMouseCapture
        )?;
        let (width, _) = terminal::size()?;
        let mut surface = Self::new(out, width);
        surface.owns_terminal = true;
        Ok(surface)
    }
}

impl<W: Write> TermSurface<W> {
    pub fn new(out: W, width: u16) -> Self {
        Self {
            out,
            nodes: HashMap::new(),
            sections: HashMap::new(),
            next_id: 0,
            width,
            spans: Vec::new(),
            dirty: true,
            owns_terminal: false,
        }
    }

    fn segments(&self, section: Section) -> Vec<Segment> {
        let mut segments = Vec::new();
        let roots = self.sections.get(&section).map_or(&[][..], Vec::as_slice);
        for &root in roots {
            let Some(node) = self.nodes.get(&root) else {
                continue;
            };
            let root_gap = if segments.is_empty() { 0 } else { ROOT_GAP };
            if node.children.is_empty() {
                if !node.text.is_empty() {
                    segments.push(Segment {
                        text: node.text.clone(),
                        style: style_for(&node.classes),
                        handle: root,
                        gap: root_gap,
                    });
                }
                continue;
            }
            for (i, &child) in node.children.iter().enumerate() {
                let Some(child_node) = self.nodes.get(&child) else {
                    continue;
                };
                segments.push(Segment {
                    text: child_node.text.clone(),
                    style: style_for(&child_node.classes),
                    handle: child,
                    gap: if i == 0 { root_gap } else { 1 },
                });
            }
        }
        segments
    }

    fn layout(&self) -> Vec<(u16, Segment)> {
        fn width_of(segments: &[Segment]) -> u16 {
            segments
                .iter()
                .map(|seg| seg.gap.saturating_add(seg.text.width() as u16))
                .fold(0, u16::saturating_add)
        }
        fn place(col: u16, segments: Vec<Segment>, out: &mut Vec<(u16, Segment)>) {
            let mut col = col;
            for seg in segments {
                col = col.saturating_add(seg.gap);
                let width = seg.text.width() as u16;
                out.push((col, seg));
                col = col.saturating_add(width);
            }
        }

        let left = self.segments(Section::Left);
        let center = self.segments(Section::Center);
        let right = self.segments(Section::Right);
        let (lw, cw, rw) = (width_of(&left), width_of(&center), width_of(&right));

        let center_col = (self.width.saturating_sub(cw) / 2).max(lw.saturating_add(ROOT_GAP));
        let right_col = self
            .width
            .saturating_sub(rw)
            .max(center_col.saturating_add(cw).saturating_add(ROOT_GAP));

        let mut placed = Vec::new();
        place(0, left, &mut placed);
        place(center_col, center, &mut placed);
        place(right_col, right, &mut placed);
        placed
    }

    fn draw(&mut self) -> std::io::Result<()> {
        let placed = self.layout();
        self.spans.clear();

        queue!(
            self.out,
            cursor::MoveTo(0, 0),
            terminal::Clear(terminal::ClearType::CurrentLine)
        )?;
        for (col, seg) in placed {
            if col >= self.width {
                continue;
            }
            let text = clip(&seg.text, self.width - col);
            let end = col.saturating_add(text.width() as u16);
            self.spans.push((col, end, seg.handle));
            queue!(
                self.out,
                cursor::MoveTo(col, 0),
                style::PrintStyledContent(seg.style.apply(text))
            )?;
        }
        self.out.flush()
    }
}

impl<W: Write> Surface for TermSurface<W> {
    fn add(&mut self, slot: Slot) -> Handle {
        self.next_id += 1;
        let handle = Handle(self.next_id);
        let parent = match slot {
            Slot::Section(section) => {
                self.sections.entry(section).or_default().push(handle);
                None
            }
            Slot::Child(parent) => {
                if let Some(node) = self.nodes.get_mut(&parent) {
                    node.children.push(handle);
                }
                Some(parent)
            }
        };
        self.nodes.insert(
            handle,
            Node {
                parent,
                ..Default::default()
            },
        );
        self.dirty = true;
        handle
    }

    fn remove(&mut self, handle: Handle) {
        let Some(node) = self.nodes.remove(&handle) else {
            return;
        };
        for child in node.children {
            self.remove(child);
        }
        match node.parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            Some(parent) => parent.children.retain(|&h| h != handle),
            None => {
                for roots in self.sections.values_mut() {
                    roots.retain(|&h| h != handle);
                }
            }
        }
        self.dirty = true;
    }

    fn set_text(&mut self, handle: Handle, text: &str) {
        if let Some(node) = self.nodes.get_mut(&handle)
            && node.text != text
        {
            node.text = text.into();
            self.dirty = true;
        }
    }

    fn set_classes(&mut self, handle: Handle, classes: &[&str]) {
        if let Some(node) = self.nodes.get_mut(&handle)
            && node.classes != classes
        {
            node.classes = classes.iter().map(|&c| c.into()).collect();
            self.dirty = true;
        }
    }

    fn reorder(&mut self, parent: Handle, children: &[Handle]) {
        let Some(node) = self.nodes.get_mut(&parent) else {
            return;
        };
        let mut ordered: Vec<_> = children
            .iter()
            .copied()
            .filter(|h| node.children.contains(h))
            .collect();
        ordered.extend(node.children.iter().filter(|h| !children.contains(h)));
        if ordered != node.children {
            node.children = ordered;
            self.dirty = true;
        }
    }

    fn present(&mut self) -> anyhow::Result<()> {
        if std::mem::take(&mut self.dirty) {
            self.draw()?;
        }
        Ok(())
    }

    fn hit(&self, column: u16) -> Option<Handle> {
        self.spans
            .iter()
            .find(|&&(start, end, _)| (start..end).contains(&column))
            .map(|&(_, _, handle)| handle)
    }

    fn resize(&mut self, width: u16) {
        self.width = width;
        self.dirty = true;
    }
}

impl<W: Write> Drop for TermSurface<W> {
    fn drop(&mut self) {
        if !self.owns_terminal {
            return;
        }
        let res = execute!(
            self.out,
            event::DisableMouseCapture,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )
        .and_then(|()| terminal::disable_raw_mode());
        if let Err(err) = res {
            log::error!("Failed to restore terminal: {err}");
        }
    }
}

fn style_for(classes: &[String]) -> ContentStyle {
    let mut style = ContentStyle::new();
    for class in classes {
        match class.as_str() {
            "active" => {
                style.foreground_color = Some(Color::Green);
                style.attributes.set(Attribute::Bold);
            }
            "other-monitor" | "muted" | "disconnected" => {
                style.foreground_color = Some(Color::DarkGrey);
            }
            _ => {}
        }
    }
    style
}

fn clip(text: &str, max_width: u16) -> &str {
    let mut width = 0;
    for (idx, ch) in text.char_indices() {
        width += unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width > usize::from(max_width) {
            return &text[..idx];
        }
    }
    text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermEvent {
    Input { column: u16, input: Input },
    Resize(u16),
    Quit,
}

/// Terminal input relevant to the bar. Ends when the terminal's event stream does.
pub fn term_events() -> impl Stream<Item = TermEvent> {
    use event::{Event, KeyCode, KeyEventKind, KeyModifiers, MouseEventKind};

    event::EventStream::new().filter_map(|res| {
        let ev = match res {
            Ok(ev) => ev,
            Err(err) => {
                log::error!("Failed to read terminal event: {err}");
                return std::future::ready(None);
            }
        };
        std::future::ready(match ev {
            Event::Mouse(mouse) => {
                let input = match mouse.kind {
                    MouseEventKind::Down(event::MouseButton::Left) => {
                        Some(Input::Click(MouseButton::Left))
                    }
                    MouseEventKind::Down(event::MouseButton::Right) => {
                        Some(Input::Click(MouseButton::Right))
                    }
                    MouseEventKind::Down(event::MouseButton::Middle) => {
                        Some(Input::Click(MouseButton::Middle))
                    }
                    MouseEventKind::ScrollUp => Some(Input::ScrollUp),
                    MouseEventKind::ScrollDown => Some(Input::ScrollDown),
                    _ => None,
                };
                input.map(|input| TermEvent::Input {
                    column: mouse.column,
                    input,
                })
            }
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('q') => Some(TermEvent::Quit),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    Some(TermEvent::Quit)
                }
                _ => None,
            },
            Event::Resize(width, _) => Some(TermEvent::Resize(width)),
            _ => None,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(width: u16) -> TermSurface<Vec<u8>> {
        TermSurface::new(Vec::new(), width)
    }

    #[test]
    fn hit_maps_columns_to_leaf_handles() {
        let mut s = surface(40);
        let ws = s.add(Slot::Section(Section::Left));
        let one = s.add(Slot::Child(ws));
        let two = s.add(Slot::Child(ws));
        s.set_text(one, "1");
        s.set_text(two, "2");
        let clock = s.add(Slot::Section(Section::Right));
        s.set_text(clock, "12:00:00");
        s.present().unwrap();

        assert_eq!(s.hit(0), Some(one));
        assert_eq!(s.hit(1), None);
        assert_eq!(s.hit(2), Some(two));
        assert_eq!(s.hit(32), Some(clock));
        assert_eq!(s.hit(39), Some(clock));
        assert_eq!(s.hit(20), None);
    }

    #[test]
    fn reorder_and_remove_children() {
        let mut s = surface(40);
        let ws = s.add(Slot::Section(Section::Left));
        let a = s.add(Slot::Child(ws));
        let b = s.add(Slot::Child(ws));
        s.set_text(a, "a");
        s.set_text(b, "b");
        s.reorder(ws, &[b, a]);
        s.present().unwrap();
        assert_eq!(s.hit(0), Some(b));

        s.remove(b);
        s.present().unwrap();
        assert_eq!(s.hit(0), Some(a));
    }

    #[test]
    fn present_only_draws_when_changed() {
        let mut s = surface(20);
        let h = s.add(Slot::Section(Section::Center));
        s.set_text(h, "x");
        s.present().unwrap();
        let drawn = s.out.len();
        assert!(drawn > 0);

        s.set_text(h, "x");
        s.present().unwrap();
        assert_eq!(s.out.len(), drawn);
    }

    #[test]
    fn clip_respects_wide_chars() {
        assert_eq!(clip("abc", 2), "ab");
        assert_eq!(clip("💾x", 2), "💾");
        assert_eq!(clip("💾x", 1), "");
        assert_eq!(clip("ok", 10), "ok");
    }
}

//! Widget controllers and the presentation state they live in.
//!
//! [`Bar`] is owned by the presentation thread. Producers reach a widget only through
//! a callback built with [`update`], which looks the widget up by its slot when it runs.

mod network;
mod notification;
mod player;
mod system;
mod time;
mod volume;
mod window;
mod workspaces;

pub use network::*;
pub use notification::*;
pub use player::*;
pub use system::*;
pub use time::*;
pub use volume::*;
pub use window::*;
pub use workspaces::*;

use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::MissedTickBehavior;
use tokio_util::task::AbortOnDropHandle;

use crate::{
    compositor::EventListener,
    config::Config,
    dispatch::{UiFn, UiRx, UiTx},
    surface::{Handle, Input, Section, Slot, Surface},
};

/// Everything a widget may hook into while it is being set up.
pub struct InitCtx<'a> {
    pub ui_tx: &'a UiTx<Bar>,
    pub config: &'a Config,
    pub listener: &'a mut EventListener,
    /// Producer tasks. They are aborted when this is dropped.
    pub tasks: &'a mut Vec<AbortOnDropHandle<()>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidgetKind {
    Clock,
    Date,
    Window,
    Workspaces,
    Cpu,
    Memory,
    Disk,
    Network,
    Volume,
    Player,
    Notification,
}

pub const DEFAULT_LAYOUT: &[(Section, WidgetKind)] = &[
    (Section::Left, WidgetKind::Workspaces),
    (Section::Left, WidgetKind::Window),
    (Section::Center, WidgetKind::Player),
    (Section::Right, WidgetKind::Notification),
    (Section::Right, WidgetKind::Volume),
    (Section::Right, WidgetKind::Network),
    (Section::Right, WidgetKind::Cpu),
    (Section::Right, WidgetKind::Memory),
    (Section::Right, WidgetKind::Disk),
    (Section::Right, WidgetKind::Date),
    (Section::Right, WidgetKind::Clock),
];

pub enum Widget {
    Clock(Clock),
    Date(Date),
    Window(WindowTitle),
    Workspaces(Workspaces),
    Cpu(SystemStat),
    Memory(SystemStat),
    Disk(SystemStat),
    Network(Network),
    Volume(Volume),
    Player(Player),
    Notification(Notification),
}

/// Widgets that callbacks can find by slot.
pub trait Controller: Sized + 'static {
    fn from_widget(widget: &mut Widget) -> Option<&mut Self>;
}
macro_rules! controller {
    ($ty:ty => $($variant:ident)|+) => {
        impl Controller for $ty {
            fn from_widget(widget: &mut Widget) -> Option<&mut Self> {
                match widget {
                    $(Widget::$variant(it))|+ => Some(it),
                    _ => None,
                }
            }
        }
    };
}
controller!(Clock => Clock);
controller!(Date => Date);
controller!(WindowTitle => Window);
controller!(Workspaces => Workspaces);
controller!(SystemStat => Cpu | Memory | Disk);
controller!(Network => Network);
controller!(Volume => Volume);
controller!(Player => Player);
controller!(Notification => Notification);

/// A presentation callback that runs `f` against the widget in `slot`.
pub fn update<C: Controller>(
    slot: usize,
    f: impl FnOnce(&mut C, &mut dyn Surface) + Send + 'static,
) -> UiFn<Bar> {
    Box::new(move |bar: &mut Bar| {
        let Bar {
            surface, widgets, ..
        } = bar;
        match widgets.get_mut(slot).and_then(C::from_widget) {
            Some(widget) => f(widget, surface.as_mut()),
            None => log::error!("No {} in slot {slot}", std::any::type_name::<C>()),
        }
    })
}

impl Widget {
    pub fn initialize(
        kind: WidgetKind,
        section: Section,
        slot: usize,
        surface: &mut dyn Surface,
        ctx: &mut InitCtx,
    ) -> Self {
        let handle = surface.add(Slot::Section(section));
        match kind {
            WidgetKind::Clock => Self::Clock(Clock::initialize(handle, surface)),
            WidgetKind::Date => Self::Date(Date::initialize(handle, surface)),
            WidgetKind::Window => Self::Window(WindowTitle::initialize(handle, slot, surface, ctx)),
            WidgetKind::Workspaces => {
                Self::Workspaces(Workspaces::initialize(handle, slot, ctx))
            }
            WidgetKind::Cpu => Self::Cpu(SystemStat::cpu(handle, slot, surface, ctx)),
            WidgetKind::Memory => Self::Memory(SystemStat::memory(handle, slot, surface, ctx)),
            WidgetKind::Disk => Self::Disk(SystemStat::disk(handle, slot, surface, ctx)),
            WidgetKind::Network => Self::Network(Network::initialize(handle, slot, surface, ctx)),
            WidgetKind::Volume => Self::Volume(Volume::initialize(handle, slot, surface, ctx)),
            WidgetKind::Player => Self::Player(Player::initialize(handle, slot, surface, ctx)),
            WidgetKind::Notification => {
                Self::Notification(Notification::initialize(handle, slot, surface, ctx))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Clock(_) => "clock",
            Self::Date(_) => "date",
            Self::Window(_) => "window",
            Self::Workspaces(_) => "workspaces",
            Self::Cpu(_) => "cpu",
            Self::Memory(_) => "memory",
            Self::Disk(_) => "disk",
            Self::Network(_) => "network",
            Self::Volume(_) => "volume",
            Self::Player(_) => "player",
            Self::Notification(_) => "notification",
        }
    }

    pub fn display_handle(&self) -> Handle {
        match self {
            Self::Clock(it) => it.handle,
            Self::Date(it) => it.handle,
            Self::Window(it) => it.handle,
            Self::Workspaces(it) => it.container(),
            Self::Cpu(it) | Self::Memory(it) | Self::Disk(it) => it.handle,
            Self::Network(it) => it.handle,
            Self::Volume(it) => it.handle,
            Self::Player(it) => it.handle,
            Self::Notification(it) => it.handle,
        }
    }

    /// Only time-derived widgets do anything here.
    pub fn render_tick(&mut self, surface: &mut dyn Surface, now: DateTime<Local>) {
        match self {
            Self::Clock(it) => it.render_at(surface, now),
            Self::Date(it) => it.render_at(surface, now),
            _ => {}
        }
    }

    /// Re-reads external state now instead of waiting for the next interval.
    pub fn reload(&mut self) {
        match self {
            Self::Clock(it) => it.invalidate(),
            Self::Date(it) => it.invalidate(),
            Self::Window(_) => {}
            Self::Workspaces(it) => it.reload(),
            Self::Cpu(it) | Self::Memory(it) | Self::Disk(it) => it.reload(),
            Self::Network(it) => it.reload(),
            Self::Volume(it) => it.reload(),
            Self::Player(it) => it.reload(),
            Self::Notification(it) => it.reload(),
        }
    }

    /// Returns whether the widget owns `target`.
    fn on_input(&mut self, target: Handle, input: Input) -> bool {
        let owned = target == self.display_handle();
        match self {
            Self::Workspaces(it) => it.on_input(target, input),
            _ if !owned => false,
            Self::Volume(it) => {
                it.on_input(input);
                true
            }
            Self::Player(it) => {
                it.on_input(input);
                true
            }
            Self::Notification(it) => {
                it.on_input(input);
                true
            }
            _ => true,
        }
    }
}

pub struct Bar {
    surface: Box<dyn Surface>,
    widgets: Vec<Widget>,
    quit: bool,
}

impl Bar {
    pub fn new(surface: Box<dyn Surface>) -> Self {
        Self {
            surface,
            widgets: Vec::new(),
            quit: false,
        }
    }

    pub fn initialize(&mut self, layout: &[(Section, WidgetKind)], ctx: &mut InitCtx) {
        for &(section, kind) in layout {
            let slot = self.widgets.len();
            let widget = Widget::initialize(kind, section, slot, self.surface.as_mut(), ctx);
            log::debug!("Initialized {} in slot {slot}", widget.name());
            self.widgets.push(widget);
        }
    }

    pub fn surface_mut(&mut self) -> &mut dyn Surface {
        self.surface.as_mut()
    }

    pub fn render_tick(&mut self, now: DateTime<Local>) {
        for widget in &mut self.widgets {
            widget.render_tick(self.surface.as_mut(), now);
        }
    }

    pub fn on_input(&mut self, column: u16, input: Input) {
        let Some(target) = self.surface.hit(column) else {
            return;
        };
        if !self.widgets.iter_mut().any(|w| w.on_input(target, input)) {
            log::trace!("Input {input:?} at column {column} hit nothing interactive");
        }
    }

    pub fn reload_all(&mut self) {
        log::info!("Reloading all widgets");
        for widget in &mut self.widgets {
            widget.reload();
        }
        self.render_tick(Local::now());
    }

    pub fn quit(&mut self) {
        self.quit = true;
    }

    /// The presentation loop. Runs queued callbacks as they arrive and re-renders on
    /// every tick until asked to quit or every producer is gone.
    pub async fn run(&mut self, mut ui_rx: UiRx<Bar>, tick: Duration) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.quit {
            tokio::select! {
                f = ui_rx.recv() => {
                    let Some(f) = f else {
                        log::info!("All producers are gone");
                        break;
                    };
                    f(self);
                    ui_rx.drain(self);
                }
                _ = ticker.tick() => self.render_tick(Local::now()),
            }
            self.surface.present()?;
        }
        Ok(())
    }
}

/// Cuts `text` to at most `max` characters, marking the cut with `...`.
pub fn ellipsize(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        None => text.to_owned(),
        Some(_) => {
            let keep = max.saturating_sub(3);
            let end = text.char_indices().nth(keep).map_or(text.len(), |(i, _)| i);
            format!("{}...", &text[..end])
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ellipsize_counts_chars() {
        assert_eq!(ellipsize("short", 30), "short");
        assert_eq!(ellipsize("abcdefghij", 10), "abcdefghij");
        assert_eq!(ellipsize("abcdefghijk", 10), "abcdefg...");
        assert_eq!(ellipsize("ääääää", 5), "ää...");
    }

    #[test]
    fn render_tick_only_touches_time_widgets() {
        use chrono::TimeZone as _;

        use crate::surface::testing::Op;

        let (mut bar, surface) = test_util::bare_bar();
        let s = bar.surface_mut();
        let (bell, clock, date) = (
            s.add(Slot::Section(Section::Right)),
            s.add(Slot::Section(Section::Right)),
            s.add(Slot::Section(Section::Right)),
        );
        let widgets = vec![
            Widget::Notification(Notification::new(bell, s)),
            Widget::Clock(Clock::initialize(clock, s)),
            Widget::Date(Date::initialize(date, s)),
        ];
        bar.widgets = widgets;
        surface.take_ops();

        let now = Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 5).earliest().unwrap();
        bar.render_tick(now);
        assert_eq!(
            surface.take_ops(),
            [
                Op::SetText(clock, "09:30:05".into()),
                Op::SetText(date, "Friday 01 March 2024".into()),
            ]
        );

        bar.render_tick(now);
        assert!(surface.take_ops().is_empty());
        assert_eq!(surface.text(bell).as_deref(), Some("🔔"));
    }

    #[tokio::test]
    async fn run_applies_queued_updates_until_quit() {
        let (mut bar, surface) = test_util::bare_bar();
        let handle = bar.surface_mut().add(Slot::Section(Section::Left));
        let (tx, rx) = test_util::queue();

        assert!(tx.enqueue(move |bar| bar.surface_mut().set_text(handle, "A")).is_continue());
        assert!(tx.enqueue(move |bar| bar.surface_mut().set_text(handle, "B")).is_continue());
        assert!(tx.enqueue(Bar::quit).is_continue());

        tokio::time::timeout(Duration::from_secs(5), bar.run(rx, Duration::from_secs(3600)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(surface.text(handle).as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn run_ends_when_producers_are_gone() {
        let (mut bar, _surface) = test_util::bare_bar();
        let (tx, rx) = test_util::queue();
        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), bar.run(rx, Duration::from_secs(3600)))
            .await
            .unwrap()
            .unwrap();
    }
}

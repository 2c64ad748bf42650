use chrono::{DateTime, Local, NaiveDate};

use crate::surface::{Handle, Surface};

pub struct Clock {
    pub handle: Handle,
    last: String,
}
impl Clock {
    pub fn initialize(handle: Handle, surface: &mut dyn Surface) -> Self {
        surface.set_text(handle, "--:--:--");
        Self {
            handle,
            last: String::new(),
        }
    }

    pub fn invalidate(&mut self) {
        self.last.clear();
    }

    pub fn render_at(&mut self, surface: &mut dyn Surface, now: DateTime<Local>) {
        let text = now.format("%H:%M:%S").to_string();
        if text != self.last {
            surface.set_text(self.handle, &text);
            self.last = text;
        }
    }
}

pub struct Date {
    pub handle: Handle,
    last_day: Option<NaiveDate>,
}
impl Date {
    pub fn initialize(handle: Handle, surface: &mut dyn Surface) -> Self {
        surface.set_text(handle, "Date");
        Self {
            handle,
            last_day: None,
        }
    }

    pub fn invalidate(&mut self) {
        self.last_day = None;
    }

    pub fn render_at(&mut self, surface: &mut dyn Surface, now: DateTime<Local>) {
        let day = now.date_naive();
        if self.last_day == Some(day) {
            return;
        }
        log::debug!("Date changed to {day}");
        surface.set_text(self.handle, &now.format("%A %d %B %Y").to_string());
        self.last_day = Some(day);
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;
    use crate::surface::{Section, Slot, testing::*};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(y, m, d, h, min, s)
            .earliest()
            .unwrap()
    }

    #[test]
    fn date_skips_redraw_within_same_day() {
        let mut surface = RecordingSurface::default();
        let handle = surface.add(Slot::Section(Section::Right));
        let mut date = Date::initialize(handle, &mut surface);
        surface.take_ops();

        date.render_at(&mut surface, at(2024, 3, 1, 9, 0, 0));
        assert_eq!(
            surface.take_ops(),
            [Op::SetText(handle, "Friday 01 March 2024".into())]
        );

        date.render_at(&mut surface, at(2024, 3, 1, 17, 30, 0));
        assert!(surface.take_ops().is_empty());

        date.render_at(&mut surface, at(2024, 3, 2, 0, 0, 1));
        assert_eq!(
            surface.text(handle).as_deref(),
            Some("Saturday 02 March 2024")
        );
    }

    #[test]
    fn clock_renders_every_second() {
        let mut surface = RecordingSurface::default();
        let handle = surface.add(Slot::Section(Section::Right));
        let mut clock = Clock::initialize(handle, &mut surface);
        assert_eq!(surface.text(handle).as_deref(), Some("--:--:--"));

        clock.render_at(&mut surface, at(2024, 3, 1, 9, 5, 7));
        assert_eq!(surface.text(handle).as_deref(), Some("09:05:07"));
        surface.take_ops();

        clock.render_at(&mut surface, at(2024, 3, 1, 9, 5, 7));
        assert!(surface.take_ops().is_empty());
        clock.render_at(&mut surface, at(2024, 3, 1, 9, 5, 8));
        assert_eq!(surface.take_ops().len(), 1);
    }
}

//! The narrow interface through which widgets touch whatever draws the bar.

mod term;
pub use term::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Section {
    Left,
    Center,
    Right,
}

/// Where a new display element goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Section(Section),
    Child(Handle),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input {
    Click(MouseButton),
    ScrollUp,
    ScrollDown,
}

/// Display operations, only ever called from the presentation thread.
pub trait Surface {
    fn add(&mut self, slot: Slot) -> Handle;
    /// Removes the element and all of its children.
    fn remove(&mut self, handle: Handle);
    fn set_text(&mut self, handle: Handle, text: &str);
    /// Replaces the full class list of an element.
    fn set_classes(&mut self, handle: Handle, classes: &[&str]);
    /// Puts the listed children of `parent` in the given order.
    fn reorder(&mut self, parent: Handle, children: &[Handle]);

    /// Flushes pending changes to the screen.
    fn present(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
    /// The innermost element drawn at a column, if any.
    fn hit(&self, column: u16) -> Option<Handle> {
        _ = column;
        None
    }
    fn resize(&mut self, width: u16) {
        _ = width;
    }
}

//! Output for monitor frames

pub mod json;
pub mod status;

use std::io;

use crate::monitor::Frame;

pub use json::JsonLines;
pub use status::StatusLine;

pub trait Renderer {
    fn render(&mut self, frame: &Frame) -> io::Result<()>;

    /// Called once when monitoring stops, whether or not it failed
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Renderer + ?Sized> Renderer for Box<T> {
    fn render(&mut self, frame: &Frame) -> io::Result<()> {
        (**self).render(frame)
    }

    fn finish(&mut self) -> io::Result<()> {
        (**self).finish()
    }
}

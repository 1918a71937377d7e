//! Rendering context collaborator
//!
//! The transport renders and encodes on a shared GPU context. Creating and
//! destroying it is platform work; the engine only decides when.

/// Opaque reference to a native shared context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphicsContextHandle(pub u64);

pub trait GraphicsContext: Send {
    fn handle(&self) -> GraphicsContextHandle;

    /// Free the native context. Called exactly once before drop.
    fn release(&mut self);
}

pub trait GraphicsContextFactory: Send + Sync {
    fn create_graphics_context(&self) -> anyhow::Result<Box<dyn GraphicsContext>>;
}

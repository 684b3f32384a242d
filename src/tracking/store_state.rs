/// Lifecycle of a tracking store against its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreState {
    /// Constructed or loaded, never acquired
    #[default]
    Unopened,
    /// Inside the exclusive-access scope
    Acquired,
    /// Queue table flushed and scope closed
    Released,
}

pub mod slots;

pub use slots::SlotLayout;

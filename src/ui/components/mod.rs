//! Reusable UI components

mod profile_row;
mod session_card;
mod status_badge;

pub use profile_row::{ProfileAction, ProfileRow};
pub use session_card::{SessionCard, SlotAction};

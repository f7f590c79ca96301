//! Dialog windows

pub mod confirm;
pub mod profile_form;

use crate::core::ProfileId;

pub use profile_form::ProfileForm;

/// State for dialog windows
#[derive(Debug, Default)]
pub enum DialogState {
    #[default]
    None,
    ProfileForm(ProfileForm),
    ConfirmRemove { profile_id: ProfileId, name: String },
}

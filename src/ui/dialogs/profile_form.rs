//! New/edit profile dialog

use egui::Context;

use crate::core::{Profile, ProfileColor, ProfileId, ProfileRegistry, ProfileUpdate};
use crate::ui::theme::Theme;

/// Editable copy of a profile
#[derive(Debug, Clone)]
pub struct ProfileForm {
    /// Set when editing; the id itself is immutable
    editing: Option<ProfileId>,
    pub name: String,
    pub profile_id: String,
    pub color: [u8; 3],
    error: Option<String>,
}

impl ProfileForm {
    pub fn new_profile() -> Self {
        let color = ProfileColor::default();
        Self {
            editing: None,
            name: String::new(),
            profile_id: String::new(),
            color: [color.r, color.g, color.b],
            error: None,
        }
    }

    pub fn edit(profile: &Profile) -> Self {
        Self {
            editing: Some(profile.profile_id.clone()),
            name: profile.name.clone(),
            profile_id: profile.profile_id.as_str().to_string(),
            color: [profile.color.r, profile.color.g, profile.color.b],
            error: None,
        }
    }

    pub fn is_edit(&self) -> bool {
        self.editing.is_some()
    }

    fn color(&self) -> ProfileColor {
        ProfileColor::from_rgb(self.color[0], self.color[1], self.color[2])
    }

    /// Apply the form to the registry; returns a confirmation message
    pub fn submit(&self, registry: &mut ProfileRegistry) -> Result<String, String> {
        match &self.editing {
            Some(profile_id) => {
                let update = ProfileUpdate::default()
                    .name(self.name.clone())
                    .color(self.color());
                registry
                    .update(profile_id, update)
                    .map_err(|e| e.to_string())?;
                Ok(format!("Profile '{}' updated", self.name.trim()))
            }
            None => {
                let profile_id = ProfileId::parse(&self.profile_id).map_err(|e| e.to_string())?;
                registry
                    .add(self.name.clone(), profile_id, self.color())
                    .map_err(|e| e.to_string())?;
                Ok(format!("Profile '{}' added", self.name.trim()))
            }
        }
    }
}

/// What the dialog did this frame
pub enum FormOutcome {
    Open,
    Cancelled,
    Saved(String),
}

pub fn render(ctx: &Context, form: &mut ProfileForm, registry: &mut ProfileRegistry) -> FormOutcome {
    let mut open = true;
    let mut outcome = FormOutcome::Open;
    let title = if form.is_edit() {
        "Edit Profile"
    } else {
        "New Profile"
    };

    egui::Window::new(title)
        .open(&mut open)
        .collapsible(false)
        .resizable(false)
        .default_width(420.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            egui::Grid::new("profile_form")
                .num_columns(2)
                .spacing([12.0, 10.0])
                .show(ui, |ui| {
                    ui.label("Name:");
                    ui.add(
                        egui::TextEdit::singleline(&mut form.name)
                            .hint_text("e.g. Sales")
                            .desired_width(240.0),
                    );
                    ui.end_row();

                    ui.label("Profile ID:");
                    ui.add_enabled(
                        !form.is_edit(),
                        egui::TextEdit::singleline(&mut form.profile_id)
                            .hint_text("e.g. sales")
                            .desired_width(240.0),
                    );
                    ui.end_row();

                    ui.label("Color:");
                    ui.color_edit_button_srgb(&mut form.color);
                    ui.end_row();
                });

            if !form.is_edit() {
                ui.label(
                    egui::RichText::new("The ID names the profile's data folder and cannot be changed later.")
                        .small()
                        .color(Theme::TEXT_MUTED),
                );
            }

            if let Some(ref error) = form.error {
                ui.add_space(8.0);
                ui.label(egui::RichText::new(error).color(Theme::ERROR));
            }

            ui.add_space(16.0);

            ui.horizontal(|ui| {
                let can_save = !form.name.trim().is_empty()
                    && (form.is_edit() || !form.profile_id.trim().is_empty());

                if ui.add_enabled(can_save, egui::Button::new("Save")).clicked() {
                    match form.submit(registry) {
                        Ok(message) => outcome = FormOutcome::Saved(message),
                        Err(e) => form.error = Some(e),
                    }
                }

                if ui.button("Cancel").clicked() {
                    outcome = FormOutcome::Cancelled;
                }
            });
        });

    if !open {
        return FormOutcome::Cancelled;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> ProfileRegistry {
        ProfileRegistry::open(
            dir.path().join("profiles_config.json"),
            dir.path().join("profiles"),
        )
    }

    #[test]
    fn test_new_profile_form_adds() {
        let dir = TempDir::new().unwrap();
        let mut registry = registry(&dir);

        let mut form = ProfileForm::new_profile();
        form.name = " Sales ".to_string();
        form.profile_id = "sales".to_string();
        form.color = [0x1b, 0x5e, 0x20];
        form.submit(&mut registry).unwrap();

        let profile = &registry.get_all()[0];
        assert_eq!(profile.name, "Sales");
        assert_eq!(profile.color.to_hex(), "#1b5e20");
        assert!(profile.enabled);

        // Same id again is refused
        assert!(form.submit(&mut registry).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_edit_form_keeps_id() {
        let dir = TempDir::new().unwrap();
        let mut registry = registry(&dir);
        let id = ProfileId::parse("support").unwrap();
        registry
            .add("Support", id.clone(), ProfileColor::default())
            .unwrap();

        let mut form = ProfileForm::edit(registry.get(&id).unwrap());
        form.name = "Help desk".to_string();
        form.profile_id = "ignored".to_string();
        form.submit(&mut registry).unwrap();

        assert_eq!(registry.get(&id).unwrap().name, "Help desk");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_id_reported() {
        let dir = TempDir::new().unwrap();
        let mut registry = registry(&dir);
        let mut form = ProfileForm::new_profile();
        form.name = "Bad".to_string();
        form.profile_id = "../escape".to_string();
        assert!(form.submit(&mut registry).is_err());
        assert!(registry.is_empty());
    }
}

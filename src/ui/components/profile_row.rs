//! Profile row component for the dashboard list

use egui::Ui;

use crate::core::Profile;
use crate::ui::theme::{Icons, Theme};

pub struct ProfileRow;

impl ProfileRow {
    /// Render a profile as a list row
    pub fn show(ui: &mut Ui, profile: &Profile) -> Option<ProfileAction> {
        let mut action = None;

        egui::Frame::none()
            .fill(Theme::BG_SECONDARY)
            .rounding(egui::Rounding::same(6.0))
            .stroke(egui::Stroke::new(1.0, Theme::BORDER_LIGHT))
            .inner_margin(egui::Margin::symmetric(12.0, 8.0))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    let mut enabled = profile.enabled;
                    if ui
                        .checkbox(&mut enabled, "")
                        .on_hover_text("Start a session for this profile")
                        .changed()
                    {
                        action = Some(ProfileAction::SetEnabled(enabled));
                    }

                    // Color swatch
                    let (rect, _) =
                        ui.allocate_exact_size(egui::vec2(18.0, 18.0), egui::Sense::hover());
                    ui.painter().rect_filled(
                        rect,
                        egui::Rounding::same(4.0),
                        Theme::profile_color(profile.color),
                    );

                    ui.add_space(6.0);

                    let name_color = if profile.enabled {
                        Theme::TEXT_PRIMARY
                    } else {
                        Theme::TEXT_MUTED
                    };
                    ui.label(egui::RichText::new(&profile.name).strong().color(name_color));
                    ui.label(
                        egui::RichText::new(profile.profile_id.as_str())
                            .small()
                            .monospace()
                            .color(Theme::TEXT_MUTED),
                    );

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui
                            .small_button(Icons::TRASH)
                            .on_hover_text("Remove")
                            .clicked()
                        {
                            action = Some(ProfileAction::Remove);
                        }
                        if ui.small_button(Icons::EDIT).on_hover_text("Edit").clicked() {
                            action = Some(ProfileAction::Edit);
                        }
                        if ui
                            .small_button(Icons::FOLDER)
                            .on_hover_text("Open data folder")
                            .clicked()
                        {
                            action = Some(ProfileAction::OpenFolder);
                        }
                    });
                });
            });

        action
    }
}

/// Actions that can be triggered from a profile row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileAction {
    SetEnabled(bool),
    Edit,
    Remove,
    OpenFolder,
}

//! Confirmation dialog

use egui::Context;

use crate::ui::theme::Theme;

/// Labels and accent of a yes/no dialog
pub struct ConfirmStyle<'a> {
    pub confirm: &'a str,
    pub cancel: &'a str,
    pub confirm_color: egui::Color32,
}

impl Default for ConfirmStyle<'_> {
    fn default() -> Self {
        Self {
            confirm: "Confirm",
            cancel: "Cancel",
            confirm_color: Theme::ERROR,
        }
    }
}

/// Show a modal yes/no window.
///
/// Returns `Some(true)` on confirm, `Some(false)` on cancel or close and
/// `None` while the dialog is still open.
pub fn render(ctx: &Context, title: &str, message: &str, style: &ConfirmStyle<'_>) -> Option<bool> {
    let mut open = true;
    let mut answer = None;

    egui::Window::new(title)
        .id(egui::Id::new(("confirm", title)))
        .open(&mut open)
        .collapsible(false)
        .resizable(false)
        .default_width(380.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(message);

            ui.add_space(16.0);

            ui.horizontal(|ui| {
                if ui
                    .button(egui::RichText::new(style.confirm).color(style.confirm_color))
                    .clicked()
                {
                    answer = Some(true);
                }

                if ui.button(style.cancel).clicked() {
                    answer = Some(false);
                }
            });
        });

    if !open {
        return Some(false);
    }
    answer
}

//! Session card component for the host grid

use egui::{Color32, Ui};

use crate::core::orchestrator::SlotView;
use crate::core::SessionState;
use crate::ui::theme::{Icons, Theme};

use super::status_badge::StatusBadge;

pub struct SessionCard;

impl SessionCard {
    fn action_button(ui: &mut Ui, icon: &str, tooltip: &str, color: Color32) -> bool {
        let btn = egui::Button::new(egui::RichText::new(icon).size(13.0).color(color))
            .fill(Theme::BG_TERTIARY)
            .rounding(egui::Rounding::same(6.0))
            .min_size(egui::vec2(32.0, 28.0));

        ui.add(btn).on_hover_text(tooltip).clicked()
    }

    /// Header strip in the profile color with the label on top
    fn header(ui: &mut Ui, label: &str, color: Color32) {
        egui::Frame::none()
            .fill(color)
            .rounding(egui::Rounding {
                nw: 10.0,
                ne: 10.0,
                sw: 0.0,
                se: 0.0,
            })
            .inner_margin(egui::Margin::symmetric(14.0, 10.0))
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.label(
                    egui::RichText::new(label)
                        .strong()
                        .size(15.0)
                        .color(Color32::WHITE),
                );
            });
    }

    /// Render one grid cell
    pub fn show(ui: &mut Ui, view: &SlotView, width: f32) -> Option<SlotAction> {
        let mut action = None;

        let (label, color) = match view {
            SlotView::Session(snapshot) => (&snapshot.label, snapshot.color),
            SlotView::Failed { profile, .. } => (&profile.name, profile.color),
        };
        let color = Theme::profile_color(color);

        egui::Frame::none()
            .fill(Theme::BG_SECONDARY)
            .rounding(egui::Rounding::same(10.0))
            .stroke(egui::Stroke::new(1.0, color.linear_multiply(0.6)))
            .show(ui, |ui| {
                ui.set_width(width);
                Self::header(ui, label, color);

                egui::Frame::none()
                    .inner_margin(egui::Margin::same(14.0))
                    .show(ui, |ui| match view {
                        SlotView::Session(snapshot) => {
                            ui.horizontal(|ui| {
                                StatusBadge::show(ui, snapshot.state);
                                ui.add_space(8.0);
                                ui.label(
                                    egui::RichText::new(format!("⏱ {}", snapshot.uptime_string()))
                                        .size(11.0)
                                        .color(Theme::TEXT_SECONDARY),
                                );

                                ui.with_layout(
                                    egui::Layout::right_to_left(egui::Align::Center),
                                    |ui| {
                                        let can_reload = snapshot.state != SessionState::Disposed;
                                        if can_reload
                                            && Self::action_button(
                                                ui,
                                                Icons::RESTART,
                                                "Reload",
                                                Theme::TEXT_PRIMARY,
                                            )
                                        {
                                            action = Some(SlotAction::Reload);
                                        }
                                    },
                                );
                            });

                            ui.add_space(6.0);
                            ui.label(
                                egui::RichText::new(format!(
                                    "{} · {} keep-alive(s) · {} reload(s)",
                                    snapshot.profile_id,
                                    snapshot.keep_alive_ticks,
                                    snapshot.reload_count
                                ))
                                .size(11.0)
                                .color(Theme::TEXT_MUTED),
                            );

                            if let Some(ref error) = snapshot.last_error {
                                ui.add_space(6.0);
                                error_box(ui, error);
                            }
                        }
                        SlotView::Failed { error, .. } => {
                            ui.label(
                                egui::RichText::new(format!("{} Session could not be created", Icons::ERROR))
                                    .color(Theme::ERROR),
                            );
                            ui.add_space(6.0);
                            error_box(ui, error);
                        }
                    });
            });

        action
    }
}

fn error_box(ui: &mut Ui, error: &str) {
    egui::Frame::none()
        .fill(Theme::ERROR.linear_multiply(0.15))
        .rounding(egui::Rounding::same(6.0))
        .inner_margin(egui::Margin::same(8.0))
        .show(ui, |ui| {
            ui.label(
                egui::RichText::new(error)
                    .size(11.0)
                    .color(Theme::ERROR_LIGHT),
            );
        });
}

/// Actions that can be triggered from a session card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAction {
    Reload,
}

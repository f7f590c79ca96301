//! Toast notifications

use std::time::{Duration, Instant};

use egui::Context;

use crate::ui::theme::Theme;

const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Notification message
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub created_at: Instant,
}

#[derive(Debug, Clone, Copy)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Default)]
pub struct Notifications {
    items: Vec<Notification>,
}

impl Notifications {
    pub fn notify(&mut self, message: impl Into<String>, level: NotificationLevel) {
        self.items.push(Notification {
            message: message.into(),
            level,
            created_at: Instant::now(),
        });
    }

    /// Drop expired toasts and draw the rest in the top-right corner
    pub fn show(&mut self, ctx: &Context) {
        self.items
            .retain(|n| n.created_at.elapsed() < NOTIFICATION_TIMEOUT);
        if self.items.is_empty() {
            return;
        }

        egui::Area::new(egui::Id::new("notifications"))
            .fixed_pos(egui::pos2(ctx.screen_rect().width() - 360.0, 70.0))
            .show(ctx, |ui| {
                for notification in &self.items {
                    let (icon, accent) = match notification.level {
                        NotificationLevel::Info => ("ℹ", Theme::INFO),
                        NotificationLevel::Success => ("✓", Theme::SUCCESS),
                        NotificationLevel::Warning => ("⚠", Theme::WARNING),
                        NotificationLevel::Error => ("✕", Theme::ERROR),
                    };

                    egui::Frame::none()
                        .fill(Theme::BG_ELEVATED)
                        .rounding(egui::Rounding::same(10.0))
                        .stroke(egui::Stroke::new(1.0, accent.linear_multiply(0.5)))
                        .inner_margin(egui::Margin::same(14.0))
                        .show(ui, |ui| {
                            ui.set_width(320.0);
                            ui.horizontal(|ui| {
                                ui.label(egui::RichText::new(icon).size(14.0).color(accent));
                                ui.add_space(8.0);
                                ui.label(
                                    egui::RichText::new(&notification.message)
                                        .size(13.0)
                                        .color(Theme::TEXT_PRIMARY),
                                );
                            });
                        });

                    ui.add_space(10.0);
                }
            });
    }
}

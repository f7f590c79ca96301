//! Registry editor - Add, edit, enable and remove profiles, then start the host

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context as _, Result};
use egui::{CentralPanel, Context, TopBottomPanel};
use tracing::{error, info, warn};

use super::components::{ProfileAction, ProfileRow};
use super::dialogs::confirm::{self, ConfirmStyle};
use super::dialogs::profile_form::{self, FormOutcome};
use super::dialogs::{DialogState, ProfileForm};
use super::notifications::{NotificationLevel, Notifications};
use super::theme::{Icons, Theme};
use crate::core::{ProfileId, ProfileRegistry, ProfileUpdate};

/// Name of the session host executable
const HOST_BINARY: &str = "multizap";

/// Path of the host binary installed next to this one
pub fn host_executable() -> Result<PathBuf> {
    let current = std::env::current_exe().context("Failed to locate current executable")?;
    let dir = current
        .parent()
        .context("Current executable has no parent directory")?;
    Ok(dir.join(format!("{}{}", HOST_BINARY, std::env::consts::EXE_SUFFIX)))
}

pub struct DashboardApp {
    registry: ProfileRegistry,
    dialog: DialogState,
    notifications: Notifications,
}

impl DashboardApp {
    pub fn new(cc: &eframe::CreationContext<'_>, registry: ProfileRegistry) -> Self {
        Theme::apply_dark(&cc.egui_ctx);

        if let Err(e) = registry.ensure_profiles_root() {
            warn!("Could not create {:?}: {}", registry.profiles_root(), e);
        }

        Self {
            registry,
            dialog: DialogState::None,
            notifications: Notifications::default(),
        }
    }

    fn render_top_bar(&mut self, ctx: &Context) {
        TopBottomPanel::top("top_bar")
            .frame(
                egui::Frame::none()
                    .fill(Theme::BG_PRIMARY)
                    .stroke(egui::Stroke::new(1.0, Theme::BORDER_LIGHT))
                    .inner_margin(egui::Margin::symmetric(20.0, 12.0)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        egui::RichText::new(crate::APP_NAME)
                            .size(22.0)
                            .strong()
                            .color(Theme::PRIMARY),
                    );
                    ui.label(
                        egui::RichText::new(format!("v{}", crate::APP_VERSION))
                            .small()
                            .color(Theme::TEXT_MUTED),
                    );

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let start_btn = egui::Button::new(
                            egui::RichText::new(format!("{} Start {}", Icons::PLAY, crate::APP_NAME))
                                .color(egui::Color32::WHITE),
                        )
                        .fill(Theme::PRIMARY_DARK)
                        .rounding(egui::Rounding::same(8.0))
                        .min_size(egui::vec2(150.0, 36.0));

                        if ui.add(start_btn).clicked() {
                            self.start_host(ui.ctx());
                        }

                        ui.add_space(8.0);

                        if ui
                            .button(format!("{} New Profile", Icons::ADD))
                            .clicked()
                        {
                            self.dialog = DialogState::ProfileForm(ProfileForm::new_profile());
                        }
                    });
                });
            });
    }

    fn render_profiles(&mut self, ctx: &Context) {
        CentralPanel::default().show(ctx, |ui| {
            let enabled = self.registry.get_enabled().len();
            ui.label(
                egui::RichText::new(format!(
                    "{} profiles, {} enabled",
                    self.registry.len(),
                    enabled
                ))
                .color(Theme::TEXT_SECONDARY),
            );
            ui.add_space(8.0);

            if self.registry.is_empty() {
                render_empty_state(ui);
                return;
            }

            let mut actions = Vec::new();
            egui::ScrollArea::vertical().show(ui, |ui| {
                for profile in self.registry.get_all() {
                    if let Some(action) = ProfileRow::show(ui, profile) {
                        actions.push((profile.profile_id.clone(), action));
                    }
                    ui.add_space(4.0);
                }
            });

            for (profile_id, action) in actions {
                self.handle_action(profile_id, action);
            }
        });
    }

    fn handle_action(&mut self, profile_id: ProfileId, action: ProfileAction) {
        match action {
            ProfileAction::SetEnabled(enabled) => {
                let update = ProfileUpdate::default().enabled(enabled);
                if let Err(e) = self.registry.update(&profile_id, update) {
                    self.notifications
                        .notify(format!("Failed to save: {}", e), NotificationLevel::Error);
                }
            }
            ProfileAction::Edit => {
                if let Some(profile) = self.registry.get(&profile_id) {
                    self.dialog = DialogState::ProfileForm(ProfileForm::edit(profile));
                }
            }
            ProfileAction::Remove => {
                if let Some(profile) = self.registry.get(&profile_id) {
                    self.dialog = DialogState::ConfirmRemove {
                        name: profile.name.clone(),
                        profile_id,
                    };
                }
            }
            ProfileAction::OpenFolder => {
                let path = self.registry.storage_path(&profile_id);
                let result = std::fs::create_dir_all(&path)
                    .map_err(anyhow::Error::from)
                    .and_then(|_| open::that(&path).map_err(anyhow::Error::from));
                if let Err(e) = result {
                    warn!("Failed to open {:?}: {}", path, e);
                    self.notifications.notify(
                        format!("Could not open {}", path.display()),
                        NotificationLevel::Warning,
                    );
                }
            }
        }
    }

    fn render_dialogs(&mut self, ctx: &Context) {
        match &mut self.dialog {
            DialogState::None => {}
            DialogState::ProfileForm(form) => match profile_form::render(ctx, form, &mut self.registry) {
                FormOutcome::Open => {}
                FormOutcome::Cancelled => self.dialog = DialogState::None,
                FormOutcome::Saved(message) => {
                    self.notifications.notify(message, NotificationLevel::Success);
                    self.dialog = DialogState::None;
                }
            },
            DialogState::ConfirmRemove { profile_id, name } => {
                let message = format!(
                    "Remove profile '{}'?\n\nIts data folder will not be deleted.",
                    name
                );
                let style = ConfirmStyle {
                    confirm: "Remove",
                    ..ConfirmStyle::default()
                };
                if let Some(confirmed) = confirm::render(ctx, "Remove Profile", &message, &style) {
                    if confirmed {
                        let profile_id = profile_id.clone();
                        match self.registry.remove(&profile_id) {
                            Ok(()) => self.notifications.notify(
                                format!("Profile '{}' removed", profile_id),
                                NotificationLevel::Info,
                            ),
                            Err(e) => self
                                .notifications
                                .notify(format!("Failed to save: {}", e), NotificationLevel::Error),
                        }
                    }
                    self.dialog = DialogState::None;
                }
            }
        }
    }

    fn start_host(&mut self, ctx: &Context) {
        if self.registry.get_enabled().is_empty() {
            self.notifications.notify(
                "Enable at least one profile before starting",
                NotificationLevel::Warning,
            );
            return;
        }

        let result = host_executable().and_then(|path| {
            Command::new(&path)
                .spawn()
                .with_context(|| format!("Failed to launch {}", path.display()))
        });

        match result {
            Ok(child) => {
                info!("Started session host (PID {})", child.id());
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
            Err(e) => {
                error!("{:#}", e);
                self.notifications
                    .notify(format!("{:#}", e), NotificationLevel::Error);
            }
        }
    }
}

fn render_empty_state(ui: &mut egui::Ui) {
    egui::Frame::none()
        .fill(Theme::BG_SECONDARY)
        .rounding(egui::Rounding::same(8.0))
        .inner_margin(egui::Margin::same(32.0))
        .show(ui, |ui| {
            ui.vertical_centered(|ui| {
                ui.label(
                    egui::RichText::new("No profiles yet")
                        .size(16.0)
                        .color(Theme::TEXT_PRIMARY),
                );
                ui.add_space(8.0);
                ui.label(
                    egui::RichText::new("Each profile keeps its own login, chats and cache.")
                        .color(Theme::TEXT_SECONDARY),
                );
            });
        });
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint_after(Duration::from_millis(250));

        self.render_top_bar(ctx);
        self.render_profiles(ctx);
        self.notifications.show(ctx);
        self.render_dialogs(ctx);
    }
}

//! Session host - Grid of live sessions with permission prompts

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use egui::{CentralPanel, Context, TopBottomPanel};
use tracing::{info, warn};

use super::components::{SessionCard, SlotAction};
use super::notifications::{NotificationLevel, Notifications};
use super::prompt::{EguiPrompt, PromptQueue};
use super::theme::{Icons, Theme};
use crate::core::orchestrator::GRID_COLUMNS;
use crate::core::session::DisplaySlot;
use crate::core::{
    DisplaySurface, HostCapability, Orchestrator, OrchestratorError, PermissionArbiter,
    ProfileRegistry, RenderingEngine, Settings,
};

/// Everything the host window needs to start its sessions
pub struct HostSetup {
    pub settings: Settings,
    pub registry: ProfileRegistry,
    pub capability: HostCapability,
    pub engine: Arc<dyn RenderingEngine>,
}

/// Display surface tracking how many grid rows are in use
#[derive(Debug, Default)]
pub struct GridLayout {
    rows: Cell<usize>,
}

impl GridLayout {
    pub fn rows(&self) -> usize {
        self.rows.get()
    }
}

impl DisplaySurface for GridLayout {
    fn create_display_region(&self, row: usize, col: usize) -> DisplaySlot {
        self.rows.set(self.rows.get().max(row + 1));
        DisplaySlot { row, col }
    }
}

enum HostStatus {
    Running,
    NoEnabledProfiles,
}

pub struct HostApp {
    orchestrator: Orchestrator,
    prompts: PromptQueue,
    notifications: Notifications,
    capability: HostCapability,
    layout: GridLayout,
    status: HostStatus,
}

impl HostApp {
    /// Build the orchestrator and start one session per enabled profile.
    ///
    /// Must be called with a tokio runtime entered.
    pub fn new(cc: &eframe::CreationContext<'_>, setup: HostSetup) -> Self {
        Theme::apply_dark(&cc.egui_ctx);

        let (prompt, prompts) = EguiPrompt::new(cc.egui_ctx.clone());
        let mut orchestrator = Orchestrator::new(
            setup.engine,
            Arc::new(PermissionArbiter::new(setup.settings.trust_policy())),
            Arc::new(prompt),
            setup.settings.storage_binding,
            setup.settings.service_url.clone(),
        );

        let layout = GridLayout::default();
        let status = match orchestrator.start(&setup.registry, &setup.capability, &layout) {
            Ok(slots) => {
                info!("Host started with {} slot(s)", slots.len());
                HostStatus::Running
            }
            Err(OrchestratorError::NoEnabledProfiles) => HostStatus::NoEnabledProfiles,
        };

        Self {
            orchestrator,
            prompts,
            notifications: Notifications::default(),
            capability: setup.capability,
            layout,
            status,
        }
    }

    fn render_top_bar(&mut self, ctx: &Context) {
        TopBottomPanel::top("top_bar")
            .frame(
                egui::Frame::none()
                    .fill(Theme::BG_PRIMARY)
                    .stroke(egui::Stroke::new(1.0, Theme::BORDER_LIGHT))
                    .inner_margin(egui::Margin::symmetric(20.0, 10.0)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        egui::RichText::new(crate::APP_NAME)
                            .size(20.0)
                            .strong()
                            .color(Theme::PRIMARY),
                    );
                    ui.add_space(12.0);
                    ui.label(
                        egui::RichText::new(format!(
                            "{} tier · {} of {} running",
                            self.capability.tier.label(),
                            self.orchestrator.running_count(),
                            self.orchestrator.slots().len()
                        ))
                        .color(Theme::TEXT_SECONDARY),
                    );

                    if !self.prompts.is_empty() {
                        ui.add_space(12.0);
                        ui.label(
                            egui::RichText::new(format!(
                                "{} {} pending request(s)",
                                Icons::WARNING,
                                self.prompts.len()
                            ))
                            .color(Theme::WARNING),
                        );
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui
                            .button(format!("{} Restart all", Icons::RESTART))
                            .clicked()
                        {
                            self.orchestrator.restart_all();
                            self.notifications
                                .notify("All sessions restarted", NotificationLevel::Info);
                        }
                    });
                });
            });
    }

    fn render_grid(&mut self, ctx: &Context) {
        let views = self.orchestrator.views();
        let mut reload = None;

        CentralPanel::default().show(ctx, |ui| {
            let spacing = ui.spacing().item_spacing.x;
            let width = ((ui.available_width() - spacing) / GRID_COLUMNS as f32).max(200.0);

            egui::ScrollArea::vertical().show(ui, |ui| {
                for row in 0..self.layout.rows() {
                    ui.horizontal_top(|ui| {
                        for col in 0..GRID_COLUMNS {
                            let slot = DisplaySlot { row, col };
                            let Some(index) = views.iter().position(|v| v.slot() == slot) else {
                                continue;
                            };
                            if let Some(SlotAction::Reload) =
                                SessionCard::show(ui, &views[index], width - 2.0)
                            {
                                reload = Some(index);
                            }
                        }
                    });
                    ui.add_space(spacing);
                }
            });
        });

        if let Some(index) = reload {
            self.orchestrator.reload(index);
        }
    }

    fn render_no_profiles(&mut self, ctx: &Context) {
        CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(ui.available_height() / 3.0);
                ui.label(
                    egui::RichText::new(format!("{} No enabled profiles", Icons::WARNING))
                        .size(20.0)
                        .color(Theme::WARNING),
                );
                ui.add_space(8.0);
                ui.label(
                    egui::RichText::new(
                        "Open the dashboard, enable at least one profile and start again.",
                    )
                    .color(Theme::TEXT_SECONDARY),
                );
                ui.add_space(16.0);
                if ui.button("Close").clicked() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });
        });
    }
}

impl eframe::App for HostApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint_after(Duration::from_millis(500));

        match self.status {
            HostStatus::NoEnabledProfiles => self.render_no_profiles(ctx),
            HostStatus::Running => {
                self.render_top_bar(ctx);
                self.render_grid(ctx);
                self.prompts.show(ctx);
                self.notifications.show(ctx);
            }
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if !self.prompts.is_empty() {
            warn!("Exiting with {} unanswered prompt(s)", self.prompts.len());
        }
        self.orchestrator.shutdown();
        info!("Session host exiting");
    }
}

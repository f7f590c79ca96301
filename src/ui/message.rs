//! Standalone message window for errors reported before or instead of the main UI

use egui::Context;

use super::theme::{Icons, Theme};

struct MessageApp {
    title: String,
    message: String,
}

impl eframe::App for MessageApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(Icons::ERROR).size(22.0).color(Theme::ERROR));
                ui.label(egui::RichText::new(&self.title).size(18.0).strong());
            });
            ui.add_space(8.0);
            ui.label(egui::RichText::new(&self.message).color(Theme::TEXT_SECONDARY));
            ui.add_space(16.0);
            if ui.button("OK").clicked() {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });
    }
}

/// Show a blocking message window until the user closes it
pub fn show_message(title: &str, message: &str) -> anyhow::Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([460.0, 200.0])
            .with_resizable(false),
        ..Default::default()
    };

    let app = MessageApp {
        title: title.to_string(),
        message: message.to_string(),
    };
    eframe::run_native(
        crate::APP_NAME,
        native_options,
        Box::new(|cc| {
            Theme::apply_dark(&cc.egui_ctx);
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Failed to show message window: {}", e))
}

//! Theme and styling for the UI

use egui::{Color32, FontFamily, FontId, Rounding, Stroke, TextStyle, Visuals};

use crate::core::{ProfileColor, SessionState};

/// Application color palette
pub struct Theme;

impl Theme {
    // Primary colors - messaging green accent
    pub const PRIMARY: Color32 = Color32::from_rgb(37, 211, 102);
    pub const PRIMARY_DARK: Color32 = Color32::from_rgb(18, 140, 126);
    pub const PRIMARY_LIGHT: Color32 = Color32::from_rgb(134, 239, 172);

    // Status colors
    pub const SUCCESS: Color32 = Color32::from_rgb(16, 185, 129); // Emerald-500
    pub const WARNING: Color32 = Color32::from_rgb(245, 158, 11); // Amber-500
    pub const ERROR: Color32 = Color32::from_rgb(244, 63, 94); // Rose-500
    pub const ERROR_LIGHT: Color32 = Color32::from_rgb(251, 113, 133); // Rose-400
    pub const INFO: Color32 = Color32::from_rgb(6, 182, 212); // Cyan-500

    // Neutral colors (dark theme)
    pub const BG_PRIMARY: Color32 = Color32::from_rgb(17, 17, 27);
    pub const BG_SECONDARY: Color32 = Color32::from_rgb(24, 24, 37);
    pub const BG_TERTIARY: Color32 = Color32::from_rgb(35, 35, 52);
    pub const BG_HOVER: Color32 = Color32::from_rgb(45, 45, 65);
    pub const BG_ELEVATED: Color32 = Color32::from_rgb(30, 30, 45);

    // Text colors
    pub const TEXT_PRIMARY: Color32 = Color32::from_rgb(250, 250, 255);
    pub const TEXT_SECONDARY: Color32 = Color32::from_rgb(161, 161, 180);
    pub const TEXT_MUTED: Color32 = Color32::from_rgb(113, 113, 132);

    // Border colors
    pub const BORDER: Color32 = Color32::from_rgb(50, 50, 70);
    pub const BORDER_LIGHT: Color32 = Color32::from_rgb(38, 38, 55);

    /// Apply dark theme to egui
    pub fn apply_dark(ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();
        let mut visuals = Visuals::dark();

        visuals.panel_fill = Self::BG_PRIMARY;
        visuals.window_fill = Self::BG_ELEVATED;
        visuals.extreme_bg_color = Self::BG_PRIMARY;
        visuals.faint_bg_color = Self::BG_TERTIARY;

        visuals.widgets.noninteractive.bg_fill = Self::BG_SECONDARY;
        visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, Self::TEXT_PRIMARY);
        visuals.widgets.noninteractive.bg_stroke = Stroke::new(0.5, Self::BORDER_LIGHT);
        visuals.widgets.noninteractive.rounding = Rounding::same(6.0);

        visuals.widgets.inactive.bg_fill = Self::BG_TERTIARY;
        visuals.widgets.inactive.fg_stroke = Stroke::new(1.0, Self::TEXT_SECONDARY);
        visuals.widgets.inactive.bg_stroke = Stroke::new(0.5, Self::BORDER);
        visuals.widgets.inactive.rounding = Rounding::same(6.0);

        visuals.widgets.hovered.bg_fill = Self::BG_HOVER;
        visuals.widgets.hovered.fg_stroke = Stroke::new(1.0, Self::TEXT_PRIMARY);
        visuals.widgets.hovered.bg_stroke = Stroke::new(1.0, Self::PRIMARY.linear_multiply(0.6));
        visuals.widgets.hovered.rounding = Rounding::same(6.0);
        visuals.widgets.hovered.expansion = 1.0;

        visuals.widgets.active.bg_fill = Self::PRIMARY_DARK;
        visuals.widgets.active.fg_stroke = Stroke::new(1.0, Color32::WHITE);
        visuals.widgets.active.bg_stroke = Stroke::new(1.0, Self::PRIMARY);
        visuals.widgets.active.rounding = Rounding::same(6.0);

        visuals.selection.bg_fill = Self::PRIMARY.linear_multiply(0.25);
        visuals.selection.stroke = Stroke::new(1.0, Self::PRIMARY);

        visuals.window_rounding = Rounding::same(10.0);
        visuals.window_stroke = Stroke::new(0.5, Self::BORDER);
        visuals.window_shadow = egui::Shadow {
            offset: egui::vec2(0.0, 10.0),
            blur: 30.0,
            spread: 8.0,
            color: Color32::from_black_alpha(120),
        };
        visuals.striped = true;

        style.visuals = visuals;

        style.text_styles = [
            (TextStyle::Small, FontId::new(12.0, FontFamily::Proportional)),
            (TextStyle::Body, FontId::new(14.0, FontFamily::Proportional)),
            (TextStyle::Button, FontId::new(14.0, FontFamily::Proportional)),
            (TextStyle::Heading, FontId::new(20.0, FontFamily::Proportional)),
            (TextStyle::Monospace, FontId::new(13.0, FontFamily::Monospace)),
        ]
        .into();

        style.spacing.item_spacing = egui::vec2(8.0, 8.0);
        style.spacing.window_margin = egui::Margin::same(16.0);
        style.spacing.button_padding = egui::vec2(14.0, 8.0);
        style.interaction.tooltip_delay = 0.3;

        ctx.set_style(style);
    }

    /// Get color for session state
    pub fn status_color(state: SessionState) -> Color32 {
        match state {
            SessionState::Ready => Self::SUCCESS,
            SessionState::Loading | SessionState::Reloading => Self::WARNING,
            SessionState::Created => Self::INFO,
            SessionState::Disposed => Self::TEXT_MUTED,
        }
    }

    pub fn profile_color(color: ProfileColor) -> Color32 {
        Color32::from_rgb(color.r, color.g, color.b)
    }
}

/// Icon characters (using Unicode symbols)
pub struct Icons;

impl Icons {
    pub const PLAY: &'static str = "▶";
    pub const RESTART: &'static str = "↻";
    pub const ADD: &'static str = "+";
    pub const FOLDER: &'static str = "📁";
    pub const WARNING: &'static str = "⚠";
    pub const ERROR: &'static str = "⛔";
    pub const TRASH: &'static str = "🗑";
    pub const EDIT: &'static str = "✎";
}

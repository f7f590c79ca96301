//! Status badge component

use egui::{Response, Rounding, Ui, Vec2};

use crate::core::SessionState;
use crate::ui::theme::Theme;

pub struct StatusBadge;

impl StatusBadge {
    /// Render a full status badge with text
    pub fn show(ui: &mut Ui, state: SessionState) -> Response {
        let color = Theme::status_color(state);

        let (rect, response) = ui.allocate_exact_size(Vec2::new(90.0, 24.0), egui::Sense::hover());

        if ui.is_rect_visible(rect) {
            let painter = ui.painter();

            painter.rect_filled(rect, Rounding::same(12.0), color.linear_multiply(0.15));
            painter.rect_stroke(
                rect,
                Rounding::same(12.0),
                egui::Stroke::new(1.0, color.linear_multiply(0.3)),
            );

            let dot_center = rect.left_center() + Vec2::new(14.0, 0.0);
            if state == SessionState::Ready {
                painter.circle_filled(dot_center, 6.0, color.linear_multiply(0.3));
            }
            painter.circle_filled(dot_center, 4.0, color);

            painter.text(
                rect.center() + Vec2::new(8.0, 0.0),
                egui::Align2::CENTER_CENTER,
                state.label(),
                egui::FontId::proportional(12.0),
                color,
            );
        }

        response
    }
}

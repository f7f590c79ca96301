//! Yes/no prompts raised from session tasks and answered on the UI thread

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};

use egui::Context;
use tracing::{debug, warn};

use crate::core::PromptProvider;
use crate::ui::dialogs::confirm::{self, ConfirmStyle};
use crate::ui::theme::Theme;

/// A question waiting for the user
pub struct PendingPrompt {
    pub title: String,
    pub message: String,
    reply: SyncSender<bool>,
}

/// Prompt provider that hands questions to the egui thread and blocks for the answer
#[derive(Clone)]
pub struct EguiPrompt {
    requests: Sender<PendingPrompt>,
    ctx: Context,
}

impl EguiPrompt {
    pub fn new(ctx: Context) -> (Self, PromptQueue) {
        let (requests, incoming) = mpsc::channel();
        (
            Self { requests, ctx },
            PromptQueue {
                incoming,
                pending: VecDeque::new(),
            },
        )
    }
}

impl PromptProvider for EguiPrompt {
    fn ask(&self, title: &str, message: &str) -> Option<bool> {
        let (reply, answer) = mpsc::sync_channel(1);
        let prompt = PendingPrompt {
            title: title.to_string(),
            message: message.to_string(),
            reply,
        };
        if self.requests.send(prompt).is_err() {
            warn!("Prompt queue is gone, no answer for '{}'", title);
            return None;
        }
        self.ctx.request_repaint();

        // A dropped prompt (window closed) ends the wait with no answer
        answer.recv().ok()
    }
}

/// UI side of the prompt channel; shows one modal at a time, oldest first
pub struct PromptQueue {
    incoming: Receiver<PendingPrompt>,
    pending: VecDeque<PendingPrompt>,
}

impl PromptQueue {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn collect(&mut self) {
        self.pending.extend(self.incoming.try_iter());
    }

    /// Reply to the prompt that has waited longest
    fn answer_oldest(&mut self, answer: bool) {
        if let Some(prompt) = self.pending.pop_front() {
            debug!("User answered '{}' with {}", prompt.title, answer);
            let _ = prompt.reply.send(answer);
        }
    }

    /// Pull new prompts and render the oldest one
    pub fn show(&mut self, ctx: &Context) {
        self.collect();

        let Some(prompt) = self.pending.front() else {
            return;
        };

        let message = if self.pending.len() > 1 {
            format!("{}\n\n({} more waiting)", prompt.message, self.pending.len() - 1)
        } else {
            prompt.message.clone()
        };
        let style = ConfirmStyle {
            confirm: "Allow",
            cancel: "Deny",
            confirm_color: Theme::SUCCESS,
        };

        if let Some(answer) = confirm::render(ctx, &prompt.title, &message, &style) {
            self.answer_oldest(answer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_reaches_asking_thread() {
        let (prompt, queue) = EguiPrompt::new(Context::default());

        let asker = std::thread::spawn(move || prompt.ask("Access Request", "mic?"));

        let pending = queue.incoming.recv().unwrap();
        assert_eq!(pending.message, "mic?");
        pending.reply.send(true).unwrap();
        assert_eq!(asker.join().unwrap(), Some(true));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dropped_queue_fails_closed() {
        let (prompt, queue) = EguiPrompt::new(Context::default());
        let asker = std::thread::spawn(move || prompt.ask("Access Request", "camera?"));

        let pending = queue.incoming.recv().unwrap();
        drop(pending);
        assert_eq!(asker.join().unwrap(), None);
    }

    fn wait_for_len(queue: &mut PromptQueue, len: usize) {
        for _ in 0..500 {
            queue.collect();
            if queue.len() == len {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        panic!("queue never reached {} prompts", len);
    }

    #[test]
    fn test_prompts_are_answered_oldest_first() {
        let (prompt, mut queue) = EguiPrompt::new(Context::default());

        let first = {
            let prompt = prompt.clone();
            std::thread::spawn(move || prompt.ask("Access Request", "sales: microphone?"))
        };
        wait_for_len(&mut queue, 1);
        let second = std::thread::spawn(move || prompt.ask("Access Request", "support: camera?"));
        wait_for_len(&mut queue, 2);
        assert_eq!(queue.pending[0].message, "sales: microphone?");

        queue.answer_oldest(false);
        assert_eq!(first.join().unwrap(), Some(false));
        assert_eq!(queue.len(), 1);
        assert!(!second.is_finished());

        queue.answer_oldest(true);
        assert_eq!(second.join().unwrap(), Some(true));
        assert!(queue.is_empty());

        queue.answer_oldest(true);
    }
}

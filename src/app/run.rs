use std::io;
use std::time::{Duration, Instant};

use crossterm::event;
use ratatui::prelude::*;

use ht_base::constants::{EVENT_POLL, RENDER_THROTTLE};

use crate::app::App;
use crate::app::events::handle_event;
use crate::ui;

impl App {
    pub fn run(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
        let mut last_render: Option<Instant> = None;

        loop {
            // === INPUT FIRST ===
            if event::poll(Duration::ZERO)? {
                let evt = event::read()?;
                let Some(action) = handle_event(&evt, &self.state) else {
                    break;
                };
                self.handle_action(action);

                // Render immediately after input for instant feedback
                terminal.draw(|frame| ui::render(frame, &self.state))?;
                self.state.dirty = false;
                last_render = Some(Instant::now());
                continue;
            }

            // === MUTATIONS FROM BACKGROUND TASKS ===
            self.pump(EVENT_POLL);
            if self.state.expire_messages(Instant::now()) {
                self.state.dirty = true;
            }

            let due = last_render.is_none_or(|t| t.elapsed() >= RENDER_THROTTLE);
            if self.state.dirty && due {
                terminal.draw(|frame| ui::render(frame, &self.state))?;
                self.state.dirty = false;
                last_render = Some(Instant::now());
            }
        }

        Ok(())
    }
}

//! Progress lines shown while the video is being generated.

use std::convert::Infallible;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};

const FIRST_MESSAGE: &str = "Initializing Veo model...";

const MESSAGES: [&str; 6] = [
    "Analyzing reference images...",
    "Mapping 2D textures to 3D volume...",
    "Synthesizing geometry...",
    "Rendering 360° turntable...",
    "Polishing final frames...",
    "Almost there, AI is thinking hard...",
];

#[derive(Clone, Copy, Debug)]
pub struct Narration {
    pub period: Duration,
}

impl Default for Narration {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(4),
        }
    }
}

impl Narration {
    pub fn message_at(&self, elapsed: Duration) -> &'static str {
        let period = self.period.as_millis().max(1);
        message_for_tick(elapsed.as_millis() / period)
    }

    /// Emits a message every period on its own timer until the caller drops the future.
    ///
    /// Runs next to the poll loop in a `select!`, so a slow poll never skips a message.
    pub async fn run(self, mut emit: impl FnMut(Duration, &'static str)) -> Infallible {
        let started = Instant::now();
        let mut ticker = interval(self.period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick: u128 = 0;
        loop {
            ticker.tick().await;
            emit(started.elapsed(), message_for_tick(tick));
            tick += 1;
        }
    }
}

fn message_for_tick(tick: u128) -> &'static str {
    if tick == 0 {
        return FIRST_MESSAGE;
    }
    MESSAGES[((tick - 1) % MESSAGES.len() as u128) as usize]
}

//! One-shot restartable countdown.
//!
//! Used for the door-open duration, the obstruction threshold, the floor-arrival
//! threshold and the reliable transmitters' retry delay.

use tokio::time::{Duration, Instant};

pub struct Timer {
    timer_active: bool,
    timeout_duration: Duration,
    start_time: Instant,
}

impl Timer {
    pub fn new(timeout_duration: Duration) -> Timer {
        Timer {
            timer_active: false,
            timeout_duration,
            start_time: Instant::now(),
        }
    }

    /// (Re)arms the timer. Restarting before expiry pushes the deadline out, it does not add up.
    pub fn start(&mut self) {
        self.timer_active = true;
        self.start_time = Instant::now();
    }

    pub fn stop(&mut self) {
        self.timer_active = false;
    }

    pub fn is_active(&self) -> bool {
        self.timer_active
    }

    pub fn timed_out(&self) -> bool {
        self.timer_active && Instant::now().duration_since(self.start_time) >= self.timeout_duration
    }

    /// Consumes an expiry: returns `true` once per arm, then the timer is disarmed.
    pub fn take_timeout(&mut self) -> bool {
        if self.timed_out() {
            self.timer_active = false;
            return true;
        }
        false
    }

    /// Resolves when the armed timer expires. Never resolves while disarmed.
    ///
    /// Safe to use as a `tokio::select!` branch: it borrows the timer only while polled.
    pub async fn wait(&self) {
        if self.timer_active {
            tokio::time::sleep_until(self.start_time + self.timeout_duration).await;
        } else {
            std::future::pending::<()>().await;
        }
    }
}

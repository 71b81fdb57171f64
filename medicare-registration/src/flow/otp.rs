use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use super::{timer::TimerHandle, Message};

pub const OTP_LENGTH: usize = 6;

/// State of the email verification step: the digits typed so far and the
/// countdown gating the resend action.
#[derive(Debug)]
pub struct OtpSession {
    target_email: String,
    digits: [Option<char>; OTP_LENGTH],
    focus: usize,
    seconds_remaining: u32,
    initial_seconds: u32,
    epoch: u64,
    countdown: Option<TimerHandle>,
}

impl OtpSession {
    pub fn new(target_email: impl Into<String>, initial_seconds: u32) -> Self {
        Self {
            target_email: target_email.into(),
            digits: [None; OTP_LENGTH],
            focus: 0,
            seconds_remaining: initial_seconds,
            initial_seconds,
            epoch: 0,
            countdown: None,
        }
    }

    pub fn target_email(&self) -> &str {
        &self.target_email
    }

    pub fn digits(&self) -> &[Option<char>; OTP_LENGTH] {
        &self.digits
    }

    /// Index of the digit box that has the focus.
    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn is_counting_down(&self) -> bool {
        self.countdown.is_some()
    }

    pub fn resend_allowed(&self) -> bool {
        self.seconds_remaining == 0
    }

    /// The filled digits in order.
    pub fn code(&self) -> String {
        self.digits.iter().flatten().collect()
    }

    /// Starts a new countdown, replacing the running one. Ticks of the
    /// previous countdown are ignored from now on.
    pub fn start_countdown(&mut self, sender: UnboundedSender<Message>) {
        self.epoch += 1;
        let epoch = self.epoch;
        self.countdown = Some(TimerHandle::every(Duration::from_secs(1), sender, move || {
            Message::Tick(epoch)
        }));
    }

    /// Stops the countdown and allows a resend at once.
    pub fn expire(&mut self) {
        self.countdown = None;
        self.seconds_remaining = 0;
    }

    /// Returns false if the tick was not for the live countdown.
    pub fn tick(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining == 0 {
            self.countdown = None;
        }
        true
    }

    /// Accepts an empty value or a single ASCII digit. A digit moves the
    /// focus to the next box.
    pub fn enter_digit(&mut self, index: usize, value: &str) -> bool {
        if index >= OTP_LENGTH {
            return false;
        }
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (None, _) => self.digits[index] = None,
            (Some(c), None) if c.is_ascii_digit() => {
                self.digits[index] = Some(c);
                if index < OTP_LENGTH - 1 {
                    self.focus = index + 1;
                }
            }
            _ => return false,
        }
        true
    }

    /// Clears the box if it is filled, else moves the focus back.
    pub fn backspace(&mut self, index: usize) {
        if index >= OTP_LENGTH {
            return;
        }
        if self.digits[index].is_some() {
            self.digits[index] = None;
        } else if index > 0 {
            self.focus = index - 1;
        }
    }

    /// Back to a fresh code and a full countdown. The countdown itself is
    /// restarted by [`OtpSession::start_countdown`].
    pub fn reset(&mut self) {
        self.digits = [None; OTP_LENGTH];
        self.focus = 0;
        self.seconds_remaining = self.initial_seconds;
    }
}

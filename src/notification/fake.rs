//! In-memory senders for exercising the dispatcher without a network.

use crate::core::{EmailMessage, EmailSender, SlackSender};
use crate::notification::NotificationError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// How a fake sender should respond to the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FakeBehavior {
    #[default]
    Succeed,
    Fail,
    Panic,
}

/// A recorded Slack post.
#[derive(Debug, Clone, PartialEq)]
pub struct SlackPost {
    pub message: String,
    pub channel: Option<String>,
}

/// An `EmailSender` that records every message it is given.
#[derive(Clone, Debug, Default)]
pub struct FakeEmailSender {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    behavior: Arc<Mutex<FakeBehavior>>,
    notify: Arc<Notify>,
}

impl FakeEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: FakeBehavior) -> Self {
        let sender = Self::default();
        sender.set_behavior(behavior);
        sender
    }

    pub fn set_behavior(&self, behavior: FakeBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Messages seen so far, including ones the fake failed.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Resolves once at least `count` messages have been recorded.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.sent.lock().unwrap().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl EmailSender for FakeEmailSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(email.clone());
        self.notify.notify_waiters();
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            FakeBehavior::Succeed => Ok(()),
            FakeBehavior::Fail => Err(NotificationError::Transport("fake SMTP failure".to_string())),
            FakeBehavior::Panic => panic!("fake email sender panicked"),
        }
    }
}

/// A `SlackSender` that records every post it is given.
#[derive(Clone, Debug, Default)]
pub struct FakeSlackSender {
    posts: Arc<Mutex<Vec<SlackPost>>>,
    failing: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl FakeSlackSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let sender = Self::default();
        sender.set_failing(true);
        sender
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn posts(&self) -> Vec<SlackPost> {
        self.posts.lock().unwrap().clone()
    }

    /// Resolves once at least `count` posts have been recorded.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.posts.lock().unwrap().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl SlackSender for FakeSlackSender {
    async fn send_slack(&self, message: &str, channel: Option<&str>) -> Result<(), NotificationError> {
        self.posts.lock().unwrap().push(SlackPost {
            message: message.to_string(),
            channel: channel.map(str::to_string),
        });
        self.notify.notify_waiters();
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Transport("fake Slack failure".to_string()));
        }
        Ok(())
    }
}

use std::sync::mpsc::{self, Receiver, Sender};

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::progress::TaskId;

const CHALLENGE_DESTINATIONS: [(u32, &str); 6] = [
    (1, "/mini4"),
    (2, "/unlock"),
    (3, "/square"),
    (4, "/cam"),
    (5, "/shoot"),
    (6, "/flappy-bird"),
];

pub(crate) fn challenge_destination(task_number: u32) -> Option<&'static str> {
    CHALLENGE_DESTINATIONS
        .iter()
        .find(|(number, _)| *number == task_number)
        .map(|(_, destination)| *destination)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum LaunchError {
    #[error("challenge for {active} is already active")]
    AlreadyActive { active: TaskId },
    #[error("task {task_number} has no challenge destination")]
    UnknownTask { task_number: u32 },
}

pub(crate) trait ChallengeHost {
    fn open(&mut self, task: TaskId, destination: &str);
    fn close(&mut self);
}

#[derive(Debug, Default)]
pub(crate) struct LoggingChallengeHost;

impl ChallengeHost for LoggingChallengeHost {
    fn open(&mut self, task: TaskId, destination: &str) {
        info!(task = %task, destination, "challenge_surface_opened");
    }

    fn close(&mut self) {
        info!("challenge_surface_closed");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChallengeStatus {
    Completed,
    Failed,
    /// Anything unrecognized, including a payload that is not an object.
    Abandoned,
    BeginPlay,
    IntroCompleted,
    ShowTrailer,
    SpinReward,
}

impl ChallengeStatus {
    fn parse(raw: &str) -> Self {
        match raw {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "bcomic" => Self::BeginPlay,
            "ridacompleted" => Self::IntroCompleted,
            "btrailer" => Self::ShowTrailer,
            "bspin" => Self::SpinReward,
            _ => Self::Abandoned,
        }
    }

    pub(crate) fn is_challenge_outcome(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Abandoned)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChallengeMessage {
    pub(crate) status: ChallengeStatus,
    pub(crate) score: Option<String>,
}

impl ChallengeMessage {
    pub(crate) fn from_value(value: &Value) -> Self {
        let Value::Object(fields) = value else {
            return Self {
                status: ChallengeStatus::Abandoned,
                score: None,
            };
        };
        let status = fields
            .get("challengeStatus")
            .and_then(Value::as_str)
            .map(ChallengeStatus::parse)
            .unwrap_or(ChallengeStatus::Abandoned);
        let score = match fields.get("score") {
            Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        };
        Self { status, score }
    }

    pub(crate) fn reward_amount(&self) -> Option<u64> {
        let digits: String = self
            .score
            .as_deref()?
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        if digits.is_empty() {
            return None;
        }
        Some(digits.parse::<u64>().unwrap_or(u64::MAX))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ChallengeResultSender {
    sender: Sender<Value>,
}

impl ChallengeResultSender {
    pub(crate) fn send(&self, payload: Value) -> bool {
        self.sender.send(payload).is_ok()
    }
}

#[derive(Debug)]
pub(crate) struct ChallengeResultReceiver {
    receiver: Receiver<Value>,
}

impl ChallengeResultReceiver {
    pub(crate) fn drain(&self) -> Vec<ChallengeMessage> {
        self.receiver
            .try_iter()
            .map(|payload| ChallengeMessage::from_value(&payload))
            .collect()
    }
}

pub(crate) fn challenge_channel() -> (ChallengeResultSender, ChallengeResultReceiver) {
    let (sender, receiver) = mpsc::channel();
    (
        ChallengeResultSender { sender },
        ChallengeResultReceiver { receiver },
    )
}

pub(crate) struct ChallengeBridge {
    host: Box<dyn ChallengeHost>,
    results: ChallengeResultReceiver,
    pending: Option<TaskId>,
}

impl ChallengeBridge {
    pub(crate) fn new(host: Box<dyn ChallengeHost>, results: ChallengeResultReceiver) -> Self {
        Self {
            host,
            results,
            pending: None,
        }
    }

    pub(crate) fn pending(&self) -> Option<TaskId> {
        self.pending
    }

    pub(crate) fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn launch(&mut self, task_number: u32) -> Result<TaskId, LaunchError> {
        if let Some(active) = self.pending {
            warn!(active = %active, requested = task_number, "challenge_launch_rejected");
            return Err(LaunchError::AlreadyActive { active });
        }
        let (Some(task), Some(destination)) = (
            TaskId::new(task_number),
            challenge_destination(task_number),
        ) else {
            warn!(task_number, "challenge_destination_missing");
            return Err(LaunchError::UnknownTask { task_number });
        };
        self.pending = Some(task);
        self.host.open(task, destination);
        info!(task = %task, destination, "challenge_launched");
        Ok(task)
    }

    pub(crate) fn settle(&mut self) -> Option<TaskId> {
        self.host.close();
        self.pending.take()
    }

    pub(crate) fn drain_results(&self) -> Vec<ChallengeMessage> {
        self.results.drain()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum HostCall {
        Open(u8, String),
        Close,
    }

    #[derive(Default)]
    struct RecordingHost {
        calls: Rc<RefCell<Vec<HostCall>>>,
    }

    impl ChallengeHost for RecordingHost {
        fn open(&mut self, task: TaskId, destination: &str) {
            self.calls
                .borrow_mut()
                .push(HostCall::Open(task.number(), destination.to_string()));
        }

        fn close(&mut self) {
            self.calls.borrow_mut().push(HostCall::Close);
        }
    }

    fn bridge() -> (ChallengeBridge, ChallengeResultSender, Rc<RefCell<Vec<HostCall>>>) {
        let host = RecordingHost::default();
        let calls = Rc::clone(&host.calls);
        let (sender, receiver) = challenge_channel();
        (ChallengeBridge::new(Box::new(host), receiver), sender, calls)
    }

    #[test]
    fn destinations_cover_all_six_tasks() {
        assert_eq!(challenge_destination(1), Some("/mini4"));
        assert_eq!(challenge_destination(6), Some("/flappy-bird"));
        assert_eq!(challenge_destination(7), None);
    }

    #[test]
    fn launch_records_pending_and_rejects_second_launch() {
        let (mut bridge, _sender, calls) = bridge();
        let task = bridge.launch(4).expect("launch");
        assert_eq!(bridge.pending(), Some(task));
        assert_eq!(
            bridge.launch(5),
            Err(LaunchError::AlreadyActive { active: task })
        );
        assert_eq!(
            calls.borrow().as_slice(),
            &[HostCall::Open(4, "/cam".to_string())]
        );

        assert_eq!(bridge.settle(), Some(task));
        assert!(!bridge.is_active());
        assert_eq!(calls.borrow().last(), Some(&HostCall::Close));
    }

    #[test]
    fn unknown_task_is_a_configuration_error() {
        let (mut bridge, _sender, calls) = bridge();
        assert_eq!(
            bridge.launch(9),
            Err(LaunchError::UnknownTask { task_number: 9 })
        );
        assert!(!bridge.is_active());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn results_are_parsed_in_arrival_order() {
        let (bridge, sender, _calls) = bridge();
        assert!(sender.send(json!({ "challengeStatus": "completed", "extra": 1 })));
        assert!(sender.send(json!({ "challengeStatus": "bspin", "score": "₹ 250" })));
        assert!(sender.send(json!("not an object")));
        assert!(sender.send(json!({ "challengeStatus": "mystery" })));

        let statuses: Vec<ChallengeStatus> = bridge
            .drain_results()
            .into_iter()
            .map(|message| message.status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                ChallengeStatus::Completed,
                ChallengeStatus::SpinReward,
                ChallengeStatus::Abandoned,
                ChallengeStatus::Abandoned,
            ]
        );
        assert!(bridge.drain_results().is_empty());
    }

    #[test]
    fn reward_amount_extracts_digits() {
        let reward = |payload: Value| ChallengeMessage::from_value(&payload).reward_amount();

        assert_eq!(
            reward(json!({ "challengeStatus": "bspin", "score": "Rs 1,500" })),
            Some(1500)
        );
        assert_eq!(
            reward(json!({ "challengeStatus": "bspin", "score": 75 })),
            Some(75)
        );
        assert_eq!(
            reward(json!({ "challengeStatus": "bspin", "score": "" })),
            None
        );
        assert_eq!(reward(json!({ "challengeStatus": "bspin" })), None);
    }
}

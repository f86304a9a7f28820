//! 会话驱动 - 把状态机、倒计时和输入流接在一起
//!
//! 每次 `next_update()` 只等待一个事件（tick 或一条命令），交给
//! `QuizSession::apply`，再根据结果重新安排倒计时。

use futures::{Stream, StreamExt};
use tracing::{debug, info};

use crate::workflow::countdown::Countdown;
use crate::workflow::quiz_session::{QuizSession, SessionEvent, Transition};

/// 用户命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Select(usize),
    Confirm,
    TogglePause,
    Quit,
}

impl SessionCommand {
    /// 转换为状态机事件；`Quit` 不进入状态机
    fn into_event(self) -> Option<SessionEvent> {
        match self {
            SessionCommand::Select(option) => Some(SessionEvent::Select(option)),
            SessionCommand::Confirm => Some(SessionEvent::Confirm),
            SessionCommand::TogglePause => Some(SessionEvent::TogglePause),
            SessionCommand::Quit => None,
        }
    }
}

/// 驱动一次等待的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverUpdate {
    Transition(Transition),
    /// 用户退出或输入已关闭，倒计时已取消
    Aborted,
}

/// 会话驱动
///
/// `commands` 必须是可取消的（cancel-safe）流。
pub struct SessionDriver<S> {
    session: QuizSession,
    countdown: Countdown,
    commands: S,
}

impl<S> SessionDriver<S>
where
    S: Stream<Item = SessionCommand> + Unpin,
{
    /// 创建驱动并开始第一题的倒计时
    pub fn new(session: QuizSession, commands: S) -> Self {
        let mut countdown = Countdown::new();
        if !session.is_finished() && !session.is_paused() {
            countdown.arm();
        }
        Self {
            session,
            countdown,
            commands,
        }
    }

    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    pub fn into_session(self) -> QuizSession {
        self.session
    }

    /// 等待下一个事件并返回处理结果
    pub async fn next_update(&mut self) -> DriverUpdate {
        let event = tokio::select! {
            _ = self.countdown.tick() => SessionEvent::Tick,
            command = self.commands.next() => {
                match command.and_then(SessionCommand::into_event) {
                    Some(event) => event,
                    None => {
                        self.countdown.cancel();
                        info!("⏹ 答题被中止");
                        return DriverUpdate::Aborted;
                    }
                }
            }
        };

        let transition = self.session.apply(event);
        self.reschedule(&transition);
        DriverUpdate::Transition(transition)
    }

    fn reschedule(&mut self, transition: &Transition) {
        match transition {
            Transition::Advanced { .. } | Transition::Resumed => {
                debug!("重新开始倒计时");
                self.countdown.arm();
            }
            Transition::Finished { .. } | Transition::Paused => {
                debug!("停止倒计时");
                self.countdown.cancel();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::stream;

    use super::*;
    use crate::models::Question;
    use crate::workflow::quiz_session::SessionState;

    fn question(id: u32, time_limit_seconds: u32) -> Question {
        Question {
            id,
            text: format!("Question {id}?"),
            options: vec!["yes".into(), "no".into()],
            correct_answer_index: 0,
            time_limit_seconds,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn one_second_question_finishes_after_one_tick() {
        let session = QuizSession::start(vec![question(1, 1)]).unwrap();
        let mut driver = SessionDriver::new(session, stream::pending::<SessionCommand>());

        let start = tokio::time::Instant::now();
        match driver.next_update().await {
            DriverUpdate::Transition(Transition::Finished { result, .. }) => {
                assert_eq!(result.score, 0);
                assert_eq!(result.total, 1);
            }
            other => panic!("unexpected update: {other:?}"),
        }
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert!(!driver.countdown.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_count_down_then_advance() {
        let session = QuizSession::start(vec![question(1, 2), question(2, 5)]).unwrap();
        let mut driver = SessionDriver::new(session, stream::pending::<SessionCommand>());

        assert_eq!(
            driver.next_update().await,
            DriverUpdate::Transition(Transition::Ticked { time_remaining: 1 })
        );
        assert!(matches!(
            driver.next_update().await,
            DriverUpdate::Transition(Transition::Advanced { next_index: 1, .. })
        ));
        assert_eq!(
            driver.session().state(),
            &SessionState::Active {
                index: 1,
                time_remaining: 5,
                selected_option: None
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn commands_are_applied_before_the_timer() {
        let commands = stream::iter(vec![SessionCommand::Select(0), SessionCommand::Confirm]);
        let session = QuizSession::start(vec![question(1, 30)]).unwrap();
        let commands = commands.chain(stream::pending::<SessionCommand>());
        let mut driver = SessionDriver::new(session, commands);

        assert!(matches!(
            driver.next_update().await,
            DriverUpdate::Transition(Transition::Selected { option: 0, .. })
        ));
        match driver.next_update().await {
            DriverUpdate::Transition(Transition::Finished { result, .. }) => {
                assert_eq!(result.score, 1)
            }
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_scheduling_ticks() {
        let commands = stream::iter(vec![SessionCommand::TogglePause]);
        let session = QuizSession::start(vec![question(1, 3)]).unwrap();
        let commands = commands.chain(stream::pending::<SessionCommand>());
        let mut driver = SessionDriver::new(session, commands);

        assert_eq!(
            driver.next_update().await,
            DriverUpdate::Transition(Transition::Paused)
        );

        let waited =
            tokio::time::timeout(Duration::from_secs(10), driver.next_update()).await;
        assert!(waited.is_err());
        assert_eq!(
            driver.session().state(),
            &SessionState::Active {
                index: 0,
                time_remaining: 3,
                selected_option: None
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn quit_and_closed_input_abort() {
        let session = QuizSession::start(vec![question(1, 30)]).unwrap();
        let mut driver = SessionDriver::new(session, stream::iter(vec![SessionCommand::Quit]));
        assert_eq!(driver.next_update().await, DriverUpdate::Aborted);
        assert!(!driver.countdown.is_armed());

        let session = QuizSession::start(vec![question(1, 30)]).unwrap();
        let mut driver = SessionDriver::new(session, stream::empty::<SessionCommand>());
        assert_eq!(driver.next_update().await, DriverUpdate::Aborted);
        assert!(driver.into_session().result().is_none());
    }
}

//! 答题会话状态机 - 流程层
//!
//! 核心职责：一次只出一道题，记录作答，在最后一题之后计算成绩。
//!
//! 状态机：
//! ```text
//! Active(0) ──advance──▶ Active(1) ──advance──▶ ... ──advance──▶ Finished
//! ```
//!
//! - 手动确认（必须已选中选项）和倒计时归零走同一条 `advance` 路径
//! - 选择选项只更新选中项，不会前进
//! - 暂停期间忽略 tick、选择和确认
//! - Finished 是终态，之后的任何事件都被拒绝且没有副作用
//!
//! 本模块不持有定时器，tick 由 `SessionDriver` 调度。

use tracing::{debug, info};

use crate::error::SessionError;
use crate::models::{AnswerRecord, Question, SessionResult};

/// 会话状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// 正在回答第 `index` 道题
    Active {
        index: usize,
        time_remaining: u32,
        selected_option: Option<usize>,
    },
    /// 已答完，成绩只在进入该状态时计算一次
    Finished { result: SessionResult },
}

/// 输入事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// 选中某个选项（0 起）
    Select(usize),
    /// 确认当前选项并进入下一题
    Confirm,
    /// 过去了一秒
    Tick,
    /// 暂停 / 继续
    TogglePause,
}

/// 事件被拒绝的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// 选项下标越界
    OptionOutOfRange { option: usize, options: usize },
    /// 未选择就确认
    NoSelection,
    /// 暂停中
    Paused,
    /// 会话已结束
    AlreadyFinished,
}

/// 一次事件的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// 选中项已更新
    Selected { index: usize, option: usize },
    /// 倒计时减一
    Ticked { time_remaining: u32 },
    /// 上一题已记录，进入 `next_index`
    Advanced {
        record: AnswerRecord,
        next_index: usize,
    },
    /// 最后一题已记录，会话结束
    Finished {
        record: AnswerRecord,
        result: SessionResult,
    },
    Paused,
    Resumed,
    /// 事件被拒绝，状态没有任何变化
    Rejected(Rejection),
}

impl Transition {
    /// 是否进入了新的题目或结束（倒计时需要重新安排）
    pub fn changes_question(&self) -> bool {
        matches!(self, Transition::Advanced { .. } | Transition::Finished { .. })
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::OptionOutOfRange { options, .. } => {
                write!(f, "没有这个选项，请在 {} 个选项中选择", options)
            }
            Rejection::NoSelection => write!(f, "请先选择一个选项再确认"),
            Rejection::Paused => write!(f, "已暂停，输入 p 继续"),
            Rejection::AlreadyFinished => write!(f, "本次答题已经结束"),
        }
    }
}

/// 答题会话
#[derive(Debug)]
pub struct QuizSession {
    questions: Vec<Question>,
    answers: Vec<AnswerRecord>,
    state: SessionState,
    paused: bool,
}

impl QuizSession {
    /// 开始会话，进入第一题
    ///
    /// # 返回
    /// 题目列表为空时返回 `SessionError::EmptyQuestionList`
    pub fn start(questions: Vec<Question>) -> Result<Self, SessionError> {
        let first = questions.first().ok_or(SessionError::EmptyQuestionList)?;
        let state = SessionState::Active {
            index: 0,
            time_remaining: first.time_limit_seconds,
            selected_option: None,
        };

        info!("📝 开始答题，共 {} 道题", questions.len());

        Ok(Self {
            answers: Vec::with_capacity(questions.len()),
            questions,
            state,
            paused: false,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    /// 当前题目，结束后返回 `None`
    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            SessionState::Active { index, .. } => self.questions.get(index),
            SessionState::Finished { .. } => None,
        }
    }

    /// 已记录的作答
    pub fn answers(&self) -> &[AnswerRecord] {
        match &self.state {
            SessionState::Active { .. } => &self.answers,
            SessionState::Finished { result } => &result.answers,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Finished { .. })
    }

    pub fn result(&self) -> Option<&SessionResult> {
        match &self.state {
            SessionState::Finished { result } => Some(result),
            SessionState::Active { .. } => None,
        }
    }

    pub fn into_result(self) -> Option<SessionResult> {
        match self.state {
            SessionState::Finished { result } => Some(result),
            SessionState::Active { .. } => None,
        }
    }

    /// 唯一的状态转换入口
    pub fn apply(&mut self, event: SessionEvent) -> Transition {
        let (index, time_remaining, selected) = match self.state {
            SessionState::Active {
                index,
                time_remaining,
                selected_option,
            } => (index, time_remaining, selected_option),
            SessionState::Finished { .. } => {
                return Transition::Rejected(Rejection::AlreadyFinished)
            }
        };

        match event {
            SessionEvent::TogglePause => {
                self.paused = !self.paused;
                debug!("暂停状态切换为 {}", self.paused);
                if self.paused {
                    Transition::Paused
                } else {
                    Transition::Resumed
                }
            }
            _ if self.paused => Transition::Rejected(Rejection::Paused),
            SessionEvent::Select(option) => {
                let options = self.questions[index].options.len();
                if option >= options {
                    return Transition::Rejected(Rejection::OptionOutOfRange { option, options });
                }
                self.state = SessionState::Active {
                    index,
                    time_remaining,
                    selected_option: Some(option),
                };
                Transition::Selected { index, option }
            }
            SessionEvent::Confirm => match selected {
                Some(_) => self.advance(index, selected),
                None => Transition::Rejected(Rejection::NoSelection),
            },
            SessionEvent::Tick => {
                let remaining = time_remaining.saturating_sub(1);
                if remaining == 0 {
                    debug!("第 {} 题超时", index + 1);
                    return self.advance(index, selected);
                }
                self.state = SessionState::Active {
                    index,
                    time_remaining: remaining,
                    selected_option: selected,
                };
                Transition::Ticked {
                    time_remaining: remaining,
                }
            }
        }
    }

    /// 记录当前题并前进；确认和超时都走这里
    fn advance(&mut self, index: usize, selected: Option<usize>) -> Transition {
        let record = AnswerRecord::grade(&self.questions[index], selected);
        self.answers.push(record.clone());

        let next_index = index + 1;
        if let Some(next) = self.questions.get(next_index) {
            self.state = SessionState::Active {
                index: next_index,
                time_remaining: next.time_limit_seconds,
                selected_option: None,
            };
            return Transition::Advanced { record, next_index };
        }

        let result = SessionResult::from_answers(std::mem::take(&mut self.answers));
        info!("🏁 答题结束，得分 {}/{}", result.score, result.total);
        self.paused = false;
        self.state = SessionState::Finished {
            result: result.clone(),
        };
        Transition::Finished { record, result }
    }
}

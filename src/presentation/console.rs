//! 终端输入输出
//!
//! 输入和输出分开持有：答题时输入被借给 `SessionDriver` 作为命令流，
//! 输出仍可用来渲染每次状态变化。

use std::io;

use futures::stream::{self, Stream};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::{debug, warn};

use crate::models::{Question, SessionResult};
use crate::presentation::result_view::ResultReport;
use crate::workflow::{
    DriverUpdate, QuizSession, SessionCommand, SessionDriver, SessionState, Transition,
};

pub const QUIZ_HELP: &str = "输入字母或数字选择，回车确认，p 暂停/继续，q 退出";

/// 解析答题时的一行输入
///
/// - 空行或 `n`：确认
/// - `p`：暂停 / 继续
/// - `q`：退出
/// - `a`..`z` 或 `1`..：选择（越界由状态机拒绝）
pub fn parse_command(line: &str) -> Option<SessionCommand> {
    let input = line.trim().to_lowercase();
    match input.as_str() {
        "" | "n" => return Some(SessionCommand::Confirm),
        "p" => return Some(SessionCommand::TogglePause),
        "q" => return Some(SessionCommand::Quit),
        _ => {}
    }

    let mut chars = input.chars();
    if let (Some(c @ 'a'..='z'), None) = (chars.next(), chars.next()) {
        return Some(SessionCommand::Select(c as usize - 'a' as usize));
    }

    match input.parse::<usize>() {
        Ok(number) if number >= 1 => Some(SessionCommand::Select(number - 1)),
        _ => None,
    }
}

/// 按行读取的终端输入
pub struct ConsoleInput<R> {
    lines: Lines<R>,
}

impl<R> ConsoleInput<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// 读取一行并去掉首尾空白，输入结束时返回 `None`
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }

    /// 答题命令流，跳过无法识别的行；输入结束或出错时流结束
    pub fn commands(&mut self) -> impl Stream<Item = SessionCommand> + Unpin + '_ {
        Box::pin(stream::unfold(&mut self.lines, |lines| async move {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match parse_command(&line) {
                        Some(command) => return Some((command, lines)),
                        None => debug!("忽略无法识别的输入: {:?}", line),
                    },
                    Ok(None) => return None,
                    Err(e) => {
                        warn!("读取输入失败: {}", e);
                        return None;
                    }
                }
            }
        }))
    }
}

/// 终端输出
pub struct ConsoleOutput<W> {
    writer: W,
}

impl<W> ConsoleOutput<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// 输出一行
    pub async fn line(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        self.writer.write_all(text.as_ref().as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// 输出提示，不换行
    pub async fn prompt(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        self.writer.write_all(text.as_ref().as_bytes()).await?;
        self.writer.flush().await
    }

    /// 显示当前题目
    pub async fn show_question(&mut self, session: &QuizSession) -> io::Result<()> {
        let Some(question) = session.current_question() else {
            return Ok(());
        };
        let position = session.answers().len() + 1;

        self.line("─".repeat(60)).await?;
        self.line(format!(
            "第 {}/{} 题    ⏱ {} 秒",
            position,
            session.total(),
            remaining_secs(session)
        ))
        .await?;
        self.line(render_question(question)).await?;
        self.line(QUIZ_HELP).await
    }

    /// 显示一次状态变化
    pub async fn show_transition(
        &mut self,
        session: &QuizSession,
        transition: &Transition,
    ) -> io::Result<()> {
        match transition {
            Transition::Selected { option, .. } => {
                self.line(format!(
                    "已选择 {}，回车确认",
                    Question::option_label(*option)
                ))
                .await
            }
            Transition::Ticked { time_remaining } => {
                if *time_remaining % 10 == 0 || *time_remaining <= 5 {
                    self.line(format!("⏱ 剩余 {} 秒", time_remaining)).await?;
                }
                Ok(())
            }
            Transition::Advanced { record, .. } => {
                if record.timed_out() {
                    self.line("⏰ 时间到").await?;
                }
                self.show_question(session).await
            }
            Transition::Finished { record, .. } => {
                if record.timed_out() {
                    self.line("⏰ 时间到").await?;
                }
                self.line("🏁 答题结束").await
            }
            Transition::Paused => self.line("⏸ 已暂停，输入 p 继续").await,
            Transition::Resumed => {
                self.line("▶ 继续答题").await?;
                self.show_question(session).await
            }
            Transition::Rejected(rejection) => self.line(rejection.to_string()).await,
        }
    }

    pub async fn show_report(&mut self, report: &ResultReport) -> io::Result<()> {
        self.line(report.to_string()).await
    }
}

fn remaining_secs(session: &QuizSession) -> u32 {
    match session.state() {
        SessionState::Active { time_remaining, .. } => *time_remaining,
        SessionState::Finished { .. } => 0,
    }
}

/// 题干和带字母标签的选项
pub fn render_question(question: &Question) -> String {
    let mut text = question.text.clone();
    for (index, option) in question.options.iter().enumerate() {
        text.push_str(&format!("\n  {}. {}", Question::option_label(index), option));
    }
    text
}

/// 一次答题的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizOutcome {
    Completed(SessionResult),
    Aborted,
}

/// 在终端上跑完一次答题
pub async fn run_quiz<R, W>(
    input: &mut ConsoleInput<R>,
    output: &mut ConsoleOutput<W>,
    session: QuizSession,
) -> io::Result<QuizOutcome>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.show_question(&session).await?;

    let mut driver = SessionDriver::new(session, input.commands());
    loop {
        match driver.next_update().await {
            DriverUpdate::Aborted => {
                output.line("已退出本次答题").await?;
                return Ok(QuizOutcome::Aborted);
            }
            DriverUpdate::Transition(transition) => {
                output.show_transition(driver.session(), &transition).await?;
                if let Transition::Finished { result, .. } = transition {
                    return Ok(QuizOutcome::Completed(result));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::BufReader;
    use tokio_test::io::Builder;

    use super::*;

    fn questions() -> Vec<Question> {
        vec![
            Question {
                id: 1,
                text: "2 + 2 = ?".into(),
                options: vec!["3".into(), "4".into()],
                correct_answer_index: 1,
                time_limit_seconds: 30,
            },
            Question {
                id: 2,
                text: "Capital of France?".into(),
                options: vec!["Paris".into(), "Rome".into(), "Oslo".into()],
                correct_answer_index: 0,
                time_limit_seconds: 30,
            },
        ]
    }

    type MockConsole = (
        ConsoleInput<BufReader<tokio_test::io::Mock>>,
        ConsoleOutput<Vec<u8>>,
    );

    fn console(input: &[u8]) -> MockConsole {
        let mock = Builder::new().read(input).build();
        (
            ConsoleInput::new(BufReader::new(mock)),
            ConsoleOutput::new(Vec::new()),
        )
    }

    #[test]
    fn parses_quiz_commands() {
        assert_eq!(parse_command(""), Some(SessionCommand::Confirm));
        assert_eq!(parse_command("  n "), Some(SessionCommand::Confirm));
        assert_eq!(parse_command("P"), Some(SessionCommand::TogglePause));
        assert_eq!(parse_command("q"), Some(SessionCommand::Quit));
        assert_eq!(parse_command("a"), Some(SessionCommand::Select(0)));
        assert_eq!(parse_command("D"), Some(SessionCommand::Select(3)));
        assert_eq!(parse_command("1"), Some(SessionCommand::Select(0)));
        assert_eq!(parse_command("12"), Some(SessionCommand::Select(11)));
        assert_eq!(parse_command("0"), None);
        assert_eq!(parse_command("abc"), None);
        assert_eq!(parse_command("?"), None);
    }

    #[test]
    fn renders_labelled_options() {
        let text = render_question(&questions()[1]);
        assert_eq!(text, "Capital of France?\n  A. Paris\n  B. Rome\n  C. Oslo");
    }

    #[tokio::test]
    async fn runs_a_quiz_from_console_input() {
        let (mut input, mut output) = console(b"b\n\n?\n1\n\n");
        let session = QuizSession::start(questions()).unwrap();

        let outcome = run_quiz(&mut input, &mut output, session).await.unwrap();
        match outcome {
            QuizOutcome::Completed(result) => {
                assert_eq!(result.score, 2);
                assert_eq!(result.total, 2);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let text = String::from_utf8(output.into_inner()).unwrap();
        assert!(text.contains("第 1/2 题"));
        assert!(text.contains("第 2/2 题"));
        assert!(text.contains("已选择 B"));
        assert!(text.contains("🏁 答题结束"));
    }

    #[tokio::test]
    async fn rejected_input_is_reported() {
        let (mut input, mut output) = console(b"\nz\nq\n");
        let session = QuizSession::start(questions()).unwrap();

        let outcome = run_quiz(&mut input, &mut output, session).await.unwrap();
        assert_eq!(outcome, QuizOutcome::Aborted);

        let text = String::from_utf8(output.into_inner()).unwrap();
        assert!(text.contains("请先选择一个选项再确认"));
        assert!(text.contains("没有这个选项"));
        assert!(text.contains("已退出本次答题"));
    }

    #[tokio::test]
    async fn closed_input_aborts_the_quiz() {
        let (mut input, mut output) = console(b"a\n");
        let session = QuizSession::start(questions()).unwrap();

        let outcome = run_quiz(&mut input, &mut output, session).await.unwrap();
        assert_eq!(outcome, QuizOutcome::Aborted);
    }

    #[tokio::test]
    async fn read_line_trims_and_reports_eof() {
        let (mut input, _) = console(b"  sk-or-key  \n");
        assert_eq!(input.read_line().await.unwrap().as_deref(), Some("sk-or-key"));
        assert_eq!(input.read_line().await.unwrap(), None);
    }
}

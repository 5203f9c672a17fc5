use exam_core::model::{Difficulty, ExamMode, ExamSession, Question, QuestionBank};
use exam_core::scoring::is_correct;

use crate::error::SessionError;

/// A user interaction with the in-flight quiz.
///
/// Options are addressed by their place in the displayed (possibly shuffled) list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Pick the single answer, replacing any previous one.
    Select(usize),
    /// Add or remove an option from a multi-select answer.
    Toggle(usize),
    /// `Toggle` for multi-select questions, `Select` otherwise.
    Choose(usize),
    CheckAnswer,
    ToggleFlag,
    RevealHint,
    GoTo(usize),
    Next,
    Previous,
}

/// Per-option marking shown once a practice question is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionFeedback {
    Correct,
    WronglySelected,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionView {
    /// Index in the displayed list.
    pub index: usize,
    pub text: String,
    pub selected: bool,
    pub feedback: Option<OptionFeedback>,
}

/// Everything needed to render the question at the current position.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionView {
    pub position: usize,
    pub total: usize,
    pub bank_index: usize,
    pub prompt: String,
    pub options: Vec<OptionView>,
    pub multi_select: bool,
    pub flagged: bool,
    pub has_hint: bool,
    /// Hint text, once revealed.
    pub hint: Option<String>,
    pub section: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub locked: bool,
    /// Practice mode only, after locking.
    pub is_correct: Option<bool>,
    /// Practice mode only, after locking.
    pub explanation: Option<String>,
}

/// The in-flight session bound to the bank it runs over.
///
/// Positions are places in the session's own order; everything stored in
/// the session is keyed by bank index.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveExam {
    bank: QuestionBank,
    session: ExamSession,
}

impl ActiveExam {
    /// Bind a session to its bank. Callers check [`ExamSession::fits`] first.
    #[must_use]
    pub fn new(bank: QuestionBank, session: ExamSession) -> Self {
        Self { bank, session }
    }

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    #[must_use]
    pub fn session(&self) -> &ExamSession {
        &self.session
    }

    #[must_use]
    pub fn into_parts(self) -> (QuestionBank, ExamSession) {
        (self.bank, self.session)
    }

    #[must_use]
    pub fn mode(&self) -> ExamMode {
        self.session.mode
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.session.position
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bank.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bank.is_empty()
    }

    /// Bank index of the question shown at `position`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` past the last question.
    pub fn bank_index_at(&self, position: usize) -> Result<usize, SessionError> {
        self.session
            .bank_index(position)
            .filter(|idx| *idx < self.bank.len())
            .ok_or(SessionError::OutOfRange { position })
    }

    fn current(&self) -> Result<(usize, &Question), SessionError> {
        let position = self.session.position;
        let idx = self.bank_index_at(position)?;
        let question = self
            .bank
            .question(idx)
            .ok_or(SessionError::OutOfRange { position })?;
        Ok((idx, question))
    }

    /// Option texts of a bank question in display order.
    fn displayed_options<'a>(&'a self, bank_index: usize, question: &'a Question) -> Vec<&'a str> {
        let options = question.options();
        match self.session.option_orders.get(&bank_index) {
            Some(order) => order
                .iter()
                .filter_map(|&i| options.get(i).map(String::as_str))
                .collect(),
            None => options.iter().map(String::as_str).collect(),
        }
    }

    fn option_text(&self, bank_index: usize, question: &Question, option: usize) -> Result<String, SessionError> {
        self.displayed_options(bank_index, question)
            .get(option)
            .map(|text| (*text).to_owned())
            .ok_or(SessionError::OptionOutOfRange { option })
    }

    /// True once a practice question has been checked and no longer accepts edits.
    #[must_use]
    pub fn is_locked(&self, bank_index: usize) -> bool {
        self.session.mode == ExamMode::Practice && self.session.checked.contains(&bank_index)
    }

    fn ensure_unlocked(&self, bank_index: usize) -> Result<(), SessionError> {
        if self.is_locked(bank_index) {
            return Err(SessionError::QuestionLocked {
                position: self.session.position,
            });
        }
        Ok(())
    }

    /// Replace the selection with a single option.
    ///
    /// In practice mode a single-select question locks right away.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuestionLocked` for a locked question and
    /// `SessionError::OptionOutOfRange` for an unknown option.
    pub fn select_option(&mut self, option: usize) -> Result<(), SessionError> {
        let (idx, question) = self.current()?;
        self.ensure_unlocked(idx)?;
        let text = self.option_text(idx, question, option)?;
        let locks = self.session.mode == ExamMode::Practice && !question.is_multi_select();

        self.session.answers.insert(idx, vec![text]);
        if locks {
            self.session.checked.insert(idx);
        }
        Ok(())
    }

    /// Add the option to the selection, or remove it if already selected.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuestionLocked` for a locked question and
    /// `SessionError::OptionOutOfRange` for an unknown option.
    pub fn toggle_option(&mut self, option: usize) -> Result<(), SessionError> {
        let (idx, question) = self.current()?;
        self.ensure_unlocked(idx)?;
        let text = self.option_text(idx, question, option)?;

        let selected = self.session.answers.entry(idx).or_default();
        if let Some(pos) = selected.iter().position(|s| *s == text) {
            selected.remove(pos);
        } else {
            selected.push(text);
        }
        if selected.is_empty() {
            self.session.answers.remove(&idx);
        }
        Ok(())
    }

    /// Lock the current practice question and reveal its feedback.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotPractice` in exam mode and
    /// `SessionError::NothingSelected` when no option is selected.
    pub fn check_answer(&mut self) -> Result<(), SessionError> {
        if self.session.mode != ExamMode::Practice {
            return Err(SessionError::NotPractice);
        }
        let (idx, _) = self.current()?;
        if self.session.selected(idx).is_empty() {
            return Err(SessionError::NothingSelected);
        }
        self.session.checked.insert(idx);
        Ok(())
    }

    /// Flag or unflag the current question. Returns the new flag state.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` if the position is invalid.
    pub fn toggle_flag(&mut self) -> Result<bool, SessionError> {
        let (idx, _) = self.current()?;
        if self.session.flagged.remove(&idx) {
            Ok(false)
        } else {
            self.session.flagged.insert(idx);
            Ok(true)
        }
    }

    /// Reveal the hint of the current question. Revealed hints are recorded on the attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoHint` if the question has none.
    pub fn reveal_hint(&mut self) -> Result<(), SessionError> {
        let (idx, question) = self.current()?;
        if question.hint().is_none() {
            return Err(SessionError::NoHint {
                position: self.session.position,
            });
        }
        self.session.hints_used.insert(idx);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` past the last question.
    pub fn go_to(&mut self, position: usize) -> Result<(), SessionError> {
        if position >= self.bank.len() {
            return Err(SessionError::OutOfRange { position });
        }
        self.session.position = position;
        Ok(())
    }

    /// Move forward. Returns false at the last question.
    pub fn next(&mut self) -> bool {
        if self.session.position + 1 < self.bank.len() {
            self.session.position += 1;
            true
        } else {
            false
        }
    }

    /// Move back. Returns false at the first question.
    pub fn previous(&mut self) -> bool {
        if self.session.position > 0 {
            self.session.position -= 1;
            true
        } else {
            false
        }
    }

    /// Apply one user interaction.
    ///
    /// # Errors
    ///
    /// Returns the `SessionError` of the underlying operation.
    pub fn apply(&mut self, action: SessionAction) -> Result<(), SessionError> {
        match action {
            SessionAction::Select(option) => self.select_option(option),
            SessionAction::Toggle(option) => self.toggle_option(option),
            SessionAction::Choose(option) => {
                let (_, question) = self.current()?;
                if question.is_multi_select() {
                    self.toggle_option(option)
                } else {
                    self.select_option(option)
                }
            }
            SessionAction::CheckAnswer => self.check_answer(),
            SessionAction::ToggleFlag => self.toggle_flag().map(|_| ()),
            SessionAction::RevealHint => self.reveal_hint(),
            SessionAction::GoTo(position) => self.go_to(position),
            SessionAction::Next => {
                self.next();
                Ok(())
            }
            SessionAction::Previous => {
                self.previous();
                Ok(())
            }
        }
    }

    /// Render the question at the current position.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` if the position is invalid.
    pub fn current_view(&self) -> Result<QuestionView, SessionError> {
        let (idx, question) = self.current()?;
        let selected = self.session.selected(idx);
        let locked = self.is_locked(idx);

        let options = self
            .displayed_options(idx, question)
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let is_selected = selected.iter().any(|s| s == text);
                let feedback = locked.then(|| {
                    if question.is_correct_option(text) {
                        OptionFeedback::Correct
                    } else if is_selected {
                        OptionFeedback::WronglySelected
                    } else {
                        OptionFeedback::Neutral
                    }
                });
                OptionView {
                    index,
                    text: text.to_owned(),
                    selected: is_selected,
                    feedback,
                }
            })
            .collect();

        Ok(QuestionView {
            position: self.session.position,
            total: self.bank.len(),
            bank_index: idx,
            prompt: question.prompt().to_owned(),
            options,
            multi_select: question.is_multi_select(),
            flagged: self.session.flagged.contains(&idx),
            has_hint: question.hint().is_some(),
            hint: question
                .hint()
                .filter(|_| self.session.hints_used.contains(&idx))
                .map(str::to_owned),
            section: question.section().map(str::to_owned),
            difficulty: question.difficulty(),
            locked,
            is_correct: locked.then(|| is_correct(question, selected)),
            explanation: question
                .explanation()
                .filter(|_| locked)
                .map(str::to_owned),
        })
    }
}

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::model::attempt::ExamMode;
use crate::model::bank::QuestionBank;
use crate::model::ids::{AttemptId, BankId};

/// State of the single in-flight quiz.
///
/// Every per-question key (answers, flags, hints, practice locks, option
/// orders) is a bank index. `position` is the place in the session's own
/// order and goes through `question_order` to reach the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamSession {
    pub id: AttemptId,
    pub bank_id: BankId,
    pub bank_name: String,
    pub mode: ExamMode,
    pub position: usize,
    pub answers: BTreeMap<usize, Vec<String>>,
    pub flagged: BTreeSet<usize>,
    pub hints_used: BTreeSet<usize>,
    /// Practice-mode questions whose answer has been checked and locked.
    pub checked: BTreeSet<usize>,
    pub started_at: DateTime<Utc>,
    pub time_limit: Option<u32>,
    pub question_order: Vec<usize>,
    pub option_orders: BTreeMap<usize, Vec<usize>>,
}

impl ExamSession {
    /// Fresh session at the first position with nothing answered.
    #[must_use]
    pub fn new(
        id: AttemptId,
        bank: &QuestionBank,
        mode: ExamMode,
        started_at: DateTime<Utc>,
        question_order: Vec<usize>,
        option_orders: BTreeMap<usize, Vec<usize>>,
    ) -> Self {
        Self {
            id,
            bank_id: bank.id().clone(),
            bank_name: bank.name().to_owned(),
            mode,
            position: 0,
            answers: BTreeMap::new(),
            flagged: BTreeSet::new(),
            hints_used: BTreeSet::new(),
            checked: BTreeSet::new(),
            started_at,
            time_limit: bank.time_limit(),
            question_order,
            option_orders,
        }
    }

    /// True when this session belongs to the given bank and mode.
    #[must_use]
    pub fn matches(&self, bank_id: &BankId, mode: ExamMode) -> bool {
        &self.bank_id == bank_id && self.mode == mode
    }

    /// Bank index shown at `position`. An empty order means identity.
    #[must_use]
    pub fn bank_index(&self, position: usize) -> Option<usize> {
        if self.question_order.is_empty() {
            Some(position)
        } else {
            self.question_order.get(position).copied()
        }
    }

    /// Selection recorded for a bank question, empty when unanswered.
    #[must_use]
    pub fn selected(&self, bank_index: usize) -> &[String] {
        self.answers.get(&bank_index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Questions with a non-empty selection.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|a| !a.is_empty()).count()
    }

    /// Checks that the stored orderings and indices still describe `bank`.
    ///
    /// A bank replaced after the session started (different question or
    /// option counts) makes the snapshot unusable.
    #[must_use]
    pub fn fits(&self, bank: &QuestionBank) -> bool {
        let len = bank.len();
        if &self.bank_id != bank.id() || self.position >= len {
            return false;
        }
        if !self.question_order.is_empty() && !is_permutation(&self.question_order, len) {
            return false;
        }
        let in_range = |idx: &usize| *idx < len;
        if !self.answers.keys().all(in_range)
            || !self.flagged.iter().all(in_range)
            || !self.hints_used.iter().all(in_range)
            || !self.checked.iter().all(in_range)
        {
            return false;
        }
        self.option_orders.iter().all(|(idx, order)| {
            bank.question(*idx)
                .is_some_and(|q| is_permutation(order, q.options().len()))
        })
    }
}

/// True when `order` holds every index in `0..len` exactly once.
#[must_use]
pub fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &idx in order {
        match seen.get_mut(idx) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}

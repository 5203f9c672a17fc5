//! Answer evaluation and attempt grading.
//!
//! Everything here is pure: a bank plus a session snapshot in, numbers out.

use chrono::{DateTime, Utc};

use crate::model::{
    ExamAttempt, ExamSection, ExamSession, Question, QuestionBank, SectionScore, UserAnswer,
    normalize_text,
};

/// Trim and lowercase each selected option.
#[must_use]
pub fn normalize_answers(answers: &[String]) -> Vec<String> {
    answers.iter().map(|a| normalize_text(a)).collect()
}

/// Judge a selection against the question's answer key.
///
/// Order of the selection does not matter. An empty selection is never correct.
#[must_use]
pub fn is_correct(question: &Question, selected: &[String]) -> bool {
    let mut expected = question.correct_answer().normalized();
    let mut chosen = normalize_answers(selected);
    if chosen.is_empty() || chosen.len() != expected.len() {
        return false;
    }
    expected.sort();
    chosen.sort();
    expected == chosen
}

/// Rounded percentage, 0 when nothing was possible.
#[must_use]
pub fn percent(earned: f64, total: f64) -> u32 {
    if total <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = (earned / total * 100.0).round() as u32;
    pct
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedScore {
    pub total_points: f64,
    pub earned_points: f64,
    pub score: u32,
}

/// Flat weighted score over the given answers.
///
/// An answer whose question index is outside `questions` counts for 1 point.
#[must_use]
pub fn weighted_score(answers: &[UserAnswer], questions: &[Question]) -> WeightedScore {
    let (total_points, earned_points) =
        answers
            .iter()
            .fold((0.0_f64, 0.0_f64), |(total, earned), answer| {
                let weight = questions
                    .get(answer.question_index)
                    .map_or(1.0, Question::points);
                let gained = if answer.is_correct { weight } else { 0.0 };
                (total + weight, earned + gained)
            });

    WeightedScore {
        total_points,
        earned_points,
        score: percent(earned_points, total_points),
    }
}

/// Score per declared section, in declaration order.
///
/// Only answers to questions labelled with the section's name count. The
/// section weight is passed through untouched.
#[must_use]
pub fn section_scores(
    answers: &[UserAnswer],
    questions: &[Question],
    sections: &[ExamSection],
) -> Vec<SectionScore> {
    sections
        .iter()
        .map(|section| {
            let in_section: Vec<UserAnswer> = answers
                .iter()
                .filter(|a| {
                    questions
                        .get(a.question_index)
                        .and_then(Question::section)
                        .is_some_and(|label| label == section.name)
                })
                .cloned()
                .collect();
            SectionScore {
                section: section.name.clone(),
                score: weighted_score(&in_section, questions).score,
                weight: section.weight,
            }
        })
        .collect()
}

/// Pass/fail against the bank's pass mark. `None` when no pass mark is set.
#[must_use]
pub fn passed(score: u32, passing_score: Option<f64>) -> Option<bool> {
    passing_score
        .filter(|p| *p > 0.0)
        .map(|p| f64::from(score) >= p)
}

/// Build the immutable attempt for a finished session.
///
/// Every question of the bank gets an answer entry; unanswered questions are
/// recorded with an empty selection and count as skipped.
#[must_use]
pub fn grade_attempt(
    bank: &QuestionBank,
    session: &ExamSession,
    ended_at: DateTime<Utc>,
) -> ExamAttempt {
    let answers: Vec<UserAnswer> = bank
        .questions()
        .iter()
        .enumerate()
        .map(|(idx, question)| {
            let selected = session.selected(idx).to_vec();
            let correct = is_correct(question, &selected);
            let weight = question.points();
            UserAnswer {
                question_index: idx,
                selected_options: selected,
                is_correct: correct,
                points_earned: if correct { weight } else { 0.0 },
                points_possible: weight,
                section: question.section().map(str::to_owned),
                used_hint: session.hints_used.contains(&idx),
            }
        })
        .collect();

    let correct_count = answers.iter().filter(|a| a.is_correct).count();
    let wrong_count = answers.iter().filter(|a| a.is_wrong()).count();
    let skipped_count = answers.iter().filter(|a| a.is_skipped()).count();

    let totals = weighted_score(&answers, bank.questions());
    let sections = section_scores(&answers, bank.questions(), bank.sections());

    ExamAttempt {
        id: session.id.clone(),
        question_bank_id: bank.id().clone(),
        question_bank_name: bank.name().to_owned(),
        mode: session.mode,
        start_time: session.started_at,
        end_time: Some(ended_at),
        total_questions: answers.len(),
        answers,
        correct_count,
        wrong_count,
        skipped_count,
        score: totals.score,
        completed: true,
        total_points: totals.total_points,
        earned_points: totals.earned_points,
        section_scores: sections,
        passed: passed(totals.score, bank.passing_score()),
    }
}

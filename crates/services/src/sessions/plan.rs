use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;

use exam_core::model::{ExamMode, QuestionBank};

/// A uniformly random permutation of `0..len` (Fisher–Yates).
pub fn shuffled_indices<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(rng);
    indices
}

/// Order in which the session walks the bank.
///
/// Only exam mode shuffles; practice always follows the bank order.
pub fn question_order<R: Rng + ?Sized>(
    len: usize,
    mode: ExamMode,
    shuffle: bool,
    rng: &mut R,
) -> Vec<usize> {
    if shuffle && mode == ExamMode::Exam {
        shuffled_indices(len, rng)
    } else {
        (0..len).collect()
    }
}

/// Display order of options per bank question, drawn independently for each question.
///
/// Empty when the bank does not shuffle options, whatever the mode.
pub fn option_orders<R: Rng + ?Sized>(
    bank: &QuestionBank,
    rng: &mut R,
) -> BTreeMap<usize, Vec<usize>> {
    if !bank.shuffle_options() {
        return BTreeMap::new();
    }
    bank.questions()
        .iter()
        .enumerate()
        .map(|(idx, question)| (idx, shuffled_indices(question.options().len(), rng)))
        .collect()
}
